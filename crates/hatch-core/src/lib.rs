//! # hatch-core
//!
//! Low-level isolation primitives for the Hatch runtime.
//!
//! This crate provides safe abstractions over:
//! - **Jail**: a private directory seeded with the target executable, `/etc`
//!   and a `/dev` placeholder, ready to become the process root.
//! - **Filesystem**: recursive tree copying and the `chroot(2)` root switch.
//! - **Namespaces**: an optional private PID namespace for the child.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod jail;
pub mod namespace;
