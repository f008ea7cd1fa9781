//! Filesystem management for jail construction.
//!
//! Provides recursive tree copying used to seed the jail and the
//! `chroot(2)` root switch.

pub mod copy;
pub mod root;
