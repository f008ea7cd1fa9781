//! # hatch-runtime
//!
//! Runs one command in an isolated root: the [`sandbox::Sandbox`] state
//! machine, the child [`launcher`], and the end-to-end [`run::run`] pipeline.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod launcher;
pub mod run;
pub mod sandbox;
