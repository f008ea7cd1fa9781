//! # hatch-image
//!
//! Image pulling for the Hatch runtime.
//!
//! Handles:
//! - **Archive**: gzip decompression and tar extraction, separately or as one
//!   streaming pipeline.
//! - **Hash**: SHA-256 verification of layer blobs.
//! - **Manifest**: the registry's v2 image manifest and token payloads.
//! - **Registry**: anonymous bearer-token auth, manifest and blob requests.
//! - **Materialize**: applying an image's layers, in order, to a directory.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod archive;
pub mod hash;
pub mod manifest;
pub mod materialize;
pub mod registry;
