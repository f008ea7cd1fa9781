//! Domain primitive types used across the Hatch workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{LIBRARY_NAMESPACE, MAX_IMAGE_REF_LEN, SHA256_HEX_LENGTH};
use crate::error::{HatchError, Result};

/// Name of an official image, optionally carrying a tag (`alpine`, `ubuntu:22.04`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageName {
    name: String,
    tag: Option<String>,
}

impl ImageName {
    /// Parses and validates an image reference.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::Config` if the reference is empty, too long, or
    /// contains characters outside the allowed set.
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = |reason: &str| HatchError::Config {
            message: format!("invalid image reference {reference:?}: {reason}"),
        };

        if reference.is_empty() {
            return Err(invalid("empty"));
        }
        if reference.len() > MAX_IMAGE_REF_LEN {
            return Err(invalid(&format!("exceeds {MAX_IMAGE_REF_LEN} bytes")));
        }

        // A colon after the last slash separates the tag.
        let last_slash = reference.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match reference[last_slash..].find(':') {
            Some(i) => {
                let split = last_slash + i;
                (&reference[..split], Some(&reference[split + 1..]))
            }
            None => (reference, None),
        };

        if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
            return Err(invalid("malformed repository name"));
        }
        if !name.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/')
        }) {
            return Err(invalid("repository contains invalid characters"));
        }
        if let Some(tag) = tag {
            if tag.is_empty()
                || !tag
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            {
                return Err(invalid("malformed tag"));
            }
        }

        Ok(Self {
            name: name.to_string(),
            tag: tag.map(str::to_string),
        })
    }

    /// Returns the repository name without tag.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the explicit tag, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns the tag, falling back to `default` when none was given.
    #[must_use]
    pub fn reference<'a>(&'a self, default: &'a str) -> &'a str {
        self.tag.as_deref().unwrap_or(default)
    }

    /// Returns the repository path used in registry URLs (`library/<name>`).
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{LIBRARY_NAMESPACE}/{}", self.name)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{tag}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for ImageName {
    type Err = HatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageName {
    type Error = HatchError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ImageName> for String {
    fn from(value: ImageName) -> Self {
        value.to_string()
    }
}

/// Content-addressed SHA-256 digest (`sha256:<hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Creates a digest from a bare hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a 64-character lowercase hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != SHA256_HEX_LENGTH
            || !hex
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(HatchError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(hex))
    }

    /// Parses a prefixed digest such as `sha256:e3b0...`.
    ///
    /// # Errors
    ///
    /// Returns an error for other algorithms or malformed hex.
    pub fn parse(value: &str) -> Result<Self> {
        let hex = value
            .strip_prefix("sha256:")
            .ok_or_else(|| HatchError::Config {
                message: format!("unsupported digest algorithm: {value}"),
            })?;
        Self::from_hex(hex)
    }

    /// Returns the hex-encoded hash.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 hex characters, for log output.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

impl FromStr for Digest {
    type Err = HatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = HatchError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_string()
    }
}

/// Lifecycle of a single invocation.
///
/// `Initializing → JailBuilt → [ImageMaterialized] → ChildRunning → ChildExited → CleanedUp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    /// Nothing has been created yet.
    Initializing,
    /// The jail exists and is the process root.
    JailBuilt,
    /// Image layers were applied and the root moved into the image tree.
    ImageMaterialized,
    /// The child has been started.
    ChildRunning,
    /// The child has terminated or failed to launch.
    ChildExited,
    /// The jail has been removed.
    CleanedUp,
}

impl LifecycleState {
    /// Returns whether moving from `self` to `next` is a legal step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initializing, Self::JailBuilt)
                | (Self::JailBuilt, Self::ImageMaterialized | Self::ChildRunning)
                | (Self::ImageMaterialized, Self::ChildRunning)
                | (Self::ChildRunning, Self::ChildExited)
                | (Self::ChildExited, Self::CleanedUp)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::JailBuilt => write!(f, "jail-built"),
            Self::ImageMaterialized => write!(f, "image-materialized"),
            Self::ChildRunning => write!(f, "child-running"),
            Self::ChildExited => write!(f, "child-exited"),
            Self::CleanedUp => write!(f, "cleaned-up"),
        }
    }
}
