//! Registry payloads: the v2 image manifest and the token response.

use chrono::{DateTime, Duration, Utc};
use hatch_common::constants::MAX_IMAGE_LAYERS;
use hatch_common::error::{HatchError, Result};
use hatch_common::types::Digest;
use serde::{Deserialize, Serialize};

/// Content descriptor for a config blob or a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced blob.
    pub media_type: String,
    /// Size of the blob in bytes.
    pub size: u64,
    /// Content address of the blob.
    pub digest: Digest,
}

/// Image manifest (Docker distribution schema 2).
///
/// Layers are ordered bottom to top and must be applied in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest schema version.
    pub schema_version: u32,
    /// Media type of the manifest itself.
    #[serde(default)]
    pub media_type: String,
    /// Image configuration blob.
    pub config: Descriptor,
    /// Filesystem layers, base layer first.
    pub layers: Vec<Descriptor>,
}

impl Manifest {
    /// Checks the schema version and layer count.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::Config` for an unsupported schema or an image
    /// with more than `MAX_IMAGE_LAYERS` layers.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != 2 {
            return Err(HatchError::Config {
                message: format!("unsupported manifest schema version {}", self.schema_version),
            });
        }
        if self.layers.len() > MAX_IMAGE_LAYERS {
            return Err(HatchError::Config {
                message: format!(
                    "manifest lists {} layers, limit is {MAX_IMAGE_LAYERS}",
                    self.layers.len()
                ),
            });
        }
        Ok(())
    }

    /// Returns the summed compressed size of all layers.
    #[must_use]
    pub fn total_layer_size(&self) -> u64 {
        self.layers.iter().map(|l| l.size).sum()
    }
}

/// Response of the anonymous token endpoint.
///
/// Expiry fields are advisory; tokens are never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for manifest and blob requests.
    pub token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Issue time.
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

impl TokenResponse {
    /// Returns when the token stops being valid, if the registry said so.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = Duration::try_seconds(i64::try_from(self.expires_in?).ok()?)?;
        self.issued_at.map(|issued| issued + lifetime)
    }
}
