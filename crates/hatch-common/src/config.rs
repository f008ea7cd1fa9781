//! Runtime configuration model.
//!
//! Values resolve in three layers: built-in defaults, an optional JSON file,
//! then command-line flags and environment variables applied by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{HatchError, Result};

/// Root configuration for a Hatch invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Registry endpoints used for image pulls.
    pub registry: RegistryConfig,
    /// Jail construction settings.
    pub jail: JailConfig,
    /// Request a private PID namespace for the child where supported.
    pub pid_namespace: bool,
    /// How layer blobs travel from the network into the image tree.
    pub staging: LayerStaging,
    /// Verify each layer blob against its manifest digest.
    pub verify_digests: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            jail: JailConfig::default(),
            pid_namespace: true,
            staging: LayerStaging::default(),
            verify_digests: true,
        }
    }
}

impl RuntimeConfig {
    /// Loads a configuration file, filling unspecified fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| HatchError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that endpoints are HTTP(S) URLs and paths are absolute.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        for (field, url) in [
            ("registry.url", &self.registry.url),
            ("registry.auth_url", &self.registry.auth_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(HatchError::Config {
                    message: format!("{field} must be an http(s) URL, got {url}"),
                });
            }
        }
        if self.registry.service.is_empty() || self.registry.reference.is_empty() {
            return Err(HatchError::Config {
                message: "registry.service and registry.reference must not be empty".into(),
            });
        }
        if let Some(root) = &self.jail.temp_root {
            if !root.is_absolute() {
                return Err(HatchError::Config {
                    message: format!("jail.temp_root must be absolute, got {}", root.display()),
                });
            }
        }
        if !self.jail.etc_source.is_absolute() {
            return Err(HatchError::Config {
                message: format!(
                    "jail.etc_source must be absolute, got {}",
                    self.jail.etc_source.display()
                ),
            });
        }
        Ok(())
    }
}

/// Registry endpoints for anonymous pulls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL serving `/v2/...` manifests and blobs.
    pub url: String,
    /// Base URL of the token service.
    pub auth_url: String,
    /// Service name passed to the token endpoint.
    pub service: String,
    /// Reference used when an image name has no tag.
    pub reference: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_REGISTRY_URL.into(),
            auth_url: constants::DEFAULT_AUTH_URL.into(),
            service: constants::DEFAULT_REGISTRY_SERVICE.into(),
            reference: constants::DEFAULT_REFERENCE.into(),
        }
    }
}

/// Settings for building the jail directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JailConfig {
    /// Parent directory for jails; the system temp dir when unset.
    pub temp_root: Option<PathBuf>,
    /// Directory copied to `/etc` inside the jail.
    pub etc_source: PathBuf,
    /// Switch the process root into the jail. Disabling this leaves the
    /// jail as a plain directory and is meant for unprivileged testing.
    pub root_switch: bool,
}

impl Default for JailConfig {
    fn default() -> Self {
        Self {
            temp_root: None,
            etc_source: PathBuf::from(constants::DEFAULT_ETC_SOURCE),
            root_switch: true,
        }
    }
}

impl JailConfig {
    /// Returns the directory new jails are created under.
    #[must_use]
    pub fn resolved_temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// How layer blobs are moved from the registry into the image tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerStaging {
    /// Stream the response through gzip and tar without intermediate files.
    #[default]
    Streamed,
    /// Write `image.tar.gz` and `image.tar` staging files inside the jail.
    OnDisk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_docker_hub() {
        let config = RuntimeConfig::default();
        assert_eq!(config.registry.url, "https://registry.hub.docker.com");
        assert_eq!(config.registry.auth_url, "https://auth.docker.io");
        assert_eq!(config.registry.reference, "latest");
        assert!(config.pid_namespace);
        assert!(config.jail.root_switch);
        assert_eq!(config.staging, LayerStaging::Streamed);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hatch.json");
        std::fs::write(
            &path,
            r#"{"registry": {"url": "http://127.0.0.1:5000"}, "staging": "on-disk"}"#,
        )
        .expect("write");

        let config = RuntimeConfig::load(&path).expect("load");
        assert_eq!(config.registry.url, "http://127.0.0.1:5000");
        assert_eq!(config.registry.service, "registry.docker.io");
        assert_eq!(config.staging, LayerStaging::OnDisk);
        assert!(config.verify_digests);
    }

    #[test]
    fn validate_rejects_non_http_registry() {
        let mut config = RuntimeConfig::default();
        config.registry.url = "ftp://registry".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_paths() {
        let mut config = RuntimeConfig::default();
        config.jail.temp_root = Some(PathBuf::from("relative/tmp"));
        assert!(config.validate().is_err());

        let mut config = RuntimeConfig::default();
        config.jail.etc_source = PathBuf::from("etc");
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = RuntimeConfig::load(Path::new("/nonexistent/hatch.json")).unwrap_err();
        assert!(matches!(err, HatchError::Io { .. }));
    }
}
