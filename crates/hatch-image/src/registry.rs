//! Registry client for anonymous image pulls.
//!
//! Speaks the three endpoints a pull needs: the token service, the manifest
//! endpoint and the blob endpoint. Every request goes through one helper
//! that treats any status other than 200 as an error carrying the response
//! body. Nothing is retried.

use std::io::{self, Read};
use std::time::Duration;

use hatch_common::config::RegistryConfig;
use hatch_common::constants::{APP_NAME, MANIFEST_V2_MEDIA_TYPE};
use hatch_common::error::{HatchError, Result};
use hatch_common::types::{Digest, ImageName};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderName};

use crate::manifest::{Manifest, TokenResponse};

/// Blocking HTTP client bound to one registry and its token service.
#[derive(Debug)]
pub struct RegistryClient {
    http: Client,
    config: RegistryConfig,
}

impl RegistryClient {
    /// Creates a client for the configured endpoints.
    ///
    /// Requests have no overall timeout; layer downloads may take as long
    /// as the registry needs.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::Http` if the HTTP client cannot be initialized.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Option::<Duration>::None)
            .build()
            .map_err(|e| HatchError::Http {
                url: config.url.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Returns the endpoint configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Token endpoint scoped to pulling `image`.
    #[must_use]
    pub fn token_url(&self, image: &ImageName) -> String {
        format!(
            "{}/token?service={}&scope=repository:{}:pull",
            self.config.auth_url.trim_end_matches('/'),
            self.config.service,
            image.repository()
        )
    }

    /// Manifest endpoint for the image's tag, or the default reference.
    #[must_use]
    pub fn manifest_url(&self, image: &ImageName) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.config.url.trim_end_matches('/'),
            image.repository(),
            image.reference(&self.config.reference)
        )
    }

    /// Blob endpoint for `digest`.
    #[must_use]
    pub fn blob_url(&self, image: &ImageName, digest: &Digest) -> String {
        format!(
            "{}/v2/{}/blobs/{digest}",
            self.config.url.trim_end_matches('/'),
            image.repository()
        )
    }

    /// Requests an anonymous pull token for `image`.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::Registry` on a non-200 status, `HatchError::Http`
    /// on transport failure, and `HatchError::Serialization` if the body is
    /// not a token response.
    pub fn fetch_token(&self, image: &ImageName) -> Result<TokenResponse> {
        let url = self.token_url(image);
        let response = self.get(&url, &[])?;
        let token: TokenResponse = serde_json::from_reader(response)?;
        tracing::info!(image = %image, expires_at = ?token.expires_at(), "registry token acquired");
        Ok(token)
    }

    /// Fetches and validates the v2 manifest of `image`.
    ///
    /// # Errors
    ///
    /// Fails like [`RegistryClient::fetch_token`], and with
    /// `HatchError::Config` if the manifest does not validate.
    pub fn fetch_manifest(&self, image: &ImageName, token: &str) -> Result<Manifest> {
        let url = self.manifest_url(image);
        let response = self.get(
            &url,
            &[
                (AUTHORIZATION, bearer(token)),
                (ACCEPT, MANIFEST_V2_MEDIA_TYPE.to_string()),
            ],
        )?;
        let manifest: Manifest = serde_json::from_reader(response)?;
        manifest.validate()?;
        tracing::info!(
            image = %image,
            layers = manifest.layers.len(),
            bytes = manifest.total_layer_size(),
            "manifest fetched"
        );
        Ok(manifest)
    }

    /// Opens the blob `digest` of `image` as a stream.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::Registry` on a non-200 status and
    /// `HatchError::Http` on transport failure.
    pub fn fetch_blob(&self, image: &ImageName, digest: &Digest, token: &str) -> Result<Blob> {
        let url = self.blob_url(image, digest);
        let response = self.get(&url, &[(AUTHORIZATION, bearer(token))])?;
        tracing::debug!(digest = %digest.short(), length = ?response.content_length(), "blob stream opened");
        Ok(Blob {
            digest: digest.clone(),
            url,
            response,
        })
    }

    fn get(&self, url: &str, headers: &[(HeaderName, String)]) -> Result<Response> {
        tracing::debug!(url, "GET");
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().map_err(|e| HatchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .text()
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            tracing::warn!(url, status = status.as_u16(), body = %body, "registry request failed");
            return Err(HatchError::Registry {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Streaming body of a layer blob.
#[derive(Debug)]
pub struct Blob {
    digest: Digest,
    url: String,
    response: Response,
}

impl Blob {
    /// Digest the blob was requested by.
    #[must_use]
    pub const fn digest(&self) -> &Digest {
        &self.digest
    }

    /// URL the blob is streamed from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Length announced by the registry, if any.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }
}

impl Read for Blob {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.response.read(buf)
    }
}

/// Credential state for one image pull.
///
/// The token is fetched once when the session opens and reused for the
/// manifest and every blob.
#[derive(Debug)]
pub struct RegistrySession<'a> {
    client: &'a RegistryClient,
    image: ImageName,
    token: String,
}

impl<'a> RegistrySession<'a> {
    /// Authenticates against the token service for `image`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RegistryClient::fetch_token`].
    pub fn open(client: &'a RegistryClient, image: &ImageName) -> Result<Self> {
        let token = client.fetch_token(image)?;
        Ok(Self {
            client,
            image: image.clone(),
            token: token.token,
        })
    }

    /// Image this session pulls.
    #[must_use]
    pub const fn image(&self) -> &ImageName {
        &self.image
    }

    /// Fetches the image manifest.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RegistryClient::fetch_manifest`].
    pub fn manifest(&self) -> Result<Manifest> {
        self.client.fetch_manifest(&self.image, &self.token)
    }

    /// Opens a layer blob.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RegistryClient::fetch_blob`].
    pub fn blob(&self, digest: &Digest) -> Result<Blob> {
        self.client.fetch_blob(&self.image, digest, &self.token)
    }
}
