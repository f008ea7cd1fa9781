//! Applies an image's layers to a directory.
//!
//! Layers are fetched and unpacked strictly in manifest order, each on top
//! of what the previous ones left behind. A later layer silently replaces
//! files of earlier layers at the same path.
//!
//! Whiteout entries (`.wh.*`), which real images use to delete files from
//! lower layers, are not interpreted: they are extracted as ordinary files
//! and the files they were meant to hide stay in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hatch_common::config::{LayerStaging, RuntimeConfig};
use hatch_common::constants::{IMAGE_DIR, STAGING_ARCHIVE, STAGING_TAR};
use hatch_common::error::{HatchError, Result};
use hatch_common::types::{Digest, ImageName};

use crate::archive::{self, ExtractSummary};
use crate::hash::{self, DigestReader};
use crate::manifest::Descriptor;
use crate::registry::{Blob, RegistryClient, RegistrySession};

/// Record of one applied layer.
#[derive(Debug, Clone)]
pub struct AppliedLayer {
    /// Layer digest from the manifest.
    pub digest: Digest,
    /// Layer media type from the manifest.
    pub media_type: String,
    /// Compressed bytes received from the registry.
    pub compressed_bytes: u64,
    /// What extraction wrote.
    pub summary: ExtractSummary,
}

/// An image tree produced by [`Materializer::materialize`].
#[derive(Debug, Clone)]
pub struct MaterializedImage {
    /// Image that was pulled.
    pub image: ImageName,
    /// Directory holding the extracted tree.
    pub root: PathBuf,
    /// Layers in the order they were applied.
    pub layers: Vec<AppliedLayer>,
}

/// Pulls images and unpacks their layers.
#[derive(Debug)]
pub struct Materializer {
    client: RegistryClient,
    staging: LayerStaging,
    verify_digests: bool,
}

impl Materializer {
    /// Creates a materializer from the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry client cannot be created.
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        Ok(Self::with_client(
            RegistryClient::new(&config.registry)?,
            config.staging,
            config.verify_digests,
        ))
    }

    /// Creates a materializer around an existing client.
    #[must_use]
    pub const fn with_client(
        client: RegistryClient,
        staging: LayerStaging,
        verify_digests: bool,
    ) -> Self {
        Self {
            client,
            staging,
            verify_digests,
        }
    }

    /// Pulls `image` and unpacks its layers into `<root>/image`.
    ///
    /// Staging files, when used, are written directly under `root`.
    ///
    /// # Errors
    ///
    /// Returns the first registry, archive, or digest error. Layers applied
    /// before the failure are left in place.
    pub fn materialize(&self, image: &ImageName, root: &Path) -> Result<MaterializedImage> {
        let image_root = root.join(IMAGE_DIR);
        fs::create_dir_all(&image_root).map_err(|e| HatchError::io(&image_root, e))?;

        let session = RegistrySession::open(&self.client, image)?;
        let manifest = session.manifest()?;

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for (index, descriptor) in manifest.layers.iter().enumerate() {
            tracing::info!(
                image = %image,
                layer = index + 1,
                of = manifest.layers.len(),
                digest = %descriptor.digest.short(),
                media_type = %descriptor.media_type,
                size = descriptor.size,
                "applying layer"
            );
            let blob = session.blob(&descriptor.digest)?;
            let layer = match self.staging {
                LayerStaging::Streamed => self.apply_streamed(blob, descriptor, &image_root)?,
                LayerStaging::OnDisk => self.apply_on_disk(blob, descriptor, root, &image_root)?,
            };
            tracing::debug!(
                digest = %descriptor.digest.short(),
                files = layer.summary.files,
                directories = layer.summary.directories,
                symlinks = layer.summary.symlinks,
                skipped = layer.summary.skipped,
                "layer applied"
            );
            layers.push(layer);
        }

        tracing::info!(image = %image, root = %image_root.display(), layers = layers.len(), "image materialized");
        Ok(MaterializedImage {
            image: image.clone(),
            root: image_root,
            layers,
        })
    }

    fn apply_streamed(
        &self,
        blob: Blob,
        descriptor: &Descriptor,
        image_root: &Path,
    ) -> Result<AppliedLayer> {
        let mut reader = DigestReader::new(blob);
        let summary = archive::unpack_layer(&mut reader, image_root)?;
        let compressed_bytes = if self.verify_digests {
            reader.finish(&descriptor.digest.to_string(), &descriptor.digest)?
        } else {
            reader.bytes_read()
        };
        Ok(applied(descriptor, compressed_bytes, summary))
    }

    fn apply_on_disk(
        &self,
        blob: Blob,
        descriptor: &Descriptor,
        root: &Path,
        image_root: &Path,
    ) -> Result<AppliedLayer> {
        let compressed = root.join(STAGING_ARCHIVE);
        let decompressed = root.join(STAGING_TAR);

        let result = self.stage_and_extract(blob, descriptor, &compressed, &decompressed, image_root);

        for staged in [&compressed, &decompressed] {
            if let Err(e) = fs::remove_file(staged) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %staged.display(), error = %e, "failed to remove staging file");
                }
            }
        }
        result
    }

    fn stage_and_extract(
        &self,
        mut blob: Blob,
        descriptor: &Descriptor,
        compressed: &Path,
        decompressed: &Path,
        image_root: &Path,
    ) -> Result<AppliedLayer> {
        let mut file = fs::File::create(compressed).map_err(|e| HatchError::io(compressed, e))?;
        let compressed_bytes =
            io::copy(&mut blob, &mut file).map_err(|e| HatchError::io(compressed, e))?;
        drop(file);

        if self.verify_digests {
            hash::validate_hash(compressed, &descriptor.digest)?;
        }

        let source = fs::File::open(compressed).map_err(|e| HatchError::io(compressed, e))?;
        let _ = archive::decompress(source, decompressed)?;

        let tarball = fs::File::open(decompressed).map_err(|e| HatchError::io(decompressed, e))?;
        let summary = archive::extract(tarball, image_root)?;
        Ok(applied(descriptor, compressed_bytes, summary))
    }
}

fn applied(descriptor: &Descriptor, compressed_bytes: u64, summary: ExtractSummary) -> AppliedLayer {
    AppliedLayer {
        digest: descriptor.digest.clone(),
        media_type: descriptor.media_type.clone(),
        compressed_bytes,
        summary,
    }
}
