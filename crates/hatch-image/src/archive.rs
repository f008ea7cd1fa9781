//! Layer archive unpacking.
//!
//! Layers are gzip-compressed tar streams. The two stages are usable on
//! their own ([`decompress`], [`extract`]) or chained without intermediate
//! files ([`unpack_layer`]).

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use hatch_common::error::{HatchError, Result};

/// Counts of entries applied by [`extract`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Directories created or updated.
    pub directories: usize,
    /// Regular files written.
    pub files: usize,
    /// Symbolic links created.
    pub symlinks: usize,
    /// Hard links created.
    pub hard_links: usize,
    /// Entries of other types that were ignored.
    pub skipped: usize,
    /// Bytes of regular file content written.
    pub bytes: u64,
}

/// Decompresses a single-member gzip stream to `dest`.
///
/// When `dest` is an existing directory and the gzip header carries a file
/// name, the output is written to that name inside `dest`; otherwise `dest`
/// is the output file.
///
/// # Errors
///
/// Returns `HatchError::Archive` for malformed or truncated gzip data and
/// `HatchError::Io` if the output cannot be written.
pub fn decompress<R: Read>(reader: R, dest: &Path) -> Result<PathBuf> {
    let mut decoder = flate2::read::GzDecoder::new(reader);

    let output = if dest.is_dir() {
        let embedded = decoder
            .header()
            .and_then(|h| h.filename())
            .map(|name| PathBuf::from(String::from_utf8_lossy(name).into_owned()));
        let name = embedded
            .as_deref()
            .and_then(Path::file_name)
            .ok_or_else(|| HatchError::Archive {
                message: format!(
                    "{} is a directory and the gzip stream carries no file name",
                    dest.display()
                ),
            })?;
        dest.join(name)
    } else {
        dest.to_path_buf()
    };

    let mut file = fs::File::create(&output).map_err(|e| HatchError::io(&output, e))?;
    let written = io::copy(&mut decoder, &mut file).map_err(|e| stream_error(&output, e))?;
    tracing::debug!(output = %output.display(), bytes = written, "gzip member decompressed");
    Ok(output)
}

/// Extracts a tar stream into `dest`, applying entries in stream order.
///
/// Directories and regular files receive the permission bits recorded in
/// the archive. Later entries replace earlier ones at the same path. Entries
/// are confined to `dest`: paths with `..`, parents that resolve outside
/// `dest` through an earlier symlink, and hard links to files outside `dest`
/// are all rejected.
///
/// # Errors
///
/// Returns `HatchError::Archive` for malformed entries, paths escaping
/// `dest`, or a stream that ends before the end-of-archive marker, and
/// `HatchError::Io` for filesystem failures.
pub fn extract<R: Read>(reader: R, dest: &Path) -> Result<ExtractSummary> {
    fs::create_dir_all(dest).map_err(|e| HatchError::io(dest, e))?;

    let mut input = TrackedReader::new(reader);
    let mut archive = tar::Archive::new(&mut input);
    archive.set_preserve_permissions(true);

    let applied = apply_entries(&mut archive, dest);
    let truncated = archive.into_inner().exhausted;

    match applied {
        Ok(_) if truncated => Err(HatchError::Archive {
            message: format!(
                "{}: stream ended before the end-of-archive marker",
                dest.display()
            ),
        }),
        Err(HatchError::Io { path, source }) if truncated => Err(HatchError::Archive {
            message: format!("{}: truncated stream: {source}", path.display()),
        }),
        other => other,
    }
}

fn apply_entries<R: Read>(archive: &mut tar::Archive<R>, dest: &Path) -> Result<ExtractSummary> {
    let mut summary = ExtractSummary::default();

    for entry in archive.entries().map_err(|e| stream_error(dest, e))? {
        let mut entry = entry.map_err(|e| stream_error(dest, e))?;

        let raw_path = entry.path().map_err(|e| stream_error(dest, e))?;
        let relative = confine(&raw_path)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&relative);

        let entry_type = entry.header().entry_type();
        match entry_type {
            tar::EntryType::Directory => {
                prepare_target(dest, &target)?;
                unpack_entry(&mut entry, dest, &target)?;
                summary.directories += 1;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                prepare_target(dest, &target)?;
                let size = entry.size();
                unpack_entry(&mut entry, dest, &target)?;
                summary.bytes += size;
                summary.files += 1;
            }
            tar::EntryType::Symlink => {
                prepare_target(dest, &target)?;
                unpack_entry(&mut entry, dest, &target)?;
                summary.symlinks += 1;
            }
            tar::EntryType::Link => {
                let link = entry
                    .link_name()
                    .map_err(|e| stream_error(&target, e))?
                    .ok_or_else(|| missing_link(&relative))?;
                let source = dest.join(confine(&link)?);
                if let Some(parent) = source.parent() {
                    ensure_inside(dest, parent)?;
                }
                prepare_target(dest, &target)?;
                fs::hard_link(&source, &target).map_err(|e| HatchError::io(&target, e))?;
                summary.hard_links += 1;
            }
            other => {
                tracing::debug!(path = %relative.display(), kind = ?other, "skipping tar entry");
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}

/// Streams a gzip-compressed tar layer straight into `dest`.
///
/// The whole gzip stream is consumed, including anything after the tar
/// end-of-archive marker, so the gzip trailer is always checked.
///
/// # Errors
///
/// Returns the errors of [`extract`], plus `HatchError::Archive` for a
/// corrupt gzip stream.
pub fn unpack_layer<R: Read>(reader: R, dest: &Path) -> Result<ExtractSummary> {
    let mut decoder = flate2::read::GzDecoder::new(reader);
    let summary = extract(&mut decoder, dest)?;
    let _ = io::copy(&mut decoder, &mut io::sink()).map_err(|e| stream_error(dest, e))?;
    Ok(summary)
}

/// Strips root and `.` components; rejects `..` and path prefixes.
fn confine(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return Err(escapes(path)),
        }
    }
    Ok(out)
}

fn unpack_entry<R: Read>(entry: &mut tar::Entry<'_, R>, dest: &Path, target: &Path) -> Result<()> {
    if entry.unpack_in(dest).map_err(|e| stream_error(target, e))? {
        Ok(())
    } else {
        Err(escapes(target))
    }
}

/// Checks that the deepest existing ancestor of `path` resolves inside
/// `dest`, so nothing is created or written through a symlink that leaves it.
fn ensure_inside(dest: &Path, path: &Path) -> Result<()> {
    let root = fs::canonicalize(dest).map_err(|e| HatchError::io(dest, e))?;
    let existing = path
        .ancestors()
        .find(|p| fs::symlink_metadata(p).is_ok())
        .unwrap_or(dest);
    match fs::canonicalize(existing) {
        Ok(resolved) if resolved.starts_with(&root) => Ok(()),
        _ => Err(escapes(path)),
    }
}

/// Confines `target`'s parent to `dest`, creates it, and removes a
/// non-directory already at `target` so links are replaced instead of
/// written through.
fn prepare_target(dest: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        ensure_inside(dest, parent)?;
        fs::create_dir_all(parent).map_err(|e| HatchError::io(parent, e))?;
    }
    if let Ok(existing) = fs::symlink_metadata(target) {
        if !existing.is_dir() {
            fs::remove_file(target).map_err(|e| HatchError::io(target, e))?;
        }
    }
    Ok(())
}

fn escapes(path: &Path) -> HatchError {
    HatchError::Archive {
        message: format!("entry path escapes the target: {}", path.display()),
    }
}

fn missing_link(path: &Path) -> HatchError {
    HatchError::Archive {
        message: format!("link entry without target: {}", path.display()),
    }
}

/// Reader that records whether the underlying stream ran dry.
///
/// A complete tar stream stops at its end-of-archive marker without another
/// read, so hitting end of input means the stream was cut short.
struct TrackedReader<R> {
    inner: R,
    exhausted: bool,
}

impl<R> TrackedReader<R> {
    const fn new(inner: R) -> Self {
        Self {
            inner,
            exhausted: false,
        }
    }
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.exhausted = true;
        }
        Ok(n)
    }
}

/// Classifies a stream error: corrupt input is an archive error, anything
/// else a plain I/O failure at `path`.
fn stream_error(path: &Path, e: io::Error) -> HatchError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            HatchError::Archive {
                message: format!("{}: {e}", path.display()),
            }
        }
        _ => HatchError::io(path, e),
    }
}
