//! System-wide constants and default endpoints.

/// Default registry serving manifests and blobs.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com";

/// Default token endpoint host for anonymous pulls.
pub const DEFAULT_AUTH_URL: &str = "https://auth.docker.io";

/// Service name requested from the token endpoint.
pub const DEFAULT_REGISTRY_SERVICE: &str = "registry.docker.io";

/// Reference pulled when an image name carries no tag.
pub const DEFAULT_REFERENCE: &str = "latest";

/// Repository namespace for official images.
pub const LIBRARY_NAMESPACE: &str = "library";

/// Media type requested for manifests. Without it the registry answers with
/// a legacy schema that lacks per-layer media types.
pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Prefix for per-run jail directories under the temp root.
pub const JAIL_PREFIX: &str = "hatch-";

/// Host directory copied into every jail.
pub const DEFAULT_ETC_SOURCE: &str = "/etc";

/// Directory inside the jail that receives the extracted image tree.
pub const IMAGE_DIR: &str = "image";

/// Compressed layer staging file, relative to the jail root.
pub const STAGING_ARCHIVE: &str = "image.tar.gz";

/// Decompressed layer staging file, relative to the jail root.
pub const STAGING_TAR: &str = "image.tar";

/// Mode applied to the executable copied into the jail.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mode for directories created while seeding the jail.
pub const DIR_MODE: u32 = 0o755;

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Maximum number of layers accepted in a manifest.
pub const MAX_IMAGE_LAYERS: usize = 128;

/// Maximum length of an image reference.
pub const MAX_IMAGE_REF_LEN: usize = 255;

/// Exit code when the child executable could not be found.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Exit code when the child could not be started for any other reason.
pub const EXIT_COMMAND_NOT_EXECUTABLE: i32 = 126;

/// Base added to a terminating signal number to form an exit code.
pub const EXIT_SIGNAL_BASE: i32 = 128;

/// Application name, sent in the registry user agent.
pub const APP_NAME: &str = "hatch";
