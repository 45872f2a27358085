use thiserror::Error;

use crate::fetch::FetchError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure kinds surfaced by the dependency manager core.
///
/// Everything that doesn't fit the taxonomy (plain I/O trouble, malformed
/// local files, ...) travels through the `Other` variant with its full
/// `anyhow` context chain intact.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Unknown deviceOS version: {0}")]
    UnknownFirmwareVersion(String),

    #[error("Platform {platform} is not supported in deviceOS version {version}")]
    PlatformNotSupported { platform: String, version: String },

    #[error("Failed to download dependency {name} version {version}")]
    Download {
        name: String,
        version: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to extract dependency {name} version {version}")]
    Extraction {
        name: String,
        version: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No installed version recorded for {0}; run `neopo install` first")]
    ManifestMissing(String),

    #[error("Failed to fetch the dependency catalogs: {0}")]
    CatalogFetch(anyhow::Error),

    #[error("deviceOS version {0} was not found on any source")]
    FirmwareVersionNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
