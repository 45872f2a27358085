use std::{fs, sync::LazyLock};

use anyhow::{anyhow, Context};
use flate2::read::GzDecoder;
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tar::Archive;

use crate::{
    catalog::Catalogs,
    error::{Error, Result},
    fetch::Fetch,
    manifest::{ManifestStore, DEVICE_OS},
    paths::Paths,
};

/// A downloadable, versioned bundle for one dependency category. Built
/// transiently while planning installs, never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub url: String,
}

static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)*(-[A-Za-z0-9.]+)?$").unwrap());

fn binaries_source_url(version: &str) -> String {
    format!("https://binaries.particle.io/device-os/v{version}.tar.gz")
}

fn github_source_url(version: &str) -> String {
    format!("https://github.com/particle-iot/device-os/archive/v{version}.tar.gz")
}

/// Fetches dependency bundles and extracts them under the version-namespaced
/// toolchain directory.
///
/// The manifest entry for a dependency is committed strictly after its
/// extraction succeeded, so the manifest never references a version whose
/// files are not fully on disk.
pub struct Installer<'a> {
    paths: &'a Paths,
    fetcher: &'a dyn Fetch,
}

impl<'a> Installer<'a> {
    pub fn new(paths: &'a Paths, fetcher: &'a dyn Fetch) -> Self {
        Self { paths, fetcher }
    }

    /// Download and extract a dependency bundle, then record the new version
    /// in the provided manifest (if any).
    pub fn install(&self, dep: &Dependency, manifest: Option<&mut ManifestStore>) -> Result<()> {
        info!(
            "Downloading dependency {} version {}...",
            dep.name, dep.version
        );

        let payload = self.fetcher.fetch(&dep.url).map_err(|source| Error::Download {
            name: dep.name.clone(),
            version: dep.version.clone(),
            source,
        })?;

        self.extract(dep, &payload)?;

        if let Some(manifest) = manifest {
            manifest.update(|m| m.set(&dep.name, &dep.version))?;
        }

        Ok(())
    }

    /// Side-install a deviceOS version listed in the firmware catalog,
    /// without touching the manifest's current slot.
    pub fn install_firmware(&self, catalogs: &Catalogs, version: &str) -> Result<()> {
        let entry = catalogs
            .firmware(version)
            .ok_or_else(|| Error::UnknownFirmwareVersion(version.to_owned()))?;

        self.install(&Dependency::from(entry), None)
    }

    /// Best-effort install of a deviceOS version absent from the catalog:
    /// try the binary distribution mirror, then the source archive on
    /// GitHub. Exactly two attempts, no backoff; an HTTP error on a source
    /// just moves on to the next one.
    pub fn install_unlisted(&self, version: &str) -> Result<()> {
        if !VERSION_REGEX.is_match(version) {
            return Err(anyhow!("Invalid deviceOS version string: {version}").into());
        }

        let sources = [
            ("binaries.particle.io/device-os", binaries_source_url(version)),
            ("github.com/particle-iot/device-os", github_source_url(version)),
        ];

        for (label, url) in sources {
            info!("Trying {label}...");

            let dep = Dependency {
                name: DEVICE_OS.to_owned(),
                version: version.to_owned(),
                url,
            };

            match self.fetcher.fetch(&dep.url) {
                Ok(payload) => {
                    self.extract(&dep, &payload)?;
                    return Ok(());
                }

                Err(err) if err.is_not_found() => {
                    warn!("deviceOS version {version} not found at {label}");
                }

                Err(source) => {
                    return Err(Error::Download {
                        name: dep.name,
                        version: dep.version,
                        source,
                    })
                }
            }
        }

        Err(Error::FirmwareVersionNotFound(version.to_owned()))
    }

    /// Unpack a gzipped tarball payload into `{toolchain}/{name}/{version}`.
    ///
    /// Extraction happens in a staging directory next to the destination,
    /// which only replaces it once the whole archive unpacked cleanly. A
    /// corrupt payload therefore leaves any previous install intact.
    fn extract(&self, dep: &Dependency, payload: &[u8]) -> Result<()> {
        let parent = self.paths.toolchain_dir.join(&dep.name);

        fs::create_dir_all(&parent).with_context(|| {
            format!("Failed to create dependency directory at: {}", parent.display())
        })?;

        let staging = tempfile::tempdir_in(&parent)
            .context("Failed to create a staging directory for extraction")?;

        let tar = GzDecoder::new(payload);

        Archive::new(tar)
            .unpack(staging.path())
            .map_err(|source| Error::Extraction {
                name: dep.name.clone(),
                version: dep.version.clone(),
                source,
            })?;

        let dest = self.paths.dependency_dir(&dep.name, &dep.version);

        if dest.exists() {
            fs::remove_dir_all(&dest).with_context(|| {
                format!("Failed to remove previous install at: {}", dest.display())
            })?;
        }

        let staged = staging.keep();

        fs::rename(&staged, &dest).with_context(|| {
            format!(
                "Failed to move extracted dependency into place at: {}",
                dest.display()
            )
        })?;

        Ok(())
    }
}
