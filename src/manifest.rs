use std::{collections::BTreeMap, fs, ops::Deref, path::PathBuf};

use anyhow::Context;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// Dependency category names, as used for manifest keys, toolchain
// subdirectories and catalog listings alike.
pub const GCC_ARM: &str = "gcc-arm";
pub const BUILDSCRIPTS: &str = "buildscripts";
pub const BUILDTOOLS: &str = "buildtools";
pub const DEVICE_OS: &str = "deviceOS";
pub const OPENOCD: &str = "openocd";

/// Installed dependency versions, keyed by category.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, String>);

impl Manifest {
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, version: &str) {
        self.0.insert(name.to_owned(), version.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The versions the build launcher needs resolved before it can assemble
/// the child environment.
#[derive(Debug, Clone)]
pub struct BuildVersions {
    pub compiler: String,
    pub scripts: String,
    pub tools: String,
    pub firmware: String,
}

/// The one mutable piece of persisted state: a single JSON object on disk.
///
/// Mutations go through [`ManifestStore::update`], which rewrites the whole
/// file after applying the change in memory. Concurrent writers are not
/// supported; this is a single-user, single-process store.
pub struct ManifestStore {
    path: PathBuf,
    existed: bool,
    data: Manifest,
}

impl Deref for ManifestStore {
    type Target = Manifest;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl ManifestStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let existed = path.is_file();

        let data = if existed {
            let raw = fs::read_to_string(&path).with_context(|| {
                format!("Failed to read dependency manifest at: {}", path.display())
            })?;

            if raw.trim().is_empty() {
                Manifest::default()
            } else {
                match serde_json::from_str(&raw) {
                    Ok(manifest) => manifest,
                    Err(err) => {
                        // Recovered locally: the next commit rewrites the
                        // file from scratch, losing whatever was in it.
                        warn!(
                            "Dependency manifest at {} is corrupt ({err}), treating it as empty",
                            path.display()
                        );
                        Manifest::default()
                    }
                }
            }
        } else {
            Manifest::default()
        };

        Ok(Self {
            path,
            existed,
            data,
        })
    }

    /// Whether the manifest file had ever been written before this run.
    pub fn initialized(&self) -> bool {
        self.existed
    }

    pub fn update(&mut self, with: impl FnOnce(&mut Manifest)) -> Result<()> {
        with(&mut self.data);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory at: {}", parent.display())
            })?;
        }

        let raw = serde_json::to_string_pretty(&self.data)
            .context("Failed to serialize the dependency manifest")?;

        fs::write(&self.path, raw).with_context(|| {
            format!(
                "Failed to write dependency manifest to: {}",
                self.path.display()
            )
        })?;

        self.existed = true;

        Ok(())
    }

    pub fn build_versions(&self) -> Result<BuildVersions> {
        let require = |name: &str| -> Result<String> {
            self.data
                .version_of(name)
                .map(str::to_owned)
                .ok_or_else(|| Error::ManifestMissing(name.to_owned()))
        };

        Ok(BuildVersions {
            compiler: require(GCC_ARM)?,
            scripts: require(BUILDSCRIPTS)?,
            tools: require(BUILDTOOLS)?,
            firmware: require(DEVICE_OS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &std::path::Path) -> ManifestStore {
        ManifestStore::open(dir.join("manifest.json")).unwrap()
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(!store.initialized());
        assert!(store.is_empty());

        assert!(matches!(
            store.build_versions(),
            Err(Error::ManifestMissing(name)) if name == GCC_ARM
        ));
    }

    #[test]
    fn commit_round_trips() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = store_in(dir.path());
        store
            .update(|m| {
                m.set(GCC_ARM, "5.3.1");
                m.set(BUILDSCRIPTS, "1.9.2");
                m.set(BUILDTOOLS, "1.1.1");
                m.set(DEVICE_OS, "1.5.2");
                m.set(OPENOCD, "0.11.2");
            })
            .unwrap();

        let reopened = store_in(dir.path());
        assert!(reopened.initialized());
        assert_eq!(reopened.version_of(DEVICE_OS), Some("1.5.2"));

        let versions = reopened.build_versions().unwrap();
        assert_eq!(versions.compiler, "5.3.1");
        assert_eq!(versions.firmware, "1.5.2");
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let mut store = ManifestStore::open(path.clone()).unwrap();
        assert!(store.is_empty());

        store.update(|m| m.set(DEVICE_OS, "2.0.1")).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Manifest = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.version_of(DEVICE_OS), Some("2.0.1"));
    }
}
