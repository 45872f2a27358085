use std::fs;

use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{error::Result, installer::Dependency, manifest::DEVICE_OS, paths::Paths};

/// One released deviceOS version. The firmware catalog is stored oldest
/// first; callers wanting "newest first" reverse it for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareEntry {
    pub version: String,
    pub url: String,
    pub name: String,

    // The registry attaches extra metadata we don't interpret but must not
    // drop when rewriting the cache files.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<&FirmwareEntry> for Dependency {
    fn from(entry: &FirmwareEntry) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version.clone(),
            url: entry.url.clone(),
        }
    }
}

/// Hardware identity: human device name <-> numeric platform ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEntry {
    pub id: u32,
    pub name: String,
}

/// Which platform IDs a given firmware version can target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainEntry {
    /// `"deviceOS@<version>"`
    pub firmware: String,
    pub platforms: Vec<u32>,
}

/// The three read-only catalog documents, loaded wholesale from the cache
/// directory and immutable within a run. They are only ever replaced as a
/// whole by the upgrade planner refreshing them from the registry.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub firmware: Vec<FirmwareEntry>,
    pub platforms: Vec<PlatformEntry>,
    pub toolchains: Vec<ToolchainEntry>,
}

fn read_catalog<T: DeserializeOwned>(path: &std::path::Path) -> Result<Vec<T>> {
    let raw = fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read catalog file at: {} (run `neopo install` to fetch the catalogs)",
            path.display()
        )
    })?;

    let entries = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse catalog file at: {}", path.display()))?;

    Ok(entries)
}

fn write_catalog<T: Serialize>(path: &std::path::Path, entries: &[T]) -> Result<()> {
    let raw = serde_json::to_string_pretty(entries).context("Failed to serialize catalog")?;

    fs::write(path, raw)
        .with_context(|| format!("Failed to write catalog file at: {}", path.display()))?;

    Ok(())
}

impl Catalogs {
    pub fn load(paths: &Paths) -> Result<Self> {
        Ok(Self {
            firmware: read_catalog(&paths.firmware_file())?,
            platforms: read_catalog(&paths.platforms_file())?,
            toolchains: read_catalog(&paths.toolchains_file())?,
        })
    }

    pub fn save(&self, paths: &Paths) -> Result<()> {
        fs::create_dir_all(&paths.cache_dir).with_context(|| {
            format!(
                "Failed to create cache directory at: {}",
                paths.cache_dir.display()
            )
        })?;

        write_catalog(&paths.firmware_file(), &self.firmware)?;
        write_catalog(&paths.platforms_file(), &self.platforms)?;
        write_catalog(&paths.toolchains_file(), &self.toolchains)?;

        Ok(())
    }

    pub fn platform_id(&self, name: &str) -> Option<u32> {
        self.platforms
            .iter()
            .find(|platform| platform.name == name)
            .map(|platform| platform.id)
    }

    pub fn platform_name(&self, id: u32) -> Option<&str> {
        self.platforms
            .iter()
            .find(|platform| platform.id == id)
            .map(|platform| platform.name.as_str())
    }

    pub fn firmware(&self, version: &str) -> Option<&FirmwareEntry> {
        self.firmware.iter().find(|entry| entry.version == version)
    }

    pub fn supported_platforms(&self, version: &str) -> Option<&[u32]> {
        let firmware = format!("{DEVICE_OS}@{version}");

        self.toolchains
            .iter()
            .find(|toolchain| toolchain.firmware == firmware)
            .map(|toolchain| toolchain.platforms.as_slice())
    }
}
