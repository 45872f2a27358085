use std::collections::HashMap;

use anyhow::anyhow;
use serde::Deserialize;

use crate::{
    catalog::{Catalogs, FirmwareEntry, PlatformEntry, ToolchainEntry},
    error::{Error, Result},
    fetch::Fetch,
    installer::Dependency,
};

/// Single registry document describing every available dependency version
/// and download URL for all supported OS/architecture combinations.
pub const CATALOG_MANIFEST_URL: &str = "https://binaries.particle.io/workbench/manifest.json";

/// Category listing keyed by OS name, then by architecture.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SystemListing(HashMap<String, HashMap<String, Vec<Dependency>>>);

impl SystemListing {
    /// The first listed entry is the latest release for that system.
    pub fn latest_for(&self, system: &str, arch: &str) -> Option<&Dependency> {
        self.0.get(system)?.get(arch)?.first()
    }
}

/// The whole catalog bundle, fetched in one call on every install/update.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogBundle {
    pub firmware: Vec<FirmwareEntry>,
    pub platforms: Vec<PlatformEntry>,
    pub toolchains: Vec<ToolchainEntry>,
    pub compilers: SystemListing,
    pub tools: SystemListing,
    pub scripts: SystemListing,
    pub debuggers: SystemListing,
}

impl CatalogBundle {
    pub fn fetch(fetcher: &dyn Fetch) -> Result<Self> {
        let payload = fetcher
            .fetch(CATALOG_MANIFEST_URL)
            .map_err(|err| Error::CatalogFetch(anyhow!(err)))?;

        serde_json::from_slice(&payload)
            .map_err(|err| Error::CatalogFetch(anyhow!(err).context("Malformed catalog manifest")))
    }

    /// The three cache documents the rest of the tool reads.
    pub fn catalogs(&self) -> Catalogs {
        Catalogs {
            firmware: self.firmware.clone(),
            platforms: self.platforms.clone(),
            toolchains: self.toolchains.clone(),
        }
    }
}

/// OS name as the registry spells it.
pub fn host_system() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}
