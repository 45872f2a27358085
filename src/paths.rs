use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::{error::Result, manifest::DEVICE_OS};

/// Every filesystem location the tool touches, derived once from a single
/// root and passed explicitly into the components that need it. Tests point
/// this at a temporary directory instead of the user's home.
#[derive(Debug, Clone)]
pub struct Paths {
    /// `~/.particle/toolchains` — one subdirectory per dependency category,
    /// one subdirectory per installed version below that.
    pub toolchain_dir: PathBuf,
    /// `~/.neopo` — the tool's own state.
    pub neopo_dir: PathBuf,
    /// Catalog and manifest JSON documents.
    pub cache_dir: PathBuf,
    pub scripts_dir: PathBuf,
    /// Editor config templates seeded into projects on first configure.
    pub vscode_dir: PathBuf,
    pub particle_cli: PathBuf,
}

impl Paths {
    pub fn from_home(home: &Path) -> Self {
        let neopo_dir = home.join(".neopo");

        let particle_cli = if cfg!(windows) {
            neopo_dir.join("particle.exe")
        } else {
            neopo_dir.join("particle")
        };

        Self {
            toolchain_dir: home.join(".particle").join("toolchains"),
            cache_dir: neopo_dir.join("cache"),
            scripts_dir: neopo_dir.join("scripts"),
            vscode_dir: neopo_dir.join("vscode"),
            particle_cli,
            neopo_dir,
        }
    }

    pub fn detect() -> Result<Self> {
        let home = dirs::home_dir().context("Failed to get path to the user's home directory")?;

        Ok(Self::from_home(&home))
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.cache_dir.join("manifest.json")
    }

    pub fn firmware_file(&self) -> PathBuf {
        self.cache_dir.join("firmware.json")
    }

    pub fn platforms_file(&self) -> PathBuf {
        self.cache_dir.join("platforms.json")
    }

    pub fn toolchains_file(&self) -> PathBuf {
        self.cache_dir.join("toolchains.json")
    }

    pub fn vscode_launch_template(&self) -> PathBuf {
        self.vscode_dir.join("launch.json")
    }

    pub fn vscode_settings_template(&self) -> PathBuf {
        self.vscode_dir.join("settings.json")
    }

    pub fn dependency_dir(&self, name: &str, version: &str) -> PathBuf {
        self.toolchain_dir.join(name).join(version)
    }

    pub fn firmware_dir(&self, version: &str) -> PathBuf {
        self.dependency_dir(DEVICE_OS, version)
    }

    /// Directory holding the actual firmware sources for a version.
    ///
    /// Archives from the binary mirror extract flat, but source archives
    /// carry a `device-os-{v}` (GitHub) or `firmware-{v}` (legacy) root
    /// directory that the build needs to point at instead.
    pub fn firmware_source_dir(&self, version: &str) -> PathBuf {
        let base = self.firmware_dir(version);

        for nested in [format!("device-os-{version}"), format!("firmware-{version}")] {
            let candidate = base.join(nested);

            if candidate.is_dir() {
                return candidate;
            }
        }

        base
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn firmware_source_dir_prefers_nested_archive_root() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());

        let base = paths.firmware_dir("1.5.2");

        // Flat extraction: the version directory itself
        fs::create_dir_all(&base).unwrap();
        assert_eq!(paths.firmware_source_dir("1.5.2"), base);

        // Legacy source archive root
        fs::create_dir_all(base.join("firmware-1.5.2")).unwrap();
        assert_eq!(
            paths.firmware_source_dir("1.5.2"),
            base.join("firmware-1.5.2")
        );

        // GitHub source archive root wins over the legacy one
        fs::create_dir_all(base.join("device-os-1.5.2")).unwrap();
        assert_eq!(
            paths.firmware_source_dir("1.5.2"),
            base.join("device-os-1.5.2")
        );
    }
}
