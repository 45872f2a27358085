use crate::{
    catalog::Catalogs,
    error::{Error, Result},
    installer::Installer,
    paths::Paths,
};

/// The single gate in front of every build or configure operation: validate
/// that a device platform and a deviceOS version are mutually compatible,
/// and make sure the firmware is present on disk.
///
/// The three catalog checks are all mandatory; their order only matters for
/// error-message specificity. None of them touches the network. Only when
/// everything checks out and the firmware directory is absent is the
/// installer asked for a side install (no manifest bump).
pub fn ensure_compatible(
    catalogs: &Catalogs,
    paths: &Paths,
    installer: &Installer,
    platform: &str,
    version: &str,
) -> Result<()> {
    let platform_id = catalogs
        .platform_id(platform)
        .ok_or_else(|| Error::UnknownPlatform(platform.to_owned()))?;

    let firmware = catalogs
        .firmware(version)
        .ok_or_else(|| Error::UnknownFirmwareVersion(version.to_owned()))?;

    let supported = catalogs
        .supported_platforms(version)
        .ok_or_else(|| Error::UnknownFirmwareVersion(version.to_owned()))?;

    if !supported.contains(&platform_id) {
        return Err(Error::PlatformNotSupported {
            platform: platform.to_owned(),
            version: version.to_owned(),
        });
    }

    if paths.firmware_dir(version).is_dir() {
        return Ok(());
    }

    installer.install(&firmware.into(), None)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{
        catalog::tests::fixture,
        fetch::{Fetch, FetchError},
        installer::tests::{tarball, CannedFetcher},
    };

    use super::*;

    /// Proves a code path never reaches the network.
    struct UnreachableFetcher;

    impl Fetch for UnreachableFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            panic!("unexpected fetch of {url}");
        }
    }

    #[test]
    fn compatible_pair_with_local_firmware_succeeds_offline() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());
        let catalogs = fixture();

        fs::create_dir_all(paths.firmware_dir("1.5.2")).unwrap();

        let installer = Installer::new(&paths, &UnreachableFetcher);

        ensure_compatible(&catalogs, &paths, &installer, "argon", "1.5.2").unwrap();
    }

    #[test]
    fn unknown_platform_fails_without_touching_the_installer() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());
        let catalogs = fixture();

        let installer = Installer::new(&paths, &UnreachableFetcher);

        let err =
            ensure_compatible(&catalogs, &paths, &installer, "bogus-device", "1.5.2").unwrap_err();

        assert!(matches!(
            err,
            Error::UnknownPlatform(platform) if platform == "bogus-device"
        ));
    }

    #[test]
    fn unknown_firmware_version_fails() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());
        let catalogs = fixture();

        let installer = Installer::new(&paths, &UnreachableFetcher);

        let err = ensure_compatible(&catalogs, &paths, &installer, "argon", "9.9.9").unwrap_err();

        assert!(matches!(
            err,
            Error::UnknownFirmwareVersion(version) if version == "9.9.9"
        ));
    }

    #[test]
    fn unsupported_platform_for_version_fails() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());
        let catalogs = fixture();

        let installer = Installer::new(&paths, &UnreachableFetcher);

        // 1.4.4 only supports the photon in the fixture
        let err = ensure_compatible(&catalogs, &paths, &installer, "argon", "1.4.4").unwrap_err();

        assert!(matches!(err, Error::PlatformNotSupported { .. }));
    }

    #[test]
    fn missing_firmware_is_side_installed() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());
        let catalogs = fixture();

        let fetcher = CannedFetcher::new([(
            "https://binaries.example.com/device-os/v1.5.2.tar.gz".to_owned(),
            tarball("device-os-1.5.2"),
        )]);
        let installer = Installer::new(&paths, &fetcher);

        ensure_compatible(&catalogs, &paths, &installer, "boron", "1.5.2").unwrap();

        assert!(paths.firmware_dir("1.5.2").is_dir());
        assert!(!paths.manifest_file().exists());
    }
}
