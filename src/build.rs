use std::{
    env,
    fs,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use anyhow::Context;

use crate::{
    error::Result,
    manifest::{BuildVersions, ManifestStore, BUILDSCRIPTS, BUILDTOOLS, GCC_ARM},
    paths::Paths,
    project,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// How a project command maps onto a buildscripts Makefile target.
pub const COMPILE_TARGET: &str = "compile-user";
pub const FLASH_TARGET: &str = "flash-user";
pub const FLASH_ALL_TARGET: &str = "flash-all";
pub const CLEAN_TARGET: &str = "clean-user";

fn add_to_path(current: &str, dir: &Path) -> String {
    if cfg!(windows) {
        format!("{};{}", dir.display(), current)
    } else {
        format!("{}:{}", current, dir.display())
    }
}

fn particle_cli_arg(paths: &Paths) -> String {
    let particle = paths.particle_cli.to_string_lossy().into_owned();

    if cfg!(windows) {
        // The buildscripts run under cygwin on Windows
        particle.replace("C:\\", "/cygdrive/c/").replace('\\', "/")
    } else {
        particle
    }
}

fn makefile_path(paths: &Paths, versions: &BuildVersions) -> PathBuf {
    paths
        .dependency_dir(BUILDSCRIPTS, &versions.scripts)
        .join("Makefile")
}

/// Base `make` invocation with the toolchain environment assembled: the
/// pinned compiler and build tools on `PATH`, and the vendor CLI path
/// handed to the buildscripts.
fn make_command(paths: &Paths, versions: &BuildVersions, verbosity: Verbosity) -> Command {
    let mut path_var = env::var("PATH").unwrap_or_default();

    path_var = add_to_path(
        &path_var,
        &paths.dependency_dir(GCC_ARM, &versions.compiler).join("bin"),
    );

    let tools_dir = paths.dependency_dir(BUILDTOOLS, &versions.tools);
    path_var = add_to_path(
        &path_var,
        &if cfg!(windows) {
            tools_dir.join("bin")
        } else {
            tools_dir
        },
    );

    let mut cmd = Command::new("make");

    cmd.arg(if verbosity == Verbosity::Verbose {
        "-f"
    } else {
        "-sf"
    })
    .arg(makefile_path(paths, versions))
    .arg(format!("PARTICLE_CLI_PATH={}", particle_cli_arg(paths)))
    .env("PATH", path_var);

    if verbosity == Verbosity::Quiet {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }

    cmd
}

/// Launch the external build tool for a project, blocking until it exits.
/// The child's exit status is handed back for the process exit code; there
/// is no timeout and no cancellation.
pub fn launch(
    paths: &Paths,
    project_path: &Path,
    target: &str,
    verbosity: Verbosity,
) -> Result<ExitStatus> {
    let manifest = ManifestStore::open(paths.manifest_file())?;
    let versions = manifest.build_versions()?;

    let settings = project::settings(project_path)?;

    // The project may pin an older firmware than the manifest's current one
    let firmware_dir = paths.firmware_source_dir(&settings.firmware_version);

    let mut cmd = make_command(paths, &versions, verbosity);

    cmd.arg(format!("APPDIR={}", project_path.display()))
        .arg(format!("DEVICE_OS_PATH={}", firmware_dir.display()))
        .arg(format!("PLATFORM={}", settings.platform))
        .arg(target);

    let status = cmd
        .status()
        .context("Failed to launch `make` (is it installed?)")?;

    Ok(status)
}

/// Run the buildscripts' own `help` target, without needing a project.
pub fn launch_help(paths: &Paths) -> Result<ExitStatus> {
    let manifest = ManifestStore::open(paths.manifest_file())?;
    let versions = manifest.build_versions()?;

    let mut cmd = make_command(paths, &versions, Verbosity::Normal);
    cmd.arg("help");

    let status = cmd
        .status()
        .context("Failed to launch `make` (is it installed?)")?;

    Ok(status)
}

/// Targets advertised by the installed buildscripts Makefile (its first
/// `.PHONY:` line).
pub fn makefile_targets(paths: &Paths) -> Result<Vec<String>> {
    let manifest = ManifestStore::open(paths.manifest_file())?;
    let versions = manifest.build_versions()?;

    let makefile = makefile_path(paths, &versions);

    let contents = fs::read_to_string(&makefile)
        .with_context(|| format!("Failed to read buildscripts Makefile at: {}", makefile.display()))?;

    let targets = contents
        .lines()
        .find_map(|line| line.strip_prefix(".PHONY: "))
        .map(|targets| {
            targets
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use crate::manifest::DEVICE_OS;

    use super::*;

    fn installed_versions(paths: &Paths) -> BuildVersions {
        let mut manifest = ManifestStore::open(paths.manifest_file()).unwrap();
        manifest
            .update(|m| {
                m.set(GCC_ARM, "5.3.1");
                m.set(BUILDSCRIPTS, "1.9.2");
                m.set(BUILDTOOLS, "1.1.1");
                m.set(DEVICE_OS, "1.5.2");
            })
            .unwrap();

        manifest.build_versions().unwrap()
    }

    #[test]
    fn makefile_targets_come_from_the_phony_line() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());

        let versions = installed_versions(&paths);

        let scripts_dir = paths.dependency_dir(BUILDSCRIPTS, &versions.scripts);
        fs::create_dir_all(&scripts_dir).unwrap();
        fs::write(
            scripts_dir.join("Makefile"),
            ".PHONY: compile-user flash-user clean-user help\n\nhelp:\n\t@echo targets\n",
        )
        .unwrap();

        assert_eq!(
            makefile_targets(&paths).unwrap(),
            vec!["compile-user", "flash-user", "clean-user", "help"]
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn path_entries_are_appended_on_unix() {
        assert_eq!(
            add_to_path("/usr/bin", Path::new("/opt/gcc/bin")),
            "/usr/bin:/opt/gcc/bin"
        );
    }

    #[test]
    fn make_invocation_pins_the_recorded_toolchain() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(home.path());

        let versions = installed_versions(&paths);

        let cmd = make_command(&paths, &versions, Verbosity::Normal);

        let args = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        assert_eq!(args[0], "-sf");
        assert!(args[1].ends_with("buildscripts/1.9.2/Makefile"));
        assert!(args[2].starts_with("PARTICLE_CLI_PATH="));

        let path_var = cmd
            .get_envs()
            .find_map(|(key, value)| (key == std::ffi::OsStr::new("PATH")).then_some(value))
            .flatten()
            .unwrap()
            .to_string_lossy()
            .into_owned();

        assert!(path_var.contains("gcc-arm/5.3.1/bin"));
        assert!(path_var.contains("buildtools/1.1.1"));
    }
}
