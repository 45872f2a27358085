#![forbid(unsafe_code)]
#![forbid(unused_must_use)]

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser as _;
use colored::Colorize;
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use dialoguer::Confirm;
use log::{error, info, warn};

// Bundling a vendored version of OpenSSL to avoid cross-platform compilation problems
// And avoid requiring OpenSSL on the client machine
use openssl_sys as _;

use self::{
    args::{Action, Args, BuildOpts},
    catalog::Catalogs,
    fetch::HttpFetcher,
    installer::Installer,
    logger::Logger,
    paths::Paths,
};

mod args;
mod build;
mod catalog;
mod error;
mod fetch;
mod installer;
mod logger;
mod manifest;
mod paths;
mod project;
mod registry;
mod resolver;
mod update;

fn main() -> ExitCode {
    let Args { action, verbosity } = Args::parse();

    // Set up the logger
    Logger::new(verbosity).init().unwrap();

    match inner(action) {
        Ok(code) => code,

        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

fn project_or_cwd(project: Option<PathBuf>) -> Result<PathBuf> {
    match project {
        Some(path) => fs::canonicalize(&path)
            .with_context(|| format!("Invalid project path: {}", path.display())),
        None => env::current_dir().context("Failed to get the current directory"),
    }
}

fn run_target(paths: &Paths, target: &str, opts: BuildOpts) -> Result<ExitCode> {
    let project = project_or_cwd(opts.project.clone())?;

    let status = build::launch(paths, &project, target, opts.verbosity())?;

    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(code.clamp(1, 255) as u8),
        // Killed by a signal
        None => ExitCode::FAILURE,
    })
}

fn inner(action: Action) -> Result<ExitCode> {
    let paths = Paths::detect()?;

    match action {
        Action::Install {} => {
            let fetcher = HttpFetcher::new()?;
            update::install_or_update(true, &paths, &fetcher)?;
        }

        Action::Update {} => {
            let fetcher = HttpFetcher::new()?;
            update::install_or_update(false, &paths, &fetcher)?;
        }

        Action::Get { version } => {
            let catalogs = Catalogs::load(&paths)?;
            let fetcher = HttpFetcher::new()?;

            Installer::new(&paths, &fetcher).install_firmware(&catalogs, &version)?;
        }

        Action::DownloadUnlisted { version } => {
            let fetcher = HttpFetcher::new()?;

            Installer::new(&paths, &fetcher).install_unlisted(&version)?;
        }

        Action::Configure {
            platform,
            version,
            project,
        } => {
            let project = project_or_cwd(project)?;
            let catalogs = Catalogs::load(&paths)?;
            let fetcher = HttpFetcher::new()?;
            let installer = Installer::new(&paths, &fetcher);

            project::configure(&project, &platform, &version, &catalogs, &paths, &installer)?;
        }

        Action::Compile { opts } => return run_target(&paths, build::COMPILE_TARGET, opts),
        Action::Flash { opts } => return run_target(&paths, build::FLASH_TARGET, opts),
        Action::FlashAll { opts } => return run_target(&paths, build::FLASH_ALL_TARGET, opts),
        Action::Clean { opts } => return run_target(&paths, build::CLEAN_TARGET, opts),
        Action::Run { target, opts } => {
            return match target {
                Some(target) => run_target(&paths, &target, opts),
                None => {
                    let status = build::launch_help(&paths)?;

                    Ok(match status.success() {
                        true => ExitCode::SUCCESS,
                        false => ExitCode::FAILURE,
                    })
                }
            }
        }

        Action::Versions {} => {
            let catalogs = Catalogs::load(&paths)?;

            let mut table = Table::new();

            table
                // Disable borders
                .load_preset(presets::NOTHING)
                // Enable dynamic sizing for columns
                .set_content_arrangement(ContentArrangement::Dynamic)
                // Add header
                .set_header(["Version", "Devices"].into_iter().map(|header| {
                    Cell::new(header)
                        .add_attribute(Attribute::Bold)
                        .add_attribute(Attribute::Underlined)
                }));

            // Newest release first
            table.add_rows(catalogs.firmware.iter().rev().map(|entry| {
                let devices = catalogs
                    .supported_platforms(&entry.version)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|id| catalogs.platform_name(*id))
                    .collect::<Vec<_>>()
                    .join(", ");

                [
                    Cell::new(&entry.version).fg(Color::DarkCyan),
                    Cell::new(devices).fg(Color::Yellow),
                ]
            }));

            println!("{table}");

            info!("To configure a project use:");
            info!("\tneopo configure <platform> <version> [project]");
        }

        Action::Platforms {} => {
            let catalogs = Catalogs::load(&paths)?;

            let names = catalogs
                .platforms
                .iter()
                .map(|platform| platform.name.as_str())
                .collect::<Vec<_>>();

            println!("{}", names.join(" "));
        }

        Action::Projects {} => {
            let cwd = env::current_dir().context("Failed to get the current directory")?;

            let mut projects = vec![];

            for entry in
                fs::read_dir(&cwd).context("Failed to list the current directory")?
            {
                let path = entry?.path();

                if path.join(project::PROPERTIES_FILE).is_file() {
                    if let Some(name) = path.file_name() {
                        projects.push(name.to_string_lossy().into_owned());
                    }
                }
            }

            projects.sort();

            println!("{}", projects.join(" "));
        }

        Action::ListVersions {} => {
            let catalogs = Catalogs::load(&paths)?;

            let versions = catalogs
                .firmware
                .iter()
                .map(|entry| entry.version.as_str())
                .collect::<Vec<_>>();

            println!("{}", versions.join(" "));
        }

        Action::Targets {} => {
            for target in build::makefile_targets(&paths)? {
                println!("{target}");
            }
        }

        Action::Uninstall { yes } => {
            warn!(
                "This removes {} and {} along with every installed toolchain.",
                paths.neopo_dir.display().to_string().bright_magenta(),
                paths.toolchain_dir.display().to_string().bright_magenta()
            );

            if !yes
                && !Confirm::new()
                    .with_prompt("Do you want to continue?")
                    .default(false)
                    .interact()
                    .context("Failed to read the confirmation answer")?
            {
                return Ok(ExitCode::SUCCESS);
            }

            for dir in [&paths.toolchain_dir, &paths.neopo_dir] {
                remove_dir_if_present(dir)?;
            }

            info!("Uninstalled all dependencies and cached data.");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove directory: {}", dir.display()))?;
    }

    Ok(())
}
