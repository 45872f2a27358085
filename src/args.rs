use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::build::Verbosity;

#[derive(Parser)]
#[clap(version, about, author)]
pub struct Args {
    #[clap(short, long, help = "Level of verbosity", default_value = "info")]
    pub verbosity: LevelFilter,

    #[clap(subcommand)]
    pub action: Action,
}

/// Options shared by every command that runs a Makefile target.
#[derive(clap::Args)]
pub struct BuildOpts {
    #[clap(help = "Path to the project (defaults to the current directory)")]
    pub project: Option<PathBuf>,

    #[clap(short = 'V', long, help = "Show the full build tool output")]
    pub verbose: bool,

    #[clap(
        short,
        long,
        conflicts_with = "verbose",
        help = "Suppress the build tool output"
    )]
    pub quiet: bool,
}

impl BuildOpts {
    pub fn verbosity(&self) -> Verbosity {
        if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Action {
    #[clap(about = "Install the dependencies and fetch the catalogs")]
    Install {},

    #[clap(about = "Update dependencies to their latest compatible versions")]
    Update {},

    #[clap(about = "Download a specific deviceOS version")]
    Get {
        #[clap(help = "deviceOS version to download")]
        version: String,
    },

    #[clap(about = "Download a deviceOS version not listed in the catalog (experimental)")]
    DownloadUnlisted {
        #[clap(help = "deviceOS version to look for")]
        version: String,
    },

    #[clap(about = "Set the platform and deviceOS version of a project")]
    Configure {
        #[clap(help = "Target platform name (e.g. argon)")]
        platform: String,

        #[clap(help = "deviceOS version")]
        version: String,

        #[clap(help = "Path to the project (defaults to the current directory)")]
        project: Option<PathBuf>,
    },

    #[clap(about = "Compile the application firmware of a project", alias = "build")]
    Compile {
        #[clap(flatten)]
        opts: BuildOpts,
    },

    #[clap(about = "Compile and flash the application firmware of a project")]
    Flash {
        #[clap(flatten)]
        opts: BuildOpts,
    },

    #[clap(about = "Flash the full firmware (deviceOS and application) of a project")]
    FlashAll {
        #[clap(flatten)]
        opts: BuildOpts,
    },

    #[clap(about = "Clean the application firmware of a project")]
    Clean {
        #[clap(flatten)]
        opts: BuildOpts,
    },

    #[clap(about = "Run an arbitrary Makefile target for a project")]
    Run {
        #[clap(help = "Makefile target to run (omit to show the available targets)")]
        target: Option<String>,

        #[clap(flatten)]
        opts: BuildOpts,
    },

    #[clap(about = "List the available deviceOS versions and platforms")]
    Versions {},

    #[clap(about = "List the supported platform names")]
    Platforms {},

    #[clap(about = "List the valid projects in the current directory")]
    Projects {},

    #[clap(about = "List the available deviceOS versions on one line", hide = true)]
    ListVersions {},

    #[clap(about = "List the Makefile targets of the installed buildscripts", hide = true)]
    Targets {},

    #[clap(about = "Remove all installed dependencies and cached data")]
    Uninstall {
        #[clap(short, long, help = "Don't ask for confirmation")]
        yes: bool,
    },
}
