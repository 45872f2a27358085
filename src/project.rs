use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use log::info;
use serde_json::{Map, Value};

use crate::{
    catalog::Catalogs, error::Result, installer::Installer, paths::Paths,
    resolver::ensure_compatible,
};

pub const PROPERTIES_FILE: &str = "project.properties";

const PLATFORM_KEY: &str = "particle.targetPlatform";
const VERSION_KEY: &str = "particle.firmwareVersion";

fn settings_file(project: &Path) -> PathBuf {
    project.join(".vscode").join("settings.json")
}

#[derive(Debug, Clone)]
pub struct ProjectSettings {
    pub platform: String,
    pub firmware_version: String,
}

/// Point a project at a (platform, deviceOS version) pair.
///
/// Validates the pair through the compatibility gate first, then seeds the
/// project's editor config from the cached Workbench templates on first
/// configure and rewrites the two target keys in its settings file.
pub fn configure(
    project: &Path,
    platform: &str,
    version: &str,
    catalogs: &Catalogs,
    paths: &Paths,
    installer: &Installer,
) -> Result<()> {
    ensure_compatible(catalogs, paths, installer, platform, version)?;

    let settings = settings_file(project);

    if !settings.is_file() {
        let vscode_dir = project.join(".vscode");

        fs::create_dir_all(&vscode_dir).with_context(|| {
            format!("Failed to create settings directory at: {}", vscode_dir.display())
        })?;

        let launch_template = paths.vscode_launch_template();

        if launch_template.is_file() {
            fs::copy(&launch_template, vscode_dir.join("launch.json"))
                .context("Failed to copy the launch template into the project")?;
        }

        let settings_template = paths.vscode_settings_template();

        if settings_template.is_file() {
            fs::copy(&settings_template, &settings)
                .context("Failed to copy the settings template into the project")?;
        } else {
            // No cached template (bootstrap skipped); start from an empty
            // settings object
            fs::write(&settings, "{}")
                .context("Failed to create the project settings file")?;
        }
    }

    write_settings(project, platform, version)?;

    info!("Configured project {}:", project.display());
    info!("\t{PLATFORM_KEY}: {platform}");
    info!("\t{VERSION_KEY}: {version}");

    Ok(())
}

fn read_settings_object(path: &Path) -> Result<Map<String, Value>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read project settings at: {}", path.display()))?;

    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse project settings at: {}", path.display()))?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("Project settings at {} are not a JSON object", path.display()).into()),
    }
}

fn write_settings(project: &Path, platform: &str, version: &str) -> Result<()> {
    let path = settings_file(project);

    let mut settings = read_settings_object(&path)?;

    settings.insert(PLATFORM_KEY.to_owned(), Value::String(platform.to_owned()));
    settings.insert(VERSION_KEY.to_owned(), Value::String(version.to_owned()));

    let raw = serde_json::to_string_pretty(&Value::Object(settings))
        .context("Failed to serialize project settings")?;

    fs::write(&path, raw)
        .with_context(|| format!("Failed to write project settings at: {}", path.display()))?;

    Ok(())
}

/// Read back the configured (platform, version) pair for a project,
/// distinguishing "not a project" from "project not configured yet".
pub fn settings(project: &Path) -> Result<ProjectSettings> {
    let path = settings_file(project);

    if !path.is_file() {
        if project.join(PROPERTIES_FILE).is_file() {
            return Err(anyhow!(
                "Project not configured! Use: neopo configure <platform> <version> [project]"
            )
            .into());
        }

        return Err(anyhow!("Invalid project: {}", project.display()).into());
    }

    let settings = read_settings_object(&path)?;

    let get = |key: &str| -> Result<String> {
        settings
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("Project settings are missing the {key} key").into())
    };

    Ok(ProjectSettings {
        platform: get(PLATFORM_KEY)?,
        firmware_version: get(VERSION_KEY)?,
    })
}
