//! `clive config`: configuration management commands.

use super::runtime;
use anyhow::Context;
use clive_config::AppConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub fn show(workspace: Option<PathBuf>, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let workspace = runtime::resolve_workspace(workspace)?;
    let config = runtime::load_config(config_path, &workspace)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}

pub fn init(workspace: Option<PathBuf>, force: bool) -> anyhow::Result<ExitCode> {
    let workspace = runtime::resolve_workspace(workspace)?;
    let path = write_default_config(&workspace, force)?;
    eprintln!("Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn write_default_config(workspace: &Path, force: bool) -> anyhow::Result<PathBuf> {
    let path = workspace.join(".clive").join("config.toml");
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(path)
}
