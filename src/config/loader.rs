use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::types::AppConfig;

/// Discover and load the app config.
///
/// Priority:
/// 1. explicit path
/// 2. `$GH_BATCH_CONFIG` environment variable
/// 3. `$XDG_CONFIG_HOME/gh-batch/config.toml`
/// 4. `~/.config/gh-batch/config.toml`
///
/// No file at all yields the defaults.
pub fn load_config(explicit_path: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit_path {
        Some(path) => Some(expand_tilde(path)),
        None => find_config(),
    };

    let Some(path) = path else {
        tracing::debug!("config: no file found, using defaults");
        return Ok(AppConfig::default());
    };

    let contents =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML from {}", path.display()))?;
    tracing::debug!("config: loaded {}", path.display());
    Ok(config)
}

/// Write the config back, creating parent directories as needed.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    let path = expand_tilde(path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("serializing config")?;
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!("config: saved {}", path.display());
    Ok(())
}

/// Where a fresh config should be saved when none was loaded from disk.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GH_BATCH_CONFIG")
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("gh-batch/config.toml"));
    }
    dirs_fallback().map(|home| home.join(".config/gh-batch/config.toml"))
}

fn find_config() -> Option<PathBuf> {
    // $GH_BATCH_CONFIG
    if let Ok(path) = std::env::var("GH_BATCH_CONFIG") {
        let p = PathBuf::from(&path);
        if p.is_file() {
            return Some(p);
        }
    }

    // $XDG_CONFIG_HOME/gh-batch/config.toml
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let p = PathBuf::from(xdg).join("gh-batch/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // ~/.config/gh-batch/config.toml
    if let Some(home) = dirs_fallback() {
        let p = home.join(".config/gh-batch/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    None
}

fn dirs_fallback() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs_fallback()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
