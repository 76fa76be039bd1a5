#![forbid(unsafe_code)]

//! Runtime settings shared by the `server` and `scrape` binaries.
//!
//! Values are looked up in this order: command-line override, process
//! environment, `.env` file, built-in default.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ASSETS_DIR: &str = "assets";
pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub youtube_api_key: Option<String>,
    pub youtube_api_base: String,
    pub host: String,
    pub port: u16,
    pub assets_dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub db_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub assets_dir: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = env_file_path(overrides.env_path.clone(), env_var_string);
    let file_vars = read_env_file(&env_path)?;
    build_settings_with_overrides(&file_vars, env_var_string, overrides)
}

fn env_file_path(
    override_path: Option<PathBuf>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    override_path
        .or_else(|| env_lookup("ENV_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH))
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<Settings> {
    let db_url = non_blank(overrides.db_url)
        .or_else(|| lookup_value("DB_URL", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("DB_URL not set"))?;
    let youtube_api_key = lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup);
    let youtube_api_base = lookup_value("YOUTUBE_API_BASE", file_vars, &env_lookup)
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_YOUTUBE_API_BASE.to_string());
    let host = non_blank(overrides.host)
        .or_else(|| lookup_value("HOST", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = overrides
        .port
        .or_else(|| {
            lookup_value("PORT", file_vars, &env_lookup).and_then(|value| value.parse().ok())
        })
        .unwrap_or(DEFAULT_PORT);
    let assets_dir = overrides
        .assets_dir
        .or_else(|| lookup_value("ASSETS_DIR", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR));

    Ok(Settings {
        db_path: db_path_from_url(&db_url),
        youtube_api_key,
        youtube_api_base,
        host,
        port,
        assets_dir,
    })
}

/// Accepts either a bare path or a `file:` URL and returns the database path.
pub fn db_path_from_url(url: &str) -> PathBuf {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("file://")
        .or_else(|| trimmed.strip_prefix("file:"))
        .unwrap_or(trimmed);
    PathBuf::from(path)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
