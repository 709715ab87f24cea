// rfctl - RF profile export and bulk deployment for dashboard-managed wireless networks
// Copyright (C) 2026 rfctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";
pub const API_KEY_ENV: &str = "RFCTL_API_KEY";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error(
        "API key is required; set {API_KEY_ENV} or store one with `rfctl configure --key <key>`"
    )]
    MissingApiKey,
}

#[derive(Debug)]
pub struct EffectiveConfig {
    pub api_key: String,
    pub base_url: String,
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".rfctl.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var("RFCTL_CONFIG_DIR") {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("rfctl").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

pub fn resolve(
    cwd: &Path,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
) -> Result<EffectiveConfig> {
    let mut merged = load(cwd)?;

    if let Ok(key) = env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            merged.api_key = Some(key);
        }
    }
    if let Some(key) = api_key_override {
        merged.api_key = Some(key);
    }
    if let Some(url) = base_url_override {
        merged.base_url = Some(url);
    }

    let api_key = merged
        .api_key
        .ok_or(ConfigError::MissingApiKey)
        .map(|k| k.trim().to_string())?;

    let base_url = merged
        .base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    Ok(EffectiveConfig { api_key, base_url })
}

// Same resolution order, but a missing key falls back to a masked prompt
// instead of an error. Used by the interactive subcommands.
pub fn resolve_or_prompt(
    cwd: &Path,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
) -> Result<EffectiveConfig> {
    match resolve(cwd, api_key_override, base_url_override.clone()) {
        Ok(effective) => Ok(effective),
        Err(err) if err.is::<ConfigError>() => {
            let key = rpassword::prompt_password("Dashboard API key: ")
                .context("reading API key from terminal")?;
            resolve(cwd, Some(key), base_url_override)
        }
        Err(err) => Err(err),
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

fn merge(user: Config, local: Config) -> Config {
    Config {
        api_key: local.api_key.or(user.api_key),
        base_url: local.base_url.or(user.base_url),
    }
}
