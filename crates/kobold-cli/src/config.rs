//! Configuration Vault – reads/writes `~/.kobold/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kobold_middleware::VendorHosts;
use kobold_middleware::companion_adapter::COMPANION_URL;
use kobold_middleware::orbital_adapter::{BEEHIVE_URL, ORBITAL_URL};
use kobold_types::Dialect;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Persisted user configuration stored in `~/.kobold/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Vendor account token, sent with every request.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// Optional features to hide: `nogolines`, `spot`, `findme`,
    /// `emptydustbin`.
    #[serde(default)]
    pub disabled: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Cleaning-mode selector value that means "eco".  The other of 0/1
    /// means "auto".
    #[serde(default = "default_eco_mode_value")]
    pub eco_mode_value: u8,

    /// Dialects tried at discovery, in priority order.
    #[serde(default = "default_dialects")]
    pub dialects: Vec<Dialect>,

    /// The host exposes a native cleaning-mode selector.
    #[serde(default)]
    pub native_cleaning_mode: bool,

    /// The host exposes a native room selector.
    #[serde(default)]
    pub native_room_selector: bool,

    #[serde(default = "default_beehive_url")]
    pub beehive_url: String,

    #[serde(default = "default_orbital_url")]
    pub orbital_url: String,

    #[serde(default = "default_companion_url")]
    pub companion_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "token",
                if self.token.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("disabled", &self.disabled)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("eco_mode_value", &self.eco_mode_value)
            .field("dialects", &self.dialects)
            .field("native_cleaning_mode", &self.native_cleaning_mode)
            .field("native_room_selector", &self.native_room_selector)
            .field("beehive_url", &self.beehive_url)
            .field("orbital_url", &self.orbital_url)
            .field("companion_url", &self.companion_url)
            .finish()
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}
fn default_eco_mode_value() -> u8 {
    1
}
fn default_dialects() -> Vec<Dialect> {
    vec![Dialect::Orbital, Dialect::Companion]
}
fn default_beehive_url() -> String {
    BEEHIVE_URL.to_string()
}
fn default_orbital_url() -> String {
    ORBITAL_URL.to_string()
}
fn default_companion_url() -> String {
    COMPANION_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            disabled: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
            eco_mode_value: default_eco_mode_value(),
            dialects: default_dialects(),
            native_cleaning_mode: false,
            native_room_selector: false,
            beehive_url: default_beehive_url(),
            orbital_url: default_orbital_url(),
            companion_url: default_companion_url(),
        }
    }
}

impl Config {
    /// Whether the optional feature `name` was suppressed.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d.trim().eq_ignore_ascii_case(name))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn hosts(&self) -> VendorHosts {
        VendorHosts {
            beehive: self.beehive_url.clone(),
            orbital: self.orbital_url.clone(),
            companion: self.companion_url.clone(),
        }
    }
}

/// Return the path to `~/.kobold/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".kobold").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ConfigError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: Config = toml::from_str(&raw)?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `KOBOLD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `KOBOLD_TOKEN` | `token` |
/// | `KOBOLD_DISABLED` | `disabled` (comma separated) |
/// | `KOBOLD_TIMEOUT_SECS` | `request_timeout_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(mut token) = lookup("KOBOLD_TOKEN") {
        cfg.token.zeroize();
        cfg.token = token.trim().to_string();
        token.zeroize();
    }
    if let Some(v) = lookup("KOBOLD_DISABLED") {
        cfg.disabled = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
    }
    if let Some(v) = lookup("KOBOLD_TIMEOUT_SECS")
        && let Ok(secs) = v.trim().parse::<u64>()
    {
        cfg.request_timeout_secs = secs;
    }
}

/// Save the config to disk, creating `~/.kobold/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(write_err)?;
        }
    }
    let raw = toml::to_string_pretty(cfg)?;
    // Owner read/write only (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
