use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::output::TempNaming;

/// Browser session parameters (optional `[browser]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver `browserName`: "chrome", "firefox", "phantomjs", ...
    pub name: String,
    /// Ask the driver for a headless browser.
    pub headless: bool,
    /// Fixed browser User-Agent; a random desktop Chrome UA when unset.
    pub user_agent: Option<String>,
    /// Delay between current-URL polls while a page settles.
    pub settle_interval_ms: u64,
    /// Upper bound on current-URL polls after navigation.
    pub settle_max_polls: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            name: "chrome".to_string(),
            headless: true,
            user_agent: None,
            settle_interval_ms: 250,
            settle_max_polls: 8,
        }
    }
}

/// Transfer parameters (optional `[transfer]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub connect_timeout_secs: u64,
    /// Abort when the rate stays below this many bytes/s for `low_speed_time_secs`.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    pub max_redirections: u32,
    /// Fixed transfer User-Agent; rotated per session when unset.
    pub user_agent: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            max_redirections: 10,
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/pagegrab/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium, ...).
    pub webdriver_url: String,
    /// Temp naming for fresh downloads: "resumable" (default) or "unique".
    pub temp_naming: TempNaming,
    pub browser: BrowserConfig,
    pub transfer: TransferConfig,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:4444".to_string(),
            temp_naming: TempNaming::Resumable,
            browser: BrowserConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pagegrab")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GrabConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GrabConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: GrabConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
