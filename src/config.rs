use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::ghost::{DEFAULT_GHOST_DELAY_MS, DEFAULT_GHOST_LOOKAHEAD};
use crate::model::AssistanceConfig;
use crate::session::SessionSettings;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_assistance: AssistanceConfig,
    pub ghost_delay_ms: u64,
    pub ghost_lookahead: usize,
    pub tick_rate_ms: u64,
    pub gemini_model: String,
    pub gemini_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_assistance: AssistanceConfig::default(),
            ghost_delay_ms: DEFAULT_GHOST_DELAY_MS,
            ghost_lookahead: DEFAULT_GHOST_LOOKAHEAD,
            tick_rate_ms: 100,
            gemini_model: "gemini-2.5-flash-lite".to_string(),
            gemini_api_key: None,
        }
    }
}

impl Config {
    /// Session settings for one run, with assistance chosen at setup time.
    pub fn session_settings(&self, assistance: AssistanceConfig) -> SessionSettings {
        SessionSettings {
            assistance,
            ghost_delay_ms: self.ghost_delay_ms,
            ghost_lookahead: self.ghost_lookahead,
        }
    }

    /// The environment wins over the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.gemini_api_key.clone())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("verbatim_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable config"),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
