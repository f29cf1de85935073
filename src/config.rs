use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::SqliteStorage;
use crate::productive::fetch::DEFAULT_PAGE_SIZE;

const DEFAULT_API_URL: &str = "https://api.productive.io/api/v2/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  /// Person that time entries are booked for
  pub person_id: Option<String>,
  pub sync: SyncConfig,
  pub read: ReadConfig,
  /// Cache database (default: $XDG_DATA_HOME/prodsync/cache.db)
  pub cache_path: Option<PathBuf>,
  /// Log directory (default: $XDG_DATA_HOME/prodsync/logs)
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub url: String,
  pub org_id: String,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_API_URL.to_string(),
      org_id: String::new(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Minimum time between two refreshes of the same resource kind
  pub update_interval_secs: u64,
  pub page_size: u32,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      update_interval_secs: 60,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
  pub max_wait_secs: u64,
  pub poll_interval_ms: u64,
  pub max_polls: u32,
}

impl Default for ReadConfig {
  fn default() -> Self {
    Self {
      max_wait_secs: 1000,
      poll_interval_ms: 1000,
      max_polls: 1000,
    }
  }
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./prodsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/prodsync/config.yaml
  ///
  /// Without a file, defaults plus environment are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("prodsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("prodsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Override file values with PRODUCTIVE_ORG_ID, PRODUCTIVE_PERSON_ID and
  /// UPDATE_INTERVAL.
  fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(org_id) = var("PRODUCTIVE_ORG_ID").filter(|v| !v.is_empty()) {
      self.api.org_id = org_id;
    }
    if let Some(person_id) = var("PRODUCTIVE_PERSON_ID").filter(|v| !v.is_empty()) {
      self.person_id = Some(person_id);
    }
    if let Some(interval) = var("UPDATE_INTERVAL").filter(|v| !v.is_empty()) {
      self.sync.update_interval_secs = interval
        .trim()
        .parse()
        .map_err(|_| eyre!("UPDATE_INTERVAL must be a number of seconds, got '{}'", interval))?;
    }
    Ok(())
  }

  /// Get the Productive API token from the environment.
  pub fn get_api_token() -> Result<String> {
    std::env::var("PRODUCTIVE_AUTH_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
      .ok_or_else(|| {
        eyre!("Productive API token not found. Set the PRODUCTIVE_AUTH_TOKEN environment variable.")
      })
  }

  pub fn require_org_id(&self) -> Result<&str> {
    if self.api.org_id.is_empty() {
      return Err(eyre!(
        "Productive organization id not set. Set api.org_id or PRODUCTIVE_ORG_ID."
      ));
    }
    Ok(&self.api.org_id)
  }

  pub fn require_person_id(&self) -> Result<&str> {
    self
      .person_id
      .as_deref()
      .ok_or_else(|| eyre!("Person id not set. Set person_id or PRODUCTIVE_PERSON_ID."))
  }

  pub fn update_interval(&self) -> Duration {
    Duration::from_secs(self.sync.update_interval_secs)
  }

  pub fn max_wait(&self) -> Duration {
    Duration::from_secs(self.read.max_wait_secs)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.read.poll_interval_ms.max(1))
  }

  pub fn cache_path(&self) -> Result<PathBuf> {
    self
      .cache_path
      .clone()
      .or_else(SqliteStorage::default_path)
      .ok_or_else(|| eyre!("Could not determine data directory"))
  }

  pub fn log_dir(&self) -> Result<PathBuf> {
    self
      .log_dir
      .clone()
      .or_else(|| {
        dirs::data_dir()
          .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
          .map(|dir| dir.join("prodsync").join("logs"))
      })
      .ok_or_else(|| eyre!("Could not determine data directory"))
  }
}
