use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sync::ReplayEndpoints;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Page origin requests are resolved against.
  pub origin: String,
  /// Name of the current cache generation; bumped by each build.
  pub cache_version: String,
  /// Fixed manifest of static asset URLs populated at install.
  pub static_assets: Vec<String>,
  /// Path prefix of dynamic API calls, never intercepted.
  pub api_prefix: String,
  pub endpoints: EndpointsConfig,
  pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
  pub orders: String,
  pub waste_reports: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
  /// Path probed to detect connectivity transitions.
  pub probe_path: String,
  pub probe_interval_secs: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:8000".to_string(),
      cache_version: "marketsync-v1".to_string(),
      static_assets: vec![
        "/".to_string(),
        "/index.html".to_string(),
        "/css/styles.css".to_string(),
        "/css/soft-ui.css".to_string(),
        "/js/config.js".to_string(),
        "/js/api.js".to_string(),
        "/js/auth.js".to_string(),
        "/js/ui.js".to_string(),
        "/js/main.js".to_string(),
        "/images/logo.png".to_string(),
        "/images/favicon.ico".to_string(),
      ],
      api_prefix: "/api/".to_string(),
      endpoints: EndpointsConfig::default(),
      connectivity: ConnectivityConfig::default(),
    }
  }
}

impl Default for EndpointsConfig {
  fn default() -> Self {
    Self {
      orders: "/api/orders/".to_string(),
      waste_reports: "/api/waste/".to_string(),
    }
  }
}

impl Default for ConnectivityConfig {
  fn default() -> Self {
    Self {
      probe_path: "/".to_string(),
      probe_interval_secs: 15,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./marketsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/marketsync/config.yaml
  ///
  /// Falls back to the built-in defaults when no file exists.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("marketsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("marketsync").join("config.yaml");
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

  pub fn replay_endpoints(&self) -> ReplayEndpoints {
    ReplayEndpoints {
      orders: self.endpoints.orders.clone(),
      waste_reports: self.endpoints.waste_reports.clone(),
    }
  }
}
