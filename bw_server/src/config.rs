//! Server configuration (§4.11, §6, §7). Grounded on `bb_server::config`'s
//! load-or-default shape, but rendered as the JSON document §6 specifies
//! instead of the teacher's TOML/derive-macro config, since that's the wire
//! contract this protocol promises operators.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read { path: String, source: std::io::Error },
  #[error("failed to write {path}: {source}")]
  Write { path: String, source: std::io::Error },
  #[error("{path} is not valid config json: {source}")]
  Parse { path: String, source: serde_json::Error },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
  pub general: GeneralConfig,
  pub net:     NetConfig,
  pub worlds:  WorldsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
  pub motd:        String,
  #[serde(rename = "max-players")]
  pub max_players: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetConfig {
  pub port:        u16,
  pub encryption:  bool,
  pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressionConfig {
  pub threshold: usize,
  pub level:     u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldsConfig {
  #[serde(rename = "main-world")]
  pub main_world: String,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      general: GeneralConfig { motd: "A block-world server".into(), max_players: 20 },
      net: NetConfig {
        port:        25565,
        encryption:  true,
        compression: CompressionConfig { threshold: 256, level: 6 },
      },
      worlds: WorldsConfig { main_world: "world".into() },
    }
  }
}

impl Config {
  /// Loads `path`, writing (and returning) [`Config::default`] if the file
  /// is missing. A structurally invalid file is a fatal startup error (§7).
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
      let default = Config::default();
      default.save(path)?;
      info!("no config found at {}, writing defaults", path.display());
      return Ok(default);
    }
    let text = fs::read_to_string(path)
      .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    serde_json::from_str(&text)
      .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(self).unwrap();
    fs::write(path, text).map_err(|source| ConfigError::Write { path: path.display().to_string(), source })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn default_matches_schema_shape() {
    let cfg = Config::default();
    let json = serde_json::to_value(&cfg).unwrap();
    assert!(json["general"]["motd"].is_string());
    assert!(json["net"]["compression"]["threshold"].is_number());
    assert_eq!(json["worlds"]["main-world"], "world");
  }

  #[test]
  fn roundtrips_through_json() {
    let cfg = Config::default();
    let text = serde_json::to_string(&cfg).unwrap();
    let back: Config = serde_json::from_str(&text).unwrap();
    assert_eq!(cfg, back);
  }

  #[test]
  fn load_writes_default_when_missing() {
    let dir = std::env::temp_dir().join(format!("bw_config_test_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    let _ = fs::remove_file(&path);
    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg, Config::default());
    assert!(path.exists());
    fs::remove_file(&path).unwrap();
  }
}
