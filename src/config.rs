use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which reverse-geocoding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderKind {
    /// OSM Nominatim over HTTP
    Nominatim,
    /// Built-in coordinate-range table, no network
    Offline,
    /// Geocoding disabled
    None,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub database_file: String,
    pub geocoder: GeocoderKind,
    pub geocoder_user_agent: String,
    pub geocoder_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_file: "data/device_database.json".to_string(),
            geocoder: GeocoderKind::Offline,
            geocoder_user_agent: "metaprobe".to_string(),
            geocoder_timeout_secs: 5,
        }
    }
}

impl Config {
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config = serde_yaml::from_str(&yaml)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Ok(config)
    }

    pub fn get_config_path(config_arg: &Option<PathBuf>) -> PathBuf {
        config_arg
            .clone()
            .unwrap_or_else(|| PathBuf::from("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database_file, "data/device_database.json");
        assert_eq!(config.geocoder, GeocoderKind::Offline);
        assert_eq!(config.geocoder_user_agent, "metaprobe");
        assert_eq!(config.geocoder_timeout_secs, 5);
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("config.yaml");

        let config = Config::default();
        config.save_to_file(&config_path)?;

        let loaded_config = Config::load_from_file(&config_path)?;

        assert_eq!(config.database_file, loaded_config.database_file);
        assert_eq!(config.geocoder, loaded_config.geocoder);
        assert_eq!(config.geocoder_user_agent, loaded_config.geocoder_user_agent);
        assert_eq!(config.geocoder_timeout_secs, loaded_config.geocoder_timeout_secs);

        Ok(())
    }

    #[test]
    fn test_geocoder_kind_round_trips_lowercase() -> Result<()> {
        let yaml = serde_yaml::to_string(&GeocoderKind::Nominatim)?;
        assert_eq!(yaml.trim(), "nominatim");
        let parsed: GeocoderKind = serde_yaml::from_str("offline")?;
        assert_eq!(parsed, GeocoderKind::Offline);
        Ok(())
    }
}
