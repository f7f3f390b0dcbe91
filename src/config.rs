use atlas_map::{AtlasConfig, AtlasDb, DbError, InvalidConfig};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub map: AtlasConfig,
    /// Dirty datasets are saved every `save_interval` ticks. Zero disables automatic saving.
    pub save_interval: u32,
    /// Where the database lives. A temporary database is used when absent.
    pub db_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map: AtlasConfig::default(),
            save_interval: 200,
            db_path: None,
        }
    }
}

impl Config {
    pub fn read_file(path: &str) -> Result<Self, ConfigError> {
        let reader = std::fs::File::open(path).map_err(ConfigError::Io)?;
        let config: Self = ron::de::from_reader(reader).map_err(ConfigError::Parse)?;
        config.map.validate().map_err(ConfigError::Invalid)?;

        Ok(config)
    }

    pub fn open_db(&self) -> Result<AtlasDb, DbError> {
        match self.db_path.as_deref() {
            Some(path) => AtlasDb::open_path(path),
            None => AtlasDb::open_temporary(),
        }
    }

    /// True on the ticks where dirty datasets should be saved.
    pub fn is_save_due(&self, tick: u64) -> bool {
        self.save_interval != 0 && tick % u64::from(self.save_interval) == 0
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(ron::Error),
    Invalid(InvalidConfig),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "can't read config: {}", e),
            ConfigError::Parse(e) => write!(f, "can't parse config: {}", e),
            ConfigError::Invalid(e) => write!(f, "invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(e) => Some(e),
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_keeps_defaults() {
        let config: Config =
            ron::de::from_str("(map: (look_radius: 3), save_interval: 0)").unwrap();

        assert_eq!(config.map.look_radius, 3);
        assert_eq!(config.map.update_interval, 20);
        assert_eq!(config.save_interval, 0);
        assert_eq!(config.db_path, None);
        assert!(!config.is_save_due(200));
        assert!(Config::default().is_save_due(400));
    }

    #[test]
    fn read_file_rejects_oversized_region_shift() {
        let path = std::env::temp_dir().join(format!("atlas-config-{}.ron", std::process::id()));
        std::fs::write(&path, "(map: (region_shift: 32))").unwrap();

        let result = Config::read_file(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        match result {
            Err(ConfigError::Invalid(InvalidConfig::RegionShift(32))) => {}
            other => panic!("expected an invalid region shift, got {:?}", other),
        }
    }
}
