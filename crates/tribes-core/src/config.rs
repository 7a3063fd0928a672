//! Match configuration, loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported player count {0} (expected 2-4)")]
    PlayerCount(u32),
    #[error("max_turns must be at least 1")]
    ZeroTurns,
}

/// Settings fixed for the lifetime of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seats, 2 to 4. Also picks the map size.
    #[serde(default = "default_num_players")]
    pub num_players: u32,

    /// The match ends by score once the turn counter passes this.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Seeds the match RNG (map, combat, ruins).
    pub seed: u64,

    #[serde(default = "default_starting_stars")]
    pub starting_stars: i32,
}

fn default_num_players() -> u32 {
    2
}
fn default_max_turns() -> u32 {
    30
}
fn default_starting_stars() -> i32 {
    5
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_players: default_num_players(),
            max_turns: default_max_turns(),
            seed: 0,
            starting_stars: default_starting_stars(),
        }
    }
}

impl GameConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=4).contains(&self.num_players) {
            return Err(ConfigError::PlayerCount(self.num_players));
        }
        if self.max_turns == 0 {
            return Err(ConfigError::ZeroTurns);
        }
        Ok(())
    }
}
