use crate::error::MapError;
use crate::validate::ValidatorOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_tiles_dir() -> PathBuf {
    PathBuf::from("tiles")
}
fn default_rooms_dir() -> PathBuf {
    PathBuf::from("game-godot/data/rooms")
}
fn default_skip() -> Vec<String> {
    ["enemies.json", "options.json", "tuning.json"]
        .map(String::from)
        .to_vec()
}

/// Where the pipeline finds its documents.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Authoring `.tmx` files
    #[serde(default = "default_tiles_dir")]
    pub tiles_dir: PathBuf,
    /// Runtime `.json` rooms
    #[serde(default = "default_rooms_dir")]
    pub rooms_dir: PathBuf,
    /// File names in `rooms_dir` that are data files, not rooms
    #[serde(default = "default_skip")]
    pub skip: Vec<String>,
    /// Check CSV grids against layer sizes when validating
    #[serde(default)]
    pub strict_grid: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            tiles_dir: default_tiles_dir(),
            rooms_dir: default_rooms_dir(),
            skip: default_skip(),
            strict_grid: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let txt = std::fs::read_to_string(path).map_err(|source| MapError::io(path, source))?;
        Self::from_toml_str(&txt).map_err(|e| {
            MapError::MalformedInput(format!("config {}: {e}", path.display()))
        })
    }

    /// Parse TOML text.
    pub fn from_toml_str(txt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(txt)
    }

    /// True when `name` is listed in `skip`.
    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip.iter().any(|s| s == name)
    }

    /// Validator settings derived from this config.
    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions {
            strict_grid: self.strict_grid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = PipelineConfig::from_toml_str("").expect("parse");
        assert_eq!(cfg, PipelineConfig::default());
        assert!(cfg.is_skipped("tuning.json"));
        assert!(!cfg.is_skipped("A1.json"));
    }

    #[test]
    fn overrides_individual_keys() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            rooms_dir = "data/rooms"
            skip = []
            strict_grid = true
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.tiles_dir, PathBuf::from("tiles"));
        assert_eq!(cfg.rooms_dir, PathBuf::from("data/rooms"));
        assert!(cfg.skip.is_empty());
        assert!(cfg.validator_options().strict_grid);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_toml_str("room_dir = \"x\"").is_err());
    }
}
