// settings.rs — Layered configuration for CLAHE defaults.
//
// defaults/clahe.default.toml is embedded, so the documented defaults and
// the runtime defaults cannot drift. Applications layer their own files
// and CLI overrides on top through `Loader`, then deserialize into
// `ClaheConfig`:
//
//   embedded defaults  →  config file  →  overrides
//
// `policy` is consumed by ClaheObject::construct_with_config.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::args::{ArgPolicy, ClaheParams, TileGridSize, DEFAULT_CLIP_LIMIT};
use crate::equalizer::Clahe;

const DEFAULT_TOML: &str = include_str!("../defaults/clahe.default.toml");

/// Parameters a CLAHE object starts from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaheConfig {
    pub clip_limit: f64,
    pub tile_grid: TileGridSize,
    pub policy: ArgPolicy,
}

impl Default for ClaheConfig {
    fn default() -> Self {
        ClaheConfig {
            clip_limit: DEFAULT_CLIP_LIMIT,
            tile_grid: TileGridSize::default(),
            policy: ArgPolicy::default(),
        }
    }
}

impl ClaheConfig {
    /// Sanitized parameters (clip ≥ 0, grid ≥ 1).
    pub fn params(&self) -> ClaheParams {
        ClaheParams {
            clip_limit: crate::args::sanitize_clip_limit(self.clip_limit),
            tile_grid: self.tile_grid.sanitized(),
        }
    }

    /// Build a CPU-backed handle from this configuration.
    pub fn build(&self) -> Clahe {
        Clahe::from_params(self.params())
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override, e.g. `("tile_grid.width", 4)`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<ClaheConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load the built-in defaults only.
pub fn load_default_config() -> Result<ClaheConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_defaults_match_code() {
        assert_eq!(load_default_config().unwrap(), ClaheConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = Loader::new()
            .set_override("clip_limit", 2.5)
            .unwrap()
            .set_override("tile_grid.width", 4i64)
            .unwrap()
            .set_override("policy", "legacy")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(cfg.clip_limit, 2.5);
        assert_eq!(cfg.tile_grid, TileGridSize::new(4, 8));
        assert_eq!(cfg.policy, ArgPolicy::Legacy);
    }

    #[test]
    fn test_legacy_policy_reaches_constructor() {
        let cfg = Loader::new()
            .set_override("policy", "legacy")
            .unwrap()
            .build()
            .unwrap();
        let args = [serde_json::json!({ "tileGridSize": "four" })];
        let obj = crate::binding::ClaheObject::construct_with_config(&args, &cfg).unwrap();
        assert_eq!(obj.handle().tiles_grid_size(), TileGridSize::new(8, 8));
        assert!(
            crate::binding::ClaheObject::construct_with_config(&args, &ClaheConfig::default())
                .is_err()
        );
    }

    #[test]
    fn test_file_layer() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "clip_limit = 3.0\n[tile_grid]\nheight = 2").unwrap();
        let cfg = Loader::new().with_file(file.path()).build().unwrap();
        assert_eq!(cfg.clip_limit, 3.0);
        assert_eq!(cfg.tile_grid, TileGridSize::new(8, 2));
    }

    #[test]
    fn test_missing_optional_file_is_ignored() {
        let cfg = Loader::new()
            .with_optional_file("/nonexistent/clahe.toml")
            .build()
            .unwrap();
        assert_eq!(cfg, ClaheConfig::default());
    }

    #[test]
    fn test_params_are_sanitized() {
        let cfg = ClaheConfig {
            clip_limit: -1.0,
            tile_grid: TileGridSize { width: 0, height: 3 },
            policy: ArgPolicy::Strict,
        };
        let clahe = cfg.build();
        assert_eq!(clahe.clip_limit(), 0.0);
        assert_eq!(clahe.tiles_grid_size(), TileGridSize::new(1, 3));
    }
}
