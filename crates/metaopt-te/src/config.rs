//! Formulation configuration.
//!
//! Stored as TOML. Unspecified knobs take their defaults, except the KKT
//! dual bound, which must be given explicitly:
//!
//! ```toml
//! num_paths = 2
//! path_mode = "k_shortest"
//!
//! [kkt]
//! dual_bound = 100.0
//!
//! [pinning]
//! threshold = 5.0
//!
//! [pop]
//! num_partitions = 2
//! seed = 7
//! ```

use std::fs;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::error::{EncodingError, EncodingResult};
use crate::paths::PathMode;

/// Which path enumeration feeds the per-path flow variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSelection {
    /// The `num_paths` shortest simple paths.
    #[default]
    KShortest,
    /// Every simple path.
    AllSimple,
}

fn default_num_paths() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeConfig {
    /// Path fan-out bound K
    #[serde(default = "default_num_paths")]
    pub num_paths: usize,

    #[serde(default)]
    pub path_mode: PathSelection,

    pub kkt: KktConfig,

    #[serde(default)]
    pub pinning: PinningConfig,

    #[serde(default)]
    pub pop: PopConfig,
}

/// KKT reformulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KktConfig {
    /// Upper bound M on every dual multiplier (`0 ≤ λ ≤ M`, `-M ≤ ν ≤ M`)
    pub dual_bound: f64,
}

fn default_pinning_margin() -> f64 {
    1e-4
}

/// Demand-pinning settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinningConfig {
    /// Demands at or below this value are pinned to their shortest path
    pub threshold: f64,
    /// Minimum excess over the threshold for a symbolic demand to stay unpinned
    #[serde(default = "default_pinning_margin")]
    pub margin: f64,
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            margin: default_pinning_margin(),
        }
    }
}

/// POP decomposition settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopConfig {
    pub num_partitions: usize,
    /// Seed of the random pair-to-partition assignment
    pub seed: u64,
}

impl Default for PopConfig {
    fn default() -> Self {
        Self {
            num_partitions: 2,
            seed: 0,
        }
    }
}

impl TeConfig {
    pub fn new(kkt: KktConfig) -> Self {
        Self {
            num_paths: default_num_paths(),
            path_mode: PathSelection::default(),
            kkt,
            pinning: PinningConfig::default(),
            pop: PopConfig::default(),
        }
    }

    /// Path enumeration mode resolved against `num_paths`.
    pub fn path_mode(&self) -> PathMode {
        match self.path_mode {
            PathSelection::KShortest => PathMode::KShortest(self.num_paths),
            PathSelection::AllSimple => PathMode::AllSimple,
        }
    }

    pub fn validate(&self) -> EncodingResult<()> {
        if self.num_paths == 0 {
            return Err(EncodingError::Config("num_paths must be at least 1".into()));
        }
        if !self.kkt.dual_bound.is_finite() || self.kkt.dual_bound <= 0.0 {
            return Err(EncodingError::Config(format!(
                "kkt.dual_bound must be positive and finite, got {}",
                self.kkt.dual_bound
            )));
        }
        if !self.pinning.threshold.is_finite() || self.pinning.threshold < 0.0 {
            return Err(EncodingError::Config(format!(
                "pinning.threshold must be non-negative, got {}",
                self.pinning.threshold
            )));
        }
        if !self.pinning.margin.is_finite() || self.pinning.margin <= 0.0 {
            return Err(EncodingError::Config(format!(
                "pinning.margin must be positive, got {}",
                self.pinning.margin
            )));
        }
        if self.pop.num_partitions == 0 {
            return Err(EncodingError::InvalidPartitionCount(0));
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> EncodingResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: impl AsRef<FsPath>) -> EncodingResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn save_to(&self, path: impl AsRef<FsPath>) -> EncodingResult<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = TeConfig::from_toml_str("[kkt]\ndual_bound = 50.0\n").unwrap();
        assert_eq!(config.num_paths, 2);
        assert_eq!(config.path_mode(), PathMode::KShortest(2));
        assert_eq!(config.pinning.threshold, 0.0);
        assert_eq!(config.pop.num_partitions, 2);
    }

    #[test]
    fn test_dual_bound_is_required() {
        let err = TeConfig::from_toml_str("num_paths = 3\n").unwrap_err();
        assert!(matches!(err, EncodingError::Serialization(_)));
    }

    #[test]
    fn test_all_simple_mode() {
        let config =
            TeConfig::from_toml_str("path_mode = \"all_simple\"\n[kkt]\ndual_bound = 1.0\n").unwrap();
        assert_eq!(config.path_mode(), PathMode::AllSimple);
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let err = TeConfig::from_toml_str("[kkt]\ndual_bound = 1.0\n[pop]\nnum_partitions = 0\n")
            .unwrap_err();
        assert!(matches!(err, EncodingError::InvalidPartitionCount(0)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("te.toml");
        let mut config = TeConfig::new(KktConfig { dual_bound: 10.0 });
        config.pinning.threshold = 2.5;
        config.save_to(&path).unwrap();

        let loaded = TeConfig::load_from(&path).unwrap();
        assert_eq!(loaded.pinning.threshold, 2.5);
        assert_eq!(loaded.kkt.dual_bound, 10.0);
    }
}
