//! Engine configuration, loadable from RON. Every field has a default, so
//! a config file only needs to mention what it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::core::selection::{StrategyKind, DEFAULT_RECENCY_PENALTY, DEFAULT_RECENCY_WINDOW};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// When the fragment scorer's memoized results are thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Never cleared automatically.
    Keep,
    /// Cleared after every built line.
    ClearPerLine,
    /// Cleared whenever the scene moves to another beat.
    #[default]
    ClearPerBeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: StrategyKind,
    pub recency_window: usize,
    pub recency_penalty: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            recency_window: DEFAULT_RECENCY_WINDOW,
            recency_penalty: DEFAULT_RECENCY_PENALTY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub cache_policy: CachePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub apply_relationship_modifiers: bool,
    pub apply_context_modifiers: bool,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            apply_relationship_modifiers: true,
            apply_context_modifiers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalliopeConfig {
    /// 0 seeds from OS entropy.
    pub seed: u64,
    pub selection: SelectionConfig,
    pub scoring: ScoringConfig,
    pub lines: LineConfig,
}

impl CalliopeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

impl FromStr for CalliopeConfig {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(ron::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let config: CalliopeConfig = "()".parse().unwrap();
        assert_eq!(config, CalliopeConfig::default());
        assert_eq!(config.seed, 0);
        assert_eq!(config.selection.strategy, StrategyKind::WeightedRandom);
        assert_eq!(config.selection.recency_window, 5);
        assert_eq!(config.scoring.cache_policy, CachePolicy::ClearPerBeat);
        assert!(config.lines.apply_relationship_modifiers);
    }

    #[test]
    fn partial_override() {
        let config: CalliopeConfig = r#"(
            seed: 42,
            selection: (strategy: HighestScore),
            lines: (apply_context_modifiers: false),
        )"#
        .parse()
        .unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.selection.strategy, StrategyKind::HighestScore);
        assert_eq!(config.selection.recency_penalty, 0.5);
        assert!(config.lines.apply_relationship_modifiers);
        assert!(!config.lines.apply_context_modifiers);
    }

    #[test]
    fn to_ron_reads_back() {
        let mut config = CalliopeConfig::default();
        config.seed = 7;
        config.scoring.cache_policy = CachePolicy::Keep;
        let text = config.to_ron().unwrap();
        let back: CalliopeConfig = text.parse().unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn bad_input_is_an_error() {
        assert!(matches!("(seed: \"x\")".parse::<CalliopeConfig>(), Err(ConfigError::Ron(_))));
        assert!(matches!(
            CalliopeConfig::from_file(Path::new("/definitely/not/here.ron")),
            Err(ConfigError::Io(_))
        ));
    }
}
