//! Solver configuration.
//!
//! Everything the re-solver used to read from process-wide settings lives
//! here and is handed to the lookahead, the builder and the reconstruction
//! gadget at construction time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LookaheadError, LookaheadResult};

/// Heads-up only.
pub const PLAYERS_COUNT: usize = 2;

/// Betting structure of the game; decides how all-in continuations are
/// evaluated at the depth limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BettingLimit {
    NoLimit,
    Limit,
}

impl BettingLimit {
    pub fn is_no_limit(self) -> bool {
        matches!(self, BettingLimit::NoLimit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Number of CFR+ iterations per resolve.
    pub cfr_iters: usize,
    /// Warm-up iterations excluded from the averages.
    pub cfr_skip_iters: usize,
    /// Lower clamp for positive regrets during regret matching.
    pub regret_epsilon: f32,
    /// Upper clamp for regrets.
    pub max_number: f32,
    /// Number of private hands per player.
    pub hand_count: usize,
    pub betting: BettingLimit,
    /// Index of the last street; a lookahead on it has no depth-limit states.
    pub streets_count: u8,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        ResolveConfig {
            cfr_iters: 1000,
            cfr_skip_iters: 500,
            regret_epsilon: 1.0 / 1_000_000_000.0,
            max_number: 999_999.0,
            hand_count: 6,
            betting: BettingLimit::NoLimit,
            streets_count: 2,
        }
    }
}

impl ResolveConfig {
    pub fn new(cfr_iters: usize, cfr_skip_iters: usize, hand_count: usize) -> LookaheadResult<Self> {
        let config = ResolveConfig {
            cfr_iters,
            cfr_skip_iters,
            hand_count,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> LookaheadResult<Self> {
        let config: ResolveConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> LookaheadResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> LookaheadResult<()> {
        if self.cfr_iters == 0 {
            return Err(LookaheadError::InvalidConfig(
                "cfr_iters must be positive".to_string(),
            ));
        }
        if self.cfr_skip_iters >= self.cfr_iters {
            return Err(LookaheadError::InvalidConfig(format!(
                "cfr_skip_iters ({}) must be smaller than cfr_iters ({})",
                self.cfr_skip_iters, self.cfr_iters
            )));
        }
        if self.hand_count == 0 {
            return Err(LookaheadError::InvalidConfig(
                "hand_count must be positive".to_string(),
            ));
        }
        if !(self.regret_epsilon > 0.0) || !(self.max_number > self.regret_epsilon) {
            return Err(LookaheadError::InvalidConfig(format!(
                "regret clamps must satisfy 0 < epsilon ({}) < max ({})",
                self.regret_epsilon, self.max_number
            )));
        }
        if self.streets_count == 0 {
            return Err(LookaheadError::InvalidConfig(
                "streets_count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of iterations that feed the averages.
    pub fn averaged_iters(&self) -> usize {
        self.cfr_iters - self.cfr_skip_iters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ResolveConfig::default().validate().is_ok());
    }

    #[test]
    fn skip_must_be_below_iters() {
        assert!(ResolveConfig::new(10, 10, 2).is_err());
        assert!(ResolveConfig::new(10, 9, 2).is_ok());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = ResolveConfig::from_json(r#"{"cfr_iters": 200, "cfr_skip_iters": 50, "betting": "limit"}"#).unwrap();
        assert_eq!(config.cfr_iters, 200);
        assert_eq!(config.averaged_iters(), 150);
        assert_eq!(config.betting, BettingLimit::Limit);
        assert_eq!(config.hand_count, ResolveConfig::default().hand_count);
    }

    #[test]
    fn json_rejects_zero_hands() {
        let err = ResolveConfig::from_json(r#"{"hand_count": 0}"#).unwrap_err();
        assert!(matches!(err, LookaheadError::InvalidConfig(_)));
    }
}
