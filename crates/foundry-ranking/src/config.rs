//! Ranking weights and tier tables, loadable from YAML.

use std::path::Path;

use anyhow::Context;
use foundry_core::{ProviderTier, ScoreVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("weight {name} must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("ranking weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },
    #[error("tier score for {tier} must be within [0, 1], got {value}")]
    TierScoreOutOfRange { tier: ProviderTier, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub relevance: f64,
    pub tier: f64,
    pub rating: f64,
    pub response_rate: f64,
    pub completion_rate: f64,
    pub discount: f64,
    pub recency: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: 0.30,
            tier: 0.20,
            rating: 0.15,
            response_rate: 0.15,
            completion_rate: 0.10,
            discount: 0.05,
            recency: 0.05,
        }
    }
}

impl RankingWeights {
    fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("relevance", self.relevance),
            ("tier", self.tier),
            ("rating", self.rating),
            ("response_rate", self.response_rate),
            ("completion_rate", self.completion_rate),
            ("discount", self.discount),
            ("recency", self.recency),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.named().iter().map(|(_, w)| w).sum()
    }

    /// Weighted total of the seven components, clamped to `[0, 1]`.
    pub fn combine(&self, scores: &ScoreVector) -> f64 {
        let total = scores.relevance * self.relevance
            + scores.tier * self.tier
            + scores.rating * self.rating
            + scores.response_rate * self.response_rate
            + scores.completion_rate * self.completion_rate
            + scores.discount * self.discount
            + scores.recency * self.recency;
        total.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierScores {
    pub pending: f64,
    pub standard: f64,
    pub verified: f64,
    pub premium: f64,
}

impl Default for TierScores {
    fn default() -> Self {
        Self {
            pending: 0.2,
            standard: 0.5,
            verified: 0.8,
            premium: 1.0,
        }
    }
}

impl TierScores {
    pub fn score(&self, tier: ProviderTier) -> f64 {
        match tier {
            ProviderTier::Pending => self.pending,
            ProviderTier::Standard => self.standard,
            ProviderTier::Verified => self.verified,
            ProviderTier::Premium => self.premium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    pub tier_scores: TierScores,
}

impl RankingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.weights.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        for tier in ProviderTier::ALL {
            let value = self.tier_scores.score(tier);
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::TierScoreOutOfRange { tier, value });
            }
        }
        Ok(())
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("parsing ranking config")?;
        config.validate().context("validating ranking config")?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading {}", path.display()))
    }
}
