// Toxicity scorer trait and the threshold policy applied to its output.
//
// A scorer is a black box that maps text to per-category scores in
// [0, 1]. Category names follow the Detoxify convention (toxicity,
// severe_toxicity, obscene, threat, insult, identity_attack,
// sexual_explicit); providers with different labels translate to these.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

/// Per-category scores for one piece of text, keyed by category name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryScores(pub BTreeMap<String, f64>);

impl CategoryScores {
    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.get(category).copied()
    }
}

impl<const N: usize> From<[(&str, f64); N]> for CategoryScores {
    fn from(pairs: [(&str, f64); N]) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

/// Score above which a category counts as toxic.
#[derive(Debug, Clone, PartialEq)]
pub struct ToxicityThresholds {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub obscene: f64,
    pub threat: f64,
    pub insult: f64,
    pub identity_attack: f64,
    pub sexual_explicit: f64,
}

impl Default for ToxicityThresholds {
    fn default() -> Self {
        Self {
            toxicity: 0.5,
            severe_toxicity: 0.1,
            obscene: 0.15,
            threat: 0.1,
            insult: 0.15,
            identity_attack: 0.1,
            sexual_explicit: 0.15,
        }
    }
}

impl ToxicityThresholds {
    /// Threshold for a category, or `None` for categories we don't police.
    pub fn for_category(&self, category: &str) -> Option<f64> {
        match category {
            "toxicity" => Some(self.toxicity),
            "severe_toxicity" => Some(self.severe_toxicity),
            "obscene" => Some(self.obscene),
            "threat" => Some(self.threat),
            "insult" => Some(self.insult),
            "identity_attack" => Some(self.identity_attack),
            "sexual_explicit" => Some(self.sexual_explicit),
            _ => None,
        }
    }

    /// True when any known category strictly exceeds its threshold.
    /// NaN scores never count as toxic.
    pub fn is_toxic(&self, scores: &CategoryScores) -> bool {
        scores.0.iter().any(|(category, &score)| {
            self.for_category(category)
                .is_some_and(|threshold| score > threshold)
        })
    }
}

/// Trait for scoring text toxicity. Async because most classifiers sit
/// behind an HTTP API.
#[async_trait]
pub trait ToxicityScorer: Send + Sync {
    /// Score a single text.
    async fn score_text(&self, text: &str) -> Result<CategoryScores>;
}
