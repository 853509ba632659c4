// Weighted linear scoring for the player finder.
//
// No reference player: each weighted column is normalized against the
// filtered pool and the score is the sum of normalized values times the
// absolute normalized weights.

use super::filters::FilterSpec;
use super::normalize::{normalize_pool, normalize_value, Direction, CONSTANT_COLUMN_VALUE};
use super::weights::{normalize_weights, NormalizedWeights, WeightSpec};
use super::ScoringError;
use crate::config::CompositeAttribute;
use crate::dataset::{Dataset, PlayerRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetRow {
    pub rank: usize,
    pub player: String,
    pub team: String,
    pub league: String,
    pub position: String,
    pub age: u32,
    pub minutes: u32,
    pub birth_country: Option<String>,
    pub contract_expires: Option<String>,
    pub market_value: Option<f64>,
    pub score: f64,
    pub percentile: f64,
    pub metrics: Vec<(String, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetResult {
    pub preset: String,
    /// Display column name, e.g. `Central_Defend_Score`.
    pub score_column: String,
    pub weights: NormalizedWeights,
    pub pool_size: usize,
    pub rows: Vec<PresetRow>,
}

/// One metric's share of a player's preset score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetContribution {
    pub metric: String,
    pub raw_value: f64,
    /// 0-100, clamped.
    pub normalized: f64,
    /// Normalized, signed.
    pub weight: f64,
    pub contribution: f64,
}

pub struct PresetScorer<'a> {
    dataset: &'a Dataset,
}

impl<'a> PresetScorer<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        PresetScorer { dataset }
    }

    /// Every weighted column must exist in the dataset.
    fn checked_weights(&self, weights: &WeightSpec) -> Result<NormalizedWeights, ScoringError> {
        if let Some(missing) = weights.columns().find(|c| !self.dataset.has_column(c)) {
            return Err(ScoringError::Configuration(format!(
                "metric '{missing}' not found in dataset"
            )));
        }
        normalize_weights(weights)
    }

    /// Rank the filtered pool by weighted score.
    pub fn score(
        &self,
        name: &str,
        weights: &WeightSpec,
        filters: &FilterSpec,
        top_n: usize,
    ) -> Result<PresetResult, ScoringError> {
        let weights = self.checked_weights(weights)?;

        let pool: Vec<&PlayerRecord> = self
            .dataset
            .players()
            .iter()
            .filter(|p| filters.accepts(p))
            .collect();

        debug!("preset '{}': {} players after filters", name, pool.len());

        let mut scores = vec![0.0; pool.len()];
        for (column, weight) in weights.iter() {
            let values: Vec<Option<f64>> = pool.iter().map(|p| p.stat(column)).collect();
            let normalized = normalize_pool(&values, Direction::for_column(column, weight));
            for (score, value) in scores.iter_mut().zip(normalized) {
                *score += value * weight.abs();
            }
        }

        let mut order: Vec<usize> = (0..pool.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let rows = order
            .iter()
            .take(top_n)
            .enumerate()
            .map(|(pos, &idx)| {
                let player = pool[idx];
                PresetRow {
                    rank: pos + 1,
                    player: player.name.clone(),
                    team: player.team.clone(),
                    league: player.league.clone(),
                    position: player.position.clone(),
                    age: player.age,
                    minutes: player.minutes,
                    birth_country: player.birth_country.clone(),
                    contract_expires: player.contract_expires.clone(),
                    market_value: player.market_value,
                    score: scores[idx],
                    percentile: if max_score > 0.0 {
                        scores[idx] / max_score * 100.0
                    } else {
                        50.0
                    },
                    metrics: weights
                        .iter()
                        .map(|(column, _)| (column.to_string(), player.stat(column)))
                        .collect(),
                }
            })
            .collect();

        Ok(PresetResult {
            preset: name.to_string(),
            score_column: format!("{}_Score", name.replace(' ', "_")),
            weights,
            pool_size: pool.len(),
            rows,
        })
    }

    /// Rank the filtered pool by one composite attribute, using its raw
    /// component statistics as finder weights.
    pub fn score_responsibility(
        &self,
        key: &str,
        composites: &BTreeMap<String, CompositeAttribute>,
        filters: &FilterSpec,
        top_n: usize,
    ) -> Result<PresetResult, ScoringError> {
        let attribute = composites.get(key).ok_or_else(|| {
            ScoringError::Configuration(format!("unknown composite attribute '{key}'"))
        })?;
        let weights = WeightSpec::from_components(&attribute.components)?;
        self.score(key, &weights, filters, top_n)
    }

    /// Per-metric breakdown of one player's score, normalized against the
    /// scorer's whole dataset.
    pub fn explain(
        &self,
        player: &str,
        weights: &WeightSpec,
    ) -> Result<Vec<PresetContribution>, ScoringError> {
        let record = self
            .dataset
            .find(player)
            .ok_or_else(|| ScoringError::NotFound {
                player: player.to_string(),
            })?;
        let weights = normalize_weights(weights)?;

        Ok(weights
            .iter()
            .filter(|(column, _)| self.dataset.has_column(column))
            .map(|(column, weight)| {
                let raw_value = record.stat_or(column, 0.0);
                let normalized = match self.dataset.column_range(column) {
                    Some((min, max)) if max != min => {
                        normalize_value(raw_value, min, max, Direction::for_column(column, weight))
                            .clamp(0.0, 100.0)
                    }
                    _ => CONSTANT_COLUMN_VALUE,
                };
                PresetContribution {
                    metric: column.to_string(),
                    raw_value,
                    normalized,
                    weight,
                    contribution: normalized * weight.abs(),
                }
            })
            .collect())
    }
}
