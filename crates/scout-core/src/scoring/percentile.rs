// Percentile ranks, composite attribute columns and role score columns.

use super::normalize::{normalize_pool, Direction};
use super::weights::{normalize_weights, WeightSpec};
use crate::config::{
    CompositeAttribute, FinderPreset, PresetCatalog, COMPOSITE_PREFIX, ROLE_PREFIX,
};
use crate::dataset::Dataset;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Suffix of precomputed percentile columns.
pub const PERCENTILE_SUFFIX: &str = "_percentile";

/// Percentile assumed for a component whose percentile is unavailable.
const MISSING_PERCENTILE: f64 = 50.0;

pub fn percentile_column(stat: &str) -> String {
    format!("{stat}{PERCENTILE_SUFFIX}")
}

/// Percentile rank (0, 100] of each present value among the present values.
///
/// Ties share the average of their ranks. Missing values stay missing.
pub fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    present.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let count = present.len() as f64;
    let mut ranks = vec![None; values.len()];
    let mut start = 0;
    while start < present.len() {
        let mut end = start;
        while end + 1 < present.len() && present[end + 1].1 == present[start].1 {
            end += 1;
        }
        // 1-based ranks start+1..=end+1, averaged.
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        for &(idx, _) in &present[start..=end] {
            ranks[idx] = Some(average_rank / count * 100.0);
        }
        start = end + 1;
    }
    ranks
}

/// Add a `<stat>_percentile` column for every listed statistic present in
/// the dataset. Percentiles are global across all loaded players.
pub fn add_percentile_columns(dataset: &mut Dataset, stats: &[String]) {
    for stat in stats {
        if !dataset.has_column(stat) {
            warn!("statistic '{}' not in dataset; percentile skipped", stat);
            continue;
        }
        let values: Vec<Option<f64>> = dataset.players().iter().map(|p| p.stat(stat)).collect();
        dataset.set_column(&percentile_column(stat), &percentile_ranks(&values));
    }
}

/// Score of one composite attribute for every player, in row order.
///
/// Components whose statistic is absent from the dataset are skipped.
pub fn composite_scores(dataset: &Dataset, attribute: &CompositeAttribute) -> Vec<f64> {
    let components: Vec<_> = attribute
        .components
        .iter()
        .filter(|c| dataset.has_column(&c.stat))
        .collect();

    dataset
        .players()
        .iter()
        .map(|player| {
            components
                .iter()
                .map(|c| {
                    let value = if c.use_percentile {
                        player.stat_or(&percentile_column(&c.stat), MISSING_PERCENTILE)
                    } else {
                        player.stat_or(&c.stat, 0.0)
                    };
                    c.weight * value
                })
                .sum()
        })
        .collect()
}

/// Write a `COMP_<key>` column for each composite attribute.
pub fn add_composite_columns(
    dataset: &mut Dataset,
    composites: &BTreeMap<String, CompositeAttribute>,
) {
    for (key, attribute) in composites {
        let scores: Vec<Option<f64>> = composite_scores(dataset, attribute)
            .into_iter()
            .map(Some)
            .collect();
        dataset.set_column(&format!("{COMPOSITE_PREFIX}{key}"), &scores);
    }
}

pub fn role_column(preset: &str) -> String {
    format!("{ROLE_PREFIX}{}", preset.replace(' ', "_"))
}

/// Finder score of every player for one preset, normalized over the whole
/// dataset. `None` when any weighted statistic is absent.
pub fn role_scores(dataset: &Dataset, preset: &FinderPreset) -> Option<Vec<f64>> {
    let weights = WeightSpec::from_components(&preset.components).ok()?;
    if !weights.columns().all(|c| dataset.has_column(c)) {
        return None;
    }
    let weights = normalize_weights(&weights).ok()?;

    let mut scores = vec![0.0; dataset.len()];
    for (column, weight) in weights.iter() {
        let values: Vec<Option<f64>> =
            dataset.players().iter().map(|p| p.stat(column)).collect();
        let normalized = normalize_pool(&values, Direction::for_column(column, weight));
        for (score, value) in scores.iter_mut().zip(normalized) {
            *score += value * weight.abs();
        }
    }
    Some(scores)
}

/// Write a `ROLE_<name>` column for each finder preset whose statistics are
/// all present. Returns how many columns were written.
pub fn add_role_columns(
    dataset: &mut Dataset,
    presets: &BTreeMap<String, FinderPreset>,
) -> usize {
    let mut written = 0;
    for (name, preset) in presets {
        let Some(scores) = role_scores(dataset, preset) else {
            debug!("role '{}' skipped: statistics missing from dataset", name);
            continue;
        };
        let scores: Vec<Option<f64>> = scores.into_iter().map(Some).collect();
        dataset.set_column(&role_column(name), &scores);
        written += 1;
    }
    written
}

/// Percentiles for the catalog's statistics, then composite and role columns.
pub fn prepare_dataset(dataset: &mut Dataset, catalog: &PresetCatalog) {
    let stats = catalog.stat_columns();
    add_percentile_columns(dataset, &stats);
    add_composite_columns(dataset, &catalog.composites);
    let roles = add_role_columns(dataset, &catalog.finder_presets);
    info!(
        "Prepared {} players: {} percentile columns, {} composite attributes, {} role scores",
        dataset.len(),
        stats.iter().filter(|s| dataset.has_column(s)).count(),
        catalog.composites.len(),
        roles
    );
}

/// A player's raw value and percentile for one statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatLine {
    pub stat: String,
    pub value: Option<f64>,
    pub percentile: Option<f64>,
}

/// Raw values and percentiles for a player, used by the comparison view.
pub fn player_stat_lines(
    dataset: &Dataset,
    player: &str,
    stats: &[String],
) -> Option<Vec<StatLine>> {
    let record = dataset.find(player)?;
    Some(
        stats
            .iter()
            .filter(|s| dataset.has_column(s))
            .map(|s| StatLine {
                stat: s.clone(),
                value: record.stat(s),
                percentile: record.stat(&percentile_column(s)),
            })
            .collect(),
    )
}
