// Player-to-player similarity search and per-metric contribution breakdowns.
//
// A query normalizes each weighted column over the candidate pool plus the
// reference player, scales the columns by the normalized weights, and ranks
// candidates by cosine similarity to the reference vector.

use super::filters::FilterSpec;
use super::normalize::{normalize_column, Direction};
use super::weights::{normalize_weights, NormalizedWeights, WeightSpec};
use super::{ScoringError, DEFAULT_TOP_N};
use crate::config::{CompositeAttribute, PresetCatalog, COMPOSITE_PREFIX};
use crate::dataset::{Dataset, PlayerRecord};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Default for a composite score that is missing on a player.
const MISSING_COMPOSITE_VALUE: f64 = 50.0;

// ---------------------------------------------------------------------------
// Query and result types
// ---------------------------------------------------------------------------

/// Parameters for one similarity search.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    pub reference: String,
    pub weights: WeightSpec,
    pub filters: FilterSpec,
    /// Per-league score multipliers. Unlisted leagues use 1.0.
    pub league_weights: Option<HashMap<String, f64>>,
    pub top_n: usize,
}

impl SimilarityQuery {
    pub fn new(reference: impl Into<String>, weights: WeightSpec) -> Self {
        SimilarityQuery {
            reference: reference.into(),
            weights,
            filters: FilterSpec::default(),
            league_weights: None,
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_league_weights(mut self, league_weights: HashMap<String, f64>) -> Self {
        self.league_weights = Some(league_weights);
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Every league multiplier must be finite and non-negative.
    pub fn check_league_weights(&self) -> Result<(), ScoringError> {
        let Some(leagues) = &self.league_weights else {
            return Ok(());
        };
        match leagues.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            Some((league, weight)) => Err(ScoringError::Configuration(format!(
                "league weight for '{league}' must be a finite value >= 0, got {weight}"
            ))),
            None => Ok(()),
        }
    }
}

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityRow {
    pub rank: usize,
    pub player: String,
    pub team: String,
    pub league: String,
    pub position: String,
    pub age: u32,
    pub minutes: u32,
    pub contract_expires: Option<String>,
    pub similarity_score: f64,
    pub similarity_percentile: f64,
    /// Raw values of the weighted columns, in weight order.
    pub metrics: Vec<(String, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub reference: String,
    /// Weights actually applied. `None` when the candidate pool was empty.
    pub weights: Option<NormalizedWeights>,
    /// Candidates scored before truncation to `top_n`.
    pub pool_size: usize,
    pub rows: Vec<SimilarityRow>,
}

impl SimilarityResult {
    fn empty(reference: &str) -> Self {
        SimilarityResult {
            reference: reference.to_string(),
            weights: None,
            pool_size: 0,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Why two players are alike on one raw statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricContribution {
    pub metric: String,
    pub reference_value: f64,
    pub target_value: f64,
    pub difference: f64,
    /// 0-100; 100 means identical relative to the dataset's range.
    pub similarity: f64,
    /// Caller's weight as supplied, not renormalized.
    pub weight: f64,
    pub contribution: f64,
}

/// Why two players are alike on one composite attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeContribution {
    pub column: String,
    pub display_name: String,
    pub reference_value: f64,
    pub target_value: f64,
    pub difference: f64,
    pub similarity: f64,
    /// Present only for weighted breakdowns.
    pub weight: Option<f64>,
    pub contribution: Option<f64>,
}

// ---------------------------------------------------------------------------
// Math helpers
// ---------------------------------------------------------------------------

/// Cosine similarity of two equal-length vectors; 0.0 when either has zero
/// norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// `1 - diff / range` clamped to [0, 1]; 1.0 when the range is zero.
fn closeness(diff: f64, range: f64) -> f64 {
    if range > 0.0 {
        (1.0 - diff / range).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Similarity engine over an immutable dataset snapshot.
pub struct SimilarityScorer<'a> {
    dataset: &'a Dataset,
    stat_columns: BTreeSet<String>,
    composite_columns: BTreeSet<String>,
    fingerprint: u64,
}

impl<'a> SimilarityScorer<'a> {
    /// `stat_columns` and `composite_columns` together are the columns a
    /// query may weight.
    pub fn new(
        dataset: &'a Dataset,
        stat_columns: &[String],
        composite_columns: &[String],
    ) -> Self {
        let stat_columns: BTreeSet<String> = stat_columns.iter().cloned().collect();
        let composite_columns: BTreeSet<String> = composite_columns.iter().cloned().collect();
        let mut hasher = DefaultHasher::new();
        dataset.fingerprint().hash(&mut hasher);
        stat_columns.hash(&mut hasher);
        composite_columns.hash(&mut hasher);
        SimilarityScorer {
            dataset,
            stat_columns,
            composite_columns,
            fingerprint: hasher.finish(),
        }
    }

    /// Scorer whose selectable columns come from the preset catalog.
    pub fn from_catalog(dataset: &'a Dataset, catalog: &PresetCatalog) -> Self {
        Self::new(dataset, &catalog.stat_columns(), &catalog.composite_columns())
    }

    pub fn dataset(&self) -> &Dataset {
        self.dataset
    }

    /// Identity of the dataset snapshot and selectable columns, for caching.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    fn is_selectable(&self, column: &str) -> bool {
        self.stat_columns.contains(column) || self.composite_columns.contains(column)
    }

    fn player(&self, name: &str) -> Result<&'a PlayerRecord, ScoringError> {
        self.dataset.find(name).ok_or_else(|| ScoringError::NotFound {
            player: name.to_string(),
        })
    }

    /// Rank every filtered candidate by similarity to the reference player.
    pub fn calculate_similarity(
        &self,
        query: &SimilarityQuery,
    ) -> Result<SimilarityResult, ScoringError> {
        query.check_league_weights()?;
        let reference = self.player(&query.reference)?;

        let candidates: Vec<&PlayerRecord> = self
            .dataset
            .players()
            .iter()
            .filter(|p| p.name != reference.name)
            .filter(|p| query.filters.accepts(p))
            .filter(|p| !query.filters.same_position || p.position == reference.position)
            .collect();

        if candidates.is_empty() {
            debug!("no candidates left for {} after filtering", reference.name);
            return Ok(SimilarityResult::empty(&reference.name));
        }

        let restricted = query
            .weights
            .restrict(|c| self.is_selectable(c) && self.dataset.has_column(c))?;
        let weights = normalize_weights(&restricted)?;

        debug!(
            "similarity for {}: {} candidates, {} columns",
            reference.name,
            candidates.len(),
            weights.entries().len()
        );

        // Weighted, normalized feature vectors.
        let mut reference_vector = Vec::with_capacity(weights.entries().len());
        let mut candidate_vectors: Vec<Vec<f64>> =
            vec![Vec::with_capacity(weights.entries().len()); candidates.len()];
        for (column, weight) in weights.iter() {
            let values: Vec<Option<f64>> = candidates.iter().map(|p| p.stat(column)).collect();
            let (normalized, normalized_reference) = normalize_column(
                &values,
                reference.stat(column),
                Direction::for_column(column, weight),
            );
            reference_vector.push(normalized_reference * weight);
            for (vector, value) in candidate_vectors.iter_mut().zip(normalized) {
                vector.push(value * weight);
            }
        }

        let scores: Vec<f64> = candidates
            .iter()
            .zip(&candidate_vectors)
            .map(|(player, vector)| {
                let similarity = cosine_similarity(&reference_vector, vector);
                let multiplier = query
                    .league_weights
                    .as_ref()
                    .and_then(|lw| lw.get(&player.league))
                    .copied()
                    .unwrap_or(1.0);
                similarity * multiplier
            })
            .collect();

        // Stable sort keeps dataset order for ties.
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let percentile = |score: f64| {
            if max_score > 0.0 {
                score / max_score * 100.0
            } else {
                50.0
            }
        };

        let rows = order
            .iter()
            .take(query.top_n)
            .enumerate()
            .map(|(pos, &idx)| {
                let player = candidates[idx];
                SimilarityRow {
                    rank: pos + 1,
                    player: player.name.clone(),
                    team: player.team.clone(),
                    league: player.league.clone(),
                    position: player.position.clone(),
                    age: player.age,
                    minutes: player.minutes,
                    contract_expires: player.contract_expires.clone(),
                    similarity_score: scores[idx],
                    similarity_percentile: percentile(scores[idx]),
                    metrics: weights
                        .iter()
                        .map(|(column, _)| (column.to_string(), player.stat(column)))
                        .collect(),
                }
            })
            .collect();

        Ok(SimilarityResult {
            reference: reference.name.clone(),
            weights: Some(weights),
            pool_size: candidates.len(),
            rows,
        })
    }

    // -----------------------------------------------------------------------
    // Contribution breakdowns
    // -----------------------------------------------------------------------

    /// Per-metric closeness of `target` to `reference` for the raw statistics
    /// in `weights`. Composite and unknown columns are skipped. Ranges are
    /// taken over the whole dataset.
    pub fn metric_contributions(
        &self,
        reference: &str,
        target: &str,
        weights: &WeightSpec,
    ) -> Result<Vec<MetricContribution>, ScoringError> {
        let reference = self.player(reference)?;
        let target = self.player(target)?;

        let contributions = weights
            .entries()
            .iter()
            .filter(|(metric, _)| {
                self.stat_columns.contains(metric) && self.dataset.has_column(metric)
            })
            .map(|(metric, weight)| {
                let reference_value = reference.stat_or(metric, 0.0);
                let target_value = target.stat_or(metric, 0.0);
                let difference = (reference_value - target_value).abs();
                let range = self
                    .dataset
                    .column_range(metric)
                    .map(|(lo, hi)| hi - lo)
                    .unwrap_or(0.0);
                let fraction = closeness(difference, range);
                MetricContribution {
                    metric: metric.clone(),
                    reference_value,
                    target_value,
                    difference,
                    similarity: fraction * 100.0,
                    weight: *weight,
                    contribution: fraction * weight.abs() * 100.0,
                }
            })
            .collect();
        Ok(contributions)
    }

    fn composite_entry(
        &self,
        reference: &PlayerRecord,
        target: &PlayerRecord,
        column: &str,
        composites: &BTreeMap<String, CompositeAttribute>,
        weight: Option<f64>,
    ) -> CompositeContribution {
        let key = column.strip_prefix(COMPOSITE_PREFIX).unwrap_or(column);
        let display_name = composites
            .get(key)
            .map(CompositeAttribute::label)
            .unwrap_or_else(|| key.to_string());
        let reference_value = reference.stat_or(column, MISSING_COMPOSITE_VALUE);
        let target_value = target.stat_or(column, MISSING_COMPOSITE_VALUE);
        let difference = (reference_value - target_value).abs();
        let range = self
            .dataset
            .column_range(column)
            .map(|(lo, hi)| hi - lo)
            .unwrap_or(0.0);
        let fraction = closeness(difference, range);
        CompositeContribution {
            column: column.to_string(),
            display_name,
            reference_value,
            target_value,
            difference,
            similarity: fraction * 100.0,
            weight,
            contribution: weight.map(|w| fraction * w.abs() * 100.0),
        }
    }

    /// Breakdown over the `COMP_` columns named in `weights`.
    pub fn composite_contributions(
        &self,
        reference: &str,
        target: &str,
        weights: &WeightSpec,
        composites: &BTreeMap<String, CompositeAttribute>,
    ) -> Result<Vec<CompositeContribution>, ScoringError> {
        let reference = self.player(reference)?;
        let target = self.player(target)?;

        Ok(weights
            .entries()
            .iter()
            .filter(|(column, _)| {
                column.starts_with(COMPOSITE_PREFIX) && self.dataset.has_column(column)
            })
            .map(|(column, weight)| {
                self.composite_entry(reference, target, column, composites, Some(*weight))
            })
            .collect())
    }

    /// Unweighted breakdown over every configured composite attribute.
    pub fn all_composite_contributions(
        &self,
        reference: &str,
        target: &str,
        composites: &BTreeMap<String, CompositeAttribute>,
    ) -> Result<Vec<CompositeContribution>, ScoringError> {
        let reference = self.player(reference)?;
        let target = self.player(target)?;

        Ok(composites
            .keys()
            .map(|key| format!("{COMPOSITE_PREFIX}{key}"))
            .filter(|column| self.dataset.has_column(column))
            .map(|column| self.composite_entry(reference, target, &column, composites, None))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatComponent;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn two_stat_dataset() -> Dataset {
        let rows = [
            ("Ref", 10.0, 1.0),
            ("Near", 9.0, 1.2),
            ("Far", 1.0, 9.0),
            ("Mid", 5.0, 5.0),
        ];
        Dataset::from_players(
            rows.iter()
                .map(|(name, a, b)| {
                    PlayerRecord::new(*name, "T", "CB")
                        .with_league("L")
                        .with_stat("a", *a)
                        .with_stat("b", *b)
                })
                .collect(),
        )
    }

    fn scorer(ds: &Dataset) -> SimilarityScorer<'_> {
        SimilarityScorer::new(ds, &["a".into(), "b".into()], &[])
    }

    #[test]
    fn cosine_basics() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]), 1.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn nearest_player_ranks_first() {
        let ds = two_stat_dataset();
        let weights = WeightSpec::new([("a", 1.0), ("b", 1.0)]).unwrap();
        let result = scorer(&ds)
            .calculate_similarity(&SimilarityQuery::new("Ref", weights))
            .unwrap();

        let names: Vec<&str> = result.rows.iter().map(|r| r.player.as_str()).collect();
        assert_eq!(names, vec!["Near", "Mid", "Far"]);
        assert_eq!(result.rows[0].rank, 1);
        assert!(approx_eq(result.rows[0].similarity_percentile, 100.0));
        assert_eq!(result.pool_size, 3);
    }

    #[test]
    fn unselectable_columns_are_ignored() {
        let ds = two_stat_dataset();
        let weights = WeightSpec::new([("a", 1.0), ("b", 1.0), ("ghost", 5.0)]).unwrap();
        let result = scorer(&ds)
            .calculate_similarity(&SimilarityQuery::new("Ref", weights))
            .unwrap();
        let applied = result.weights.unwrap();
        assert_eq!(applied.entries().len(), 2);
        assert!(approx_eq(applied.get("a").unwrap(), 0.5));
    }

    #[test]
    fn league_multiplier_reorders() {
        let mut players: Vec<PlayerRecord> = two_stat_dataset().players().to_vec();
        players[1].league = "Weak".into();
        let ds = Dataset::from_players(players);
        let weights = WeightSpec::new([("a", 1.0), ("b", 1.0)]).unwrap();
        let query = SimilarityQuery::new("Ref", weights)
            .with_league_weights(HashMap::from([("Weak".to_string(), 0.1)]));
        let result = scorer(&ds).calculate_similarity(&query).unwrap();
        assert_ne!(result.rows[0].player, "Near");
    }

    #[test]
    fn invalid_league_multipliers_are_rejected() {
        let ds = two_stat_dataset();
        let weights = WeightSpec::new([("a", 1.0), ("b", 1.0)]).unwrap();
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let query = SimilarityQuery::new("Ref", weights.clone())
                .with_league_weights(HashMap::from([("L".to_string(), bad)]));
            let err = scorer(&ds).calculate_similarity(&query).unwrap_err();
            assert!(matches!(err, ScoringError::Configuration(msg) if msg.contains("'L'")));
        }
    }

    #[test]
    fn zero_multiplier_drops_player_and_percentiles_stay_bounded() {
        let mut players: Vec<PlayerRecord> = two_stat_dataset().players().to_vec();
        players[1].league = "Muted".into();
        let ds = Dataset::from_players(players);
        let weights = WeightSpec::new([("a", 1.0), ("b", 1.0)]).unwrap();
        let query = SimilarityQuery::new("Ref", weights)
            .with_league_weights(HashMap::from([("Muted".to_string(), 0.0)]));
        let result = scorer(&ds).calculate_similarity(&query).unwrap();

        assert_eq!(result.rows[0].player, "Mid");
        let near = result.rows.iter().find(|r| r.player == "Near").unwrap();
        assert_eq!(near.similarity_score, 0.0);
        assert!(result
            .rows
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score));
        assert!(result
            .rows
            .iter()
            .all(|r| (0.0..=100.0).contains(&r.similarity_percentile)));
    }

    #[test]
    fn top_n_truncates_after_percentiles() {
        let ds = two_stat_dataset();
        let weights = WeightSpec::new([("a", 1.0), ("b", 1.0)]).unwrap();
        let result = scorer(&ds)
            .calculate_similarity(&SimilarityQuery::new("Ref", weights).with_top_n(1))
            .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.pool_size, 3);
        assert!(approx_eq(result.rows[0].similarity_percentile, 100.0));
    }

    // -- Contributions --

    #[test]
    fn metric_contributions_use_caller_weights() {
        let ds = two_stat_dataset();
        let weights = WeightSpec::new([("a", 2.0), ("b", -1.0)]).unwrap();
        let contributions = scorer(&ds).metric_contributions("Ref", "Mid", &weights).unwrap();
        assert_eq!(contributions.len(), 2);

        // a: range 9, diff 5 -> 1 - 5/9
        let a = &contributions[0];
        assert_eq!(a.weight, 2.0);
        assert!(approx_eq(a.difference, 5.0));
        assert!(approx_eq(a.similarity, (1.0 - 5.0 / 9.0) * 100.0));
        assert!(approx_eq(a.contribution, (1.0 - 5.0 / 9.0) * 2.0 * 100.0));

        let b = &contributions[1];
        assert_eq!(b.weight, -1.0);
        assert!(approx_eq(b.contribution, (1.0 - 4.0 / 8.0) * 100.0));
    }

    #[test]
    fn metric_contributions_zero_range_is_full_similarity() {
        let ds = Dataset::from_players(vec![
            PlayerRecord::new("A", "T", "CB").with_stat("a", 3.0),
            PlayerRecord::new("B", "T", "CB").with_stat("a", 3.0),
        ]);
        let sc = SimilarityScorer::new(&ds, &["a".into()], &[]);
        let weights = WeightSpec::new([("a", 0.5)]).unwrap();
        let c = sc.metric_contributions("A", "B", &weights).unwrap();
        assert_eq!(c[0].similarity, 100.0);
        assert_eq!(c[0].contribution, 50.0);
    }

    #[test]
    fn contributions_require_both_players() {
        let ds = two_stat_dataset();
        let weights = WeightSpec::new([("a", 1.0)]).unwrap();
        let err = scorer(&ds)
            .metric_contributions("Ref", "Nobody", &weights)
            .unwrap_err();
        assert_eq!(
            err,
            ScoringError::NotFound {
                player: "Nobody".into()
            }
        );
    }

    #[test]
    fn composite_contributions_default_missing_to_fifty() {
        let ds = Dataset::from_players(vec![
            PlayerRecord::new("A", "T", "CB").with_stat("COMP_Security", 90.0),
            PlayerRecord::new("B", "T", "CB"),
            PlayerRecord::new("C", "T", "CB").with_stat("COMP_Security", 10.0),
        ]);
        let composites = BTreeMap::from([(
            "Security".to_string(),
            CompositeAttribute {
                display_name: "Security".into(),
                description: String::new(),
                icon: "S".into(),
                components: vec![StatComponent {
                    stat: "x".into(),
                    weight: 1.0,
                    use_percentile: true,
                }],
            },
        )]);
        let sc = SimilarityScorer::new(&ds, &[], &["COMP_Security".into()]);
        let weights = WeightSpec::new([("COMP_Security", 0.4), ("raw", 1.0)]).unwrap();

        let weighted = sc.composite_contributions("A", "B", &weights, &composites).unwrap();
        assert_eq!(weighted.len(), 1);
        let entry = &weighted[0];
        assert_eq!(entry.display_name, "S Security");
        assert_eq!(entry.target_value, 50.0);
        assert!(approx_eq(entry.similarity, (1.0 - 40.0 / 80.0) * 100.0));
        assert!(approx_eq(entry.contribution.unwrap(), 0.5 * 0.4 * 100.0));

        let all = sc.all_composite_contributions("A", "C", &composites).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].weight, None);
        assert_eq!(all[0].similarity, 0.0);
    }
}
