// Integration tests for the scouting engine.
//
// These exercise the public API end to end: configuration bootstrap, CSV
// loading, percentile/composite preparation, similarity search, the preset
// finder, and contribution breakdowns.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use scout_core::config::{
    load_config, CompositeAttribute, Config, PresetCatalog, StatCategory, StatComponent,
};
use scout_core::dataset::{load_all, Dataset, PlayerRecord};
use scout_core::scoring::percentile::prepare_dataset;
use scout_core::scoring::positions::{resolve_similarity_weights, AUTO_PRESET};
use scout_core::scoring::{
    normalize_weights, FilterSpec, PresetScorer, ScoringError, SimilarityCache, SimilarityQuery,
    SimilarityScorer, WeightSpec,
};
use tempfile::TempDir;

// ===========================================================================
// Test helpers
// ===========================================================================

const DUELS: &str = "Duels won, %";

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Workspace root, located by walking up to the shipped defaults.
fn workspace_root() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .find(|p| p.join("defaults").join("scout.toml").is_file())
        .map(Path::to_path_buf)
        .expect("defaults/ directory not found above crate")
}

/// Temp project with `defaults/` copied in, bootstrapped via `load_config`.
fn bootstrap_project() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let defaults = tmp.path().join("defaults");
    fs::create_dir_all(&defaults).unwrap();
    for name in ["scout.toml", "presets.toml"] {
        fs::copy(workspace_root().join("defaults").join(name), defaults.join(name)).unwrap();
    }
    let mut config = load_config(tmp.path()).unwrap();
    config.data.root = tmp.path().join("data").display().to_string();
    (tmp, config)
}

fn write_csv(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// One statistic, players in the given row order.
fn single_stat_dataset(rows: &[(&str, f64)]) -> Dataset {
    Dataset::from_players(
        rows.iter()
            .map(|(name, value)| {
                PlayerRecord::new(*name, "Club", "CB")
                    .with_age(25)
                    .with_minutes(2000)
                    .with_stat(DUELS, *value)
            })
            .collect(),
    )
}

fn duels_scorer(ds: &Dataset) -> SimilarityScorer<'_> {
    SimilarityScorer::new(ds, &[DUELS.to_string()], &[])
}

fn duels_weights() -> WeightSpec {
    WeightSpec::new([(DUELS, 1.0)]).unwrap()
}

const CB_CSV: &str = "\
Player,Team,League,Position,Age,Minutes played,Contract expires,\
    Aerial duels won %,Defensive duels won %,Sliding tackles per 90,\
    Successful defensive actions per 90,Conceded goals per 90,Duels won %,Fouls per 90
W. Saliba,Arsenal,Premier League,CB,24,2700,2027-06-30,64.0,72.0,0.4,8.1,0.8,63.0,0.6
G. Bremer,Juventus,Serie A,CB,27,2400,2028-06-30,66.0,70.0,0.6,8.9,0.9,65.0,1.2
R. Araujo,Barcelona,La Liga,CB,25,1800,2026-06-30,61.0,69.0,0.5,7.5,1.1,60.0,1.4
J. Tah,Leverkusen,Bundesliga,CB,28,2600,2025-06-30,68.0,74.0,0.3,9.4,0.7,66.0,0.7
A. Bastoni,Inter,Serie A,LCB,25,2500,,58.0,65.0,0.2,6.9,0.8,57.0,0.9
Young Prospect,Ajax,Eredivisie,CB,19,450,2027-06-30,55.0,60.0,0.7,6.0,1.5,54.0,2.0
";

/// The fixture header drops the commas from `%` stat names for readability;
/// restore the real quoted spelling.
fn fixture_csv() -> String {
    CB_CSV
        .replace("Aerial duels won %", "\"Aerial duels won, %\"")
        .replace("Defensive duels won %", "\"Defensive duels won, %\"")
        .replace("Duels won %", "\"Duels won, %\"")
}

// ===========================================================================
// Weight normalization
// ===========================================================================

#[test]
fn normalized_weights_always_sum_to_one() {
    let specs = [
        vec![("a", 0.2), ("b", 0.8)],
        vec![("a", -3.0), ("b", 1.0), ("c", 6.0)],
        vec![("a", 1e-6)],
    ];
    for entries in specs {
        let normalized = normalize_weights(&WeightSpec::new(entries).unwrap()).unwrap();
        let sum: f64 = normalized.iter().map(|(_, w)| w.abs()).sum();
        assert!(approx_eq(sum, 1.0));
    }
}

// ===========================================================================
// Similarity engine
// ===========================================================================

#[test]
fn five_player_single_metric_scenario() {
    let ds = single_stat_dataset(&[
        ("A", 80.0),
        ("B", 60.0),
        ("C", 40.0),
        ("D", 20.0),
        ("E", 80.0),
    ]);
    let result = duels_scorer(&ds)
        .calculate_similarity(&SimilarityQuery::new("A", duels_weights()))
        .unwrap();

    let names: Vec<&str> = result.rows.iter().map(|r| r.player.as_str()).collect();
    // Single-dimension cosine similarity is 1.0 for any positive value, so
    // B, C and E tie and keep dataset order. D normalizes to 0 (zero norm).
    assert_eq!(names, vec!["B", "C", "E", "D"]);
    for row in &result.rows[..3] {
        assert!(approx_eq(row.similarity_score, 1.0));
        assert!(approx_eq(row.similarity_percentile, 100.0));
    }
    assert_eq!(result.rows[3].similarity_score, 0.0);
    assert_eq!(result.rows[3].similarity_percentile, 0.0);
    let ranks: Vec<usize> = result.rows.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
}

#[test]
fn tie_order_follows_dataset_rows() {
    let ds = single_stat_dataset(&[
        ("A", 80.0),
        ("E", 80.0),
        ("B", 60.0),
        ("C", 40.0),
        ("D", 20.0),
    ]);
    let result = duels_scorer(&ds)
        .calculate_similarity(&SimilarityQuery::new("A", duels_weights()))
        .unwrap();
    let names: Vec<&str> = result.rows.iter().map(|r| r.player.as_str()).collect();
    assert_eq!(names, vec!["E", "B", "C", "D"]);
}

#[test]
fn reference_never_in_results_and_queries_are_deterministic() {
    let csv = fixture_csv();
    let ds = scout_core::dataset::load_player_reader(csv.as_bytes(), "fixture").unwrap();
    let stats: Vec<String> = ds.columns().to_vec();
    let scorer = SimilarityScorer::new(&ds, &stats, &[]);
    let weights = WeightSpec::new([
        ("Aerial duels won, %", 0.3),
        ("Defensive duels won, %", 0.3),
        ("Successful defensive actions per 90", 0.2),
        ("Fouls per 90", -0.2),
    ])
    .unwrap();
    let query = SimilarityQuery::new("W. Saliba", weights);

    let first = scorer.calculate_similarity(&query).unwrap();
    let second = scorer.calculate_similarity(&query).unwrap();
    assert_eq!(first, second);
    assert!(first.rows.iter().all(|r| r.player != "W. Saliba"));
    assert!(first
        .rows
        .iter()
        .all(|r| (0.0..=100.0).contains(&r.similarity_percentile)));
    assert!(approx_eq(first.rows[0].similarity_percentile, 100.0));
}

#[test]
fn constant_column_contributes_equally() {
    let ds = Dataset::from_players(
        [("R", 10.0), ("X", 4.0), ("Y", 8.0)]
            .iter()
            .map(|(name, v)| {
                PlayerRecord::new(*name, "T", "CB")
                    .with_stat("flat", 3.0)
                    .with_stat("var", *v)
            })
            .collect(),
    );
    let scorer = SimilarityScorer::new(&ds, &["flat".into(), "var".into()], &[]);

    let result = scorer
        .calculate_similarity(&SimilarityQuery::new(
            "R",
            WeightSpec::new([("var", 1.0), ("flat", 1.0)]).unwrap(),
        ))
        .unwrap();
    // flat column -> 50 for everyone; Y (closer on var) still ranks first.
    assert_eq!(result.rows[0].player, "Y");
    assert_eq!(result.rows[1].player, "X");
}

#[test]
fn negative_metric_with_negative_weight_rewards_low_values() {
    let ds = Dataset::from_players(vec![
        PlayerRecord::new("Ref", "T", "CB")
            .with_stat("Fouls per 90", 0.5)
            .with_stat("Passes per 90", 50.0),
        PlayerRecord::new("Clean", "T", "CB")
            .with_stat("Fouls per 90", 0.6)
            .with_stat("Passes per 90", 50.0),
        PlayerRecord::new("Dirty", "T", "CB")
            .with_stat("Fouls per 90", 3.0)
            .with_stat("Passes per 90", 50.0),
    ]);
    let scorer = SimilarityScorer::new(&ds, &["Fouls per 90".into(), "Passes per 90".into()], &[]);
    let weights = WeightSpec::new([("Fouls per 90", -1.0), ("Passes per 90", 1.0)]).unwrap();
    let result = scorer
        .calculate_similarity(&SimilarityQuery::new("Ref", weights))
        .unwrap();
    assert_eq!(result.rows[0].player, "Clean");

    let finder = PresetScorer::new(&ds)
        .score(
            "Discipline",
            &WeightSpec::new([("Fouls per 90", -1.0)]).unwrap(),
            &FilterSpec::default(),
            10,
        )
        .unwrap();
    assert_eq!(finder.rows[0].player, "Ref");
    assert_eq!(finder.rows.last().unwrap().player, "Dirty");
}

#[test]
fn filters_that_remove_everyone_return_empty_ok() {
    let ds = single_stat_dataset(&[("A", 80.0), ("B", 60.0)]);
    let query = SimilarityQuery::new("A", duels_weights())
        .with_filters(FilterSpec::default().with_age_range(30, 35));
    let result = duels_scorer(&ds).calculate_similarity(&query).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.pool_size, 0);
}

#[test]
fn unknown_reference_is_not_found() {
    let ds = single_stat_dataset(&[("A", 80.0), ("B", 60.0)]);
    let err = duels_scorer(&ds)
        .calculate_similarity(&SimilarityQuery::new("Nobody", duels_weights()))
        .unwrap_err();
    assert_eq!(
        err,
        ScoringError::NotFound {
            player: "Nobody".into()
        }
    );
}

#[test]
fn weights_on_absent_columns_are_configuration_errors() {
    let ds = single_stat_dataset(&[("A", 80.0), ("B", 60.0)]);
    let weights = WeightSpec::new([("xG per 90", 1.0), ("Touches in box per 90", 0.5)]).unwrap();
    let err = duels_scorer(&ds)
        .calculate_similarity(&SimilarityQuery::new("A", weights))
        .unwrap_err();
    assert!(matches!(err, ScoringError::Configuration(_)));
}

#[test]
fn same_position_is_exact_string_match() {
    let ds = Dataset::from_players(vec![
        PlayerRecord::new("Ref", "T", "RCB, CB").with_stat(DUELS, 60.0),
        PlayerRecord::new("Same", "T", "RCB, CB").with_stat(DUELS, 50.0),
        PlayerRecord::new("Overlap", "T", "CB").with_stat(DUELS, 55.0),
    ]);
    let query = SimilarityQuery::new("Ref", duels_weights())
        .with_filters(FilterSpec::default().with_same_position(true));
    let result = duels_scorer(&ds).calculate_similarity(&query).unwrap();
    let names: Vec<&str> = result.rows.iter().map(|r| r.player.as_str()).collect();
    assert_eq!(names, vec!["Same"]);
}

#[test]
fn composite_columns_work_as_similarity_dimensions() {
    let composite = |stat: &str| CompositeAttribute {
        display_name: stat.to_string(),
        description: String::new(),
        icon: String::new(),
        components: vec![StatComponent {
            stat: stat.to_string(),
            weight: 1.0,
            use_percentile: true,
        }],
    };
    let mut catalog = PresetCatalog::default();
    catalog.stat_categories = vec![StatCategory {
        name: "Core".into(),
        stats: vec![DUELS.into(), "Passes per 90".into()],
    }];
    catalog.composites.insert("Duelling".into(), composite(DUELS));
    catalog.composites.insert("Passing".into(), composite("Passes per 90"));

    let mut ds = Dataset::from_players(
        [
            ("Ref", 70.0, 40.0),
            ("Opposite", 30.0, 90.0),
            ("Twin", 68.0, 42.0),
            ("Middle", 50.0, 60.0),
        ]
        .iter()
        .map(|(name, duels, passes)| {
            PlayerRecord::new(*name, "Club", "CB")
                .with_stat(DUELS, *duels)
                .with_stat("Passes per 90", *passes)
        })
        .collect(),
    );
    prepare_dataset(&mut ds, &catalog);

    let scorer = SimilarityScorer::from_catalog(&ds, &catalog);
    let weights = WeightSpec::new([("COMP_Duelling", 1.0), ("COMP_Passing", 1.0)]).unwrap();
    let result = scorer
        .calculate_similarity(&SimilarityQuery::new("Ref", weights))
        .unwrap();

    let applied = result.weights.unwrap();
    assert!(applied.iter().all(|(column, _)| column.starts_with("COMP_")));
    let names: Vec<&str> = result.rows.iter().map(|r| r.player.as_str()).collect();
    assert_eq!(names, vec!["Twin", "Middle", "Opposite"]);
    assert_eq!(result.rows[2].similarity_score, 0.0);
    assert_eq!(result.rows[0].metrics[0].0, "COMP_Duelling");
}

/// Reference A plus candidates covering every contract state.
fn contract_dataset() -> Dataset {
    let rows = [
        ("A", 80.0, Some("2027-06-30")),
        ("B", 60.0, Some("2025-06-30")),
        ("C", 40.0, None),
        ("D", 20.0, Some("2028-06-30")),
        ("E", 50.0, Some("end of season")),
        ("F", 70.0, Some("2026-01-31")),
    ];
    Dataset::from_players(
        rows.iter()
            .map(|(name, value, contract)| {
                let mut player = PlayerRecord::new(*name, "Club", "CB").with_stat(DUELS, *value);
                if let Some(date) = contract {
                    player = player.with_contract(*date);
                }
                player.contract_expiring = *name == "F";
                player
            })
            .collect(),
    )
}

fn similar_names(ds: &Dataset, filters: FilterSpec) -> Vec<String> {
    let query = SimilarityQuery::new("A", duels_weights()).with_filters(filters);
    let result = duels_scorer(ds).calculate_similarity(&query).unwrap();
    let mut names: Vec<String> = result.rows.into_iter().map(|r| r.player).collect();
    names.sort();
    names
}

#[test]
fn contract_filters_shape_the_similarity_pool() {
    let ds = contract_dataset();
    let cutoff = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();

    // Malformed dates are kept; the null policy decides C.
    assert_eq!(
        similar_names(&ds, FilterSpec::default().with_contract(cutoff, true)),
        vec!["B", "E", "F"]
    );
    assert_eq!(
        similar_names(&ds, FilterSpec::default().with_contract(cutoff, false)),
        vec!["B", "C", "E", "F"]
    );
    assert_eq!(
        similar_names(&ds, FilterSpec::default().with_only_expiring(true)),
        vec!["F"]
    );
    assert_eq!(
        similar_names(
            &ds,
            FilterSpec::default()
                .with_contract(cutoff, false)
                .with_only_expiring(true)
        ),
        vec!["F"]
    );
}

#[test]
fn cache_returns_identical_results() {
    let ds = single_stat_dataset(&[("A", 80.0), ("B", 60.0), ("C", 40.0)]);
    let scorer = duels_scorer(&ds);
    let mut cache = SimilarityCache::default();
    let query = SimilarityQuery::new("A", duels_weights());
    let direct = scorer.calculate_similarity(&query).unwrap();
    assert_eq!(cache.get_or_compute(&scorer, &query).unwrap(), direct);
    assert_eq!(cache.get_or_compute(&scorer, &query).unwrap(), direct);
    assert_eq!(cache.hits(), 1);
}

// ===========================================================================
// End-to-end with shipped configuration
// ===========================================================================

#[test]
fn load_prepare_and_query_with_default_presets() {
    let (tmp, config) = bootstrap_project();
    write_csv(tmp.path(), "data/def/centre_backs.csv", &fixture_csv());
    // A file missing required columns is skipped.
    write_csv(tmp.path(), "data/mid/broken.csv", "Player,Team\nX,Y\n");

    let mut ds = load_all(&config).unwrap();
    assert_eq!(ds.len(), 6);

    prepare_dataset(&mut ds, &config.presets);
    assert!(ds.has_column("Duels won, %_percentile"));
    assert!(ds.has_column("COMP_Duelling"));
    // Role scores only for finder presets whose stats are all loaded.
    assert!(ds.has_column("ROLE_Central_Defend"));
    assert!(!ds.has_column("ROLE_Ball_Playing_Defender"));
    assert!(ds
        .players()
        .iter()
        .filter_map(|p| p.stat("ROLE_Central_Defend"))
        .all(|score| (0.0..=100.0).contains(&score)));

    // Finder preset with the shipped weights and defaults.
    let preset = &config.presets.finder_presets["Central Defend"];
    let weights = WeightSpec::from_components(&preset.components).unwrap();
    let filters = FilterSpec::default().with_min_minutes(config.finder.min_minutes);
    let found = PresetScorer::new(&ds)
        .score("Central Defend", &weights, &filters, config.finder.top_n)
        .unwrap();
    assert_eq!(found.score_column, "Central_Defend_Score");
    assert_eq!(found.pool_size, 5);
    assert_eq!(found.rows[0].player, "J. Tah");
    assert!(approx_eq(found.rows[0].percentile, 100.0));

    // Contract cutoff with null dates excluded drops Bastoni and the
    // later contracts.
    let cutoff = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
    let contract_filters = filters.clone().with_contract(cutoff, true);
    let expiring = PresetScorer::new(&ds)
        .score("Central Defend", &weights, &contract_filters, 30)
        .unwrap();
    let names: Vec<&str> = expiring.rows.iter().map(|r| r.player.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"J. Tah") && names.contains(&"R. Araujo"));

    // Duelling lists per-90 volumes the fixture does not carry.
    let err = PresetScorer::new(&ds)
        .score_responsibility("Duelling", &config.presets.composites, &filters, 30)
        .unwrap_err();
    assert!(matches!(err, ScoringError::Configuration(_)));

    // Similarity with auto position weights.
    let reference = ds.find("W. Saliba").unwrap().clone();
    let weights = resolve_similarity_weights(&config.presets, &ds, "CB", AUTO_PRESET).unwrap();
    let spec = WeightSpec::new(weights.entries().to_vec()).unwrap();
    let scorer = SimilarityScorer::from_catalog(&ds, &config.presets);
    let query = SimilarityQuery::new(&reference.name, spec.clone())
        .with_filters(
            FilterSpec::default()
                .with_min_minutes(config.similarity.min_minutes)
                .with_age_range(config.similarity.min_age, config.similarity.max_age)
                .with_same_position(config.similarity.same_position),
        )
        .with_league_weights(config.league_weights.clone())
        .with_top_n(config.similarity.top_n);
    let result = scorer.calculate_similarity(&query).unwrap();
    // Same-position drops Bastoni (LCB), min minutes drops the prospect.
    let names: Vec<&str> = result.rows.iter().map(|r| r.player.as_str()).collect();
    assert_eq!(names.len(), 3);
    assert!(!names.contains(&"A. Bastoni"));
    assert!(!names.contains(&"Young Prospect"));

    // Explanations for the top match.
    let target = &result.rows[0].player;
    let metrics = scorer
        .metric_contributions(&reference.name, target, &spec)
        .unwrap();
    assert!(!metrics.is_empty());
    assert!(metrics.iter().all(|m| (0.0..=100.0).contains(&m.similarity)));
    let composites = scorer
        .all_composite_contributions(&reference.name, target, &config.presets.composites)
        .unwrap();
    assert_eq!(composites.len(), config.presets.composites.len());
}
