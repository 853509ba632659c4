// Scout command-line entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, so stdout stays machine readable)
// 2. Load config, copying defaults on first run
// 3. Load every league file, add percentile and composite columns
// 4. Run the requested subcommand and print text or JSON

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use scout_core::config::{self, Config, PresetKind};
use scout_core::dataset::{self, Dataset};
use scout_core::scoring::percentile::prepare_dataset;
use scout_core::scoring::positions::{resolve_similarity_weights, AUTO_PRESET};
use scout_core::scoring::similarity::{CompositeContribution, MetricContribution};
use scout_core::scoring::{FilterSpec, PresetScorer, SimilarityQuery, SimilarityScorer, WeightSpec};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "scout", about = "Player similarity search and preset finder")]
struct Cli {
    /// Directory containing config/ (and the data root, if relative).
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Players most similar to a reference player.
    Similar(SimilarArgs),
    /// Rank players by a finder preset or a composite attribute.
    Find(FindArgs),
    /// Why two players are alike, metric by metric.
    Explain(ExplainArgs),
    /// List finder presets, or the similarity presets for a position.
    Presets {
        #[arg(long)]
        position: Option<String>,
    },
}

/// Filters shared by `similar` and `find`. Unset values use config defaults.
#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long)]
    top_n: Option<usize>,
    #[arg(long)]
    min_minutes: Option<u32>,
    #[arg(long)]
    min_age: Option<u32>,
    #[arg(long)]
    max_age: Option<u32>,
    /// Keep players whose contract expires on or before this date (YYYY-MM-DD).
    #[arg(long)]
    contract_before: Option<NaiveDate>,
    /// Drop players without a contract date when filtering by contract.
    #[arg(long)]
    exclude_null_contract: Option<bool>,
    /// Only players flagged as expiring.
    #[arg(long)]
    only_expiring: bool,
}

#[derive(Debug, Args)]
struct SimilarArgs {
    player: String,
    /// `auto`, a position preset or a role preset.
    #[arg(long, default_value = AUTO_PRESET)]
    preset: String,
    /// Restrict candidates to the reference player's exact position.
    #[arg(long)]
    same_position: Option<bool>,
    /// Ignore configured league multipliers.
    #[arg(long)]
    no_league_weights: bool,
    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Debug, Args)]
struct FindArgs {
    /// Finder preset, or composite attribute with `--responsibility`.
    preset: String,
    /// Score by a composite attribute's component statistics.
    #[arg(long)]
    responsibility: bool,
    /// Restrict the pool to a configured position group.
    #[arg(long)]
    group: Option<String>,
    /// Restrict the pool to these leagues.
    #[arg(long)]
    league: Vec<String>,
    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Debug, Args)]
struct ExplainArgs {
    reference: String,
    target: String,
    #[arg(long, default_value = AUTO_PRESET)]
    preset: String,
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = config::load_config(&cli.base_dir).context("failed to load configuration")?;

    if let Command::Presets { position } = &cli.command {
        return list_presets(&config, position.as_deref(), cli.json);
    }

    let dataset = load_dataset(&config, &cli.base_dir)?;

    match &cli.command {
        Command::Similar(args) => run_similar(&config, &dataset, args, cli.json),
        Command::Find(args) => run_find(&config, &dataset, args, cli.json),
        Command::Explain(args) => run_explain(&config, &dataset, args, cli.json),
        Command::Presets { .. } => Ok(()),
    }
}

/// Initialize tracing to stderr with an env-overridable filter.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scout=info,scout_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

fn load_dataset(config: &Config, base_dir: &Path) -> anyhow::Result<Dataset> {
    let mut paths = config.data.clone();
    if Path::new(&paths.root).is_relative() {
        paths.root = base_dir.join(&paths.root).to_string_lossy().into_owned();
    }
    let mut dataset = dataset::load_all_from_paths(&paths)
        .with_context(|| format!("failed to load player data from {}", paths.root))?;
    prepare_dataset(&mut dataset, &config.presets);
    Ok(dataset)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

fn age_range(min: Option<u32>, max: Option<u32>) -> Option<(u32, u32)> {
    match (min, max) {
        (None, None) => None,
        (min, max) => Some((min.unwrap_or(0), max.unwrap_or(u32::MAX))),
    }
}

fn build_filters(
    args: &FilterArgs,
    min_minutes: u32,
    ages: Option<(u32, u32)>,
    exclude_null: bool,
) -> FilterSpec {
    let mut filters = FilterSpec::default()
        .with_min_minutes(args.min_minutes.unwrap_or(min_minutes))
        .with_only_expiring(args.only_expiring);
    if let Some((min, max)) = age_range(args.min_age, args.max_age).or(ages) {
        filters = filters.with_age_range(min, max);
    }
    if let Some(date) = args.contract_before {
        let exclude_null = args.exclude_null_contract.unwrap_or(exclude_null);
        filters = filters.with_contract(date, exclude_null);
    }
    filters
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run_similar(
    config: &Config,
    dataset: &Dataset,
    args: &SimilarArgs,
    json: bool,
) -> anyhow::Result<()> {
    let defaults = &config.similarity;
    let Some(reference) = dataset.find(&args.player) else {
        bail!("player '{}' not found", args.player);
    };
    let position = reference.position_codes().first().copied().unwrap_or_default();

    let weights = resolve_similarity_weights(&config.presets, dataset, position, &args.preset)
        .with_context(|| format!("failed to resolve weights for preset '{}'", args.preset))?;
    let filters = build_filters(
        &args.filters,
        defaults.min_minutes,
        Some((defaults.min_age, defaults.max_age)),
        defaults.exclude_null_contract,
    )
    .with_same_position(args.same_position.unwrap_or(defaults.same_position));

    let weights = WeightSpec::new(weights.entries().to_vec())?;
    let mut query = SimilarityQuery::new(args.player.as_str(), weights)
        .with_filters(filters)
        .with_top_n(args.filters.top_n.unwrap_or(defaults.top_n));
    if !args.no_league_weights {
        query = query.with_league_weights(config.league_weights.clone());
    }

    info!("similarity search for {} with preset '{}'", args.player, args.preset);
    let scorer = SimilarityScorer::from_catalog(dataset, &config.presets);
    let result = scorer.calculate_similarity(&query)?;

    if json {
        return print_json(&result);
    }
    if result.is_empty() {
        println!("No players match the filters.");
        return Ok(());
    }
    println!(
        "Players similar to {} ({} candidates)",
        result.reference, result.pool_size
    );
    for row in &result.rows {
        println!(
            "{:>3}. {:<28} {:<22} {:<18} {:>3}  {:.3}  {:>5.1}",
            row.rank,
            row.player,
            row.team,
            row.position,
            row.age,
            row.similarity_score,
            row.similarity_percentile
        );
    }
    Ok(())
}

/// The finder pool: the whole dataset, or one position group and/or leagues.
fn finder_pool(config: &Config, dataset: &Dataset, args: &FindArgs) -> anyhow::Result<Dataset> {
    let pool = match &args.group {
        Some(group) => {
            let Some(codes) = config.presets.position_groups.get(group) else {
                bail!("unknown position group '{group}'");
            };
            dataset.filter_by_position_group(codes)
        }
        None => dataset.clone(),
    };
    Ok(pool.filter_players(&[], &args.league))
}

fn run_find(
    config: &Config,
    dataset: &Dataset,
    args: &FindArgs,
    json: bool,
) -> anyhow::Result<()> {
    let defaults = &config.finder;
    let ages = age_range(defaults.min_age, defaults.max_age);
    let filters = build_filters(
        &args.filters,
        defaults.min_minutes,
        ages,
        defaults.exclude_null_contract,
    );
    let top_n = args.filters.top_n.unwrap_or(defaults.top_n);

    let pool = finder_pool(config, dataset, args)?;
    let scorer = PresetScorer::new(&pool);
    let result = if args.responsibility {
        info!("responsibility search for '{}'", args.preset);
        scorer.score_responsibility(&args.preset, &config.presets.composites, &filters, top_n)?
    } else {
        let Some(preset) = config.presets.finder_presets.get(&args.preset) else {
            bail!("unknown finder preset '{}'", args.preset);
        };
        let weights = WeightSpec::from_components(&preset.components)?;
        scorer.score(&args.preset, &weights, &filters, top_n)?
    };

    if json {
        return print_json(&result);
    }
    if result.rows.is_empty() {
        println!("No players match the filters.");
        return Ok(());
    }
    println!("{} ({} candidates)", result.score_column, result.pool_size);
    for row in &result.rows {
        println!(
            "{:>3}. {:<28} {:<22} {:<20} {:>3}  {:>6.2}  {:>5.1}",
            row.rank,
            row.player,
            row.team,
            row.league,
            row.age,
            row.score,
            row.percentile
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct Explanation {
    reference: String,
    target: String,
    metrics: Vec<MetricContribution>,
    composites: Vec<CompositeContribution>,
}

fn run_explain(
    config: &Config,
    dataset: &Dataset,
    args: &ExplainArgs,
    json: bool,
) -> anyhow::Result<()> {
    let Some(reference) = dataset.find(&args.reference) else {
        bail!("player '{}' not found", args.reference);
    };
    let position = reference.position_codes().first().copied().unwrap_or_default();
    let weights = resolve_similarity_weights(&config.presets, dataset, position, &args.preset)?;
    let weights = WeightSpec::new(weights.entries().to_vec())?;

    let scorer = SimilarityScorer::from_catalog(dataset, &config.presets);
    let explanation = Explanation {
        reference: args.reference.clone(),
        target: args.target.clone(),
        metrics: scorer.metric_contributions(&args.reference, &args.target, &weights)?,
        composites: scorer.all_composite_contributions(
            &args.reference,
            &args.target,
            &config.presets.composites,
        )?,
    };

    if json {
        return print_json(&explanation);
    }
    println!("{} vs {}", explanation.reference, explanation.target);
    for m in &explanation.metrics {
        println!(
            "  {:<36} {:>8.2} {:>8.2}  sim {:>5.1}  contrib {:>6.2}",
            m.metric, m.reference_value, m.target_value, m.similarity, m.contribution
        );
    }
    if !explanation.composites.is_empty() {
        println!("Composite attributes:");
        for c in &explanation.composites {
            println!(
                "  {:<36} {:>8.1} {:>8.1}  sim {:>5.1}",
                c.display_name, c.reference_value, c.target_value, c.similarity
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PresetListing {
    key: String,
    kind: &'static str,
    description: String,
}

fn list_presets(config: &Config, position: Option<&str>, json: bool) -> anyhow::Result<()> {
    let listing: Vec<PresetListing> = match position {
        Some(position) => config
            .presets
            .applicable_presets(position)
            .into_iter()
            .map(|p| PresetListing {
                key: p.key,
                kind: match p.kind {
                    PresetKind::Position => "position",
                    PresetKind::Role => "role",
                },
                description: p.description,
            })
            .collect(),
        None => config
            .presets
            .finder_presets
            .iter()
            .map(|(key, p)| PresetListing {
                key: key.clone(),
                kind: "finder",
                description: p.description.clone(),
            })
            .collect(),
    };

    if json {
        return print_json(&listing);
    }
    if listing.is_empty() {
        println!("No presets found.");
    }
    for p in &listing {
        println!("{:<28} {:<9} {}", p.key, p.kind, p.description);
    }
    Ok(())
}
