// Configuration loading and parsing (scout.toml, presets.toml).

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub data: DataPaths,
    pub similarity: SimilarityDefaults,
    pub finder: FinderDefaults,
    /// Per-league multipliers applied to similarity scores. Leagues not
    /// listed keep a multiplier of 1.0.
    pub league_weights: HashMap<String, f64>,
    pub presets: PresetCatalog,
}

// ---------------------------------------------------------------------------
// scout.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire scout.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ScoutFile {
    data: DataPaths,
    similarity: SimilarityDefaults,
    finder: FinderDefaults,
    #[serde(default)]
    league_weights: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    /// Directory holding one subfolder per positional dataset.
    pub root: String,
    #[serde(default = "default_subfolders")]
    pub subfolders: Vec<String>,
}

fn default_subfolders() -> Vec<String> {
    vec!["def".into(), "mid".into(), "fwd".into()]
}

/// Default filter values for similarity searches.
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityDefaults {
    pub min_minutes: u32,
    pub min_age: u32,
    pub max_age: u32,
    pub top_n: usize,
    pub same_position: bool,
    pub exclude_null_contract: bool,
}

/// Default filter values for the preset-driven player finder.
#[derive(Debug, Clone, Deserialize)]
pub struct FinderDefaults {
    pub min_minutes: u32,
    #[serde(default)]
    pub min_age: Option<u32>,
    #[serde(default)]
    pub max_age: Option<u32>,
    pub top_n: usize,
    pub exclude_null_contract: bool,
}

// ---------------------------------------------------------------------------
// presets.toml structs
// ---------------------------------------------------------------------------

/// One weighted statistic inside a composite attribute or preset.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatComponent {
    pub stat: String,
    pub weight: f64,
    /// Read the `<stat>_percentile` column instead of the raw value.
    #[serde(default = "default_use_percentile")]
    pub use_percentile: bool,
}

fn default_use_percentile() -> bool {
    true
}

/// A named group of statistics shown together (Defensive, Progressive, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct StatCategory {
    pub name: String,
    pub stats: Vec<String>,
}

/// A tactical trait computed as a weighted sum of percentile-ranked stats.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeAttribute {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub components: Vec<StatComponent>,
}

impl CompositeAttribute {
    /// Label used in contribution breakdowns: icon (if any) then name.
    pub fn label(&self) -> String {
        format!("{} {}", self.icon, self.display_name).trim().to_string()
    }
}

/// A weighted-sum preset used by the player finder.
#[derive(Debug, Clone, Deserialize)]
pub struct FinderPreset {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub components: Vec<StatComponent>,
}

/// A role-based similarity preset with explicit stat weights.
#[derive(Debug, Clone, Deserialize)]
pub struct RolePreset {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub applicable_positions: Vec<String>,
    pub weights: Vec<StatComponent>,
}

/// A position-based similarity preset whose weights are derived from the
/// listed composite attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionPreset {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub applicable_positions: Vec<String>,
    pub composites: Vec<String>,
}

/// Everything in presets.toml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetCatalog {
    #[serde(default)]
    pub stat_categories: Vec<StatCategory>,
    #[serde(default)]
    pub composites: BTreeMap<String, CompositeAttribute>,
    #[serde(default)]
    pub finder_presets: BTreeMap<String, FinderPreset>,
    #[serde(default)]
    pub role_presets: BTreeMap<String, RolePreset>,
    #[serde(default)]
    pub position_presets: BTreeMap<String, PositionPreset>,
    #[serde(default)]
    pub position_groups: BTreeMap<String, Vec<String>>,
}

/// Column prefix for precomputed composite attribute scores.
pub const COMPOSITE_PREFIX: &str = "COMP_";

/// Column prefix for whole-dataset finder preset scores.
pub const ROLE_PREFIX: &str = "ROLE_";

impl PresetCatalog {
    /// Every statistic column named in the stat catalog, in category order,
    /// without duplicates.
    pub fn stat_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for category in &self.stat_categories {
            for stat in &category.stats {
                if !columns.contains(stat) {
                    columns.push(stat.clone());
                }
            }
        }
        columns
    }

    /// `COMP_<key>` column names for every configured composite attribute.
    pub fn composite_columns(&self) -> Vec<String> {
        self.composites
            .keys()
            .map(|key| format!("{COMPOSITE_PREFIX}{key}"))
            .collect()
    }
}

/// Kind of similarity preset applicable to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetKind {
    Position,
    Role,
}

/// A similarity preset listed for a given position code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicablePreset {
    pub key: String,
    pub kind: PresetKind,
    pub display_name: String,
    pub description: String,
}

impl PresetCatalog {
    /// All position and role similarity presets that list `position` among
    /// their applicable positions. Position presets come first.
    pub fn applicable_presets(&self, position: &str) -> Vec<ApplicablePreset> {
        let position_presets = self
            .position_presets
            .iter()
            .filter(|(_, p)| p.applicable_positions.iter().any(|a| a == position))
            .map(|(key, p)| ApplicablePreset {
                key: key.clone(),
                kind: PresetKind::Position,
                display_name: p.display_name.clone(),
                description: p.description.clone(),
            });
        let role_presets = self
            .role_presets
            .iter()
            .filter(|(_, p)| p.applicable_positions.iter().any(|a| a == position))
            .map(|(key, p)| ApplicablePreset {
                key: key.clone(),
                kind: PresetKind::Role,
                display_name: p.display_name.clone(),
                description: p.description.clone(),
            });
        position_presets.chain(role_presets).collect()
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/scout.toml` and
/// `config/presets.toml`, both relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let scout_path = config_dir.join("scout.toml");
    let scout_text = read_file(&scout_path)?;
    let scout_file: ScoutFile =
        toml::from_str(&scout_text).map_err(|e| ConfigError::ParseError {
            path: scout_path.clone(),
            source: e,
        })?;

    let presets_path = config_dir.join("presets.toml");
    let presets_text = read_file(&presets_path)?;
    let presets: PresetCatalog =
        toml::from_str(&presets_text).map_err(|e| ConfigError::ParseError {
            path: presets_path.clone(),
            source: e,
        })?;

    let config = Config {
        data: scout_file.data,
        similarity: scout_file.similarity,
        finder: scout_file.finder,
        league_weights: scout_file.league_weights,
        presets,
    };

    validate(&config)?;

    Ok(config)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Copy each `*.toml` file from `defaults/` into `config/` unless a file of
/// that name is already there. Returns the copied paths in name order.
/// Anything else in `defaults/` (such as `.example` templates) is ignored.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        // A populated config/ runs without defaults.
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(copy_error(format!(
            "neither defaults/ nor config/ directory found in {}; \
             run from the project root or ensure defaults/ is present",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create config directory: {e}")))?;

    let mut sources = std::fs::read_dir(&defaults_dir)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<Vec<PathBuf>>>()
        })
        .map_err(|e| copy_error(format!("failed to read defaults directory: {e}")))?;
    sources.retain(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"));
    sources.sort();

    let mut copied = Vec::new();
    for source in sources {
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        // Never overwrite an existing file.
        let mut dest = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(dest) => dest,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(copy_error(format!(
                    "failed to create {}: {e}",
                    target.display()
                )))
            }
        };
        let mut src = std::fs::File::open(&source)
            .map_err(|e| copy_error(format!("failed to read {}: {e}", source.display())))?;
        std::io::copy(&mut src, &mut dest)
            .map_err(|e| copy_error(format!("failed to write {}: {e}", target.display())))?;

        info!("Copied default {} into {}", file_name.to_string_lossy(), config_dir.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to `base_dir`, copying default
/// config files first.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let sim = &config.similarity;
    if sim.top_n == 0 {
        return Err(invalid("similarity.top_n", "must be > 0"));
    }
    if sim.min_age > sim.max_age {
        return Err(invalid(
            "similarity.min_age",
            format!("must not exceed max_age ({} > {})", sim.min_age, sim.max_age),
        ));
    }

    let finder = &config.finder;
    if finder.top_n == 0 {
        return Err(invalid("finder.top_n", "must be > 0"));
    }
    if let (Some(lo), Some(hi)) = (finder.min_age, finder.max_age) {
        if lo > hi {
            return Err(invalid(
                "finder.min_age",
                format!("must not exceed max_age ({lo} > {hi})"),
            ));
        }
    }

    for (league, weight) in &config.league_weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(invalid(
                format!("league_weights.{league}"),
                format!("must be a finite value >= 0, got {weight}"),
            ));
        }
    }

    let presets = &config.presets;
    for (key, composite) in &presets.composites {
        validate_components(&format!("composites.{key}"), &composite.components)?;
    }
    for (key, preset) in &presets.finder_presets {
        validate_components(&format!("finder_presets.{key}"), &preset.components)?;
    }
    for (key, preset) in &presets.role_presets {
        validate_components(&format!("role_presets.{key}"), &preset.weights)?;
    }
    for (key, preset) in &presets.position_presets {
        if preset.composites.is_empty() {
            return Err(invalid(
                format!("position_presets.{key}.composites"),
                "must list at least one composite attribute",
            ));
        }
        for name in &preset.composites {
            if !presets.composites.contains_key(name) {
                return Err(invalid(
                    format!("position_presets.{key}.composites"),
                    format!("unknown composite attribute `{name}`"),
                ));
            }
        }
    }

    Ok(())
}

fn validate_components(field: &str, components: &[StatComponent]) -> Result<(), ConfigError> {
    if components.is_empty() {
        return Err(invalid(field, "must contain at least one weighted stat"));
    }
    for c in components {
        if !c.weight.is_finite() {
            return Err(invalid(
                format!("{field}.{}", c.stat),
                format!("weight must be finite, got {}", c.weight),
            ));
        }
    }
    let total: f64 = components.iter().map(|c| c.weight.abs()).sum();
    if total == 0.0 {
        return Err(invalid(field, "total absolute weight must be > 0"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
