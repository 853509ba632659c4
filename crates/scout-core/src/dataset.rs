// Player dataset loading and schema validation.
//
// Reads Wyscout-style league exports: one CSV per league and positional
// group, stored under `<root>/{def,mid,fwd}/`. Identity columns become typed
// fields on `PlayerRecord`; every other column that holds numbers becomes a
// statistic column addressable by its header text.

use crate::config::{Config, DataPaths};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One player row: identity fields plus numeric statistic columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRecord {
    pub name: String,
    pub team: String,
    pub league: String,
    /// Comma- or slash-separated position codes, kept verbatim.
    pub position: String,
    pub age: u32,
    pub minutes: u32,
    /// Raw contract expiry text (`YYYY-MM-DD` when well formed).
    pub contract_expires: Option<String>,
    pub market_value: Option<f64>,
    pub birth_country: Option<String>,
    /// Set when the player appears on a contract-expiry list.
    pub contract_expiring: bool,
    /// Numeric columns. Missing or unparseable cells are absent.
    pub stats: HashMap<String, f64>,
}

/// Parsed state of a player's contract expiry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractStatus {
    Missing,
    Expires(NaiveDate),
    /// Present but not a `YYYY-MM-DD` date.
    Malformed,
}

impl PlayerRecord {
    /// Builder-style constructor used by loaders and tests.
    pub fn new(
        name: impl Into<String>,
        team: impl Into<String>,
        position: impl Into<String>,
    ) -> Self {
        PlayerRecord {
            name: name.into(),
            team: team.into(),
            league: String::new(),
            position: position.into(),
            age: 0,
            minutes: 0,
            contract_expires: None,
            market_value: None,
            birth_country: None,
            contract_expiring: false,
            stats: HashMap::new(),
        }
    }

    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league = league.into();
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = age;
        self
    }

    pub fn with_minutes(mut self, minutes: u32) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn with_contract(mut self, expires: impl Into<String>) -> Self {
        self.contract_expires = Some(expires.into());
        self
    }

    pub fn with_stat(mut self, column: impl Into<String>, value: f64) -> Self {
        self.stats.insert(column.into(), value);
        self
    }

    /// Value of a numeric column, if present.
    pub fn stat(&self, column: &str) -> Option<f64> {
        self.stats.get(column).copied()
    }

    /// Value of a numeric column, or `default` when missing.
    pub fn stat_or(&self, column: &str, default: f64) -> f64 {
        self.stat(column).unwrap_or(default)
    }

    /// Individual position codes from the position string.
    pub fn position_codes(&self) -> Vec<&str> {
        self.position
            .split([',', '/'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn contract_status(&self) -> ContractStatus {
        match self.contract_expires.as_deref().map(str::trim) {
            None | Some("") => ContractStatus::Missing,
            Some(text) if text.eq_ignore_ascii_case("nan") => ContractStatus::Missing,
            Some(text) => match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                Ok(date) => ContractStatus::Expires(date),
                Err(_) => ContractStatus::Malformed,
            },
        }
    }
}

/// An immutable snapshot of player rows plus the ordered numeric column list.
///
/// Row order is load order and serves as the tie-breaker for every ranking.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    players: Vec<PlayerRecord>,
    columns: Vec<String>,
}

/// Sorted distinct positions and leagues present in a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctValues {
    pub positions: Vec<String>,
    pub leagues: Vec<String>,
}

impl Dataset {
    pub fn new(players: Vec<PlayerRecord>, columns: Vec<String>) -> Self {
        Dataset { players, columns }
    }

    /// Build a dataset whose column list is inferred from the players' stats
    /// (sorted by name).
    pub fn from_players(players: Vec<PlayerRecord>) -> Self {
        let columns: BTreeSet<String> = players
            .iter()
            .flat_map(|p| p.stats.keys().cloned())
            .collect();
        Dataset {
            players,
            columns: columns.into_iter().collect(),
        }
    }

    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// First player whose name matches exactly.
    pub fn find(&self, name: &str) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Minimum and maximum of the present values in a column.
    pub fn column_range(&self, column: &str) -> Option<(f64, f64)> {
        self.players
            .iter()
            .filter_map(|p| p.stat(column))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Write (or overwrite) a numeric column. `values` is indexed by row;
    /// `None` clears the cell.
    pub fn set_column(&mut self, column: &str, values: &[Option<f64>]) {
        for (player, value) in self.players.iter_mut().zip(values) {
            match value {
                Some(v) => {
                    player.stats.insert(column.to_string(), *v);
                }
                None => {
                    player.stats.remove(column);
                }
            }
        }
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    pub fn distinct_values(&self) -> DistinctValues {
        let positions: BTreeSet<String> = self
            .players
            .iter()
            .filter(|p| !p.position.is_empty())
            .map(|p| p.position.clone())
            .collect();
        let leagues: BTreeSet<String> = self
            .players
            .iter()
            .filter(|p| !p.league.is_empty())
            .map(|p| p.league.clone())
            .collect();
        DistinctValues {
            positions: positions.into_iter().collect(),
            leagues: leagues.into_iter().collect(),
        }
    }

    /// Keep players with at least one position code in `positions` and whose
    /// league is in `leagues`. An empty list means "no constraint".
    pub fn filter_players(&self, positions: &[String], leagues: &[String]) -> Dataset {
        let players = self
            .players
            .iter()
            .filter(|p| {
                positions.is_empty()
                    || p.position_codes().iter().any(|code| positions.iter().any(|w| w == code))
            })
            .filter(|p| leagues.is_empty() || leagues.contains(&p.league))
            .cloned()
            .collect();
        Dataset {
            players,
            columns: self.columns.clone(),
        }
    }

    /// Keep players whose full position string is one of `group`'s codes.
    /// An empty group keeps everyone.
    pub fn filter_by_position_group(&self, group: &[String]) -> Dataset {
        if group.is_empty() {
            return self.clone();
        }
        let players = self
            .players
            .iter()
            .filter(|p| group.contains(&p.position))
            .cloned()
            .collect();
        Dataset {
            players,
            columns: self.columns.clone(),
        }
    }

    /// Stable hash of the dataset contents, used to key cached query results.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.columns.hash(&mut hasher);
        for player in &self.players {
            player.name.hash(&mut hasher);
            player.team.hash(&mut hasher);
            player.league.hash(&mut hasher);
            player.position.hash(&mut hasher);
            player.age.hash(&mut hasher);
            player.minutes.hash(&mut hasher);
            player.contract_expires.hash(&mut hasher);
            player.contract_expiring.hash(&mut hasher);
            for column in &self.columns {
                player.stat(column).map(f64::to_bits).hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path}: missing required columns {missing:?}")]
    Schema { path: String, missing: Vec<String> },

    #[error("no usable player data: {0}")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// Header mapping
// ---------------------------------------------------------------------------

/// Columns every league file must provide (after alias resolution).
pub const REQUIRED_COLUMNS: &[&str] = &["Player", "Age", "League", "Position", "Team"];

/// Index of each identity column within a CSV header row.
#[derive(Debug, Default)]
struct HeaderMap {
    player: Option<usize>,
    team: Option<usize>,
    league: Option<usize>,
    position: Option<usize>,
    age: Option<usize>,
    minutes: Option<usize>,
    contract: Option<usize>,
    market_value: Option<usize>,
    birth_country: Option<usize>,
    expiring_flag: Option<usize>,
    /// (index, header) for every non-identity column.
    stats: Vec<(usize, String)>,
}

impl HeaderMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = HeaderMap::default();
        for (idx, raw) in headers.iter().enumerate() {
            let header = raw.trim_start_matches('\u{feff}').trim();
            // Leading pandas index column.
            if idx == 0 && (header.is_empty() || header.starts_with("Unnamed")) {
                continue;
            }
            let slot = match header {
                "Player" => &mut map.player,
                "Team" => &mut map.team,
                "League" => &mut map.league,
                "Competition" => {
                    if map.league.is_none() {
                        map.league = Some(idx);
                    }
                    continue;
                }
                "Position" => &mut map.position,
                "Age" => &mut map.age,
                "Minutes" => &mut map.minutes,
                "Minutes played" => {
                    if map.minutes.is_none() {
                        map.minutes = Some(idx);
                    }
                    continue;
                }
                "Contract expires" => &mut map.contract,
                "Market value" => &mut map.market_value,
                "Birth country" => &mut map.birth_country,
                "contract_expiry" => &mut map.expiring_flag,
                _ => {
                    if !header.is_empty() {
                        map.stats.push((idx, header.to_string()));
                    }
                    continue;
                }
            };
            *slot = Some(idx);
        }
        map
    }

    fn missing_required(&self) -> Vec<String> {
        let present = [
            ("Player", self.player),
            ("Age", self.age),
            ("League", self.league),
            ("Position", self.position),
            ("Team", self.team),
        ];
        present
            .iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

fn cell<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
}

/// Parse a numeric cell; non-finite values count as missing.
fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_flag(text: &str) -> bool {
    matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

// ---------------------------------------------------------------------------
// Reader-based loader (enables testing without temp files)
// ---------------------------------------------------------------------------

/// Parsed contents of one CSV source.
#[derive(Debug)]
struct LoadedTable {
    players: Vec<PlayerRecord>,
    columns: Vec<String>,
}

fn load_table_from_reader<R: Read>(rdr: R, source: &str) -> Result<LoadedTable, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers = reader
        .headers()
        .map_err(|e| DatasetError::Csv {
            path: source.to_string(),
            source: e,
        })?
        .clone();
    let header_map = HeaderMap::from_headers(&headers);

    let missing = header_map.missing_required();
    if !missing.is_empty() {
        return Err(DatasetError::Schema {
            path: source.to_string(),
            missing,
        });
    }

    let mut players = Vec::new();
    let mut numeric_columns: Vec<bool> = vec![false; header_map.stats.len()];

    for (row_idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("{source}: skipping malformed row {}: {}", row_idx + 1, e);
                continue;
            }
        };

        let Some(name) = cell(&record, header_map.player) else {
            warn!("{source}: skipping row {} with no player name", row_idx + 1);
            continue;
        };
        let Some(age) = cell(&record, header_map.age).and_then(parse_number) else {
            warn!("{source}: skipping player '{name}': missing or invalid age");
            continue;
        };

        let mut stats = HashMap::new();
        for (slot, (idx, header)) in header_map.stats.iter().enumerate() {
            if let Some(value) = cell(&record, Some(*idx)).and_then(parse_number) {
                stats.insert(header.clone(), value);
                numeric_columns[slot] = true;
            }
        }

        players.push(PlayerRecord {
            name: name.to_string(),
            team: cell(&record, header_map.team).unwrap_or_default().to_string(),
            league: cell(&record, header_map.league).unwrap_or_default().to_string(),
            position: cell(&record, header_map.position).unwrap_or_default().to_string(),
            age: age.round().max(0.0) as u32,
            minutes: cell(&record, header_map.minutes)
                .and_then(parse_number)
                .map(|m| m.round().max(0.0) as u32)
                .unwrap_or(0),
            contract_expires: cell(&record, header_map.contract).map(str::to_string),
            market_value: cell(&record, header_map.market_value).and_then(parse_number),
            birth_country: cell(&record, header_map.birth_country).map(str::to_string),
            contract_expiring: cell(&record, header_map.expiring_flag).is_some_and(parse_flag),
            stats,
        });
    }

    let columns = header_map
        .stats
        .iter()
        .zip(&numeric_columns)
        .filter(|(_, numeric)| **numeric)
        .map(|((_, header), _)| header.clone())
        .collect();

    Ok(LoadedTable { players, columns })
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load a single league CSV file.
pub fn load_player_file(path: &Path) -> Result<Dataset, DatasetError> {
    let file = std::fs::File::open(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let table = load_table_from_reader(file, &path.display().to_string())?;
    Ok(Dataset::new(table.players, table.columns))
}

/// Load player data from any reader (one CSV document).
pub fn load_player_reader<R: Read>(rdr: R, source: &str) -> Result<Dataset, DatasetError> {
    let table = load_table_from_reader(rdr, source)?;
    Ok(Dataset::new(table.players, table.columns))
}

/// CSV files under each configured subfolder, sorted for deterministic
/// row order.
fn discover_csv_files(paths: &DataPaths) -> Result<Vec<PathBuf>, DatasetError> {
    let root = Path::new(&paths.root);
    let mut files = Vec::new();
    for sub in &paths.subfolders {
        let dir = root.join(sub);
        if !dir.is_dir() {
            debug!("dataset subfolder {} not present", dir.display());
            continue;
        }
        let entries = std::fs::read_dir(&dir).map_err(|e| DatasetError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

/// Load and combine every league file under the configured data root.
///
/// Files that fail to open, parse, or validate are skipped with a warning;
/// an error is returned only if no file could be loaded.
pub fn load_all_from_paths(paths: &DataPaths) -> Result<Dataset, DatasetError> {
    let files = discover_csv_files(paths)?;
    if files.is_empty() {
        return Err(DatasetError::Empty(format!(
            "no CSV files found in {}",
            paths.root
        )));
    }

    let mut players = Vec::new();
    let mut columns: Vec<String> = Vec::new();
    let mut errors = Vec::new();

    for path in &files {
        match load_player_file(path) {
            Ok(dataset) => {
                for column in dataset.columns() {
                    if !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
                players.extend(dataset.players);
            }
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                errors.push(e.to_string());
            }
        }
    }

    if players.is_empty() && !errors.is_empty() {
        return Err(DatasetError::Empty(format!(
            "failed to load any CSV files: {}",
            errors.join("; ")
        )));
    }

    info!(
        "Loaded {} players with {} numeric columns from {} files ({} skipped)",
        players.len(),
        columns.len(),
        files.len() - errors.len(),
        errors.len()
    );

    Ok(Dataset::new(players, columns))
}

/// Load all league data using the paths from the config.
pub fn load_all(config: &Config) -> Result<Dataset, DatasetError> {
    load_all_from_paths(&config.data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
