// Keyword intent classification and entity extraction for chat queries.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static BETWEEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"between\s+(\d+)\s+and\s+(\d+)").expect("valid regex"));
static UNDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"under\s+(\d+)").expect("valid regex"));
static OVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"over\s+(\d+)").expect("valid regex"));
static THRESHOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[><]\s*(\d+(?:\.\d+)?)").expect("valid regex"));

// ---------------------------------------------------------------------------
// Keyword tables
// ---------------------------------------------------------------------------

const LOOKUP_KEYWORDS: &[&str] = &["stats", "show me", "who is", "tell me about", "information"];
const COMPARISON_KEYWORDS: &[&str] = &["compare", "versus", "vs"];
const FINDER_KEYWORDS: &[&str] = &["find", "show me", "list", "who are", "search for"];
const ROLE_KEYWORDS: &[&str] = &["role", "fit", "profile", "style", "best fits"];
const EXPLANATION_KEYWORDS: &[&str] = &["explain", "what is", "why", "how", "mean"];

/// Words never treated as player names, compared case-insensitively.
const COMMON_WORDS: &[&str] = &[
    "find", "show", "compare", "who", "what", "how", "why", "is", "a", "the", "for", "in", "with",
    "about", "stats", "top", "best", "list", "players", "from",
];

/// Checked in order; the first code found anywhere in the query wins.
const POSITION_CODES: &[&str] = &[
    "CB", "DM", "CM", "CDM", "AM", "CAM", "CF", "LW", "RW", "LB", "RB", "LWB", "RWB", "GK", "LCB",
    "RCB", "DMF", "CMF", "LMF", "RMF", "AMF", "SS", "LF", "RF",
];

const DEFAULT_COMPOSITES: &[&str] = &[
    "Security",
    "ProgPass",
    "BallCarrying",
    "Creativity",
    "Finishing",
    "BoxPresence",
    "Movement",
    "Pressing",
    "OneOnOneAbility",
    "WideCreation",
    "BuildUp",
    "FinalBall",
    "DM_Destroying",
    "DM_BallWinning",
    "DM_Dictating",
    "DM_ProgPass",
    "DM_BallCarrying",
    "DM_BoxCrashing",
];

const DEFAULT_METRICS: &[&str] = &[
    "xG per 90",
    "Goals per 90",
    "Assists per 90",
    "Passes per 90",
    "Duels won, %",
    "Progressive passes per 90",
    "xA per 90",
    "Successful dribbles, %",
    "Touches in box per 90",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    PlayerLookup,
    PlayerFinder,
    Comparison,
    RoleAnalysis,
    Explanation,
    General,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryEntities {
    /// Candidate names; only filled for lookups and comparisons.
    pub players: Vec<String>,
    pub position: Option<String>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub composite_attr: Option<String>,
    pub metrics: Vec<String>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedQuery {
    pub intent: QueryIntent,
    pub entities: QueryEntities,
    pub original_query: String,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Capitalized words that could be player names.
///
/// Surrounding punctuation is stripped; common question words are skipped.
pub fn candidate_names(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 1)
        .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
        .filter(|w| !COMMON_WORDS.contains(&w.to_lowercase().as_str()))
        .map(str::to_string)
        .collect()
}

/// Classify a query by keyword, first match wins.
///
/// A lookup additionally needs exactly one candidate name; otherwise the
/// query falls through to the remaining rules.
pub fn classify_intent(query: &str) -> QueryIntent {
    let lower = query.to_lowercase();

    if contains_any(&lower, LOOKUP_KEYWORDS) && candidate_names(query).len() == 1 {
        return QueryIntent::PlayerLookup;
    }
    if contains_any(&lower, COMPARISON_KEYWORDS) {
        return QueryIntent::Comparison;
    }
    if contains_any(&lower, FINDER_KEYWORDS) {
        return QueryIntent::PlayerFinder;
    }
    if contains_any(&lower, ROLE_KEYWORDS) {
        return QueryIntent::RoleAnalysis;
    }
    if contains_any(&lower, EXPLANATION_KEYWORDS) {
        return QueryIntent::Explanation;
    }
    QueryIntent::General
}

// ---------------------------------------------------------------------------
// Entity parsers
// ---------------------------------------------------------------------------

/// First listed position code that appears (case-insensitively) in the query.
pub fn parse_position(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    POSITION_CODES
        .iter()
        .find(|code| lower.contains(&code.to_lowercase()))
        .map(|code| code.to_string())
}

/// `between X and Y`, `under X` or `over X`, checked in that order.
pub fn parse_age_range(query: &str) -> Option<(Option<u32>, Option<u32>)> {
    let lower = query.to_lowercase();
    let number =
        |caps: &regex::Captures, i: usize| caps.get(i).and_then(|m| m.as_str().parse().ok());

    if let Some(caps) = BETWEEN_RE.captures(&lower) {
        return Some((number(&caps, 1), number(&caps, 2)));
    }
    if let Some(caps) = UNDER_RE.captures(&lower) {
        return Some((None, number(&caps, 1)));
    }
    if let Some(caps) = OVER_RE.captures(&lower) {
        return Some((number(&caps, 1), None));
    }
    None
}

/// Number following the first `>` or `<`.
pub fn parse_threshold(query: &str) -> Option<f64> {
    THRESHOLD_RE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Turns raw chat text into an intent plus entities.
#[derive(Debug, Clone)]
pub struct QueryParser {
    composite_attributes: Vec<String>,
    metrics: Vec<String>,
}

impl Default for QueryParser {
    fn default() -> Self {
        QueryParser {
            composite_attributes: DEFAULT_COMPOSITES.iter().map(|s| s.to_string()).collect(),
            metrics: DEFAULT_METRICS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl QueryParser {
    /// Parser recognizing the given composite attribute keys and metric names.
    pub fn new(composite_attributes: Vec<String>, metrics: Vec<String>) -> Self {
        QueryParser {
            composite_attributes,
            metrics,
        }
    }

    pub fn parse_composite_attribute(&self, query: &str) -> Option<String> {
        let lower = query.to_lowercase();
        self.composite_attributes
            .iter()
            .find(|attr| lower.contains(&attr.to_lowercase()))
            .cloned()
    }

    pub fn parse_metrics(&self, query: &str) -> Vec<String> {
        let lower = query.to_lowercase();
        self.metrics
            .iter()
            .filter(|m| lower.contains(&m.to_lowercase()))
            .cloned()
            .collect()
    }

    pub fn extract_entities(&self, query: &str, intent: QueryIntent) -> QueryEntities {
        let (min_age, max_age) = parse_age_range(query).unwrap_or((None, None));
        QueryEntities {
            players: match intent {
                QueryIntent::PlayerLookup | QueryIntent::Comparison => candidate_names(query),
                _ => Vec::new(),
            },
            position: parse_position(query),
            min_age,
            max_age,
            composite_attr: self.parse_composite_attribute(query),
            metrics: self.parse_metrics(query),
            threshold: parse_threshold(query),
        }
    }

    pub fn process(&self, query: &str) -> ProcessedQuery {
        let intent = classify_intent(query);
        ProcessedQuery {
            intent,
            entities: self.extract_entities(query, intent),
            original_query: query.to_string(),
        }
    }
}
