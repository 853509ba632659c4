// Scoring engine: weight handling, normalization, similarity search,
// preset finder, contribution breakdowns, percentiles and composites.

pub mod cache;
pub mod filters;
pub mod normalize;
pub mod percentile;
pub mod positions;
pub mod preset;
pub mod similarity;
pub mod weights;

pub use cache::SimilarityCache;
pub use filters::{ContractFilter, FilterSpec};
pub use preset::{PresetResult, PresetRow, PresetScorer};
pub use similarity::{SimilarityQuery, SimilarityResult, SimilarityRow, SimilarityScorer};
pub use weights::{normalize_weights, NormalizedWeights, WeightSpec};

/// Errors raised by the scoring engine.
///
/// An empty candidate pool is not an error; queries return a result with no
/// rows instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("player '{player}' not found")]
    NotFound { player: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Default number of rows returned by ranked queries.
pub const DEFAULT_TOP_N: usize = 30;
