// Caller-owned memoization of similarity queries.

use super::similarity::{SimilarityQuery, SimilarityResult, SimilarityScorer};
use super::ScoringError;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use tracing::debug;

const DEFAULT_CAPACITY: usize = 64;

/// Hash of everything a similarity result depends on.
pub fn query_key(dataset_fingerprint: u64, query: &SimilarityQuery) -> u64 {
    let mut hasher = DefaultHasher::new();
    dataset_fingerprint.hash(&mut hasher);
    query.reference.hash(&mut hasher);
    for (column, weight) in query.weights.entries() {
        column.hash(&mut hasher);
        weight.to_bits().hash(&mut hasher);
    }
    query.filters.hash(&mut hasher);
    match &query.league_weights {
        Some(leagues) => {
            let mut sorted: Vec<(&String, &f64)> = leagues.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            sorted.len().hash(&mut hasher);
            for (league, weight) in sorted {
                league.hash(&mut hasher);
                weight.to_bits().hash(&mut hasher);
            }
        }
        None => usize::MAX.hash(&mut hasher),
    }
    query.top_n.hash(&mut hasher);
    hasher.finish()
}

/// Bounded result cache. Oldest entries are evicted first.
#[derive(Debug)]
pub struct SimilarityCache {
    capacity: usize,
    entries: HashMap<u64, SimilarityResult>,
    order: VecDeque<u64>,
    hits: u64,
    misses: u64,
}

impl Default for SimilarityCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SimilarityCache {
    pub fn with_capacity(capacity: usize) -> Self {
        SimilarityCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached result for `query`, computing and storing it on a
    /// miss. Errors are not cached.
    pub fn get_or_compute(
        &mut self,
        scorer: &SimilarityScorer<'_>,
        query: &SimilarityQuery,
    ) -> Result<SimilarityResult, ScoringError> {
        let key = query_key(scorer.fingerprint(), query);
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            debug!("similarity cache hit for {}", query.reference);
            return Ok(hit.clone());
        }

        self.misses += 1;
        let result = scorer.calculate_similarity(query)?;
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, result.clone());
        self.order.push_back(key);
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
