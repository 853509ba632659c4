// Weight maps: validated construction and sum-of-absolute-values normalization.

use super::ScoringError;
use crate::config::StatComponent;
use serde::Serialize;

/// An ordered column -> signed weight mapping.
///
/// A negative weight means "lower is better" for that column. Construction
/// rejects empty maps, non-finite weights, duplicate columns and an all-zero
/// total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightSpec {
    entries: Vec<(String, f64)>,
}

impl WeightSpec {
    pub fn new<I, S>(entries: I) -> Result<Self, ScoringError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut collected: Vec<(String, f64)> = Vec::new();
        for (column, weight) in entries {
            let column = column.into();
            if !weight.is_finite() {
                return Err(ScoringError::Configuration(format!(
                    "weight for '{column}' is not finite"
                )));
            }
            if collected.iter().any(|(c, _)| *c == column) {
                return Err(ScoringError::Configuration(format!(
                    "duplicate weight for '{column}'"
                )));
            }
            collected.push((column, weight));
        }
        let spec = WeightSpec { entries: collected };
        spec.total_abs()?;
        Ok(spec)
    }

    /// Build from configured stat components, ignoring `use_percentile`.
    pub fn from_components(components: &[StatComponent]) -> Result<Self, ScoringError> {
        Self::new(components.iter().map(|c| (c.stat.clone(), c.weight)))
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, w)| *w)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the columns accepted by `keep`, preserving order.
    ///
    /// Errors if nothing usable remains.
    pub fn restrict<F>(&self, mut keep: F) -> Result<WeightSpec, ScoringError>
    where
        F: FnMut(&str) -> bool,
    {
        let entries: Vec<(String, f64)> = self
            .entries
            .iter()
            .filter(|(c, _)| keep(c))
            .cloned()
            .collect();
        if entries.is_empty() {
            return Err(ScoringError::Configuration(
                "no weighted column is present in the dataset".into(),
            ));
        }
        let spec = WeightSpec { entries };
        spec.total_abs()?;
        Ok(spec)
    }

    fn total_abs(&self) -> Result<f64, ScoringError> {
        if self.entries.is_empty() {
            return Err(ScoringError::Configuration("weight map is empty".into()));
        }
        let total: f64 = self.entries.iter().map(|(_, w)| w.abs()).sum();
        if total <= 0.0 {
            return Err(ScoringError::Configuration(
                "total absolute weight is zero".into(),
            ));
        }
        Ok(total)
    }
}

/// Weights rescaled so that the absolute values sum to 1.0. Signs are kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedWeights {
    entries: Vec<(String, f64)>,
}

impl NormalizedWeights {
    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(c, w)| (c.as_str(), *w))
    }
}

/// Divide every weight by the total absolute weight.
///
/// The only normalization routine used by similarity, preset scoring and
/// position weight generation.
pub fn normalize_weights(spec: &WeightSpec) -> Result<NormalizedWeights, ScoringError> {
    let total = spec.total_abs()?;
    Ok(NormalizedWeights {
        entries: spec
            .entries
            .iter()
            .map(|(c, w)| (c.clone(), w / total))
            .collect(),
    })
}
