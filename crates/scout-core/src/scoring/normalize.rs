// Min-max scaling of statistic columns to a 0-100 range.

/// Statistics where a lower raw value is better.
pub const NEGATIVE_METRICS: &[&str] = &["Fouls per 90", "Cards per 90", "Conceded goals per 90"];

/// Value assigned to every row of a constant column.
pub const CONSTANT_COLUMN_VALUE: f64 = 50.0;

pub fn is_negative_metric(column: &str) -> bool {
    NEGATIVE_METRICS.contains(&column)
}

/// Whether to flip the scale so that low raw values score high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    Inverted,
}

impl Direction {
    /// Inversion applies only to a negative metric carrying a negative weight.
    pub fn for_column(column: &str, weight: f64) -> Self {
        if is_negative_metric(column) && weight < 0.0 {
            Direction::Inverted
        } else {
            Direction::HigherIsBetter
        }
    }
}

/// Minimum and maximum of a slice. `None` for an empty slice.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn scale(value: f64, min: f64, max: f64, direction: Direction) -> f64 {
    if max == min {
        return CONSTANT_COLUMN_VALUE;
    }
    let scaled = (value - min) / (max - min) * 100.0;
    match direction {
        Direction::HigherIsBetter => scaled,
        Direction::Inverted => 100.0 - scaled,
    }
}

/// Normalize a candidate column together with the reference value.
///
/// Missing values count as 0. The reference takes part in the min/max, so
/// every output lands in [0, 100].
pub fn normalize_column(
    values: &[Option<f64>],
    reference: Option<f64>,
    direction: Direction,
) -> (Vec<f64>, f64) {
    let reference = reference.unwrap_or(0.0);
    let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(0.0)).collect();
    let (min, max) = min_max(&filled)
        .map(|(lo, hi)| (lo.min(reference), hi.max(reference)))
        .unwrap_or((reference, reference));
    let normalized = filled
        .iter()
        .map(|&v| scale(v, min, max, direction))
        .collect();
    (normalized, scale(reference, min, max, direction))
}

/// Normalize a column against its own pool, with no reference row.
pub fn normalize_pool(values: &[Option<f64>], direction: Direction) -> Vec<f64> {
    let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(0.0)).collect();
    match min_max(&filled) {
        Some((min, max)) => filled
            .iter()
            .map(|&v| scale(v, min, max, direction))
            .collect(),
        None => Vec::new(),
    }
}

/// Scale one value against known pool bounds. Values outside the bounds
/// fall outside [0, 100].
pub fn normalize_value(value: f64, min: f64, max: f64, direction: Direction) -> f64 {
    scale(value, min, max, direction)
}
