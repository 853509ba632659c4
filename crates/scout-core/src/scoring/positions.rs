// Position groups and similarity weight presets.
//
// Position presets derive their weights from composite attributes; role
// presets carry explicit weights. Either way the result is filtered to the
// dataset's columns and renormalized.

use super::weights::{normalize_weights, NormalizedWeights, WeightSpec};
use super::ScoringError;
use crate::config::PresetCatalog;
use crate::dataset::Dataset;
use tracing::{debug, warn};

/// Preset key meaning "use the player's own position preset".
pub const AUTO_PRESET: &str = "auto";

/// Position preset used when nothing else matches.
pub const FALLBACK_GROUP: &str = "CB";

/// Map a position code (e.g. `RCB3`, `LWF`) to a position preset key.
///
/// A code that is itself a preset key maps to itself. Otherwise the first
/// position group containing the code decides, by keyword in the group
/// name. Falls back to `CB`.
pub fn map_position_to_group(catalog: &PresetCatalog, position: &str) -> String {
    let presets = &catalog.position_presets;
    if presets.contains_key(position) {
        return position.to_string();
    }

    for (group_name, codes) in &catalog.position_groups {
        if !codes.iter().any(|c| c == position) {
            continue;
        }
        let target = if group_name.contains("CB") {
            "CB"
        } else if group_name.contains("Fullback") || group_name.contains("WB") {
            "FB/WB"
        } else if group_name.contains("DM") {
            "DM/CM"
        } else if group_name.contains("Winger") {
            "Winger"
        } else if group_name.contains("AM") {
            "AM"
        } else if group_name.contains("CF") {
            "CF"
        } else {
            continue;
        };
        if presets.contains_key(target) {
            return target.to_string();
        }
    }

    FALLBACK_GROUP.to_string()
}

/// Weights for a position preset: absolute component weights summed across
/// the preset's composites, normalized to 1.
pub fn build_position_weights(
    catalog: &PresetCatalog,
    group: &str,
) -> Result<NormalizedWeights, ScoringError> {
    let preset = catalog.position_presets.get(group).ok_or_else(|| {
        ScoringError::Configuration(format!("unknown position preset '{group}'"))
    })?;

    let mut totals: Vec<(String, f64)> = Vec::new();
    for name in &preset.composites {
        let Some(composite) = catalog.composites.get(name) else {
            warn!("position preset '{}' names unknown composite '{}'", group, name);
            continue;
        };
        for component in &composite.components {
            match totals.iter_mut().find(|(stat, _)| *stat == component.stat) {
                Some((_, total)) => *total += component.weight.abs(),
                None => totals.push((component.stat.clone(), component.weight.abs())),
            }
        }
    }

    normalize_weights(&WeightSpec::new(totals)?)
}

/// Equal weights over the catalog statistics present in the dataset.
fn equal_weights(
    catalog: &PresetCatalog,
    dataset: &Dataset,
) -> Result<NormalizedWeights, ScoringError> {
    let stats: Vec<String> = catalog
        .stat_columns()
        .into_iter()
        .filter(|s| dataset.has_column(s))
        .collect();
    if stats.is_empty() {
        return Err(ScoringError::Configuration(
            "no catalog statistic is present in the dataset".into(),
        ));
    }
    normalize_weights(&WeightSpec::new(stats.into_iter().map(|s| (s, 1.0)))?)
}

/// Similarity weights for a player position and preset selection.
///
/// `preset_key` may be `auto`, a position preset key or a role preset key;
/// anything else falls back to the player's position preset.
pub fn resolve_similarity_weights(
    catalog: &PresetCatalog,
    dataset: &Dataset,
    position: &str,
    preset_key: &str,
) -> Result<NormalizedWeights, ScoringError> {
    let group = map_position_to_group(catalog, position);

    let raw: Vec<(String, f64)> = if let Some(role) = catalog.role_presets.get(preset_key) {
        role.weights
            .iter()
            .map(|c| (c.stat.clone(), c.weight))
            .collect()
    } else {
        let explicit =
            preset_key != AUTO_PRESET && catalog.position_presets.contains_key(preset_key);
        let target = if explicit {
            preset_key
        } else {
            group.as_str()
        };
        build_position_weights(catalog, target)
            .or_else(|_| build_position_weights(catalog, FALLBACK_GROUP))
            .map(|w| w.entries().to_vec())
            .unwrap_or_default()
    };

    let valid: Vec<(String, f64)> = raw
        .into_iter()
        .filter(|(stat, _)| dataset.has_column(stat))
        .collect();

    match WeightSpec::new(valid) {
        Ok(spec) => normalize_weights(&spec),
        Err(_) => {
            debug!(
                "preset '{}' for position '{}' has no usable columns; using equal weights",
                preset_key, position
            );
            equal_weights(catalog, dataset)
        }
    }
}
