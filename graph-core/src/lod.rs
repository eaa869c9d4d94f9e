//! LOD resolution (C4). A pure function of camera ratio and the configured
//! level table; kept stateless so it's trivially unit-testable.

use graph_common::config::LodConfig;

use crate::model::LodLevel;

/// Builds the ordered level table from config. Levels are ordered by
/// ascending `ratio_upper_bound`; the last level's bound is always
/// `f64::INFINITY` regardless of what config supplies, so resolution always
/// terminates.
pub fn build_levels(config: &LodConfig) -> Vec<LodLevel> {
    let bounds = [
        config.thresholds.paper,
        config.thresholds.topic,
        config.thresholds.field,
        config.thresholds.universe,
    ];
    config
        .levels
        .iter()
        .enumerate()
        .map(|(index, level)| {
            let ratio_upper_bound = if index + 1 == config.levels.len() {
                f64::INFINITY
            } else {
                bounds.get(index).copied().unwrap_or(f64::INFINITY)
            };
            LodLevel {
                index,
                name: level.name.clone(),
                ratio_upper_bound,
                max_nodes: level.max_nodes,
                min_degree: level.min_degree,
                load_edges: level.load_edges,
            }
        })
        .collect()
}

/// Returns the smallest `i` such that `ratio < levels[i].ratio_upper_bound`,
/// else the last level. A ratio exactly at a threshold resolves to the
/// level *above* that threshold (strict `<` on the lower side), matching
/// the boundary rule in the spec.
pub fn resolve_level(levels: &[LodLevel], ratio: f64) -> usize {
    for level in levels {
        if ratio < level.ratio_upper_bound {
            return level.index;
        }
    }
    levels.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> Vec<LodLevel> {
        vec![
            LodLevel { index: 0, name: "paper".into(), ratio_upper_bound: 2.0, max_nodes: 100, min_degree: 0, load_edges: true },
            LodLevel { index: 1, name: "topic".into(), ratio_upper_bound: 8.0, max_nodes: 80, min_degree: 2, load_edges: true },
            LodLevel { index: 2, name: "field".into(), ratio_upper_bound: 32.0, max_nodes: 60, min_degree: 5, load_edges: false },
            LodLevel { index: 3, name: "universe".into(), ratio_upper_bound: f64::INFINITY, max_nodes: 30, min_degree: 10, load_edges: false },
        ]
    }

    #[test]
    fn resolves_below_first_threshold() {
        assert_eq!(resolve_level(&levels(), 1.0), 0);
    }

    #[test]
    fn resolves_at_threshold_to_next_level_up() {
        // strict `<`: ratio == 2.0 does not satisfy level 0's bound.
        assert_eq!(resolve_level(&levels(), 2.0), 1);
    }

    #[test]
    fn resolves_past_last_threshold_to_last_level() {
        assert_eq!(resolve_level(&levels(), 1_000_000.0), 3);
    }

    #[test]
    fn build_levels_orders_ascending_with_infinite_tail() {
        let config = LodConfig::default();
        let built = build_levels(&config);
        assert_eq!(built.last().unwrap().ratio_upper_bound, f64::INFINITY);
        for pair in built.windows(2) {
            assert!(pair[0].ratio_upper_bound < pair[1].ratio_upper_bound);
        }
    }
}
