//! Adaptive item selection by maximum Fisher information.
//!
//! The selector is a pure function over the eligible pool and the current
//! ability estimate; it holds no state between calls. Exposure spreading and
//! the deterministic final tie-break keep selection reproducible for a given
//! pool snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::irt::item_information;
use crate::model::Item;

/// Configuration for selection and stopping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Stop once the standard error drops below this threshold.
    pub se_threshold: f64,
    /// Hard cap on items per session.
    pub max_items: u32,
    /// Precision stopping only applies once this many items were answered.
    /// Zero imposes no floor.
    pub min_items: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            se_threshold: 0.35,
            max_items: 20,
            min_items: 0,
        }
    }
}

/// Why an adaptive session stopped serving items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Standard error fell below the configured threshold.
    PrecisionReached,
    /// The per-session item cap was hit.
    MaxItemsReached,
    /// No eligible items remain.
    PoolExhausted,
}

/// Filter the pool down to items this user can be served right now.
///
/// Excludes items answered in this session, items seen in any prior session,
/// and items whose quality flag is not normal.
pub fn eligible_items<'a>(
    pool: &'a [Item],
    answered: &HashSet<String>,
    seen_before: &HashSet<String>,
) -> Vec<&'a Item> {
    pool.iter()
        .filter(|item| {
            item.is_servable()
                && !answered.contains(&item.id)
                && !seen_before.contains(&item.id)
        })
        .collect()
}

/// Pick the eligible item with maximum Fisher information at the current
/// theta. Ties break toward the lowest historical response count to spread
/// exposure, then toward the lowest item id for determinism.
pub fn select_next<'a>(
    theta: f64,
    pool: &'a [Item],
    answered: &HashSet<String>,
    seen_before: &HashSet<String>,
    user_id: &str,
) -> Result<&'a Item, EngineError> {
    let eligible = eligible_items(pool, answered, seen_before);

    eligible
        .into_iter()
        .map(|item| (item_information(theta, &item.params), item))
        .max_by(|(info_a, item_a), (info_b, item_b)| {
            info_a
                .partial_cmp(info_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Reversed: lower response count and lower id win the tie,
                // and max_by keeps the greater element.
                .then_with(|| item_b.response_count.cmp(&item_a.response_count))
                .then_with(|| item_b.id.cmp(&item_a.id))
        })
        .map(|(_, item)| item)
        .ok_or_else(|| EngineError::NoEligibleItems {
            user_id: user_id.to_string(),
        })
}

/// Decide whether the session should stop before serving another item.
pub fn should_stop(
    se: f64,
    answered_count: u32,
    eligible_remaining: usize,
    config: &SelectorConfig,
) -> Option<StopReason> {
    if answered_count >= config.max_items {
        return Some(StopReason::MaxItemsReached);
    }
    if eligible_remaining == 0 {
        return Some(StopReason::PoolExhausted);
    }
    if answered_count >= config.min_items && se < config.se_threshold {
        return Some(StopReason::PrecisionReached);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, DifficultyLabel, IrtParams, QualityFlag};

    fn item(id: &str, a: f64, b: f64, response_count: u32) -> Item {
        Item {
            id: id.into(),
            text: format!("item {id}"),
            category: Category::Logic,
            difficulty: DifficultyLabel::Medium,
            params: IrtParams { a, b, c: 0.2 },
            p_value: None,
            response_count,
            quality: QualityFlag::Normal,
        }
    }

    #[test]
    fn selects_maximum_information_item() {
        // Item with b at theta and higher discrimination carries more
        // information than off-target or flat items.
        let pool = vec![
            item("far", 1.0, 3.0, 0),
            item("on_target", 1.5, 0.0, 0),
            item("flat", 0.4, 0.0, 0),
        ];
        let picked = select_next(0.0, &pool, &HashSet::new(), &HashSet::new(), "u1").unwrap();
        assert_eq!(picked.id, "on_target");
    }

    #[test]
    fn selected_item_dominates_all_eligible() {
        // Property from the design: the winner's information is >= every
        // other eligible item's information.
        let pool: Vec<Item> = (0..30)
            .map(|i| {
                item(
                    &format!("q{i:02}"),
                    0.5 + (i % 7) as f64 * 0.25,
                    -2.0 + (i % 11) as f64 * 0.4,
                    i as u32,
                )
            })
            .collect();
        for theta in [-2.5, -1.0, 0.0, 0.7, 2.2] {
            let picked = select_next(theta, &pool, &HashSet::new(), &HashSet::new(), "u1").unwrap();
            let max_info = item_information(theta, &picked.params);
            for other in &pool {
                assert!(
                    max_info >= item_information(theta, &other.params) - 1e-12,
                    "item {} beats selected {} at theta {theta}",
                    other.id,
                    picked.id
                );
            }
        }
    }

    #[test]
    fn tie_breaks_by_lowest_response_count_then_id() {
        let pool = vec![
            item("b", 1.0, 0.0, 10),
            item("a", 1.0, 0.0, 10),
            item("c", 1.0, 0.0, 3),
        ];
        let picked = select_next(0.0, &pool, &HashSet::new(), &HashSet::new(), "u1").unwrap();
        assert_eq!(picked.id, "c", "lowest exposure wins the tie");

        let pool = vec![item("b", 1.0, 0.0, 5), item("a", 1.0, 0.0, 5)];
        let picked = select_next(0.0, &pool, &HashSet::new(), &HashSet::new(), "u1").unwrap();
        assert_eq!(picked.id, "a", "lowest id breaks the remaining tie");
    }

    #[test]
    fn excludes_answered_seen_and_flagged_items() {
        let mut flagged = item("flagged", 2.0, 0.0, 0);
        flagged.quality = QualityFlag::UnderReview;
        let pool = vec![
            item("answered", 2.0, 0.0, 0),
            item("seen", 2.0, 0.0, 0),
            flagged,
            item("fresh", 0.8, 0.0, 0),
        ];
        let answered: HashSet<String> = ["answered".to_string()].into();
        let seen: HashSet<String> = ["seen".to_string()].into();
        let picked = select_next(0.0, &pool, &answered, &seen, "u1").unwrap();
        assert_eq!(picked.id, "fresh");
    }

    #[test]
    fn empty_pool_is_a_hard_failure() {
        let err = select_next(0.0, &[], &HashSet::new(), &HashSet::new(), "u7").unwrap_err();
        match err {
            EngineError::NoEligibleItems { user_id } => assert_eq!(user_id, "u7"),
            other => panic!("expected NoEligibleItems, got {other}"),
        }
    }

    #[test]
    fn stopping_rules_in_priority_order() {
        let config = SelectorConfig::default();
        assert_eq!(
            should_stop(0.2, 20, 5, &config),
            Some(StopReason::MaxItemsReached)
        );
        assert_eq!(
            should_stop(1.0, 3, 0, &config),
            Some(StopReason::PoolExhausted)
        );
        assert_eq!(
            should_stop(0.2, 6, 5, &config),
            Some(StopReason::PrecisionReached)
        );
        assert_eq!(should_stop(1.0, 6, 5, &config), None);
    }

    #[test]
    fn precision_stop_waits_for_minimum_items() {
        let config = SelectorConfig {
            min_items: 5,
            ..SelectorConfig::default()
        };
        // Below min_items a tight se does not stop the session.
        assert_eq!(should_stop(0.1, 3, 5, &config), None);
        assert_eq!(
            should_stop(0.1, 5, 5, &config),
            Some(StopReason::PrecisionReached)
        );
    }
}
