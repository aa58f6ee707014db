//! Funnel Engine: which purchase stages each customer reached.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{InteractionEvent, StageCount};

pub const DEFAULT_STAGES: [&str; 4] =
    ["Product View", "Add To Cart", "Checkout", "Purchase Page"];

pub fn default_stages() -> Vec<String> {
    DEFAULT_STAGES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerJourney {
    pub customer_id: String,
    pub reached: Vec<bool>,
}

/// Marks stage `i` once every stage in `stages[..=i]` has been seen. Marks are
/// never cleared.
pub fn reached_stages<'a, I>(path: I, stages: &[String]) -> Vec<bool>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut reached = vec![false; stages.len()];
    let mut seen: HashSet<&str> = HashSet::new();

    for interaction in path {
        seen.insert(interaction);
        for (i, flag) in reached.iter_mut().enumerate() {
            if !*flag && stages[..=i].iter().all(|s| seen.contains(s.as_str())) {
                *flag = true;
            }
        }
    }

    reached
}

pub fn customer_journeys(events: &[InteractionEvent], stages: &[String]) -> Vec<CustomerJourney> {
    let stage_set: HashSet<&str> = stages.iter().map(String::as_str).collect();
    let mut order: Vec<&str> = Vec::new();
    let mut paths: HashMap<&str, Vec<&str>> = HashMap::new();

    for event in events {
        if !stage_set.contains(event.interaction_type.as_str()) {
            continue;
        }
        let path = paths.entry(event.customer_id.as_str()).or_insert_with(|| {
            order.push(event.customer_id.as_str());
            Vec::new()
        });
        path.push(event.interaction_type.as_str());
    }

    order
        .into_iter()
        .map(|customer_id| CustomerJourney {
            customer_id: customer_id.to_string(),
            reached: reached_stages(paths[customer_id].iter().copied(), stages),
        })
        .collect()
}

/// Count customers who reached each stage, in `stages` order. Only stage
/// membership matters, so `Checkout, Add To Cart, Product View` reaches the
/// first three stages.
pub fn compute_funnel(events: &[InteractionEvent], stages: &[String]) -> Vec<StageCount> {
    let journeys = customer_journeys(events, stages);
    let mut counts = vec![0usize; stages.len()];

    for journey in &journeys {
        for (count, reached) in counts.iter_mut().zip(&journey.reached) {
            if *reached {
                *count += 1;
            }
        }
    }

    debug!(customers = journeys.len(), stages = stages.len(), "funnel computed");

    stages
        .iter()
        .zip(counts)
        .map(|(stage, customers)| StageCount {
            stage: stage.clone(),
            customers,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(customer: &str, kind: &str) -> InteractionEvent {
        InteractionEvent {
            customer_id: customer.to_string(),
            interaction_type: kind.to_string(),
            channel: "Web".to_string(),
            duration: 1.0,
        }
    }

    fn counts(result: &[StageCount]) -> Vec<usize> {
        result.iter().map(|s| s.customers).collect()
    }

    #[test]
    fn full_path_reaches_every_stage() {
        let events: Vec<_> = DEFAULT_STAGES.iter().map(|s| event("c1", s)).collect();
        let result = compute_funnel(&events, &default_stages());
        assert_eq!(counts(&result), vec![1, 1, 1, 1]);
    }

    #[test]
    fn purchase_only_reaches_nothing() {
        let events = vec![event("c1", "Purchase Page")];
        let result = compute_funnel(&events, &default_stages());
        assert_eq!(counts(&result), vec![0, 0, 0, 0]);
    }

    #[test]
    fn skipped_stage_blocks_later_stages() {
        let events = vec![
            event("c1", "Product View"),
            event("c1", "Checkout"),
            event("c1", "Purchase Page"),
        ];
        let result = compute_funnel(&events, &default_stages());
        assert_eq!(counts(&result), vec![1, 0, 0, 0]);
    }

    #[test]
    fn order_within_customer_does_not_matter() {
        let events = vec![
            event("c1", "Checkout"),
            event("c1", "Add To Cart"),
            event("c1", "Product View"),
        ];
        let result = compute_funnel(&events, &default_stages());
        assert_eq!(counts(&result), vec![1, 1, 1, 0]);
    }

    #[test]
    fn reached_flags_are_monotonic_while_scanning() {
        let stages = default_stages();
        let path = ["Product View", "Support", "Add To Cart", "Product View", "Checkout"];
        let mut previous = vec![false; stages.len()];
        for end in 0..=path.len() {
            let current = reached_stages(path[..end].iter().copied(), &stages);
            for (before, now) in previous.iter().zip(&current) {
                assert!(!before || *now);
            }
            previous = current;
        }
        assert_eq!(previous, vec![true, true, true, false]);
    }

    #[test]
    fn non_stage_events_and_customers_are_ignored() {
        let events = vec![
            event("c1", "Product View"),
            event("c2", "Support"),
            event("c3", "Product View"),
            event("c3", "Add To Cart"),
        ];
        let journeys = customer_journeys(&events, &default_stages());
        assert_eq!(journeys.len(), 2);
        assert_eq!(journeys[0].customer_id, "c1");
        assert_eq!(journeys[1].reached, vec![true, true, false, false]);

        let result = compute_funnel(&events, &default_stages());
        assert_eq!(counts(&result), vec![2, 1, 0, 0]);
    }

    #[test]
    fn result_follows_stage_order() {
        let stages = vec!["Checkout".to_string(), "Product View".to_string()];
        let result = compute_funnel(&[event("c1", "Product View")], &stages);
        assert_eq!(result[0].stage, "Checkout");
        assert_eq!(counts(&result), vec![0, 0]);
    }

    #[test]
    fn empty_table_yields_zero_counts() {
        let result = compute_funnel(&[], &default_stages());
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|s| s.customers == 0));
    }
}
