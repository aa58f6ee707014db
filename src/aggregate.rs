use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{CategoryCount, ChannelDuration, InteractionEvent, Kpis};
use crate::store::EventTable;

/// Count values in first-appearance order.
fn count_by<'a, I, F>(events: I, key: F) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a InteractionEvent>,
    F: Fn(&'a InteractionEvent) -> &'a str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();

    for event in events {
        let category = key(event);
        match index.get(category) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(category, counts.len());
                counts.push(CategoryCount {
                    category: category.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts
}

/// Interaction types that did not end in a purchase, least frequent first.
pub fn dropoff_counts(events: &[InteractionEvent]) -> Vec<CategoryCount> {
    let mut counts = count_by(events.iter().filter(|e| !e.is_purchase()), |e| {
        e.interaction_type.as_str()
    });
    counts.sort_by_key(|c| c.count);
    counts
}

/// Interactions per channel, busiest first; ties keep first-appearance order.
pub fn channel_totals(events: &[InteractionEvent]) -> Vec<CategoryCount> {
    let mut counts = count_by(events, |e| e.channel.as_str());
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Mean duration per channel, ordered by channel name.
pub fn avg_duration_by_channel(events: &[InteractionEvent]) -> Vec<ChannelDuration> {
    let mut map: BTreeMap<&str, (usize, f64)> = BTreeMap::new();

    for event in events {
        let entry = map.entry(event.channel.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += event.duration;
    }

    map.into_iter()
        .map(|(channel, (count, total))| ChannelDuration {
            channel: channel.to_string(),
            avg_duration: total / count as f64,
        })
        .collect()
}

pub fn kpis(table: &EventTable) -> Kpis {
    let events = table.events();
    if events.is_empty() {
        return Kpis {
            unique_customers: 0,
            avg_duration: 0.0,
            conversion_rate: 0.0,
        };
    }

    let customers: HashSet<&str> = events.iter().map(|e| e.customer_id.as_str()).collect();
    let total_duration: f64 = events.iter().map(|e| e.duration).sum();
    let converted: usize = table.converted().iter().map(|&c| c as usize).sum();

    Kpis {
        unique_customers: customers.len(),
        avg_duration: total_duration / events.len() as f64,
        conversion_rate: converted as f64 / events.len() as f64,
    }
}
