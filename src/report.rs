use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::aggregate;
use crate::funnel;
use crate::store::EventTable;

pub fn build_report(
    table: &EventTable,
    stages: &[String],
    generated_at: DateTime<Utc>,
) -> String {
    let events = table.events();
    let kpis = aggregate::kpis(table);
    let dropoff = aggregate::dropoff_counts(events);
    let totals = aggregate::channel_totals(events);
    let durations = aggregate::avg_duration_by_channel(events);
    let stage_counts = funnel::compute_funnel(events, stages);

    let mut output = String::new();

    let _ = writeln!(output, "# Multi-Channel Customer Journey Report");
    let _ = writeln!(
        output,
        "Generated {} from {} interactions",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        table.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Figures");
    let _ = writeln!(output, "- Unique customers: {}", kpis.unique_customers);
    let _ = writeln!(output, "- Avg duration (s): {:.1}", kpis.avg_duration);
    let _ = writeln!(output, "- Conversion rate: {:.2}%", kpis.conversion_rate * 100.0);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Drop-Off by Interaction Type");
    if dropoff.is_empty() {
        let _ = writeln!(output, "No non-purchase interactions recorded.");
    } else {
        for row in &dropoff {
            let _ = writeln!(output, "- {}: {} interactions", row.category, row.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Channels");
    for row in &totals {
        let _ = writeln!(output, "- {}: {} interactions", row.category, row.count);
    }
    for row in &durations {
        let _ = writeln!(
            output,
            "- {}: avg duration {:.1}s",
            row.channel, row.avg_duration
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Funnel (unique customers)");
    for row in &stage_counts {
        let _ = writeln!(output, "- {}: {}", row.stage, row.customers);
    }

    output
}
