use serde::{Deserialize, Serialize};

/// Interaction type that marks a completed purchase.
pub const PURCHASE_STAGE: &str = "Purchase Page";

/// One row of the interaction log. Extra CSV columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractionEvent {
    pub customer_id: String,
    pub interaction_type: String,
    pub channel: String,
    pub duration: f64,
}

impl InteractionEvent {
    pub fn is_purchase(&self) -> bool {
        self.interaction_type == PURCHASE_STAGE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDuration {
    pub channel: String,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub unique_customers: usize,
    pub avg_duration: f64,
    /// Share of rows flagged as converted, in `[0, 1]`.
    pub conversion_rate: f64,
}
