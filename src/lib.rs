//! Multi-channel customer journey analytics.
//!
//! Funnel and drop-off summaries over an interaction log, and purchase
//! prediction from a single form submission through a fitted scaler and
//! classifier.

pub mod aggregate;
pub mod cache;
pub mod category;
pub mod error;
pub mod features;
pub mod funnel;
pub mod inference;
pub mod models;
pub mod report;
pub mod resources;
pub mod schema;
pub mod store;

pub use error::{AnalyticsError, Result};
pub use features::{DefaultPolicy, FeatureInput, FeatureVector};
pub use inference::PredictionResult;
pub use resources::{ArtifactPaths, Resources};
