//! Error types shared by the analytics and prediction pipelines.

/// Errors raised while loading data or building a prediction.
///
/// Every variant is terminal for the request that produced it; nothing here
/// is transient, so callers report and let the user resubmit.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("data unavailable from {origin}: {reason}")]
    DataUnavailable { origin: String, reason: String },

    #[error("missing feature: {0}")]
    MissingFeature(String),

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("unknown category label: {0}")]
    UnknownCategory(String),

    #[error("invalid value {value:?} for feature {feature}")]
    InvalidFeatureValue { feature: String, value: String },

    #[error("scaler expects features not present in the input row: {missing:?}")]
    ScalerFeatureMismatch { missing: Vec<String> },

    #[error("model expects columns {expected:?} but the row has {actual:?}")]
    ModelInputShapeMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("invalid {artifact} artifact: {reason}")]
    InvalidArtifact { artifact: String, reason: String },
}

impl AnalyticsError {
    pub(crate) fn unavailable(origin: impl std::fmt::Display, reason: impl ToString) -> Self {
        AnalyticsError::DataUnavailable {
            origin: origin.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn artifact(artifact: &str, reason: impl ToString) -> Self {
        AnalyticsError::InvalidArtifact {
            artifact: artifact.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by what the user typed, as opposed to a broken
    /// data file or model artifact.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AnalyticsError::MissingFeature(_)
                | AnalyticsError::UnknownFeature(_)
                | AnalyticsError::UnknownCategory(_)
                | AnalyticsError::InvalidFeatureValue { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
