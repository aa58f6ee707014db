//! Feature schema: model column order plus the input domain of each column,
//! derived from a reference dataset.

use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{AnalyticsError, Result};

/// Columns with at most this many distinct values are offered as choices.
pub const MAX_CATEGORICAL_DISTINCT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDomain {
    Categorical { choices: Vec<String> },
    /// Text choices; the model sees the position in the sorted list.
    Labelled { choices: Vec<String> },
    Numeric { min: f64, max: f64, default: f64 },
    CategoryCode,
    Unconstrained,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub name: String,
    pub domain: FeatureDomain,
}

impl FeatureSpec {
    pub fn default_value(&self) -> Option<f64> {
        match self.domain {
            FeatureDomain::Numeric { default, .. } => Some(default),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
    category_feature: String,
    scaled_features: Vec<String>,
}

impl FeatureSchema {
    pub fn new(features: Vec<FeatureSpec>, category_feature: impl Into<String>) -> Self {
        Self {
            features,
            category_feature: category_feature.into(),
            scaled_features: Vec::new(),
        }
    }

    pub fn for_model(
        model_features: &[String],
        template: &TemplateTable,
        category_feature: &str,
    ) -> Self {
        let features = model_features
            .iter()
            .map(|name| {
                let domain = if name == category_feature {
                    FeatureDomain::CategoryCode
                } else {
                    template
                        .column(name)
                        .map(|values| classify_feature_domain(&values))
                        .unwrap_or(FeatureDomain::Unconstrained)
                };
                FeatureSpec {
                    name: name.clone(),
                    domain,
                }
            })
            .collect();

        Self::new(features, category_feature)
    }

    pub fn with_scaled_features(mut self, names: &[String]) -> Self {
        self.scaled_features = names.to_vec();
        self
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    pub fn category_feature(&self) -> &str {
        &self.category_feature
    }

    pub fn scaled_features(&self) -> &[String] {
        &self.scaled_features
    }

    pub fn is_scaled(&self, name: &str) -> bool {
        self.scaled_features.iter().any(|n| n == name)
    }
}

/// Decide how a reference column should be collected.
///
/// Non-numeric columns become sorted label lists, encoded by index. Numeric
/// columns with few distinct values become choice lists sorted ascending.
/// Everything else is a numeric range whose bounds and default (the mean)
/// are truncated to whole numbers. Empty cells are ignored.
pub fn classify_feature_domain(values: &[&str]) -> FeatureDomain {
    let present: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    if present.is_empty() {
        return FeatureDomain::Unconstrained;
    }

    let numbers: Option<Vec<f64>> = present.iter().map(|v| v.parse::<f64>().ok()).collect();

    match numbers {
        None => {
            let mut choices: Vec<String> = present.iter().map(|v| v.to_string()).collect();
            choices.sort();
            choices.dedup();
            FeatureDomain::Labelled { choices }
        }
        Some(numbers) => {
            let mut distinct: Vec<(f64, &str)> =
                numbers.iter().copied().zip(present.iter().copied()).collect();
            distinct.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            distinct.dedup_by(|a, b| a.0 == b.0);

            if distinct.len() <= MAX_CATEGORICAL_DISTINCT {
                return FeatureDomain::Categorical {
                    choices: distinct.into_iter().map(|(_, raw)| raw.to_string()).collect(),
                };
            }

            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            FeatureDomain::Numeric {
                min: min.trunc(),
                max: max.trunc(),
                default: mean.trunc(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TemplateTable {
    pub fn from_reader<R: Read>(reader: R, origin: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AnalyticsError::unavailable(origin, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| AnalyticsError::unavailable(origin, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        if rows.is_empty() {
            return Err(AnalyticsError::unavailable(origin, "template has no rows"));
        }

        debug!(origin, columns = headers.len(), rows = rows.len(), "template parsed");
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| AnalyticsError::unavailable(path.display(), e))?;
        Self::from_reader(file, &path.display().to_string())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.headers.iter().position(|h| h == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}
