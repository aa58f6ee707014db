//! Feature Vector Builder: turns user-entered fields into one model row.

use std::collections::HashMap;

use serde::Serialize;

use crate::category::CategoryCodeMap;
use crate::error::{AnalyticsError, Result};
use crate::schema::{FeatureDomain, FeatureSchema};

/// A single user-entered field.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureInput {
    Number(f64),
    Label(String),
}

impl FeatureInput {
    /// Interpret free text: numbers become `Number`, anything else a `Label`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) => FeatureInput::Number(value),
            Err(_) => FeatureInput::Label(raw.to_string()),
        }
    }

    fn as_text(&self) -> String {
        match self {
            FeatureInput::Number(value) => value.to_string(),
            FeatureInput::Label(label) => label.clone(),
        }
    }
}

impl From<f64> for FeatureInput {
    fn from(value: f64) -> Self {
        FeatureInput::Number(value)
    }
}

impl From<&str> for FeatureInput {
    fn from(label: &str) -> Self {
        FeatureInput::Label(label.to_string())
    }
}

/// What to do with a schema feature the caller never supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefaultPolicy {
    #[default]
    FailFast,
    /// Use the reference-data default for numeric ranges; everything else
    /// still fails.
    NumericDefaults,
}

/// One ordered model row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if names.len() != values.len() {
            return Err(AnalyticsError::ModelInputShapeMismatch {
                actual: vec![format!("{} values", values.len())],
                expected: names,
            });
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let index = self.position(name)?;
        Some(self.values[index])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct FeatureVectorBuilder<'a> {
    schema: &'a FeatureSchema,
    categories: &'a CategoryCodeMap,
    policy: DefaultPolicy,
}

impl<'a> FeatureVectorBuilder<'a> {
    pub fn new(schema: &'a FeatureSchema, categories: &'a CategoryCodeMap) -> Self {
        Self {
            schema,
            categories,
            policy: DefaultPolicy::FailFast,
        }
    }

    pub fn with_policy(mut self, policy: DefaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the row in schema order. Nothing is returned unless every
    /// feature resolves and every input names a schema feature.
    pub fn build(&self, inputs: &HashMap<String, FeatureInput>) -> Result<FeatureVector> {
        let mut unknown: Vec<&String> = inputs
            .keys()
            .filter(|name| !self.schema.names().any(|known| known == name.as_str()))
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(AnalyticsError::UnknownFeature(unknown[0].clone()));
        }

        let mut names = Vec::with_capacity(self.schema.features().len());
        let mut values = Vec::with_capacity(self.schema.features().len());

        for spec in self.schema.features() {
            let input = inputs.get(&spec.name);
            let value = if spec.name == self.schema.category_feature() {
                self.category_code(&spec.name, input)?
            } else {
                match input {
                    Some(input) => resolve_value(&spec.name, &spec.domain, input)?,
                    None => match (self.policy, spec.default_value()) {
                        (DefaultPolicy::NumericDefaults, Some(default)) => default,
                        _ => return Err(AnalyticsError::MissingFeature(spec.name.clone())),
                    },
                }
            };
            names.push(spec.name.clone());
            values.push(value);
        }

        FeatureVector::new(names, values)
    }

    fn category_code(&self, name: &str, input: Option<&FeatureInput>) -> Result<f64> {
        match input {
            Some(FeatureInput::Label(label)) => Ok(self.categories.label_to_code(label)? as f64),
            // A bare number is taken as a label too; some labels may be numeric.
            Some(number @ FeatureInput::Number(_)) => {
                Ok(self.categories.label_to_code(&number.as_text())? as f64)
            }
            None => Err(AnalyticsError::MissingFeature(name.to_string())),
        }
    }
}

fn resolve_value(name: &str, domain: &FeatureDomain, input: &FeatureInput) -> Result<f64> {
    let invalid = || AnalyticsError::InvalidFeatureValue {
        feature: name.to_string(),
        value: input.as_text(),
    };

    match domain {
        FeatureDomain::Labelled { choices } => {
            let text = input.as_text();
            return choices
                .iter()
                .position(|choice| *choice == text)
                .map(|index| index as f64)
                .ok_or_else(invalid);
        }
        FeatureDomain::Categorical { choices } => {
            let matches_choice = choices.iter().any(|choice| match input {
                FeatureInput::Label(label) => choice == label,
                FeatureInput::Number(value) => choice.trim().parse::<f64>().ok() == Some(*value),
            });
            if !matches_choice {
                return Err(invalid());
            }
        }
        _ => {}
    }

    match input {
        FeatureInput::Number(value) if value.is_finite() => Ok(*value),
        FeatureInput::Label(label) => label
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FeatureSpec, TemplateTable};

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            vec![
                FeatureSpec {
                    name: "page_or_product".into(),
                    domain: FeatureDomain::CategoryCode,
                },
                FeatureSpec {
                    name: "device".into(),
                    domain: FeatureDomain::Categorical {
                        choices: vec!["0".into(), "1".into(), "2".into()],
                    },
                },
                FeatureSpec {
                    name: "duration".into(),
                    domain: FeatureDomain::Numeric {
                        min: 0.0,
                        max: 600.0,
                        default: 74.0,
                    },
                },
            ],
            "page_or_product",
        )
    }

    fn inputs(pairs: &[(&str, FeatureInput)]) -> HashMap<String, FeatureInput> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn builds_row_in_schema_order() {
        let schema = schema();
        let categories = CategoryCodeMap::page_or_product();
        let row = FeatureVectorBuilder::new(&schema, &categories)
            .build(&inputs(&[
                ("duration", FeatureInput::Number(120.0)),
                ("device", "1".into()),
                ("page_or_product", "Laptops".into()),
            ]))
            .unwrap();

        assert_eq!(row.names(), &["page_or_product", "device", "duration"]);
        assert_eq!(row.values(), &[22.0, 1.0, 120.0]);
    }

    #[test]
    fn missing_feature_fails_without_partial_row() {
        let schema = schema();
        let categories = CategoryCodeMap::page_or_product();
        let result = FeatureVectorBuilder::new(&schema, &categories).build(&inputs(&[
            ("page_or_product", "home".into()),
            ("device", FeatureInput::Number(0.0)),
        ]));
        assert!(matches!(result, Err(AnalyticsError::MissingFeature(name)) if name == "duration"));
    }

    #[test]
    fn numeric_default_only_when_policy_allows() {
        let schema = schema();
        let categories = CategoryCodeMap::page_or_product();
        let fields = inputs(&[
            ("page_or_product", "home".into()),
            ("device", FeatureInput::Number(2.0)),
        ]);

        let row = FeatureVectorBuilder::new(&schema, &categories)
            .with_policy(DefaultPolicy::NumericDefaults)
            .build(&fields)
            .unwrap();
        assert_eq!(row.get("duration"), Some(74.0));

        // Categorical fields never default.
        let fields = inputs(&[
            ("page_or_product", "home".into()),
            ("duration", FeatureInput::Number(5.0)),
        ]);
        let result = FeatureVectorBuilder::new(&schema, &categories)
            .with_policy(DefaultPolicy::NumericDefaults)
            .build(&fields);
        assert!(matches!(result, Err(AnalyticsError::MissingFeature(name)) if name == "device"));
    }

    #[test]
    fn unknown_category_label_is_rejected() {
        let schema = schema();
        let categories = CategoryCodeMap::page_or_product();
        let result = FeatureVectorBuilder::new(&schema, &categories).build(&inputs(&[
            ("page_or_product", "Spaceships".into()),
            ("device", FeatureInput::Number(0.0)),
            ("duration", FeatureInput::Number(1.0)),
        ]));
        assert!(matches!(result, Err(AnalyticsError::UnknownCategory(label)) if label == "Spaceships"));
    }

    #[test]
    fn values_outside_choices_are_invalid() {
        let schema = schema();
        let categories = CategoryCodeMap::page_or_product();
        let result = FeatureVectorBuilder::new(&schema, &categories).build(&inputs(&[
            ("page_or_product", "home".into()),
            ("device", FeatureInput::Number(7.0)),
            ("duration", FeatureInput::Number(1.0)),
        ]));
        assert!(matches!(
            result,
            Err(AnalyticsError::InvalidFeatureValue { feature, .. }) if feature == "device"
        ));
    }

    #[test]
    fn text_choices_encode_to_their_sorted_index() {
        let template = TemplateTable::from_reader(
            "device,page_or_product\nphone,1\ndesktop,2\ntablet,3\nphone,4\n".as_bytes(),
            "template",
        )
        .unwrap();
        let model_features = vec!["device".to_string(), "page_or_product".to_string()];
        let schema = FeatureSchema::for_model(&model_features, &template, "page_or_product");
        let categories = CategoryCodeMap::page_or_product();
        let builder = FeatureVectorBuilder::new(&schema, &categories);

        let row = builder
            .build(&inputs(&[
                ("device", "phone".into()),
                ("page_or_product", "home".into()),
            ]))
            .unwrap();
        assert_eq!(row.values(), &[1.0, 20.0]);

        let row = builder
            .build(&inputs(&[
                ("device", "desktop".into()),
                ("page_or_product", "home".into()),
            ]))
            .unwrap();
        assert_eq!(row.get("device"), Some(0.0));

        let result = builder.build(&inputs(&[
            ("device", "watch".into()),
            ("page_or_product", "home".into()),
        ]));
        assert!(matches!(
            result,
            Err(AnalyticsError::InvalidFeatureValue { feature, .. }) if feature == "device"
        ));
    }

    #[test]
    fn misspelled_feature_is_rejected_even_with_defaults() {
        let schema = schema();
        let categories = CategoryCodeMap::page_or_product();
        let result = FeatureVectorBuilder::new(&schema, &categories)
            .with_policy(DefaultPolicy::NumericDefaults)
            .build(&inputs(&[
                ("page_or_product", "home".into()),
                ("device", FeatureInput::Number(1.0)),
                ("duraton", FeatureInput::Number(500.0)),
            ]));
        assert!(matches!(
            result,
            Err(AnalyticsError::UnknownFeature(name)) if name == "duraton"
        ));
    }

    #[test]
    fn parse_splits_numbers_from_labels() {
        assert_eq!(FeatureInput::parse(" 42 "), FeatureInput::Number(42.0));
        assert_eq!(
            FeatureInput::parse("Smart Home"),
            FeatureInput::Label("Smart Home".into())
        );
    }
}
