//! Process-wide artifacts: interaction log, reference template, model and scaler.
//!
//! Each artifact is read from disk on first use and shared read-only after
//! that, so independent requests never see each other's inputs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info_span;
use uuid::Uuid;

use crate::cache::Memoized;
use crate::category::{CategoryCodeMap, CATEGORY_FEATURE};
use crate::error::Result;
use crate::features::{DefaultPolicy, FeatureInput, FeatureVector, FeatureVectorBuilder};
use crate::inference::{
    self, Classifier, FittedScaler, ModelArtifact, PredictionResult, StandardScaler,
};
use crate::schema::{FeatureSchema, TemplateTable};
use crate::store::{EventStore, EventTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub events: PathBuf,
    pub template: PathBuf,
    pub model: PathBuf,
    pub scaler: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            events: PathBuf::from("interface.csv"),
            template: PathBuf::from("MLF.csv"),
            model: PathBuf::from("model.json"),
            scaler: PathBuf::from("scaler.json"),
        }
    }
}

/// A prediction together with the row that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub request_id: Uuid,
    pub vector: FeatureVector,
    pub result: PredictionResult,
}

#[derive(Debug)]
pub struct Resources {
    paths: ArtifactPaths,
    events: EventStore,
    template: Memoized<TemplateTable>,
    model: Memoized<ModelArtifact>,
    scaler: Memoized<StandardScaler>,
    categories: CategoryCodeMap,
}

impl Resources {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            events: EventStore::new(paths.events.clone()),
            paths,
            template: Memoized::new(),
            model: Memoized::new(),
            scaler: Memoized::new(),
            categories: CategoryCodeMap::page_or_product(),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn events(&self) -> Result<Arc<EventTable>> {
        self.events.load()
    }

    pub fn template(&self) -> Result<Arc<TemplateTable>> {
        self.template
            .get_or_try_init(|| TemplateTable::from_path(&self.paths.template))
    }

    pub fn model(&self) -> Result<Arc<ModelArtifact>> {
        self.model.get_or_try_init(|| inference::load_model(&self.paths.model))
    }

    pub fn scaler(&self) -> Result<Arc<StandardScaler>> {
        self.scaler.get_or_try_init(|| inference::load_scaler(&self.paths.scaler))
    }

    pub fn categories(&self) -> &CategoryCodeMap {
        &self.categories
    }

    /// Input schema in the model's column order, with domains from the template.
    pub fn schema(&self) -> Result<FeatureSchema> {
        let model = self.model()?;
        let template = self.template()?;
        let scaler = self.scaler()?;
        Ok(
            FeatureSchema::for_model(model.feature_names(), &template, CATEGORY_FEATURE)
                .with_scaled_features(scaler.feature_names()),
        )
    }

    /// Build, scale and classify one submitted form.
    pub fn predict(
        &self,
        inputs: &HashMap<String, FeatureInput>,
        policy: DefaultPolicy,
    ) -> Result<PredictionOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!("prediction", %request_id);
        let _entered = span.enter();

        let schema = self.schema()?;
        let vector = FeatureVectorBuilder::new(&schema, &self.categories)
            .with_policy(policy)
            .build(inputs)?;
        let scaler = self.scaler()?;
        let model = self.model()?;
        let result = inference::predict(&vector, scaler.as_ref(), model.as_ref())?;

        tracing::info!(
            predicted_class = result.predicted_class,
            p_purchase = result.purchase_probability(),
            "prediction served"
        );

        Ok(PredictionOutcome {
            request_id,
            vector,
            result,
        })
    }
}
