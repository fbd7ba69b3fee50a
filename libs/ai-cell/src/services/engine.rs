use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{
    AiError, DiagnoseRequest, DiagnosisResponse, ModelStatus, TrainingSample, DIAGNOSIS_DISCLAIMER,
};
use crate::services::model::{normalize_symptom, SymptomModel};

pub const MAX_SYMPTOMS: usize = 30;
pub const DEFAULT_TOP_K: usize = 3;
pub const MAX_TOP_K: usize = 10;

/// On-disk form of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelSnapshot {
    version: u64,
    trained_at: Option<DateTime<Utc>>,
    model: SymptomModel,
}

/// Shared, swappable model used by the HTTP handlers and the retraining job.
pub struct DiagnosisEngine {
    state: RwLock<ModelSnapshot>,
    model_path: PathBuf,
}

impl DiagnosisEngine {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            state: RwLock::new(ModelSnapshot {
                version: 1,
                trained_at: None,
                model: SymptomModel::seeded(),
            }),
            model_path: model_path.into(),
        }
    }

    pub async fn load(model_path: impl Into<PathBuf>) -> Result<Self, AiError> {
        let model_path = model_path.into();
        let bytes = tokio::fs::read(&model_path)
            .await
            .map_err(|e| AiError::Persistence(format!("reading {}: {}", model_path.display(), e)))?;
        let snapshot: ModelSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| AiError::Persistence(format!("parsing {}: {}", model_path.display(), e)))?;

        info!("Loaded symptom model v{} from {}", snapshot.version, model_path.display());
        Ok(Self {
            state: RwLock::new(snapshot),
            model_path,
        })
    }

    /// Falls back to the seed model when no usable snapshot exists.
    pub async fn load_or_seed(model_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        match Self::load(&model_path).await {
            Ok(engine) => engine,
            Err(e) => {
                warn!("Starting from seed symptom model: {}", e);
                Self::new(model_path)
            }
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    pub async fn diagnose(&self, request: &DiagnoseRequest) -> Result<DiagnosisResponse, AiError> {
        if request.symptoms.is_empty() || request.symptoms.len() > MAX_SYMPTOMS {
            return Err(AiError::ValidationError(format!(
                "Between 1 and {} symptoms are required",
                MAX_SYMPTOMS
            )));
        }
        let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(AiError::ValidationError(format!("top_k must be between 1 and {}", MAX_TOP_K)));
        }
        if request.age.is_some_and(|age| age > 130) {
            return Err(AiError::ValidationError("Age is out of range".to_string()));
        }

        let state = self.state.read().await;

        let (recognized, unrecognized): (Vec<String>, Vec<String>) = request.symptoms.iter()
            .map(|s| normalize_symptom(s))
            .filter(|s| !s.is_empty())
            .partition(|s| state.model.knows(s));

        let predictions = state.model.predict(&recognized, top_k)?;
        debug!(
            "Diagnosis over {} recognised symptoms with model v{}",
            recognized.len(),
            state.version
        );

        Ok(DiagnosisResponse {
            predictions,
            recognized_symptoms: recognized,
            unrecognized_symptoms: unrecognized,
            model_version: state.version,
            disclaimer: DIAGNOSIS_DISCLAIMER,
        })
    }

    pub async fn symptoms(&self) -> Vec<String> {
        self.state.read().await.model.vocabulary()
    }

    pub async fn status(&self) -> ModelStatus {
        let state = self.state.read().await;
        ModelStatus {
            enabled: true,
            status: "ready",
            model_version: state.version,
            conditions: state.model.conditions().len(),
            vocabulary_size: state.model.vocabulary().len(),
            trained_samples: state.model.total_samples(),
            last_trained_at: state.trained_at,
        }
    }

    /// Rebuilds the model from the seed plus `samples` and swaps it in.
    pub async fn retrain(&self, samples: &[TrainingSample]) -> u64 {
        let mut model = SymptomModel::seeded();
        model.train(samples);

        let mut state = self.state.write().await;
        state.model = model;
        state.version += 1;
        state.trained_at = Some(Utc::now());

        info!("Symptom model retrained on {} samples, now v{}", samples.len(), state.version);
        state.version
    }

    pub async fn save(&self) -> Result<(), AiError> {
        let bytes = {
            let state = self.state.read().await;
            serde_json::to_vec_pretty(&*state).map_err(|e| AiError::Persistence(e.to_string()))?
        };

        if let Some(parent) = self.model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AiError::Persistence(format!("creating {}: {}", parent.display(), e)))?;
        }

        // Write then rename so a crash never leaves a half-written model.
        let tmp_path = self.model_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| AiError::Persistence(format!("writing {}: {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, &self.model_path)
            .await
            .map_err(|e| AiError::Persistence(format!("replacing {}: {}", self.model_path.display(), e)))?;

        debug!("Symptom model saved to {}", self.model_path.display());
        Ok(())
    }
}
