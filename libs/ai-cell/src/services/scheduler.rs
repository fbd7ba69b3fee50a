use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{AiError, RetrainOutcome};
use crate::services::engine::DiagnosisEngine;
use crate::services::feedback::FeedbackService;

/// Periodically retrains the shared model from confirmed feedback.
pub struct RetrainingScheduler {
    engine: Arc<DiagnosisEngine>,
    feedback: FeedbackService,
    interval: Duration,
    min_samples: usize,
}

impl RetrainingScheduler {
    pub fn new(config: &AppConfig, engine: Arc<DiagnosisEngine>) -> Self {
        Self {
            engine,
            feedback: FeedbackService::new(config),
            interval: Duration::from_secs(config.ai_retrain_interval_minutes.max(1) * 60),
            min_samples: config.ai_min_training_samples,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One retraining pass. Skips the swap when too few samples exist.
    pub async fn run_once(&self, auth_token: Option<&str>) -> Result<RetrainOutcome, AiError> {
        let samples = self.feedback.confirmed_samples(auth_token).await?;

        if samples.len() < self.min_samples {
            debug!(
                "Skipping retraining: {} samples, {} required",
                samples.len(),
                self.min_samples
            );
            return Ok(RetrainOutcome {
                retrained: false,
                samples: samples.len(),
                model_version: self.engine.version().await,
            });
        }

        let model_version = self.engine.retrain(&samples).await;
        self.engine.save().await?;

        Ok(RetrainOutcome {
            retrained: true,
            samples: samples.len(),
            model_version,
        })
    }

    /// Runs until `shutdown` flips to true or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Model retraining scheduled every {:?}", self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_once(None).await {
                            Ok(outcome) if outcome.retrained => info!(
                                "Scheduled retraining produced model v{} from {} samples",
                                outcome.model_version, outcome.samples
                            ),
                            Ok(_) => {}
                            Err(e) => error!("Scheduled retraining failed: {}", e),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Model retraining scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_utils::test_utils::TestConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(samples: serde_json::Value) -> (MockServer, AppConfig, Arc<DiagnosisEngine>) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/diagnosis_feedback"))
            .and(query_param("confirmed", "eq.true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(samples))
            .mount(&server)
            .await;

        let mut config = TestConfig::with_ai_enabled().to_app_config();
        config.supabase_url = server.uri();
        let engine = Arc::new(DiagnosisEngine::new(&config.ai_model_path));
        (server, config, engine)
    }

    #[tokio::test]
    async fn too_few_samples_leave_model_alone() {
        let (_server, config, engine) = setup(json!([
            {"symptoms": ["ear_pain"], "condition": "otitis_media"}
        ])).await;
        let scheduler = RetrainingScheduler::new(&config, engine.clone());

        let outcome = scheduler.run_once(None).await.unwrap();

        assert!(!outcome.retrained);
        assert_eq!(outcome.samples, 1);
        assert_eq!(engine.version().await, 1);
        assert!(!engine.model_path().exists());
    }

    #[tokio::test]
    async fn enough_samples_retrain_and_persist() {
        let (_server, config, engine) = setup(json!([
            {"symptoms": ["ear_pain", "fever"], "condition": "otitis_media"},
            {"symptoms": ["ear_pain"], "condition": "otitis_media"}
        ])).await;
        let scheduler = RetrainingScheduler::new(&config, engine.clone());

        let outcome = scheduler.run_once(None).await.unwrap();

        assert!(outcome.retrained);
        assert_eq!(outcome.model_version, 2);
        assert!(engine.symptoms().await.contains(&"ear_pain".to_string()));
        assert!(engine.model_path().exists());
        let _ = std::fs::remove_file(engine.model_path());
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let (_server, config, engine) = setup(json!([])).await;
        let scheduler = RetrainingScheduler::new(&config, engine);
        let (tx, rx) = watch::channel(false);

        let handle = scheduler.spawn(rx);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
