pub mod engine;
pub mod feedback;
pub mod model;
pub mod scheduler;

pub use engine::DiagnosisEngine;
pub use feedback::FeedbackService;
pub use model::{normalize_symptom, SymptomModel};
pub use scheduler::RetrainingScheduler;
