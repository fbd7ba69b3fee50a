pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod stub;

pub use models::*;
pub use router::ai_routes;
pub use services::{DiagnosisEngine, FeedbackService, RetrainingScheduler, SymptomModel};
