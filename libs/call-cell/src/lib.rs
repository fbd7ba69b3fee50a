pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::call_routes;
pub use services::{CallLifecycle, CallService};
