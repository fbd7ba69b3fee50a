pub mod call;
pub mod lifecycle;

pub use call::CallService;
pub use lifecycle::{CallLifecycle, RING_TIMEOUT_SECONDS};
