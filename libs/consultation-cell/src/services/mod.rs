pub mod consultation;
pub mod lifecycle;
pub mod messaging;

pub use consultation::ConsultationService;
pub use lifecycle::ConsultationLifecycle;
pub use messaging::MessageService;
