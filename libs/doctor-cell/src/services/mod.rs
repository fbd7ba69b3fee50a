pub mod application;
pub mod doctor;

pub use application::DoctorApplicationService;
pub use doctor::DoctorService;
