pub mod auth_gate;
pub mod interactor;

pub use auth_gate::AuthGate;
pub use interactor::Interactor;
