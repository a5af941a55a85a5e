//! Agreement lifecycle state machine.

pub mod machine;
pub mod state;

pub use machine::AgreementController;
pub use state::ControllerState;
