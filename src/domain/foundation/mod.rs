//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, the state machine trait and error
//! types that the credential and live-feed modules build on.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::AuthError;
pub use errors::ValidationError;
pub use ids::{ResourceId, SubjectId, VisibilitySessionId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
