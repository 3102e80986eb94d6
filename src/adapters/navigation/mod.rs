//! Navigation adapters.
//!
//! Implementations of the `SessionNavigator` port:
//!
//! - `LoggingNavigator` - Logs the forced logout (CLI hosts)
//! - `RecordingNavigator` - Captures routes for assertions in tests

mod logging_navigator;
mod recording_navigator;

pub use logging_navigator::LoggingNavigator;
pub use recording_navigator::RecordingNavigator;
