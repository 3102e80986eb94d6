//! Logging navigator - used by headless hosts (the CLI) that have no login
//! screen to route to.

use crate::domain::foundation::AuthError;
use crate::ports::SessionNavigator;

/// Records the forced logout in the log and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNavigator;

impl SessionNavigator for LoggingNavigator {
    fn route_to_login(&self, reason: &AuthError) {
        tracing::error!(error = %reason, "Session ended, sign-in required");
    }
}
