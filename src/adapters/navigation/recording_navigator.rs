//! Recording navigator for tests.

use std::sync::{Mutex, PoisonError};

use crate::domain::foundation::AuthError;
use crate::ports::SessionNavigator;

/// Remembers every `route_to_login` call.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routed: Mutex<Vec<AuthError>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reasons passed to `route_to_login`, oldest first.
    pub fn reasons(&self) -> Vec<AuthError> {
        self.routed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times the user was sent to login.
    pub fn times_routed(&self) -> usize {
        self.routed.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl SessionNavigator for RecordingNavigator {
    fn route_to_login(&self, reason: &AuthError) {
        self.routed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reason.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_route_in_order() {
        let nav = RecordingNavigator::new();
        nav.route_to_login(&AuthError::MissingIdentity);
        nav.route_to_login(&AuthError::RefreshRejected { status: 403 });

        assert_eq!(nav.times_routed(), 2);
        assert_eq!(
            nav.reasons(),
            vec![
                AuthError::MissingIdentity,
                AuthError::RefreshRejected { status: 403 }
            ]
        );
    }
}
