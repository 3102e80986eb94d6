//! Session navigator port - the presentation-layer hand-off on forced logout.

use crate::domain::foundation::AuthError;

/// Routes the user to the unauthenticated entry point.
///
/// Called by the credential manager after the credential has been cleared,
/// at most once per failed refresh. Implementations must not block.
pub trait SessionNavigator: Send + Sync {
    fn route_to_login(&self, reason: &AuthError);
}
