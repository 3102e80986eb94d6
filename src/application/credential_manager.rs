//! CredentialManager - gatekeeper for the single bearer credential.
//!
//! Serves a valid token to any caller, verifies it against the auth service,
//! and refreshes it with at most one network call in flight at a time.
//!
//! # Single-flight refresh
//!
//! ```text
//! caller A ─┐
//! caller B ─┼─► in_flight slot ──► Shared<refresh future> ──► POST /auth/refresh
//! caller C ─┘        ▲                       │
//!                    └── cleared after settlement (ptr_eq match)
//! ```
//!
//! The first caller installs the shared future; later callers clone it and
//! await the same result. Whichever awaiter observes completion first clears
//! the slot, but only if the slot still holds that exact future.
//!
//! Refresh is fail-closed: any failure clears the credential and routes the
//! user to login. Retrying is the caller's business.
//!
//! Ending a session bumps an epoch. A refresh that started under an older
//! epoch discards its token and reports `SignedOut`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::domain::credential::{BearerToken, CredentialValidity, IdentityReference};
use crate::domain::foundation::AuthError;
use crate::ports::{AuthApi, CredentialStore, SessionNavigator};

type RefreshFuture = Shared<BoxFuture<'static, Result<BearerToken, AuthError>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the credential. Construct once and share behind an `Arc`.
pub struct CredentialManager {
    inner: Arc<Inner>,
    in_flight: Mutex<Option<RefreshFuture>>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn SessionNavigator>,
    cached: Mutex<Option<BearerToken>>,
    validity: Mutex<CredentialValidity>,
    epoch: AtomicU64,
}

impl CredentialManager {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn SessionNavigator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                navigator,
                cached: Mutex::new(None),
                validity: Mutex::new(CredentialValidity::Unknown),
                epoch: AtomicU64::new(0),
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Current validity of the cached credential.
    pub fn validity(&self) -> CredentialValidity {
        *lock(&self.inner.validity)
    }

    /// Persists a freshly issued credential after sign-in.
    pub async fn establish_session(
        &self,
        identity: IdentityReference,
        token: BearerToken,
    ) -> Result<(), AuthError> {
        self.inner.store.save_identity(&identity).await?;
        self.inner.store.save_token(&token).await?;
        *lock(&self.inner.cached) = Some(token);
        self.inner.set_validity(CredentialValidity::Valid);
        tracing::info!(subject = %identity.subject_id, "Session established");
        Ok(())
    }

    /// Signs the user out and routes to login.
    pub async fn logout(&self) {
        self.inner.end_session(AuthError::SignedOut).await;
    }

    /// Returns the cached token, loading it from the store on first use.
    /// Refreshes when no token is stored.
    pub async fn get_valid_token(&self) -> Result<BearerToken, AuthError> {
        if let Some(token) = lock(&self.inner.cached).clone() {
            return Ok(token);
        }

        match self.inner.store.load_token().await {
            Ok(Some(token)) => {
                *lock(&self.inner.cached) = Some(token.clone());
                self.inner.set_validity(CredentialValidity::Unknown);
                Ok(token)
            }
            Ok(None) => {
                tracing::debug!("No stored credential, refreshing");
                self.refresh().await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Credential store unreadable, refreshing");
                self.refresh().await
            }
        }
    }

    /// Asks the auth service whether `token` is accepted.
    ///
    /// A network failure counts as not accepted.
    pub async fn verify(&self, token: &BearerToken) -> bool {
        let is_current = lock(&self.inner.cached).as_ref() == Some(token);

        match self.inner.api.verify(token).await {
            Ok(accepted) => {
                if is_current {
                    self.inner.set_validity(if accepted {
                        CredentialValidity::Valid
                    } else {
                        CredentialValidity::Expired
                    });
                }
                accepted
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token verification failed, treating as rejected");
                false
            }
        }
    }

    /// Requests a new token, sharing any refresh already in flight.
    ///
    /// On failure the credential has been cleared and the navigator notified
    /// by the time this returns.
    pub async fn refresh(&self) -> Result<BearerToken, AuthError> {
        let flight = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!("Joining in-flight credential refresh");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let started = async move { inner.run_refresh().await }.boxed().shared();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        let result = flight.clone().await;

        let mut slot = lock(&self.in_flight);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }

        result
    }

    /// Obtains a token and verifies it; a rejected token gets exactly one
    /// refresh.
    pub async fn get_verified_token(&self) -> Result<BearerToken, AuthError> {
        let token = self.get_valid_token().await?;
        if self.verify(&token).await {
            return Ok(token);
        }

        tracing::info!("Credential rejected, refreshing once");
        self.refresh().await
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }
}

impl Inner {
    fn set_validity(&self, validity: CredentialValidity) {
        *lock(&self.validity) = validity;
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    async fn run_refresh(&self) -> Result<BearerToken, AuthError> {
        let epoch = self.epoch();

        let identity = match self.store.load_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Err(self.end_session(AuthError::MissingIdentity).await),
            Err(e) => return Err(self.end_session(e.into()).await),
        };

        tracing::info!(subject = %identity.subject_id, "Refreshing credential");

        let result = self.api.refresh(&identity).await;
        if self.epoch() != epoch {
            tracing::info!("Session ended during refresh, discarding result");
            return Err(AuthError::SignedOut);
        }

        match result {
            Ok(token) => {
                *lock(&self.cached) = Some(token.clone());
                self.set_validity(CredentialValidity::Valid);
                if let Err(e) = self.store.save_token(&token).await {
                    tracing::warn!(error = %e, "Refreshed credential not persisted");
                }
                if self.epoch() != epoch {
                    // Logged out while persisting; undo what this refresh wrote.
                    {
                        let mut cached = lock(&self.cached);
                        if cached.as_ref() == Some(&token) {
                            *cached = None;
                            self.set_validity(CredentialValidity::Unknown);
                        }
                    }
                    if matches!(self.store.load_token().await, Ok(Some(stored)) if stored == token) {
                        if let Err(e) = self.store.clear_token().await {
                            tracing::warn!(error = %e, "Failed to clear stored token");
                        }
                    }
                    return Err(AuthError::SignedOut);
                }
                Ok(token)
            }
            Err(e) => Err(self.end_session(e).await),
        }
    }

    /// Clears all credential material and hands off to navigation.
    async fn end_session(&self, reason: AuthError) -> AuthError {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *lock(&self.cached) = None;
        self.set_validity(CredentialValidity::Unknown);

        if let Err(e) = self.store.clear_token().await {
            tracing::warn!(error = %e, "Failed to clear stored token");
        }
        if let Err(e) = self.store.clear_identity().await {
            tracing::warn!(error = %e, "Failed to clear stored identity");
        }

        if reason == AuthError::SignedOut {
            tracing::info!("Signed out");
        } else {
            tracing::error!(error = %reason, "Credential refresh failed, ending session");
        }
        self.navigator.route_to_login(&reason);
        reason
    }
}
