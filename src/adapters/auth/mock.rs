//! Mock auth API for testing.
//!
//! Scripts refresh outcomes, counts calls, and optionally delays each
//! refresh so tests can pile concurrent callers onto one in-flight request.
//!
//! # Example
//!
//! ```ignore
//! let api = MockAuthApi::new()
//!     .with_refresh_token("fresh")
//!     .with_refresh_delay(Duration::from_millis(50))
//!     .with_valid_token("fresh");
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::credential::{BearerToken, IdentityReference};
use crate::domain::foundation::AuthError;
use crate::ports::AuthApi;

/// Mock `AuthApi`.
///
/// Refresh results are popped from a queue; once the queue is empty the
/// fallback result repeats. Verify accepts only tokens registered with
/// `with_valid_token`.
#[derive(Debug)]
pub struct MockAuthApi {
    scripted: Mutex<VecDeque<Result<String, AuthError>>>,
    fallback: Mutex<Result<String, AuthError>>,
    valid_tokens: Mutex<HashSet<String>>,
    verify_error: Mutex<Option<AuthError>>,
    refresh_delay: Mutex<Option<Duration>>,
    refresh_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockAuthApi {
    fn default() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Err(AuthError::RefreshRejected { status: 401 })),
            valid_tokens: Mutex::new(HashSet::new()),
            verify_error: Mutex::new(None),
            refresh_delay: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }
}

impl MockAuthApi {
    /// Creates a mock whose refresh is rejected until scripted otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every refresh returns `token` (after any scripted results).
    pub fn with_refresh_token(self, token: impl Into<String>) -> Self {
        *lock(&self.fallback) = Ok(token.into());
        self
    }

    /// Every refresh fails with `error` (after any scripted results).
    pub fn with_refresh_error(self, error: AuthError) -> Self {
        *lock(&self.fallback) = Err(error);
        self
    }

    /// Queues one refresh outcome ahead of the fallback.
    pub fn then_refresh(self, result: Result<&str, AuthError>) -> Self {
        lock(&self.scripted).push_back(result.map(str::to_string));
        self
    }

    /// Sleeps for `delay` inside every refresh call.
    pub fn with_refresh_delay(self, delay: Duration) -> Self {
        *lock(&self.refresh_delay) = Some(delay);
        self
    }

    /// Marks `token` as accepted by `verify`.
    pub fn with_valid_token(self, token: impl Into<String>) -> Self {
        lock(&self.valid_tokens).insert(token.into());
        self
    }

    /// Forces every `verify` to fail with `error`.
    pub fn with_verify_error(self, error: AuthError) -> Self {
        *lock(&self.verify_error) = Some(error);
        self
    }

    /// Marks `token` as accepted at runtime.
    pub fn accept_token(&self, token: impl Into<String>) {
        lock(&self.valid_tokens).insert(token.into());
    }

    /// Revokes `token` at runtime.
    pub fn revoke_token(&self, token: &str) {
        lock(&self.valid_tokens).remove(token);
    }

    /// Number of refresh calls observed.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of verify calls observed.
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn next_refresh(&self) -> Result<String, AuthError> {
        if let Some(result) = lock(&self.scripted).pop_front() {
            return result;
        }
        lock(&self.fallback).clone()
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn refresh(&self, _identity: &IdentityReference) -> Result<BearerToken, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.refresh_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let raw = self.next_refresh()?;
        BearerToken::new(raw).map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    async fn verify(&self, token: &BearerToken) -> Result<bool, AuthError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = lock(&self.verify_error).clone() {
            return Err(error);
        }
        Ok(lock(&self.valid_tokens).contains(token.expose()))
    }
}
