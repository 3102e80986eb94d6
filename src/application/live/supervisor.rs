//! Connection supervisor - one transport per visible scope.
//!
//! # Architecture
//!
//! ```text
//!   presentation layer            ConnectionSupervisor                 network
//!   ──────────────────            ────────────────────                 ───────
//!   start(scope)  ───────────────► ScopeSlot ── spawn ──► scope task ◄──► socket
//!   stop(scope)   ───────────────►   │ registry            │  keepalive "{}"
//!   add(scope, l) ─► Subscription    │ status (watch)  ◄───┘  frames ─► registry.dispatch
//! ```
//!
//! Each visible scope gets a fresh `VisibilitySessionId` and a background
//! task that connects, pumps frames into the scope's `ListenerRegistry`,
//! sends keepalives, and reconnects with bounded backoff. The task only
//! writes status while its session is still the scope's current one, so a
//! late-finishing task from an earlier session can never clobber a newer one.
//!
//! `stop` is synchronous: it clears the listeners, raises the stop flag that
//! suppresses keepalives, and signals the task, which closes the transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::application::CredentialManager;
use crate::domain::foundation::{StateMachine, Timestamp, VisibilitySessionId};
use crate::domain::live::{
    CloseReason, ConnectionState, LiveUrl, ReconnectPolicy, Scope, ScopeStatus,
};
use crate::ports::{TransportConnector, TransportError, TransportFrame, TransportStream};

use super::endpoint::{LiveAuthMode, LiveEndpoint};
use super::listener_registry::{ListenerRegistry, LiveListener};
use super::subscription::Subscription;

/// Frame sent as a liveness probe.
pub const KEEPALIVE_FRAME: &str = "{}";

/// Shortest keepalive interval the supervisor will run.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Supervisor tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Interval between keepalive frames while open. A transport that stays
    /// open this long also resets the reconnect backoff.
    pub keepalive_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(25),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SupervisorConfig {
    /// Sets the keepalive interval, raised to `MIN_KEEPALIVE_INTERVAL` if
    /// shorter.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(MIN_KEEPALIVE_INTERVAL);
        self
    }

    fn keepalive_period(&self) -> Duration {
        self.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL)
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the live transports. Construct once and share behind an `Arc`.
pub struct ConnectionSupervisor {
    endpoint: LiveEndpoint,
    connector: Arc<dyn TransportConnector>,
    credentials: Option<Arc<CredentialManager>>,
    config: SupervisorConfig,
    scopes: Mutex<HashMap<Scope, ScopeSlot>>,
}

struct ScopeSlot {
    registry: Arc<ListenerRegistry>,
    status: Arc<watch::Sender<ScopeStatus>>,
    visible: Option<VisibleSession>,
}

impl ScopeSlot {
    fn new(scope: &Scope) -> Self {
        let (status, _) = watch::channel(ScopeStatus::closed());
        Self {
            registry: Arc::new(ListenerRegistry::new(scope.clone())),
            status: Arc::new(status),
            visible: None,
        }
    }

    /// Hidden, unobserved, and without listeners. Such a slot carries no
    /// state worth keeping.
    fn is_idle(&self) -> bool {
        self.visible.is_none() && self.registry.is_empty() && self.status.receiver_count() == 0
    }
}

/// Forgets every idle scope.
fn prune_idle(scopes: &mut HashMap<Scope, ScopeSlot>) {
    scopes.retain(|_, slot| !slot.is_idle());
}

struct VisibleSession {
    session: VisibilitySessionId,
    task: Option<RunningTask>,
}

struct RunningTask {
    stop: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningTask {
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Suppresses further keepalives and asks the task to close.
    fn signal_stop(self) -> JoinHandle<()> {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        self.handle
    }
}

impl ConnectionSupervisor {
    pub fn new(
        endpoint: LiveEndpoint,
        connector: Arc<dyn TransportConnector>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            endpoint,
            connector,
            credentials: None,
            config,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Supplies tokens for token-in-query URLs and 401 recovery.
    pub fn with_credentials(mut self, credentials: Arc<CredentialManager>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn endpoint(&self) -> &LiveEndpoint {
        &self.endpoint
    }

    fn scopes(&self) -> MutexGuard<'_, HashMap<Scope, ScopeSlot>> {
        lock(&self.scopes)
    }

    /// The scope became visible. Opens its transport unless it is already
    /// visible or its resource id is unresolved.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, scope: &Scope) {
        if !scope.is_resolved() {
            tracing::debug!(scope = %scope, "Scope unresolved, not connecting");
            return;
        }

        let mut scopes = self.scopes();
        prune_idle(&mut scopes);
        let slot = scopes
            .entry(scope.clone())
            .or_insert_with(|| ScopeSlot::new(scope));

        if slot.visible.is_some() {
            tracing::debug!(scope = %scope, "Scope already visible");
            return;
        }

        let session = VisibilitySessionId::new();
        slot.status.send_modify(|status| {
            status.state = ConnectionState::Closed;
            status.session = Some(session);
            status.reconnect_attempt = 0;
            status.last_close = None;
            status.changed_at = Timestamp::now();
        });

        let task = self.spawn_task(scope, session, slot);
        slot.visible = Some(VisibleSession {
            session,
            task: Some(task),
        });
        tracing::debug!(scope = %scope, session = %session, "Scope visible");
    }

    /// The scope lost visibility. Clears its listeners, stops keepalives and
    /// closes the transport. Stopping a scope that is not visible does
    /// nothing.
    pub fn stop(&self, scope: &Scope) {
        // Detached: the task finishes closing on its own.
        let _ = self.stop_scope(scope);
    }

    fn stop_scope(&self, scope: &Scope) -> Option<JoinHandle<()>> {
        let mut scopes = self.scopes();
        let handle = Self::hide(scope, &mut scopes);
        prune_idle(&mut scopes);
        handle
    }

    fn hide(scope: &Scope, scopes: &mut HashMap<Scope, ScopeSlot>) -> Option<JoinHandle<()>> {
        let slot = scopes.get_mut(scope)?;
        let visible = slot.visible.take()?;

        slot.registry.clear();

        let live_task = visible.task.filter(|t| !t.is_finished());
        let handle = match live_task {
            Some(task) => {
                slot.status.send_if_modified(|status| {
                    if status.session != Some(visible.session) {
                        return false;
                    }
                    let moved = status.state.advance(ConnectionState::Closing).is_ok();
                    if moved {
                        status.changed_at = Timestamp::now();
                    }
                    moved
                });
                Some(task.signal_stop())
            }
            None => None,
        };

        tracing::debug!(scope = %scope, session = %visible.session, "Scope hidden");
        handle
    }

    /// Registers `listener` for `scope` and returns its disposer.
    ///
    /// If this is the scope's first listener, the scope is visible, and its
    /// transport has given up, a new transport is opened.
    pub fn add(&self, scope: &Scope, listener: Arc<dyn LiveListener>) -> Subscription {
        let mut scopes = self.scopes();
        prune_idle(&mut scopes);
        let slot = scopes
            .entry(scope.clone())
            .or_insert_with(|| ScopeSlot::new(scope));

        let first = slot.registry.is_empty();
        let subscription = slot.registry.subscribe(listener);

        if first && scope.is_resolved() {
            let session = match &slot.visible {
                Some(visible) if visible.task.as_ref().map_or(true, RunningTask::is_finished) => {
                    Some(visible.session)
                }
                _ => None,
            };
            if let Some(session) = session {
                tracing::debug!(scope = %scope, "First listener, reopening transport");
                let task = self.spawn_task(scope, session, slot);
                if let Some(visible) = slot.visible.as_mut() {
                    visible.task = Some(task);
                }
            }
        }

        subscription
    }

    /// Current status of `scope` while it is visible, has listeners, or is
    /// watched. Idle scopes are forgotten on the next `start`, `stop`, `add`
    /// or `watch`.
    pub fn status(&self, scope: &Scope) -> Option<ScopeStatus> {
        self.scopes()
            .get(scope)
            .map(|slot| slot.status.borrow().clone())
    }

    /// Observes status changes of `scope`.
    pub fn watch(&self, scope: &Scope) -> watch::Receiver<ScopeStatus> {
        let mut scopes = self.scopes();
        prune_idle(&mut scopes);
        let slot = scopes
            .entry(scope.clone())
            .or_insert_with(|| ScopeSlot::new(scope));
        slot.status.subscribe()
    }

    /// Number of distinct listeners registered for `scope`.
    pub fn listener_count(&self, scope: &Scope) -> usize {
        self.scopes()
            .get(scope)
            .map_or(0, |slot| slot.registry.len())
    }

    /// Scopes that are currently visible.
    pub fn visible_scopes(&self) -> Vec<Scope> {
        self.scopes()
            .iter()
            .filter(|(_, slot)| slot.visible.is_some())
            .map(|(scope, _)| scope.clone())
            .collect()
    }

    /// Stops every scope and waits for the transports to close.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .visible_scopes()
            .iter()
            .filter_map(|scope| self.stop_scope(scope))
            .collect();

        tracing::info!(scopes = handles.len(), "Live supervisor shutting down");
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Scope task ended abnormally");
            }
        }
    }

    fn spawn_task(
        &self,
        scope: &Scope,
        session: VisibilitySessionId,
        slot: &ScopeSlot,
    ) -> RunningTask {
        let stop = Arc::new(AtomicBool::new(false));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = ScopeTask {
            scope: scope.clone(),
            session,
            endpoint: self.endpoint.clone(),
            connector: Arc::clone(&self.connector),
            credentials: self.credentials.clone(),
            registry: Arc::clone(&slot.registry),
            status: Arc::clone(&slot.status),
            stop: Arc::clone(&stop),
            config: self.config.clone(),
        };

        RunningTask {
            stop,
            shutdown,
            handle: tokio::spawn(task.run(shutdown_rx)),
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        let scopes = std::mem::take(&mut *lock(&self.scopes));
        for (_, slot) in scopes {
            slot.registry.clear();
            if let Some(task) = slot.visible.and_then(|v| v.task) {
                drop(task.signal_stop());
            }
        }
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Scope task
// ════════════════════════════════════════════════════════════════════════════

/// How a connected transport ended.
enum PumpExit {
    Stopped,
    Lost,
}

/// Why a connect attempt produced no transport.
enum ConnectFailure {
    Stopped,
    Auth,
    Transport(TransportError),
}

struct ScopeTask {
    scope: Scope,
    session: VisibilitySessionId,
    endpoint: LiveEndpoint,
    connector: Arc<dyn TransportConnector>,
    credentials: Option<Arc<CredentialManager>>,
    registry: Arc<ListenerRegistry>,
    status: Arc<watch::Sender<ScopeStatus>>,
    stop: Arc<AtomicBool>,
    config: SupervisorConfig,
}

impl ScopeTask {
    /// Drives the scope until stopped or given up. `shutdown` resolves on
    /// the stop signal or when the supervisor side is dropped.
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut failures: u32 = 0;
        let mut refreshed_after_reject = false;
        let stable_after = self.config.keepalive_period();

        let reason = loop {
            if self.stopping() {
                break CloseReason::Stopped;
            }
            self.transition(ConnectionState::Connecting, failures);

            match self.connect(&mut shutdown).await {
                Ok(stream) => {
                    refreshed_after_reject = false;
                    self.transition(ConnectionState::Open, 0);
                    tracing::info!(scope = %self.scope, session = %self.session, "Live feed open");

                    let opened_at = Instant::now();
                    match self.pump(stream, &mut shutdown).await {
                        PumpExit::Stopped => break CloseReason::Stopped,
                        PumpExit::Lost => {}
                    }
                    // A feed dropped right after opening still counts as a failure.
                    if opened_at.elapsed() >= stable_after {
                        failures = 0;
                    }
                }
                Err(ConnectFailure::Stopped) => break CloseReason::Stopped,
                Err(ConnectFailure::Auth) => break CloseReason::AuthFailed,
                Err(ConnectFailure::Transport(TransportError::Unauthorized))
                    if self.endpoint.auth_mode_for(&self.scope) == LiveAuthMode::TokenInQuery =>
                {
                    if refreshed_after_reject {
                        tracing::warn!(scope = %self.scope, "Refreshed token rejected too");
                        break CloseReason::AuthFailed;
                    }
                    refreshed_after_reject = true;
                    if !self.refresh_credential().await {
                        break CloseReason::AuthFailed;
                    }
                    // Retry at once with the new token.
                    self.transition(ConnectionState::Reconnecting, failures);
                    continue;
                }
                Err(ConnectFailure::Transport(e)) => {
                    tracing::warn!(
                        scope = %self.scope,
                        attempt = failures + 1,
                        error = %e,
                        "Live connect failed"
                    );
                }
            }

            let Some(delay) = self.config.reconnect.delay_for(failures) else {
                tracing::warn!(
                    scope = %self.scope,
                    attempts = failures,
                    "Reconnect attempts exhausted, feed idle"
                );
                break CloseReason::RetriesExhausted;
            };
            failures += 1;
            self.transition(ConnectionState::Reconnecting, failures);
            tracing::debug!(scope = %self.scope, attempt = failures, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                biased;
                _ = shutdown.changed() => break CloseReason::Stopped,
                _ = tokio::time::sleep(delay) => {}
            }
        };

        self.finish(reason);
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    async fn connect(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Box<dyn TransportStream>, ConnectFailure> {
        let url = tokio::select! {
            biased;
            _ = shutdown.changed() => return Err(ConnectFailure::Stopped),
            url = self.build_url() => url?,
        };

        tracing::debug!(scope = %self.scope, url = %url, "Connecting");

        tokio::select! {
            biased;
            _ = shutdown.changed() => Err(ConnectFailure::Stopped),
            result = self.connector.connect(&url) => result.map_err(ConnectFailure::Transport),
        }
    }

    async fn build_url(&self) -> Result<LiveUrl, ConnectFailure> {
        let token = match self.endpoint.auth_mode_for(&self.scope) {
            LiveAuthMode::SessionImplicit => None,
            LiveAuthMode::TokenInQuery => {
                let Some(credentials) = &self.credentials else {
                    tracing::error!(scope = %self.scope, "Token-in-query feed without a credential manager");
                    return Err(ConnectFailure::Auth);
                };
                match credentials.get_valid_token().await {
                    Ok(token) => Some(token),
                    Err(e) => {
                        tracing::warn!(scope = %self.scope, error = %e, "No credential for live feed");
                        return Err(ConnectFailure::Auth);
                    }
                }
            }
        };

        self.endpoint
            .url_for(&self.scope, token.as_ref())
            .map_err(|e| {
                tracing::error!(scope = %self.scope, error = %e, "Cannot build live URL");
                ConnectFailure::Auth
            })
    }

    async fn refresh_credential(&self) -> bool {
        let Some(credentials) = &self.credentials else {
            return false;
        };
        tracing::info!(scope = %self.scope, "Live channel rejected token, refreshing");
        credentials.refresh().await.is_ok()
    }

    /// Reads frames and sends keepalives until the transport ends or the
    /// scope is stopped.
    async fn pump(
        &self,
        mut stream: Box<dyn TransportStream>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PumpExit {
        let period = self.config.keepalive_period();
        let mut keepalive = interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    self.close(stream.as_mut()).await;
                    return PumpExit::Stopped;
                }

                _ = keepalive.tick() => {
                    if self.stop.load(Ordering::SeqCst) {
                        self.close(stream.as_mut()).await;
                        return PumpExit::Stopped;
                    }
                    if let Err(e) = stream.send_text(KEEPALIVE_FRAME).await {
                        tracing::warn!(scope = %self.scope, error = %e, "Keepalive failed");
                        return PumpExit::Lost;
                    }
                    tracing::trace!(scope = %self.scope, "Keepalive sent");
                }

                frame = stream.recv() => match frame {
                    Some(Ok(TransportFrame::Text(text))) => {
                        self.registry.dispatch_frame(&text);
                    }
                    Some(Ok(TransportFrame::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => {
                            self.registry.dispatch_frame(&text);
                        }
                        Err(_) => {
                            tracing::debug!(scope = %self.scope, "Dropping non-UTF-8 binary frame");
                        }
                    },
                    Some(Ok(TransportFrame::Close { code, reason })) => {
                        tracing::info!(scope = %self.scope, code = ?code, reason = %reason, "Live feed closed by server");
                        return PumpExit::Lost;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(scope = %self.scope, error = %e, "Live feed error");
                        return PumpExit::Lost;
                    }
                    None => {
                        tracing::info!(scope = %self.scope, "Live feed ended");
                        return PumpExit::Lost;
                    }
                },
            }
        }
    }

    async fn close(&self, stream: &mut dyn TransportStream) {
        if let Err(e) = stream.close().await {
            tracing::debug!(scope = %self.scope, error = %e, "Close failed");
        }
    }

    /// Applies `state` if this task still owns the scope and the edge is legal.
    fn transition(&self, state: ConnectionState, attempt: u32) {
        let session = self.session;
        self.status.send_if_modified(|status| {
            if status.session != Some(session) {
                return false;
            }
            if status.state == state && status.reconnect_attempt == attempt {
                return false;
            }
            if status.state != state && status.state.advance(state).is_err() {
                return false;
            }
            status.reconnect_attempt = attempt;
            if state != ConnectionState::Closed {
                status.last_close = None;
            }
            status.changed_at = Timestamp::now();
            true
        });
    }

    fn finish(&self, reason: CloseReason) {
        let session = self.session;
        let updated = self.status.send_if_modified(|status| {
            if status.session != Some(session) {
                return false;
            }
            if status.state == ConnectionState::Open {
                let _ = status.state.advance(ConnectionState::Closing);
            }
            if status.state != ConnectionState::Closed
                && status.state.advance(ConnectionState::Closed).is_err()
            {
                return false;
            }
            status.last_close = Some(reason);
            status.changed_at = Timestamp::now();
            true
        });

        if updated {
            tracing::info!(scope = %self.scope, session = %session, reason = ?reason, "Live feed closed");
        }
    }
}
