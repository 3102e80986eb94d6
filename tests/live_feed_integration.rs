//! Integration tests for the live channel over real sockets.
//!
//! An axum server plays the backend; the supervisor talks to it through
//! `TungsteniteConnector` and `HttpAuthApi`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use fitlive::adapters::auth::HttpAuthApi;
use fitlive::adapters::navigation::RecordingNavigator;
use fitlive::adapters::storage::InMemoryCredentialStore;
use fitlive::adapters::websocket::TungsteniteConnector;
use fitlive::application::live::{
    ConnectionSupervisor, LiveAuthMode, LiveEndpoint, LiveListener, SupervisorConfig,
    KEEPALIVE_FRAME,
};
use fitlive::application::CredentialManager;
use fitlive::domain::credential::{BearerToken, IdentityReference, Role};
use fitlive::domain::foundation::{ResourceId, SubjectId};
use fitlive::domain::live::{ConnectionState, InboundMessage, ReconnectPolicy, Scope};

// =============================================================================
// Test Infrastructure
// =============================================================================

#[derive(Default)]
struct Backend {
    connections: AtomicUsize,
    refreshes: AtomicUsize,
    received: Mutex<Vec<String>>,
    tokens_seen: Mutex<Vec<String>>,
    pongs: AtomicUsize,
    /// Close each socket right after the greeting.
    drop_after_greeting: bool,
    /// Ping the client right after the greeting.
    ping_after_greeting: bool,
}

async fn serve(backend: Arc<Backend>) -> SocketAddr {
    let app = Router::new()
        .route("/websocket_live/ws/live/:id", get(live_session))
        .route("/websocket/ws/live/:id", get(live_token))
        .route("/websocket/ws/buddy/:id", get(live_token))
        .route("/auth/refresh", post(refresh))
        .route("/auth/verify", get(verify))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn live_session(State(backend): State<Arc<Backend>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| greet(backend, socket))
}

async fn live_token(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.get("token").cloned().unwrap_or_default();
    backend.tokens_seen.lock().unwrap().push(token.clone());
    if token != "fresh-token" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| greet(backend, socket))
}

async fn greet(backend: Arc<Backend>, mut socket: WebSocket) {
    backend.connections.fetch_add(1, Ordering::SeqCst);
    let greeting = json!({"action": "update_live_count", "live_count": 7}).to_string();
    if socket.send(Message::Text(greeting)).await.is_err() {
        return;
    }
    if backend.drop_after_greeting {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    if backend.ping_after_greeting && socket.send(Message::Ping(b"hb".to_vec())).await.is_err() {
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => backend.received.lock().unwrap().push(text),
            Message::Pong(_) => {
                backend.pongs.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

async fn refresh(State(backend): State<Arc<Backend>>) -> Json<serde_json::Value> {
    backend.refreshes.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    Json(json!({"access_token": "fresh-token"}))
}

async fn verify(headers: axum::http::HeaderMap) -> StatusCode {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == "Bearer fresh-token");
    if authorized {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

fn identity() -> IdentityReference {
    IdentityReference::new(
        SubjectId::new("u-17").unwrap(),
        Role::new("member").unwrap(),
    )
}

fn credentials(
    addr: SocketAddr,
    stored: Option<&str>,
) -> (Arc<CredentialManager>, Arc<RecordingNavigator>) {
    let api = HttpAuthApi::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    let store = InMemoryCredentialStore::signed_in(
        identity(),
        stored.map(|t| BearerToken::new(t).unwrap()),
    );
    let navigator = Arc::new(RecordingNavigator::new());
    let manager = CredentialManager::new(Arc::new(api), Arc::new(store), navigator.clone());
    (Arc::new(manager), navigator)
}

fn supervisor(addr: SocketAddr, mode: LiveAuthMode, config: SupervisorConfig) -> ConnectionSupervisor {
    let endpoint = LiveEndpoint::new(addr.to_string(), false, mode).unwrap();
    ConnectionSupervisor::new(
        endpoint,
        Arc::new(TungsteniteConnector::new(Duration::from_secs(5))),
        config,
    )
}

fn gym(namespace: &str) -> Scope {
    Scope::new(namespace, "live", ResourceId::from(42)).unwrap()
}

fn counter(count: &Arc<AtomicUsize>) -> Arc<dyn LiveListener> {
    let count = count.clone();
    Arc::new(move |_: &InboundMessage| {
        count.fetch_add(1, Ordering::SeqCst);
    })
}

type Seen = Arc<Mutex<Vec<serde_json::Value>>>;

fn recorder(seen: &Seen) -> Arc<dyn LiveListener> {
    let seen = seen.clone();
    Arc::new(move |message: &InboundMessage| {
        seen.lock().unwrap().push(message.to_value());
    })
}

fn greeting() -> serde_json::Value {
    json!({"action": "update_live_count", "live_count": 7})
}

// =============================================================================
// Live feed
// =============================================================================

#[tokio::test]
async fn every_subscriber_receives_the_server_message_once() {
    let backend = Arc::new(Backend::default());
    let addr = serve(backend.clone()).await;
    let sup = supervisor(addr, LiveAuthMode::SessionImplicit, SupervisorConfig::default());
    let scope = gym("websocket_live");

    let seen: Vec<Seen> = (0..3).map(|_| Seen::default()).collect();
    let _subs: Vec<_> = seen.iter().map(|s| sup.add(&scope, recorder(s))).collect();
    let rx = sup.watch(&scope);
    sup.start(&scope);

    wait_until(|| seen.iter().all(|s| !s.lock().unwrap().is_empty())).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    for s in &seen {
        assert_eq!(*s.lock().unwrap(), vec![greeting()]);
    }
    assert_eq!(backend.connections.load(Ordering::SeqCst), 1);

    sup.shutdown().await;
    assert_eq!(rx.borrow().state, ConnectionState::Closed);
}

#[tokio::test]
async fn server_ping_is_answered_once() {
    let backend = Arc::new(Backend {
        ping_after_greeting: true,
        ..Backend::default()
    });
    let addr = serve(backend.clone()).await;
    let config = SupervisorConfig::default().with_keepalive_interval(Duration::from_millis(50));
    let sup = supervisor(addr, LiveAuthMode::SessionImplicit, config);
    let scope = gym("websocket_live");

    sup.start(&scope);
    wait_until(|| {
        backend.pongs.load(Ordering::SeqCst) >= 1 && backend.received.lock().unwrap().len() >= 2
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(backend.pongs.load(Ordering::SeqCst), 1);
    sup.shutdown().await;
}

#[tokio::test]
async fn one_supervisor_serves_both_auth_modes() {
    let backend = Arc::new(Backend::default());
    let addr = serve(backend.clone()).await;
    let (manager, _) = credentials(addr, Some("fresh-token"));
    let endpoint = LiveEndpoint::new(addr.to_string(), false, LiveAuthMode::SessionImplicit)
        .unwrap()
        .with_namespace_mode("websocket", LiveAuthMode::TokenInQuery);
    let sup = ConnectionSupervisor::new(
        endpoint,
        Arc::new(TungsteniteConnector::new(Duration::from_secs(5))),
        SupervisorConfig::default(),
    )
    .with_credentials(manager);
    let gym_feed = gym("websocket_live");
    let buddy_feed = Scope::new("websocket", "buddy", ResourceId::from(7)).unwrap();
    let (gym_seen, buddy_seen) = (Seen::default(), Seen::default());
    let _gym_sub = sup.add(&gym_feed, recorder(&gym_seen));
    let _buddy_sub = sup.add(&buddy_feed, recorder(&buddy_seen));

    sup.start(&gym_feed);
    sup.start(&buddy_feed);
    wait_until(|| !gym_seen.lock().unwrap().is_empty() && !buddy_seen.lock().unwrap().is_empty())
        .await;

    assert_eq!(*gym_seen.lock().unwrap(), vec![greeting()]);
    assert_eq!(*buddy_seen.lock().unwrap(), vec![greeting()]);
    assert_eq!(*backend.tokens_seen.lock().unwrap(), vec!["fresh-token".to_string()]);
    sup.shutdown().await;
}

#[tokio::test]
async fn open_feed_sends_keepalive_frames() {
    let backend = Arc::new(Backend::default());
    let addr = serve(backend.clone()).await;
    let config = SupervisorConfig::default().with_keepalive_interval(Duration::from_millis(50));
    let sup = supervisor(addr, LiveAuthMode::SessionImplicit, config);
    let scope = gym("websocket_live");

    sup.start(&scope);
    wait_until(|| backend.received.lock().unwrap().len() >= 2).await;

    assert!(backend
        .received
        .lock()
        .unwrap()
        .iter()
        .all(|frame| frame == KEEPALIVE_FRAME));
    sup.shutdown().await;
}

#[tokio::test]
async fn dropped_socket_is_reopened() {
    let backend = Arc::new(Backend {
        drop_after_greeting: true,
        ..Backend::default()
    });
    let addr = serve(backend.clone()).await;
    let policy = ReconnectPolicy::default()
        .with_initial_delay(Duration::from_millis(20))
        .with_jitter(0.0);
    let sup = supervisor(
        addr,
        LiveAuthMode::SessionImplicit,
        SupervisorConfig::default().with_reconnect(policy),
    );
    let scope = gym("websocket_live");
    let count = Arc::new(AtomicUsize::new(0));
    let _sub = sup.add(&scope, counter(&count));

    sup.start(&scope);
    wait_until(|| count.load(Ordering::SeqCst) >= 2).await;

    assert!(backend.connections.load(Ordering::SeqCst) >= 2);
    sup.shutdown().await;
}

#[tokio::test]
async fn stop_closes_the_socket_and_silences_listeners() {
    let backend = Arc::new(Backend::default());
    let addr = serve(backend.clone()).await;
    let sup = supervisor(addr, LiveAuthMode::SessionImplicit, SupervisorConfig::default());
    let scope = gym("websocket_live");
    let count = Arc::new(AtomicUsize::new(0));
    let _sub = sup.add(&scope, counter(&count));

    sup.start(&scope);
    wait_until(|| count.load(Ordering::SeqCst) == 1).await;
    let mut rx = sup.watch(&scope);
    sup.stop(&scope);

    assert_eq!(sup.listener_count(&scope), 0);
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.state == ConnectionState::Closed),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn rejected_token_in_query_is_refreshed_then_accepted() {
    let backend = Arc::new(Backend::default());
    let addr = serve(backend.clone()).await;
    let (manager, navigator) = credentials(addr, Some("stale-token"));
    let sup = supervisor(addr, LiveAuthMode::TokenInQuery, SupervisorConfig::default())
        .with_credentials(manager);
    let scope = gym("websocket");
    let count = Arc::new(AtomicUsize::new(0));
    let _sub = sup.add(&scope, counter(&count));

    sup.start(&scope);
    wait_until(|| count.load(Ordering::SeqCst) == 1).await;

    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(
        *backend.tokens_seen.lock().unwrap(),
        vec!["stale-token".to_string(), "fresh-token".to_string()]
    );
    assert_eq!(navigator.times_routed(), 0);
    sup.shutdown().await;
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn concurrent_refreshes_share_one_request() {
    let backend = Arc::new(Backend::default());
    let addr = serve(backend.clone()).await;
    let (manager, _) = credentials(addr, None);

    let first = manager.refresh();
    let second = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.refresh().await
    };
    let (a, b) = tokio::join!(first, second);

    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().expose(), "fresh-token");
    assert_eq!(b.unwrap().expose(), "fresh-token");
}

#[tokio::test]
async fn verified_token_replaces_a_rejected_one() {
    let backend = Arc::new(Backend::default());
    let addr = serve(backend.clone()).await;
    let (manager, navigator) = credentials(addr, Some("stale-token"));

    let token = manager.get_verified_token().await.unwrap();

    assert_eq!(token.expose(), "fresh-token");
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert!(manager.verify(&token).await);
    assert_eq!(navigator.times_routed(), 0);
}
