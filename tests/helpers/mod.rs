//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use http::{Request, StatusCode};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use presence_api::AppState;
use presence_auth::{InMemoryKeySource, KeyCache, KeySource, TokenValidator};
use presence_core::config::AppConfig;
use presence_realtime::ConnectionHub;

pub const TENANT: &str = "contoso";
pub const CLIENT: &str = "presence-test-client";

const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/rsa_primary.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");
const KID: &str = "primary-key";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Hub shared with the router
    pub hub: Arc<ConnectionHub>,
    /// Key source behind the validator
    pub keys: Arc<InMemoryKeySource>,
    /// Application config
    pub config: AppConfig,
}

impl TestApp {
    /// Create a new test application with default settings
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test application after adjusting the default config
    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::default();
        config.auth.tenant_id = TENANT.to_string();
        config.auth.client_id = CLIENT.to_string();
        adjust(&mut config);

        let keys = Arc::new(InMemoryKeySource::from_json(JWKS).expect("Invalid JWKS fixture"));
        let cache = Arc::new(KeyCache::new(
            Arc::clone(&keys) as Arc<dyn KeySource>,
            config.auth.key_refresh_interval(),
        ));
        let validator = Arc::new(TokenValidator::new(&config.auth, cache));
        let hub = Arc::new(ConnectionHub::new(config.realtime.clone()));

        let state = AppState::new(Arc::new(config.clone()), validator, Arc::clone(&hub));
        let router = presence_api::build_router(state);

        Self {
            router,
            hub,
            keys,
            config,
        }
    }

    /// Default claims for a user
    pub fn claims(subject: &str, name: &str) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "oid": subject,
            "sub": format!("pairwise-{subject}"),
            "name": name,
            "email": format!("{}@contoso.com", subject),
            "preferred_username": format!("{}@contoso.com", subject),
            "tid": TENANT,
            "roles": ["Chat.User"],
            "aud": CLIENT,
            "iss": format!("https://login.microsoftonline.com/{TENANT}/v2.0"),
            "iat": now,
            "exp": now + 3600,
        })
    }

    /// Sign arbitrary claims with the fixture key
    pub fn sign(claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_string());
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY).expect("Invalid signing key fixture");
        encode(&header, claims, &key).expect("Failed to sign token")
    }

    /// Issue a valid token for a user
    pub fn token(subject: &str, name: &str) -> String {
        Self::sign(&Self::claims(subject, name))
    }

    /// Make an HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Send a prepared request through the router
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Serve the router on an ephemeral port
    pub async fn spawn(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");
        let router = self.router.clone();

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Test server failed");
        });

        addr
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

/// WebSocket client that splits batched frames into single events
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<Value>,
}

impl WsClient {
    /// Connect to `/ws` with the token in the query string
    pub async fn connect(addr: SocketAddr, token: &str) -> Self {
        let url = format!("ws://{addr}/ws?token={token}");
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("WebSocket handshake failed");

        Self {
            stream,
            pending: VecDeque::new(),
        }
    }

    /// Next event pushed by the server, or `None` once the socket closes
    pub async fn next_event(&mut self) -> Option<Value> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            let frame = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("Timed out waiting for a frame")?;

            match frame.ok()? {
                Message::Text(text) => {
                    for line in text.as_str().lines().filter(|l| !l.is_empty()) {
                        self.pending
                            .push_back(serde_json::from_str(line).expect("Frame is not JSON"));
                    }
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }

    /// Next event of the given type, skipping others
    pub async fn next_of_type(&mut self, kind: &str) -> Value {
        loop {
            let event = self
                .next_event()
                .await
                .unwrap_or_else(|| panic!("Socket closed before a '{kind}' event"));
            if event["type"] == kind {
                return event;
            }
        }
    }

    /// Close the socket from the client side
    pub async fn close(mut self) {
        let _ = self.stream.send(Message::Close(None)).await;
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(Ok(_)) = self.stream.next().await {}
        })
        .await;
    }
}

/// Poll until `check` passes or a few seconds elapse
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Condition not met in time");
}
