//! Relay HTTP/WebSocket server.
//!
//! Three routes: publisher upgrade (`/ws`, device id as query parameter),
//! observer upgrade (`/devices/{device_id}/ws`), and discovery
//! (`/clients`). Admission checks run before the upgrade, so rejected
//! peers get a plain HTTP client error and no connection is created.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use devicepulse_protocol::constants::{PUBLISHER_PATH, WS_MAX_MESSAGE_SIZE};

use crate::RelayError;
use crate::engine::RelayEngine;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind.
    pub host: String,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// The relay server.
///
/// Owns the engine and serves its endpoints until cancellation.
pub struct RelayServer {
    config: RelayConfig,
    engine: Arc<RelayEngine>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

#[derive(Clone)]
struct AppState {
    engine: Arc<RelayEngine>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            engine: Arc::new(RelayEngine::new()),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// Returns the bound address. Only available after [`run`] binds.
    ///
    /// [`run`]: RelayServer::run
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Signals the server to stop accepting and return from [`run`].
    ///
    /// [`run`]: RelayServer::run
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Builds the relay router over the given engine.
    pub fn router(engine: Arc<RelayEngine>) -> Router {
        Router::new()
            .route(PUBLISHER_PATH, get(publisher_handler))
            .route("/devices/{device_id}/ws", get(observer_handler))
            .route("/clients", get(clients_handler))
            .with_state(AppState { engine })
    }

    /// Binds the configured address and serves until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), RelayError> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("relay listening on {local_addr}");

        let app = Self::router(Arc::clone(&self.engine));
        let cancel = self.cancel.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("relay shutting down");
            })
            .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct PublisherQuery {
    device_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

#[derive(Serialize)]
struct ClientsResponse {
    clients: Vec<String>,
}

/// GET /ws?device_id=<id> — publisher upgrade.
///
/// The extractor result is deferred so admission errors reject the
/// request before any upgrade happens.
async fn publisher_handler(
    State(state): State<AppState>,
    Query(query): Query<PublisherQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let device_id = query.device_id.unwrap_or_default();
    if device_id.is_empty() {
        tracing::warn!("rejecting publisher: missing device id");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "device_id is required",
            }),
        )
            .into_response();
    }

    match ws {
        Ok(ws) => ws
            .max_message_size(WS_MAX_MESSAGE_SIZE)
            .on_upgrade(move |socket| async move {
                state.engine.run_publisher(&device_id, socket).await;
            }),
        Err(rejection) => rejection.into_response(),
    }
}

/// GET /devices/{device_id}/ws — observer upgrade.
///
/// Admission requires a live publisher for the id at this moment; a
/// publisher that disconnects afterwards does not evict the observer.
async fn observer_handler(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !state.engine.registry().is_known(&device_id) {
        tracing::warn!(%device_id, "rejecting observer: unknown device id");
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "unknown device id",
            }),
        )
            .into_response();
    }

    match ws {
        Ok(ws) => ws
            .max_message_size(WS_MAX_MESSAGE_SIZE)
            .on_upgrade(move |socket| async move {
                state.engine.run_observer(&device_id, socket).await;
            }),
        Err(rejection) => rejection.into_response(),
    }
}

/// GET /clients — ids of all devices with at least one live publisher.
async fn clients_handler(State(state): State<AppState>) -> Json<ClientsResponse> {
    Json(ClientsResponse {
        clients: state.engine.registry().known_device_ids(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnId, Role};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_engine() -> Arc<RelayEngine> {
        Arc::new(RelayEngine::new())
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn publisher_without_device_id_is_rejected() {
        let app = RelayServer::router(make_engine());
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"error": "device_id is required"})
        );
    }

    #[tokio::test]
    async fn publisher_with_empty_device_id_is_rejected() {
        let app = RelayServer::router(make_engine());
        let req = Request::builder()
            .uri("/ws?device_id=")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn observer_for_unknown_device_is_rejected() {
        let app = RelayServer::router(make_engine());
        let req = Request::builder()
            .uri("/devices/device-B/ws")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"error": "unknown device id"})
        );
    }

    #[tokio::test]
    async fn clients_listing_is_empty_without_publishers() {
        let app = RelayServer::router(make_engine());
        let req = Request::builder()
            .uri("/clients")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({"clients": []}));
    }

    #[tokio::test]
    async fn clients_listing_reflects_registered_publishers() {
        let engine = make_engine();
        let (sender, _rx) = crate::connection::channel();
        engine
            .registry()
            .register("device-A", Role::Publisher, ConnId::new_v4(), sender);

        let app = RelayServer::router(engine);
        let req = Request::builder()
            .uri("/clients")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"clients": ["device-A"]})
        );
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = RelayServer::router(make_engine());
        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn server_binds_dynamic_port() {
        let server = RelayServer::new(RelayConfig {
            host: "127.0.0.1".into(),
            port: 0,
        });
        let server2 = Arc::clone(&server);
        let handle = tokio::spawn(async move { server2.run().await });

        // Wait for the server to bind.
        let mut port = 0;
        for _ in 0..100 {
            if let Some(addr) = server.local_addr().await {
                port = addr.port();
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(port > 0, "should have bound to a dynamic port");

        server.shutdown();
        handle.await.unwrap().unwrap();
    }
}
