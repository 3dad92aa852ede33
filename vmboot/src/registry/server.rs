//! HTTP registry serving instance settings

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::registry::{Server, ServerManager};

struct RegistryState {
    username: String,
    password: SecretString,
    settings: RwLock<HashMap<String, String>>,
}

impl RegistryState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(encoded) = value.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return false;
        };

        match credentials.split_once(':') {
            Some((user, password)) => {
                user == self.username && password == self.password.expose_secret()
            }
            None => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
    settings: String,
    status: &'static str,
}

fn unauthorized() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Bosh Registry\"")],
    )
        .into_response()
}

async fn get_settings(
    State(state): State<Arc<RegistryState>>,
    Path(instance_id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    match state.settings.read().await.get(&instance_id) {
        Some(settings) => Json(SettingsResponse {
            settings: settings.clone(),
            status: "ok",
        })
        .into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"status": "not_found"}))).into_response(),
    }
}

async fn put_settings(
    State(state): State<Arc<RegistryState>>,
    Path(instance_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    debug!("Registry storing settings for instance {}", instance_id);
    state.settings.write().await.insert(instance_id, body);
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

async fn delete_settings(
    State(state): State<Arc<RegistryState>>,
    Path(instance_id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    state.settings.write().await.remove(&instance_id);
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

fn router(state: Arc<RegistryState>) -> Router {
    Router::new()
        .route(
            "/instances/{id}/settings",
            get(get_settings).put(put_settings).delete(delete_settings),
        )
        .with_state(state)
}

/// Starts registry servers on demand
#[derive(Debug, Default, Clone)]
pub struct HttpRegistryServerManager;

impl HttpRegistryServerManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServerManager for HttpRegistryServerManager {
    async fn start(
        &self,
        username: &str,
        password: &str,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn Server>, DeployError> {
        let state = Arc::new(RegistryState {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
            settings: RwLock::new(HashMap::new()),
        });

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DeployError::RegistryError(format!("Binding '{}': {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DeployError::RegistryError(e.to_string()))?;
        info!("Starting registry on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| DeployError::RegistryError(e.to_string()))
        });

        Ok(Box::new(HttpRegistryServer {
            local_addr,
            shutdown_tx,
            handle,
        }))
    }
}

/// A running registry
pub struct HttpRegistryServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), DeployError>>,
}

#[async_trait]
impl Server for HttpRegistryServer {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn stop(self: Box<Self>) -> Result<(), DeployError> {
        let HttpRegistryServer {
            local_addr,
            shutdown_tx,
            handle,
        } = *self;

        let _ = shutdown_tx.send(());
        handle.await??;
        info!("Stopped registry on {}", local_addr);
        Ok(())
    }
}
