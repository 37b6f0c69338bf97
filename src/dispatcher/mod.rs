// ABOUTME: Reverse-Proxy core — WebSocket dispatch (spec.md §4.4) plus the RP admin surface (§6).
// ABOUTME: Resolves a function, acquires an instance, dials it, and splices frames both ways.

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message as ClientMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as BackendMessage;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pool::Registry;

#[derive(Clone)]
pub struct DispatcherState {
    pub registry: Arc<Registry>,
    pub config: Arc<Config>,
}

/// The RP admin surface (spec.md §6: "RP admin HTTP (8091)") — accepts
/// `POST /` install/delete calls from the Control Plane only. Must not be
/// bound to the same listener as [`invoke_router`]: anyone who can reach the
/// public invoke port would otherwise be able to replace or delete any
/// function's pool.
pub fn admin_router(state: DispatcherState) -> Router {
    Router::new().route("/", post(admin_update)).with_state(state)
}

/// The RP user-facing surface (spec.md §6: "RP user endpoint (8083/8093)") —
/// serves only the WebSocket invoke route.
pub fn invoke_router(state: DispatcherState) -> Router {
    Router::new().route("/{name}", get(invoke)).with_state(state)
}

#[derive(Deserialize)]
struct AdminRequest {
    name: String,
    ips: Vec<String>,
}

/// `POST /` — install/replace a function's pool, or delete it if `ips` is empty (spec.md §6).
async fn admin_update(
    State(state): State<DispatcherState>,
    body: Result<axum::Json<AdminRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Ok(axum::Json(request)) = body else {
        return (StatusCode::BAD_REQUEST, "malformed body").into_response();
    };
    let name = request.name.trim_start_matches('/').to_string();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "empty function name").into_response();
    }

    if request.ips.is_empty() {
        state.registry.remove(&name).await;
    } else {
        state.registry.install(name, request.ips).await;
    }
    StatusCode::OK.into_response()
}

/// `GET /{name}` with WebSocket upgrade headers (spec.md §4.4, §6).
async fn invoke(
    State(state): State<DispatcherState>,
    Path(name): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let name = name.trim_start_matches('/').to_string();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "empty function name").into_response();
    }

    let Some(pool) = state.registry.lookup(&name).await else {
        return (StatusCode::NOT_FOUND, "unknown function").into_response();
    };

    upgrade.on_upgrade(move |socket| async move {
        if let Err(e) = serve_session(socket, pool).await {
            tracing::warn!("session for {} ended with error: {}", name, e);
        }
    })
}

async fn serve_session(client: WebSocket, pool: Arc<crate::pool::FunctionPool>) -> Result<()> {
    let ip = match pool.acquire().await {
        Ok(ip) => ip,
        Err(e) => {
            close_with_error(client, &e).await;
            return Err(e);
        }
    };

    let backend_url = format!("ws://{ip}:8000");
    let backend = match tokio_tungstenite::connect_async(&backend_url).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            close_with_error(client, &Error::transient(e.to_string())).await;
            pool.release(&ip).await.ok();
            return Err(Error::transient(e.to_string()));
        }
    };

    splice(client, backend).await;
    pool.release(&ip).await.ok();
    Ok(())
}

async fn close_with_error(mut client: WebSocket, error: &Error) {
    let frame = axum::extract::ws::CloseFrame {
        code: 500,
        reason: error.to_string().into(),
    };
    let _ = client.send(ClientMessage::Close(Some(frame))).await;
}

/// Frame-level relay between the client's WebSocket and the dialed backend's
/// WebSocket. Axum's typed `WebSocket` does not expose the raw socket
/// beneath it, so byte-level splicing (spec.md §4.4 step 6) is done one
/// level up: two tasks forward `Message`s in each direction, and the first
/// side to finish tears down the other.
async fn splice(
    client: WebSocket,
    backend: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut backend_tx, mut backend_rx) = backend.split();

    let (done_tx, mut done_rx) = mpsc::channel::<()>(2);

    let to_backend = {
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            while let Some(Ok(message)) = client_rx.next().await {
                if matches!(message, ClientMessage::Close(_)) {
                    break;
                }
                if backend_tx.send(to_backend_message(message)).await.is_err() {
                    break;
                }
            }
            let _ = done_tx.send(()).await;
        })
    };

    let to_client = tokio::spawn(async move {
        while let Some(Ok(message)) = backend_rx.next().await {
            if matches!(message, BackendMessage::Close(_)) {
                break;
            }
            if client_tx.send(to_client_message(message)).await.is_err() {
                break;
            }
        }
        let _ = done_tx.send(()).await;
    });

    done_rx.recv().await;
    to_backend.abort();
    to_client.abort();
}

fn to_backend_message(message: ClientMessage) -> BackendMessage {
    match message {
        ClientMessage::Text(text) => BackendMessage::Text(text.as_str().into()),
        ClientMessage::Binary(data) => BackendMessage::Binary(data),
        ClientMessage::Ping(data) => BackendMessage::Ping(data),
        ClientMessage::Pong(data) => BackendMessage::Pong(data),
        ClientMessage::Close(_) => BackendMessage::Close(None),
    }
}

fn to_client_message(message: BackendMessage) -> ClientMessage {
    match message {
        BackendMessage::Text(text) => ClientMessage::Text(text.as_str().into()),
        BackendMessage::Binary(data) => ClientMessage::Binary(data),
        BackendMessage::Ping(data) => ClientMessage::Ping(data),
        BackendMessage::Pong(data) => ClientMessage::Pong(data),
        BackendMessage::Close(_) | BackendMessage::Frame(_) => {
            ClientMessage::Close(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admin_update_rejects_empty_name() {
        let state = DispatcherState {
            registry: Arc::new(Registry::new(Arc::new(Config::default()))),
            config: Arc::new(Config::default()),
        };
        let response = admin_update(
            State(state),
            Ok(axum::Json(AdminRequest {
                name: "/".to_string(),
                ips: vec!["10.0.0.1".to_string()],
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_update_install_then_delete() {
        let registry = Arc::new(Registry::new(Arc::new(Config::default())));
        let state = DispatcherState {
            registry: registry.clone(),
            config: Arc::new(Config::default()),
        };
        admin_update(
            State(state.clone()),
            Ok(axum::Json(AdminRequest {
                name: "echo".to_string(),
                ips: vec!["10.0.0.1".to_string()],
            })),
        )
        .await;
        assert!(registry.lookup("echo").await.is_some());

        admin_update(
            State(state),
            Ok(axum::Json(AdminRequest {
                name: "echo".to_string(),
                ips: vec![],
            })),
        )
        .await;
        assert!(registry.lookup("echo").await.is_none());
    }
}
