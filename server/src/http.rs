//! HTTP surface: pages, static assets, the session report and the
//! WebSocket upgrade that starts a session.

use crate::config::Config;
use crate::registry::{SessionRegistry, SessionSummary};
use crate::session::{run_session, SessionConfig};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{future, SinkExt, StreamExt};
use log::{debug, info, warn};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub session: SessionConfig,
    pub web_root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            session: config.session_config(),
            web_root: Arc::new(config.web_root.clone()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/test", get(test_page))
        .route("/game", get(game_socket))
        .route("/sessions", get(list_sessions))
        .route("/static/*path", get(static_asset))
        .with_state(state)
}

/// Binds the configured address and serves until the listener fails.
pub async fn serve(config: &Config) -> Result<(), ServerError> {
    let address = config.address();
    let listener = TcpListener::bind(&address).await?;
    info!(
        "Server listening on {} ({} Hz, assets from {})",
        address,
        config.tick_rate,
        config.web_root.display()
    );
    serve_with(listener, AppState::new(config)).await
}

pub async fn serve_with(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index(State(state): State<AppState>) -> Response {
    serve_file(&state.web_root.join("index.html")).await
}

async fn test_page(State(state): State<AppState>) -> Response {
    serve_file(&state.web_root.join("test.html")).await
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.snapshot())
}

async fn static_asset(State(state): State<AppState>, UrlPath(path): UrlPath<String>) -> Response {
    match safe_relative(&path) {
        Some(relative) => serve_file(&state.web_root.join("static").join(relative)).await,
        None => {
            warn!("Rejected static path {:?}", path);
            not_found()
        }
    }
}

async fn game_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();

    let inbound = stream.filter_map(|message| {
        future::ready(match message {
            Ok(Message::Text(text)) => Some(Ok(text)),
            Ok(Message::Binary(bytes)) => binary_text(bytes).map(Ok),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
    });
    let outbound = sink.with(|payload: String| future::ready(Ok::<_, axum::Error>(Message::Text(payload))));

    if let Err(e) = run_session(inbound, outbound, state.registry, state.session).await {
        debug!("Session ended with error: {}", e);
    }
}

/// Binary frames are accepted when they hold UTF-8 text.
fn binary_text(bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Discarded binary message: {}", e);
            None
        }
    }
}

/// Accepts only plain relative paths without `..`, root or prefix parts.
fn safe_relative(path: &str) -> Option<PathBuf> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(path))], bytes).into_response(),
        Err(e) => {
            debug!("Cannot serve {}: {}", path.display(), e);
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
