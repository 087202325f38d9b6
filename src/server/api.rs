use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::DefaultBodyLimit,
    extract::Path,
    extract::Query,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

use crate::ai::{self, Describer};
use crate::blobs::{self, BlobStore};
use crate::feed::{Item, ItemKind};
use crate::net;
use crate::sync::{ClientOp, Hub, ServerEvent};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub blobs: Arc<BlobStore>,
    pub describer: Arc<Describer>,
}

pub async fn serve(port: u16, ui: Option<PathBuf>) -> Result<()> {
    let state = AppState {
        hub: Arc::new(Hub::new()),
        blobs: Arc::new(BlobStore::new()),
        describer: Arc::new(Describer::from_env()?),
    };

    let app = Router::new()
        .route("/health", get(|| async { Json("OK") }))
        .route("/ws", get(ws_handler))
        .route("/api/items", get(get_items))
        .route("/api/upload", post(upload))
        .route("/api/files/{key}", get(get_file))
        .route("/api/ip", get(get_ip))
        .route("/api/describe", post(describe));

    let app = match ui {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.route("/", get(|| async { "Lanboard sync server" })),
    };
    let app = app
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    println!(
        "{} Board running at {}",
        "✓".green(),
        net::share_url(port).bright_blue()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(state, socket))
}

async fn handle_ws(state: AppState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();

    // Snapshot and subscription are taken under one lock, so every event the
    // subscription yields is strictly newer than this snapshot.
    let (snapshot, mut events) = state.hub.join();

    let init = ServerEvent::Init { items: snapshot };
    if let Ok(text) = serde_json::to_string(&init) {
        if sender.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }

    // Forward board events to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    // Dropping the connection forces a fresh INIT on reconnect.
                    tracing::warn!(missed, "slow subscriber, closing so it can resync");
                    break;
                }
                Err(RecvError::Closed) => break,
            };
            if let Ok(text) = serde_json::to_string(&event) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Receive operations from this client and apply them to the board
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientOp>(text.as_str()) {
                    Ok(op) => {
                        for locator in recv_state.hub.apply(op) {
                            recv_state.blobs.discard(&locator);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "dropping malformed client frame");
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::debug!("ignoring binary frame");
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn get_items(State(state): State<AppState>) -> Json<Vec<Item>> {
    Json(state.hub.snapshot())
}

#[derive(Deserialize)]
struct UploadQuery {
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadReply {
    locator: String,
    name: String,
    media_type: String,
    size: usize,
}

async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadReply>, StatusCode> {
    if body.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let name = query.name.unwrap_or_else(|| "upload".to_string());
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| blobs::guess_media_type(&name));

    let size = body.len();
    let locator = state
        .blobs
        .put(name.clone(), Some(media_type.clone()), body);
    tracing::debug!(%name, %media_type, size, "stored upload");

    Ok(Json(UploadReply {
        locator,
        name,
        media_type,
        size,
    }))
}

async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let blob = state.blobs.get(&key).ok_or(StatusCode::NOT_FOUND)?;
    // Quotes and control characters in the name would make the header value
    // invalid and fail the whole response.
    let safe_name: String = blob
        .name
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let disposition = format!("inline; filename=\"{}\"", safe_name);
    Ok((
        [
            (header::CONTENT_TYPE, blob.media_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        blob.bytes,
    ))
}

async fn get_ip() -> impl IntoResponse {
    match net::lan_ip() {
        Some(ip) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ip": ip.to_string() })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Local IP address not found." })),
        ),
    }
}

#[derive(Deserialize)]
struct DescribeRequest {
    id: String,
}

#[derive(Serialize)]
struct DescribeReply {
    text: String,
}

/// AI lookup for one item. Always replies 200; every failure mode collapses
/// to a placeholder string so the board itself is never affected.
async fn describe(
    State(state): State<AppState>,
    Json(request): Json<DescribeRequest>,
) -> Json<DescribeReply> {
    let item = state
        .hub
        .snapshot()
        .into_iter()
        .find(|item| item.id == request.id);

    let text = match item {
        Some(item) => match item.kind {
            ItemKind::Text => state.describer.summarize_text(&item.content).await,
            ItemKind::Image => {
                let blob = item
                    .locator
                    .as_deref()
                    .and_then(blobs::locator_key)
                    .and_then(|key| state.blobs.get(key));
                match blob {
                    Some(blob) => {
                        state
                            .describer
                            .describe_image(&blob.media_type, &blob.bytes)
                            .await
                    }
                    None => ai::FAILURE_PLACEHOLDER.to_string(),
                }
            }
            ItemKind::File => ai::UNSUPPORTED_PLACEHOLDER.to_string(),
        },
        None => ai::FAILURE_PLACEHOLDER.to_string(),
    };

    Json(DescribeReply { text })
}
