use axum::extract::ws::Message as WsMessage;
use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade, ws::WebSocket},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use syncservice_sdk::{ServiceEvent, ServiceOperation, SupervisorStatus, SyncSupervisor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::connection::ConnectionManager;
use crate::handler::handle_message;
use crate::message::{ClientMessage, ConnectionId, ServerMessage};

#[derive(Clone)]
pub struct AppState {
    pub connection_manager: ConnectionManager,
    pub supervisor: SyncSupervisor,
}

/// 创建路由
///
/// * `GET /ws` 控制端 websocket
/// * `GET /api/service` 服务状态
/// * `POST /api/service/:operation` start / restart / stop，返回 `{"success": bool}`
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/service", get(service_status))
        .route("/api/service/:operation", post(service_operation))
        .with_state(state)
}

async fn service_status(State(state): State<AppState>) -> Json<SupervisorStatus> {
    Json(state.supervisor.status())
}

async fn service_operation(
    State(state): State<AppState>,
    Path(operation): Path<String>,
) -> Response {
    let operation: ServiceOperation = match operation.parse() {
        Ok(operation) => operation,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": e })))
                .into_response();
        }
    };

    info!(%operation, "Service operation requested over HTTP");
    let success = state.supervisor.dispatch(operation).await;
    Json(serde_json::json!({
        "operation": operation,
        "success": success,
    }))
    .into_response()
}

/// 把 supervisor 的事件转发给所有连接，直到 `cancel` 被触发
pub fn spawn_event_relay(
    supervisor: SyncSupervisor,
    manager: ConnectionManager,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = supervisor.events();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => {
                        log_event(&event);
                        manager.broadcast(ServerMessage::service_event(&event)).await;
                    }
                    None => break,
                },
            }
        }
        debug!("Event relay stopped");
    })
}

fn log_event(event: &ServiceEvent) {
    match event {
        ServiceEvent::Stdout { message } => trace!(target: "syncservice", "{}", message),
        ServiceEvent::Stderr { message } => debug!(target: "syncservice", "{}", message),
        other => info!("Sync service event: {}", other.message()),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new_v4();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let manager = state.connection_manager.clone();
    manager.add_connection(connection_id, tx).await;

    // 写任务：连接被移除后通道关闭，任务随之结束
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(WsMessage::Text(json)).await {
                debug!("WebSocket send failed: {}", e);
                break;
            }
        }
    });

    if let Err(e) = manager
        .send_to(&connection_id, ServerMessage::welcome(connection_id))
        .await
    {
        warn!("Failed to greet connection {}: {}", connection_id, e);
    }

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                let response = match ClientMessage::from_json(&text) {
                    Ok(msg) => handle_message(&state.supervisor, connection_id, msg).await,
                    Err(e) => ServerMessage::error(None, format!("Invalid message: {}", e)),
                };
                if let Err(e) = manager.send_to(&connection_id, response).await {
                    warn!("Failed to reply on connection {}: {}", connection_id, e);
                    break;
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error on connection {}: {}", connection_id, e);
                break;
            }
        }
    }

    manager.remove_connection(&connection_id).await;
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", connection_id, e);
    }
    info!("WebSocket connection closed: {}", connection_id);
}

/// 等待 Ctrl-C、SIGTERM 或 `cancel`
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
        _ = cancel.cancelled() => info!("Shutdown requested"),
    }
}
