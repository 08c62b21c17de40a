use syncservice_sdk::{ServiceOperation, SyncSupervisor};
use tracing::{debug, error, info};

use crate::message::{ClientAction, ClientMessage, ConnectionId, ServerMessage};

/// 处理客户端消息
pub async fn handle_message(
    supervisor: &SyncSupervisor,
    connection_id: ConnectionId,
    msg: ClientMessage,
) -> ServerMessage {
    debug!("Handling message from {}: {:?}", connection_id, msg);

    let action = match ClientAction::from_message(&msg) {
        Ok(action) => action,
        Err(e) => {
            error!("Failed to parse action: {}", e);
            return ServerMessage::error(Some(msg.id), e.to_string());
        }
    };

    match action {
        ClientAction::Control(operation) => handle_control(supervisor, msg.id, operation).await,
        ClientAction::State => handle_state(supervisor, msg.id),
        ClientAction::GetApiKey => handle_get_api_key(supervisor, msg.id),
    }
}

/// 执行控制操作，只回报是否成功
pub async fn handle_control(
    supervisor: &SyncSupervisor,
    msg_id: String,
    operation: ServiceOperation,
) -> ServerMessage {
    info!(%operation, "Service operation requested");
    let success = supervisor.dispatch(operation).await;

    ServerMessage::response(
        msg_id,
        serde_json::json!({
            "operation": operation,
            "success": success,
        }),
    )
}

fn handle_state(supervisor: &SyncSupervisor, msg_id: String) -> ServerMessage {
    match serde_json::to_value(supervisor.status()) {
        Ok(status) => ServerMessage::response(msg_id, status),
        Err(e) => ServerMessage::error(Some(msg_id), format!("Failed to encode status: {}", e)),
    }
}

fn handle_get_api_key(supervisor: &SyncSupervisor, msg_id: String) -> ServerMessage {
    ServerMessage::response(
        msg_id,
        serde_json::json!({
            "api_key": supervisor.api_key(),
        }),
    )
}
