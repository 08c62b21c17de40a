use serde::{Deserialize, Serialize};
use syncservice_sdk::{ServiceEvent, ServiceOperation};
use uuid::Uuid;

use crate::error::{GatewayError, Result};

/// 连接唯一标识符
pub type ConnectionId = Uuid;

/// 客户端发送的消息
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientMessage {
    /// 消息唯一标识
    pub id: String,
    /// 操作类型
    pub action: String,
    /// 消息负载
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ClientMessage {
    /// 解析 websocket 文本帧
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// 客户端操作类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// 控制同步服务 (start / restart / stop)
    Control(ServiceOperation),
    /// 查询服务状态
    State,
    /// 获取当前实例的 API key
    GetApiKey,
}

impl ClientAction {
    /// 从客户端消息解析操作
    pub fn from_message(msg: &ClientMessage) -> Result<Self> {
        match msg.action.as_str() {
            "control" => {
                let operation = msg
                    .payload
                    .get("operation")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| GatewayError::InvalidPayload("missing operation".to_string()))?;
                let operation = operation
                    .parse::<ServiceOperation>()
                    .map_err(GatewayError::InvalidPayload)?;
                Ok(ClientAction::Control(operation))
            }
            "state" => Ok(ClientAction::State),
            "get_api_key" => Ok(ClientAction::GetApiKey),
            _ => Err(GatewayError::UnknownAction(msg.action.clone())),
        }
    }
}

/// 服务器发送的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    /// 对应请求的 id（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 消息类型
    #[serde(rename = "type")]
    pub msg_type: ServerMessageType,
    /// 消息数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// 错误信息（仅在 type 为 error 时使用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 服务器消息类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMessageType {
    Response,
    Error,
    Notification,
}

impl ServerMessage {
    /// 创建响应消息
    pub fn response(id: String, data: serde_json::Value) -> Self {
        Self {
            id: Some(id),
            msg_type: ServerMessageType::Response,
            data: Some(data),
            error: None,
        }
    }

    /// 创建错误消息
    pub fn error(id: Option<String>, error: String) -> Self {
        Self {
            id,
            msg_type: ServerMessageType::Error,
            data: None,
            error: Some(error),
        }
    }

    /// 创建通知消息
    pub fn notification(data: serde_json::Value) -> Self {
        Self {
            id: None,
            msg_type: ServerMessageType::Notification,
            data: Some(data),
            error: None,
        }
    }

    /// 创建欢迎消息
    pub fn welcome(connection_id: ConnectionId) -> Self {
        Self::notification(serde_json::json!({
            "event": "connected",
            "connection_id": connection_id.to_string(),
        }))
    }

    /// 把同步服务事件包装成通知
    ///
    /// `message` 是事件的可读文本，退出事件为 "Process exited with exit code N"。
    pub fn service_event(event: &ServiceEvent) -> Self {
        Self::notification(serde_json::json!({
            "event": "service",
            "service": event,
            "message": event.message(),
        }))
    }
}
