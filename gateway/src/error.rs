use std::fmt;

#[derive(Debug)]
pub enum GatewayError {
    /// JSON 序列化/反序列化错误
    JsonError(serde_json::Error),
    /// 未知的消息操作
    UnknownAction(String),
    /// 消息负载不合法
    InvalidPayload(String),
    /// 连接不存在
    ConnectionNotFound(String),
    /// 同步服务错误
    Service(syncservice_sdk::Error),
    /// 配置错误
    Config(String),
    /// I/O 错误（监听地址等）
    Io(std::io::Error),
    /// 内部错误
    InternalError(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::JsonError(e) => write!(f, "JSON error: {}", e),
            GatewayError::UnknownAction(action) => write!(f, "Unknown action: {}", action),
            GatewayError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            GatewayError::ConnectionNotFound(id) => write!(f, "Connection not found: {}", id),
            GatewayError::Service(e) => write!(f, "Sync service error: {}", e),
            GatewayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GatewayError::Io(e) => write!(f, "I/O error: {}", e),
            GatewayError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::JsonError(e) => Some(e),
            GatewayError::Service(e) => Some(e),
            GatewayError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::JsonError(err)
    }
}

impl From<syncservice_sdk::Error> for GatewayError {
    fn from(err: syncservice_sdk::Error) -> Self {
        GatewayError::Service(err)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
