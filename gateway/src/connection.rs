use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::message::{ConnectionId, ServerMessage};

/// 连接管理器，保存所有控制端连接的发送通道
#[derive(Clone)]
pub struct ConnectionManager {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 添加新连接
    pub async fn add_connection(
        &self,
        id: ConnectionId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let mut connections = self.connections.write().await;
        connections.insert(id, sender);
        info!("Connection added: {} (total: {})", id, connections.len());
    }

    /// 移除连接
    pub async fn remove_connection(&self, id: &ConnectionId) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            info!("Connection removed: {} (total: {})", id, connections.len());
        } else {
            warn!("Attempted to remove non-existent connection: {}", id);
        }
    }

    /// 发送消息给指定连接
    pub async fn send_to(&self, id: &ConnectionId, message: ServerMessage) -> Result<()> {
        let connections = self.connections.read().await;
        let sender = connections
            .get(id)
            .ok_or_else(|| GatewayError::ConnectionNotFound(id.to_string()))?;

        sender.send(message).map_err(|e| {
            GatewayError::InternalError(format!("Failed to send message: {}", e))
        })?;
        debug!("Message sent to connection: {}", id);
        Ok(())
    }

    /// 广播消息给所有连接，返回成功送达的数量
    pub async fn broadcast(&self, message: ServerMessage) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;

        for (id, sender) in connections.iter() {
            match sender.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Failed to broadcast to connection {}: {}", id, e),
            }
        }

        delivered
    }

    /// 当前连接数
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
