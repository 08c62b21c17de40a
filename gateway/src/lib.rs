//! Control gateway for the supervised sync service.
//!
//! Exposes start / restart / stop and the service event stream over a
//! websocket and a small HTTP API.

pub mod boot;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod server;

pub use boot::{BootOutcome, boot_service};
pub use config::GatewayConfig;
pub use connection::ConnectionManager;
pub use error::{GatewayError, Result};
pub use message::{ClientAction, ClientMessage, ConnectionId, ServerMessage, ServerMessageType};
pub use server::{AppState, create_app, shutdown_signal, spawn_event_relay};
