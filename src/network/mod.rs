//! Network Layer
//!
//! WebSocket gateway in front of the engine. Nothing here touches balances
//! directly; every state change goes through `engine/`.

pub mod auth;
pub mod handler;
pub mod protocol;
pub mod server;

pub use auth::{AuthConfig, AuthError, Identity, TokenClaims, validate_token};
pub use handler::{ClientSession, MessageHandler};
pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use server::{GameServer, GameServerError};
