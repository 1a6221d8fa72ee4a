//! Network Layer
//!
//! WebSocket node serving one staking orchestrator.
//! This layer is **non-deterministic**: it samples the wall clock and hands
//! the result to the core as `now`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{validate_token, validate_token_at, AuthConfig, AuthError, TokenClaims};
pub use protocol::{
    ClientMessage, CommitRequest, ErrorCode, EventView, RecordView, ServerError, ServerMessage,
};
pub use server::{Connection, HabitNode, NodeConfig, NodeError, NodeState, ESCROW_LABEL};
