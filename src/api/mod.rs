//! Matchmaking API service
//!
//! HTTP endpoints for pairing and settlement plus the authenticated
//! WebSocket realtime channel.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;
