//! Matchwire - matchmaker and signaling server with atomic settlement
//!
//! Pairs two clients staking an identical bet, opens a realtime room
//! between them, relays pointer events inside the room, and settles the
//! wager exactly once. Any number of worker processes can run side by
//! side: pairing and settlement are single atomic steps against a
//! shared Redis store, and events fan out across processes over its
//! pub/sub relay.

pub mod api;
pub mod cleanup;
pub mod config;
pub mod errors;
pub mod fanout;
pub mod matchmaker;
pub mod rooms;
pub mod session;
pub mod settlement;
pub mod store;

pub use config::MatchwireConfig;
pub use errors::{Error, Result};
