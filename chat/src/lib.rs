//! Realtime chat over the SmaRTC signaling hub.
//!
//! `connection` owns the transport (negotiate, WebSocket, handshake,
//! keep-alive) and turns inbound hub traffic into [`ConnectionEvent`]s.
//! `client` layers the room/user state and the callback hooks on top.
//! `commands` parses the terminal prompt used by the `smartc-chat` binary.

pub mod client;
pub mod commands;
pub mod connection;
mod error;

#[cfg(test)]
mod test_support;

pub use client::ChatClient;
pub use connection::{ConnectionEvent, HubConnection, HubOptions};
pub use error::ChatError;
