//! REST SDK for the SmaRTC call-session backend.
//!
//! `SmartcClient` wraps the backend's authentication, session and ICE
//! endpoints behind typed requests and responses. Every call maps HTTP
//! failures into one of four [`ErrorKind`] categories; nothing is retried.
//!
//! DESIGN
//! ======
//! The client is single-writer: methods that change the token, username or
//! current session take `&mut self`. State lives only for the lifetime of the
//! value and is cleared by [`SmartcClient::logout`].

mod client;
mod config;
mod error;
mod types;

pub use client::SmartcClient;
pub use config::{
    Config, DEFAULT_API_BASE_URL, DEFAULT_SIGNAL_SERVER_URL, DEFAULT_TIMEOUT_SECS, HUB_PATH,
};
pub use error::{ErrorKind, SdkError};
pub use types::{FALLBACK_STUN_URL, IceServer, Session, User};
