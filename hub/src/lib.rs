//! Hub message model and JSON codec for the realtime signaling transport.
//!
//! This crate owns the wire representation spoken with the signaling hub.
//! Messages are JSON objects keyed by a numeric `type`, each terminated by the
//! ASCII record separator (`0x1E`). A single WebSocket text frame may carry
//! several messages.
//!
//! LIFECYCLE
//! =========
//! 1. Client sends the handshake request, server answers `{}` or an error
//! 2. Both sides exchange invocations; outbound ones carry no `invocationId`
//!    (fire-and-forget, no completion expected)
//! 3. Pings flow both ways as keep-alive
//! 4. Either side may end with a Close message

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminates every JSON message on the wire.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub protocol name negotiated during the handshake.
pub const PROTOCOL: &str = "json";

/// Hub protocol version negotiated during the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Hub method names, both invoked by the client and pushed by the server.
pub mod method {
    /// Client → hub: `JoinSession(room, user)`.
    pub const JOIN_SESSION: &str = "JoinSession";
    /// Client → hub: `LeaveSession(room, user)`.
    pub const LEAVE_SESSION: &str = "LeaveSession";
    /// Client → hub: `SendSignalToSession(room, message, user)`.
    pub const SEND_SIGNAL_TO_SESSION: &str = "SendSignalToSession";
    /// Hub → client: `SendSignal(signal, user)`.
    pub const SEND_SIGNAL: &str = "SendSignal";
    /// Hub → client: `NewUserArrived(user)`.
    pub const NEW_USER_ARRIVED: &str = "NewUserArrived";
    /// Hub → client: `UserLeft(user)`.
    pub const USER_LEFT: &str = "UserLeft";
}

/// Error returned by the decode functions.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload was not valid JSON or did not match the message shape.
    #[error("failed to decode hub message: {0}")]
    Json(#[from] serde_json::Error),
    /// A field required by the message type was absent.
    #[error("hub message is missing `{0}`")]
    MissingField(&'static str),
    /// The handshake response was not terminated by a record separator.
    #[error("handshake response is incomplete")]
    IncompleteHandshake,
    /// The server rejected the handshake.
    #[error("handshake rejected: {0}")]
    Handshake(String),
}

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Numeric `type` discriminator of a hub message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Invocation,
    StreamItem,
    Completion,
    Ping,
    Close,
}

impl MessageType {
    /// Convert into the wire integer.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Invocation => 1,
            Self::StreamItem => 2,
            Self::Completion => 3,
            Self::Ping => 6,
            Self::Close => 7,
        }
    }

    /// Parse a wire integer. Types this client never acts on return `None`.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Invocation),
            2 => Some(Self::StreamItem),
            3 => Some(Self::Completion),
            6 => Some(Self::Ping),
            7 => Some(Self::Close),
            _ => None,
        }
    }
}

/// A single message on the hub protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum HubMessage {
    /// Remote method call. `invocation_id` is absent for non-blocking calls.
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    /// One item of a server-to-client stream.
    StreamItem { invocation_id: String, item: Value },
    /// Result of a blocking invocation.
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    /// Keep-alive.
    Ping,
    /// Connection is being closed by the sender.
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Any message type the client does not handle, carrying its `type`.
    Other(u32),
}

impl HubMessage {
    /// Build a non-blocking invocation.
    #[must_use]
    pub fn invocation(target: &str, arguments: Vec<Value>) -> Self {
        Self::Invocation {
            invocation_id: None,
            target: target.to_owned(),
            arguments,
        }
    }

    /// `JoinSession(room, user)`.
    #[must_use]
    pub fn join_session(room: &str, user: &str) -> Self {
        Self::invocation(method::JOIN_SESSION, vec![room.into(), user.into()])
    }

    /// `LeaveSession(room, user)`.
    #[must_use]
    pub fn leave_session(room: &str, user: &str) -> Self {
        Self::invocation(method::LEAVE_SESSION, vec![room.into(), user.into()])
    }

    /// `SendSignalToSession(room, message, user)`.
    #[must_use]
    pub fn send_signal_to_session(room: &str, message: &str, user: &str) -> Self {
        Self::invocation(
            method::SEND_SIGNAL_TO_SESSION,
            vec![room.into(), message.into(), user.into()],
        )
    }
}

// =============================================================================
// INBOUND EVENTS
// =============================================================================

/// Typed view of the invocations the hub pushes to clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HubEvent {
    /// A peer sent a signal to the room.
    SignalReceived { user: String, message: String },
    /// A user joined the room.
    UserJoined { user: String },
    /// A user left the room.
    UserLeft { user: String },
}

impl HubEvent {
    /// Map an inbound invocation to an event.
    ///
    /// Returns `None` for targets the client does not subscribe to or when
    /// the arguments do not have the expected shape.
    #[must_use]
    pub fn from_invocation(target: &str, arguments: &[Value]) -> Option<Self> {
        match target {
            method::SEND_SIGNAL => {
                let [signal, user, ..] = arguments else {
                    return None;
                };
                let message = match signal {
                    Value::String(text) => unquote(text).to_owned(),
                    Value::Null => return None,
                    other => other.to_string(),
                };
                Some(Self::SignalReceived {
                    user: string_arg(user)?,
                    message,
                })
            }
            method::NEW_USER_ARRIVED => Some(Self::UserJoined {
                user: string_arg(arguments.first()?)?,
            }),
            method::USER_LEFT => Some(Self::UserLeft {
                user: string_arg(arguments.first()?)?,
            }),
            _ => None,
        }
    }
}

fn string_arg(value: &Value) -> Option<String> {
    value.as_str().map(|text| unquote(text).to_owned())
}

/// Some hub servers forward arguments that were already JSON-encoded, which
/// leaves a pair of literal quotes around the text. Only one wrapping pair is
/// removed; quotes inside the text or on one side only are kept.
fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(text)
}

// =============================================================================
// HANDSHAKE
// =============================================================================

/// First message sent by the client after the socket opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL.to_owned(),
            version: PROTOCOL_VERSION,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Encode a handshake request, separator included.
#[must_use]
pub fn encode_handshake(request: &HandshakeRequest) -> String {
    // Safety: a struct of a string and an integer always serializes.
    let mut out = serde_json::to_string(request).unwrap_or_default();
    out.push(RECORD_SEPARATOR);
    out
}

/// Decode the server's handshake response.
///
/// Returns the text following the first separator: servers may pack the
/// first hub messages into the same frame as the handshake reply.
///
/// # Errors
///
/// Returns [`CodecError::IncompleteHandshake`] when no separator is present,
/// [`CodecError::Json`] for malformed JSON, and [`CodecError::Handshake`]
/// when the server reported an error.
pub fn decode_handshake(text: &str) -> Result<&str, CodecError> {
    let Some((head, rest)) = text.split_once(RECORD_SEPARATOR) else {
        return Err(CodecError::IncompleteHandshake);
    };
    let response: HandshakeResponse = serde_json::from_str(head)?;
    if let Some(error) = response.error {
        return Err(CodecError::Handshake(error));
    }
    Ok(rest)
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a message as JSON followed by the record separator.
#[must_use]
pub fn encode_message(message: &HubMessage) -> String {
    let wire = message_to_wire(message);
    // Safety: the wire struct only holds strings, booleans and JSON values.
    let mut out = serde_json::to_string(&wire).unwrap_or_default();
    out.push(RECORD_SEPARATOR);
    out
}

/// Decode every message contained in a text frame.
///
/// Empty segments (including the one after the trailing separator) are
/// skipped.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON and
/// [`CodecError::MissingField`] when a known message type lacks a required
/// field.
pub fn decode_messages(text: &str) -> Result<Vec<HubMessage>, CodecError> {
    text.split(RECORD_SEPARATOR)
        .filter(|segment| !segment.trim().is_empty())
        .map(decode_message)
        .collect()
}

/// Decode every segment of a text frame independently.
///
/// Unlike [`decode_messages`], a malformed segment does not hide the valid
/// ones around it: each segment yields its own result, in frame order.
#[must_use]
pub fn decode_frame(text: &str) -> Vec<Result<HubMessage, CodecError>> {
    text.split(RECORD_SEPARATOR)
        .filter(|segment| !segment.trim().is_empty())
        .map(decode_message)
        .collect()
}

/// Decode a single JSON message (without separator).
///
/// # Errors
///
/// See [`decode_messages`].
pub fn decode_message(json: &str) -> Result<HubMessage, CodecError> {
    let wire: WireMessage = serde_json::from_str(json)?;
    wire_to_message(wire)
}

fn message_to_wire(message: &HubMessage) -> WireMessage {
    let mut wire = WireMessage::of_kind(match message {
        HubMessage::Invocation { .. } => MessageType::Invocation.as_u32(),
        HubMessage::StreamItem { .. } => MessageType::StreamItem.as_u32(),
        HubMessage::Completion { .. } => MessageType::Completion.as_u32(),
        HubMessage::Ping => MessageType::Ping.as_u32(),
        HubMessage::Close { .. } => MessageType::Close.as_u32(),
        HubMessage::Other(kind) => *kind,
    });

    match message {
        HubMessage::Invocation {
            invocation_id,
            target,
            arguments,
        } => {
            wire.invocation_id.clone_from(invocation_id);
            wire.target = Some(target.clone());
            wire.arguments = Some(arguments.clone());
        }
        HubMessage::StreamItem {
            invocation_id,
            item,
        } => {
            wire.invocation_id = Some(invocation_id.clone());
            wire.item = Some(item.clone());
        }
        HubMessage::Completion {
            invocation_id,
            result,
            error,
        } => {
            wire.invocation_id = Some(invocation_id.clone());
            wire.result.clone_from(result);
            wire.error.clone_from(error);
        }
        HubMessage::Close {
            error,
            allow_reconnect,
        } => {
            wire.error.clone_from(error);
            wire.allow_reconnect = allow_reconnect.then_some(true);
        }
        HubMessage::Ping | HubMessage::Other(_) => {}
    }

    wire
}

fn wire_to_message(wire: WireMessage) -> Result<HubMessage, CodecError> {
    let Some(kind) = MessageType::from_u32(wire.kind) else {
        return Ok(HubMessage::Other(wire.kind));
    };

    Ok(match kind {
        MessageType::Invocation => HubMessage::Invocation {
            invocation_id: wire.invocation_id,
            target: wire.target.ok_or(CodecError::MissingField("target"))?,
            arguments: wire.arguments.unwrap_or_default(),
        },
        MessageType::StreamItem => HubMessage::StreamItem {
            invocation_id: wire
                .invocation_id
                .ok_or(CodecError::MissingField("invocationId"))?,
            item: wire.item.unwrap_or(Value::Null),
        },
        MessageType::Completion => HubMessage::Completion {
            invocation_id: wire
                .invocation_id
                .ok_or(CodecError::MissingField("invocationId"))?,
            result: wire.result,
            error: wire.error,
        },
        MessageType::Ping => HubMessage::Ping,
        MessageType::Close => HubMessage::Close {
            error: wire.error,
            allow_reconnect: wire.allow_reconnect.unwrap_or(false),
        },
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(rename = "type")]
    kind: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allow_reconnect: Option<bool>,
}

impl WireMessage {
    fn of_kind(kind: u32) -> Self {
        Self {
            kind,
            invocation_id: None,
            target: None,
            arguments: None,
            item: None,
            result: None,
            error: None,
            allow_reconnect: None,
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
