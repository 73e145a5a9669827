//! Hub transport: negotiate, WebSocket upgrade, handshake, framing.
//!
//! DESIGN
//! ======
//! A connected hub is two tasks sharing a split WebSocket. The reader task
//! decodes inbound frames and forwards the recognised server calls as
//! [`ConnectionEvent`]s; the writer task drains an unbounded queue of
//! outbound [`HubMessage`]s and injects a `Ping` on the keep-alive interval.
//! Callers never touch the socket, so `send` is synchronous and non-blocking.
//!
//! LIFECYCLE
//! =========
//! 1. `POST {hub}/negotiate?negotiateVersion=1` (skippable) yields the
//!    connection id.
//! 2. The hub URL is rewritten to `ws`/`wss` with `id` and `access_token`.
//! 3. The JSON handshake is sent. Hub messages packed after the reply are
//!    kept. Steps 1 to 3 share one deadline, `connect_timeout`.
//! 4. Reader and writer run until the server closes or `close` is called.
//!    The reader always finishes with exactly one `Closed` event, after
//!    marking the connection closed and stopping the writer, so `send`
//!    fails from then on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hub::{HandshakeRequest, HubEvent, HubMessage, RECORD_SEPARATOR};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::ChatError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const MIN_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(100);
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);
const WEBSOCKETS_TRANSPORT: &str = "WebSockets";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How to reach the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubOptions {
    /// `http(s)://…/signalhub`. `ws(s)://` is accepted as-is.
    pub hub_url: String,
    /// Sent as bearer on negotiate and as `access_token` on the socket URL.
    pub access_token: Option<String>,
    pub skip_negotiation: bool,
    /// Deadline for negotiate, WebSocket upgrade and handshake together.
    pub connect_timeout: Duration,
    pub keep_alive_interval: Duration,
}

impl HubOptions {
    #[must_use]
    pub fn new(hub_url: impl Into<String>) -> Self {
        Self {
            hub_url: hub_url.into(),
            access_token: None,
            skip_negotiation: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}

/// What the reader task reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Hub(HubEvent),
    /// The connection is gone. `error` carries the server's close reason or
    /// the transport failure; `None` is a clean close.
    Closed { error: Option<String> },
}

// =============================================================================
// NEGOTIATE
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Negotiation {
    #[serde(default)]
    pub negotiate_version: u32,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub connection_token: Option<String>,
    #[serde(default)]
    pub available_transports: Vec<AvailableTransport>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransport {
    pub transport: String,
    #[serde(default)]
    pub transfer_formats: Vec<String>,
}

impl Negotiation {
    /// Value for the `id` query parameter of the socket URL.
    ///
    /// # Errors
    ///
    /// [`ChatError::Negotiate`] when the server reported an error, does not
    /// offer text WebSockets, or returned no connection id.
    pub fn connection_key(&self) -> Result<&str, ChatError> {
        if let Some(error) = &self.error {
            return Err(ChatError::Negotiate(error.clone()));
        }
        let offers_websockets = self.available_transports.is_empty()
            || self.available_transports.iter().any(|t| {
                t.transport == WEBSOCKETS_TRANSPORT
                    && (t.transfer_formats.is_empty()
                        || t.transfer_formats.iter().any(|f| f == "Text"))
            });
        if !offers_websockets {
            return Err(ChatError::Negotiate(
                "transport WebSockets indisponible".to_owned(),
            ));
        }

        let key = if self.negotiate_version >= 1 {
            self.connection_token.as_deref().or(self.connection_id.as_deref())
        } else {
            self.connection_id.as_deref()
        };
        key.ok_or_else(|| ChatError::Negotiate("identifiant de connexion absent".to_owned()))
    }
}

/// Ask the hub for a connection id.
///
/// # Errors
///
/// [`ChatError::Http`] on transport failure, [`ChatError::Negotiate`] on a
/// non-success status.
pub async fn negotiate(
    http: &reqwest::Client,
    options: &HubOptions,
) -> Result<Negotiation, ChatError> {
    let url = format!(
        "{}/negotiate?negotiateVersion=1",
        options.hub_url.trim_end_matches('/')
    );
    let mut request = http.post(&url);
    if let Some(token) = &options.access_token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ChatError::Negotiate(format!("HTTP {}", status.as_u16())));
    }
    Ok(response.json().await?)
}

/// Rewrite the hub URL for the WebSocket upgrade.
///
/// # Errors
///
/// [`ChatError::InvalidHubUrl`] for anything but `http(s)`/`ws(s)` URLs.
pub fn ws_url(
    hub_url: &str,
    connection_key: Option<&str>,
    access_token: Option<&str>,
) -> Result<String, ChatError> {
    let invalid = || ChatError::InvalidHubUrl(hub_url.to_owned());

    let base = if let Some(rest) = hub_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = hub_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if hub_url.starts_with("ws://") || hub_url.starts_with("wss://") {
        hub_url.to_owned()
    } else {
        return Err(invalid());
    };

    let mut url = reqwest::Url::parse(&base).map_err(|_| invalid())?;
    if connection_key.is_some() || access_token.is_some() {
        let mut pairs = url.query_pairs_mut();
        if let Some(id) = connection_key {
            pairs.append_pair("id", id);
        }
        if let Some(token) = access_token {
            pairs.append_pair("access_token", token);
        }
    }
    Ok(url.into())
}

// =============================================================================
// CONNECTION
// =============================================================================

/// A live hub connection.
pub struct HubConnection {
    outbound: mpsc::UnboundedSender<HubMessage>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl HubConnection {
    /// Negotiate, upgrade and handshake within `connect_timeout`.
    ///
    /// Returns the connection and the receiver of inbound events.
    ///
    /// # Errors
    ///
    /// Any failure before the handshake completes: bad URL, negotiate
    /// refusal, socket failure, handshake rejection, or
    /// [`ChatError::ConnectTimeout`] when the deadline passes.
    pub async fn connect(
        options: &HubOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), ChatError> {
        let (stream, pending) = tokio::time::timeout(options.connect_timeout, establish(options))
            .await
            .map_err(|_| ChatError::ConnectTimeout)??;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        for message in pending {
            if let Route::Close(error) = route(message, &events_tx) {
                let reason = error.unwrap_or_else(|| "fermée par le serveur".to_owned());
                return Err(ChatError::ConnectionLost(reason));
            }
        }

        let (sink, source) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (reader_done_tx, reader_done_rx) = oneshot::channel();
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_loop(
            source,
            events_tx,
            Arc::clone(&closed),
            reader_done_tx,
        ));
        let writer = tokio::spawn(write_loop(
            sink,
            outbound_rx,
            reader_done_rx,
            options.keep_alive_interval,
        ));

        info!(hub_url = %options.hub_url, "hub connected");
        let connection = Self {
            outbound,
            closed,
            reader,
            writer,
        };
        Ok((connection, events_rx))
    }

    /// Queue a message for the writer task.
    ///
    /// # Errors
    ///
    /// [`ChatError::NotConnected`] once the server closed the connection or
    /// the writer has stopped.
    pub fn send(&self, message: HubMessage) -> Result<(), ChatError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChatError::NotConnected);
        }
        self.outbound
            .send(message)
            .map_err(|_| ChatError::NotConnected)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    /// Flush queued messages, close the socket and stop both tasks.
    pub async fn close(self) {
        let Self {
            outbound,
            reader,
            mut writer,
            ..
        } = self;
        drop(outbound);
        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            warn!("hub writer did not finish, aborting");
            writer.abort();
        }
        reader.abort();
        debug!("hub connection closed");
    }
}

impl std::fmt::Debug for HubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnection")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

async fn establish(options: &HubOptions) -> Result<(WsStream, Vec<HubMessage>), ChatError> {
    let token = options.access_token.as_deref();
    let url = if options.skip_negotiation {
        ws_url(&options.hub_url, None, token)?
    } else {
        let negotiation = negotiate(&reqwest::Client::new(), options).await?;
        ws_url(&options.hub_url, Some(negotiation.connection_key()?), token)?
    };

    debug!(%url, "connecting to hub");
    let (mut stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let pending = handshake(&mut stream).await?;
    Ok((stream, pending))
}

async fn handshake(stream: &mut WsStream) -> Result<Vec<HubMessage>, ChatError> {
    let request = hub::encode_handshake(&HandshakeRequest::default());
    stream.send(Message::Text(request.into())).await?;

    let mut buffer = String::new();
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                buffer.push_str(text.as_str());
                if buffer.contains(RECORD_SEPARATOR) {
                    let rest = hub::decode_handshake(&buffer)?;
                    return Ok(valid_messages(rest));
                }
            }
            Message::Close(_) => return Err(ChatError::WsClosed),
            _ => {}
        }
    }
    Err(ChatError::WsClosed)
}

/// Decode a frame, logging and skipping malformed segments.
fn valid_messages(text: &str) -> Vec<HubMessage> {
    hub::decode_frame(text)
        .into_iter()
        .filter_map(|decoded| match decoded {
            Ok(message) => Some(message),
            Err(error) => {
                warn!(%error, "skipping undecodable hub message");
                None
            }
        })
        .collect()
}

enum Route {
    Continue,
    Close(Option<String>),
}

fn route(message: HubMessage, events: &mpsc::UnboundedSender<ConnectionEvent>) -> Route {
    match message {
        HubMessage::Invocation { target, arguments, .. } => {
            match HubEvent::from_invocation(&target, &arguments) {
                Some(event) => {
                    let _ = events.send(ConnectionEvent::Hub(event));
                }
                None => debug!(%target, "ignoring hub invocation"),
            }
            Route::Continue
        }
        HubMessage::Close { error, .. } => Route::Close(error),
        HubMessage::Ping => Route::Continue,
        other => {
            debug!(?other, "ignoring hub message");
            Route::Continue
        }
    }
}

async fn read_loop(
    mut source: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    closed: Arc<AtomicBool>,
    reader_done: oneshot::Sender<()>,
) {
    let mut close_error = None;

    'frames: while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                for message in valid_messages(text.as_str()) {
                    if let Route::Close(error) = route(message, &events) {
                        close_error = error;
                        break 'frames;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                close_error = Some(error.to_string());
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    let _ = reader_done.send(());
    info!(error = ?close_error, "hub connection ended");
    let _ = events.send(ConnectionEvent::Closed { error: close_error });
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<HubMessage>,
    mut reader_done: oneshot::Receiver<()>,
    keep_alive: Duration,
) {
    let mut ticker = tokio::time::interval(keep_alive.max(MIN_KEEP_ALIVE_INTERVAL));
    ticker.tick().await;

    loop {
        let message = tokio::select! {
            biased;
            queued = outbound.recv() => match queued {
                Some(message) => message,
                None => break,
            },
            _ = &mut reader_done => break,
            _ = ticker.tick() => HubMessage::Ping,
        };
        let frame = Message::Text(hub::encode_message(&message).into());
        if let Err(error) = sink.send(frame).await {
            warn!(%error, "hub send failed");
            return;
        }
    }

    if let Err(error) = sink.close().await {
        debug!(%error, "hub close frame not delivered");
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
