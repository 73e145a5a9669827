//! Room-level chat client on top of [`HubConnection`].
//!
//! DESIGN
//! ======
//! State (room, username, connected flag) sits behind a `parking_lot`
//! `RwLock` shared with the dispatcher task, which turns connection events
//! into handler calls. Handlers are cloned out of their lock before being
//! invoked so user code may freely call back into the client.
//!
//! ERROR HANDLING
//! ==============
//! Connect failures and server-side closes with a reason are reported to
//! the error handler as well as returned (for `connect`). Outbound calls
//! are fire-and-forget: they only fail locally, when there is no connection
//! or no room.

use std::sync::Arc;

use hub::{HubEvent, HubMessage};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::connection::{ConnectionEvent, HubConnection, HubOptions};
use crate::error::ChatError;

type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ChatError) + Send + Sync>;
type SignalHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;
type UserHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default, Clone)]
struct Handlers {
    connected: Option<LifecycleHandler>,
    disconnected: Option<LifecycleHandler>,
    error: Option<ErrorHandler>,
    signal_received: Option<SignalHandler>,
    user_joined: Option<UserHandler>,
    user_left: Option<UserHandler>,
}

#[derive(Debug, Default)]
struct ChatState {
    room_name: Option<String>,
    username: Option<String>,
    is_connected: bool,
}

struct Link {
    connection: HubConnection,
    dispatcher: JoinHandle<()>,
}

impl Link {
    async fn shutdown(self) {
        self.dispatcher.abort();
        self.connection.close().await;
    }
}

/// Chat client bound to one hub.
pub struct ChatClient {
    options: HubOptions,
    state: Arc<RwLock<ChatState>>,
    handlers: Arc<RwLock<Handlers>>,
    link: Mutex<Option<Link>>,
}

impl ChatClient {
    #[must_use]
    pub fn new(options: HubOptions) -> Self {
        Self {
            options,
            state: Arc::default(),
            handlers: Arc::default(),
            link: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn options(&self) -> &HubOptions {
        &self.options
    }

    // =========================================================================
    // HANDLERS
    // =========================================================================

    pub fn on_connected(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.handlers.write().connected = Some(Arc::new(handler));
    }

    pub fn on_disconnected(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.handlers.write().disconnected = Some(Arc::new(handler));
    }

    pub fn on_error(&self, handler: impl Fn(&ChatError) + Send + Sync + 'static) {
        self.handlers.write().error = Some(Arc::new(handler));
    }

    /// Called with `(user, message)` for every signal pushed to the room,
    /// including this client's own.
    pub fn on_signal_received(&self, handler: impl Fn(&str, &str) + Send + Sync + 'static) {
        self.handlers.write().signal_received = Some(Arc::new(handler));
    }

    pub fn on_user_joined(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.handlers.write().user_joined = Some(Arc::new(handler));
    }

    pub fn on_user_left(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.handlers.write().user_left = Some(Arc::new(handler));
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Connect to the hub, replacing any previous connection.
    ///
    /// # Errors
    ///
    /// Any [`HubConnection::connect`] failure; the error handler sees it too.
    pub async fn connect(&self) -> Result<(), ChatError> {
        let previous = self.link.lock().take();
        if let Some(previous) = previous {
            previous.shutdown().await;
        }

        let (connection, events) = match HubConnection::connect(&self.options).await {
            Ok(pair) => pair,
            Err(error) => {
                self.state.write().is_connected = false;
                emit_error(&self.handlers, &error);
                return Err(error);
            }
        };

        self.state.write().is_connected = true;
        let dispatcher = tokio::spawn(dispatch(
            events,
            Arc::clone(&self.state),
            Arc::clone(&self.handlers),
        ));
        *self.link.lock() = Some(Link { connection, dispatcher });

        info!(hub_url = %self.options.hub_url, "chat connected");
        let handler = self.handlers.read().connected.clone();
        if let Some(handler) = handler {
            handler();
        }
        Ok(())
    }

    /// Leave the current room if any, close the connection and notify the
    /// disconnect handler if a connection was live. Room and username are
    /// kept.
    pub async fn disconnect(&self) {
        if let Err(error) = self.leave_room() {
            debug!(%error, "skipping leave on disconnect");
        }

        let link = self.link.lock().take();
        if let Some(link) = link {
            link.shutdown().await;
        }
        let was_connected = std::mem::replace(&mut self.state.write().is_connected, false);
        if !was_connected {
            return;
        }

        info!("chat disconnected");
        let handler = self.handlers.read().disconnected.clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    // =========================================================================
    // ROOM
    // =========================================================================

    /// Record room and username, then invoke `JoinSession`.
    ///
    /// # Errors
    ///
    /// [`ChatError::NotConnected`] without a live connection. Room and
    /// username are recorded either way.
    pub fn join_room(&self, room_name: &str, username: &str) -> Result<(), ChatError> {
        {
            let mut state = self.state.write();
            state.room_name = Some(room_name.to_owned());
            state.username = Some(username.to_owned());
        }
        self.invoke(HubMessage::join_session(room_name, username))
    }

    /// Invoke `LeaveSession` for the current room. A no-op without one.
    ///
    /// # Errors
    ///
    /// [`ChatError::NotConnected`] without a live connection.
    pub fn leave_room(&self) -> Result<(), ChatError> {
        let Some((room, user)) = self.membership() else {
            return Ok(());
        };
        self.invoke(HubMessage::leave_session(&room, &user))
    }

    /// Invoke `SendSignalToSession` with the current room and username.
    ///
    /// # Errors
    ///
    /// [`ChatError::NotInRoom`] before `join_room`, [`ChatError::NotConnected`]
    /// without a live connection.
    pub fn send_message(&self, message: &str) -> Result<(), ChatError> {
        let (room, user) = self.membership().ok_or(ChatError::NotInRoom)?;
        self.invoke(HubMessage::send_signal_to_session(&room, message, &user))
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.read().is_connected
    }

    #[must_use]
    pub fn room_name(&self) -> Option<String> {
        self.state.read().room_name.clone()
    }

    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.state.read().username.clone()
    }

    fn membership(&self) -> Option<(String, String)> {
        let state = self.state.read();
        match (&state.room_name, &state.username) {
            (Some(room), Some(user)) if !room.is_empty() && !user.is_empty() => {
                Some((room.clone(), user.clone()))
            }
            _ => None,
        }
    }

    fn invoke(&self, message: HubMessage) -> Result<(), ChatError> {
        let link = self.link.lock();
        let link = link.as_ref().ok_or(ChatError::NotConnected)?;
        link.connection.send(message)
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("hub_url", &self.options.hub_url)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

fn emit_error(handlers: &RwLock<Handlers>, error: &ChatError) {
    let handler = handlers.read().error.clone();
    if let Some(handler) = handler {
        handler(error);
    }
}

async fn dispatch(
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    state: Arc<RwLock<ChatState>>,
    handlers: Arc<RwLock<Handlers>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Hub(HubEvent::SignalReceived { user, message }) => {
                let handler = handlers.read().signal_received.clone();
                if let Some(handler) = handler {
                    handler(&user, &message);
                }
            }
            ConnectionEvent::Hub(HubEvent::UserJoined { user }) => {
                let handler = handlers.read().user_joined.clone();
                if let Some(handler) = handler {
                    handler(&user);
                }
            }
            ConnectionEvent::Hub(HubEvent::UserLeft { user }) => {
                let handler = handlers.read().user_left.clone();
                if let Some(handler) = handler {
                    handler(&user);
                }
            }
            ConnectionEvent::Closed { error } => {
                let was_connected = std::mem::replace(&mut state.write().is_connected, false);
                if !was_connected {
                    break;
                }
                if let Some(reason) = error {
                    emit_error(&handlers, &ChatError::ConnectionLost(reason));
                }
                let handler = handlers.read().disconnected.clone();
                if let Some(handler) = handler {
                    handler();
                }
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
