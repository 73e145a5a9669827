//! REST client for the call-session backend.
//!
//! Thin HTTP wrapper: every public method builds one request, attaches the
//! bearer token when the endpoint requires it, and maps the response through
//! [`error_for_status`]. Parsing of success bodies goes through `parse_body`
//! so malformed payloads surface as generic errors rather than network ones.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{SdkError, error_for_status};
use crate::types::{
    CreateSessionRequest, Credentials, IceServer, JoinSessionRequest, LoginResponse, Session, User,
};

const NO_BODY: Option<&()> = None;

/// Logs at `info` when the client was configured with `enable_logs`,
/// otherwise at `debug`.
macro_rules! sdk_event {
    ($client:expr, $($arg:tt)+) => {
        if $client.config.enable_logs {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

// =============================================================================
// CLIENT
// =============================================================================

/// Client for the backend's authentication, session and ICE endpoints.
pub struct SmartcClient {
    config: Config,
    http: reqwest::Client,
    token: Option<String>,
    current_username: Option<String>,
    current_session_id: Option<String>,
}

impl SmartcClient {
    /// Create a client with no credentials.
    ///
    /// # Errors
    ///
    /// Returns a generic error if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, SdkError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SdkError::generic(format!("client HTTP indisponible : {e}")))?;
        Ok(Self {
            config,
            http,
            token: None,
            current_username: None,
            current_session_id: None,
        })
    }

    /// Reuse a bearer token obtained earlier.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Resume tracking of a call started earlier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.current_session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Bearer token of the logged-in user.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Username as returned by the server on login.
    #[must_use]
    pub fn current_username(&self) -> Option<&str> {
        self.current_username.as_deref()
    }

    #[must_use]
    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Authenticate and keep the returned token.
    ///
    /// # Errors
    ///
    /// [`SdkError::Authentication`] on bad credentials, otherwise any error
    /// category produced by the request.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), SdkError> {
        let body = Credentials { username, password };
        let response: LoginResponse = self
            .request(Method::POST, "/api/auth/login", Some(&body), false)
            .await?;

        self.token = Some(response.token);
        self.current_username = Some(response.user.username);

        sdk_event!(self, username = ?self.current_username, "logged in");
        Ok(())
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Any error category produced by the request.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, SdkError> {
        let body = Credentials { username, password };
        self.request(Method::POST, "/api/auth/register", Some(&body), false)
            .await
    }

    /// Forget the token, username and current call.
    ///
    /// An active call is ended first; a failure to end it is logged and
    /// otherwise ignored.
    pub async fn logout(&mut self) {
        if self.current_session_id.is_some() {
            if let Err(error) = self.end_call().await {
                tracing::warn!(%error, "failed to end call during logout");
            }
        }

        self.token = None;
        self.current_username = None;
        self.current_session_id = None;

        sdk_event!(self, "logged out");
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Create a call and make it the current one.
    ///
    /// # Errors
    ///
    /// Any error category produced by the request.
    pub async fn start_call(&mut self, room_name: &str) -> Result<Session, SdkError> {
        let body = CreateSessionRequest { room_name };
        let session: Session = self
            .request(Method::POST, "/api/session", Some(&body), true)
            .await?;

        self.current_session_id = Some(session.session_id.clone());
        sdk_event!(self, session_id = %session.session_id, "call started");
        Ok(session)
    }

    /// Join an existing call and make it the current one.
    ///
    /// # Errors
    ///
    /// [`SdkError::SessionNotFound`] when the call does not exist, otherwise
    /// any error category produced by the request.
    pub async fn join_call(&mut self, session_id: &str) -> Result<Session, SdkError> {
        let body = JoinSessionRequest { session_id };
        let session: Session = self
            .request(Method::POST, "/api/session/join", Some(&body), true)
            .await?;

        self.current_session_id = Some(session.session_id.clone());
        sdk_event!(self, session_id = %session.session_id, "call joined");
        Ok(session)
    }

    /// End the current call.
    ///
    /// # Errors
    ///
    /// A generic error when no call is active; otherwise any error category
    /// produced by the request, in which case the call stays current.
    pub async fn end_call(&mut self) -> Result<(), SdkError> {
        let Some(session_id) = self.current_session_id.clone() else {
            return Err(SdkError::generic("Aucun appel en cours"));
        };

        let path = format!("/api/session/{session_id}");
        self.send(Method::DELETE, &path, NO_BODY, true).await?;

        self.current_session_id = None;
        sdk_event!(self, %session_id, "call ended");
        Ok(())
    }

    /// List active calls.
    ///
    /// # Errors
    ///
    /// Any error category produced by the request.
    pub async fn get_available_calls(&self) -> Result<Vec<Session>, SdkError> {
        self.request(Method::GET, "/api/session", NO_BODY, true)
            .await
    }

    /// Fetch STUN/TURN configuration.
    ///
    /// Never fails: any error yields a single public STUN server.
    pub async fn get_ice_servers(&self) -> Vec<IceServer> {
        match self
            .request::<Vec<IceServer>, ()>(Method::GET, "/api/webrtc/ice", NO_BODY, true)
            .await
        {
            Ok(servers) => servers,
            Err(error) => {
                tracing::warn!(%error, "ICE fetch failed, using public STUN fallback");
                vec![IceServer::fallback()]
            }
        }
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        require_auth: bool,
    ) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self.send(method, path, body, require_auth).await?;
        parse_body(&text)
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        require_auth: bool,
    ) -> Result<String, SdkError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path);
        sdk_event!(self, %method, %url, "request");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if require_auth {
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), %url, "request failed");
            return Err(error_for_status(status.as_u16(), &text));
        }

        Ok(text)
    }
}

impl std::fmt::Debug for SmartcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartcClient")
            .field("api_base_url", &self.config.api_base_url)
            .field("logged_in", &self.is_logged_in())
            .field("current_username", &self.current_username)
            .field("current_session_id", &self.current_session_id)
            .finish_non_exhaustive()
    }
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, SdkError> {
    serde_json::from_str(text).map_err(|e| SdkError::generic(format!("réponse illisible : {e}")))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
