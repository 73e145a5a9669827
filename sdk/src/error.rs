//! SDK error type and HTTP status mapping.
//!
//! ERROR HANDLING
//! ==============
//! Every failure lands in one of four categories. Messages are French, the
//! language the platform's end users see.

/// Coarse category of an [`SdkError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    SessionNotFound,
    Network,
    Generic,
}

/// Errors returned by [`crate::SmartcClient`].
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// The backend answered 401.
    #[error("Identifiants incorrects")]
    Authentication,

    /// The backend answered 404.
    #[error("Cet appel n'existe pas")]
    SessionNotFound,

    /// The request never produced an HTTP response.
    #[error("Problème de connexion : {0}")]
    Network(String),

    /// Any other failure. `status` is set when the backend answered.
    #[error("Erreur : {message}")]
    Generic { status: Option<u16>, message: String },
}

impl SdkError {
    pub(crate) fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            status: None,
            message: message.into(),
        }
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication => ErrorKind::Authentication,
            Self::SessionNotFound => ErrorKind::SessionNotFound,
            Self::Network(_) => ErrorKind::Network,
            Self::Generic { .. } => ErrorKind::Generic,
        }
    }

    /// HTTP status that caused this error, if the backend answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication => Some(401),
            Self::SessionNotFound => Some(404),
            Self::Network(_) => None,
            Self::Generic { status, .. } => *status,
        }
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Map a non-success HTTP status and its body to an error.
pub(crate) fn error_for_status(status: u16, body: &str) -> SdkError {
    match status {
        401 => SdkError::Authentication,
        404 => SdkError::SessionNotFound,
        _ => SdkError::Generic {
            status: Some(status),
            message: format!("HTTP {status} : {body}"),
        },
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
