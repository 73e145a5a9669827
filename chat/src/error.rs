/// Errors raised by the hub transport and the chat client.
///
/// Messages are French: they are printed as-is by the terminal chat.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("URL du hub invalide : {0}")]
    InvalidHubUrl(String),
    #[error("négociation refusée : {0}")]
    Negotiate(String),
    #[error("requête HTTP échouée : {0}")]
    Http(#[from] reqwest::Error),
    #[error("connexion WebSocket échouée : {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("connexion WebSocket fermée")]
    WsClosed,
    #[error("le hub n'a pas répondu à temps")]
    ConnectTimeout,
    #[error("protocole du hub : {0}")]
    Codec(#[from] hub::CodecError),
    #[error("non connecté au hub")]
    NotConnected,
    #[error("pas dans une room")]
    NotInRoom,
    #[error("connexion perdue : {0}")]
    ConnectionLost(String),
    #[error(transparent)]
    Sdk(#[from] sdk::SdkError),
    #[error("lecture du terminal impossible : {0}")]
    Input(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WsConnect(Box::new(err))
    }
}
