//! Prompt input parsing for the terminal chat.

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Help,
    Room,
    Users,
    Clear,
    Message(String),
}

pub const HELP_TEXT: &str = "\
📋 Commandes disponibles:
  /quit, /exit, /q  - Quitter le chat
  /help, /h, /?     - Afficher cette aide
  /room             - Afficher la room actuelle
  /users            - Afficher votre nom d'utilisateur
  /clear, /cls      - Effacer l'écran
  Tout autre texte est envoyé à la room.
";

/// Classify a prompt line. Commands are matched case-insensitively after
/// trimming; anything unrecognised, including unknown `/` words, is a message.
#[must_use]
pub fn parse(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }

    match trimmed.to_lowercase().as_str() {
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/help" | "/h" | "/?" => Input::Help,
        "/room" => Input::Room,
        "/users" => Input::Users,
        "/clear" | "/cls" => Input::Clear,
        _ => Input::Message(trimmed.to_owned()),
    }
}

#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;
