//! `smartc-chat`: terminal chat room over the signaling hub.
//!
//! Stdin is read on a dedicated thread and fed to the async loop through a
//! channel, so Ctrl+C can end the session while a read is pending.

use std::io::{BufRead, Write};

use chat::commands::{self, HELP_TEXT, Input};
use chat::{ChatClient, ChatError, HubOptions};
use clap::Parser;
use sdk::{Config, SmartcClient};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "📝 Vous: ";

#[derive(Parser, Debug)]
#[command(name = "smartc-chat", about = "Chat en temps réel via le hub de signalisation SmaRTC")]
struct Cli {
    /// Hub URL (`http(s)://host/signalhub`).
    #[arg(long, env = "SMARTC_HUB_URL", default_value = "http://localhost:5001/signalhub")]
    hub_url: String,

    #[arg(long, env = "SMARTC_ROOM", default_value = "rust-chat-room")]
    room: String,

    /// Prompted for when absent.
    #[arg(long, env = "SMARTC_USERNAME")]
    username: Option<String>,

    /// Log in through the REST API first and use the token on the hub.
    #[arg(long, env = "SMARTC_PASSWORD")]
    password: Option<String>,

    /// REST API used for `--password` login. Defaults to `SMARTC_API_URL`.
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token to present to the hub.
    #[arg(long, env = "SMARTC_TOKEN")]
    token: Option<String>,

    /// Connect the WebSocket directly without `POST /negotiate`.
    #[arg(long)]
    skip_negotiation: bool,
}

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    init_tracing();
    let cli = Cli::parse();

    print_banner();
    let mut lines = spawn_stdin_reader();

    let username = match cli.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => {
            prompt_inline("👤 Entrez votre nom d'utilisateur: ");
            let typed = match lines.recv().await {
                Some(line) => line?,
                None => String::new(),
            };
            let typed = typed.trim();
            if typed.is_empty() {
                format!("RustUser_{}", std::process::id() % 1000)
            } else {
                typed.to_owned()
            }
        }
    };

    let (username, token) = match &cli.password {
        Some(password) => login(&cli, &username, password).await?,
        None => (username, cli.token.clone()),
    };

    let client = ChatClient::new(HubOptions {
        access_token: token,
        skip_negotiation: cli.skip_negotiation,
        ..HubOptions::new(cli.hub_url.clone())
    });
    install_handlers(&client, &username);

    println!("\n🔄 Connexion à {}...", cli.hub_url);
    if let Err(error) = client.connect().await {
        println!("💡 Assurez-vous que le serveur Docker est démarré (docker-compose up -d)");
        return Err(error);
    }

    println!("🚪 Rejoindre la room '{}'...", cli.room);
    if let Err(error) = client.join_room(&cli.room, &username) {
        println!("❌ Impossible de rejoindre la room: {error}");
        client.disconnect().await;
        return Err(error);
    }
    println!("✅ Connecté en tant que '{username}' dans la room '{}'", cli.room);
    print_help();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    prompt_inline(PROMPT);
    loop {
        tokio::select! {
            line = lines.recv() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(error)) => {
                        tracing::warn!(%error, "stdin read failed");
                        break;
                    }
                    None => break,
                };
                match commands::parse(&line) {
                    Input::Empty => {}
                    Input::Quit => {
                        println!("👋 Au revoir!");
                        break;
                    }
                    Input::Help => print_help(),
                    Input::Room => {
                        println!("🚪 Room actuelle: {}", client.room_name().unwrap_or_default());
                    }
                    Input::Users => {
                        println!("👤 Vous êtes: {}", client.username().unwrap_or_default());
                    }
                    Input::Clear => {
                        print!("\x1B[2J\x1B[1;1H");
                        print_banner();
                    }
                    Input::Message(text) => {
                        if let Err(error) = client.send_message(&text) {
                            println!("❌ Erreur d'envoi: {error}");
                        }
                    }
                }
                prompt_inline(PROMPT);
            }
            _ = &mut ctrl_c => {
                println!("\n\n👋 Déconnexion...");
                break;
            }
        }
    }

    client.disconnect().await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Log in through the REST API. Returns the server-side username and token.
async fn login(
    cli: &Cli,
    username: &str,
    password: &str,
) -> Result<(String, Option<String>), ChatError> {
    let mut config = Config::from_env();
    if let Some(api_url) = &cli.api_url {
        config.api_base_url = api_url.trim_end_matches('/').to_owned();
    }

    println!("🔐 Connexion à l'API {}...", config.api_base_url);
    let mut api = SmartcClient::new(config)?;
    api.login(username, password).await?;

    let name = api.current_username().unwrap_or(username).to_owned();
    Ok((name, api.token().map(str::to_owned)))
}

fn install_handlers(client: &ChatClient, username: &str) {
    client.on_connected(|| println!("✅ Connecté au serveur SignalR!"));
    client.on_disconnected(|| println!("🔌 Déconnecté du serveur"));
    client.on_error(|error| println!("❌ Erreur: {error}"));

    let me = username.to_owned();
    client.on_signal_received(move |user, message| {
        if user != me {
            println!("\n💬 {user}: {message}");
            prompt_inline(PROMPT);
        }
    });

    let me = username.to_owned();
    client.on_user_joined(move |user| {
        if user != me {
            println!("\n👋 {user} a rejoint le chat");
            prompt_inline(PROMPT);
        }
    });

    client.on_user_left(|user| {
        println!("\n👋 {user} a quitté le chat");
        prompt_inline(PROMPT);
    });
}

/// Forward stdin lines to the async loop. The thread ends with the process.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn prompt_inline(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

fn print_help() {
    println!();
    print!("{HELP_TEXT}");
    println!();
}

fn print_banner() {
    println!(
        r"
╔═══════════════════════════════════════════════════╗
║                                                   ║
║                 S m a R T C   C h a t             ║
║                                                   ║
║           🦀 Rust Chat - DeLTa-X Tunisia 🇹🇳        ║
║                                                   ║
╚═══════════════════════════════════════════════════╝"
    );
}
