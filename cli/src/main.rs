use std::io::Write;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use sdk::{Config, SdkError, SmartcClient};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("jeton manquant ; passez --token ou définissez SMARTC_TOKEN")]
    MissingToken,
    #[error(transparent)]
    Sdk(#[from] SdkError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("écriture impossible : {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "smartc", about = "SmaRTC call-session API CLI")]
struct Cli {
    #[arg(long, env = "SMARTC_API_URL", default_value = sdk::DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Bearer token printed by `login`.
    #[arg(long, env = "SMARTC_TOKEN")]
    token: Option<String>,

    /// Request timeout; falls back to `SMARTC_TIMEOUT_SECS`, then 10.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log requests at info level on stderr.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate and print the token.
    Login(CredentialArgs),
    /// Create an account.
    Register(CredentialArgs),
    /// Create a call.
    Start { room_name: String },
    /// Join an existing call.
    Join { session_id: String },
    /// End a call.
    End { session_id: String },
    /// List active calls.
    List,
    /// Print STUN/TURN servers.
    Ice,
    /// Log in, hold a call for a few seconds, end it and log out.
    Quickstart(QuickstartArgs),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    username: String,

    #[arg(long, env = "SMARTC_PASSWORD")]
    password: String,
}

#[derive(Args, Debug)]
struct QuickstartArgs {
    #[arg(long, default_value = "alice")]
    username: String,

    #[arg(long, default_value = "password123")]
    password: String,

    #[arg(long, default_value = "Réunion Backend")]
    room: String,

    #[arg(long, default_value_t = 3)]
    hold_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = run(cli).await?;
    print_json(&json)
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Flags override `base`, which normally comes from the environment.
fn client_config(cli: &Cli, base: Config) -> Config {
    Config {
        api_base_url: cli.api_url.trim_end_matches('/').to_owned(),
        timeout: cli.timeout_secs.map_or(base.timeout, Duration::from_secs),
        enable_logs: cli.verbose || base.enable_logs,
        ..base
    }
}

async fn run(cli: Cli) -> Result<Value, CliError> {
    let mut client = SmartcClient::new(client_config(&cli, Config::from_env()))?;
    if let Some(token) = cli.token {
        client = client.with_token(token);
    }

    match cli.command {
        Command::Login(args) => {
            client.login(&args.username, &args.password).await?;
            Ok(json!({
                "token": client.token(),
                "username": client.current_username(),
            }))
        }
        Command::Register(args) => {
            let user = client.register(&args.username, &args.password).await?;
            Ok(serde_json::to_value(user)?)
        }
        Command::Start { room_name } => {
            require_token(&client)?;
            let session = client.start_call(&room_name).await?;
            Ok(serde_json::to_value(session)?)
        }
        Command::Join { session_id } => {
            require_token(&client)?;
            let session = client.join_call(&session_id).await?;
            Ok(serde_json::to_value(session)?)
        }
        Command::End { session_id } => {
            require_token(&client)?;
            let mut client = client.with_session_id(session_id.clone());
            client.end_call().await?;
            Ok(json!({ "sessionId": session_id, "ended": true }))
        }
        Command::List => {
            require_token(&client)?;
            let sessions = client.get_available_calls().await?;
            Ok(serde_json::to_value(sessions)?)
        }
        Command::Ice => Ok(serde_json::to_value(client.get_ice_servers().await)?),
        Command::Quickstart(args) => quickstart(client, args, &mut std::io::stderr()).await,
    }
}

fn require_token(client: &SmartcClient) -> Result<(), CliError> {
    if client.is_logged_in() {
        Ok(())
    } else {
        Err(CliError::MissingToken)
    }
}

// =============================================================================
// QUICKSTART
// =============================================================================

/// Progress lines go to `progress` so stdout carries only the JSON result.
async fn quickstart(
    mut client: SmartcClient,
    args: QuickstartArgs,
    progress: &mut impl Write,
) -> Result<Value, CliError> {
    writeln!(progress, "🔐 Connexion...")?;
    client.login(&args.username, &args.password).await?;
    let username = client.current_username().unwrap_or(&args.username).to_owned();
    writeln!(progress, "✅ Connecté en tant que : {username}")?;

    // Logout ends the call if any step after `start` failed.
    let outcome = hold_call(&mut client, &args, progress).await;
    client.logout().await;
    writeln!(progress, "👋 Session fermée")?;

    let (session_id, active_calls, ice_servers) = outcome?;
    Ok(json!({
        "username": username,
        "sessionId": session_id,
        "activeCalls": active_calls,
        "iceServers": ice_servers,
    }))
}

async fn hold_call(
    client: &mut SmartcClient,
    args: &QuickstartArgs,
    progress: &mut impl Write,
) -> Result<(String, usize, usize), CliError> {
    writeln!(progress, "📞 Création d'un appel...")?;
    let session = client.start_call(&args.room).await?;
    writeln!(progress, "✅ Appel créé : {} ({})", session.session_id, session.room_name)?;

    writeln!(progress, "📋 Appels en cours...")?;
    let calls = client.get_available_calls().await?;
    writeln!(progress, "✅ {} appel(s) actif(s)", calls.len())?;
    for call in &calls {
        writeln!(progress, "   - {} ({} participant(s))", call.room_name, call.participants.len())?;
    }

    writeln!(progress, "🧊 Serveurs ICE...")?;
    let ice_servers = client.get_ice_servers().await;
    for server in &ice_servers {
        writeln!(progress, "   - {}", server.urls.join(", "))?;
    }

    writeln!(progress, "⏳ Appel en cours ({}s)...", args.hold_secs)?;
    tokio::time::sleep(Duration::from_secs(args.hold_secs)).await;

    writeln!(progress, "🔴 Fin de l'appel...")?;
    client.end_call().await?;
    writeln!(progress, "✅ Appel terminé")?;

    Ok((session.session_id, calls.len(), ice_servers.len()))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
