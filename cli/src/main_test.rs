use httpmock::{Method, MockServer};

use super::*;

fn cli_for(server: &MockServer, token: Option<&str>, command: Command) -> Cli {
    Cli {
        api_url: server.base_url(),
        token: token.map(str::to_owned),
        timeout_secs: Some(5),
        verbose: false,
        command,
    }
}

fn session_json(id: &str, room: &str) -> Value {
    json!({
        "sessionId": id,
        "roomName": room,
        "hostUserId": "u-1",
        "participants": ["u-1"],
        "createdAt": "2026-01-05T10:00:00Z",
        "isActive": true
    })
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[test]
fn parses_start_with_global_flags() {
    let cli = Cli::try_parse_from([
        "smartc",
        "--api-url",
        "http://api.test",
        "--token",
        "jwt",
        "start",
        "Réunion Backend",
    ])
    .expect("valid arguments");

    assert_eq!(cli.api_url, "http://api.test");
    assert_eq!(cli.token.as_deref(), Some("jwt"));
    assert!(matches!(
        cli.command,
        Command::Start { ref room_name } if room_name == "Réunion Backend"
    ));
}

#[test]
fn quickstart_defaults_follow_walkthrough() {
    let cli = Cli::try_parse_from(["smartc", "quickstart"]).expect("valid arguments");
    let Command::Quickstart(args) = cli.command else {
        panic!("expected quickstart");
    };
    assert_eq!(args.username, "alice");
    assert_eq!(args.room, "Réunion Backend");
    assert_eq!(args.hold_secs, 3);
}

#[test]
fn end_requires_session_id() {
    assert!(Cli::try_parse_from(["smartc", "end"]).is_err());
}

#[test]
fn config_trims_trailing_slash_and_applies_timeout() {
    let cli = Cli {
        api_url: "http://api.test/".to_owned(),
        token: None,
        timeout_secs: Some(7),
        verbose: true,
        command: Command::List,
    };
    let base = Config {
        timeout: Duration::from_secs(42),
        ..Config::default()
    };
    let config = client_config(&cli, base);
    assert_eq!(config.api_base_url, "http://api.test");
    assert_eq!(config.timeout, Duration::from_secs(7));
    assert!(config.enable_logs);
}

#[test]
fn config_without_timeout_flag_keeps_environment_timeout() {
    let cli = Cli::try_parse_from(["smartc", "--api-url", "http://api.test", "list"])
        .expect("valid arguments");
    assert_eq!(cli.timeout_secs, None);

    let base = Config {
        timeout: Duration::from_secs(42),
        enable_logs: true,
        ..Config::default()
    };
    let config = client_config(&cli, base);
    assert_eq!(config.timeout, Duration::from_secs(42));
    assert!(config.enable_logs);
}

// =============================================================================
// COMMANDS
// =============================================================================

#[tokio::test]
async fn login_prints_token_and_server_username() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/api/auth/login");
            then.status(200).json_body(json!({
                "token": "jwt-9",
                "user": { "id": "u-1", "username": "Alice" }
            }));
        })
        .await;

    let command = Command::Login(CredentialArgs {
        username: "alice".to_owned(),
        password: "pw".to_owned(),
    });
    let out = run(cli_for(&server, None, command)).await.expect("login");

    assert_eq!(out, json!({ "token": "jwt-9", "username": "Alice" }));
}

#[tokio::test]
async fn authenticated_commands_require_token() {
    let server = MockServer::start_async().await;
    let err = run(cli_for(&server, None, Command::List)).await.expect_err("no token");
    assert!(matches!(err, CliError::MissingToken));
}

#[tokio::test]
async fn end_deletes_the_given_session() {
    let server = MockServer::start_async().await;
    let delete = server
        .mock_async(|when, then| {
            when.method(Method::DELETE)
                .path("/api/session/s-4")
                .header("authorization", "Bearer jwt");
            then.status(204);
        })
        .await;

    let command = Command::End { session_id: "s-4".to_owned() };
    let out = run(cli_for(&server, Some("jwt"), command)).await.expect("end");

    delete.assert_async().await;
    assert_eq!(out["ended"], json!(true));
}

#[tokio::test]
async fn sdk_errors_pass_through() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/api/session/join");
            then.status(404);
        })
        .await;

    let command = Command::Join { session_id: "nope".to_owned() };
    let err = run(cli_for(&server, Some("jwt"), command)).await.expect_err("missing call");

    assert!(matches!(err, CliError::Sdk(SdkError::SessionNotFound)));
    assert_eq!(err.to_string(), "Cet appel n'existe pas");
}

#[tokio::test]
async fn ice_without_token_still_prints_fallback() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path("/api/webrtc/ice");
            then.status(401);
        })
        .await;

    let out = run(cli_for(&server, None, Command::Ice)).await.expect("ice");
    assert_eq!(out, json!([{ "urls": [sdk::FALLBACK_STUN_URL] }]));
}

#[tokio::test]
async fn quickstart_runs_full_walkthrough() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/api/auth/login");
            then.status(200).json_body(json!({
                "token": "jwt-q",
                "user": { "id": "u-1", "username": "alice" }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/api/session");
            then.status(200).json_body(session_json("s-q", "Réunion Backend"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path("/api/session");
            then.status(200).json_body(json!([session_json("s-q", "Réunion Backend")]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path("/api/webrtc/ice");
            then.status(200).json_body(json!([{ "urls": ["stun:a"] }, { "urls": ["turn:b"] }]));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(Method::DELETE).path("/api/session/s-q");
            then.status(204);
        })
        .await;

    let args = QuickstartArgs {
        username: "alice".to_owned(),
        password: "password123".to_owned(),
        room: "Réunion Backend".to_owned(),
        hold_secs: 0,
    };
    let config = client_config(&cli_for(&server, None, Command::List), Config::default());
    let client = SmartcClient::new(config).expect("client");
    let mut progress = Vec::new();
    let out = quickstart(client, args, &mut progress).await.expect("quickstart");

    assert_eq!(delete.hits_async().await, 1);
    assert_eq!(
        out,
        json!({ "username": "alice", "sessionId": "s-q", "activeCalls": 1, "iceServers": 2 })
    );
    let progress = String::from_utf8(progress).expect("utf-8 progress");
    assert!(progress.starts_with("🔐 Connexion..."), "{progress}");
    assert!(progress.contains("✅ Appel créé : s-q (Réunion Backend)"), "{progress}");
    assert!(progress.contains("   - turn:b"), "{progress}");
}

#[tokio::test]
async fn quickstart_failure_after_start_still_ends_call() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/api/auth/login");
            then.status(200).json_body(json!({
                "token": "jwt-q",
                "user": { "id": "u-1", "username": "alice" }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/api/session");
            then.status(200).json_body(session_json("s-q", "r"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path("/api/session");
            then.status(500).body("down");
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(Method::DELETE).path("/api/session/s-q");
            then.status(204);
        })
        .await;

    let args = QuickstartArgs {
        username: "alice".to_owned(),
        password: "pw".to_owned(),
        room: "r".to_owned(),
        hold_secs: 0,
    };
    let err = run(cli_for(&server, None, Command::Quickstart(args)))
        .await
        .expect_err("list fails");

    assert!(matches!(err, CliError::Sdk(ref e) if e.status() == Some(500)));
    assert_eq!(delete.hits_async().await, 1);
}
