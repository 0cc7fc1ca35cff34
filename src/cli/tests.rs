use super::*;
use crate::api::Chat;
use crate::core::chat_stream::StreamError;
use crate::core::message::TranscriptRole;
use crate::utils::test_utils::{
    session_with_token, spawn_mock_server, test_http_client, MockResponse,
};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    /// A context pointed at `base_url` with a transcript log in `log_dir`.
    pub(super) fn test_context(base_url: String, token: Option<&str>, log_dir: &TempDir) -> CliContext {
        let log_path = log_dir.path().join("chat.log");
        CliContext {
            config: Config::default(),
            session: session_with_token(token),
            client: ApiClient::with_client(test_http_client(), base_url),
            logging: LoggingState::new(Some(log_path.to_string_lossy().into_owned()))
                .expect("log file should be writable"),
            store: ConversationStore::new(),
            stream_timeout: Some(Duration::from_secs(5)),
            state_path: None,
        }
    }

    pub(super) fn read_log(log_dir: &TempDir) -> String {
        std::fs::read_to_string(log_dir.path().join("chat.log")).expect("read log")
    }
}

use test_helpers::{parse_args, read_log, test_context};

#[test]
fn test_simple_subcommands_parse() {
    assert!(matches!(parse_args(&["streamchat", "chats"]).command, Commands::Chats));
    assert!(matches!(parse_args(&["streamchat", "new"]).command, Commands::New));
    assert!(matches!(parse_args(&["streamchat", "auth"]).command, Commands::Auth));
    assert!(matches!(parse_args(&["streamchat", "deauth"]).command, Commands::Deauth));

    match parse_args(&["streamchat", "history", "c-1"]).command {
        Commands::History { chat_id } => assert_eq!(chat_id, "c-1"),
        _ => panic!("expected history subcommand"),
    }
}

#[test]
fn test_say_collects_prompt_words() {
    let argv = ["streamchat", "say", "c-9", "hello", "--there", "world"];
    match parse_args(&argv).command {
        Commands::Say { chat_id, prompt } => {
            assert_eq!(chat_id, "c-9");
            assert_eq!(prompt.join(" "), "hello --there world");
        }
        _ => panic!("expected say subcommand for argv={argv:?}"),
    }

    assert!(Args::try_parse_from(["streamchat", "say", "c-9"]).is_err());
}

#[test]
fn test_rename_collects_title_words() {
    match parse_args(&["streamchat", "rename", "c-2", "Trip", "plans"]).command {
        Commands::Rename { chat_id, title } => {
            assert_eq!(chat_id, "c-2");
            assert_eq!(title, vec!["Trip", "plans"]);
        }
        _ => panic!("expected rename subcommand"),
    }
}

#[test]
fn test_set_and_unset_parse() {
    match parse_args(&["streamchat", "set"]).command {
        Commands::Set { key, value } => {
            assert_eq!(key, None);
            assert!(value.is_empty());
        }
        _ => panic!("expected set subcommand"),
    }

    match parse_args(&["streamchat", "set", "base-url", "http://localhost:9000/api/v1"]).command {
        Commands::Set { key, value } => {
            assert_eq!(key.as_deref(), Some("base-url"));
            assert_eq!(value, vec!["http://localhost:9000/api/v1"]);
        }
        _ => panic!("expected set subcommand"),
    }

    match parse_args(&["streamchat", "unset", "stream-timeout"]).command {
        Commands::Unset { key } => assert_eq!(key, "stream-timeout"),
        _ => panic!("expected unset subcommand"),
    }
}

#[test]
fn test_global_flags_parse_after_subcommand() {
    let argv = [
        "streamchat",
        "chats",
        "--token",
        "abc",
        "--base-url",
        "http://example.com/api/v1",
        "--timeout",
        "30",
        "-l",
        "out.log",
    ];
    let args = parse_args(&argv);
    assert!(matches!(args.command, Commands::Chats));
    assert_eq!(args.token.as_deref(), Some("abc"));
    assert_eq!(args.base_url.as_deref(), Some("http://example.com/api/v1"));
    assert_eq!(args.timeout, Some(30));
    assert_eq!(args.log.as_deref(), Some("out.log"));

    let args = parse_args(&["streamchat", "new"]);
    assert_eq!(args.token, None);
    assert_eq!(args.timeout, None);
}

#[test]
fn test_missing_subcommand_is_rejected() {
    assert!(Args::try_parse_from(["streamchat"]).is_err());
    assert!(Args::try_parse_from(["streamchat", "chats", "--timeout", "soon"]).is_err());
}

#[test]
fn test_format_timestamp_variants() {
    assert_eq!(
        chat_list::format_timestamp("2024-05-01T12:30:45Z"),
        "2024-05-01 12:30"
    );
    assert_eq!(
        chat_list::format_timestamp("2024-05-01T12:30:45.123456"),
        "2024-05-01 12:30"
    );
    assert_eq!(
        chat_list::format_timestamp("2024-05-01 08:05:00"),
        "2024-05-01 08:05"
    );
    assert_eq!(chat_list::format_timestamp("yesterday"), "yesterday");
}

#[test]
fn test_format_chat_line_prefers_updated_time() {
    let chat = Chat {
        title: "Groceries".to_string(),
        created_at: Some("2024-01-01T00:00:00Z".to_string()),
        updated_at: Some("2024-02-03T04:05:06Z".to_string()),
        ..Chat::untitled("c-1")
    };
    assert_eq!(
        chat_list::format_chat_line(&chat),
        "c-1  Groceries  (2024-02-03 04:05)"
    );
    assert_eq!(chat_list::format_chat_line(&Chat::untitled("c-2")), "c-2  (untitled)");
}

#[test]
fn test_read_token_rejects_blank_input() {
    let mut input = std::io::Cursor::new("  tok-123 \n");
    assert_eq!(auth::read_token(&mut input).expect("token"), "tok-123");

    let mut input = std::io::Cursor::new("\n");
    assert!(auth::read_token(&mut input).is_err());
}

#[test]
fn test_deauth_removes_stored_token() {
    use crate::core::keyring::{MemoryCredentialStore, DEFAULT_ACCOUNT};

    let store = MemoryCredentialStore::with_token(DEFAULT_ACCOUNT, "old");
    auth::run_deauth(DEFAULT_ACCOUNT, &store).expect("deauth");
    assert_eq!(store.load_token(DEFAULT_ACCOUNT).expect("load"), None);

    auth::store_token(&store, "alice", "new").expect("store");
    assert_eq!(store.load_token("alice").expect("load").as_deref(), Some("new"));
}

#[test]
fn test_keyring_account_matches_session_lookup() {
    use crate::core::keyring::{MemoryCredentialStore, DEFAULT_ACCOUNT};
    use crate::core::session::PersistedSession;

    let remembered = PersistedState {
        session: PersistedSession {
            username: Some("alice".to_string()),
            remember_me: true,
        },
        chats: Vec::new(),
    };
    let config = Config::default();

    let account = keyring_account(&config, &remembered);
    assert_eq!(account, "alice");

    let store = MemoryCredentialStore::default();
    auth::store_token(&store, &account, "tok").expect("store");
    let session = Session::init(
        SessionInit {
            username: resolve_username(&config, &remembered),
            ..SessionInit::default()
        },
        &store,
    )
    .expect("session");
    assert_eq!(session.token(), Some("tok"));

    let configured = Config {
        username: Some("bob".to_string()),
        ..Config::default()
    };
    assert_eq!(keyring_account(&configured, &remembered), "bob");
    assert_eq!(
        keyring_account(&config, &PersistedState::default()),
        DEFAULT_ACCOUNT
    );
}

#[tokio::test]
async fn test_list_chats_refreshes_store() {
    let body = json!({
        "code": 200,
        "data": [
            {"id": "c-1", "title": "First", "updated_at": "2024-02-03T04:05:06Z"},
            {"id": "c-2", "title": ""}
        ]
    });
    let (addr, server) = spawn_mock_server(vec![MockResponse::json(200, &body.to_string())]).await;
    let log_dir = TempDir::new().expect("temp dir");
    let mut ctx = test_context(format!("http://{addr}/api/v1"), Some("secret"), &log_dir);

    chat_list::list_chats(&mut ctx).await.expect("list chats");

    let ids: Vec<&str> = ctx.store.chats().map(|chat| chat.id.as_str()).collect();
    assert_eq!(ids, vec!["c-1", "c-2"]);

    let requests = server.await.expect("server task").expect("server");
    assert!(requests[0].request_line.starts_with("GET /api/v1/chats "));
    assert_eq!(requests[0].header("authorization"), Some("Bearer secret"));
}

#[tokio::test]
async fn test_say_streams_reply_into_transcript_and_log() {
    let (addr, server) = spawn_mock_server(vec![MockResponse::event_stream([
        "data: Hel",
        "lo\n\n",
        "data: !\n\ndata: [DONE]\n\n",
    ])])
    .await;
    let log_dir = TempDir::new().expect("temp dir");
    let mut ctx = test_context(format!("http://{addr}/api/v1"), Some("secret"), &log_dir);

    say::run_say(&mut ctx, "c-7", "hi there").await.expect("say");

    let entry = ctx.store.entry("c-7").expect("chat entry");
    assert!(!entry.is_sending);
    let roles: Vec<TranscriptRole> = entry.transcript.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![TranscriptRole::User, TranscriptRole::Assistant]);
    assert_eq!(entry.transcript[1].content, "Hello!");

    assert_eq!(read_log(&log_dir), "You: hi there\n\nHello!\n\n");

    let requests = server.await.expect("server task").expect("server");
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("json request body");
    assert_eq!(body["chat_id"], "c-7");
    assert_eq!(body["content"], "hi there");
}

#[tokio::test]
async fn test_say_reports_backend_error() {
    let (addr, _server) = spawn_mock_server(vec![MockResponse::json(
        401,
        r#"{"code":401,"message":"token expired"}"#,
    )])
    .await;
    let log_dir = TempDir::new().expect("temp dir");
    let mut ctx = test_context(format!("http://{addr}/api/v1"), Some("stale"), &log_dir);

    let err = say::run_say(&mut ctx, "c-7", "hello")
        .await
        .expect_err("401 should fail");
    assert!(err.to_string().contains("token expired"));

    let entry = ctx.store.entry("c-7").expect("chat entry");
    assert!(!entry.is_sending);
    let last = entry.transcript.last().expect("error entry");
    assert_eq!(last.role, TranscriptRole::AppError);
    assert!(read_log(&log_dir).contains("## "));
}

#[tokio::test]
async fn test_say_without_token_never_sends() {
    let log_dir = TempDir::new().expect("temp dir");
    let mut ctx = test_context("http://127.0.0.1:9/api/v1".to_string(), None, &log_dir);

    let err = say::run_say(&mut ctx, "c-1", "hello")
        .await
        .expect_err("missing token should fail");
    let err = err
        .downcast_ref::<StreamError>()
        .expect("stream error");
    assert!(matches!(err, StreamError::MissingCredential));
    assert!(!ctx.store.is_sending("c-1"));
}

#[tokio::test]
async fn test_say_rejects_blank_prompt() {
    let log_dir = TempDir::new().expect("temp dir");
    let mut ctx = test_context("http://127.0.0.1:9/api/v1".to_string(), Some("t"), &log_dir);

    assert!(say::run_say(&mut ctx, "c-1", "   ").await.is_err());
    assert!(ctx.store.entry("c-1").is_none());
}
