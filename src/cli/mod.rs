//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod auth;
pub mod chat_list;
pub mod say;

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::core::config::defaults::BASE_URL_ENV_VAR;
use crate::core::config::{path_display, Config, ConfigKey, ConfigOrchestrator};
use crate::core::conversation::ConversationStore;
use crate::core::keyring::{CredentialStore, KeyringCredentialStore, DEFAULT_ACCOUNT};
use crate::core::session::{Session, SessionInit, TokenSource, TOKEN_ENV_VAR};
use crate::core::state::PersistedState;
use crate::utils::logging::{init_tracing, LoggingState};

#[derive(Parser)]
#[command(name = "streamchat")]
#[command(version)]
#[command(about = "Terminal client for a streaming chat backend")]
#[command(
    long_about = "streamchat lists, creates and renames conversations on a chat backend and \
streams assistant replies to the terminal as they are generated.\n\n\
Authentication:\n\
  Use 'streamchat auth' to store an access token in your system keyring.\n\n\
Environment Variables:\n\
  STREAMCHAT_TOKEN      Access token (overrides the keyring)\n\
  STREAMCHAT_BASE_URL   Backend API root (defaults to http://127.0.0.1:8000/api/v1)\n\
  STREAMCHAT_LOG        Diagnostic log filter, e.g. 'debug' (defaults to 'warn')\n\n\
Controls:\n\
  Ctrl+C            Stop a reply that is still streaming"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Access token to use instead of the stored one
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Backend API root
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Give up on a streamed reply after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Append the conversation to the specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List your conversations
    Chats,
    /// Start a new conversation
    New,
    /// Show the messages of a conversation
    History {
        chat_id: String,
    },
    /// Rename a conversation
    Rename {
        chat_id: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        title: Vec<String>,
    },
    /// Send a message and stream the reply
    Say {
        chat_id: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Set a configuration value, or show the configuration when no value is given
    Set {
        /// Configuration key to set
        key: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        key: String,
    },
    /// Store an access token in the system keyring
    Auth,
    /// Remove the stored access token
    Deauth,
}

/// Everything a backend command needs, built once per invocation.
pub struct CliContext {
    pub config: Config,
    pub session: Session,
    pub client: ApiClient,
    pub logging: LoggingState,
    pub store: ConversationStore,
    pub stream_timeout: Option<Duration>,
    pub state_path: Option<PathBuf>,
}

impl CliContext {
    pub fn init(
        args: &Args,
        config: Config,
        credentials: &dyn CredentialStore,
    ) -> Result<Self, Box<dyn Error>> {
        let env_base_url = env::var(BASE_URL_ENV_VAR).ok();
        let base_url = config.resolve_base_url(args.base_url.as_deref(), env_base_url.as_deref())?;

        let (state_path, state) = load_state();

        let session = Session::init(
            SessionInit {
                token: args.token.clone(),
                env_token: env::var(TOKEN_ENV_VAR).ok(),
                username: resolve_username(&config, &state),
                remember_me: config.remember_me(),
                skip_store: false,
            },
            credentials,
        )?;

        let client = ApiClient::new(base_url, config.request_timeout())?;
        let logging = LoggingState::new(args.log.clone())?;
        let stream_timeout = match args.timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => config.stream_timeout(),
        };

        debug!(
            base_url = client.base_url(),
            token_source = session.token_source().map(TokenSource::describe),
            transcript_log = %logging.get_status_string(),
            "CLI context ready"
        );

        Ok(Self {
            config,
            session,
            client,
            logging,
            store: ConversationStore::from_persisted(state.chats),
            stream_timeout,
            state_path,
        })
    }

    /// Ends the session and writes what should survive to the state file.
    pub fn teardown(self) -> Result<(), Box<dyn Error>> {
        let state = PersistedState {
            session: self.session.teardown(),
            chats: self.store.persisted(),
        };
        if let Some(path) = &self.state_path {
            state.save_to_path(path)?;
        }
        Ok(())
    }
}

fn load_state() -> (Option<PathBuf>, PersistedState) {
    let state_path = PersistedState::default_path().ok();
    let state = match &state_path {
        Some(path) => PersistedState::load_from_path(path).unwrap_or_else(|err| {
            warn!(error = %err, "Ignoring unreadable state file");
            PersistedState::default()
        }),
        None => PersistedState::default(),
    };
    (state_path, state)
}

/// The configured username, else the one remembered from the last session.
pub fn resolve_username(config: &Config, state: &PersistedState) -> Option<String> {
    config
        .username
        .clone()
        .or_else(|| state.session.username.clone())
}

/// Keyring account used by `auth`, `deauth` and session start alike.
pub fn keyring_account(config: &Config, state: &PersistedState) -> String {
    resolve_username(config, state).unwrap_or_else(|| DEFAULT_ACCOUNT.to_string())
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let orchestrator = ConfigOrchestrator::new(Config::default_path()?);
    let credentials = KeyringCredentialStore::new();

    match &args.command {
        Commands::Set { key, value } => return run_set(&orchestrator, key.as_deref(), value),
        Commands::Unset { key } => return run_unset(&orchestrator, key),
        Commands::Auth => {
            let config = orchestrator.load_with_cache()?;
            let account = keyring_account(&config, &load_state().1);
            return auth::run_auth(&account, &credentials);
        }
        Commands::Deauth => {
            let config = orchestrator.load_with_cache()?;
            let account = keyring_account(&config, &load_state().1);
            return auth::run_deauth(&account, &credentials);
        }
        _ => {}
    }

    let config = orchestrator.load_with_cache()?;
    let mut ctx = CliContext::init(&args, config, &credentials)?;
    let result = run_backend_command(&mut ctx, args.command).await;
    ctx.teardown()?;
    result
}

pub async fn run_backend_command(
    ctx: &mut CliContext,
    command: Commands,
) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Chats => chat_list::list_chats(ctx).await,
        Commands::New => chat_list::create_chat(ctx).await,
        Commands::History { chat_id } => chat_list::show_history(ctx, &chat_id).await,
        Commands::Rename { chat_id, title } => {
            chat_list::rename_chat(ctx, &chat_id, &title.join(" ")).await
        }
        Commands::Say { chat_id, prompt } => say::run_say(ctx, &chat_id, &prompt.join(" ")).await,
        Commands::Set { .. } | Commands::Unset { .. } | Commands::Auth | Commands::Deauth => {
            Err("This command does not talk to the backend".into())
        }
    }
}

fn run_set(
    orchestrator: &ConfigOrchestrator,
    key: Option<&str>,
    value: &[String],
) -> Result<(), Box<dyn Error>> {
    let Some(key) = key else {
        orchestrator.load_with_cache()?.print_all();
        return Ok(());
    };
    let key: ConfigKey = key.parse()?;
    if value.is_empty() {
        orchestrator.load_with_cache()?.print_all();
        return Ok(());
    }

    let stored = orchestrator.mutate(|config| Ok(config.set_value(key, &value.join(" "))?))?;
    println!("✅ Set {key} to: {stored}");
    println!("   ({})", path_display(orchestrator.path()));
    Ok(())
}

fn run_unset(orchestrator: &ConfigOrchestrator, key: &str) -> Result<(), Box<dyn Error>> {
    let key: ConfigKey = key.parse()?;
    orchestrator.mutate(|config| {
        config.unset_value(key);
        Ok(())
    })?;
    println!("✅ Unset {key}");
    Ok(())
}

#[cfg(test)]
mod tests;
