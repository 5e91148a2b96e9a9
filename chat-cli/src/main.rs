//! # tandem
//!
//! Command-line client for Tandem one-to-one chat.
//!
//! ## Commands
//!
//! - `signup`: Create an account
//! - `login` / `logout` / `whoami`: Manage the stored session
//! - `contacts`, `search`, `add`: Manage contacts
//! - `history`, `send`: One-shot conversation access
//! - `chat`: Interactive conversation with live inbound messages
//!
//! ## Example
//!
//! ```bash
//! tandem signup alice
//! tandem login alice
//! tandem search rob --add
//! tandem send robert9 "hi"
//! tandem chat robert9
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tandem_chat_client::{ChatApi, ChatClient, MockTransport, Transport};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{auth, chat, contacts, messages};
use config::AppConfig;

/// Command-line client for Tandem chat.
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the stored session and config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/tandem.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a seeded in-memory backend instead of the real server (for demo)
    #[arg(long, global = true)]
    mock: bool,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account (does not log in)
    Signup {
        /// Username
        username: String,

        /// Password (will prompt if not provided)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Log in and store the session
    Login {
        /// Username
        username: String,

        /// Password (will prompt if not provided)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List contacts
    Contacts,

    /// Search users by name
    Search {
        /// Part of a username
        query: String,

        /// Open a conversation with the first result, adding it as a contact
        #[arg(long)]
        add: bool,
    },

    /// Add a user as a contact by exact username
    Add {
        /// Username to add
        username: String,
    },

    /// Print the conversation with a contact
    History {
        /// Contact id or username
        peer: String,
    },

    /// Send one message to a contact
    Send {
        /// Contact id or username
        peer: String,

        /// Message text
        text: String,
    },

    /// Chat interactively with a contact (/quit to exit)
    Chat {
        /// Contact id or username
        peer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AppConfig::default_path(&data_dir));
    let app_config = AppConfig::load(&config_path).await?;

    if cli.mock {
        let client = ChatClient::new(
            app_config.client_config(),
            commands::demo_backend(),
            MockTransport::new(),
        );
        dispatch(&client, &data_dir, cli.command).await
    } else {
        let client = ChatClient::from_config(app_config.client_config())
            .context("Invalid backend configuration")?;
        dispatch(&client, &data_dir, cli.command).await
    }
}

async fn dispatch<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    data_dir: &Path,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Signup { username, password } => {
            auth::signup(client, &username, password).await?;
        }
        Commands::Login { username, password } => {
            auth::login(client, data_dir, &username, password).await?;
        }
        Commands::Logout => {
            auth::logout(client, data_dir).await?;
        }
        Commands::Whoami => {
            auth::whoami(client, data_dir).await?;
        }
        Commands::Contacts => {
            contacts::list(client, data_dir).await?;
        }
        Commands::Search { query, add } => {
            contacts::search(client, data_dir, &query, add).await?;
        }
        Commands::Add { username } => {
            contacts::add(client, data_dir, &username).await?;
        }
        Commands::History { peer } => {
            messages::history(client, data_dir, &peer).await?;
        }
        Commands::Send { peer, text } => {
            messages::send(client, data_dir, &peer, &text).await?;
        }
        Commands::Chat { peer } => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            chat::run(client, data_dir, &peer, stdin).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays the transcript.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

/// Get the default data directory for tandem.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("chat", "tandem", "tandem")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
