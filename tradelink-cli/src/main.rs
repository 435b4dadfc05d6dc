//! Tradelink CLI - Command-line interface for the tradelink session core
//!
//! Signs in against the marketplace backend, inspects the session and manages
//! the client configuration from a terminal.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tradelink_core::{init_logging, ClientConfig, LoggingConfig, UserRole};
use tradelink_session::{FileTokenStore, RoleAuthorizationPolicy, SessionManager, TokenStore};

#[derive(Parser)]
#[command(name = "tradelink")]
#[command(about = "Session and authentication client for the tradelink marketplace")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate the stored session and print its state
    Status {
        /// Role the page requires (seller or wholesaler)
        #[arg(short, long)]
        role: Option<UserRole>,

        /// Evaluate as the role-status page, which is never redirected
        #[arg(long)]
        role_status_page: bool,
    },

    /// Store a token pair obtained elsewhere
    Login {
        /// Access token
        #[arg(long)]
        access: String,

        /// Refresh token
        #[arg(long)]
        refresh: String,

        /// User id to store alongside the tokens
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Sign in with a one-time password
    Otp {
        #[command(subcommand)]
        action: OtpCommand,
    },

    /// Print the stored access token
    Token,

    /// Clear the stored session
    Logout,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum OtpCommand {
    /// Ask the backend to send a code
    Request {
        /// Phone number the code is sent to
        phone: String,
    },

    /// Exchange a code for a session
    Verify {
        /// Phone number the code was sent to
        phone: String,

        /// Received code
        code: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Loaded before logging so the `[logging]` section applies
    let source = config_source(cli.config.as_deref());
    let loaded = load_config(source.as_deref());

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        loaded
            .as_ref()
            .map(|config| config.logging.clone())
            .unwrap_or_default()
    };
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting tradelink CLI v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => info!("Using configuration file {:?}", path),
        None => debug!("No configuration file found, using defaults"),
    }

    let command = match cli.command {
        Commands::Config { action } => return handle_config(action, cli.config.as_deref(), loaded),
        command => command,
    };

    let config = loaded?;
    match command {
        Commands::Login {
            access,
            refresh,
            user_id,
        } => handle_login(&config, &access, &refresh, user_id.as_deref()),
        command => {
            let manager =
                SessionManager::from_config(config).context("Failed to create session manager")?;

            match command {
                Commands::Status {
                    role,
                    role_status_page,
                } => handle_status(&manager, role, role_status_page).await,
                Commands::Otp { action } => handle_otp(&manager, action).await,
                Commands::Token => match manager.get_token() {
                    Some(token) => {
                        println!("{}", token);
                        Ok(())
                    }
                    None => bail!("No access token stored, sign in first"),
                },
                Commands::Logout => {
                    manager.logout();
                    println!("Signed out");
                    Ok(())
                }
                Commands::Config { .. } | Commands::Login { .. } => Ok(()),
            }
        }
    }
}

/// Explicit `--config` path, else the default location when it exists
fn config_source(config_path: Option<&Path>) -> Option<PathBuf> {
    match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => ClientConfig::default_path().filter(|path| path.exists()),
    }
}

fn load_config(source: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let config = match source {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => ClientConfig::default(),
    };

    let config = config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

async fn handle_status(
    manager: &SessionManager,
    role: Option<UserRole>,
    role_status_page: bool,
) -> anyhow::Result<()> {
    manager.set_required_role(RoleAuthorizationPolicy::new(role, role_status_page));

    let snapshot = manager.authenticate().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

fn handle_login(
    config: &ClientConfig,
    access: &str,
    refresh: &str,
    user_id: Option<&str>,
) -> anyhow::Result<()> {
    let store = FileTokenStore::new(config.token_file_path()?);
    store.set(access, refresh)?;
    if let Some(user_id) = user_id {
        store.set_user_id(user_id)?;
    }

    println!("Session stored at {}", store.path().display());
    Ok(())
}

async fn handle_otp(manager: &SessionManager, action: OtpCommand) -> anyhow::Result<()> {
    match action {
        OtpCommand::Request { phone } => {
            manager
                .request_otp(&phone)
                .await
                .context("Failed to request a one-time password")?;
            println!("Code sent to {}", phone);
        }
        OtpCommand::Verify { phone, code } => {
            manager
                .verify_otp(&phone, &code)
                .await
                .context("Failed to verify the one-time password")?;

            let snapshot = manager.authenticate().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

fn handle_config(
    action: ConfigCommand,
    config_path: Option<&Path>,
    loaded: anyhow::Result<ClientConfig>,
) -> anyhow::Result<()> {
    match action {
        ConfigCommand::Init { force } => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => ClientConfig::default_path()
                    .context("Could not determine the configuration directory")?,
            };

            if path.exists() && !force {
                bail!(
                    "Configuration already exists at {:?}, use --force to overwrite",
                    path
                );
            }

            ClientConfig::default().save_to_file(&path)?;
            println!("Configuration initialized at: {:?}", path);
        }
        ConfigCommand::Show => {
            let config = loaded?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
