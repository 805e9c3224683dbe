//! Vestibule CLI - role-based Basic auth in front of a graph server
//!
//! Run `vestibule --help` for usage information.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vestibule::auth::{AccessGate, AuthManager, PasswordHasher};
use vestibule::config::{AdminCredentials, Config, ConfigError, LogFormat};
use vestibule::storage::{FileStorage, UserStorage};
use vestibule::web::{AppState, GatewayServer, UpstreamProxy};
use vestibule::VestibuleError;

#[derive(Parser)]
#[command(
    name = "vestibule",
    about = "Role-based HTTP Basic authentication gateway for graph database servers",
    version
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        /// Address to bind to (overrides [server] bind)
        #[arg(short, long)]
        bind: Option<String>,

        /// Upstream graph server URL (overrides [upstream] url)
        #[arg(short, long)]
        upstream: Option<String>,
    },

    /// Initialize configuration with a hashed admin secret
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (bind, upstream) = match cli.command {
        Commands::Init { force } => {
            // Nothing to load yet; init writes the file
            init_logging(&Config::default(), cli.verbose);
            return init_config(cli.config, force).await;
        }
        Commands::Serve { bind, upstream } => (bind, upstream),
    };

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path).await?
    } else {
        let default_path = Config::default_path();
        if default_path.exists() {
            Config::load(&default_path).await?
        } else {
            Config::default()
        }
    };
    let config = config.with_env_overrides()?;

    init_logging(&config, cli.verbose);
    run_server(config, bind, upstream).await?;

    Ok(())
}

/// Setup logging; `-v` flags take precedence over `[logging] level`
fn init_logging(config: &Config, verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        1 => EnvFilter::new(Level::DEBUG.as_str()),
        _ => EnvFilter::new(Level::TRACE.as_str()),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Build the auth manager from the configured administrator
async fn init_auth(config: &Config) -> Result<AuthManager, VestibuleError> {
    let hasher = PasswordHasher::new(config.security.hash_cost)?;

    let manager = match config.admin_credentials()? {
        AdminCredentials::Plain { identifier, secret } => {
            AuthManager::new(identifier, secret, hasher)?
        }
        AdminCredentials::Hashed {
            identifier,
            password_hash,
        } => AuthManager::with_admin_hash(identifier, password_hash.clone(), hasher)?,
    };

    let manager = match &config.storage.path {
        Some(path) => {
            let storage = FileStorage::new(path).await?;
            storage.health_check().await?;
            info!(path = %storage.path().display(), "Using user file");
            manager.with_storage(Arc::new(storage))
        }
        None => {
            warn!("No [storage] path configured; provisioned users will not survive a restart");
            manager
        }
    };

    manager.load_users().await?;
    Ok(manager)
}

/// Run the gateway
async fn run_server(
    config: Config,
    bind: Option<String>,
    upstream: Option<String>,
) -> Result<(), VestibuleError> {
    let upstream_url = upstream
        .or_else(|| config.upstream.url.clone())
        .ok_or_else(|| {
            ConfigError::Invalid("no upstream configured; set [upstream] url or pass --upstream".to_string())
        })?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let auth_manager = init_auth(&config).await?;
    let gate = AccessGate::new().with_admin_data_role(config.admin.data_role);
    let state = AppState::new(Arc::new(auth_manager), gate, &config.server.realm);

    let proxy = UpstreamProxy::new(
        &upstream_url,
        Duration::from_secs(config.upstream.timeout_secs),
        config.upstream.max_body_bytes,
    )?;
    info!(upstream = %proxy.base_url(), "Forwarding data requests");

    let server = GatewayServer::new(bind, state);
    server.run(proxy.into_router()).await?;

    Ok(())
}

/// Write a starter configuration with a hashed admin secret
async fn init_config(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path.unwrap_or_else(Config::default_path);

    if config_path.exists() && !force {
        return Err(format!(
            "Configuration already exists at {}. Use --force to overwrite.",
            config_path.display()
        )
        .into());
    }

    // Get identifier
    eprint!("Admin identifier [neo4j]: ");
    io::stderr().flush()?;
    let mut identifier = String::new();
    io::stdin().read_line(&mut identifier)?;
    let identifier = identifier.trim();
    let identifier = if identifier.is_empty() { "neo4j" } else { identifier };

    if identifier.contains(':') {
        return Err("Admin identifier must not contain ':'".into());
    }

    // Get secret
    eprint!("Admin secret: ");
    io::stderr().flush()?;
    let secret = rpassword::read_password()?;

    if secret.is_empty() {
        return Err("Admin secret must not be empty".into());
    }

    eprint!("Confirm secret: ");
    io::stderr().flush()?;
    let confirm = rpassword::read_password()?;

    if secret != confirm {
        return Err("Secrets do not match".into());
    }

    let defaults = Config::default();
    let hasher = PasswordHasher::new(defaults.security.hash_cost)?;
    let password_hash = hasher.hash(&secret)?;

    let content = Config::starter_toml(identifier, &password_hash, &Config::default_users_path())?;

    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&config_path, content).await?;

    println!("Configuration initialized at {}", config_path.display());
    println!("\nAdmin '{}' created.", identifier);
    println!("\nNext steps:");
    println!("1. Point [upstream] url at your graph server");
    println!("2. Start the gateway: vestibule serve");
    println!(
        "3. Provision users: curl -u {}:<secret> -d user=alice:pw http://{}/admin/add-user-ro",
        identifier, defaults.server.bind
    );

    Ok(())
}
