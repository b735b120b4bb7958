use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_gateway::{GatewayConfig, PortfolioClient};

/// Token file used when neither the flag nor the environment names one
const DEFAULT_TOKEN_FILE: &str = ".portfolio-tokens.json";

#[derive(Parser)]
#[command(name = "portfolio-gateway")]
#[command(about = "Authenticated client for the portfolio API")]
#[command(version)]
struct Cli {
    /// API base URL (overrides PORTFOLIO_API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// File holding the session tokens (overrides PORTFOLIO_TOKEN_STORE)
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session tokens
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "PORTFOLIO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a new account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "PORTFOLIO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Authenticated GET of any API path, printed as JSON
    Get { path: String },
    /// Current portfolio composition
    Composition {
        #[arg(short, long)]
        currency: Option<String>,
    },
    /// Daily portfolio value history
    History {
        #[arg(short, long)]
        currency: Option<String>,
        /// First day, as YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day, as YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "portfolio_gateway=debug,warn".into()
            } else {
                "portfolio_gateway=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = GatewayConfig::read_env().context("Invalid configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(path) = &cli.token_file {
        config.token_store_path = Some(path.clone());
    }
    if config.token_store_path.is_none() {
        config.token_store_path = Some(PathBuf::from(DEFAULT_TOKEN_FILE));
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    debug!(?config, "Loaded configuration");
    let client = PortfolioClient::from_config(config).await?;

    match cli.command {
        Command::Login { username, password } => {
            client
                .auth
                .login(&username, &password)
                .await
                .context("Login failed")?;
            println!("Logged in as {}", username);
        }
        Command::Register { username, password } => {
            let user = client
                .auth
                .register(&username, &password)
                .await
                .context("Registration failed")?;
            println!("Registered {} (id {})", user.username, user.id);
        }
        Command::Logout => {
            client.auth.logout().await?;
            println!("Logged out");
        }
        Command::Status => {
            if client.is_logged_in() {
                println!("Logged in");
            } else {
                println!("Not logged in");
            }
        }
        Command::Get { path } => {
            let value: Value = client.gateway.get_json(&path).await?;
            print_json(&value)?;
        }
        Command::Composition { currency } => {
            let composition = client.portfolio.composition(currency.as_deref()).await?;
            print_json(&composition)?;
        }
        Command::History {
            currency,
            start,
            end,
        } => {
            let history = client
                .portfolio
                .value_history(currency.as_deref(), start, end)
                .await?;
            print_json(&history)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before reading configuration from the environment
    let env_file_path = dotenvy::dotenv().ok();

    init_logging();

    if let Some(path) = env_file_path {
        info!(path = %path.display(), "Loaded environment from file");
    }

    run(Cli::parse()).await
}
