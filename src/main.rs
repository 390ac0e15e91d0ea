use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cms_api_rust::app::{app, AppState};
use cms_api_rust::auth::{generate_jwt, Claims};
use cms_api_rust::config::{config, AppConfig};
use cms_api_rust::database::Database;

#[derive(Parser)]
#[command(name = "cms-api-rust")]
#[command(about = "CMS API - articles, categories, authors and photos over REST")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Bind address (overrides API_HOST)")]
    host: Option<String>,

    #[arg(long, global = true, help = "Listen port (overrides CMS_API_PORT / PORT)")]
    port: Option<u16>,

    #[arg(
        long,
        global = true,
        help = "Directory uploaded files are stored in (overrides STORAGE_ROOT)"
    )]
    storage_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "Print a bearer token signed with SECURITY_JWT_SECRET")]
    Token {
        #[arg(help = "Subject to embed in the token")]
        subject: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, STORAGE_ROOT, etc.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = apply_cli(config().clone(), &cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .with_ansi(!cms_api_rust::is_production!())
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Token { subject } => print_token(&config, &subject),
    }
}

fn apply_cli(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(host) = &cli.host {
        config.api.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    if let Some(root) = &cli.storage_root {
        config.storage.root = root.clone();
    }
    config
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting CMS API in {:?} mode", config.environment);

    let database = Database::connect(&config.database)
        .await
        .context("failed to connect to the database")?;

    let storage_root = &config.storage.root;
    tokio::fs::create_dir_all(storage_root)
        .await
        .with_context(|| format!("failed to create storage root {}", storage_root.display()))?;

    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!(
        "CMS API listening on http://{} (storage: {})",
        bind_addr,
        config.storage.root.display()
    );

    let state = AppState::postgres(database.clone(), config);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    database.close().await;
    Ok(())
}

fn print_token(config: &AppConfig, subject: &str) -> anyhow::Result<()> {
    let secret = config
        .security
        .jwt_secret
        .as_deref()
        .context("SECURITY_JWT_SECRET is not set")?;

    let claims = Claims::new(subject, config.security.jwt_expiry_hours);
    let token = generate_jwt(&claims, secret)?;
    println!("{}", token);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
