use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use waterstation::config::{database, Config, LogFormat};
use waterstation::services::{accounts, containers, AppState};
use waterstation::{create_router, shutdown_signal};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations
    Migrate,
    /// Create the default users and products that are missing
    Seed,
    /// Rebuild every customer's outstanding containers from delivered orders
    RecomputeContainers,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let pool = database::create_pool(&config.database_url, config.max_db_connections).await?;
    database::init_db(&pool).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            tracing::info!("Migrations are up to date");
        }
        Command::Seed => {
            let report = accounts::seed(&pool).await?;
            println!(
                "Created {} users and {} products",
                report.users_created, report.products_created
            );
        }
        Command::RecomputeContainers => {
            let updated = containers::recompute_all(&pool).await?;
            println!("Recomputed outstanding containers for {} customers", updated);
        }
        Command::Serve => {
            let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
            let state = Arc::new(AppState::new(pool, config));
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "Starting server");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            tracing::info!("Server stopped");
        }
    }

    Ok(())
}
