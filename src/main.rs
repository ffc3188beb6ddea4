use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consilium::ai::{AiProvider, GeminiClient};
use consilium::api::{self, AppState};
use consilium::config::Config;
use consilium::db::Database;
use consilium::models::CreateAccountInput;

#[derive(Parser)]
#[command(name = "consilium")]
#[command(about = "Backend for AI-assisted medical consultations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve {
        /// Interface to bind, overrides server.host
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overrides server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply the database schema and exit
    Migrate,
    /// Create an active staff account
    CreateSuperuser {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: String,
    },
    /// Print the effective configuration with secrets redacted
    CheckConfig,
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db = if config.database.ephemeral {
        tracing::warn!("using an in-memory database; data is lost on exit");
        Database::open_memory()?
    } else if let Some(path) = &config.database.path {
        Database::open(path)?
    } else {
        Database::open_default()?
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let db = open_database(&config)?;
    let purged = db.purge_expired_tokens()?;
    if purged > 0 {
        tracing::info!(purged, "removed expired auth tokens");
    }

    if !config.ai.is_configured() {
        tracing::warn!("no AI API key configured; /api/ai/ endpoints will answer 503");
    }
    let provider: Arc<dyn AiProvider> = Arc::new(GeminiClient::new(&config.ai)?);

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let app = api::create_router(AppState::new(db, &config, provider));

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!("Consilium listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "consilium=debug,consilium_core=debug,tower_http=debug".into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load_with_dotenv()?;

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => serve(config, host, port).await?,
        Commands::Migrate => {
            open_database(&config)?;
            println!("Database schema is up to date.");
        }
        Commands::CreateSuperuser {
            phone,
            name,
            email,
            password,
        } => {
            let db = open_database(&config)?;
            let account = db.create_account(
                CreateAccountInput {
                    phone,
                    name,
                    email,
                    password,
                    is_staff: true,
                },
                config.auth.password_iterations,
            )?;
            println!("Created staff account {} ({})", account.id, account.phone);
        }
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}
