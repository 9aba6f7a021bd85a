use mediahunt::config::Config;
use mediahunt::database::{create_pool, run_migrations};
use mediahunt::redis::RedisClient;
use mediahunt::repository::{MediaRepository, MemoryMediaRepository, PgMediaRepository};
use mediahunt::{AppState, create_app};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediahunt=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let repo: Arc<dyn MediaRepository> = if config.database_url.starts_with("memory:") {
        tracing::warn!("Using in-memory store; data is lost on shutdown");
        Arc::new(MemoryMediaRepository::new())
    } else {
        let db = create_pool(&config.database_url).await?;
        tracing::info!("Database connection pool created");

        run_migrations(&db).await?;
        tracing::info!("Database migrations completed");

        Arc::new(PgMediaRepository::new(db))
    };

    // Redis only backs vote rate limiting
    let redis = match &config.redis_url {
        Some(url) => {
            let client = RedisClient::new(url).await?;
            tracing::info!("Redis client created");
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("REDIS_URL not set, vote rate limiting disabled");
            None
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(repo, redis, config);

    // Create application
    let app = create_app(state);

    // Create listener
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
