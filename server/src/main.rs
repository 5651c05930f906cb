//! Hookrelay Worker - Main Entry Point
//!
//! Outgoing webhook dispatch worker for a chat platform.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use hookrelay_server::outgoing::interface::InterfaceRegistry;
use hookrelay_server::outgoing::queries::PgServiceProfileStore;
use hookrelay_server::outgoing::relay::RedisMessageSender;
use hookrelay_server::outgoing::retry::RedisTriggerQueue;
use hookrelay_server::outgoing::worker::{run_trigger_worker, WorkerDeps};
use hookrelay_server::{config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hookrelay_server=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Hookrelay Worker"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    // Initialize Redis
    let redis = db::create_redis_client(&config.redis_url).await?;

    let deps = Arc::new(WorkerDeps {
        store: Arc::new(PgServiceProfileStore::new(db_pool)),
        sender: Arc::new(RedisMessageSender::new(redis.clone())),
        queue: Arc::new(RedisTriggerQueue::new(redis.clone())),
        registry: Arc::new(InterfaceRegistry::with_builtin()),
        http: reqwest::Client::new(),
        timeout: Duration::from_secs(config.webhook_timeout_secs),
        bot_server_base_url: config.bot_server_base_url,
    });

    // Graceful shutdown handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    tokio::select! {
        () = run_trigger_worker(redis, deps) => {}
        () = shutdown_signal => {}
    }

    info!("Worker shutdown complete");

    Ok(())
}
