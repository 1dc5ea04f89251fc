use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelforge_worker::config::WorkerConfig;
use reelforge_worker::reaper::{Reaper, Sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelforge_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let pool = reelforge_db::create_pool(&config.database_url).await?;
    reelforge_db::health_check(&pool).await?;
    tracing::info!("Database connection established");

    // Generation handlers live in the application layer; this binary
    // runs the queue maintenance loops that every deployment needs.
    let cancel = CancellationToken::new();
    let reaper = Reaper::new(pool.clone(), config.stuck_timeout, config.reaper_interval);
    let sweeper = Sweeper::new(pool.clone(), config.retention_days);

    let reaper_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { reaper.run(cancel).await }
    });
    let sweeper_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { sweeper.run(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    reaper_task.await?;
    sweeper_task.await?;
    reelforge_db::close_pool(&pool).await;

    Ok(())
}
