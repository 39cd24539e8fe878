use std::sync::Arc;

use anyhow::{bail, Context};
use backfill::{
    config::BackfillConfig,
    observer::{init_redis_pool, Fanout, LogObserver, RedisPublisher},
    pg::{init_pg_pool, PgCandleStore},
    upbit::UpbitCandleSource,
    Backfill,
};
use tracing::info;
use upbit_api::RestClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let config = BackfillConfig::from_env()?;
    let pg_pool = init_pg_pool(config.database_url())?;
    let client = RestClient::new(config.upbit_api_url()).context("Creating Upbit RestClient")?;
    let mut observer = Fanout::default().with(Arc::new(LogObserver::default()));

    if let Some(redis_url) = config.redis_url() {
        let redis_pool = init_redis_pool(redis_url)?;
        observer = observer.with(Arc::new(RedisPublisher::new(redis_pool)));
    }
    let backfill = Backfill::new(
        Arc::new(UpbitCandleSource::new(client)),
        Arc::new(PgCandleStore::new(pg_pool)),
        Arc::new(observer),
        config.settings()?,
    )?;

    info!(market = %config.market(), window = ?config.window(), "Starting backfill");
    let report = backfill.run(config.market(), config.window()).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Stringify FinalReport")?
    );
    let stats = backfill.stats(config.market())?;
    info!(
        market = %stats.market(),
        total = stats.total(),
        oldest = ?stats.oldest(),
        newest = ?stats.newest(),
        "Persisted candles"
    );
    if !report.is_complete() {
        bail!(
            "Backfill of {} ended with {:?}",
            report.market(),
            report.status()
        );
    }
    return Ok(());
}
