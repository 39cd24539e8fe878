mod error;
mod router;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use backfill::{
    config::BackfillConfig,
    observer::{init_redis_pool, Fanout, LogObserver, ProgressBoard, RedisPublisher},
    pg::{init_pg_pool, PgCandleStore},
    upbit::UpbitCandleSource,
    Backfill,
};
use upbit_api::RestClient;

const DEFAULT_REST_ADDR: &str = "127.0.0.1:3003";

#[derive(Clone)]
pub struct AppState {
    backfill: Arc<Backfill>,
    board: ProgressBoard,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let config = BackfillConfig::from_env()?;
    let pg_pool = init_pg_pool(config.database_url())?;
    let client = RestClient::new(config.upbit_api_url()).context("Creating Upbit RestClient")?;
    let board = ProgressBoard::default();
    let mut observer = Fanout::default()
        .with(Arc::new(LogObserver::default()))
        .with(Arc::new(board.clone()));

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
    let state = AppState {
        backfill: Arc::new(backfill),
        board,
    };

    let addr: SocketAddr = std::env::var("REST_ADDR")
        .unwrap_or_else(|_| DEFAULT_REST_ADDR.to_owned())
        .parse()
        .context("REST_ADDR")?;
    tracing::debug!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Binding {addr}"))?;
    let app = router::create_router(state);
    axum::serve(listener, app).await.context("Serving rest api")?;
    return Ok(());
}
