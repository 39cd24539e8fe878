use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use backfill::{config::DEFAULT_START, observer::RunProgress, StoreStats};
use serde::Deserialize;
use tracing::info;
use types::{Market, Window};

use crate::{error::AppError, AppState};

pub fn create_router() -> Router<AppState> {
    let router = Router::new()
        .route("/:market/start", post(start))
        .route("/:market/progress", get(progress))
        .route("/:market/stats", get(stats))
        .route("/:market/candles", delete(clear));

    return router;
}

#[derive(Debug, Deserialize)]
struct StartParams {
    start: Option<String>,
    end: Option<String>,
}

async fn start(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(params): Query<StartParams>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let market = Market::from_str(&market)?;
    let window = Window::parse(
        params.start.as_deref().unwrap_or(DEFAULT_START),
        params.end.as_deref(),
    )?;
    let guard = state.backfill.begin(&market)?;
    let backfill = state.backfill.clone();

    info!(%market, ?window, "Backfill requested");
    state.board.mark_requested(&market, &window);
    tokio::spawn(async move {
        let report = backfill.run_with(guard, &window).await;
        info!(
            market = %report.market(),
            status = ?report.status(),
            "Backfill task finished"
        );
    });
    return Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "market": market, "window": window })),
    ));
}

async fn progress(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Result<Json<RunProgress>, AppError> {
    let market = Market::from_str(&market)?;

    return match state.board.get(&market) {
        Some(x) => Ok(Json(x)),
        None => Err(AppError::NotFound(format!("No backfill ran for {market}"))),
    };
}

async fn stats(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Result<Json<StoreStats>, AppError> {
    let market = Market::from_str(&market)?;

    return Ok(Json(state.backfill.stats(&market)?));
}

async fn clear(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let market = Market::from_str(&market)?;
    let removed = state.backfill.clear(&market)?;

    return Ok(Json(
        serde_json::json!({ "market": market, "removed": removed }),
    ));
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, sync::Arc, time::Duration};

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use backfill::{
        observer::{Fanout, ProgressBoard},
        testing::{at, candle, minute_history, HistorySource, MemoryStore},
        Backfill, BackfillSettingsBuilder, RunStatus,
    };
    use tower::ServiceExt;
    use types::Market;

    use crate::{router::create_router, AppState};

    fn state(store: MemoryStore) -> AppState {
        let market = Market::from_str("KRW-ETH").unwrap();
        let board = ProgressBoard::default();
        let backfill = Backfill::new(
            Arc::new(HistorySource::new(minute_history(
                &market,
                at(2025, 10, 21, 14, 59),
                10,
            ))),
            Arc::new(store),
            Arc::new(Fanout::default().with(Arc::new(board.clone()))),
            BackfillSettingsBuilder::default().build().unwrap(),
        )
        .unwrap();

        return AppState {
            backfill: Arc::new(backfill),
            board,
        };
    }

    async fn send(app: &Router, method: Method, uri: &str) -> StatusCode {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        return response.status();
    }

    #[tokio::test]
    async fn start_runs_in_the_background() {
        let state = state(MemoryStore::default());
        let board = state.board.clone();
        let app = create_router(state);
        let market = Market::from_str("KRW-ETH").unwrap();

        assert_eq!(
            send(&app, Method::GET, "/backfill/KRW-ETH/progress").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            send(&app, Method::POST, "/backfill/krw-eth/start?start=2025-10-21").await,
            StatusCode::ACCEPTED
        );
        for _ in 0..200 {
            if board.get(&market).is_some_and(|x| x.report().is_some()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let progress = board.get(&market).expect("run should be on the board");
        let report = progress.report().as_ref().expect("run should finish");

        assert_eq!(*report.status(), RunStatus::Completed);
        assert_eq!(*report.total_saved(), 10);
        assert_eq!(
            send(&app, Method::GET, "/backfill/KRW-ETH/progress").await,
            StatusCode::OK
        );
        assert_eq!(
            send(&app, Method::GET, "/backfill/KRW-ETH/stats").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn progress_is_visible_once_accepted() {
        let state = state(MemoryStore::default());
        let board = state.board.clone();
        let app = create_router(state);
        let market = Market::from_str("KRW-ETH").unwrap();

        assert_eq!(
            send(&app, Method::POST, "/backfill/KRW-ETH/start?start=2025-10-21").await,
            StatusCode::ACCEPTED
        );
        let progress = board.get(&market).expect("accepted run should be on the board");

        assert!(*progress.running());
        assert!(progress.report().is_none());
        assert_eq!(
            send(&app, Method::GET, "/backfill/KRW-ETH/progress").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn active_run_conflicts() {
        let state = state(MemoryStore::default());
        let market = Market::from_str("KRW-ETH").unwrap();
        let guard = state.backfill.begin(&market).unwrap();
        let app = create_router(state);

        assert_eq!(
            send(&app, Method::POST, "/backfill/KRW-ETH/start").await,
            StatusCode::CONFLICT
        );
        assert_eq!(
            send(&app, Method::DELETE, "/backfill/KRW-ETH/candles").await,
            StatusCode::CONFLICT
        );
        drop(guard);
        assert_eq!(
            send(&app, Method::DELETE, "/backfill/KRW-ETH/candles").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn invalid_input() {
        let market = Market::from_str("KRW-ETH").unwrap();
        let app = create_router(state(MemoryStore::with(&[candle(
            &market,
            at(2025, 10, 21, 14, 59),
        )])));

        assert_eq!(
            send(&app, Method::POST, "/backfill/ETH/start").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send(&app, Method::POST, "/backfill/KRW-ETH/start?start=yesterday").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send(
                &app,
                Method::POST,
                "/backfill/KRW-ETH/start?start=2025-10-21&end=2025-10-01"
            )
            .await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send(&app, Method::GET, "/backfill/KRW-ETH/stats").await,
            StatusCode::OK
        );
    }
}
