//! HTTP routes

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

use super::error::AppError;
use super::{pages, AppState};
use crate::db::{DailyCount, PathCount, StoreError};
use crate::stats;

/// Lesson menu. Counts as a page view.
pub async fn index(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Html<String> {
    state.recorder.record_view(&headers, &addr, "/").await;
    Html(pages::index(state.library.sections()))
}

/// One lesson table. Counts as a page view unless the lesson does not exist.
pub async fn lesson(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let lesson = state
        .library
        .lesson(&slug)?
        .ok_or_else(|| AppError::NotFound(slug.clone()))?;

    // Record the decoded menu slug so `/nouns` and `/%6Eouns` are one page
    state.recorder.record_view(&headers, &addr, &format!("/{}", slug)).await;
    Ok(Html(pages::lesson(&lesson, state.library.sections())))
}

#[derive(Debug, Deserialize)]
pub struct TtsQuery {
    #[serde(default)]
    pub text: String,
}

/// Pronunciation audio for a short snippet
pub async fn tts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TtsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let audio = state.tts.speak(&query.text).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        audio,
    ))
}

/// Read both aggregates. Storage outages degrade to an empty series; a
/// malformed query is a bug and is surfaced.
async fn load_series(state: &AppState) -> Result<(Vec<DailyCount>, Vec<PathCount>), AppError> {
    let totals = degrade(state.db.total_by_day().await)?;
    let page_counts = degrade(state.db.by_day_and_path().await)?;
    Ok((stats::with_today_fallback(totals, state.recorder.today()), page_counts))
}

fn degrade<T: Default>(result: Result<T, StoreError>) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(StoreError::StorageUnavailable(e)) => {
            warn!("Visit store unavailable, showing empty stats: {}", e);
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Stats page: tables newest day first plus the chart
pub async fn stats_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let (totals, page_counts) = load_series(&state).await?;
    let hits = page_counts.iter().map(|c| c.visits).sum();

    Ok(Html(pages::stats(
        &stats::totals_newest_first(totals),
        &stats::pages_newest_first(page_counts),
        hits,
        state.library.sections(),
    )))
}

/// Time-series chart, regenerated on every request
pub async fn stats_chart(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let (totals, page_counts) = load_series(&state).await?;
    let png = stats::render_chart(&totals, &page_counts).map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    ))
}

#[derive(Debug, Serialize)]
pub struct VisitsResponse {
    pub totals: Vec<DailyCount>,
    pub pages: Vec<PathCount>,
}

/// API: both aggregates, ascending by day
pub async fn api_visits(State(state): State<Arc<AppState>>) -> Result<Json<VisitsResponse>, AppError> {
    let (totals, pages) = load_series(&state).await?;
    Ok(Json(VisitsResponse { totals, pages }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrade_replaces_outage_with_default() {
        let result: Result<Vec<DailyCount>, AppError> =
            degrade(Err(StoreError::StorageUnavailable(sqlx::Error::PoolClosed)));
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn degrade_surfaces_malformed_query_as_internal() {
        let result: Result<Vec<DailyCount>, AppError> = degrade(Err(StoreError::MalformedQuery(
            sqlx::Error::ColumnNotFound("visitors".to_string()),
        )));
        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(
            err.into_response().status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
