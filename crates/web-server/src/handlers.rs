use crate::{AppState, error::AppError};
use analyzer::Ranking;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, NaiveDate, Utc};
use core_types::{CompositeScore, CurrencyCode, PositioningReport};
use serde::Deserialize;
use std::sync::Arc;

/// Reports returned when no `from` is given.
const DEFAULT_REPORT_WEEKS: i64 = 52;

#[derive(Debug, Default, Deserialize)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// # GET /api/currencies
pub async fn get_currencies(State(state): State<Arc<AppState>>) -> Json<Vec<CurrencyCode>> {
    Json(state.engine.currencies().to_vec())
}

/// # GET /api/rankings
pub async fn get_rankings(State(state): State<Arc<AppState>>) -> Json<Ranking> {
    Json(state.engine.rankings().await)
}

/// # GET /api/currencies/:code/score
pub async fn get_score(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<CompositeScore>, AppError> {
    let currency = parse_code(&code)?;
    let score = state.engine.latest_score(&currency).await?;
    Ok(Json(score))
}

/// # GET /api/currencies/:code/reports?from=&to=
/// Defaults to the year ending today.
pub async fn get_reports(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(range): Query<ReportRange>,
) -> Result<Json<Vec<PositioningReport>>, AppError> {
    let currency = parse_code(&code)?;
    let to = range.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = match range.from {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::weeks(DEFAULT_REPORT_WEEKS))
            .ok_or_else(|| AppError::BadRequest(format!("no year of reports ends on {}", to)))?,
    };
    let reports = state.engine.reports(&currency, from, to).await?;
    Ok(Json(reports))
}

fn parse_code(code: &str) -> Result<CurrencyCode, AppError> {
    code.parse()
        .map_err(|e: core_types::CoreError| AppError::BadRequest(e.to_string()))
}
