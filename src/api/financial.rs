//! Direct financial record endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::auth::CurrentUser;
use super::{ApiError, ApiState};
use crate::db::{FinancialRecord, FinancialSummary, NewFinancialRecord};

/// Build financial router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/records", get(list_records).post(create_record))
        .route("/summary", get(summary))
        .with_state(state)
}

/// Optional inclusive date range
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl RangeQuery {
    fn range(&self) -> Result<Option<(NaiveDate, NaiveDate)>, ApiError> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) if start <= end => Ok(Some((start, end))),
            (Some(_), Some(_)) => Err(ApiError::BadRequest("start must not be after end".to_string())),
            _ => Err(ApiError::BadRequest(
                "start and end must be given together".to_string(),
            )),
        }
    }
}

async fn create_record(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Json(record): Json<NewFinancialRecord>,
) -> Result<(StatusCode, Json<FinancialRecord>), ApiError> {
    let record = state.financial.create(&user_id, &record)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_records(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<FinancialRecord>>, ApiError> {
    let range = query.range()?;
    Ok(Json(state.financial.list(&user_id, range, query.limit)?))
}

async fn summary(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<FinancialSummary>, ApiError> {
    let range = query.range()?;
    Ok(Json(state.dispatcher.summary(&user_id, range)?))
}
