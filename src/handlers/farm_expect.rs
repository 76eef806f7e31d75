// Farm expectation records are an append-only forecast history: create and
// soft delete only. There is deliberately no update route, so past forecasts
// keep their insight value.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::guard;
use crate::middleware::auth::AuthUser;
use crate::models::FarmExpect;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFarmExpect {
    pub expected_harvest_date: NaiveDate,
    pub expected_harvest_base_uom: Decimal,
    pub expected_income: Decimal,
}

/// POST /farm-expect/new/farm/:farm_id - the farm must exist, belong to the
/// caller, and still be active.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_id): Path<i32>,
    Json(body): Json<CreateFarmExpect>,
) -> Result<(StatusCode, Json<FarmExpect>), ApiError> {
    let mut conn = state.pool.acquire().await?;
    let farm = guard::active_owned_farm(&mut conn, farm_id, auth.user_id).await?;

    let expect = sqlx::query_as::<_, FarmExpect>(
        "INSERT INTO farm_expect \
         (farm_id, farm_abbrev, expected_harvest_date, expected_harvest_base_uom, expected_income) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(farm_id)
    .bind(&farm.farm_abbrev)
    .bind(body.expected_harvest_date)
    .bind(body.expected_harvest_base_uom)
    .bind(body.expected_income)
    .fetch_one(&mut *conn)
    .await?;

    Ok((StatusCode::CREATED, Json(expect)))
}

/// GET /farm-expect/:farm_id - latest active expectation.
pub async fn get_latest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_id): Path<i32>,
) -> Result<Json<FarmExpect>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    guard::owned_farm(&mut conn, farm_id, auth.user_id).await?;

    let expect = sqlx::query_as::<_, FarmExpect>(
        "SELECT * FROM farm_expect WHERE farm_id = $1 AND record_status = 'active' \
         ORDER BY record_created_date DESC LIMIT 1",
    )
    .bind(farm_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found("No active farm expectation found for this farm"))?;

    Ok(Json(expect))
}

/// GET /farm-expect/:farm_id/expectations - all active expectations, newest
/// first.
pub async fn get_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_id): Path<i32>,
) -> Result<Json<Vec<FarmExpect>>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    guard::owned_farm(&mut conn, farm_id, auth.user_id).await?;

    let expectations = sqlx::query_as::<_, FarmExpect>(
        "SELECT * FROM farm_expect WHERE farm_id = $1 AND record_status = 'active' \
         ORDER BY record_created_date DESC",
    )
    .bind(farm_id)
    .fetch_all(&mut *conn)
    .await?;

    if expectations.is_empty() {
        return Err(ApiError::not_found("No active farm expectations found"));
    }

    Ok(Json(expectations))
}

/// DELETE /farm-expect/delete/:farm_expect_id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_expect_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let expect = sqlx::query_as::<_, FarmExpect>(
        "SELECT * FROM farm_expect WHERE farm_expect_id = $1",
    )
    .bind(farm_expect_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Farm Expectation not found"))?;

    guard::require_farm_owner(&mut tx, expect.farm_id, auth.user_id).await?;

    sqlx::query(
        "UPDATE farm_expect SET record_status = 'deleted', record_updated_date = $1 \
         WHERE farm_expect_id = $2",
    )
    .bind(Utc::now())
    .bind(farm_expect_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "message": format!("Farm Expectation {} marked as deleted.", farm_expect_id)
    })))
}
