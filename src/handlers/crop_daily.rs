use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::guard;
use crate::middleware::auth::AuthUser;
use crate::models::{CropDaily, CropDtl, CropStage};
use crate::rules;
use crate::state::AppState;

/// Resolve an active crop by NFC code and verify ownership. Daily records only
/// ever attach to live crops.
async fn active_owned_crop(
    conn: &mut sqlx::PgConnection,
    nfc_code: &str,
    user_id: i32,
) -> Result<CropDtl, ApiError> {
    let crop = guard::owned_crop(conn, nfc_code, user_id).await?;
    if !crop.crop_is_active {
        return Err(ApiError::not_found("Crop not found for given NFC code."));
    }
    Ok(crop)
}

#[derive(Debug, Deserialize)]
pub struct CreateDailyCrop {
    pub nfc_code: String,
    pub crop_stage: CropStage,
    pub stage_duration_day: Option<i32>,
}

/// POST /crop-daily/new
///
/// At most one active daily record per crop per calendar day; a second
/// same-day submission is rejected outright. The submitted stage propagates to
/// the parent crop when it differs.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateDailyCrop>,
) -> Result<(StatusCode, Json<CropDaily>), ApiError> {
    let mut tx = state.pool.begin().await?;

    let crop = active_owned_crop(&mut tx, &body.nfc_code, auth.user_id).await?;

    let today = Utc::now().date_naive();
    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT daily_id FROM crop_daily \
         WHERE nfc_code = $1 AND record_created_date::date = $2 AND crop_status = 'active'",
    )
    .bind(&body.nfc_code)
    .bind(today)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "A daily crop record already exists for today.",
        ));
    }

    let daily = sqlx::query_as::<_, CropDaily>(
        "INSERT INTO crop_daily (crop_id, nfc_code, crop_stage, stage_duration_day) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(crop.crop_id)
    .bind(&body.nfc_code)
    .bind(body.crop_stage)
    .bind(body.stage_duration_day)
    .fetch_one(&mut *tx)
    .await?;

    rules::propagate_crop_stage(&mut tx, crop.crop_id, crop.crop_stage, body.crop_stage, Utc::now())
        .await?;

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(daily)))
}

/// GET /crop-daily/latest/:nfc_code
pub async fn get_latest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
) -> Result<Json<CropDaily>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    active_owned_crop(&mut conn, &nfc_code, auth.user_id).await?;

    let latest = sqlx::query_as::<_, CropDaily>(
        "SELECT * FROM crop_daily WHERE nfc_code = $1 \
         ORDER BY record_created_date DESC LIMIT 1",
    )
    .bind(&nfc_code)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        ApiError::not_found(format!("No daily record found for crop {}", nfc_code))
    })?;

    Ok(Json(latest))
}

/// GET /crop-daily/history/:nfc_code - full history, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
) -> Result<Json<Vec<CropDaily>>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    active_owned_crop(&mut conn, &nfc_code, auth.user_id).await?;

    let history = sqlx::query_as::<_, CropDaily>(
        "SELECT * FROM crop_daily WHERE nfc_code = $1 ORDER BY record_created_date DESC",
    )
    .bind(&nfc_code)
    .fetch_all(&mut *conn)
    .await?;

    if history.is_empty() {
        return Err(ApiError::not_found(format!(
            "No daily records found for crop {}",
            nfc_code
        )));
    }

    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDailyCrop {
    pub crop_stage: Option<CropStage>,
    pub stage_duration_day: Option<i32>,
}

/// PUT /crop-daily/update/:nfc_code - updates the crop's latest daily record.
/// A changed stage propagates to the parent crop.
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
    Json(body): Json<UpdateDailyCrop>,
) -> Result<Json<CropDaily>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let crop = active_owned_crop(&mut tx, &nfc_code, auth.user_id).await?;

    let latest = sqlx::query_as::<_, CropDaily>(
        "SELECT * FROM crop_daily WHERE nfc_code = $1 \
         ORDER BY record_created_date DESC LIMIT 1",
    )
    .bind(&nfc_code)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        ApiError::not_found(format!("No daily record found for crop {}", nfc_code))
    })?;

    let now = Utc::now();
    let new_stage = body.crop_stage.unwrap_or(latest.crop_stage);

    let updated = sqlx::query_as::<_, CropDaily>(
        "UPDATE crop_daily SET crop_stage = $1, stage_duration_day = $2, \
         record_updated_date = $3 WHERE daily_id = $4 RETURNING *",
    )
    .bind(new_stage)
    .bind(body.stage_duration_day.or(latest.stage_duration_day))
    .bind(now)
    .bind(latest.daily_id)
    .fetch_one(&mut *tx)
    .await?;

    if body.crop_stage.is_some() {
        rules::propagate_crop_stage(&mut tx, crop.crop_id, crop.crop_stage, new_stage, now).await?;
    }

    tx.commit().await?;
    Ok(Json(updated))
}

/// DELETE /crop-daily/delete/:nfc_code - soft-deletes today's record; older
/// records are history and cannot be removed. When the deleted record was the
/// one the crop's stage reflects, the stage is recomputed from what remains.
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let crop = active_owned_crop(&mut tx, &nfc_code, auth.user_id).await?;

    let today = Utc::now().date_naive();
    let daily = sqlx::query_as::<_, CropDaily>(
        "SELECT * FROM crop_daily \
         WHERE nfc_code = $1 AND record_created_date::date = $2 AND crop_status <> 'deleted'",
    )
    .bind(&nfc_code)
    .bind(today)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| {
        ApiError::invalid_state("No daily record for today. Cannot delete previous records.")
    })?;

    let now = Utc::now();
    sqlx::query(
        "UPDATE crop_daily SET crop_status = 'deleted', record_updated_date = $1 \
         WHERE daily_id = $2",
    )
    .bind(now)
    .bind(daily.daily_id)
    .execute(&mut *tx)
    .await?;

    // Only recompute when the crop currently reflects the deleted record.
    if crop.crop_stage == Some(daily.crop_stage) {
        rules::recompute_crop_stage(&mut tx, crop.crop_id, &nfc_code, now).await?;
    }

    tx.commit().await?;

    Ok(Json(json!({
        "message": format!("Today's daily crop for NFC {} marked as deleted.", nfc_code)
    })))
}
