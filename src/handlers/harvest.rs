use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::guard;
use crate::middleware::auth::AuthUser;
use crate::models::{CropStatus, Harvest, HarvestQuality, HarvestUnit, RecordStatus};
use crate::rules;
use crate::state::AppState;

/// Rewrites only the missing-crop case; infrastructure errors (500/503) pass
/// through untouched.
fn crop_lookup_error(err: ApiError) -> ApiError {
    match err {
        ApiError::NotFound(_) => ApiError::not_found("Crop with this NFC code not found"),
        other => other,
    }
}

/// Discrete-unit harvests must carry a non-zero weight estimate so quantities
/// stay comparable across units.
fn validate_unit_estimate(
    unit: HarvestUnit,
    estimated_kg: Option<Decimal>,
) -> Result<(), ApiError> {
    if unit == HarvestUnit::Unit && estimated_kg.map_or(true, |kg| kg.is_zero()) {
        return Err(ApiError::validation_error(
            "estimated_kg must be provided and non-zero when harvest_unit is 'unit'",
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateHarvest {
    pub nfc_code: String,
    pub quantity: Decimal,
    pub harvest_unit: HarvestUnit,
    pub estimated_kg: Option<Decimal>,
    pub harvest_avg_quality: HarvestQuality,
    pub earn: Decimal,
    pub harvest_date: DateTime<Utc>,
}

/// POST /harvest/new
///
/// One harvest event per NFC code per calendar day. The crop's
/// `last_harvest_date` cache is brought in sync within the same transaction.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateHarvest>,
) -> Result<(StatusCode, Json<Harvest>), ApiError> {
    validate_unit_estimate(body.harvest_unit, body.estimated_kg)?;

    let mut tx = state.pool.begin().await?;

    let crop = guard::crop_by_nfc(&mut tx, &body.nfc_code)
        .await
        .map_err(crop_lookup_error)?;
    if crop.crop_status != CropStatus::Active {
        return Err(ApiError::invalid_state("Crop is not active"));
    }
    guard::require_farm_owner(&mut tx, crop.farm_id, auth.user_id).await?;

    let same_day: Option<i32> = sqlx::query_scalar(
        "SELECT harvest_id FROM harvest \
         WHERE nfc_code = $1 AND harvest_date::date = $2 AND record_status = 'active'",
    )
    .bind(&body.nfc_code)
    .bind(body.harvest_date.date_naive())
    .fetch_optional(&mut *tx)
    .await?;
    if same_day.is_some() {
        return Err(ApiError::conflict(
            "Harvest already exists for this crop today",
        ));
    }

    let harvest = sqlx::query_as::<_, Harvest>(
        "INSERT INTO harvest \
         (crop_id, farm_id, nfc_code, quantity, harvest_unit, estimated_kg, \
          harvest_avg_quality, earn, harvest_date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(crop.crop_id)
    .bind(crop.farm_id)
    .bind(&body.nfc_code)
    .bind(body.quantity)
    .bind(body.harvest_unit)
    .bind(body.estimated_kg)
    .bind(body.harvest_avg_quality)
    .bind(body.earn)
    .bind(body.harvest_date)
    .fetch_one(&mut *tx)
    .await?;

    rules::sync_last_harvest_date(&mut tx, crop.crop_id, &body.nfc_code, Utc::now()).await?;

    tx.commit().await?;

    tracing::info!(harvest_id = harvest.harvest_id, nfc_code = %body.nfc_code, "recorded harvest");
    Ok((StatusCode::CREATED, Json(harvest)))
}

/// GET /harvest/:nfc_code - most recent active harvest for the crop.
pub async fn get_latest(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
) -> Result<Json<Harvest>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    guard::owned_crop(&mut conn, &nfc_code, auth.user_id).await?;

    let latest = sqlx::query_as::<_, Harvest>(
        "SELECT * FROM harvest WHERE nfc_code = $1 AND record_status = 'active' \
         ORDER BY harvest_date DESC LIMIT 1",
    )
    .bind(&nfc_code)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found("No active harvest record found"))?;

    Ok(Json(latest))
}

/// GET /harvest/:nfc_code/all - every active harvest for the crop, newest
/// entry first.
pub async fn get_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
) -> Result<Json<Vec<Harvest>>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    guard::owned_crop(&mut conn, &nfc_code, auth.user_id).await?;

    let harvests = sqlx::query_as::<_, Harvest>(
        "SELECT * FROM harvest WHERE nfc_code = $1 AND record_status = 'active' \
         ORDER BY record_created_date DESC",
    )
    .bind(&nfc_code)
    .fetch_all(&mut *conn)
    .await?;

    if harvests.is_empty() {
        return Err(ApiError::not_found(
            "No active harvest records found for this NFC code",
        ));
    }

    Ok(Json(harvests))
}

#[derive(Debug, Deserialize)]
pub struct UpdateHarvest {
    pub quantity: Option<Decimal>,
    pub harvest_unit: Option<HarvestUnit>,
    pub estimated_kg: Option<Decimal>,
    pub harvest_avg_quality: Option<HarvestQuality>,
    pub earn: Option<Decimal>,
    pub harvest_date: Option<DateTime<Utc>>,
}

/// PUT /harvest/:nfc_code/:harvest_id - partial update. A changed harvest date
/// triggers a full recompute of the crop's `last_harvest_date`.
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((nfc_code, harvest_id)): Path<(String, i32)>,
    Json(body): Json<UpdateHarvest>,
) -> Result<Json<Harvest>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let crop = guard::owned_crop(&mut tx, &nfc_code, auth.user_id).await?;
    if crop.crop_status != CropStatus::Active {
        return Err(ApiError::not_found("Active crop not found"));
    }

    let harvest = sqlx::query_as::<_, Harvest>(
        "SELECT * FROM harvest \
         WHERE harvest_id = $1 AND nfc_code = $2 AND farm_id = $3 AND record_status = 'active'",
    )
    .bind(harvest_id)
    .bind(&nfc_code)
    .bind(crop.farm_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Harvest record not found"))?;

    let unit = body.harvest_unit.unwrap_or(harvest.harvest_unit);
    let estimated_kg = body.estimated_kg.or(harvest.estimated_kg);
    validate_unit_estimate(unit, estimated_kg)?;

    let now = Utc::now();
    let new_date = body.harvest_date.unwrap_or(harvest.harvest_date);
    let date_changed = new_date != harvest.harvest_date;

    let updated = sqlx::query_as::<_, Harvest>(
        "UPDATE harvest SET quantity = $1, harvest_unit = $2, estimated_kg = $3, \
         harvest_avg_quality = $4, earn = $5, harvest_date = $6, record_updated_date = $7 \
         WHERE harvest_id = $8 RETURNING *",
    )
    .bind(body.quantity.unwrap_or(harvest.quantity))
    .bind(unit)
    .bind(estimated_kg)
    .bind(body.harvest_avg_quality.unwrap_or(harvest.harvest_avg_quality))
    .bind(body.earn.unwrap_or(harvest.earn))
    .bind(new_date)
    .bind(now)
    .bind(harvest_id)
    .fetch_one(&mut *tx)
    .await?;

    if date_changed {
        rules::sync_last_harvest_date(&mut tx, crop.crop_id, &nfc_code, now).await?;
    }

    tx.commit().await?;
    Ok(Json(updated))
}

/// DELETE /harvest/delete/:harvest_id
///
/// Idempotent: deleting an already-deleted record returns the confirmation
/// without touching derived state. Otherwise the crop's `last_harvest_date`
/// is recomputed from the remaining active set.
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(harvest_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let harvest = sqlx::query_as::<_, Harvest>("SELECT * FROM harvest WHERE harvest_id = $1")
        .bind(harvest_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Harvest record not found"))?;

    if harvest.record_status == RecordStatus::Deleted {
        return Ok(Json(json!({
            "message": format!("Harvest record {} is already marked as deleted.", harvest_id)
        })));
    }

    guard::require_farm_owner(&mut tx, harvest.farm_id, auth.user_id).await?;
    let crop = guard::crop_by_nfc(&mut tx, &harvest.nfc_code).await?;

    let now = Utc::now();
    sqlx::query(
        "UPDATE harvest SET record_status = 'deleted', record_updated_date = $1 \
         WHERE harvest_id = $2",
    )
    .bind(now)
    .bind(harvest_id)
    .execute(&mut *tx)
    .await?;

    let last_harvest_date =
        rules::sync_last_harvest_date(&mut tx, crop.crop_id, &harvest.nfc_code, now).await?;

    tx.commit().await?;

    Ok(Json(json!({
        "message": format!("Harvest record {} marked as deleted.", harvest_id),
        "last_harvest_date": last_harvest_date,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_harvest_requires_estimate() {
        assert!(validate_unit_estimate(HarvestUnit::Unit, None).is_err());
        assert!(validate_unit_estimate(HarvestUnit::Unit, Some(Decimal::ZERO)).is_err());
        assert!(validate_unit_estimate(HarvestUnit::Unit, Some(Decimal::new(25, 1))).is_ok());
    }

    #[test]
    fn kg_harvest_needs_no_estimate() {
        assert!(validate_unit_estimate(HarvestUnit::Kg, None).is_ok());
    }

    #[test]
    fn crop_lookup_rewrites_only_not_found() {
        let err = crop_lookup_error(ApiError::not_found("Crop not found"));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.message(), "Crop with this NFC code not found");

        let err = crop_lookup_error(ApiError::internal_server_error("db down"));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "db down");

        let err = crop_lookup_error(ApiError::service_unavailable("pool closed"));
        assert_eq!(err.status_code(), 503);
    }
}
