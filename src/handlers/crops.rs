use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::guard;
use crate::middleware::auth::AuthUser;
use crate::models::{CropDtl, Farm};
use crate::rules;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCrop {
    pub nfc_code: String,
    pub farm_abbrev: String,
    pub crop_type: String,
    pub crop_subtype: Option<String>,
    pub plantation_date: NaiveDate,
    pub method_id: Option<i32>,
    pub other_method: Option<String>,
    pub last_harvest_date: Option<NaiveDate>,
}

/// POST /crops/new
///
/// The NFC code is the crop's natural key; duplicates are rejected. The farm
/// is resolved by abbreviation within the caller's active farms. A free-text
/// `other_method` becomes a new user-owned planting method before the crop row
/// references it.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateCrop>,
) -> Result<(StatusCode, Json<CropDtl>), ApiError> {
    let mut tx = state.pool.begin().await?;

    let existing: Option<i32> = sqlx::query_scalar("SELECT crop_id FROM crops WHERE nfc_code = $1")
        .bind(&body.nfc_code)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "NFC code already exists, cannot create duplicate crop.",
        ));
    }

    let farm = sqlx::query_as::<_, Farm>(
        "SELECT * FROM farms WHERE farm_abbrev = $1 AND user_id = $2 AND farm_is_active = TRUE",
    )
    .bind(&body.farm_abbrev)
    .bind(auth.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Farm not found or not authorized."))?;

    let method_id = match &body.other_method {
        Some(other) if !other.is_empty() => {
            rules::create_other_method(&mut tx, other, auth.user_id).await?
        }
        _ => {
            let method_id = body.method_id.ok_or_else(|| {
                ApiError::validation_error("Either method_id or other_method is required")
            })?;
            guard::attachable_method(&mut tx, method_id, auth.user_id).await?;
            method_id
        }
    };

    let crop_yrs = rules::crop_years(body.plantation_date, Utc::now().date_naive());

    let crop = sqlx::query_as::<_, CropDtl>(
        "INSERT INTO crops \
         (farm_id, nfc_code, farm_abbrev, crop_type, crop_subtype, plantation_date, \
          method_id, crop_yrs, last_harvest_date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(farm.farm_id)
    .bind(&body.nfc_code)
    .bind(&body.farm_abbrev)
    .bind(&body.crop_type)
    .bind(&body.crop_subtype)
    .bind(body.plantation_date)
    .bind(method_id)
    .bind(crop_yrs)
    .bind(body.last_harvest_date)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(crop_id = crop.crop_id, nfc_code = %crop.nfc_code, "created crop");
    Ok((StatusCode::CREATED, Json(crop)))
}

/// GET /crops/get/:nfc_code
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
) -> Result<Json<CropDtl>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    let crop = guard::owned_crop(&mut conn, &nfc_code, auth.user_id).await?;
    Ok(Json(crop))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCrop {
    pub method_id: Option<i32>,
    pub other_method: Option<String>,
    pub crop_subtype: Option<String>,
    pub plantation_date: Option<NaiveDate>,
    pub last_harvest_date: Option<NaiveDate>,
}

/// PUT /crops/update-by-nfc/:nfc_code - partial update. Method changes go
/// through the attach guard; a changed plantation date recomputes the crop's
/// age.
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
    Json(body): Json<UpdateCrop>,
) -> Result<Json<CropDtl>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let crop = guard::owned_crop(&mut tx, &nfc_code, auth.user_id).await?;

    let method_id = match &body.other_method {
        Some(other) if !other.is_empty() => {
            rules::create_other_method(&mut tx, other, auth.user_id).await?
        }
        _ => match body.method_id {
            Some(method_id) => {
                guard::attachable_method(&mut tx, method_id, auth.user_id).await?;
                method_id
            }
            None => crop.method_id,
        },
    };

    let plantation_date = body.plantation_date.unwrap_or(crop.plantation_date);
    let crop_yrs = if body.plantation_date.is_some() {
        rules::crop_years(plantation_date, Utc::now().date_naive())
    } else {
        crop.crop_yrs
    };

    let updated = sqlx::query_as::<_, CropDtl>(
        "UPDATE crops SET method_id = $1, crop_subtype = $2, plantation_date = $3, \
         crop_yrs = $4, last_harvest_date = $5, crop_modified_date = $6 \
         WHERE crop_id = $7 RETURNING *",
    )
    .bind(method_id)
    .bind(body.crop_subtype.as_deref().or(crop.crop_subtype.as_deref()))
    .bind(plantation_date)
    .bind(crop_yrs)
    .bind(body.last_harvest_date.or(crop.last_harvest_date))
    .bind(Utc::now())
    .bind(crop.crop_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(updated))
}

/// DELETE /crops/delete-by-nfc/:nfc_code - terminate the crop; a user-created
/// method with no remaining active crop referencing it is reaped.
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(nfc_code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let crop = guard::owned_crop(&mut tx, &nfc_code, auth.user_id).await?;
    let now = Utc::now();

    sqlx::query(
        "UPDATE crops SET crop_is_active = FALSE, crop_status = 'terminated', \
         crop_modified_date = $1 WHERE crop_id = $2",
    )
    .bind(now)
    .bind(crop.crop_id)
    .execute(&mut *tx)
    .await?;

    rules::reap_orphaned_method(&mut tx, crop.method_id, &nfc_code, now).await?;

    tx.commit().await?;

    tracing::info!(crop_id = crop.crop_id, nfc_code = %nfc_code, "soft deleted crop");
    Ok(Json(json!({ "message": "Crop has been soft deleted successfully." })))
}
