use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::guard;
use crate::middleware::auth::AuthUser;
use crate::models::Farm;
use crate::rules;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFarm {
    pub farm_abbrev: String,
    pub crop_type: String,
    pub farm_size: Decimal,
    pub farm_location: String,
}

/// POST /farms/create
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateFarm>,
) -> Result<(StatusCode, Json<Farm>), ApiError> {
    let farm = sqlx::query_as::<_, Farm>(
        "INSERT INTO farms (user_id, farm_abbrev, crop_type, farm_size, farm_location) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(auth.user_id)
    .bind(&body.farm_abbrev)
    .bind(&body.crop_type)
    .bind(body.farm_size)
    .bind(&body.farm_location)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(farm_id = farm.farm_id, user_id = auth.user_id, "created farm");
    Ok((StatusCode::CREATED, Json(farm)))
}

/// GET /farms/get/:farm_id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_id): Path<i32>,
) -> Result<Json<Farm>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    let farm = guard::owned_farm(&mut conn, farm_id, auth.user_id).await?;
    Ok(Json(farm))
}

/// GET /farms/my-farms - active farms belonging to the caller.
pub async fn my_farms(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Farm>>, ApiError> {
    let farms = sqlx::query_as::<_, Farm>(
        "SELECT * FROM farms WHERE user_id = $1 AND farm_is_active = TRUE",
    )
    .bind(auth.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(farms))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFarm {
    pub farm_abbrev: Option<String>,
    pub crop_type: Option<String>,
    pub farm_size: Option<Decimal>,
    pub farm_location: Option<String>,
}

/// PUT /farms/update/:farm_id - partial update. A changed abbreviation is
/// propagated to the farm's expectation rows in the same transaction.
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_id): Path<i32>,
    Json(body): Json<UpdateFarm>,
) -> Result<Json<Farm>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let farm = guard::owned_farm(&mut tx, farm_id, auth.user_id).await?;
    let now = Utc::now();

    let new_abbrev = body.farm_abbrev.clone().unwrap_or_else(|| farm.farm_abbrev.clone());
    let abbrev_changed = new_abbrev != farm.farm_abbrev;

    let updated = sqlx::query_as::<_, Farm>(
        "UPDATE farms SET farm_abbrev = $1, crop_type = $2, farm_size = $3, \
         farm_location = $4, record_updated_date = $5 WHERE farm_id = $6 RETURNING *",
    )
    .bind(&new_abbrev)
    .bind(body.crop_type.as_deref().unwrap_or(&farm.crop_type))
    .bind(body.farm_size.unwrap_or(farm.farm_size))
    .bind(body.farm_location.as_deref().unwrap_or(&farm.farm_location))
    .bind(now)
    .bind(farm_id)
    .fetch_one(&mut *tx)
    .await?;

    if abbrev_changed {
        rules::propagate_farm_abbrev(&mut tx, farm_id, &new_abbrev, now).await?;
    }

    tx.commit().await?;
    Ok(Json(updated))
}

/// DELETE /farms/delete/:farm_id - terminate the farm and soft-delete its
/// expectation records, atomically.
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    guard::owned_farm(&mut tx, farm_id, auth.user_id).await?;
    rules::terminate_farm_cascade(&mut tx, farm_id, Utc::now()).await?;

    tx.commit().await?;

    tracing::info!(farm_id, user_id = auth.user_id, "terminated farm");
    Ok(Json(json!({
        "message": format!(
            "Farm {} marked as terminated, and related expectations marked as deleted.",
            farm_id
        )
    })))
}
