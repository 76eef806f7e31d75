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
use crate::models::CropActivity;
use crate::state::AppState;

/// Resolve an activity and verify ownership through its farm.
async fn owned_activity(
    conn: &mut sqlx::PgConnection,
    activity_id: i32,
    user_id: i32,
) -> Result<CropActivity, ApiError> {
    let activity =
        sqlx::query_as::<_, CropActivity>("SELECT * FROM crop_activities WHERE activity_id = $1")
            .bind(activity_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| ApiError::not_found("Activity not found"))?;

    guard::require_farm_owner(conn, activity.farm_id, user_id).await?;
    Ok(activity)
}

#[derive(Debug, Deserialize)]
pub struct CreateActivity {
    pub farm_id: i32,
    pub nfc_code: Option<String>,
    pub activity_name: String,
    pub other_activity: Option<String>,
    pub activity_details: Option<String>,
}

/// POST /activities/new - log a farming action against a farm, optionally tied
/// to a specific crop. The NFC code, when given, must belong to that farm.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateActivity>,
) -> Result<(StatusCode, Json<CropActivity>), ApiError> {
    let mut tx = state.pool.begin().await?;

    let farm = guard::active_owned_farm(&mut tx, body.farm_id, auth.user_id).await?;

    let crop_id = match &body.nfc_code {
        Some(nfc_code) => {
            let crop_id: Option<i32> = sqlx::query_scalar(
                "SELECT crop_id FROM crops WHERE nfc_code = $1 AND farm_id = $2",
            )
            .bind(nfc_code)
            .bind(farm.farm_id)
            .fetch_optional(&mut *tx)
            .await?;

            Some(crop_id.ok_or_else(|| {
                ApiError::not_found("NFC code does not belong to this farm.")
            })?)
        }
        None => None,
    };

    let activity = sqlx::query_as::<_, CropActivity>(
        "INSERT INTO crop_activities \
         (farm_id, crop_id, nfc_code, activity_name, other_activity, activity_details, \
          record_created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(farm.farm_id)
    .bind(crop_id)
    .bind(&body.nfc_code)
    .bind(&body.activity_name)
    .bind(&body.other_activity)
    .bind(&body.activity_details)
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// GET /activities/:activity_id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(activity_id): Path<i32>,
) -> Result<Json<CropActivity>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    let activity = owned_activity(&mut conn, activity_id, auth.user_id).await?;
    Ok(Json(activity))
}

#[derive(Debug, Deserialize)]
pub struct UpdateActivity {
    pub activity_name: Option<String>,
    pub other_activity: Option<String>,
    pub activity_details: Option<String>,
}

/// PUT /activities/update/:activity_id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(activity_id): Path<i32>,
    Json(body): Json<UpdateActivity>,
) -> Result<Json<CropActivity>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let activity = owned_activity(&mut tx, activity_id, auth.user_id).await?;

    let updated = sqlx::query_as::<_, CropActivity>(
        "UPDATE crop_activities SET activity_name = $1, other_activity = $2, \
         activity_details = $3, record_updated_date = $4 WHERE activity_id = $5 RETURNING *",
    )
    .bind(body.activity_name.as_deref().unwrap_or(&activity.activity_name))
    .bind(body.other_activity.as_deref().or(activity.other_activity.as_deref()))
    .bind(body.activity_details.as_deref().or(activity.activity_details.as_deref()))
    .bind(Utc::now())
    .bind(activity_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(updated))
}

/// DELETE /activities/delete/:activity_id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(activity_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    owned_activity(&mut tx, activity_id, auth.user_id).await?;

    sqlx::query(
        "UPDATE crop_activities SET record_status = 'deleted', record_updated_date = $1 \
         WHERE activity_id = $2",
    )
    .bind(Utc::now())
    .bind(activity_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(json!({ "message": "Activity deleted successfully." })))
}
