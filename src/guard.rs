//! Ownership and state checks, resolved through id-based lookups.
//!
//! Entities either carry `user_id` directly (farms) or reach their owner
//! through the farm chain (crop -> farm, expense -> farm, ...). A missing
//! entity or a broken link is `NotFound`; an existing entity owned by someone
//! else is `Forbidden`; a state precondition failure is `InvalidState`.

use sqlx::PgConnection;

use crate::error::ApiError;
use crate::models::{CropDtl, Farm, PlantMethod};

pub async fn farm_by_id(conn: &mut PgConnection, farm_id: i32) -> Result<Farm, ApiError> {
    sqlx::query_as::<_, Farm>("SELECT * FROM farms WHERE farm_id = $1")
        .bind(farm_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Farm not found"))
}

/// Resolve a farm and require the given user to own it.
pub async fn owned_farm(
    conn: &mut PgConnection,
    farm_id: i32,
    user_id: i32,
) -> Result<Farm, ApiError> {
    let farm = farm_by_id(conn, farm_id).await?;
    if farm.user_id != user_id {
        return Err(ApiError::forbidden("You do not own this farm"));
    }
    Ok(farm)
}

/// Like [`owned_farm`], but the farm must also be active. Used wherever new
/// child records are attached to a farm.
pub async fn active_owned_farm(
    conn: &mut PgConnection,
    farm_id: i32,
    user_id: i32,
) -> Result<Farm, ApiError> {
    let farm = owned_farm(conn, farm_id, user_id).await?;
    if !farm.farm_is_active {
        return Err(ApiError::invalid_state(
            "Farm is not active or has been terminated",
        ));
    }
    Ok(farm)
}

pub async fn crop_by_nfc(conn: &mut PgConnection, nfc_code: &str) -> Result<CropDtl, ApiError> {
    sqlx::query_as::<_, CropDtl>("SELECT * FROM crops WHERE nfc_code = $1")
        .bind(nfc_code)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Crop not found"))
}

/// Resolve a crop by NFC code and walk the farm chain to verify ownership.
pub async fn owned_crop(
    conn: &mut PgConnection,
    nfc_code: &str,
    user_id: i32,
) -> Result<CropDtl, ApiError> {
    let crop = crop_by_nfc(conn, nfc_code).await?;
    require_farm_owner(conn, crop.farm_id, user_id).await?;
    Ok(crop)
}

/// Verify the user owns the given farm without returning it. Shared by the
/// child-entity chains (expense/harvest/activity/expectation -> farm).
pub async fn require_farm_owner(
    conn: &mut PgConnection,
    farm_id: i32,
    user_id: i32,
) -> Result<(), ApiError> {
    let owner: Option<i32> = sqlx::query_scalar("SELECT user_id FROM farms WHERE farm_id = $1")
        .bind(farm_id)
        .fetch_optional(&mut *conn)
        .await?;

    match owner {
        None => Err(ApiError::not_found("Farm not found")),
        Some(owner) if owner != user_id => {
            Err(ApiError::forbidden("You do not own this resource"))
        }
        Some(_) => Ok(()),
    }
}

/// Check that a method exists and may be attached to a crop by this user:
/// global methods (no creator) are open to everyone, private methods only to
/// their creator.
pub async fn attachable_method(
    conn: &mut PgConnection,
    method_id: i32,
    user_id: i32,
) -> Result<PlantMethod, ApiError> {
    let method =
        sqlx::query_as::<_, PlantMethod>("SELECT * FROM plant_method WHERE plant_method_id = $1")
            .bind(method_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| ApiError::not_found("Method not found"))?;

    match method.record_created_by {
        Some(creator) if creator != user_id => {
            Err(ApiError::forbidden("You are not authorized to use this method"))
        }
        _ => Ok(method),
    }
}
