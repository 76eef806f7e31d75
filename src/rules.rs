//! Derived-state maintenance rules.
//!
//! Each rule runs on the caller's open transaction so the triggering write and
//! the derived-field update commit or roll back together. Rules recompute from
//! the source set rather than patching incrementally, which keeps them
//! idempotent under retry.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::error::ApiError;
use crate::models::CropStage;

/// Rule 1: `crops.last_harvest_date` mirrors the most recent *active* harvest.
///
/// Sets the cache to `MAX(harvest_date)` over the crop's active harvests (NULL
/// when none remain) and bumps `crop_modified_date` only when the value
/// actually changed. Invoked after harvest create, after update when the date
/// changed, and after soft delete.
pub async fn sync_last_harvest_date(
    conn: &mut PgConnection,
    crop_id: i32,
    nfc_code: &str,
    now: DateTime<Utc>,
) -> Result<Option<NaiveDate>, ApiError> {
    let latest: Option<NaiveDate> = sqlx::query_scalar(
        "SELECT (MAX(harvest_date))::date FROM harvest \
         WHERE nfc_code = $1 AND record_status = 'active'",
    )
    .bind(nfc_code)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE crops SET last_harvest_date = $1, crop_modified_date = $2 \
         WHERE crop_id = $3 AND last_harvest_date IS DISTINCT FROM $1",
    )
    .bind(latest)
    .bind(now)
    .bind(crop_id)
    .execute(&mut *conn)
    .await?;

    Ok(latest)
}

/// Rule 2a: a daily record's submitted stage overwrites the parent crop's
/// stage when it differs.
pub async fn propagate_crop_stage(
    conn: &mut PgConnection,
    crop_id: i32,
    current_stage: Option<CropStage>,
    submitted_stage: CropStage,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if current_stage == Some(submitted_stage) {
        return Ok(());
    }

    sqlx::query("UPDATE crops SET crop_stage = $1, crop_modified_date = $2 WHERE crop_id = $3")
        .bind(submitted_stage)
        .bind(now)
        .bind(crop_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Rule 2b: after soft-deleting the daily record the crop currently reflects,
/// adopt the stage of the newest remaining non-deleted record, or NULL when
/// none remain.
pub async fn recompute_crop_stage(
    conn: &mut PgConnection,
    crop_id: i32,
    nfc_code: &str,
    now: DateTime<Utc>,
) -> Result<Option<CropStage>, ApiError> {
    let latest: Option<CropStage> = sqlx::query_scalar(
        "SELECT crop_stage FROM crop_daily \
         WHERE nfc_code = $1 AND crop_status <> 'deleted' \
         ORDER BY record_created_date DESC LIMIT 1",
    )
    .bind(nfc_code)
    .fetch_optional(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE crops SET crop_stage = $1, crop_modified_date = $2 \
         WHERE crop_id = $3 AND crop_stage IS DISTINCT FROM $1",
    )
    .bind(latest)
    .bind(now)
    .bind(crop_id)
    .execute(&mut *conn)
    .await?;

    Ok(latest)
}

/// Rule 3a: an ad-hoc "other" planting method becomes a user-owned method row,
/// created before the crop write so its id can be referenced.
pub async fn create_other_method(
    conn: &mut PgConnection,
    other_method: &str,
    user_id: i32,
) -> Result<i32, ApiError> {
    let method_id: i32 = sqlx::query_scalar(
        "INSERT INTO plant_method (method, other_method, record_created_by, record_status) \
         VALUES ($1, $1, $2, 'active') RETURNING plant_method_id",
    )
    .bind(other_method)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(method_id)
}

/// Rule 3b: after soft-deleting a crop, reap its method when no other active
/// crop still references it.
pub async fn reap_orphaned_method(
    conn: &mut PgConnection,
    method_id: i32,
    deleted_nfc_code: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let still_referenced: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM crops \
         WHERE method_id = $1 AND crop_is_active = TRUE AND nfc_code <> $2",
    )
    .bind(method_id)
    .bind(deleted_nfc_code)
    .fetch_one(&mut *conn)
    .await?;

    if still_referenced == 0 {
        sqlx::query(
            "UPDATE plant_method SET record_status = 'deleted', record_updated_date = $1 \
             WHERE plant_method_id = $2",
        )
        .bind(now)
        .bind(method_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Rule 4: terminating a farm soft-deletes its expectation rows, stamping the
/// same `record_updated_date` on farm and expectations.
pub async fn terminate_farm_cascade(
    conn: &mut PgConnection,
    farm_id: i32,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE farms SET farm_is_active = FALSE, farm_status = 'terminated', \
         record_updated_date = $1 WHERE farm_id = $2",
    )
    .bind(now)
    .bind(farm_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE farm_expect SET record_status = 'deleted', record_updated_date = $1 \
         WHERE farm_id = $2 AND record_status <> 'deleted'",
    )
    .bind(now)
    .bind(farm_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rule 5: a changed farm abbreviation is copied onto the farm's expectation
/// rows (denormalized field), stamped with the same update timestamp.
pub async fn propagate_farm_abbrev(
    conn: &mut PgConnection,
    farm_id: i32,
    farm_abbrev: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE farm_expect SET farm_abbrev = $1, record_updated_date = $2 WHERE farm_id = $3",
    )
    .bind(farm_abbrev)
    .bind(now)
    .bind(farm_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Crop age in years with two decimal places, from plantation date to the
/// reference date. Whole-month resolution, matching the forecast granularity
/// the records were designed around.
pub fn crop_years(plantation_date: NaiveDate, as_of: NaiveDate) -> Decimal {
    let mut months = (as_of.year() - plantation_date.year()) * 12
        + (as_of.month() as i32 - plantation_date.month() as i32);
    if as_of.day() < plantation_date.day() {
        months -= 1;
    }
    let months = months.max(0);

    (Decimal::from(months) / Decimal::from(12)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn crop_years_whole_years() {
        assert_eq!(crop_years(d(2023, 4, 1), d(2025, 4, 1)), Decimal::new(2, 0));
    }

    #[test]
    fn crop_years_partial_year_rounds_to_two_places() {
        // 7 months = 0.5833... -> 0.58
        assert_eq!(crop_years(d(2024, 9, 1), d(2025, 4, 1)), Decimal::new(58, 2));
    }

    #[test]
    fn crop_years_day_of_month_not_yet_reached() {
        // one day short of a full month
        assert_eq!(crop_years(d(2025, 3, 15), d(2025, 4, 14)), Decimal::ZERO);
        assert_eq!(
            crop_years(d(2025, 3, 15), d(2025, 4, 15)),
            Decimal::new(8, 2)
        );
    }

    #[test]
    fn crop_years_never_negative() {
        assert_eq!(crop_years(d(2025, 6, 1), d(2025, 4, 1)), Decimal::ZERO);
    }
}
