// Relational entities. Foreign keys are plain id fields; lookups go through
// `guard` and the per-entity queries in the handlers, never an object graph.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "farm_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FarmStatus {
    Active,
    Inactive,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "expect_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpectStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "crop_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CropStatus {
    Active,
    Inactive,
    Terminated,
}

/// Ordered growth phases. Ordering is informational only; no transition rules
/// are enforced between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "crop_stage", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CropStage {
    Sprouting,
    Growing,
    Flowering,
    Fruiting,
    Harvest,
    #[sqlx(rename = "post-harvest")]
    #[serde(rename = "post-harvest")]
    PostHarvest,
}

/// Daily records carry their own status set, distinct from `CropStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "daily_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DailyStatus {
    Active,
    Deleted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "method_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MethodStatus {
    Active,
    Inactive,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "record_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "harvest_unit", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HarvestUnit {
    Kg,
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "harvest_quality", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HarvestQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: String,
    pub registered_date: DateTime<Utc>,
    pub last_login_date: Option<DateTime<Utc>>,
    pub user_status: UserStatus,
    pub user_is_active: bool,
}

/// Immutable audit record of a successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Login {
    pub login_id: i32,
    pub user_id: i32,
    pub login_timestamp: DateTime<Utc>,
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Farm {
    pub farm_id: i32,
    pub user_id: i32,
    pub farm_abbrev: String,
    pub crop_type: String,
    pub farm_size: Decimal,
    pub farm_location: String,
    pub farm_status: FarmStatus,
    pub farm_is_active: bool,
    pub record_created_date: DateTime<Utc>,
    pub record_updated_date: Option<DateTime<Utc>>,
}

/// Forecast record. Append-only history: rows are created and soft-deleted,
/// never updated, so past forecasts stay intact.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FarmExpect {
    pub farm_expect_id: i32,
    pub farm_id: i32,
    pub farm_abbrev: String,
    pub expected_harvest_date: NaiveDate,
    pub expected_harvest_base_uom: Decimal,
    pub expected_income: Decimal,
    pub record_status: ExpectStatus,
    pub record_created_date: DateTime<Utc>,
    pub record_updated_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CropDtl {
    pub crop_id: i32,
    pub farm_id: i32,
    pub nfc_code: String,
    pub farm_abbrev: String,
    pub crop_type: String,
    pub crop_subtype: Option<String>,
    pub plantation_date: NaiveDate,
    pub method_id: i32,
    pub crop_yrs: Decimal,
    pub crop_stage: Option<CropStage>,
    /// Derived cache: date of the most recent active harvest, or None.
    pub last_harvest_date: Option<NaiveDate>,
    pub record_created_date: DateTime<Utc>,
    pub crop_modified_date: Option<DateTime<Utc>>,
    pub crop_status: CropStatus,
    pub crop_is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CropDaily {
    pub daily_id: i32,
    pub crop_id: i32,
    pub nfc_code: String,
    pub crop_stage: CropStage,
    pub stage_duration_day: Option<i32>,
    pub crop_status: DailyStatus,
    pub record_created_date: DateTime<Utc>,
    pub record_updated_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CropActivity {
    pub activity_id: i32,
    pub farm_id: i32,
    pub crop_id: Option<i32>,
    pub nfc_code: Option<String>,
    pub activity_name: String,
    pub other_activity: Option<String>,
    pub activity_details: Option<String>,
    pub record_created_by: i32,
    pub record_created_date: DateTime<Utc>,
    pub record_updated_date: Option<DateTime<Utc>>,
    pub record_status: RecordStatus,
}

/// Planting method. A NULL `record_created_by` marks a global method usable by
/// anyone; a non-NULL creator restricts the method to that user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlantMethod {
    pub plant_method_id: i32,
    pub method: String,
    pub other_method: Option<String>,
    pub record_created_by: Option<i32>,
    pub record_status: MethodStatus,
    pub record_created_date: DateTime<Utc>,
    pub record_updated_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub expenses_id: i32,
    pub farm_id: i32,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
    pub record_status: RecordStatus,
    pub record_created_date: DateTime<Utc>,
    pub record_updated_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Harvest {
    pub harvest_id: i32,
    pub crop_id: i32,
    pub farm_id: i32,
    pub nfc_code: String,
    pub quantity: Decimal,
    pub harvest_unit: HarvestUnit,
    pub estimated_kg: Option<Decimal>,
    pub harvest_avg_quality: HarvestQuality,
    pub earn: Decimal,
    pub harvest_date: DateTime<Utc>,
    pub record_status: RecordStatus,
    pub record_created_date: DateTime<Utc>,
    pub record_updated_date: Option<DateTime<Utc>>,
}
