use axum::{
    extract::{Path, Query, State},
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
use crate::models::Expense;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateExpense {
    pub farm_id: i32,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
}

/// POST /expenses/create/
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateExpense>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let mut conn = state.pool.acquire().await?;
    guard::owned_farm(&mut conn, body.farm_id, auth.user_id).await?;

    let expense = sqlx::query_as::<_, Expense>(
        "INSERT INTO expenses (farm_id, category, description, amount, transaction_date) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(body.farm_id)
    .bind(&body.category)
    .bind(&body.description)
    .bind(body.amount)
    .bind(body.transaction_date)
    .fetch_one(&mut *conn)
    .await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
}

/// GET /expenses/readAll/:farm_id - active expenses for one of the caller's
/// farms, paginated.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(farm_id): Path<i32>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    guard::owned_farm(&mut conn, farm_id, auth.user_id).await?;

    let expenses = sqlx::query_as::<_, Expense>(
        "SELECT * FROM expenses WHERE farm_id = $1 AND record_status = 'active' \
         ORDER BY transaction_date DESC OFFSET $2 LIMIT $3",
    )
    .bind(farm_id)
    .bind(page.skip.max(0))
    .bind(page.limit.unwrap_or(100).clamp(1, 100))
    .fetch_all(&mut *conn)
    .await?;

    Ok(Json(expenses))
}

/// Resolve an active expense and verify ownership through its farm.
async fn owned_expense(
    conn: &mut sqlx::PgConnection,
    expense_id: i32,
    user_id: i32,
) -> Result<Expense, ApiError> {
    let expense = sqlx::query_as::<_, Expense>(
        "SELECT * FROM expenses WHERE expenses_id = $1 AND record_status = 'active'",
    )
    .bind(expense_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found("Expense not found"))?;

    guard::require_farm_owner(conn, expense.farm_id, user_id).await?;
    Ok(expense)
}

/// GET /expenses/readOne/:expense_id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(expense_id): Path<i32>,
) -> Result<Json<Expense>, ApiError> {
    let mut conn = state.pool.acquire().await?;
    let expense = owned_expense(&mut conn, expense_id, auth.user_id).await?;
    Ok(Json(expense))
}

#[derive(Debug, Deserialize)]
pub struct UpdateExpense {
    pub category: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub transaction_date: Option<NaiveDate>,
}

/// PUT /expenses/:expense_id - partial update.
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(expense_id): Path<i32>,
    Json(body): Json<UpdateExpense>,
) -> Result<Json<Expense>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let expense = owned_expense(&mut tx, expense_id, auth.user_id).await?;

    let updated = sqlx::query_as::<_, Expense>(
        "UPDATE expenses SET category = $1, description = $2, amount = $3, \
         transaction_date = $4, record_updated_date = $5 WHERE expenses_id = $6 RETURNING *",
    )
    .bind(body.category.as_deref().unwrap_or(&expense.category))
    .bind(body.description.as_deref().or(expense.description.as_deref()))
    .bind(body.amount.unwrap_or(expense.amount))
    .bind(body.transaction_date.unwrap_or(expense.transaction_date))
    .bind(Utc::now())
    .bind(expense_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(updated))
}

/// DELETE /expenses/del/:expense_id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(expense_id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.pool.begin().await?;

    owned_expense(&mut tx, expense_id, auth.user_id).await?;

    sqlx::query(
        "UPDATE expenses SET record_status = 'deleted', record_updated_date = $1 \
         WHERE expenses_id = $2",
    )
    .bind(Utc::now())
    .bind(expense_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(json!({ "detail": "Expense soft deleted successfully" })))
}
