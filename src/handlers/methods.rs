use axum::{extract::State, Extension, Json};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::models::PlantMethod;
use crate::state::AppState;

/// GET /methods/ - active planting methods visible to the caller: global
/// methods plus the caller's own, ordered by name.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<PlantMethod>>, ApiError> {
    let methods = sqlx::query_as::<_, PlantMethod>(
        "SELECT * FROM plant_method \
         WHERE record_status = 'active' \
           AND (record_created_by IS NULL OR record_created_by = $1) \
         ORDER BY method",
    )
    .bind(auth.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(methods))
}
