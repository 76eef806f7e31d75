use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::middleware::auth::jwt_auth_middleware;
use crate::state::AppState;

/// Builds the full application router. Everything except registration, login
/// and the health probes sits behind bearer-token auth.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(user_routes())
        .merge(
            protected_routes()
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    jwt_auth_middleware,
                )),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/users/register/", post(users::register))
        .route("/users/login/", post(users::login))
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .merge(farm_routes())
        .merge(farm_expect_routes())
        .merge(crop_routes())
        .merge(crop_daily_routes())
        .merge(activity_routes())
        .merge(method_routes())
        .merge(expense_routes())
        .merge(harvest_routes())
}

fn farm_routes() -> Router<AppState> {
    use handlers::farms;

    Router::new()
        .route("/farms/create", post(farms::create))
        .route("/farms/get/:farm_id", get(farms::get))
        .route("/farms/my-farms", get(farms::my_farms))
        .route("/farms/update/:farm_id", put(farms::update))
        .route("/farms/delete/:farm_id", delete(farms::delete))
}

fn farm_expect_routes() -> Router<AppState> {
    use handlers::farm_expect;

    Router::new()
        .route("/farm-expect/new/farm/:farm_id", post(farm_expect::create))
        .route("/farm-expect/:farm_id", get(farm_expect::get_latest))
        .route(
            "/farm-expect/:farm_id/expectations",
            get(farm_expect::get_all),
        )
        .route(
            "/farm-expect/delete/:farm_expect_id",
            delete(farm_expect::delete),
        )
}

fn crop_routes() -> Router<AppState> {
    use handlers::crops;

    Router::new()
        .route("/crops/new", post(crops::create))
        .route("/crops/get/:nfc_code", get(crops::get))
        .route("/crops/update-by-nfc/:nfc_code", put(crops::update))
        .route("/crops/delete-by-nfc/:nfc_code", delete(crops::delete))
}

fn crop_daily_routes() -> Router<AppState> {
    use handlers::crop_daily;

    Router::new()
        .route("/crop-daily/new", post(crop_daily::create))
        .route("/crop-daily/latest/:nfc_code", get(crop_daily::get_latest))
        .route("/crop-daily/history/:nfc_code", get(crop_daily::get_history))
        .route("/crop-daily/update/:nfc_code", put(crop_daily::update))
        .route("/crop-daily/delete/:nfc_code", delete(crop_daily::delete))
}

fn activity_routes() -> Router<AppState> {
    use handlers::activities;

    Router::new()
        .route("/activities/new", post(activities::create))
        .route("/activities/:activity_id", get(activities::get))
        .route("/activities/update/:activity_id", put(activities::update))
        .route("/activities/delete/:activity_id", delete(activities::delete))
}

fn method_routes() -> Router<AppState> {
    use handlers::methods;

    Router::new().route("/methods/", get(methods::list))
}

fn expense_routes() -> Router<AppState> {
    use handlers::expenses;

    Router::new()
        .route("/expenses/create/", post(expenses::create))
        .route("/expenses/readAll/:farm_id", get(expenses::list))
        .route("/expenses/readOne/:expense_id", get(expenses::get))
        .route("/expenses/:expense_id", put(expenses::update))
        .route("/expenses/del/:expense_id", delete(expenses::delete))
}

fn harvest_routes() -> Router<AppState> {
    use handlers::harvest;

    Router::new()
        .route("/harvest/new", post(harvest::create))
        .route("/harvest/:nfc_code", get(harvest::get_latest))
        .route("/harvest/:nfc_code/all", get(harvest::get_all))
        .route("/harvest/:nfc_code/:harvest_id", put(harvest::update))
        .route("/harvest/delete/:harvest_id", delete(harvest::delete))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "agritrack-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();

    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok",
            })),
        ),
        Err(e) => {
            tracing::warn!("health check database error: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable",
                })),
            )
        }
    }
}
