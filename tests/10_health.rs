mod common;

use anyhow::Result;
use axum::http::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = common::offline_app();

    // OK with a live database, SERVICE_UNAVAILABLE without one; both prove
    // the probe answers.
    let response = common::send(&app, "GET", "/health", None, None).await?;
    assert!(
        response.status() == StatusCode::OK
            || response.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        response.status()
    );

    let body = common::body_json(response).await?;
    assert!(body["status"].is_string());
    Ok(())
}

#[tokio::test]
async fn root_reports_name_and_version() -> Result<()> {
    let app = common::offline_app();

    let response = common::send(&app, "GET", "/", None, None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await?;
    assert_eq!(body["name"], "agritrack-api");
    assert!(body["version"].is_string());
    Ok(())
}
