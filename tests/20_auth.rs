mod common;

use anyhow::Result;
use axum::http::{header, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn protected_routes_require_token() -> Result<()> {
    let app = common::offline_app();

    for (method, path) in [
        ("GET", "/farms/my-farms"),
        ("POST", "/crops/new"),
        ("GET", "/methods/"),
        ("DELETE", "/harvest/delete/1"),
    ] {
        let response = common::send(&app, method, path, None, None).await?;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should reject missing token",
            method,
            path
        );
        assert_eq!(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
    }
    Ok(())
}

#[tokio::test]
async fn garbage_token_is_rejected() -> Result<()> {
    let app = common::offline_app();

    let response = common::send(
        &app,
        "GET",
        "/farms/my-farms",
        Some("not.a.jwt"),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = common::body_json(response).await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() -> Result<()> {
    let app = common::offline_app();

    let response = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/farms/my-farms")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn weak_registration_password_fails_before_persistence() -> Result<()> {
    let app = common::offline_app();

    // The offline pool cannot serve queries, so a 400 here proves the policy
    // check runs before any database work.
    let body = common::expect_json(
        &app,
        "POST",
        "/users/register/",
        None,
        Some(json!({
            "first_name": "Ada",
            "last_name": "Farmer",
            "email": "ada@example.com",
            "phone_number": "555-0100",
            "password": "weak",
        })),
        StatusCode::BAD_REQUEST,
    )
    .await?;

    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}
