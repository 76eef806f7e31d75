mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

// Full lifecycle against a real database: register, login, farm, forecast,
// crop, daily records, harvest, expenses, activity, then teardown. Runs only
// when DATABASE_URL points at a Postgres instance.
#[tokio::test]
async fn full_record_keeping_flow() -> Result<()> {
    let Some(app) = common::db_app().await? else {
        return Ok(());
    };

    let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let email = format!("t{}@test.io", suffix % 1_000_000_000);
    let nfc_code = format!("NFC-{}", suffix % 1_000_000_000);
    let abbrev = format!("TF{}", suffix % 100_000);
    let password = "Str0ng!Pass";

    // --- registration and login ---

    let register_body = json!({
        "first_name": "Ada",
        "last_name": "Farmer",
        "email": email,
        "phone_number": "555-0100",
        "password": password,
    });
    let user = common::expect_json(
        &app,
        "POST",
        "/users/register/",
        None,
        Some(register_body.clone()),
        StatusCode::CREATED,
    )
    .await?;
    assert!(user.get("password_hash").is_none(), "hash must not leak");

    // Same email again is rejected.
    common::expect_json(
        &app,
        "POST",
        "/users/register/",
        None,
        Some(register_body),
        StatusCode::CONFLICT,
    )
    .await?;

    common::expect_json(
        &app,
        "POST",
        "/users/login/",
        None,
        Some(json!({ "email": email, "password": "Wr0ng!Pass" })),
        StatusCode::UNAUTHORIZED,
    )
    .await?;

    let login = common::expect_json(
        &app,
        "POST",
        "/users/login/",
        None,
        Some(json!({ "email": email, "password": password })),
        StatusCode::OK,
    )
    .await?;
    assert_eq!(login["token_type"], "bearer");
    let token = login["access_token"].as_str().unwrap().to_string();
    let token = Some(token.as_str());

    // --- farm ---

    let farm = common::expect_json(
        &app,
        "POST",
        "/farms/create",
        token,
        Some(json!({
            "farm_abbrev": abbrev,
            "crop_type": "durian",
            "farm_size": "12.5",
            "farm_location": "Chanthaburi",
        })),
        StatusCode::CREATED,
    )
    .await?;
    let farm_id = farm["farm_id"].as_i64().unwrap();
    assert_eq!(farm["farm_status"], "active");

    let mine = common::expect_json(
        &app,
        "GET",
        "/farms/my-farms",
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert!(mine
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["farm_id"].as_i64() == Some(farm_id)));

    // --- forecast rows ---

    let expect = common::expect_json(
        &app,
        "POST",
        &format!("/farm-expect/new/farm/{}", farm_id),
        token,
        Some(json!({
            "expected_harvest_date": "2026-11-01",
            "expected_harvest_base_uom": "800",
            "expected_income": "120000",
        })),
        StatusCode::CREATED,
    )
    .await?;
    assert_eq!(expect["farm_abbrev"], json!(abbrev));

    common::expect_json(
        &app,
        "GET",
        &format!("/farm-expect/{}", farm_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;

    // --- crop with an ad-hoc method ---

    let crop = common::expect_json(
        &app,
        "POST",
        "/crops/new",
        token,
        Some(json!({
            "nfc_code": nfc_code,
            "farm_abbrev": abbrev,
            "crop_type": "durian",
            "crop_subtype": "monthong",
            "plantation_date": "2024-03-10",
            "other_method": "Raised bed drip",
        })),
        StatusCode::CREATED,
    )
    .await?;
    assert_eq!(crop["crop_status"], "active");
    assert!(crop["crop_stage"].is_null());
    assert!(crop["last_harvest_date"].is_null());
    let method_id = crop["method_id"].as_i64().unwrap();

    // Duplicate NFC code is rejected.
    common::expect_json(
        &app,
        "POST",
        "/crops/new",
        token,
        Some(json!({
            "nfc_code": nfc_code,
            "farm_abbrev": abbrev,
            "crop_type": "durian",
            "plantation_date": "2024-03-10",
            "other_method": "Raised bed drip",
        })),
        StatusCode::CONFLICT,
    )
    .await?;

    // The ad-hoc method is now listed for this user.
    let methods = common::expect_json(&app, "GET", "/methods/", token, None, StatusCode::OK).await?;
    assert!(methods
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["method"] == "Raised bed drip"));

    // --- daily records drive the crop stage ---

    common::expect_json(
        &app,
        "POST",
        "/crop-daily/new",
        token,
        Some(json!({ "nfc_code": nfc_code, "crop_stage": "growing" })),
        StatusCode::CREATED,
    )
    .await?;

    let crop = common::expect_json(
        &app,
        "GET",
        &format!("/crops/get/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(crop["crop_stage"], "growing");

    // Strictly one active daily record per crop per day.
    common::expect_json(
        &app,
        "POST",
        "/crop-daily/new",
        token,
        Some(json!({ "nfc_code": nfc_code, "crop_stage": "growing" })),
        StatusCode::CONFLICT,
    )
    .await?;

    common::expect_json(
        &app,
        "PUT",
        &format!("/crop-daily/update/{}", nfc_code),
        token,
        Some(json!({ "crop_stage": "flowering" })),
        StatusCode::OK,
    )
    .await?;

    let crop = common::expect_json(
        &app,
        "GET",
        &format!("/crops/get/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(crop["crop_stage"], "flowering");

    // Deleting today's only record leaves the crop without a stage again.
    common::expect_json(
        &app,
        "DELETE",
        &format!("/crop-daily/delete/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;

    let crop = common::expect_json(
        &app,
        "GET",
        &format!("/crops/get/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert!(crop["crop_stage"].is_null());

    // A second delete finds nothing left for today.
    common::expect_json(
        &app,
        "DELETE",
        &format!("/crop-daily/delete/{}", nfc_code),
        token,
        None,
        StatusCode::BAD_REQUEST,
    )
    .await?;

    // --- harvest maintains last_harvest_date ---

    let harvest_date = Utc::now();
    let harvest = common::expect_json(
        &app,
        "POST",
        "/harvest/new",
        token,
        Some(json!({
            "nfc_code": nfc_code,
            "quantity": "42.0",
            "harvest_unit": "kg",
            "harvest_avg_quality": "good",
            "earn": "6300",
            "harvest_date": harvest_date,
        })),
        StatusCode::CREATED,
    )
    .await?;
    let harvest_id = harvest["harvest_id"].as_i64().unwrap();

    let crop = common::expect_json(
        &app,
        "GET",
        &format!("/crops/get/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(
        crop["last_harvest_date"],
        json!(harvest_date.date_naive().to_string())
    );

    // One harvest per crop per day.
    common::expect_json(
        &app,
        "POST",
        "/harvest/new",
        token,
        Some(json!({
            "nfc_code": nfc_code,
            "quantity": "1.0",
            "harvest_unit": "kg",
            "harvest_avg_quality": "fair",
            "earn": "100",
            "harvest_date": harvest_date,
        })),
        StatusCode::CONFLICT,
    )
    .await?;

    // Moving the harvest date keeps the cache equal to the active maximum.
    let moved_date = harvest_date - chrono::Duration::days(2);
    common::expect_json(
        &app,
        "PUT",
        &format!("/harvest/{}/{}", nfc_code, harvest_id),
        token,
        Some(json!({ "harvest_date": moved_date })),
        StatusCode::OK,
    )
    .await?;

    let crop = common::expect_json(
        &app,
        "GET",
        &format!("/crops/get/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(
        crop["last_harvest_date"],
        json!(moved_date.date_naive().to_string())
    );

    // Unit harvests need a weight estimate.
    common::expect_json(
        &app,
        "PUT",
        &format!("/harvest/{}/{}", nfc_code, harvest_id),
        token,
        Some(json!({ "harvest_unit": "unit" })),
        StatusCode::BAD_REQUEST,
    )
    .await?;

    // Deleting the only harvest clears the cache; a second delete is a no-op.
    let deleted = common::expect_json(
        &app,
        "DELETE",
        &format!("/harvest/delete/{}", harvest_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert!(deleted["last_harvest_date"].is_null());

    let deleted_again = common::expect_json(
        &app,
        "DELETE",
        &format!("/harvest/delete/{}", harvest_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert!(deleted_again["message"]
        .as_str()
        .unwrap()
        .contains("already"));

    let crop = common::expect_json(
        &app,
        "GET",
        &format!("/crops/get/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert!(crop["last_harvest_date"].is_null());

    // --- expenses ---

    let expense = common::expect_json(
        &app,
        "POST",
        "/expenses/create/",
        token,
        Some(json!({
            "farm_id": farm_id,
            "category": "fertilizer",
            "description": "NPK 15-15-15",
            "amount": "1250.50",
            "transaction_date": "2026-08-01",
        })),
        StatusCode::CREATED,
    )
    .await?;
    let expense_id = expense["expenses_id"].as_i64().unwrap();

    let listed = common::expect_json(
        &app,
        "GET",
        &format!("/expenses/readAll/{}", farm_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    common::expect_json(
        &app,
        "PUT",
        &format!("/expenses/{}", expense_id),
        token,
        Some(json!({ "amount": "1300.00" })),
        StatusCode::OK,
    )
    .await?;

    common::expect_json(
        &app,
        "DELETE",
        &format!("/expenses/del/{}", expense_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    common::expect_json(
        &app,
        "GET",
        &format!("/expenses/readOne/{}", expense_id),
        token,
        None,
        StatusCode::NOT_FOUND,
    )
    .await?;

    // --- activity log ---

    let activity = common::expect_json(
        &app,
        "POST",
        "/activities/new",
        token,
        Some(json!({
            "farm_id": farm_id,
            "nfc_code": nfc_code,
            "activity_name": "pruning",
            "activity_details": "removed lower branches",
        })),
        StatusCode::CREATED,
    )
    .await?;
    let activity_id = activity["activity_id"].as_i64().unwrap();

    common::expect_json(
        &app,
        "DELETE",
        &format!("/activities/delete/{}", activity_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;

    // --- ownership boundary ---

    let other_email = format!("o{}@test.io", suffix % 1_000_000_000);
    common::expect_json(
        &app,
        "POST",
        "/users/register/",
        None,
        Some(json!({
            "first_name": "Eve",
            "last_name": "Neighbor",
            "email": other_email,
            "phone_number": "555-0101",
            "password": password,
        })),
        StatusCode::CREATED,
    )
    .await?;
    let other_login = common::expect_json(
        &app,
        "POST",
        "/users/login/",
        None,
        Some(json!({ "email": other_email, "password": password })),
        StatusCode::OK,
    )
    .await?;
    let other_token = other_login["access_token"].as_str().unwrap().to_string();

    common::expect_json(
        &app,
        "GET",
        &format!("/farms/get/{}", farm_id),
        Some(other_token.as_str()),
        None,
        StatusCode::FORBIDDEN,
    )
    .await?;
    common::expect_json(
        &app,
        "GET",
        &format!("/crops/get/{}", nfc_code),
        Some(other_token.as_str()),
        None,
        StatusCode::FORBIDDEN,
    )
    .await?;

    // Mutations are fenced the same way as reads.
    common::expect_json(
        &app,
        "DELETE",
        &format!("/farms/delete/{}", farm_id),
        Some(other_token.as_str()),
        None,
        StatusCode::FORBIDDEN,
    )
    .await?;
    common::expect_json(
        &app,
        "PUT",
        &format!("/farms/update/{}", farm_id),
        Some(other_token.as_str()),
        Some(json!({ "farm_location": "elsewhere" })),
        StatusCode::FORBIDDEN,
    )
    .await?;

    // --- teardown cascades ---

    // A second crop sharing the method keeps it alive past the first delete.
    let nfc_code_2 = format!("{}-b", nfc_code);
    common::expect_json(
        &app,
        "POST",
        "/crops/new",
        token,
        Some(json!({
            "nfc_code": nfc_code_2,
            "farm_abbrev": abbrev,
            "crop_type": "durian",
            "plantation_date": "2025-01-20",
            "method_id": method_id,
        })),
        StatusCode::CREATED,
    )
    .await?;

    common::expect_json(
        &app,
        "DELETE",
        &format!("/crops/delete-by-nfc/{}", nfc_code),
        token,
        None,
        StatusCode::OK,
    )
    .await?;

    let methods = common::expect_json(&app, "GET", "/methods/", token, None, StatusCode::OK).await?;
    assert!(methods
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["method"] == "Raised bed drip"));

    // Removing the last referencing crop reaps the ad-hoc method.
    common::expect_json(
        &app,
        "DELETE",
        &format!("/crops/delete-by-nfc/{}", nfc_code_2),
        token,
        None,
        StatusCode::OK,
    )
    .await?;

    let methods = common::expect_json(&app, "GET", "/methods/", token, None, StatusCode::OK).await?;
    assert!(!methods
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["method"] == "Raised bed drip"));

    // Renaming the farm rewrites the denormalized abbreviation on its
    // expectation rows.
    let renamed_abbrev = format!("{}R", abbrev);
    common::expect_json(
        &app,
        "PUT",
        &format!("/farms/update/{}", farm_id),
        token,
        Some(json!({ "farm_abbrev": renamed_abbrev })),
        StatusCode::OK,
    )
    .await?;

    let expect = common::expect_json(
        &app,
        "GET",
        &format!("/farm-expect/{}", farm_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(expect["farm_abbrev"], json!(renamed_abbrev));

    common::expect_json(
        &app,
        "DELETE",
        &format!("/farms/delete/{}", farm_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;

    let farm = common::expect_json(
        &app,
        "GET",
        &format!("/farms/get/{}", farm_id),
        token,
        None,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(farm["farm_status"], "terminated");

    // Termination soft-deletes the forecast rows too.
    common::expect_json(
        &app,
        "GET",
        &format!("/farm-expect/{}", farm_id),
        token,
        None,
        StatusCode::NOT_FOUND,
    )
    .await?;

    Ok(())
}
