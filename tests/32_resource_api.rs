mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use futures::future::join_all;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{ids, router_over, send, TestApp};
use natours_api::config::AppConfig;
use natours_api::testing::{sample_tour, seeded_memory_store, SlowStore, ADMIN, GUIDE, LEAD_GUIDE, USER};

#[tokio::test]
async fn get_one_expands_guides_and_reviews() -> Result<()> {
    let app = TestApp::new().await;
    let res = app.get("/api/v1/tours/tour-forest-hiker", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "success");

    let tour = &res.body["data"]["tour"];
    assert_eq!(tour["guides"][0]["name"], "Leo Gillespie");
    assert_eq!(tour["guides"][1]["name"], "Jennifer Hardy");
    assert!(tour["guides"][0].get("passwordChangedAt").is_none());
    assert_eq!(tour["reviews"].as_array().map(Vec::len), Some(2));
    assert!(tour.get("createdAt").is_none());
    assert!(tour.get("__v").is_none());
    assert!((tour["durationWeeks"].as_f64().unwrap_or_default() - 5.0 / 7.0).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn lead_guide_manages_tours() -> Result<()> {
    let app = TestApp::new().await;
    let token = app.token(LEAD_GUIDE);

    let res = app.post("/api/v1/tours", Some(&token), json!(sample_tour("The Northern Lights"))).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let tour = &res.body["data"]["tour"];
    assert_eq!(tour["slug"], "the-northern-lights");
    assert_eq!(tour["ratingsAverage"], 4.5);
    assert_eq!(tour["secretTour"], false);
    let id = tour["id"].as_str().unwrap_or_default().to_string();
    assert!(!id.is_empty());

    let res = app.patch(&format!("/api/v1/tours/{}", id), Some(&token), json!({"price": 899, "ratingsAverage": 4.66})).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["tour"]["price"], 899);
    assert_eq!(res.body["data"]["tour"]["ratingsAverage"], 4.7);

    let res = app.delete(&format!("/api/v1/tours/{}", id), Some(&token)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_null());

    let res = app.get(&format!("/api/v1/tours/{}", id), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "No tour found with that ID");
    Ok(())
}

#[tokio::test]
async fn guides_may_not_write_tours() -> Result<()> {
    let app = TestApp::new().await;
    let res = app
        .patch("/api/v1/tours/tour-forest-hiker", Some(&app.token(GUIDE)), json!({"price": 1}))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn invalid_tours_report_every_field() -> Result<()> {
    let app = TestApp::new().await;
    let res = app.post("/api/v1/tours", Some(&app.token(ADMIN)), json!({"name": "Short"})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "fail");

    let errors = &res.body["errors"];
    assert_eq!(errors["name"], "A tour name must have more or equal then 10 characters");
    assert_eq!(errors["duration"], "A tour must have a duration");
    assert_eq!(errors["imageCover"], "A tour must have a cover image");
    assert!(res.body["message"].as_str().unwrap_or_default().starts_with("Invalid input data."));
    assert_eq!(app.store.len("tours").await, 7);
    Ok(())
}

#[tokio::test]
async fn duplicate_tour_names_are_rejected() -> Result<()> {
    let app = TestApp::new().await;
    let res = app
        .post("/api/v1/tours", Some(&app.token(ADMIN)), json!(sample_tour("The Forest Hiker")))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.body["errors"]["name"],
        "Duplicate field value: \"The Forest Hiker\". Please use another value!"
    );
    Ok(())
}

#[tokio::test]
async fn partial_update_validates_only_what_changed() -> Result<()> {
    let app = TestApp::new().await;
    let token = app.token(ADMIN);

    // The fixture lacks a summary and cover image; that does not block a price change
    let res = app.patch("/api/v1/tours/tour-forest-hiker", Some(&token), json!({"price": 450})).await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.patch("/api/v1/tours/tour-forest-hiker", Some(&token), json!({"priceDiscount": 500})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["message"].as_str().unwrap_or_default().contains("Discount price (500) should be below regular price"));

    let res = app.patch("/api/v1/tours/tour-forest-hiker", Some(&token), json!({"ratingsAverage": 7})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"]["ratingsAverage"], "Rating must be below 5.0");
    Ok(())
}

#[tokio::test]
async fn secret_tours_behave_as_missing() -> Result<()> {
    let app = TestApp::new().await;
    let token = app.token(ADMIN);

    let res = app.get("/api/v1/tours/tour-secret", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.patch("/api/v1/tours/tour-secret", Some(&token), json!({"price": 1})).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.delete("/api/v1/tours/tour-secret", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.len("tours").await, 7);

    let res = app.delete("/api/v1/tours/tour-nowhere", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn clearing_the_secret_flag_keeps_the_tour_visible() -> Result<()> {
    let app = TestApp::new().await;
    let res = app
        .patch("/api/v1/tours/tour-forest-hiker", Some(&app.token(LEAD_GUIDE)), json!({"secretTour": null}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get("/api/v1/tours/tour-forest-hiker", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["tour"]["name"], "The Forest Hiker");

    let res = app.get("/api/v1/tours", Some(&app.token(USER))).await?;
    assert!(ids(&res.body, "tours").contains(&"tour-forest-hiker".to_string()));
    Ok(())
}

#[tokio::test]
async fn nested_review_is_scoped_to_tour_and_author() -> Result<()> {
    let app = TestApp::new().await;
    let res = app
        .post(
            "/api/v1/tours/tour-sea-explorer/reviews",
            Some(&app.token(USER)),
            json!({"review": "Dolphins everywhere", "rating": 5}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["review"]["tour"], "tour-sea-explorer");
    assert_eq!(res.body["data"]["review"]["user"], USER);

    let res = app.get("/api/v1/tours/tour-sea-explorer/reviews", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 2);
    let reviews = res.body["data"]["reviews"].as_array().cloned().unwrap_or_default();
    assert!(reviews.iter().all(|r| r["tour"] == "tour-sea-explorer"));
    // Newest first, authors expanded to name and photo
    assert_eq!(reviews[0]["review"], "Dolphins everywhere");
    assert_eq!(reviews[0]["user"]["name"], "Laura Wilson");
    assert_eq!(reviews[0]["user"]["photo"], "default.jpg");
    assert!(reviews[0]["user"].get("email").is_none());
    Ok(())
}

#[tokio::test]
async fn only_plain_users_write_reviews() -> Result<()> {
    let app = TestApp::new().await;
    let res = app
        .post(
            "/api/v1/tours/tour-sea-explorer/reviews",
            Some(&app.token(LEAD_GUIDE)),
            json!({"review": "My own tour is great", "rating": 5}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post("/api/v1/tours/tour-sea-explorer/reviews", None, json!({"review": "Anonymous", "rating": 1}))
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.len("reviews").await, 3);
    Ok(())
}

#[tokio::test]
async fn review_without_parent_needs_explicit_references() -> Result<()> {
    let app = TestApp::new().await;
    let res = app
        .post("/api/v1/reviews", Some(&app.token(USER)), json!({"review": "Where am I?", "rating": 4}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"]["tour"], "Review must belong to a tour.");
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_get_distinct_ids() -> Result<()> {
    let app = TestApp::new().await;
    let token = app.token(ADMIN);
    let names: Vec<String> = (0..10).map(|i| format!("The Parallel Trail {}", (b'A' + i) as char)).collect();

    let responses = join_all(names.iter().map(|name| app.post("/api/v1/tours", Some(&token), json!(sample_tour(name))))).await;

    let mut created = BTreeSet::new();
    for res in responses {
        let res = res?;
        assert_eq!(res.status, StatusCode::CREATED);
        created.insert(res.body["data"]["tour"]["id"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(created.len(), 10);
    assert_eq!(app.store.len("tours").await, 17);
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() -> Result<()> {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tours")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token(ADMIN)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))?;
    let response = app.router.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let res = app.post("/api/v1/tours", Some(&app.token(ADMIN)), json!(["not", "an", "object"])).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found() -> Result<()> {
    let app = TestApp::new().await;
    let res = app.get("/api/v1/bookings", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "Can't find /api/v1/bookings on this server!");
    Ok(())
}

#[tokio::test]
async fn root_and_health_report_the_service() -> Result<()> {
    let app = TestApp::new().await;
    let res = app.get("/", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["name"], "natours-api");
    assert_eq!(res.body["resources"], json!(["reviews", "tours", "users"]));

    let res = app.get("/health", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn serves_without_request_logging() -> Result<()> {
    let mut config = AppConfig::development();
    config.api.enable_request_logging = false;
    let app = TestApp::with_config(config).await;

    let res = app.get("/api/v1/tours/tour-sea-explorer", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    let res = app.get("/api/v1/nowhere", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn slow_store_trips_the_deadline() -> Result<()> {
    let mut config = AppConfig::development();
    config.store.deadline_ms = 20;
    let store = Arc::new(SlowStore::new(seeded_memory_store().await, Duration::from_millis(500)));
    let router = router_over(store, config);

    let res = send(&router, axum::http::Method::GET, "/api/v1/tours/tour-sea-explorer", None, None).await?;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["status"], "error");
    assert_eq!(res.body["message"], "Service temporarily unavailable, please try again");
    Ok(())
}

#[tokio::test]
async fn list_ids_helper_reads_the_envelope() -> Result<()> {
    let app = TestApp::new().await;
    let res = app.get("/api/v1/tours/tour-forest-hiker/reviews", None).await?;
    assert_eq!(ids(&res.body, "reviews"), vec!["review-2", "review-1"]);
    Ok(())
}
