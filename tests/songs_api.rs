mod common;

use axum::http::{Method, StatusCode};
use common::{app, get, post, send};
use serde_json::json;

#[tokio::test]
async fn create_read_list_update_delete() {
    let app = app();

    let created = post(&app, "/songs", json!({ "name": "Hello", "releaseYear": 2021 })).await;
    assert_eq!(created.status, StatusCode::OK);
    let song = &created.body["data"];
    let id = song["id"].as_str().unwrap().to_string();
    assert_eq!(song["name"], "Hello");
    assert_eq!(song["releaseYear"], 2021);
    assert!(song["createdAt"].is_string());

    let read = get(&app, &format!("/songs/{}", id)).await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["data"]["id"], id.as_str());

    post(&app, "/songs", json!({ "name": "Goodbye", "releaseYear": 1999 })).await;
    let listed = get(&app, "/songs?_order=releaseYear").await;
    let names: Vec<&str> = listed.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Goodbye", "Hello"]);

    let filtered = get(&app, "/songs?releaseYear=2021").await;
    assert_eq!(filtered.body["data"].as_array().unwrap().len(), 1);

    let updated = send(
        &app,
        Method::PATCH,
        &format!("/songs/{}", id),
        Some(json!({ "releaseYear": 2022 })),
        None,
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["releaseYear"], 2022);
    assert_eq!(updated.body["data"]["name"], "Hello");

    let deleted = send(&app, Method::DELETE, &format!("/songs/{}", id), None, None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(deleted.body.is_null());

    let gone = get(&app, &format!("/songs/{}", id)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.body["error"]["type"], "NotFound");
}

#[tokio::test]
async fn validation_failures_are_400_with_field_messages() {
    let app = app();

    let missing = post(&app, "/songs", json!({ "releaseYear": 2021 })).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"]["type"], "ValidationFailure");
    assert_eq!(missing.body["error"]["fields"]["name"], "value required");

    let unknown = post(&app, "/songs", json!({ "name": "x", "genre": "pop" })).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body["error"]["fields"]["genre"], "key is not allowed");

    post(&app, "/songs", json!({ "name": "Dup" })).await;
    let duplicate = post(&app, "/songs", json!({ "name": "Dup" })).await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["error"]["type"], "UniqueConstraintViolation");
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = app();
    let not_object = post(&app, "/songs", json!([1, 2])).await;
    assert_eq!(not_object.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_object.body["error"]["type"], "BadRequest");
}

#[tokio::test]
async fn ensure_is_not_captured_by_the_item_route() {
    let app = app();
    let first = post(&app, "/songs/ensure", json!({ "name": "Hello", "releaseYear": 2021 })).await;
    assert_eq!(first.status, StatusCode::OK);
    let second = post(&app, "/songs/ensure", json!({ "name": "Hello", "releaseYear": 2022 })).await;
    assert_eq!(first.body["data"]["id"], second.body["data"]["id"]);
    assert_eq!(second.body["data"]["releaseYear"], 2022);

    let listed = get(&app, "/songs").await;
    assert_eq!(listed.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bulk_update_and_delete_on_the_collection() {
    let app = app();
    for (name, year) in [("a", 2000), ("b", 2000), ("c", 2010)] {
        post(&app, "/songs", json!({ "name": name, "releaseYear": year })).await;
    }

    let updated = send(
        &app,
        Method::PATCH,
        "/songs",
        Some(json!({ "_update": { "_query": { "releaseYear": 2000 }, "_data": { "releaseYear": 2001 } } })),
        None,
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"].as_array().unwrap().len(), 2);

    let deleted = send(&app, Method::DELETE, "/songs?releaseYear=2001", None, None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let left = get(&app, "/songs").await;
    assert_eq!(left.body["data"][0]["name"], "c");
    assert_eq!(left.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn service_routes_and_unknown_paths() {
    let app = app();
    let health = get(&app, "/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");

    let version = get(&app, "/version").await;
    assert_eq!(version.body["name"], "graph-api-sdk");

    let missing = get(&app, "/albums").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let wrong_method = send(&app, Method::PUT, "/songs", None, None).await;
    assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);
}
