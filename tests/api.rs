//! Integration tests for the public HTTP surface.

use serde_json::{json, Value};
use std::time::Duration;

mod helpers;
use helpers::app::spawn_app_with_senders;
use helpers::{spawn_app, CountingSender};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn register_alice_then_duplicate_is_rejected() {
    let app = spawn_app().await;
    let body = json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "secret1",
    });

    let first = app
        .client
        .post(app.url("/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);

    let second = app
        .client
        .post(app.url("/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
    let error: Value = second.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("already registered"));
}

#[tokio::test]
async fn malformed_registrations_are_rejected_before_any_side_effect() {
    let app = spawn_app().await;

    let bad_email = json!({
        "username": "alice",
        "email": "not-an-email",
        "password": "secret1",
    });
    let response = app
        .client
        .post(app.url("/register"))
        .json(&bad_email)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let short_password = json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "12345",
    });
    let response = app
        .client
        .post(app.url("/register"))
        .json(&short_password)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // The rejected requests must not have claimed the username.
    let valid = json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "secret1",
    });
    let response = app
        .client
        .post(app.url("/register"))
        .json(&valid)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    app.register(json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "secret1",
    }))
    .await;

    let response = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = app
        .client
        .post(app.url("/login"))
        .json(&json!({ "username": "nobody", "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/flights")).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = app
        .client
        .get(app.url("/flights"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn update_status_creates_record_and_notifies_all_channels() {
    let app = spawn_app().await;
    let token = app.register_and_login("alice", &["AA123"]).await;

    let response = app
        .client
        .post(app.url("/status"))
        .bearer_auth(&token)
        .json(&json!({
            "flight_id": "AA123",
            "status": "Delayed",
            "gate": "A12",
            "delay": 30,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The response is the canonical stored record.
    let record: Value = response.json().await.unwrap();
    assert_eq!(record["flight_id"], "AA123");
    assert_eq!(record["status"], "Delayed");
    assert_eq!(record["gate"], "A12");
    assert_eq!(record["delay"], 30);
    assert!(record["updated_at"].is_string());

    // All three channels get their delivery attempt.
    app.push.wait_for_count(1, WAIT).await;
    app.email.wait_for_count(1, WAIT).await;
    app.sms.wait_for_count(1, WAIT).await;

    let push_payload = app.push.last_payload().unwrap();
    assert_eq!(push_payload["topic"], "AA123");
    assert_eq!(push_payload["data"]["gate"], "A12");
    assert_eq!(push_payload["data"]["delay"], "30");

    let email_payload = app.email.last_payload().unwrap();
    assert_eq!(email_payload["recipient"], "alice@example.com");
    assert!(email_payload["body"].as_str().unwrap().contains("AA123"));

    // The stored record matches what was returned.
    let fetched: Value = app
        .client
        .get(app.url("/status/AA123"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "Delayed");
}

#[tokio::test]
async fn absent_optional_fields_clear_the_record_and_stay_out_of_push_payloads() {
    let app = spawn_app().await;
    let token = app.register_and_login("alice", &["AA123"]).await;

    app.client
        .post(app.url("/status"))
        .bearer_auth(&token)
        .json(&json!({
            "flight_id": "AA123",
            "status": "Delayed",
            "gate": "A12",
            "delay": 30,
        }))
        .send()
        .await
        .unwrap();
    app.push.wait_for_count(1, WAIT).await;

    let response = app
        .client
        .post(app.url("/status"))
        .bearer_auth(&token)
        .json(&json!({
            "flight_id": "AA123",
            "status": "On Time",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // gate/delay are gone from the record, not left as null artifacts.
    let record: Value = response.json().await.unwrap();
    assert_eq!(record["status"], "On Time");
    assert!(record.get("gate").is_none());
    assert!(record.get("delay").is_none());

    // And the second push payload omits them entirely.
    app.push.wait_for_count(2, WAIT).await;
    let push_payload = app.push.last_payload().unwrap();
    let data = push_payload["data"].as_object().unwrap();
    assert!(!data.contains_key("gate"));
    assert!(!data.contains_key("delay"));

    let fetched: Value = app
        .client
        .get(app.url("/status/AA123"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "On Time");
    assert!(fetched.get("gate").is_none());
}

#[tokio::test]
async fn get_status_for_unknown_flight_is_not_found() {
    let app = spawn_app().await;
    let token = app.register_and_login("alice", &[]).await;

    let response = app
        .client
        .get(app.url("/status/ZZ999"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // The failed lookup left no record behind.
    let flights: Value = app
        .client
        .get(app.url("/flights"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(flights.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn list_flights_returns_every_record() {
    let app = spawn_app().await;
    let token = app.register_and_login("alice", &[]).await;

    for (flight_id, status) in [("AA123", "Delayed"), ("BA42", "On Time")] {
        app.client
            .post(app.url("/status"))
            .bearer_auth(&token)
            .json(&json!({ "flight_id": flight_id, "status": status }))
            .send()
            .await
            .unwrap();
    }

    let flights: Value = app
        .client
        .get(app.url("/flights"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let flights = flights.as_array().unwrap();
    assert_eq!(flights.len(), 2);
}

#[tokio::test]
async fn failing_channel_never_fails_the_status_update() {
    let app = spawn_app_with_senders(
        CountingSender::failing(),
        CountingSender::new(),
        CountingSender::new(),
    )
    .await;
    let token = app.register_and_login("alice", &["AA123"]).await;

    let response = app
        .client
        .post(app.url("/status"))
        .bearer_auth(&token)
        .json(&json!({ "flight_id": "AA123", "status": "Cancelled" }))
        .send()
        .await
        .unwrap();

    // The status change itself succeeded.
    assert_eq!(response.status(), 200);

    // The broken push channel did not suppress the other two.
    app.push.wait_for_count(1, WAIT).await;
    app.email.wait_for_count(1, WAIT).await;
    app.sms.wait_for_count(1, WAIT).await;
}
