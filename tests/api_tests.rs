//! API integration tests against a running server.
//!
//! Tokens are minted locally with the development JWT secret, matching how
//! the external auth service issues them.

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

use agrirent_server::models::user::{UserClaims, UserRole};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const JWT_SECRET: &str = "change-this-secret-in-production";

fn make_token(user_id: Uuid, role: UserRole) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: user_id.to_string(),
        user_id,
        role,
        iat: now,
        exp: now + 3600,
    }
    .create_token(JWT_SECRET)
    .expect("Failed to create token")
}

/// Provision a user through the API and return its id
async fn create_user(client: &Client, admin_token: &str, role: &str) -> Uuid {
    let suffix = Uuid::new_v4().simple().to_string();
    let response = client
        .post(format!("{}/users", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({
            "username": format!("test-{}", &suffix[..8]),
            "email": format!("test-{}@example.com", &suffix[..8]),
            "role": role
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["user"]["id"]
        .as_str()
        .expect("No user ID")
        .parse()
        .expect("Invalid user ID")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_list_equipment_is_public() {
    let client = Client::new();

    let response = client
        .get(format!("{}/equipment", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], true);
    assert!(body["packages"].is_array());
    assert!(body["has_more"].is_boolean());
}

#[tokio::test]
#[ignore]
async fn test_catalog_query_parameters() {
    let client = Client::new();

    let response = client
        .get(format!(
            "{}/equipment?sort=dailyRentPrice&order=asc&limit=2",
            BASE_URL
        ))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let packages = body["packages"].as_array().expect("No packages array");
    assert!(packages.len() <= 2);
}

#[tokio::test]
#[ignore]
async fn test_booking_lifecycle() {
    let client = Client::new();
    let admin_token = make_token(Uuid::new_v4(), UserRole::Admin);

    let owner_id = create_user(&client, &admin_token, "owner").await;
    let renter_id = create_user(&client, &admin_token, "renter").await;
    let owner_token = make_token(owner_id, UserRole::Owner);
    let renter_token = make_token(renter_id, UserRole::Renter);

    // Owner lists a machine
    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .header("Authorization", format!("Bearer {}", owner_token))
        .json(&json!({
            "name": "Test tractor",
            "description": "Integration test listing",
            "daily_rent_price": "120.00",
            "total_quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let equipment_id = body["packageData"]["id"].as_str().expect("No equipment ID");

    // Renter books it
    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .header("Authorization", format!("Bearer {}", renter_token))
        .json(&json!({
            "equipment_id": equipment_id,
            "user_id": renter_id,
            "quantity": 1,
            "start_date": "2026-09-01T00:00:00Z",
            "end_date": "2026-09-04T00:00:00Z"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);

    // The single unit is gone, a second booking is refused
    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .header("Authorization", format!("Bearer {}", renter_token))
        .json(&json!({
            "equipment_id": equipment_id,
            "user_id": renter_id,
            "quantity": 1,
            "start_date": "2026-09-01T00:00:00Z",
            "end_date": "2026-09-04T00:00:00Z"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);

    // Find the booking and cancel it
    let response = client
        .get(format!("{}/bookings?userId={}", BASE_URL, renter_id))
        .header("Authorization", format!("Bearer {}", renter_token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    let booking_id = body["bookings"][0]["id"].as_str().expect("No booking ID");

    let response = client
        .post(format!(
            "{}/bookings/{}/cancel/{}",
            BASE_URL, booking_id, renter_id
        ))
        .header("Authorization", format!("Bearer {}", renter_token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    // Availability is back
    let response = client
        .get(format!("{}/equipment/{}", BASE_URL, equipment_id))
        .send()
        .await
        .expect("Failed to send request");

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["packageData"]["available_quantity"], 1);
}

#[tokio::test]
#[ignore]
async fn test_rating_flow() {
    let client = Client::new();
    let admin_token = make_token(Uuid::new_v4(), UserRole::Admin);

    let owner_id = create_user(&client, &admin_token, "owner").await;
    let renter_id = create_user(&client, &admin_token, "renter").await;
    let owner_token = make_token(owner_id, UserRole::Owner);
    let renter_token = make_token(renter_id, UserRole::Renter);

    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .header("Authorization", format!("Bearer {}", owner_token))
        .json(&json!({
            "name": "Test baler",
            "description": "Integration test listing",
            "daily_rent_price": "80.00",
            "total_quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    let body: Value = response.json().await.expect("Failed to parse response");
    let equipment_id = body["packageData"]["id"].as_str().expect("No equipment ID");

    // Submit a rating
    let response = client
        .post(format!("{}/ratings", BASE_URL))
        .header("Authorization", format!("Bearer {}", renter_token))
        .json(&json!({
            "equipment_id": equipment_id,
            "user_id": renter_id,
            "score": 4.0,
            "review": "Good machine"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);

    // A second rating from the same user is rejected
    let response = client
        .post(format!("{}/ratings", BASE_URL))
        .header("Authorization", format!("Bearer {}", renter_token))
        .json(&json!({
            "equipment_id": equipment_id,
            "user_id": renter_id,
            "score": 5.0
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);

    // The given flag reflects it
    let response = client
        .get(format!(
            "{}/ratings/given/{}/{}",
            BASE_URL, renter_id, equipment_id
        ))
        .header("Authorization", format!("Bearer {}", renter_token))
        .send()
        .await
        .expect("Failed to send request");

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["given"], true);

    // Ratings listing is public
    let response = client
        .get(format!("{}/ratings/{}/10", BASE_URL, equipment_id))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body.as_array().expect("Not an array").len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .post(format!("{}/bookings", BASE_URL))
        .json(&json!({
            "equipment_id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "quantity": 1,
            "start_date": "2026-09-01T00:00:00Z",
            "end_date": "2026-09-04T00:00:00Z"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_renter_cannot_create_listing() {
    let client = Client::new();
    let admin_token = make_token(Uuid::new_v4(), UserRole::Admin);
    let renter_id = create_user(&client, &admin_token, "renter").await;
    let renter_token = make_token(renter_id, UserRole::Renter);

    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .header("Authorization", format!("Bearer {}", renter_token))
        .json(&json!({
            "name": "Not allowed",
            "daily_rent_price": "10.00",
            "total_quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}
