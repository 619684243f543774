//! API Integration Tests
//!
//! End-to-end flows against a real Postgres (DATABASE_URL). Each test
//! rebuilds a clean schema, so identifiers are deterministic.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use bill_splitter::store::bills::{NewBill, ParticipantInput};
use bill_splitter::store::users::NewUser;
use bill_splitter::store::{BillStore, UserStore};
use bill_splitter::{AppError, DomainError};

mod common;

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((header, value)) = token {
        builder = builder.header(header, value);
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

async fn register_user(app: &Router, first: &str, nick: &str, email: &str, username: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "first_name": first,
            "last_name": "Tester",
            "nickname": nick,
            "email": email,
            "username": username,
            "password": "Secret#123",
            "confirm_password": "Secret#123"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body["user_id"].as_i64().unwrap()
}

async fn login(app: &Router, login: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"login": login, "password": "Secret#123"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn create_bill(app: &Router, token: &str, title: &str, amount: &str) -> (i64, String) {
    let (status, body) = send(
        app,
        "POST",
        "/bills",
        Some(("X-Session-Token", token)),
        Some(json!({"title": title, "total_amount": amount})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "bill creation failed: {}", body);
    (
        body["id"].as_i64().unwrap(),
        body["code"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_bill_flow_e2e() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    let alice_id = register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;
    let bob_id = register_user(&app, "Bob", "bobby", "bob@example.com", "bob_t").await;
    let token = login(&app, "alice_t").await;
    let auth = ("X-Session-Token", token.as_str());

    let (bill_id, code) = create_bill(&app, &token, "Dinner", "100.00").await;
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    // Bob owes 40, guest Carol owes 30.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/bills/{}/participants", bill_id),
        Some(auth),
        Some(json!({"user_id": bob_id, "amount_owed": "40.00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/bills/{}/participants", bill_id),
        Some(auth),
        Some(json!({
            "guest_name": "Carol",
            "guest_email": "carol@example.com",
            "amount_owed": "30.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // 70 of 100 allocated.
    let (status, summary) = send(
        &app,
        "GET",
        &format!("/bills/{}/summary", bill_id),
        Some(auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_owed"], "70.00");
    assert_eq!(summary["remaining_amount"], "30.00");
    assert_eq!(summary["is_fully_allocated"], false);

    // Alice records her own 30 share; the bill is now fully allocated.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/bills/{}/participants", bill_id),
        Some(auth),
        Some(json!({"user_id": alice_id, "amount_owed": "30.00"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, summary) = send(
        &app,
        "GET",
        &format!("/bills/{}/summary", bill_id),
        Some(auth),
        None,
    )
    .await;
    assert_eq!(summary["total_owed"], "100.00");
    assert_eq!(summary["is_fully_allocated"], true);

    // Settlements: Bob and Carol each pay Alice directly; her own share
    // produces no transfer.
    let (status, settlements) = send(
        &app,
        "GET",
        &format!("/bills/{}/settlements", bill_id),
        Some(auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settlements["is_balanced"], true);

    let transactions = settlements["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["amount"], "40.00");
    assert_eq!(transactions[1]["amount"], "30.00");
    assert_eq!(transactions[0]["to"], transactions[1]["to"]);

    // Bill list shows aggregates.
    let (status, list) = send(&app, "GET", "/bills", Some(auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let bills = list["bills"].as_array().unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0]["participant_count"], 3);
    assert_eq!(bills[0]["total_owed"], "100.00");

    // Soft delete hides the bill.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/bills/{}", bill_id),
        Some(auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/bills/{}", bill_id),
        Some(auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_participant_rejected() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;
    let bob_id = register_user(&app, "Bob", "bobby", "bob@example.com", "bob_t").await;
    let token = login(&app, "alice_t").await;
    let auth = ("X-Session-Token", token.as_str());

    let (bill_id, _) = create_bill(&app, &token, "Taxi", "20.00").await;

    let body = json!({"user_id": bob_id, "amount_owed": "10.00"});
    let (status, _) = send(
        &app,
        "POST",
        &format!("/bills/{}/participants", bill_id),
        Some(auth),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = send(
        &app,
        "POST",
        &format!("/bills/{}/participants", bill_id),
        Some(auth),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error_code"], "duplicate_participant");
}

#[tokio::test]
async fn test_owner_only_mutations() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;
    register_user(&app, "Bob", "bobby", "bob@example.com", "bob_t").await;

    let alice_token = login(&app, "alice_t").await;
    let (bill_id, _) = create_bill(&app, &alice_token, "Groceries", "55.00").await;

    let bob_token = login(&app, "bob_t").await;
    let bob_auth = ("X-Session-Token", bob_token.as_str());

    // Bob is neither creator nor participant.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/bills/{}", bill_id),
        Some(bob_auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/bills/{}/participants", bill_id),
        Some(bob_auth),
        Some(json!({"guest_name": "X", "guest_email": "x@example.com", "amount_owed": "1.00"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/bills/{}", bill_id),
        Some(bob_auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_guest_flow_e2e() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;
    let token = login(&app, "alice_t").await;
    let auth = ("X-Session-Token", token.as_str());

    let (bill_id, code) = create_bill(&app, &token, "Picnic", "60.00").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/bills/{}/participants", bill_id),
        Some(auth),
        Some(json!({
            "guest_name": "Carol",
            "guest_email": "carol@example.com",
            "amount_owed": "20.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Bill codes are case-insensitive on input.
    let (status, access) = send(
        &app,
        "POST",
        "/guest/access",
        None,
        Some(json!({
            "first_name": "Carol",
            "last_name": "Guest",
            "email": "carol@example.com",
            "bill_code": code.to_lowercase()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "guest access failed: {}", access);

    let (status, session) = send(
        &app,
        "POST",
        "/guest/session",
        None,
        Some(json!({"email": "carol@example.com", "bill_code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "guest session failed: {}", session);
    let guest_token = session["token"].as_str().unwrap().to_string();
    let guest_auth = ("X-Guest-Token", guest_token.as_str());

    // A guest token does not open the registered-user surface.
    let (status, _) = send(&app, "GET", "/dashboard", Some(guest_auth), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, bill) = send(&app, "GET", "/guest/bill", Some(guest_auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bill["code"], code);
    assert_eq!(bill["participants"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "PATCH",
        "/guest/participant",
        Some(guest_auth),
        Some(json!({"amount_owed": "25.50"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, bill) = send(&app, "GET", "/guest/bill", Some(guest_auth), None).await;
    assert_eq!(bill["participants"][0]["amount_owed"], "25.50");

    // An unknown (email, code) pair gets no session.
    let (status, _) = send(
        &app,
        "POST",
        "/guest/session",
        None,
        Some(json!({"email": "stranger@example.com", "bill_code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_and_profile() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    let alice_id = register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;
    let bob_id = register_user(&app, "Bob", "bobby", "bob@example.com", "bob_t").await;
    let token = login(&app, "alice_t").await;
    let auth = ("X-Session-Token", token.as_str());

    let (bill_id, _) = create_bill(&app, &token, "Rent", "100.00").await;
    for body in [
        json!({"user_id": bob_id, "amount_owed": "40.00"}),
        json!({"guest_name": "Carol", "guest_email": "carol@example.com", "amount_owed": "30.00"}),
        json!({"user_id": alice_id, "amount_owed": "30.00"}),
    ] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/bills/{}/participants", bill_id),
            Some(auth),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Others owe Alice 70; she owes 30 on her own participation row.
    let (status, dashboard) = send(&app, "GET", "/dashboard", Some(auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["balance"]["total_owed_to_user"], "70.00");
    assert_eq!(dashboard["balance"]["total_owed"], "30.00");
    assert_eq!(dashboard["balance"]["net_balance"], "40.00");
    assert_eq!(dashboard["balance"]["status"], "creditor");
    assert_eq!(dashboard["bills"].as_array().unwrap().len(), 1);
    assert!(!dashboard["recent_activity"].as_array().unwrap().is_empty());

    // Profile update is allow-listed and uniqueness-checked.
    let (status, profile) = send(
        &app,
        "PATCH",
        "/profile",
        Some(auth),
        Some(json!({"nickname": "alice_prime"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["nickname"], "alice_prime");

    let (status, error) = send(
        &app,
        "PATCH",
        "/profile",
        Some(auth),
        Some(json!({"nickname": "bobby"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool.clone());

    register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;

    let (status, body) = send(
        &app,
        "POST",
        "/password/request-reset",
        None,
        Some(json!({"email": "alice@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The response is identical for unknown emails.
    let (unknown_status, unknown_body) = send(
        &app,
        "POST",
        "/password/request-reset",
        None,
        Some(json!({"email": "nobody@example.com"})),
    )
    .await;
    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(body["message"], unknown_body["message"]);

    // The token reaches the user by mail; tests read it from the store.
    let token: String =
        sqlx::query_scalar("SELECT token FROM password_resets WHERE email = $1")
            .bind("alice@example.com")
            .fetch_one(&pool)
            .await
            .unwrap();

    let (status, validation) = send(
        &app,
        "POST",
        "/password/validate-token",
        None,
        Some(json!({"token": token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(validation["valid"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/password/reset",
        None,
        Some(json!({
            "token": token,
            "password": "Fresh#456",
            "confirm_password": "Fresh#456"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Old password rejected, new one accepted, token consumed.
    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"login": "alice_t", "password": "Secret#123"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"login": "alice_t", "password": "Fresh#456"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, validation) = send(
        &app,
        "POST",
        "/password/validate-token",
        None,
        Some(json!({"token": token})),
    )
    .await;
    assert_eq!(validation["valid"], false);
}

#[tokio::test]
async fn test_auth_required_and_logout() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    let (status, _) = send(&app, "GET", "/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "GET",
        "/dashboard",
        Some(("X-Session-Token", "not-a-real-token")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;
    let token = login(&app, "alice_t").await;
    let auth = ("X-Session-Token", token.as_str());

    let (status, _) = send(&app, "GET", "/dashboard", Some(auth), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/auth/logout", Some(auth), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/dashboard", Some(auth), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_participant_uniqueness_enforced_by_schema() {
    let pool = common::setup_test_db().await;

    let users = UserStore::new(pool.clone());
    let alice_id = users
        .register(&NewUser {
            first_name: "Alice".to_string(),
            last_name: "Tester".to_string(),
            nickname: "ali".to_string(),
            email: "alice@example.com".to_string(),
            username: "alice_t".to_string(),
            password: "Secret#123".to_string(),
        })
        .await
        .unwrap();
    let bob_id = users
        .register(&NewUser {
            first_name: "Bob".to_string(),
            last_name: "Tester".to_string(),
            nickname: "bobby".to_string(),
            email: "bob@example.com".to_string(),
            username: "bob_t".to_string(),
            password: "Secret#123".to_string(),
        })
        .await
        .unwrap();

    let bills = BillStore::new(pool.clone());
    let bill = bills
        .create_bill(
            alice_id,
            &NewBill {
                title: "Taxi".to_string(),
                description: None,
                total_amount: dec!(20.00),
            },
        )
        .await
        .unwrap();

    let input = ParticipantInput::Registered { user_id: bob_id };
    bills
        .add_participant(bill.id, &input, dec!(10.00))
        .await
        .unwrap();

    // A racing insert that slipped past the store's pre-check stops at the
    // unique index.
    let result = sqlx::query(
        "INSERT INTO bill_participants (bill_id, user_id, amount_owed) VALUES ($1, $2, $3)",
    )
    .bind(bill.id)
    .bind(bob_id)
    .bind(dec!(10.00))
    .execute(&pool)
    .await;

    match result {
        Err(sqlx::Error::Database(e)) => assert!(e.is_unique_violation()),
        other => panic!("duplicate row must violate the unique index: {:?}", other),
    }

    let duplicate = bills.add_participant(bill.id, &input, dec!(10.00)).await;
    assert!(matches!(
        duplicate,
        Err(AppError::Domain(DomainError::DuplicateParticipant { .. }))
    ));

    // Guests carry no user_id and stay unconstrained.
    for _ in 0..2 {
        bills
            .add_participant(
                bill.id,
                &ParticipantInput::Guest {
                    name: "Carol".to_string(),
                    email: "carol@example.com".to_string(),
                },
                dec!(5.00),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_login_email_case_insensitive() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    register_user(&app, "Alice", "ali", "Alice@Example.com", "alice_t").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"login": "ALICE@EXAMPLE.COM", "password": "Secret#123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    assert_eq!(body["first_name"], "Alice");
}

#[tokio::test]
async fn test_registration_validation() {
    let pool = common::setup_test_db().await;
    let app = common::test_app(pool);

    register_user(&app, "Alice", "ali", "alice@example.com", "alice_t").await;

    // Duplicate email.
    let (status, error) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "first_name": "Alice",
            "last_name": "Clone",
            "nickname": "ali2",
            "email": "alice@example.com",
            "username": "alice_2",
            "password": "Secret#123",
            "confirm_password": "Secret#123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_code"], "invalid_request");

    // Weak password.
    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "first_name": "Bob",
            "last_name": "Tester",
            "nickname": "bobby",
            "email": "bob@example.com",
            "username": "bob_t",
            "password": "weakpass",
            "confirm_password": "weakpass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Mismatched confirmation.
    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "first_name": "Bob",
            "last_name": "Tester",
            "nickname": "bobby",
            "email": "bob@example.com",
            "username": "bob_t",
            "password": "Secret#123",
            "confirm_password": "Secret#124"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
