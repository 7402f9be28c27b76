#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use telehealth_server::auth::hash_password;
use telehealth_server::config::AppConfig;
use telehealth_server::db::Database;
use telehealth_server::models::{Role, User};
use telehealth_server::{build_router, AppState};

pub fn test_state() -> AppState {
    test_state_with(AppConfig::for_tests())
}

pub fn test_state_with(config: AppConfig) -> AppState {
    tokio_test::assert_ok!(AppState::new(config, Database::in_memory()))
}

/// Send one request through a fresh router and decode the JSON body (Null when empty)
pub async fn call(
    state: &AppState,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Register a doctor and return (id, token)
pub async fn register_doctor(state: &AppState, name: &str, email: &str) -> (String, String) {
    let (status, body) = call(
        state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(serde_json::json!({
            "name": name,
            "role": "doctor",
            "email": email,
            "password": "doctor-pass",
            "specialization": "General practice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (id_of(&body["user"]), body["token"].as_str().unwrap().to_string())
}

/// Create a patient under `doctor_token` and log them in; returns (id, token)
pub async fn create_patient(
    state: &AppState,
    doctor_token: &str,
    name: &str,
    cnic: &str,
) -> (String, String) {
    let (status, body) = call(
        state,
        Method::POST,
        "/api/patients",
        Some(doctor_token),
        Some(serde_json::json!({
            "name": name,
            "cnic": cnic,
            "password": "patient-pass",
            "gender": "female"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = id_of(&body);

    let (status, body) = call(
        state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(serde_json::json!({ "cnic": cnic, "password": "patient-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (id, body["token"].as_str().unwrap().to_string())
}

/// Admins cannot self-register, so seed one straight into the store
pub async fn seed_admin(state: &AppState) -> String {
    let mut admin = User::new(Role::Admin, "Admin", hash_password("admin-pass").unwrap());
    admin.email = Some("admin@clinic.test".to_string());
    state.db.create(&admin).await.unwrap();

    let (status, body) = call(
        state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(serde_json::json!({ "email": "admin@clinic.test", "password": "admin-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("response carries an id").to_string()
}

pub fn medications() -> Value {
    serde_json::json!([{
        "name": "Amoxicillin",
        "dosage": "500mg",
        "frequency": "3x daily",
        "duration": "7 days"
    }])
}
