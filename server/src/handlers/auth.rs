use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthError, AuthUser};
use crate::db::{Database, Filter};
use crate::error::ApiError;
use crate::models::{normalize_cnic, normalize_email, Role, User, UserProfile};
use crate::validation::{validate_cnic, validate_not_blank, ValidatedJson};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom = "validate_not_blank", length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    pub role: Role,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_cnic")]
    pub cnic: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub doctor_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_cnic")]
    pub cnic: Option<String>,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_not_blank", length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FcmTokenRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// 409 if another account already holds this email or CNIC
pub(crate) async fn ensure_unique_identity(
    db: &Database,
    email: Option<&str>,
    cnic: Option<&str>,
    except_id: Option<&str>,
) -> Result<(), ApiError> {
    let others = |users: Vec<User>| users.into_iter().any(|u| Some(u.id()) != except_id);

    if let Some(email) = email {
        let taken = db.find_by::<User>(&[Filter::eq("email", email)]).await?;
        if others(taken) {
            return Err(ApiError::Conflict("Email is already registered".to_string()));
        }
    }
    if let Some(cnic) = cnic {
        let taken = db.find_by::<User>(&[Filter::eq("cnic", cnic)]).await?;
        if others(taken) {
            return Err(ApiError::Conflict("CNIC is already registered".to_string()));
        }
    }
    Ok(())
}

/// Resolve an optional doctor reference, rejecting ids that are not active doctors
pub(crate) async fn resolve_doctor(
    db: &Database,
    doctor_id: Option<String>,
) -> Result<Option<String>, ApiError> {
    let Some(doctor_id) = doctor_id else {
        return Ok(None);
    };
    match db.find::<User>(&doctor_id).await? {
        Some(doctor) if doctor.role == Role::Doctor && doctor.is_active => Ok(Some(doctor_id)),
        _ => Err(ApiError::validation("doctorId", "Unknown doctor")),
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = req.email.as_deref().map(normalize_email);
    let cnic = req.cnic.as_deref().map(normalize_cnic);

    match req.role {
        Role::Admin => {
            return Err(ApiError::validation("role", "Admin accounts cannot self-register"))
        }
        Role::Doctor if email.is_none() => {
            return Err(ApiError::validation("email", "Email is required for doctors"))
        }
        Role::Patient if cnic.is_none() => {
            return Err(ApiError::validation("cnic", "CNIC is required for patients"))
        }
        _ => {}
    }

    ensure_unique_identity(&state.db, email.as_deref(), cnic.as_deref(), None).await?;

    let doctor_id = match req.role {
        Role::Patient => resolve_doctor(&state.db, req.doctor_id).await?,
        _ => None,
    };

    let mut user = User::new(req.role, req.name.trim(), hash_password(&req.password)?);
    user.email = email;
    user.cnic = cnic;
    user.phone = req.phone;
    user.gender = req.gender;
    user.date_of_birth = req.date_of_birth;
    user.address = req.address;
    user.doctor_id = doctor_id;
    if req.role == Role::Doctor {
        user.specialization = req.specialization;
        user.license_number = req.license_number;
    }

    let user = state.db.create(&user).await?;
    let token = state.jwt.issue(user.id(), user.role)?;
    tracing::info!(user_id = %user.id(), role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.profile(),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let filter = match (&req.email, &req.cnic) {
        (Some(email), None) => Filter::eq("email", normalize_email(email)),
        (None, Some(cnic)) => Filter::eq("cnic", normalize_cnic(cnic)),
        _ => {
            return Err(ApiError::validation(
                "email",
                "Provide either an email or a CNIC",
            ))
        }
    };

    let user = state
        .db
        .find_by::<User>(&[filter])
        .await?
        .into_iter()
        .next()
        .ok_or(AuthError::InvalidCredentials)?;

    verify_password(&req.password, &user.password_hash)?;

    if !user.is_active {
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }

    let token = state.jwt.issue(user.id(), user.role)?;
    tracing::info!(user_id = %user.id(), "user logged in");

    Ok(Json(AuthResponse {
        token,
        user: user.profile(),
    }))
}

async fn current_user(db: &Database, auth: &AuthUser) -> Result<User, ApiError> {
    db.find::<User>(&auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = current_user(&state.db, &auth).await?;
    Ok(Json(user.profile()))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(mut req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    req.email = req.email.as_deref().map(normalize_email);
    req.name = req.name.map(|n| n.trim().to_string());
    if auth.role != Role::Doctor {
        req.specialization = None;
        req.license_number = None;
    }

    ensure_unique_identity(&state.db, req.email.as_deref(), None, Some(auth.id.as_str())).await?;

    let user = state
        .db
        .update::<User, _>(&auth.id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    tracing::info!(user_id = %auth.id, "profile updated");

    Ok(Json(user.profile()))
}

/// PUT /api/auth/fcm-token
pub async fn update_fcm_token(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<FcmTokenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .db
        .update::<User, _>(&auth.id, &json!({ "fcmToken": req.token }))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(json!({ "success": true })))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&state.db, &auth).await?;
    verify_password(&req.current_password, &user.password_hash).map_err(|e| match e {
        AuthError::InvalidCredentials => {
            ApiError::validation("currentPassword", "Current password is incorrect")
        }
        other => other.into(),
    })?;

    let hash = hash_password(&req.new_password)?;
    state
        .db
        .update::<User, _>(&auth.id, &json!({ "passwordHash": hash }))
        .await?;
    tracing::info!(user_id = %auth.id, "password changed");

    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}
