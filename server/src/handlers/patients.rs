use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::access::{can_manage_patient, ensure_role, load_patient, viewable_patient};
use crate::auth::{hash_password, AuthUser};
use crate::db::{Database, Filter};
use crate::error::ApiError;
use crate::handlers::auth::{ensure_unique_identity, resolve_doctor};
use crate::models::{
    normalize_cnic, normalize_email, ChatMessage, FollowUp, HealthData, Prescription, Role, User,
    UserProfile,
};
use crate::validation::{validate_cnic, validate_not_blank, ValidatedJson, ValidatedQuery};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PatientQuery {
    #[validate(length(max = 100, message = "Search must be at most 100 characters"))]
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatientList {
    pub patients: Vec<UserProfile>,
    pub total: usize,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    #[validate(custom = "validate_not_blank", length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(custom = "validate_cnic")]
    pub cnic: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    /// Honoured for admins only; doctors always own the patients they create
    pub doctor_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_not_blank", length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_cnic")]
    pub cnic: Option<String>,
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
    pub doctor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

fn matches_search(patient: &User, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let digits = normalize_cnic(&needle);
    patient.name.to_lowercase().contains(&needle)
        || (!digits.is_empty()
            && patient
                .cnic
                .as_deref()
                .is_some_and(|cnic| cnic.contains(&digits)))
}

/// Drop prescriptions, follow-ups and chat messages that reference a deleted patient
async fn delete_patient_records(db: &Database, patient_id: &str) -> Result<usize, ApiError> {
    let by_patient = [Filter::eq("patientId", patient_id)];
    let mut removed = 0;

    for prescription in db.find_by::<Prescription>(&by_patient).await? {
        if let Some(id) = prescription.id {
            removed += usize::from(db.delete::<Prescription>(&id).await?);
        }
    }
    for follow_up in db.find_by::<FollowUp>(&by_patient).await? {
        if let Some(id) = follow_up.id {
            removed += usize::from(db.delete::<FollowUp>(&id).await?);
        }
    }
    for field in ["senderId", "receiverId"] {
        for message in db.find_by::<ChatMessage>(&[Filter::eq(field, patient_id)]).await? {
            if let Some(id) = message.id {
                removed += usize::from(db.delete::<ChatMessage>(&id).await?);
            }
        }
    }

    Ok(removed)
}

/// GET /api/patients
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PatientQuery>,
) -> Result<Json<PatientList>, ApiError> {
    ensure_role(&auth, &[Role::Doctor, Role::Admin])?;

    let mut filters = vec![Filter::eq("role", Role::Patient.as_str())];
    if auth.is_doctor() {
        filters.push(Filter::eq("doctorId", auth.id.as_str()));
    }

    let mut patients: Vec<UserProfile> = state
        .db
        .find_by::<User>(&filters)
        .await?
        .iter()
        .filter(|p| query.search.as_deref().map_or(true, |s| matches_search(p, s)))
        .map(User::profile)
        .collect();
    patients.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    Ok(Json(PatientList {
        total: patients.len(),
        patients,
    }))
}

/// POST /api/patients
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreatePatientRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    ensure_role(&auth, &[Role::Doctor, Role::Admin])?;

    let email = req.email.as_deref().map(normalize_email);
    let cnic = normalize_cnic(&req.cnic);
    ensure_unique_identity(&state.db, email.as_deref(), Some(cnic.as_str()), None).await?;

    let doctor_id = if auth.is_admin() {
        resolve_doctor(&state.db, req.doctor_id).await?
    } else {
        Some(auth.id.clone())
    };

    let mut patient = User::new(Role::Patient, req.name.trim(), hash_password(&req.password)?);
    patient.cnic = Some(cnic);
    patient.email = email;
    patient.phone = req.phone;
    patient.gender = req.gender;
    patient.date_of_birth = req.date_of_birth;
    patient.address = req.address;
    patient.doctor_id = doctor_id;

    let patient = state.db.create(&patient).await?;
    tracing::info!(patient_id = %patient.id(), created_by = %auth.id, "patient created");

    Ok((StatusCode::CREATED, Json(patient.profile())))
}

/// GET /api/patients/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let patient = viewable_patient(&state.db, &auth, &id).await?;
    Ok(Json(patient.profile()))
}

/// PUT /api/patients/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ValidatedJson(mut req): ValidatedJson<UpdatePatientRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let patient = load_patient(&state.db, &id).await?;
    if !can_manage_patient(&auth, &patient) {
        tracing::warn!(user_id = %auth.id, patient_id = %id, "patient update denied");
        return Err(ApiError::forbidden());
    }

    if req.doctor_id.is_some() {
        if !auth.is_admin() {
            return Err(ApiError::Forbidden(
                "Only admins can reassign a patient's doctor".to_string(),
            ));
        }
        req.doctor_id = resolve_doctor(&state.db, req.doctor_id.take()).await?;
    }

    req.email = req.email.as_deref().map(normalize_email);
    req.cnic = req.cnic.as_deref().map(normalize_cnic);
    req.name = req.name.map(|n| n.trim().to_string());
    ensure_unique_identity(&state.db, req.email.as_deref(), req.cnic.as_deref(), Some(id.as_str())).await?;

    let updated = state
        .db
        .update::<User, _>(&id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;
    tracing::info!(patient_id = %id, updated_by = %auth.id, "patient updated");

    Ok(Json(updated.profile()))
}

/// DELETE /api/patients/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let patient = load_patient(&state.db, &id).await?;
    if !can_manage_patient(&auth, &patient) {
        tracing::warn!(user_id = %auth.id, patient_id = %id, "patient delete denied");
        return Err(ApiError::forbidden());
    }

    state.db.delete::<User>(&id).await?;
    state.db.delete::<HealthData>(&id).await?;
    let removed = delete_patient_records(&state.db, &id).await?;
    tracing::info!(patient_id = %id, deleted_by = %auth.id, removed, "patient deleted");

    Ok(StatusCode::NO_CONTENT)
}
