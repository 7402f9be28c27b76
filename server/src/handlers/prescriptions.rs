use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::access::{can_manage_patient, ensure_role, load_patient};
use crate::auth::AuthUser;
use crate::db::{Database, Filter};
use crate::error::ApiError;
use crate::models::{MedicationEntry, Prescription, PrescriptionStatus, Role};
use crate::validation::{validate_each, validate_not_blank, ValidatedJson, ValidatedQuery};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrescriptionRequest {
    #[validate(length(min = 1, message = "Patient is required"))]
    pub patient_id: String,
    #[validate(custom = "validate_not_blank", length(max = 500))]
    pub diagnosis: String,
    #[validate(length(min = 1, message = "At least one medication is required"))]
    pub medications: Vec<MedicationEntry>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub status: Option<PrescriptionStatus>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePrescriptionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_not_blank", length(max = 500))]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "At least one medication is required"))]
    pub medications: Option<Vec<MedicationEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PrescriptionStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: PrescriptionStatus,
}

#[derive(Debug, Deserialize, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionQuery {
    pub patient_id: Option<String>,
    pub status: Option<PrescriptionStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrescriptionList {
    pub prescriptions: Vec<Prescription>,
    pub total: usize,
}

async fn load_prescription(db: &Database, id: &str) -> Result<Prescription, ApiError> {
    db.find::<Prescription>(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription"))
}

fn can_view(auth: &AuthUser, p: &Prescription) -> bool {
    auth.is_admin() || p.doctor_id == auth.id || p.patient_id == auth.id
}

fn ensure_prescriber(auth: &AuthUser, p: &Prescription) -> Result<(), ApiError> {
    if p.doctor_id == auth.id {
        Ok(())
    } else {
        tracing::warn!(user_id = %auth.id, prescription_id = ?p.id, "not the prescribing doctor");
        Err(ApiError::Forbidden(
            "Only the prescribing doctor can change this prescription".to_string(),
        ))
    }
}

/// POST /api/prescriptions
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    ensure_role(&auth, &[Role::Doctor])?;
    validate_each("medications", &req.medications)?;

    let patient = load_patient(&state.db, &req.patient_id).await?;
    if !can_manage_patient(&auth, &patient) {
        tracing::warn!(user_id = %auth.id, patient_id = %req.patient_id, "prescribing for foreign patient");
        return Err(ApiError::Forbidden(
            "You can only prescribe for your own patients".to_string(),
        ));
    }

    let prescription = Prescription {
        id: None,
        patient_id: req.patient_id,
        doctor_id: auth.id.clone(),
        diagnosis: req.diagnosis.trim().to_string(),
        medications: req.medications,
        notes: req.notes,
        status: req.status.unwrap_or_default(),
        created_at: None,
        updated_at: None,
    };

    let created = state.db.create(&prescription).await?;
    tracing::info!(prescription_id = ?created.id, patient_id = %created.patient_id, "prescription created");

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/prescriptions
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<PrescriptionQuery>,
) -> Result<Json<PrescriptionList>, ApiError> {
    let mut filters = Vec::new();
    match auth.role {
        Role::Doctor => filters.push(Filter::eq("doctorId", auth.id.as_str())),
        Role::Patient => filters.push(Filter::eq("patientId", auth.id.as_str())),
        Role::Admin => {}
    }
    if let Some(patient_id) = &query.patient_id {
        filters.push(Filter::eq("patientId", patient_id.as_str()));
    }
    if let Some(status) = query.status {
        filters.push(Filter::eq("status", status.as_str()));
    }

    let mut prescriptions = state.db.find_by::<Prescription>(&filters).await?;
    prescriptions.reverse();

    Ok(Json(PrescriptionList {
        total: prescriptions.len(),
        prescriptions,
    }))
}

/// GET /api/prescriptions/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    let prescription = load_prescription(&state.db, &id).await?;
    if !can_view(&auth, &prescription) {
        tracing::warn!(user_id = %auth.id, prescription_id = %id, "prescription access denied");
        return Err(ApiError::forbidden());
    }
    Ok(Json(prescription))
}

/// PUT /api/prescriptions/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ValidatedJson(mut req): ValidatedJson<UpdatePrescriptionRequest>,
) -> Result<Json<Prescription>, ApiError> {
    let existing = load_prescription(&state.db, &id).await?;
    ensure_prescriber(&auth, &existing)?;
    if let Some(medications) = &req.medications {
        validate_each("medications", medications)?;
    }
    req.diagnosis = req.diagnosis.map(|d| d.trim().to_string());

    let updated = state
        .db
        .update::<Prescription, _>(&id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription"))?;
    tracing::info!(prescription_id = %id, "prescription updated");

    Ok(Json(updated))
}

/// PATCH /api/prescriptions/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> Result<Json<Prescription>, ApiError> {
    let existing = load_prescription(&state.db, &id).await?;
    ensure_prescriber(&auth, &existing)?;

    let updated = state
        .db
        .update::<Prescription, _>(&id, &json!({ "status": req.status }))
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription"))?;
    tracing::info!(prescription_id = %id, status = req.status.as_str(), "prescription status changed");

    Ok(Json(updated))
}

/// DELETE /api/prescriptions/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existing = load_prescription(&state.db, &id).await?;
    if !auth.is_admin() {
        ensure_prescriber(&auth, &existing)?;
    }

    state.db.delete::<Prescription>(&id).await?;
    tracing::info!(prescription_id = %id, deleted_by = %auth.id, "prescription deleted");

    Ok(StatusCode::NO_CONTENT)
}
