use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::access::{can_manage_patient, ensure_role, load_patient};
use crate::auth::AuthUser;
use crate::db::{Database, Filter};
use crate::error::ApiError;
use crate::models::{FollowUp, FollowUpPriority, FollowUpStatus, Role};
use crate::validation::{validate_not_blank, validate_time, ValidatedJson, ValidatedQuery};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFollowUpRequest {
    #[validate(length(min = 1, message = "Patient is required"))]
    pub patient_id: String,
    pub date: NaiveDate,
    #[validate(custom = "validate_time")]
    pub time: String,
    #[validate(custom = "validate_not_blank", length(max = 500))]
    pub purpose: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub priority: Option<FollowUpPriority>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFollowUpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_time")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_not_blank", length(max = 500))]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<FollowUpPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FollowUpStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: FollowUpStatus,
}

#[derive(Debug, Deserialize, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpQuery {
    pub patient_id: Option<String>,
    pub status: Option<FollowUpStatus>,
    pub upcoming: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpList {
    pub follow_ups: Vec<FollowUp>,
    pub total: usize,
}

fn ensure_not_past(date: NaiveDate) -> Result<(), ApiError> {
    if date < Utc::now().date_naive() {
        return Err(ApiError::validation("date", "Date cannot be in the past"));
    }
    Ok(())
}

async fn load_follow_up(db: &Database, id: &str) -> Result<FollowUp, ApiError> {
    db.find::<FollowUp>(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Follow-up"))
}

fn ensure_scheduler(auth: &AuthUser, f: &FollowUp) -> Result<(), ApiError> {
    if f.doctor_id == auth.id {
        return Ok(());
    }
    tracing::warn!(user_id = %auth.id, follow_up_id = ?f.id, "not the scheduling doctor");
    Err(ApiError::Forbidden(
        "Only the scheduling doctor can change this follow-up".to_string(),
    ))
}

/// Role-scoped base filters shared with the dashboard
pub(crate) fn scope_filters(auth: &AuthUser) -> Vec<Filter> {
    match auth.role {
        Role::Doctor => vec![Filter::eq("doctorId", auth.id.as_str())],
        Role::Patient => vec![Filter::eq("patientId", auth.id.as_str())],
        Role::Admin => Vec::new(),
    }
}

/// POST /api/followups
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateFollowUpRequest>,
) -> Result<(StatusCode, Json<FollowUp>), ApiError> {
    ensure_role(&auth, &[Role::Doctor])?;
    ensure_not_past(req.date)?;

    let patient = load_patient(&state.db, &req.patient_id).await?;
    if !can_manage_patient(&auth, &patient) {
        tracing::warn!(user_id = %auth.id, patient_id = %req.patient_id, "scheduling for foreign patient");
        return Err(ApiError::Forbidden(
            "You can only schedule follow-ups for your own patients".to_string(),
        ));
    }

    let follow_up = FollowUp {
        id: None,
        patient_id: req.patient_id,
        doctor_id: auth.id.clone(),
        date: req.date,
        time: req.time,
        purpose: req.purpose.trim().to_string(),
        notes: req.notes,
        priority: req.priority.unwrap_or_default(),
        status: FollowUpStatus::Scheduled,
        created_at: None,
        updated_at: None,
    };

    let created = state.db.create(&follow_up).await?;
    tracing::info!(follow_up_id = ?created.id, date = %created.date, "follow-up scheduled");

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/followups
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<FollowUpQuery>,
) -> Result<Json<FollowUpList>, ApiError> {
    let mut filters = scope_filters(&auth);
    if let Some(patient_id) = &query.patient_id {
        filters.push(Filter::eq("patientId", patient_id.as_str()));
    }
    if let Some(status) = query.status {
        filters.push(Filter::eq("status", status.as_str()));
    }

    let mut follow_ups = state.db.find_by::<FollowUp>(&filters).await?;
    if query.upcoming.unwrap_or(false) {
        let today = Utc::now().date_naive();
        follow_ups.retain(|f| f.is_upcoming(today));
        follow_ups.sort_by(|a, b| a.slot().cmp(&b.slot()));
    } else {
        follow_ups.sort_by(|a, b| b.slot().cmp(&a.slot()));
    }

    Ok(Json(FollowUpList {
        total: follow_ups.len(),
        follow_ups,
    }))
}

/// GET /api/followups/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<FollowUp>, ApiError> {
    let follow_up = load_follow_up(&state.db, &id).await?;
    if !(auth.is_admin() || follow_up.doctor_id == auth.id || follow_up.patient_id == auth.id) {
        tracing::warn!(user_id = %auth.id, follow_up_id = %id, "follow-up access denied");
        return Err(ApiError::forbidden());
    }
    Ok(Json(follow_up))
}

/// PUT /api/followups/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ValidatedJson(mut req): ValidatedJson<UpdateFollowUpRequest>,
) -> Result<Json<FollowUp>, ApiError> {
    let existing = load_follow_up(&state.db, &id).await?;
    ensure_scheduler(&auth, &existing)?;
    if let Some(date) = req.date.filter(|d| *d != existing.date) {
        ensure_not_past(date)?;
    }
    req.purpose = req.purpose.map(|p| p.trim().to_string());

    let updated = state
        .db
        .update::<FollowUp, _>(&id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Follow-up"))?;
    tracing::info!(follow_up_id = %id, "follow-up updated");

    Ok(Json(updated))
}

/// PATCH /api/followups/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> Result<Json<FollowUp>, ApiError> {
    let existing = load_follow_up(&state.db, &id).await?;
    ensure_scheduler(&auth, &existing)?;

    let updated = state
        .db
        .update::<FollowUp, _>(&id, &json!({ "status": req.status }))
        .await?
        .ok_or_else(|| ApiError::not_found("Follow-up"))?;
    tracing::info!(follow_up_id = %id, status = req.status.as_str(), "follow-up status changed");

    Ok(Json(updated))
}

/// DELETE /api/followups/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existing = load_follow_up(&state.db, &id).await?;
    if !auth.is_admin() {
        ensure_scheduler(&auth, &existing)?;
    }

    state.db.delete::<FollowUp>(&id).await?;
    tracing::info!(follow_up_id = %id, deleted_by = %auth.id, "follow-up deleted");

    Ok(StatusCode::NO_CONTENT)
}
