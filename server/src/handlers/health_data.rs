use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::access::{load_patient, viewable_patient};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{HealthData, MetricReading, MetricType, MetricValue, Role, User};
use crate::validation::ValidatedJson;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordMetricRequest {
    pub value: MetricValue,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

fn parse_metric(raw: &str) -> Result<MetricType, ApiError> {
    raw.parse::<MetricType>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Writes are limited to the patient and their own doctor; admins only read
fn can_record(auth: &AuthUser, patient: &User) -> bool {
    match auth.role {
        Role::Patient => auth.id == patient.id(),
        Role::Doctor => patient.doctor_id.as_deref() == Some(auth.id.as_str()),
        Role::Admin => false,
    }
}

async fn writable_patient(
    state: &AppState,
    auth: &AuthUser,
    patient_id: &str,
) -> Result<User, ApiError> {
    let patient = load_patient(&state.db, patient_id).await?;
    if !can_record(auth, &patient) {
        tracing::warn!(user_id = %auth.id, patient_id, "health data write denied");
        return Err(ApiError::forbidden());
    }
    Ok(patient)
}

/// GET /api/health-data/:patient_id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(patient_id): Path<String>,
) -> Result<Json<HealthData>, ApiError> {
    viewable_patient(&state.db, &auth, &patient_id).await?;

    let data = state
        .db
        .find::<HealthData>(&patient_id)
        .await?
        .unwrap_or_else(|| HealthData::empty(patient_id.as_str()));

    Ok(Json(data))
}

/// PUT /api/health-data/:patient_id/:metric
pub async fn record_metric(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((patient_id, metric)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<RecordMetricRequest>,
) -> Result<Json<HealthData>, ApiError> {
    let metric = parse_metric(&metric)?;
    writable_patient(&state, &auth, &patient_id).await?;
    req.value
        .check(metric)
        .map_err(|msg| ApiError::validation("value", msg))?;

    let mut data = state
        .db
        .find::<HealthData>(&patient_id)
        .await?
        .unwrap_or_else(|| HealthData::empty(patient_id.as_str()));

    data.metrics.insert(
        metric,
        MetricReading {
            value: req.value,
            unit: req
                .unit
                .unwrap_or_else(|| metric.default_unit().to_string()),
            timestamp: req.timestamp.unwrap_or_else(Utc::now),
            notes: req.notes,
        },
    );

    let saved = state.db.put(&patient_id, &data).await?;
    tracing::info!(patient_id = %patient_id, metric = metric.as_str(), recorded_by = %auth.id, "health metric recorded");

    Ok(Json(saved))
}

/// DELETE /api/health-data/:patient_id/:metric
pub async fn delete_metric(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((patient_id, metric)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let metric = parse_metric(&metric)?;
    writable_patient(&state, &auth, &patient_id).await?;

    let mut data = state
        .db
        .find::<HealthData>(&patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Metric"))?;
    if data.metrics.remove(&metric).is_none() {
        return Err(ApiError::not_found("Metric"));
    }

    state.db.put(&patient_id, &data).await?;
    tracing::info!(patient_id = %patient_id, metric = metric.as_str(), "health metric removed");

    Ok(StatusCode::NO_CONTENT)
}
