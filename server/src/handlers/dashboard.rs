use std::collections::BTreeMap;

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::Filter;
use crate::error::ApiError;
use crate::handlers::chat::unread_for;
use crate::handlers::followups::scope_filters;
use crate::models::{FollowUp, HealthData, Prescription, PrescriptionStatus, Role, User};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStats {
    pub total_patients: usize,
    pub active_prescriptions: usize,
    pub total_prescriptions: usize,
    pub upcoming_follow_ups: usize,
    pub today_follow_ups: usize,
    pub unread_messages: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientStats {
    pub active_prescriptions: usize,
    pub upcoming_follow_ups: usize,
    pub unread_messages: usize,
    pub health_metrics_recorded: usize,
    pub has_doctor: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: usize,
    pub users_by_role: BTreeMap<String, usize>,
    pub total_prescriptions: usize,
    pub total_follow_ups: usize,
}

/// Tagged by role so clients can switch on `role`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardStats {
    Doctor(DoctorStats),
    Patient(PatientStats),
    Admin(AdminStats),
}

/// GET /api/dashboard/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DashboardStats>, ApiError> {
    let db = &state.db;
    let today = Utc::now().date_naive();

    let stats = match auth.role {
        Role::Doctor => {
            let follow_ups = db.find_by::<FollowUp>(&scope_filters(&auth)).await?;
            let mine = Filter::eq("doctorId", auth.id.as_str());
            DashboardStats::Doctor(DoctorStats {
                total_patients: db
                    .count::<User>(&[Filter::eq("role", Role::Patient.as_str()), mine.clone()])
                    .await?,
                active_prescriptions: db
                    .count::<Prescription>(&[
                        mine.clone(),
                        Filter::eq("status", PrescriptionStatus::Active.as_str()),
                    ])
                    .await?,
                total_prescriptions: db.count::<Prescription>(&[mine]).await?,
                upcoming_follow_ups: follow_ups.iter().filter(|f| f.is_upcoming(today)).count(),
                today_follow_ups: follow_ups.iter().filter(|f| f.is_on(today)).count(),
                unread_messages: unread_for(db, &auth.id).await?.len(),
            })
        }
        Role::Patient => {
            let follow_ups = db.find_by::<FollowUp>(&scope_filters(&auth)).await?;
            let metrics = db
                .find::<HealthData>(&auth.id)
                .await?
                .map_or(0, |h| h.metrics.len());
            DashboardStats::Patient(PatientStats {
                active_prescriptions: db
                    .count::<Prescription>(&[
                        Filter::eq("patientId", auth.id.as_str()),
                        Filter::eq("status", PrescriptionStatus::Active.as_str()),
                    ])
                    .await?,
                upcoming_follow_ups: follow_ups.iter().filter(|f| f.is_upcoming(today)).count(),
                unread_messages: unread_for(db, &auth.id).await?.len(),
                health_metrics_recorded: metrics,
                has_doctor: auth.doctor_id.is_some(),
            })
        }
        Role::Admin => {
            let users = db.find_by::<User>(&[]).await?;
            let mut users_by_role = BTreeMap::new();
            for user in &users {
                *users_by_role.entry(user.role.to_string()).or_insert(0) += 1;
            }
            DashboardStats::Admin(AdminStats {
                total_users: users.len(),
                users_by_role,
                total_prescriptions: db.count::<Prescription>(&[]).await?,
                total_follow_ups: db.count::<FollowUp>(&[]).await?,
            })
        }
    };

    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stats_are_tagged_by_role() {
        let stats = DashboardStats::Patient(PatientStats {
            active_prescriptions: 2,
            upcoming_follow_ups: 1,
            unread_messages: 0,
            health_metrics_recorded: 3,
            has_doctor: true,
        });
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            json!({
                "role": "patient",
                "activePrescriptions": 2,
                "upcomingFollowUps": 1,
                "unreadMessages": 0,
                "healthMetricsRecorded": 3,
                "hasDoctor": true
            })
        );
    }
}
