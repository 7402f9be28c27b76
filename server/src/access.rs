//! Role and ownership checks shared by the handlers.

use crate::auth::AuthUser;
use crate::db::Database;
use crate::error::ApiError;
use crate::models::{Role, User};

pub fn ensure_role(user: &AuthUser, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, role = %user.role, "role not permitted");
        Err(ApiError::forbidden())
    }
}

/// Load a user that must exist and be a patient
pub async fn load_patient(db: &Database, patient_id: &str) -> Result<User, ApiError> {
    db.find::<User>(patient_id)
        .await?
        .filter(|u| u.role == Role::Patient)
        .ok_or_else(|| ApiError::not_found("Patient"))
}

/// Admin, the patient themselves, or the patient's doctor
pub fn can_view_patient(user: &AuthUser, patient: &User) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Patient => user.id == patient.id(),
        Role::Doctor => patient.doctor_id.as_deref() == Some(user.id.as_str()),
    }
}

/// Admin or the patient's doctor
pub fn can_manage_patient(user: &AuthUser, patient: &User) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Doctor => patient.doctor_id.as_deref() == Some(user.id.as_str()),
        Role::Patient => false,
    }
}

/// Load a patient the caller may read, with 404 before 403
pub async fn viewable_patient(
    db: &Database,
    user: &AuthUser,
    patient_id: &str,
) -> Result<User, ApiError> {
    let patient = load_patient(db, patient_id).await?;
    if can_view_patient(user, &patient) {
        Ok(patient)
    } else {
        tracing::warn!(user_id = %user.id, patient_id, "patient access denied");
        Err(ApiError::forbidden())
    }
}

/// Whether two accounts may exchange chat messages
pub fn can_chat(a: &User, b: &User) -> bool {
    if a.id() == b.id() || !a.is_active || !b.is_active {
        return false;
    }
    match (a.role, b.role) {
        (Role::Admin, _) | (_, Role::Admin) => true,
        (Role::Doctor, Role::Patient) => b.doctor_id.as_deref() == Some(a.id()),
        (Role::Patient, Role::Doctor) => a.doctor_id.as_deref() == Some(b.id()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Role, doctor_id: Option<&str>) -> User {
        let mut u = User::new(role, id, "hash".into());
        u.id = Some(id.into());
        u.doctor_id = doctor_id.map(String::from);
        u
    }

    #[test]
    fn patient_visibility() {
        let patient = user("p1", Role::Patient, Some("d1"));
        let own_doctor = AuthUser::from(&user("d1", Role::Doctor, None));
        let other_doctor = AuthUser::from(&user("d2", Role::Doctor, None));
        let admin = AuthUser::from(&user("a", Role::Admin, None));
        let same_patient = AuthUser::from(&patient);
        let other_patient = AuthUser::from(&user("p2", Role::Patient, Some("d1")));

        assert!(can_view_patient(&own_doctor, &patient));
        assert!(can_view_patient(&admin, &patient));
        assert!(can_view_patient(&same_patient, &patient));
        assert!(!can_view_patient(&other_doctor, &patient));
        assert!(!can_view_patient(&other_patient, &patient));

        assert!(can_manage_patient(&own_doctor, &patient));
        assert!(!can_manage_patient(&same_patient, &patient));
    }

    #[test]
    fn chat_pairs() {
        let doctor = user("d1", Role::Doctor, None);
        let patient = user("p1", Role::Patient, Some("d1"));
        let stranger = user("p2", Role::Patient, Some("d9"));
        let admin = user("a", Role::Admin, None);

        assert!(can_chat(&doctor, &patient));
        assert!(can_chat(&patient, &doctor));
        assert!(!can_chat(&doctor, &stranger));
        assert!(!can_chat(&patient, &stranger));
        assert!(can_chat(&admin, &stranger));
        assert!(!can_chat(&doctor, &doctor));
    }

    #[test]
    fn role_guard() {
        let doctor = AuthUser::from(&user("d1", Role::Doctor, None));
        assert!(ensure_role(&doctor, &[Role::Doctor, Role::Admin]).is_ok());
        assert!(matches!(
            ensure_role(&doctor, &[Role::Admin]),
            Err(ApiError::Forbidden(_))
        ));
    }
}
