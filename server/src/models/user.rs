use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Patient => "patient",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_active() -> bool {
    true
}

/// Stored account. Carries credentials, so never serialize it to a client;
/// use [`UserProfile`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnic: Option<String>,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";
}

impl User {
    pub fn new(role: Role, name: impl Into<String>, password_hash: String) -> Self {
        Self {
            id: None,
            role,
            name: name.into(),
            email: None,
            cnic: None,
            password_hash,
            phone: None,
            gender: None,
            date_of_birth: None,
            address: None,
            specialization: None,
            license_number: None,
            doctor_id: None,
            fcm_token: None,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    /// Stored id; records read back from the store always have one
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// Client-facing view of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub role: Role,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnic: Option<String>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            role: user.role,
            name: user.name.clone(),
            email: user.email.clone(),
            cnic: user.cnic.clone(),
            phone: user.phone.clone(),
            gender: user.gender.clone(),
            date_of_birth: user.date_of_birth,
            address: user.address.clone(),
            specialization: user.specialization.clone(),
            license_number: user.license_number.clone(),
            doctor_id: user.doctor_id.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Digits-only CNIC, so `12345-1234567-1` and `1234512345671` match.
pub fn normalize_cnic(cnic: &str) -> String {
    cnic.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_never_carries_credentials() {
        let mut user = User::new(Role::Patient, "Ayesha", "hash".into());
        user.id = Some("u1".into());
        user.fcm_token = Some("device".into());
        let json = serde_json::to_value(user.profile()).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["role"], "patient");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("fcmToken").is_none());
    }

    #[test]
    fn stored_user_uses_camel_case() {
        let mut user = User::new(Role::Doctor, "Dr. Khan", "hash".into());
        user.license_number = Some("PMC-1".into());
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["passwordHash"], "hash");
        assert_eq!(json["licenseNumber"], "PMC-1");
        assert_eq!(json["isActive"], true);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn missing_is_active_defaults_to_true() {
        let user: User = serde_json::from_value(serde_json::json!({
            "role": "admin",
            "name": "Root",
            "passwordHash": "x"
        }))
        .unwrap();
        assert!(user.is_active);
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn cnic_normalization_strips_dashes() {
        assert_eq!(normalize_cnic("35202-1234567-1"), "3520212345671");
        assert_eq!(normalize_cnic("3520212345671"), "3520212345671");
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Dr.Khan@Clinic.PK "), "dr.khan@clinic.pk");
    }
}
