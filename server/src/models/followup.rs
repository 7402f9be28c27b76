use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    Missed,
}

impl FollowUpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpStatus::Scheduled => "scheduled",
            FollowUpStatus::Completed => "completed",
            FollowUpStatus::Cancelled => "cancelled",
            FollowUpStatus::Missed => "missed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub patient_id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    /// 24h `HH:MM`
    pub time: String,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub priority: FollowUpPriority,
    #[serde(default)]
    pub status: FollowUpStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for FollowUp {
    const COLLECTION: &'static str = "followups";
}

impl FollowUp {
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.status == FollowUpStatus::Scheduled && self.date >= today
    }

    pub fn is_on(&self, day: NaiveDate) -> bool {
        self.status == FollowUpStatus::Scheduled && self.date == day
    }

    /// Sort key; `HH:MM` orders correctly as text
    pub fn slot(&self) -> (NaiveDate, &str) {
        (self.date, self.time.as_str())
    }
}
