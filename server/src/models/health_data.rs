use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Steps,
    HeartRate,
    Sleep,
    BloodPressure,
    Weight,
    Temperature,
}

impl MetricType {
    pub const ALL: [MetricType; 6] = [
        MetricType::Steps,
        MetricType::HeartRate,
        MetricType::Sleep,
        MetricType::BloodPressure,
        MetricType::Weight,
        MetricType::Temperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Steps => "steps",
            MetricType::HeartRate => "heart_rate",
            MetricType::Sleep => "sleep",
            MetricType::BloodPressure => "blood_pressure",
            MetricType::Weight => "weight",
            MetricType::Temperature => "temperature",
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            MetricType::Steps => "steps",
            MetricType::HeartRate => "bpm",
            MetricType::Sleep => "hours",
            MetricType::BloodPressure => "mmHg",
            MetricType::Weight => "kg",
            MetricType::Temperature => "°C",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric type: {0}")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricType {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    BloodPressure { systolic: f64, diastolic: f64 },
    Number(f64),
}

impl MetricValue {
    /// Whether this value shape fits `metric`, and its numbers are sane
    pub fn check(&self, metric: MetricType) -> Result<(), String> {
        match (metric, self) {
            (MetricType::BloodPressure, MetricValue::BloodPressure { systolic, diastolic }) => {
                if *systolic <= 0.0 || *diastolic <= 0.0 {
                    Err("Blood pressure values must be positive".to_string())
                } else if diastolic >= systolic {
                    Err("Systolic must be greater than diastolic".to_string())
                } else {
                    Ok(())
                }
            }
            (MetricType::BloodPressure, MetricValue::Number(_)) => {
                Err("Blood pressure needs systolic and diastolic values".to_string())
            }
            (_, MetricValue::BloodPressure { .. }) => {
                Err(format!("{} takes a single numeric value", metric.as_str()))
            }
            (_, MetricValue::Number(n)) if !n.is_finite() || *n < 0.0 => {
                Err(format!("{} must be a non-negative number", metric.as_str()))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricReading {
    pub value: MetricValue,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Latest reading per metric for one patient. The document id is the patient id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub patient_id: String,
    #[serde(default)]
    pub metrics: BTreeMap<MetricType, MetricReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for HealthData {
    const COLLECTION: &'static str = "health_data";
}

impl HealthData {
    pub fn empty(patient_id: impl Into<String>) -> Self {
        Self {
            id: None,
            patient_id: patient_id.into(),
            metrics: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }
}
