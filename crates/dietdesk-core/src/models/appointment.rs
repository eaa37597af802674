//! Appointment models.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A scheduled slot in a doctor's calendar.
///
/// Not linked to a patient record; `patient_name` is free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub appointment_id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub purpose: String,
    pub patient_name: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    pub fn new(doctor_id: String, date: NaiveDate, time: NaiveTime, purpose: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            appointment_id: uuid::Uuid::new_v4().to_string(),
            doctor_id,
            date,
            time,
            purpose,
            patient_name: None,
            status: AppointmentStatus::Scheduled,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
