//! Patient models and lifecycle status.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::nutrition::{ActivityLevel, Goal};

/// Days without a measurement before an ongoing follow-up lapses.
pub const INACTIVITY_THRESHOLD_DAYS: i64 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Follow-up status of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    /// No measurement for more than the inactivity threshold
    Inactive,
    Ongoing,
    Succeeded,
    /// Sticky: never changed automatically
    Abandoned,
}

impl PatientStatus {
    pub const ALL: [PatientStatus; 4] = [
        PatientStatus::Inactive,
        PatientStatus::Ongoing,
        PatientStatus::Succeeded,
        PatientStatus::Abandoned,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Ongoing => "ongoing",
            Self::Succeeded => "succeeded",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

/// Apply the automatic inactivity rule.
///
/// Only `ongoing` moves, and only to `inactive`, once strictly more than
/// [`INACTIVITY_THRESHOLD_DAYS`] have elapsed since the last measurement.
pub fn derive_status(
    current: PatientStatus,
    last_measurement: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> PatientStatus {
    match (current, last_measurement) {
        (PatientStatus::Ongoing, Some(last))
            if now.signed_duration_since(last).num_days() > INACTIVITY_THRESHOLD_DAYS =>
        {
            PatientStatus::Inactive
        }
        _ => current,
    }
}

/// A patient followed by one doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub patient_id: String,
    /// Owning doctor
    pub doctor_id: String,
    pub first_name: String,
    pub last_name: String,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<Goal>,
    /// Target weight change per week (kg)
    pub weekly_rate_kg: Option<f64>,
    pub pathologies: Option<String>,
    pub allergies: Option<String>,
    pub status: PatientStatus,
    pub last_measurement_at: Option<DateTime<Utc>>,
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(doctor_id: String, first_name: String, last_name: String, sex: Sex) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            patient_id: uuid::Uuid::new_v4().to_string(),
            doctor_id,
            first_name,
            last_name,
            sex,
            birth_date: None,
            height_cm: None,
            activity_level: None,
            goal: None,
            weekly_rate_kg: None,
            pathologies: None,
            allergies: None,
            status: PatientStatus::Ongoing,
            last_measurement_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on the given day.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }

    /// Re-evaluate the status; returns true if it changed.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> bool {
        let derived = derive_status(self.status, self.last_measurement_at, now);
        let changed = derived != self.status;
        self.status = derived;
        changed
    }

    /// Register a measurement taken at `at`.
    ///
    /// Keeps the latest date and revives a lapsed follow-up.
    pub fn record_measurement(&mut self, at: DateTime<Utc>) {
        if self.last_measurement_at.map_or(true, |last| at > last) {
            self.last_measurement_at = Some(at);
        }
        if self.status == PatientStatus::Inactive {
            self.status = PatientStatus::Ongoing;
        }
    }
}
