//! Visit snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nutrition::NutritionMetrics;

/// An immutable measurement snapshot for one patient.
///
/// Metrics are computed once at creation and stored as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub visit_id: String,
    pub patient_id: String,
    pub visit_date: DateTime<Utc>,
    pub weight_kg: f64,
    pub body_fat_percent: Option<f64>,
    pub metrics: NutritionMetrics,
    pub diet_plan_id: Option<String>,
    pub training_plan_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Latest visit of a patient, for dashboard listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatestVisit {
    pub patient_id: String,
    pub patient_name: String,
    pub visit: Visit,
}
