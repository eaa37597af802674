//! Dietdesk Core Library
//!
//! Records and rules for a nutrition medical practice: doctors on a
//! subscription tier, their patients, visit snapshots with computed
//! nutrition metrics, plans, appointments and AI diet suggestions.
//!
//! # Architecture
//!
//! ```text
//!   request (doctor id + raw fields)
//!          │
//!          ▼
//!   Normalizer ── free text → Goal / ActivityLevel / Sex / Tier
//!          │
//!          ▼
//!   records ── validation, Metric Calculator
//!          │
//!          ├──────────────► Meter ── per-feature monthly quota
//!          │                  (check + increment in one transaction)
//!          ▼
//!   Database (SQLite) ──► dashboard aggregates
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence
//! - [`models`]: Domain types (Doctor, Patient, Visit, plans, appointments)
//! - [`nutrition`]: Metric Calculator and vocabulary normalizer
//! - [`metering`]: Subscription Meter
//! - [`records`]: Input validation and visit assembly
//! - [`config`] / [`telemetry`]: environment configuration and logging

pub mod config;
pub mod db;
pub mod metering;
pub mod models;
pub mod nutrition;
pub mod records;
pub mod telemetry;

// Re-export commonly used types
pub use db::{Database, DayCount, StatusCount};
pub use metering::{Decision, DenyReason, Meter};
pub use models::{
    Appointment, AppointmentStatus, DietPlan, Doctor, Feature, LatestVisit, Meal, Patient,
    PatientStatus, Sex, Tier, TrainingDay, TrainingPlan, UsageSnapshot, Visit,
};
pub use nutrition::{ActivityLevel, Goal, MetricInput, Normalizer, NutritionMetrics};
pub use records::{NewPatient, ValidationError, VisitInput};

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dietdesk_llm::{DietGenerator, DietProfile, DietSuggestion, GenerationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Usage denied for {feature} ({used} used): {reason:?}")]
    Limit {
        feature: Feature,
        reason: DenyReason,
        used: u32,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("AI generation failed: {0}")]
    External(#[from] GenerationError),
}

impl PracticeError {
    /// Failures the caller cannot fix by changing the request.
    pub fn is_server_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Serialization(_) | Self::External(_)
        )
    }
}

impl From<db::DbError> for PracticeError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => PracticeError::NotFound(what),
            db::DbError::Json(e) => PracticeError::Serialization(e.to_string()),
            other => PracticeError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PracticeError {
    fn from(e: serde_json::Error) -> Self {
        PracticeError::Serialization(e.to_string())
    }
}

impl From<metering::MeterError> for PracticeError {
    fn from(e: metering::MeterError) -> Self {
        match e {
            metering::MeterError::DoctorNotFound(id) => {
                PracticeError::NotFound(format!("doctor {}", id))
            }
            metering::MeterError::Database(e) => e.into(),
        }
    }
}

impl From<nutrition::UnknownTerm> for PracticeError {
    fn from(e: nutrition::UnknownTerm) -> Self {
        PracticeError::Validation(e.into())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PracticeError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PracticeError::Database(format!("Lock poisoned: {}", e))
    }
}

pub type PracticeResult<T> = Result<T, PracticeError>;

// =========================================================================
// Request / Response Types
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub purpose: String,
    pub patient_name: Option<String>,
}

/// Overview of a doctor's practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub patients_by_status: Vec<StatusCount>,
    pub appointments_by_day: Vec<DayCount>,
    pub latest_visits: Vec<LatestVisit>,
    pub usage: Vec<UsageSnapshot>,
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe entry point; every operation takes the authenticated doctor id.
pub struct Practice {
    db: Arc<Mutex<Database>>,
    normalizer: Normalizer,
}

impl Practice {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> PracticeResult<Self> {
        Ok(Self::with_database(Database::open(path)?))
    }

    /// Create an in-memory practice (for testing).
    pub fn open_in_memory() -> PracticeResult<Self> {
        Ok(Self::with_database(Database::open_in_memory()?))
    }

    pub fn with_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            normalizer: Normalizer::new(),
        }
    }

    /// Replace the vocabulary normalizer (custom synonyms).
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    // =========================================================================
    // Doctor Operations
    // =========================================================================

    /// Register a doctor with an active subscription on `tier`.
    pub fn register_doctor(&self, name: &str, email: &str, tier: &str) -> PracticeResult<Doctor> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() {
            return Err(ValidationError::new("name", "must not be empty").into());
        }
        if !email.contains('@') {
            return Err(ValidationError::new("email", "must be an email address").into());
        }
        let tier = self.normalizer.tier(tier)?;

        let db = self.db.lock()?;
        if db.get_doctor_by_email(&email)?.is_some() {
            return Err(ValidationError::new("email", "already registered").into());
        }
        let doctor = Doctor::new(name.to_string(), email, tier);
        db.insert_doctor(&doctor)?;
        info!(doctor_id = %doctor.doctor_id, %tier, "Doctor registered");
        Ok(doctor)
    }

    pub fn get_doctor(&self, doctor_id: &str) -> PracticeResult<Doctor> {
        let db = self.db.lock()?;
        load_doctor(&db, doctor_id)
    }

    /// Change tier, active flag and billing period.
    pub fn update_subscription(
        &self,
        doctor_id: &str,
        tier: Tier,
        active: bool,
        period_start: Option<DateTime<Utc>>,
        period_end: Option<DateTime<Utc>>,
    ) -> PracticeResult<Doctor> {
        if let (Some(start), Some(end)) = (period_start, period_end) {
            if end < start {
                return Err(ValidationError::new("periodEnd", "must not precede periodStart").into());
            }
        }

        let db = self.db.lock()?;
        if !db.update_subscription(doctor_id, tier, active, period_start, period_end)? {
            return Err(PracticeError::NotFound(format!("doctor {}", doctor_id)));
        }
        info!(doctor_id, %tier, active, "Subscription updated");
        load_doctor(&db, doctor_id)
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn create_patient(&self, doctor_id: &str, input: NewPatient) -> PracticeResult<Patient> {
        let patient = records::build_patient(doctor_id, input, &self.normalizer)?;
        let db = self.db.lock()?;
        load_doctor(&db, doctor_id)?;
        db.insert_patient(&patient)?;
        debug!(patient_id = %patient.patient_id, doctor_id, "Patient created");
        Ok(patient)
    }

    /// Get a patient, applying the inactivity rule first.
    pub fn get_patient(&self, doctor_id: &str, patient_id: &str) -> PracticeResult<Patient> {
        let db = self.db.lock()?;
        let mut patient = owned_patient(&db, doctor_id, patient_id)?;
        if patient.refresh_status(Utc::now()) {
            db.set_patient_status(patient_id, patient.status)?;
            debug!(patient_id, status = patient.status.as_str(), "Patient status derived");
        }
        Ok(patient)
    }

    /// Save profile edits. Owner, measurement date and creation time are kept
    /// from the stored record; the inactivity rule runs before the write.
    pub fn update_patient(&self, doctor_id: &str, mut patient: Patient) -> PracticeResult<Patient> {
        let db = self.db.lock()?;
        let stored = owned_patient(&db, doctor_id, &patient.patient_id)?;

        patient.first_name = patient.first_name.trim().to_string();
        patient.last_name = patient.last_name.trim().to_string();
        patient.doctor_id = stored.doctor_id;
        patient.last_measurement_at = stored.last_measurement_at;
        patient.created_at = stored.created_at;
        records::validate_patient(&patient, Utc::now().date_naive())?;
        patient.refresh_status(Utc::now());

        db.update_patient(&patient)?;
        Ok(patient)
    }

    /// Explicit status change; the inactivity rule does not apply.
    pub fn set_patient_status(
        &self,
        doctor_id: &str,
        patient_id: &str,
        status: PatientStatus,
    ) -> PracticeResult<Patient> {
        let db = self.db.lock()?;
        let mut patient = owned_patient(&db, doctor_id, patient_id)?;
        db.set_patient_status(patient_id, status)?;
        info!(patient_id, from = patient.status.as_str(), to = status.as_str(), "Patient status set");
        patient.status = status;
        Ok(patient)
    }

    pub fn list_patients(&self, doctor_id: &str) -> PracticeResult<Vec<Patient>> {
        let db = self.db.lock()?;
        expire_stale(&db, doctor_id)?;
        Ok(db.list_patients(doctor_id)?)
    }

    /// Name prefix search.
    pub fn search_patients(
        &self,
        doctor_id: &str,
        prefix: &str,
        limit: usize,
    ) -> PracticeResult<Vec<Patient>> {
        let db = self.db.lock()?;
        expire_stale(&db, doctor_id)?;
        Ok(db.search_patients(doctor_id, prefix.trim(), limit)?)
    }

    /// Delete a patient and all of its visits.
    pub fn delete_patient(&self, doctor_id: &str, patient_id: &str) -> PracticeResult<()> {
        let db = self.db.lock()?;
        owned_patient(&db, doctor_id, patient_id)?;
        db.delete_patient(patient_id)?;
        info!(patient_id, doctor_id, "Patient deleted");
        Ok(())
    }

    // =========================================================================
    // Visit Operations
    // =========================================================================

    /// Validate, compute metrics, persist the snapshot and move the
    /// patient's measurement date, all in one transaction.
    pub fn record_visit(&self, doctor_id: &str, input: VisitInput) -> PracticeResult<Visit> {
        let db = self.db.lock()?;
        let tx = db.immediate_transaction()?;

        let mut patient = owned_patient(&db, doctor_id, &input.patient_id)?;
        if let Some(plan_id) = input.diet_plan_id.as_deref() {
            match db.get_diet_plan(plan_id)? {
                Some(plan) if plan.doctor_id == doctor_id => {}
                _ => return Err(PracticeError::NotFound(format!("diet plan {}", plan_id))),
            }
        }
        if let Some(plan_id) = input.training_plan_id.as_deref() {
            match db.get_training_plan(plan_id)? {
                Some(plan) if plan.doctor_id == doctor_id => {}
                _ => return Err(PracticeError::NotFound(format!("training plan {}", plan_id))),
            }
        }

        let now = Utc::now();
        let visit = records::assemble_visit(&patient, input, now)?;
        db.insert_visit(&visit)?;

        patient.record_measurement(visit.visit_date);
        patient.refresh_status(now);
        db.update_patient(&patient)?;

        tx.commit().map_err(db::DbError::from)?;
        info!(
            visit_id = %visit.visit_id,
            patient_id = %visit.patient_id,
            weight_kg = visit.weight_kg,
            "Visit recorded"
        );
        Ok(visit)
    }

    /// Visits of a patient, oldest first.
    pub fn list_visits(&self, doctor_id: &str, patient_id: &str) -> PracticeResult<Vec<Visit>> {
        let db = self.db.lock()?;
        owned_patient(&db, doctor_id, patient_id)?;
        Ok(db.list_visits(patient_id)?)
    }

    pub fn latest_visit(&self, doctor_id: &str, patient_id: &str) -> PracticeResult<Option<Visit>> {
        let db = self.db.lock()?;
        owned_patient(&db, doctor_id, patient_id)?;
        Ok(db.latest_visit(patient_id)?)
    }

    pub fn get_visit(&self, doctor_id: &str, visit_id: &str) -> PracticeResult<Visit> {
        let db = self.db.lock()?;
        owned_visit(&db, doctor_id, visit_id)
    }

    /// Replace a visit's notes; measurements cannot change.
    pub fn set_visit_notes(
        &self,
        doctor_id: &str,
        visit_id: &str,
        notes: Option<&str>,
    ) -> PracticeResult<Visit> {
        let db = self.db.lock()?;
        let mut visit = owned_visit(&db, doctor_id, visit_id)?;
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        db.set_visit_notes(visit_id, notes)?;
        visit.notes = notes.map(str::to_string);
        Ok(visit)
    }

    /// Latest visit of every patient of the doctor.
    pub fn latest_visits(&self, doctor_id: &str) -> PracticeResult<Vec<LatestVisit>> {
        let db = self.db.lock()?;
        Ok(db.latest_visits(doctor_id)?)
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Book an appointment; consumes one `appointments` unit.
    pub fn create_appointment(
        &self,
        doctor_id: &str,
        input: NewAppointment,
    ) -> PracticeResult<Appointment> {
        let purpose = input.purpose.trim();
        if purpose.is_empty() {
            return Err(ValidationError::new("purpose", "must not be empty").into());
        }

        let mut appointment =
            Appointment::new(doctor_id.to_string(), input.date, input.time, purpose.to_string());
        appointment.patient_name = input.patient_name.filter(|n| !n.trim().is_empty());

        let db = self.db.lock()?;
        metered(&db, doctor_id, Feature::Appointments, |db| {
            db.insert_appointment(&appointment)?;
            Ok(())
        })?;
        Ok(appointment)
    }

    /// Appointments in chronological order within an optional date range.
    pub fn list_appointments(
        &self,
        doctor_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> PracticeResult<Vec<Appointment>> {
        let db = self.db.lock()?;
        Ok(db.list_appointments(doctor_id, from, to)?)
    }

    pub fn set_appointment_status(
        &self,
        doctor_id: &str,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> PracticeResult<Appointment> {
        let db = self.db.lock()?;
        let mut appointment = owned_appointment(&db, doctor_id, appointment_id)?;
        db.set_appointment_status(appointment_id, status)?;
        appointment.status = status;
        Ok(appointment)
    }

    /// Remove an appointment. The consumed unit is not returned.
    pub fn delete_appointment(&self, doctor_id: &str, appointment_id: &str) -> PracticeResult<()> {
        let db = self.db.lock()?;
        owned_appointment(&db, doctor_id, appointment_id)?;
        db.delete_appointment(appointment_id)?;
        Ok(())
    }

    // =========================================================================
    // Plan Operations
    // =========================================================================

    /// Create a diet plan; consumes one `nutritionPlans` unit.
    pub fn create_diet_plan(
        &self,
        doctor_id: &str,
        name: &str,
        meals: Vec<Meal>,
    ) -> PracticeResult<DietPlan> {
        let name = plan_name(name)?;
        let invalid = |m: &&Meal| m.calories.is_some_and(|c| !c.is_finite() || c < 0.0);
        if let Some(meal) = meals.iter().find(invalid) {
            return Err(ValidationError::new(
                "meals",
                format!("{:?} calories must be a non-negative number", meal.slot),
            )
            .into());
        }
        let plan = DietPlan::new(doctor_id.to_string(), name, meals);

        let db = self.db.lock()?;
        metered(&db, doctor_id, Feature::NutritionPlans, |db| {
            db.insert_diet_plan(&plan)?;
            Ok(())
        })?;
        Ok(plan)
    }

    /// Create a training plan; consumes one `workoutPlans` unit.
    pub fn create_training_plan(
        &self,
        doctor_id: &str,
        name: &str,
        days: Vec<TrainingDay>,
    ) -> PracticeResult<TrainingPlan> {
        let name = plan_name(name)?;
        let plan = TrainingPlan::new(doctor_id.to_string(), name, days);

        let db = self.db.lock()?;
        metered(&db, doctor_id, Feature::WorkoutPlans, |db| {
            db.insert_training_plan(&plan)?;
            Ok(())
        })?;
        Ok(plan)
    }

    pub fn get_diet_plan(&self, doctor_id: &str, plan_id: &str) -> PracticeResult<DietPlan> {
        let db = self.db.lock()?;
        db.get_diet_plan(plan_id)?
            .filter(|p| p.doctor_id == doctor_id)
            .ok_or_else(|| PracticeError::NotFound(format!("diet plan {}", plan_id)))
    }

    pub fn get_training_plan(&self, doctor_id: &str, plan_id: &str) -> PracticeResult<TrainingPlan> {
        let db = self.db.lock()?;
        db.get_training_plan(plan_id)?
            .filter(|p| p.doctor_id == doctor_id)
            .ok_or_else(|| PracticeError::NotFound(format!("training plan {}", plan_id)))
    }

    pub fn list_diet_plans(&self, doctor_id: &str) -> PracticeResult<Vec<DietPlan>> {
        let db = self.db.lock()?;
        Ok(db.list_diet_plans(doctor_id)?)
    }

    pub fn list_training_plans(&self, doctor_id: &str) -> PracticeResult<Vec<TrainingPlan>> {
        let db = self.db.lock()?;
        Ok(db.list_training_plans(doctor_id)?)
    }

    pub fn delete_diet_plan(&self, doctor_id: &str, plan_id: &str) -> PracticeResult<()> {
        self.get_diet_plan(doctor_id, plan_id)?;
        let db = self.db.lock()?;
        db.delete_diet_plan(plan_id)?;
        Ok(())
    }

    pub fn delete_training_plan(&self, doctor_id: &str, plan_id: &str) -> PracticeResult<()> {
        self.get_training_plan(doctor_id, plan_id)?;
        let db = self.db.lock()?;
        db.delete_training_plan(plan_id)?;
        Ok(())
    }

    // =========================================================================
    // AI Operations
    // =========================================================================

    /// Ask the generator for a diet built on the patient's latest visit.
    ///
    /// Consumes one `aiDiets` unit; the unit is returned if generation fails.
    /// The database lock is not held during the call.
    pub fn generate_ai_diet(
        &self,
        doctor_id: &str,
        patient_id: &str,
        generator: &dyn DietGenerator,
    ) -> PracticeResult<DietSuggestion> {
        let profile = {
            let db = self.db.lock()?;
            let patient = owned_patient(&db, doctor_id, patient_id)?;
            let visit = db.latest_visit(patient_id)?.ok_or_else(|| {
                PracticeError::NotFound(format!("visit for patient {}", patient_id))
            })?;
            let profile = diet_profile(&patient, &visit, Utc::now().date_naive());
            consume(&db, doctor_id, Feature::AiDiets)?;
            profile
        };

        match generator.generate(&profile) {
            Ok(suggestion) => {
                info!(patient_id, model = %suggestion.model, "AI diet generated");
                Ok(suggestion)
            }
            Err(e) => {
                warn!(patient_id, error = %e, "AI diet generation failed");
                let db = self.db.lock()?;
                release(&db, doctor_id, Feature::AiDiets);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Metering Operations
    // =========================================================================

    pub fn usage_report(&self, doctor_id: &str) -> PracticeResult<Vec<UsageSnapshot>> {
        let db = self.db.lock()?;
        Ok(Meter::new(&db).usage(doctor_id)?)
    }

    /// Zero every counter unconditionally.
    pub fn reset_monthly_usage(&self) -> PracticeResult<usize> {
        let db = self.db.lock()?;
        Ok(Meter::new(&db).reset_all()?)
    }

    /// Reset counters only when `now` starts a new month.
    pub fn roll_over_usage(&self, now: DateTime<Utc>) -> PracticeResult<Option<usize>> {
        let db = self.db.lock()?;
        Ok(Meter::new(&db).roll_over(now)?)
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    pub fn dashboard(
        &self,
        doctor_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PracticeResult<Dashboard> {
        if to < from {
            return Err(ValidationError::new("to", "must not precede from").into());
        }
        let db = self.db.lock()?;
        expire_stale(&db, doctor_id)?;

        Ok(Dashboard {
            patients_by_status: db.count_patients_by_status(doctor_id)?,
            appointments_by_day: db.count_appointments_by_day(doctor_id, from, to)?,
            latest_visits: db.latest_visits(doctor_id)?,
            usage: Meter::new(&db).usage(doctor_id)?,
        })
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn load_doctor(db: &Database, doctor_id: &str) -> PracticeResult<Doctor> {
    db.get_doctor(doctor_id)?
        .ok_or_else(|| PracticeError::NotFound(format!("doctor {}", doctor_id)))
}

/// Another doctor's patient is reported as missing.
fn owned_patient(db: &Database, doctor_id: &str, patient_id: &str) -> PracticeResult<Patient> {
    db.get_patient(patient_id)?
        .filter(|p| p.doctor_id == doctor_id)
        .ok_or_else(|| PracticeError::NotFound(format!("patient {}", patient_id)))
}

fn owned_visit(db: &Database, doctor_id: &str, visit_id: &str) -> PracticeResult<Visit> {
    let not_found = || PracticeError::NotFound(format!("visit {}", visit_id));
    let visit = db.get_visit(visit_id)?.ok_or_else(not_found)?;
    owned_patient(db, doctor_id, &visit.patient_id).map_err(|_| not_found())?;
    Ok(visit)
}

fn owned_appointment(
    db: &Database,
    doctor_id: &str,
    appointment_id: &str,
) -> PracticeResult<Appointment> {
    db.get_appointment(appointment_id)?
        .filter(|a| a.doctor_id == doctor_id)
        .ok_or_else(|| PracticeError::NotFound(format!("appointment {}", appointment_id)))
}

fn expire_stale(db: &Database, doctor_id: &str) -> PracticeResult<()> {
    let expired = db.expire_inactive_patients(doctor_id, Utc::now())?;
    if expired > 0 {
        info!(doctor_id, expired, "Patients marked inactive");
    }
    Ok(())
}

fn plan_name(name: &str) -> PracticeResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::new("name", "must not be empty").into());
    }
    Ok(name.to_string())
}

fn consume(db: &Database, doctor_id: &str, feature: Feature) -> PracticeResult<()> {
    match Meter::new(db).check_and_consume(doctor_id, feature, Utc::now())? {
        Decision::Allowed { .. } => Ok(()),
        Decision::Denied { reason, used } => Err(PracticeError::Limit {
            feature,
            reason,
            used,
        }),
    }
}

fn release(db: &Database, doctor_id: &str, feature: Feature) {
    if let Err(e) = Meter::new(db).release(doctor_id, feature) {
        warn!(doctor_id, %feature, error = %e, "Failed to release usage");
    }
}

/// Run `op` after consuming one unit of `feature`, giving it back if `op` fails.
fn metered<T>(
    db: &Database,
    doctor_id: &str,
    feature: Feature,
    op: impl FnOnce(&Database) -> PracticeResult<T>,
) -> PracticeResult<T> {
    consume(db, doctor_id, feature)?;
    op(db).map_err(|e| {
        release(db, doctor_id, feature);
        e
    })
}

fn diet_profile(patient: &Patient, visit: &Visit, today: NaiveDate) -> DietProfile {
    DietProfile {
        sex: patient.sex.as_str().to_string(),
        age_years: patient.age_on(today),
        height_cm: patient.height_cm,
        weight_kg: visit.weight_kg,
        body_fat_percent: visit.body_fat_percent,
        activity_level: patient
            .activity_level
            .map(|a| a.as_str())
            .unwrap_or("unknown")
            .to_string(),
        goal: patient.goal.unwrap_or(Goal::Maintain).as_str().to_string(),
        weekly_rate_kg: patient.weekly_rate_kg.unwrap_or(0.0),
        pathologies: patient.pathologies.clone(),
        allergies: patient.allergies.clone(),
        bmi: visit.metrics.bmi,
        base_metabolism: visit.metrics.base_metabolism,
        active_metabolism: visit.metrics.active_metabolism,
        target_calories: visit.metrics.target_calories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(!PracticeError::NotFound("x".into()).is_server_failure());
        assert!(!PracticeError::Validation(ValidationError::new("f", "m")).is_server_failure());
        assert!(!PracticeError::Limit {
            feature: Feature::AiDiets,
            reason: DenyReason::LimitReached,
            used: 10
        }
        .is_server_failure());
        assert!(PracticeError::Database("locked".into()).is_server_failure());
        assert!(PracticeError::External(GenerationError::EmptyResponse).is_server_failure());
    }

    #[test]
    fn test_db_error_mapping() {
        let err: PracticeError = db::DbError::NotFound("patient p".into()).into();
        assert!(matches!(err, PracticeError::NotFound(_)));
        let err: PracticeError = metering::MeterError::DoctorNotFound("d".into()).into();
        assert!(matches!(err, PracticeError::NotFound(_)));
    }

    #[test]
    fn test_register_doctor_validation() {
        let practice = Practice::open_in_memory().unwrap();
        let doctor = practice
            .register_doctor("Dr. Martin", " Martin@Cabinet.fr ", "Premium")
            .unwrap();
        assert_eq!(doctor.email, "martin@cabinet.fr");
        assert_eq!(doctor.tier, Tier::Premium);

        let dup = practice.register_doctor("Dr. M", "martin@cabinet.fr", "pro");
        assert!(matches!(dup, Err(PracticeError::Validation(e)) if e.field == "email"));

        let bad_tier = practice.register_doctor("Dr. X", "x@cabinet.fr", "platinum");
        assert!(matches!(bad_tier, Err(PracticeError::Validation(e)) if e.field == "tier"));
    }

    #[test]
    fn test_metered_releases_on_failure() {
        let practice = Practice::open_in_memory().unwrap();
        let doctor = practice
            .register_doctor("Dr. Martin", "martin@cabinet.fr", "essentiel")
            .unwrap();
        let db = practice.db.lock().unwrap();

        let result: PracticeResult<()> = metered(&db, &doctor.doctor_id, Feature::NutritionPlans, |_| {
            Err(PracticeError::Database("disk full".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.usage_count(&doctor.doctor_id, Feature::NutritionPlans).unwrap(), 0);
    }

    #[test]
    fn test_diet_profile_defaults() {
        let patient = Patient::new("d".into(), "Luc".into(), "Bernard".into(), Sex::Male);
        let visit = Visit {
            visit_id: "v".into(),
            patient_id: patient.patient_id.clone(),
            visit_date: Utc::now(),
            weight_kg: 82.0,
            body_fat_percent: None,
            metrics: NutritionMetrics::default(),
            diet_plan_id: None,
            training_plan_id: None,
            notes: None,
            created_at: Utc::now().to_rfc3339(),
        };
        let profile = diet_profile(&patient, &visit, Utc::now().date_naive());
        assert_eq!(profile.goal, "maintain");
        assert_eq!(profile.activity_level, "unknown");
        assert_eq!(profile.weekly_rate_kg, 0.0);
        assert_eq!(profile.age_years, None);
    }
}
