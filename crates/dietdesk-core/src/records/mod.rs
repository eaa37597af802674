//! Input validation and record assembly.
//!
//! Raw request values (free-text enums, measurements) become domain records
//! here; nothing reaches the database without passing through these checks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Patient, Visit};
use crate::nutrition::{self, MetricInput, Normalizer, UnknownTerm};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<UnknownTerm> for ValidationError {
    fn from(term: UnknownTerm) -> Self {
        Self::new(term.field, format!("unrecognised value {:?}", term.value))
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Patient fields as submitted, enum fields still free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub sex: String,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
    pub weekly_rate_kg: Option<f64>,
    pub pathologies: Option<String>,
    pub allergies: Option<String>,
}

/// A visit as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitInput {
    pub patient_id: String,
    /// Defaults to the recording time.
    pub visit_date: Option<DateTime<Utc>>,
    pub weight_kg: f64,
    pub body_fat_percent: Option<f64>,
    pub diet_plan_id: Option<String>,
    pub training_plan_id: Option<String>,
    pub notes: Option<String>,
}

/// Normalize and validate a new patient for `doctor_id`.
pub fn build_patient(
    doctor_id: &str,
    input: NewPatient,
    normalizer: &Normalizer,
) -> ValidationResult<Patient> {
    let first_name = required_text("firstName", &input.first_name)?;
    let last_name = required_text("lastName", &input.last_name)?;
    let sex = normalizer.sex(&input.sex)?;

    let mut patient = Patient::new(doctor_id.to_string(), first_name, last_name, sex);
    patient.birth_date = input.birth_date;
    patient.height_cm = input.height_cm;
    patient.activity_level = normalizer.optional_activity_level(input.activity_level.as_deref())?;
    patient.goal = normalizer.optional_goal(input.goal.as_deref())?;
    patient.weekly_rate_kg = input.weekly_rate_kg;
    patient.pathologies = input.pathologies.filter(|s| !s.trim().is_empty());
    patient.allergies = input.allergies.filter(|s| !s.trim().is_empty());

    validate_patient(&patient, Utc::now().date_naive())?;
    Ok(patient)
}

/// Checks shared by creation and update.
pub fn validate_patient(patient: &Patient, today: NaiveDate) -> ValidationResult<()> {
    if patient.first_name.trim().is_empty() {
        return Err(ValidationError::new("firstName", "must not be empty"));
    }
    if patient.last_name.trim().is_empty() {
        return Err(ValidationError::new("lastName", "must not be empty"));
    }
    if let Some(height) = patient.height_cm {
        positive("heightCm", height)?;
    }
    if let Some(rate) = patient.weekly_rate_kg {
        if !rate.is_finite() {
            return Err(ValidationError::new("weeklyRateKg", "must be a number"));
        }
    }
    if let Some(birth) = patient.birth_date {
        if birth > today {
            return Err(ValidationError::new("birthDate", "must not be in the future"));
        }
    }
    Ok(())
}

/// Validate a visit and compute its metrics from the patient's profile.
///
/// Plan references are checked by the caller, which owns the store.
pub fn assemble_visit(
    patient: &Patient,
    input: VisitInput,
    now: DateTime<Utc>,
) -> ValidationResult<Visit> {
    let metric_input = MetricInput {
        weight_kg: input.weight_kg,
        height_cm: patient.height_cm,
        body_fat_percent: input.body_fat_percent,
        activity_level: patient.activity_level,
        goal: patient.goal,
        weekly_rate_kg: patient.weekly_rate_kg,
    };
    validate_measurements(&metric_input)?;
    let metrics = nutrition::compute(&metric_input);

    Ok(Visit {
        visit_id: uuid::Uuid::new_v4().to_string(),
        patient_id: patient.patient_id.clone(),
        visit_date: input.visit_date.unwrap_or(now),
        weight_kg: input.weight_kg,
        body_fat_percent: input.body_fat_percent,
        metrics,
        diet_plan_id: input.diet_plan_id,
        training_plan_id: input.training_plan_id,
        notes: input.notes.filter(|n| !n.trim().is_empty()),
        created_at: now.to_rfc3339(),
    })
}

/// Range checks on calculator input. `compute` assumes these hold.
pub fn validate_measurements(input: &MetricInput) -> ValidationResult<()> {
    positive("weightKg", input.weight_kg)?;
    if let Some(height) = input.height_cm {
        positive("heightCm", height)?;
    }
    if let Some(bf) = input.body_fat_percent {
        if !bf.is_finite() || !(0.0..100.0).contains(&bf) {
            return Err(ValidationError::new(
                "bodyFatPercent",
                "must be between 0 and 100",
            ));
        }
    }
    if let Some(rate) = input.weekly_rate_kg {
        if !rate.is_finite() {
            return Err(ValidationError::new("weeklyRateKg", "must be a number"));
        }
    }
    Ok(())
}

fn required_text(field: &str, value: &str) -> ValidationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn positive(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new(field, "must be greater than zero"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientStatus, Sex};
    use crate::nutrition::{ActivityLevel, Goal};

    fn new_patient() -> NewPatient {
        NewPatient {
            first_name: " Claire ".into(),
            last_name: "Dubois".into(),
            sex: "Femme".into(),
            height_cm: Some(175.0),
            activity_level: Some("modéré".into()),
            goal: Some("perte de poids".into()),
            weekly_rate_kg: Some(0.5),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_patient_normalizes() {
        let patient = build_patient("doc-1", new_patient(), &Normalizer::new()).unwrap();
        assert_eq!(patient.first_name, "Claire");
        assert_eq!(patient.sex, Sex::Female);
        assert_eq!(patient.activity_level, Some(ActivityLevel::Moderate));
        assert_eq!(patient.goal, Some(Goal::Lose));
        assert_eq!(patient.status, PatientStatus::Ongoing);
        assert_eq!(patient.doctor_id, "doc-1");
    }

    #[test]
    fn test_build_patient_rejects_unknown_term() {
        let mut input = new_patient();
        input.goal = Some("fly".into());
        let err = build_patient("doc-1", input, &Normalizer::new()).unwrap_err();
        assert_eq!(err.field, "goal");
    }

    #[test]
    fn test_build_patient_rejects_bad_height() {
        let mut input = new_patient();
        input.height_cm = Some(0.0);
        let err = build_patient("doc-1", input, &Normalizer::new()).unwrap_err();
        assert_eq!(err.field, "heightCm");

        let mut input = new_patient();
        input.last_name = "  ".into();
        let err = build_patient("doc-1", input, &Normalizer::new()).unwrap_err();
        assert_eq!(err.field, "lastName");
    }

    #[test]
    fn test_assemble_visit_computes_metrics() {
        let patient = build_patient("doc-1", new_patient(), &Normalizer::new()).unwrap();
        let now = Utc::now();
        let visit = assemble_visit(
            &patient,
            VisitInput {
                patient_id: patient.patient_id.clone(),
                weight_kg: 70.0,
                body_fat_percent: Some(20.0),
                ..Default::default()
            },
            now,
        )
        .unwrap();

        assert_eq!(visit.visit_date, now);
        assert_eq!(visit.metrics.bmi, Some(22.9));
        assert_eq!(visit.metrics.base_metabolism, Some(1579.6));
        assert_eq!(visit.metrics.active_metabolism, Some(2448.4));
        assert_eq!(visit.metrics.target_calories, Some(1898.4));
    }

    #[test]
    fn test_validate_measurements() {
        let base = MetricInput {
            weight_kg: 70.0,
            height_cm: Some(175.0),
            body_fat_percent: Some(20.0),
            activity_level: None,
            goal: None,
            weekly_rate_kg: Some(0.5),
        };
        assert!(validate_measurements(&base).is_ok());

        let cases = [
            (MetricInput { weight_kg: -1.0, ..base.clone() }, "weightKg"),
            (MetricInput { height_cm: Some(0.0), ..base.clone() }, "heightCm"),
            (MetricInput { height_cm: Some(-170.0), ..base.clone() }, "heightCm"),
            (MetricInput { body_fat_percent: Some(-5.0), ..base.clone() }, "bodyFatPercent"),
            (MetricInput { body_fat_percent: Some(120.0), ..base.clone() }, "bodyFatPercent"),
            (MetricInput { weekly_rate_kg: Some(f64::INFINITY), ..base.clone() }, "weeklyRateKg"),
        ];
        for (input, field) in cases {
            assert_eq!(validate_measurements(&input).unwrap_err().field, field);
        }
    }

    #[test]
    fn test_assemble_visit_validation() {
        let patient = build_patient("doc-1", new_patient(), &Normalizer::new()).unwrap();
        let input = |weight, bf| VisitInput {
            patient_id: patient.patient_id.clone(),
            weight_kg: weight,
            body_fat_percent: bf,
            ..Default::default()
        };

        let err = assemble_visit(&patient, input(0.0, None), Utc::now()).unwrap_err();
        assert_eq!(err.field, "weightKg");
        let err = assemble_visit(&patient, input(70.0, Some(100.0)), Utc::now()).unwrap_err();
        assert_eq!(err.field, "bodyFatPercent");
        let err = assemble_visit(&patient, input(f64::NAN, None), Utc::now()).unwrap_err();
        assert_eq!(err.field, "weightKg");
    }

    #[test]
    fn test_visit_without_body_fat() {
        let patient = build_patient("doc-1", new_patient(), &Normalizer::new()).unwrap();
        let visit = assemble_visit(
            &patient,
            VisitInput {
                patient_id: patient.patient_id.clone(),
                weight_kg: 70.0,
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(visit.metrics.bmi, Some(22.9));
        assert_eq!(visit.metrics.base_metabolism, None);
    }
}
