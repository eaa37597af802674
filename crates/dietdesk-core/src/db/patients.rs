//! Patient database operations.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_column, Database, DbError, DbResult};
use crate::models::{Patient, PatientStatus, Sex, INACTIVITY_THRESHOLD_DAYS};
use crate::nutrition::{ActivityLevel, Goal};

const PATIENT_COLUMNS: &str = r#"
    patient_id, doctor_id, first_name, last_name, sex, birth_date, height_cm,
    activity_level, goal, weekly_rate_kg, pathologies, allergies, status,
    last_measurement_at, created_at, updated_at
"#;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                patient_id, doctor_id, first_name, last_name, sex, birth_date, height_cm,
                activity_level, goal, weekly_rate_kg, pathologies, allergies, status,
                last_measurement_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                patient.patient_id,
                patient.doctor_id,
                patient.first_name,
                patient.last_name,
                patient.sex.as_str(),
                patient.birth_date,
                patient.height_cm,
                patient.activity_level.map(|a| a.as_str()),
                patient.goal.map(|g| g.as_str()),
                patient.weekly_rate_kg,
                patient.pathologies,
                patient.allergies,
                patient.status.as_str(),
                patient.last_measurement_at,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient (owner cannot change).
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                first_name = ?2,
                last_name = ?3,
                sex = ?4,
                birth_date = ?5,
                height_cm = ?6,
                activity_level = ?7,
                goal = ?8,
                weekly_rate_kg = ?9,
                pathologies = ?10,
                allergies = ?11,
                status = ?12,
                last_measurement_at = ?13,
                updated_at = datetime('now')
            WHERE patient_id = ?1
            "#,
            params![
                patient.patient_id,
                patient.first_name,
                patient.last_name,
                patient.sex.as_str(),
                patient.birth_date,
                patient.height_cm,
                patient.activity_level.map(|a| a.as_str()),
                patient.goal.map(|g| g.as_str()),
                patient.weekly_rate_kg,
                patient.pathologies,
                patient.allergies,
                patient.status.as_str(),
                patient.last_measurement_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Write a status directly, bypassing the inactivity rule.
    pub fn set_patient_status(&self, patient_id: &str, status: PatientStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE patients SET status = ?, updated_at = datetime('now') WHERE patient_id = ?",
            params![status.as_str(), patient_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE patient_id = ?", PATIENT_COLUMNS),
                [patient_id],
                PatientRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a doctor's patients by name.
    pub fn list_patients(&self, doctor_id: &str) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE doctor_id = ? ORDER BY last_name, first_name",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([doctor_id], PatientRow::from_row)?;
        collect_patients(rows)
    }

    /// Search a doctor's patients by first or last name (prefix match).
    pub fn search_patients(
        &self,
        doctor_id: &str,
        query: &str,
        limit: usize,
    ) -> DbResult<Vec<Patient>> {
        let pattern = format!("{}%", escape_like(query));
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM patients
            WHERE doctor_id = ?1
              AND (last_name LIKE ?2 ESCAPE '\' OR first_name LIKE ?2 ESCAPE '\')
            ORDER BY last_name, first_name
            LIMIT ?3
            "#,
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![doctor_id, pattern, limit as i64],
            PatientRow::from_row,
        )?;
        collect_patients(rows)
    }

    /// Mark a doctor's stale ongoing patients inactive in one statement.
    ///
    /// Same rule as [`crate::models::derive_status`]; returns rows changed.
    pub fn expire_inactive_patients(&self, doctor_id: &str, now: DateTime<Utc>) -> DbResult<usize> {
        let cutoff = now - Duration::days(INACTIVITY_THRESHOLD_DAYS + 1);
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET status = 'inactive', updated_at = datetime('now')
            WHERE doctor_id = ?1
              AND status = 'ongoing'
              AND last_measurement_at IS NOT NULL
              AND last_measurement_at <= ?2
            "#,
            params![doctor_id, cutoff],
        )?;
        Ok(rows_affected)
    }

    /// Delete a patient and its visits.
    pub fn delete_patient(&self, patient_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE patient_id = ?", [patient_id])?;
        Ok(rows_affected > 0)
    }
}

fn collect_patients(
    rows: impl Iterator<Item = rusqlite::Result<PatientRow>>,
) -> DbResult<Vec<Patient>> {
    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?.try_into()?);
    }
    Ok(patients)
}

/// Make `%`, `_` and the escape character match literally in a LIKE pattern.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    patient_id: String,
    doctor_id: String,
    first_name: String,
    last_name: String,
    sex: String,
    birth_date: Option<NaiveDate>,
    height_cm: Option<f64>,
    activity_level: Option<String>,
    goal: Option<String>,
    weekly_rate_kg: Option<f64>,
    pathologies: Option<String>,
    allergies: Option<String>,
    status: String,
    last_measurement_at: Option<DateTime<Utc>>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            patient_id: row.get(0)?,
            doctor_id: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            sex: row.get(4)?,
            birth_date: row.get(5)?,
            height_cm: row.get(6)?,
            activity_level: row.get(7)?,
            goal: row.get(8)?,
            weekly_rate_kg: row.get(9)?,
            pathologies: row.get(10)?,
            allergies: row.get(11)?,
            status: row.get(12)?,
            last_measurement_at: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            first_name: row.first_name,
            last_name: row.last_name,
            sex: parse_column(&row.sex, "sex", Sex::from_db)?,
            birth_date: row.birth_date,
            height_cm: row.height_cm,
            activity_level: row
                .activity_level
                .map(|a| parse_column(&a, "activity level", ActivityLevel::from_db))
                .transpose()?,
            goal: row
                .goal
                .map(|g| parse_column(&g, "goal", Goal::from_db))
                .transpose()?,
            weekly_rate_kg: row.weekly_rate_kg,
            pathologies: row.pathologies,
            allergies: row.allergies,
            status: parse_column(&row.status, "patient status", PatientStatus::from_db)?,
            last_measurement_at: row.last_measurement_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
