//! Doctor database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};

use super::{parse_column, Database, DbError, DbResult};
use crate::models::{Doctor, Tier};

const DOCTOR_COLUMNS: &str = r#"
    doctor_id, name, email, specialty, tier, subscription_active,
    period_start, period_end, created_at, updated_at
"#;

impl Database {
    /// Insert a new doctor. A duplicate email is a constraint violation.
    pub fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO doctors (
                doctor_id, name, email, specialty, tier, subscription_active,
                period_start, period_end, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                doctor.doctor_id,
                doctor.name,
                doctor.email,
                doctor.specialty,
                doctor.tier.as_str(),
                doctor.subscription_active,
                doctor.period_start,
                doctor.period_end,
                doctor.created_at,
                doctor.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::Constraint(format!(
                    "Doctor email already registered: {}",
                    doctor.email
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, doctor_id: &str) -> DbResult<Option<Doctor>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM doctors WHERE doctor_id = ?", DOCTOR_COLUMNS),
                [doctor_id],
                DoctorRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a doctor by login email.
    pub fn get_doctor_by_email(&self, email: &str) -> DbResult<Option<Doctor>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM doctors WHERE email = ?", DOCTOR_COLUMNS),
                [email],
                DoctorRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Change tier, active flag and billing period.
    pub fn update_subscription(
        &self,
        doctor_id: &str,
        tier: Tier,
        active: bool,
        period_start: Option<DateTime<Utc>>,
        period_end: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE doctors SET
                tier = ?2,
                subscription_active = ?3,
                period_start = ?4,
                period_end = ?5,
                updated_at = datetime('now')
            WHERE doctor_id = ?1
            "#,
            params![doctor_id, tier.as_str(), active, period_start, period_end],
        )?;
        Ok(rows_affected > 0)
    }

    /// List all doctors.
    pub fn list_doctors(&self) -> DbResult<Vec<Doctor>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM doctors ORDER BY name", DOCTOR_COLUMNS))?;

        let rows = stmt.query_map([], DoctorRow::from_row)?;

        let mut doctors = Vec::new();
        for row in rows {
            doctors.push(row?.try_into()?);
        }
        Ok(doctors)
    }
}

/// Intermediate row struct for database mapping.
struct DoctorRow {
    doctor_id: String,
    name: String,
    email: String,
    specialty: Option<String>,
    tier: String,
    subscription_active: bool,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    created_at: String,
    updated_at: String,
}

impl DoctorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            doctor_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            specialty: row.get(3)?,
            tier: row.get(4)?,
            subscription_active: row.get(5)?,
            period_start: row.get(6)?,
            period_end: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<DoctorRow> for Doctor {
    type Error = DbError;

    fn try_from(row: DoctorRow) -> Result<Self, Self::Error> {
        Ok(Doctor {
            doctor_id: row.doctor_id,
            name: row.name,
            email: row.email,
            specialty: row.specialty,
            tier: parse_column(&row.tier, "tier", Tier::from_db)?,
            subscription_active: row.subscription_active,
            period_start: row.period_start,
            period_end: row.period_end,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let mut doctor = Doctor::new("Dr. Martin".into(), "martin@cabinet.fr".into(), Tier::Premium);
        doctor.specialty = Some("Nutrition".into());
        db.insert_doctor(&doctor).unwrap();

        let retrieved = db.get_doctor(&doctor.doctor_id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Dr. Martin");
        assert_eq!(retrieved.tier, Tier::Premium);
        assert!(retrieved.subscription_active);
        assert_eq!(retrieved.specialty, Some("Nutrition".into()));

        let by_email = db.get_doctor_by_email("martin@cabinet.fr").unwrap().unwrap();
        assert_eq!(by_email.doctor_id, doctor.doctor_id);
    }

    #[test]
    fn test_duplicate_email() {
        let db = Database::open_in_memory().unwrap();
        let first = Doctor::new("Dr. A".into(), "same@cabinet.fr".into(), Tier::Pro);
        let second = Doctor::new("Dr. B".into(), "same@cabinet.fr".into(), Tier::Pro);
        db.insert_doctor(&first).unwrap();
        assert!(matches!(db.insert_doctor(&second), Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_update_subscription() {
        let db = Database::open_in_memory().unwrap();
        let doctor = Doctor::new("Dr. Martin".into(), "martin@cabinet.fr".into(), Tier::Essentiel);
        db.insert_doctor(&doctor).unwrap();

        let start = Utc::now();
        let end = start + Duration::days(30);
        assert!(db
            .update_subscription(&doctor.doctor_id, Tier::Pro, false, Some(start), Some(end))
            .unwrap());

        let retrieved = db.get_doctor(&doctor.doctor_id).unwrap().unwrap();
        assert_eq!(retrieved.tier, Tier::Pro);
        assert!(!retrieved.subscription_active);
        assert_eq!(retrieved.period_end, Some(end));

        assert!(!db
            .update_subscription("missing", Tier::Pro, true, None, None)
            .unwrap());
    }

    #[test]
    fn test_get_missing() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_doctor("missing").unwrap().is_none());
    }
}
