//! Appointment database operations.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_column, Database, DbError, DbResult};
use crate::models::{Appointment, AppointmentStatus};

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, doctor_id, date, time, purpose, patient_name,
    status, created_at, updated_at
"#;

impl Database {
    /// Insert an appointment.
    pub fn insert_appointment(&self, appt: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                appointment_id, doctor_id, date, time, purpose, patient_name,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                appt.appointment_id,
                appt.doctor_id,
                appt.date,
                appt.time,
                appt.purpose,
                appt.patient_name,
                appt.status.as_str(),
                appt.created_at,
                appt.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, appointment_id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM appointments WHERE appointment_id = ?",
                    APPOINTMENT_COLUMNS
                ),
                [appointment_id],
                AppointmentRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a doctor's appointments in chronological order, optionally
    /// bounded by an inclusive date range.
    pub fn list_appointments(
        &self,
        doctor_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM appointments
            WHERE doctor_id = ?1
              AND (?2 IS NULL OR date >= ?2)
              AND (?3 IS NULL OR date <= ?3)
            ORDER BY date, time
            "#,
            APPOINTMENT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![doctor_id, from, to], AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }

    /// Change an appointment's status.
    pub fn set_appointment_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET status = ?, updated_at = datetime('now')
            WHERE appointment_id = ?
            "#,
            params![status.as_str(), appointment_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete an appointment.
    pub fn delete_appointment(&self, appointment_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM appointments WHERE appointment_id = ?",
            [appointment_id],
        )?;
        Ok(rows_affected > 0)
    }
}

struct AppointmentRow {
    appointment_id: String,
    doctor_id: String,
    date: NaiveDate,
    time: NaiveTime,
    purpose: String,
    patient_name: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            appointment_id: row.get(0)?,
            doctor_id: row.get(1)?,
            date: row.get(2)?,
            time: row.get(3)?,
            purpose: row.get(4)?,
            patient_name: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            appointment_id: row.appointment_id,
            doctor_id: row.doctor_id,
            date: row.date,
            time: row.time,
            purpose: row.purpose,
            patient_name: row.patient_name,
            status: parse_column(&row.status, "appointment status", AppointmentStatus::from_db)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
