//! Aggregate queries backing the dashboard.

use chrono::NaiveDate;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{parse_column, Database, DbResult};
use crate::models::PatientStatus;

/// Number of appointments on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u32,
}

/// Number of patients in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: PatientStatus,
    pub count: u32,
}

impl Database {
    /// Appointments per day in an inclusive range. Cancelled slots are excluded.
    pub fn count_appointments_by_day(
        &self,
        doctor_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<DayCount>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, COUNT(*) FROM appointments
            WHERE doctor_id = ?1 AND date >= ?2 AND date <= ?3 AND status != 'cancelled'
            GROUP BY date
            ORDER BY date
            "#,
        )?;

        let rows = stmt.query_map(params![doctor_id, from, to], |row| {
            Ok(DayCount {
                date: row.get(0)?,
                count: row.get(1)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Patients per status, every status present (zero when empty).
    pub fn count_patients_by_status(&self, doctor_id: &str) -> DbResult<Vec<StatusCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM patients WHERE doctor_id = ? GROUP BY status",
        )?;
        let rows = stmt.query_map([doctor_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut counts: Vec<StatusCount> = PatientStatus::ALL
            .into_iter()
            .map(|status| StatusCount { status, count: 0 })
            .collect();
        for row in rows {
            let (status, count) = row?;
            let status = parse_column(&status, "patient status", PatientStatus::from_db)?;
            if let Some(entry) = counts.iter_mut().find(|c| c.status == status) {
                entry.count = count;
            }
        }
        Ok(counts)
    }
}
