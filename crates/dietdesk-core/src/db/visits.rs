//! Visit database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{LatestVisit, Visit};
use crate::nutrition::NutritionMetrics;

const VISIT_COLUMNS: &str = r#"
    v.visit_id, v.patient_id, v.visit_date, v.weight_kg, v.body_fat_percent,
    v.bmi, v.lean_mass_kg, v.base_metabolism, v.active_metabolism, v.target_calories,
    v.diet_plan_id, v.training_plan_id, v.notes, v.created_at
"#;

impl Database {
    /// Insert a visit snapshot.
    pub fn insert_visit(&self, visit: &Visit) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO visits (
                visit_id, patient_id, visit_date, weight_kg, body_fat_percent,
                bmi, lean_mass_kg, base_metabolism, active_metabolism, target_calories,
                diet_plan_id, training_plan_id, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                visit.visit_id,
                visit.patient_id,
                visit.visit_date,
                visit.weight_kg,
                visit.body_fat_percent,
                visit.metrics.bmi,
                visit.metrics.lean_mass_kg,
                visit.metrics.base_metabolism,
                visit.metrics.active_metabolism,
                visit.metrics.target_calories,
                visit.diet_plan_id,
                visit.training_plan_id,
                visit.notes,
                visit.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, visit_id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM visits v WHERE v.visit_id = ?", VISIT_COLUMNS),
                [visit_id],
                visit_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List a patient's visits, oldest first.
    pub fn list_visits(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM visits v WHERE v.patient_id = ? ORDER BY v.visit_date, v.created_at",
            VISIT_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], visit_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The visit with the greatest visit date for a patient.
    pub fn latest_visit(&self, patient_id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!(
                    r#"
                    SELECT {} FROM visits v
                    WHERE v.patient_id = ?
                    ORDER BY v.visit_date DESC, v.created_at DESC
                    LIMIT 1
                    "#,
                    VISIT_COLUMNS
                ),
                [patient_id],
                visit_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Latest visit of every patient of a doctor, most recent first.
    pub fn latest_visits(&self, doctor_id: &str) -> DbResult<Vec<LatestVisit>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            WITH ranked AS (
                SELECT v.*, ROW_NUMBER() OVER (
                    PARTITION BY v.patient_id
                    ORDER BY v.visit_date DESC, v.created_at DESC
                ) AS rn
                FROM visits v
            )
            SELECT {}, p.first_name || ' ' || p.last_name
            FROM ranked v
            JOIN patients p ON p.patient_id = v.patient_id
            WHERE v.rn = 1 AND p.doctor_id = ?
            ORDER BY v.visit_date DESC
            "#,
            VISIT_COLUMNS
        ))?;

        let rows = stmt.query_map([doctor_id], |row| {
            let visit = visit_from_row(row)?;
            Ok(LatestVisit {
                patient_id: visit.patient_id.clone(),
                patient_name: row.get(14)?,
                visit,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Replace the free-text notes of a visit. Measurements stay immutable.
    pub fn set_visit_notes(&self, visit_id: &str, notes: Option<&str>) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE visits SET notes = ? WHERE visit_id = ?",
            params![notes, visit_id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<Visit> {
    let visit_date: DateTime<Utc> = row.get(2)?;
    Ok(Visit {
        visit_id: row.get(0)?,
        patient_id: row.get(1)?,
        visit_date,
        weight_kg: row.get(3)?,
        body_fat_percent: row.get(4)?,
        metrics: NutritionMetrics {
            bmi: row.get(5)?,
            lean_mass_kg: row.get(6)?,
            base_metabolism: row.get(7)?,
            active_metabolism: row.get(8)?,
            target_calories: row.get(9)?,
        },
        diet_plan_id: row.get(10)?,
        training_plan_id: row.get(11)?,
        notes: row.get(12)?,
        created_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Doctor, Patient, Sex, Tier};
    use chrono::Duration;

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let doctor = Doctor::new("Dr. Martin".into(), "martin@cabinet.fr".into(), Tier::Premium);
        db.insert_doctor(&doctor).unwrap();
        let patient = Patient::new(doctor.doctor_id, "Claire".into(), "Dubois".into(), Sex::Female);
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    fn make_visit(patient_id: &str, at: DateTime<Utc>, weight: f64) -> Visit {
        Visit {
            visit_id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            visit_date: at,
            weight_kg: weight,
            body_fat_percent: Some(28.5),
            metrics: NutritionMetrics {
                bmi: Some(24.6),
                lean_mass_kg: Some(47.9),
                base_metabolism: Some(1404.6),
                active_metabolism: Some(1685.5),
                target_calories: Some(1135.5),
            },
            diet_plan_id: None,
            training_plan_id: None,
            notes: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let (db, patient) = setup_db();
        let visit = make_visit(&patient.patient_id, Utc::now(), 67.0);
        db.insert_visit(&visit).unwrap();

        let retrieved = db.get_visit(&visit.visit_id).unwrap().unwrap();
        assert_eq!(retrieved, visit);
    }

    #[test]
    fn test_list_ordered_and_latest() {
        let (db, patient) = setup_db();
        let now = Utc::now();

        let middle = make_visit(&patient.patient_id, now - Duration::days(14), 68.0);
        let latest = make_visit(&patient.patient_id, now, 67.0);
        let oldest = make_visit(&patient.patient_id, now - Duration::days(28), 69.5);
        for v in [&middle, &latest, &oldest] {
            db.insert_visit(v).unwrap();
        }

        let visits = db.list_visits(&patient.patient_id).unwrap();
        let weights: Vec<f64> = visits.iter().map(|v| v.weight_kg).collect();
        assert_eq!(weights, vec![69.5, 68.0, 67.0]);

        let found = db.latest_visit(&patient.patient_id).unwrap().unwrap();
        assert_eq!(found.visit_id, latest.visit_id);
    }

    #[test]
    fn test_latest_visits_per_patient() {
        let (db, claire) = setup_db();
        let luc = Patient::new(claire.doctor_id.clone(), "Luc".into(), "Bernard".into(), Sex::Male);
        db.insert_patient(&luc).unwrap();
        let now = Utc::now();

        db.insert_visit(&make_visit(&claire.patient_id, now - Duration::days(7), 68.0)).unwrap();
        let claire_latest = make_visit(&claire.patient_id, now - Duration::days(1), 67.5);
        db.insert_visit(&claire_latest).unwrap();
        let luc_latest = make_visit(&luc.patient_id, now - Duration::days(3), 91.0);
        db.insert_visit(&luc_latest).unwrap();

        let latest = db.latest_visits(&claire.doctor_id).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].visit.visit_id, claire_latest.visit_id);
        assert_eq!(latest[0].patient_name, "Claire Dubois");
        assert_eq!(latest[1].visit.visit_id, luc_latest.visit_id);
    }

    #[test]
    fn test_no_visit() {
        let (db, patient) = setup_db();
        assert!(db.latest_visit(&patient.patient_id).unwrap().is_none());
        assert!(db.list_visits(&patient.patient_id).unwrap().is_empty());
    }

    #[test]
    fn test_notes_editable() {
        let (db, patient) = setup_db();
        let visit = make_visit(&patient.patient_id, Utc::now(), 67.0);
        db.insert_visit(&visit).unwrap();

        assert!(db.set_visit_notes(&visit.visit_id, Some("Bonne évolution")).unwrap());
        let retrieved = db.get_visit(&visit.visit_id).unwrap().unwrap();
        assert_eq!(retrieved.notes, Some("Bonne évolution".into()));
        assert_eq!(retrieved.metrics, visit.metrics);
    }

    #[test]
    fn test_visits_removed_with_patient() {
        let (db, patient) = setup_db();
        let visit = make_visit(&patient.patient_id, Utc::now(), 67.0);
        db.insert_visit(&visit).unwrap();

        db.delete_patient(&patient.patient_id).unwrap();
        assert!(db.get_visit(&visit.visit_id).unwrap().is_none());
    }
}
