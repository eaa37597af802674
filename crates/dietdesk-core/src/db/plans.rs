//! Diet and training plan database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{DietPlan, Meal, TrainingDay, TrainingPlan};

impl Database {
    /// Insert a diet plan.
    pub fn insert_diet_plan(&self, plan: &DietPlan) -> DbResult<()> {
        let meals_json = serde_json::to_string(&plan.meals)?;
        self.conn.execute(
            r#"
            INSERT INTO diet_plans (plan_id, doctor_id, name, meals, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                plan.plan_id,
                plan.doctor_id,
                plan.name,
                meals_json,
                plan.created_at,
                plan.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a diet plan by ID.
    pub fn get_diet_plan(&self, plan_id: &str) -> DbResult<Option<DietPlan>> {
        self.conn
            .query_row(
                r#"
                SELECT plan_id, doctor_id, name, meals, created_at, updated_at
                FROM diet_plans
                WHERE plan_id = ?
                "#,
                [plan_id],
                PlanRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a doctor's diet plans by name.
    pub fn list_diet_plans(&self, doctor_id: &str) -> DbResult<Vec<DietPlan>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT plan_id, doctor_id, name, meals, created_at, updated_at
            FROM diet_plans
            WHERE doctor_id = ?
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([doctor_id], PlanRow::from_row)?;

        let mut plans = Vec::new();
        for row in rows {
            plans.push(row?.try_into()?);
        }
        Ok(plans)
    }

    /// Delete a diet plan. Visits referencing it keep their measurements.
    pub fn delete_diet_plan(&self, plan_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM diet_plans WHERE plan_id = ?", [plan_id])?;
        Ok(rows_affected > 0)
    }

    /// Insert a training plan.
    pub fn insert_training_plan(&self, plan: &TrainingPlan) -> DbResult<()> {
        let days_json = serde_json::to_string(&plan.days)?;
        self.conn.execute(
            r#"
            INSERT INTO training_plans (plan_id, doctor_id, name, days, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                plan.plan_id,
                plan.doctor_id,
                plan.name,
                days_json,
                plan.created_at,
                plan.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a training plan by ID.
    pub fn get_training_plan(&self, plan_id: &str) -> DbResult<Option<TrainingPlan>> {
        self.conn
            .query_row(
                r#"
                SELECT plan_id, doctor_id, name, days, created_at, updated_at
                FROM training_plans
                WHERE plan_id = ?
                "#,
                [plan_id],
                PlanRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a doctor's training plans by name.
    pub fn list_training_plans(&self, doctor_id: &str) -> DbResult<Vec<TrainingPlan>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT plan_id, doctor_id, name, days, created_at, updated_at
            FROM training_plans
            WHERE doctor_id = ?
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([doctor_id], PlanRow::from_row)?;

        let mut plans = Vec::new();
        for row in rows {
            plans.push(row?.try_into()?);
        }
        Ok(plans)
    }

    /// Delete a training plan.
    pub fn delete_training_plan(&self, plan_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM training_plans WHERE plan_id = ?", [plan_id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row shared by both plan tables; `content` is the JSON column.
struct PlanRow {
    plan_id: String,
    doctor_id: String,
    name: String,
    content: String,
    created_at: String,
    updated_at: String,
}

impl PlanRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            plan_id: row.get(0)?,
            doctor_id: row.get(1)?,
            name: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl TryFrom<PlanRow> for DietPlan {
    type Error = DbError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let meals: Vec<Meal> = serde_json::from_str(&row.content)?;
        Ok(DietPlan {
            plan_id: row.plan_id,
            doctor_id: row.doctor_id,
            name: row.name,
            meals,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<PlanRow> for TrainingPlan {
    type Error = DbError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let days: Vec<TrainingDay> = serde_json::from_str(&row.content)?;
        Ok(TrainingPlan {
            plan_id: row.plan_id,
            doctor_id: row.doctor_id,
            name: row.name,
            days,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
