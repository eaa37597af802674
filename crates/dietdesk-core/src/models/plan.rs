//! Diet and training plan models.

use serde::{Deserialize, Serialize};

/// Meal slot within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MealSlot {
    Breakfast,
    MorningSnack,
    Lunch,
    AfternoonSnack,
    Dinner,
}

/// Food items served in one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meal {
    pub slot: MealSlot,
    pub items: Vec<String>,
    pub calories: Option<f64>,
}

/// A named diet plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DietPlan {
    pub plan_id: String,
    pub doctor_id: String,
    pub name: String,
    pub meals: Vec<Meal>,
    pub created_at: String,
    pub updated_at: String,
}

impl DietPlan {
    pub fn new(doctor_id: String, name: String, meals: Vec<Meal>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            doctor_id,
            name,
            meals,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Sum of the meals that carry a calorie figure.
    pub fn total_calories(&self) -> Option<f64> {
        let known: Vec<f64> = self.meals.iter().filter_map(|m| m.calories).collect();
        if known.is_empty() {
            None
        } else {
            Some(known.iter().sum())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub name: String,
    pub sets: Option<u32>,
    pub reps: Option<u32>,
    pub duration_min: Option<u32>,
}

/// Exercises for one day of the week (e.g. "monday").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingDay {
    pub day: String,
    pub exercises: Vec<Exercise>,
}

/// A named training plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingPlan {
    pub plan_id: String,
    pub doctor_id: String,
    pub name: String,
    pub days: Vec<TrainingDay>,
    pub created_at: String,
    pub updated_at: String,
}

impl TrainingPlan {
    pub fn new(doctor_id: String, name: String, days: Vec<TrainingDay>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            doctor_id,
            name,
            days,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
