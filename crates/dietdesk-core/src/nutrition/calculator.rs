//! Nutrition metric calculator.
//!
//! Pure functions over patient measurements. Every output is rounded to one
//! decimal place and each stage consumes the rounded value of the previous
//! one, so recomputing from stored values never drifts.

use serde::{Deserialize, Serialize};

/// Energy content of one kilogram of body weight (kcal).
pub const KCAL_PER_KG: f64 = 7700.0;

/// Activity level, canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    /// Multiplier applied to the base metabolism.
    ///
    /// Three buckets only: light and very-active share the active factor.
    pub const fn factor(&self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Moderate => 1.55,
            Self::Light | Self::Active | Self::VeryActive => 1.725,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Active => "active",
            Self::VeryActive => "very-active",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// Weight goal, canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Lose,
    Gain,
    Maintain,
}

impl Goal {
    pub const ALL: [Goal; 3] = [Goal::Lose, Goal::Gain, Goal::Maintain];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lose => "lose",
            Self::Gain => "gain",
            Self::Maintain => "maintain",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == s)
    }
}

/// Measurements and targets feeding the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricInput {
    pub weight_kg: f64,
    pub height_cm: Option<f64>,
    pub body_fat_percent: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<Goal>,
    pub weekly_rate_kg: Option<f64>,
}

/// Calculator output; `None` where an input was missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionMetrics {
    pub bmi: Option<f64>,
    pub lean_mass_kg: Option<f64>,
    pub base_metabolism: Option<f64>,
    pub active_metabolism: Option<f64>,
    pub target_calories: Option<f64>,
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Body-mass index from weight (kg) and height (cm).
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    round1(weight_kg / (height_m * height_m))
}

pub fn lean_mass(weight_kg: f64, body_fat_percent: f64) -> f64 {
    round1(weight_kg * (1.0 - body_fat_percent / 100.0))
}

/// Resting energy expenditure from lean mass (Katch-McArdle).
pub fn base_metabolism(lean_mass_kg: f64) -> f64 {
    round1(370.0 + 21.6 * lean_mass_kg)
}

pub fn active_metabolism(base_metabolism: f64, level: ActivityLevel) -> f64 {
    round1(base_metabolism * level.factor())
}

/// Daily calorie deficit or surplus for a weekly weight change.
pub fn daily_calorie_delta(weekly_rate_kg: f64) -> f64 {
    round1(weekly_rate_kg.abs() * KCAL_PER_KG / 7.0)
}

pub fn target_calories(active_metabolism: f64, goal: Goal, weekly_rate_kg: f64) -> f64 {
    let delta = daily_calorie_delta(weekly_rate_kg);
    match goal {
        Goal::Lose => round1(active_metabolism - delta),
        Goal::Gain => round1(active_metabolism + delta),
        Goal::Maintain => active_metabolism,
    }
}

/// Compute every metric the inputs allow.
///
/// Callers validate inputs first; this never fails.
pub fn compute(input: &MetricInput) -> NutritionMetrics {
    let bmi = input.height_cm.map(|h| bmi(input.weight_kg, h));

    let Some(body_fat) = input.body_fat_percent else {
        return NutritionMetrics {
            bmi,
            ..Default::default()
        };
    };

    let lean = lean_mass(input.weight_kg, body_fat);
    let base = base_metabolism(lean);
    let active = input.activity_level.map(|level| active_metabolism(base, level));
    let target = active.map(|a| {
        target_calories(
            a,
            input.goal.unwrap_or(Goal::Maintain),
            input.weekly_rate_kg.unwrap_or(0.0),
        )
    });

    NutritionMetrics {
        bmi,
        lean_mass_kg: Some(lean),
        base_metabolism: Some(base),
        active_metabolism: active,
        target_calories: target,
    }
}
