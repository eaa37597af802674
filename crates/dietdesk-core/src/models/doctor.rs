//! Doctor accounts and subscription tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Essentiel,
    Premium,
    /// Unlimited usage for every feature
    Pro,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Essentiel, Tier::Premium, Tier::Pro];

    /// Monthly limit for a feature; `None` means unlimited.
    pub const fn limit(&self, feature: Feature) -> Option<u32> {
        match (self, feature) {
            (Self::Essentiel, Feature::Appointments) => Some(100),
            (Self::Essentiel, Feature::NutritionPlans) => Some(30),
            (Self::Essentiel, Feature::WorkoutPlans) => Some(30),
            (Self::Essentiel, Feature::AiDiets) => Some(10),
            (Self::Premium, Feature::Appointments) => Some(500),
            (Self::Premium, Feature::NutritionPlans) => Some(150),
            (Self::Premium, Feature::WorkoutPlans) => Some(150),
            (Self::Premium, Feature::AiDiets) => Some(100),
            (Self::Pro, _) => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Essentiel => "essentiel",
            Self::Premium => "premium",
            Self::Pro => "pro",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metered features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Appointments,
    NutritionPlans,
    WorkoutPlans,
    AiDiets,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::Appointments,
        Feature::NutritionPlans,
        Feature::WorkoutPlans,
        Feature::AiDiets,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Appointments => "appointments",
            Self::NutritionPlans => "nutritionPlans",
            Self::WorkoutPlans => "workoutPlans",
            Self::AiDiets => "aiDiets",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown feature: {}", s))
    }
}

/// A doctor account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub doctor_id: String,
    pub name: String,
    /// Unique login email
    pub email: String,
    pub specialty: Option<String>,
    pub tier: Tier,
    pub subscription_active: bool,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub created_at: String,
    pub updated_at: String,
}

impl Doctor {
    /// Create a new doctor with an active subscription.
    pub fn new(name: String, email: String, tier: Tier) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            doctor_id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            specialty: None,
            tier,
            subscription_active: true,
            period_start: None,
            period_end: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Active flag set and `now` inside the billing period, when one is recorded.
    pub fn is_subscription_active_at(&self, now: DateTime<Utc>) -> bool {
        self.subscription_active
            && self.period_start.map_or(true, |start| now >= start)
            && self.period_end.map_or(true, |end| now <= end)
    }
}

/// Current usage of one feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub feature: Feature,
    pub used: u32,
    pub limit: Option<u32>,
    /// `None` when unlimited
    pub remaining: Option<u32>,
}

impl UsageSnapshot {
    pub fn new(feature: Feature, used: u32, limit: Option<u32>) -> Self {
        Self {
            feature,
            used,
            limit,
            remaining: limit.map(|l| l.saturating_sub(used)),
        }
    }
}
