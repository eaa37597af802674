//! Diet suggestion prompts.
//!
//! The practice works in French with metric units, so the system prompt pins
//! the language and units and the user prompt lists every profile field the
//! model is allowed to rely on.

use serde::{Deserialize, Serialize};

use crate::generation::DietProfile;

/// System prompt for diet generation.
pub const SYSTEM_PROMPT: &str = r#"You are a clinical dietitian assisting a medical doctor in a nutrition practice.

Write a one-day meal plan for the patient described by the doctor:
- Answer in French, using metric units (grams, millilitres, kcal).
- Split the day into breakfast, morning snack, lunch, afternoon snack and dinner.
- Give an approximate calorie count for each meal; the day total must stay within 5% of the target.
- Never include a food the patient is allergic to.
- Adapt the plan to the listed pathologies and mention any adaptation briefly.
- Do not give a medical diagnosis. The doctor validates the plan."#;

/// A single chat message in the completions request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

fn fmt_opt(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{} {}", v, unit))
        .unwrap_or_else(|| "unknown".to_string())
}

fn fmt_text(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "none reported",
    }
}

/// User prompt describing the patient profile.
pub fn make_diet_prompt(profile: &DietProfile) -> String {
    format!(
        r#"Patient profile:
- Sex: {}
- Age: {}
- Height: {}
- Weight: {}
- Body fat: {}
- Activity level: {}
- Goal: {} ({} per week)
- Pathologies: {}
- Allergies: {}

Computed metrics:
- BMI: {}
- Base metabolism: {}
- Active metabolism: {}
- Target daily intake: {}

Propose a one-day meal plan reaching the target daily intake."#,
        profile.sex,
        profile
            .age_years
            .map(|a| format!("{} years", a))
            .unwrap_or_else(|| "unknown".to_string()),
        fmt_opt(profile.height_cm, "cm"),
        fmt_opt(Some(profile.weight_kg), "kg"),
        fmt_opt(profile.body_fat_percent, "%"),
        profile.activity_level,
        profile.goal,
        fmt_opt(Some(profile.weekly_rate_kg), "kg"),
        fmt_text(profile.pathologies.as_deref()),
        fmt_text(profile.allergies.as_deref()),
        fmt_opt(profile.bmi, "kg/m²"),
        fmt_opt(profile.base_metabolism, "kcal"),
        fmt_opt(profile.active_metabolism, "kcal"),
        fmt_opt(profile.target_calories, "kcal"),
    )
}

/// Build the full message list sent to the completions endpoint.
pub fn build_diet_prompt(profile: &DietProfile) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(make_diet_prompt(profile)),
    ]
}
