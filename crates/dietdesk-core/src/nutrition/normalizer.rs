//! Input vocabulary normalizer.
//!
//! Handles:
//! - French and English synonyms (perte de poids→lose, sédentaire→sedentary)
//! - Accents, case, separators (Très_Actif→very-active)
//! - Small typos via string similarity against the known terms

use std::collections::HashMap;

use thiserror::Error;

use super::calculator::{ActivityLevel, Goal};
use crate::models::{Sex, Tier};

/// Minimum normalized Levenshtein similarity for a fuzzy match.
pub const FUZZY_THRESHOLD: f64 = 0.85;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unrecognised {field}: {value:?}")]
pub struct UnknownTerm {
    pub field: &'static str,
    pub value: String,
}

/// Normalizer for free-text enum fields.
pub struct Normalizer {
    goals: HashMap<String, Goal>,
    activity_levels: HashMap<String, ActivityLevel>,
    sexes: HashMap<String, Sex>,
    tiers: HashMap<String, Tier>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a normalizer with the default French/English tables.
    pub fn new() -> Self {
        Self {
            goals: Self::default_goals(),
            activity_levels: Self::default_activity_levels(),
            sexes: Self::default_sexes(),
            tiers: Self::default_tiers(),
        }
    }

    pub fn goal(&self, raw: &str) -> Result<Goal, UnknownTerm> {
        lookup(&self.goals, "goal", raw, true)
    }

    pub fn activity_level(&self, raw: &str) -> Result<ActivityLevel, UnknownTerm> {
        lookup(&self.activity_levels, "activityLevel", raw, true)
    }

    /// Single-letter codes make fuzzy matching meaningless here.
    pub fn sex(&self, raw: &str) -> Result<Sex, UnknownTerm> {
        lookup(&self.sexes, "sex", raw, false)
    }

    pub fn tier(&self, raw: &str) -> Result<Tier, UnknownTerm> {
        lookup(&self.tiers, "tier", raw, true)
    }

    /// Normalize an optional field; blank strings count as absent.
    pub fn optional_goal(&self, raw: Option<&str>) -> Result<Option<Goal>, UnknownTerm> {
        match raw.filter(|s| !s.trim().is_empty()) {
            Some(s) => self.goal(s).map(Some),
            None => Ok(None),
        }
    }

    pub fn optional_activity_level(
        &self,
        raw: Option<&str>,
    ) -> Result<Option<ActivityLevel>, UnknownTerm> {
        match raw.filter(|s| !s.trim().is_empty()) {
            Some(s) => self.activity_level(s).map(Some),
            None => Ok(None),
        }
    }

    /// Add a custom goal synonym.
    pub fn add_goal_alias(&mut self, alias: &str, goal: Goal) {
        self.goals.insert(fold(alias), goal);
    }

    /// Add a custom activity level synonym.
    pub fn add_activity_alias(&mut self, alias: &str, level: ActivityLevel) {
        self.activity_levels.insert(fold(alias), level);
    }

    fn default_goals() -> HashMap<String, Goal> {
        let mut map = HashMap::new();

        for term in [
            "lose", "loss", "weight loss", "lose weight", "perte", "perte de poids",
            "perdre du poids", "maigrir", "amincissement",
        ] {
            map.insert(term.into(), Goal::Lose);
        }
        for term in [
            "gain", "weight gain", "gain weight", "muscle gain", "prise", "prise de poids",
            "prise de masse", "grossir",
        ] {
            map.insert(term.into(), Goal::Gain);
        }
        for term in [
            "maintain", "maintenance", "maintain weight", "maintien", "maintien du poids",
            "stabilisation", "stabiliser",
        ] {
            map.insert(term.into(), Goal::Maintain);
        }

        map
    }

    fn default_activity_levels() -> HashMap<String, ActivityLevel> {
        let mut map = HashMap::new();

        for term in ["sedentary", "sedentaire", "inactive", "inactif"] {
            map.insert(term.into(), ActivityLevel::Sedentary);
        }
        for term in ["light", "lightly active", "leger", "legere", "peu actif", "faible"] {
            map.insert(term.into(), ActivityLevel::Light);
        }
        for term in ["moderate", "moderately active", "modere", "moderee", "moyen"] {
            map.insert(term.into(), ActivityLevel::Moderate);
        }
        for term in ["active", "actif", "active lifestyle", "eleve"] {
            map.insert(term.into(), ActivityLevel::Active);
        }
        for term in [
            "very active", "extra active", "tres actif", "tres active", "intense", "athlete",
        ] {
            map.insert(term.into(), ActivityLevel::VeryActive);
        }

        map
    }

    fn default_sexes() -> HashMap<String, Sex> {
        let mut map = HashMap::new();

        for term in ["male", "m", "man", "homme", "h", "masculin"] {
            map.insert(term.into(), Sex::Male);
        }
        for term in ["female", "f", "woman", "femme", "feminin"] {
            map.insert(term.into(), Sex::Female);
        }

        map
    }

    fn default_tiers() -> HashMap<String, Tier> {
        let mut map = HashMap::new();
        map.insert("essentiel".into(), Tier::Essentiel);
        map.insert("essential".into(), Tier::Essentiel);
        map.insert("basic".into(), Tier::Essentiel);
        map.insert("premium".into(), Tier::Premium);
        map.insert("pro".into(), Tier::Pro);
        map.insert("professional".into(), Tier::Pro);
        map.insert("professionnel".into(), Tier::Pro);
        map
    }
}

fn lookup<T: Copy>(
    table: &HashMap<String, T>,
    field: &'static str,
    raw: &str,
    fuzzy: bool,
) -> Result<T, UnknownTerm> {
    let key = fold(raw);
    if let Some(value) = table.get(&key) {
        return Ok(*value);
    }

    if fuzzy && !key.is_empty() {
        let best = table
            .iter()
            .map(|(term, value)| (strsim::normalized_levenshtein(term, &key), *value))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((score, value)) = best {
            if score >= FUZZY_THRESHOLD {
                return Ok(value);
            }
        }
    }

    Err(UnknownTerm {
        field,
        value: raw.to_string(),
    })
}

/// Lower-case, strip accents, and collapse separators to single spaces.
pub fn fold(raw: &str) -> String {
    let lowered: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            '-' | '_' => ' ',
            other => other,
        })
        .collect();

    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}
