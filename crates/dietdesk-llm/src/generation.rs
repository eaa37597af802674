//! Diet suggestion generation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generation errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Empty response from model")]
    EmptyResponse,
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Patient profile sent to the model.
///
/// Enum-like fields are carried as their canonical spellings so this crate
/// stays independent of the core domain types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DietProfile {
    pub sex: String,
    pub age_years: Option<u32>,
    pub height_cm: Option<f64>,
    pub weight_kg: f64,
    pub body_fat_percent: Option<f64>,
    pub activity_level: String,
    pub goal: String,
    pub weekly_rate_kg: f64,
    pub pathologies: Option<String>,
    pub allergies: Option<String>,
    pub bmi: Option<f64>,
    pub base_metabolism: Option<f64>,
    pub active_metabolism: Option<f64>,
    pub target_calories: Option<f64>,
}

/// Free-text diet suggestion returned by a generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DietSuggestion {
    pub text: String,
    pub model: String,
    pub generated_at: String,
}

/// Anything that can turn a profile into a diet narrative.
pub trait DietGenerator {
    fn generate(&self, profile: &DietProfile) -> GenerationResult<DietSuggestion>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Extract the first choice's text from a chat completions response body.
pub fn parse_completion(json: &str) -> GenerationResult<String> {
    let response: CompletionResponse = serde_json::from_str(json)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use serde::Serialize;
    use tracing::{debug, warn};

    use super::*;
    use crate::prompts::{build_diet_prompt, ChatMessage};

    #[derive(Serialize)]
    struct CompletionRequest<'a> {
        model: &'a str,
        messages: Vec<ChatMessage>,
        temperature: f32,
    }

    /// Blocking client for an OpenAI-compatible chat completions endpoint.
    pub struct HttpDietGenerator {
        client: reqwest::blocking::Client,
        endpoint: String,
        api_key: Option<String>,
        model: String,
    }

    impl HttpDietGenerator {
        pub fn new(
            endpoint: impl Into<String>,
            api_key: Option<String>,
            model: impl Into<String>,
            timeout: Duration,
        ) -> GenerationResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()?;
            Ok(Self {
                client,
                endpoint: endpoint.into(),
                api_key,
                model: model.into(),
            })
        }

        fn url(&self) -> String {
            format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
        }
    }

    impl DietGenerator for HttpDietGenerator {
        fn generate(&self, profile: &DietProfile) -> GenerationResult<DietSuggestion> {
            let body = CompletionRequest {
                model: &self.model,
                messages: build_diet_prompt(profile),
                temperature: 0.7,
            };

            let mut request = self.client.post(self.url()).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            debug!(model = %self.model, "requesting diet suggestion");
            let response = request.send()?;
            let status = response.status();
            let text = response.text()?;

            if !status.is_success() {
                warn!(status = status.as_u16(), "diet suggestion request failed");
                return Err(GenerationError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            Ok(DietSuggestion {
                text: parse_completion(&text)?,
                model: self.model.clone(),
                generated_at: chrono::Utc::now().to_rfc3339(),
            })
        }
    }

}

#[cfg(feature = "http")]
pub use http::HttpDietGenerator;

/// Deterministic generator for tests and offline use.
pub struct MockDietGenerator;

impl MockDietGenerator {
    pub const MODEL: &'static str = "mock";

    /// Split the target intake across the day's meals.
    pub fn suggest(profile: &DietProfile) -> String {
        let target = profile
            .target_calories
            .or(profile.active_metabolism)
            .unwrap_or(2000.0);

        let slots = [
            ("Breakfast", 0.25),
            ("Morning snack", 0.05),
            ("Lunch", 0.35),
            ("Afternoon snack", 0.05),
            ("Dinner", 0.30),
        ];

        let mut text = format!("Meal plan ({} goal), about {:.0} kcal:\n", profile.goal, target);
        for (slot, share) in slots {
            text.push_str(&format!("- {}: {:.0} kcal\n", slot, target * share));
        }
        if let Some(allergies) = profile.allergies.as_deref().filter(|a| !a.trim().is_empty()) {
            text.push_str(&format!("Excluded: {}\n", allergies));
        }
        text
    }
}

impl DietGenerator for MockDietGenerator {
    fn generate(&self, profile: &DietProfile) -> GenerationResult<DietSuggestion> {
        Ok(DietSuggestion {
            text: Self::suggest(profile),
            model: Self::MODEL.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(target: Option<f64>) -> DietProfile {
        DietProfile {
            sex: "male".into(),
            age_years: Some(35),
            height_cm: Some(180.0),
            weight_kg: 90.0,
            body_fat_percent: Some(25.0),
            activity_level: "sedentary".into(),
            goal: "lose".into(),
            weekly_rate_kg: 0.5,
            pathologies: None,
            allergies: Some("peanuts".into()),
            bmi: Some(27.8),
            base_metabolism: Some(1828.0),
            active_metabolism: Some(2193.6),
            target_calories: target,
        }
    }

    #[test]
    fn test_parse_completion() {
        let json = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  Petit-déjeuner : flocons d'avoine  "}}]}"#;
        let text = parse_completion(json).unwrap();
        assert_eq!(text, "Petit-déjeuner : flocons d'avoine");
    }

    #[test]
    fn test_parse_completion_empty() {
        let json = r#"{"choices":[]}"#;
        assert!(matches!(parse_completion(json), Err(GenerationError::EmptyResponse)));

        let json = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(matches!(parse_completion(json), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn test_parse_completion_invalid_json() {
        assert!(matches!(
            parse_completion("not json"),
            Err(GenerationError::JsonParse(_))
        ));
    }

    #[test]
    fn test_mock_generator() {
        let suggestion = MockDietGenerator.generate(&profile(Some(1643.6))).unwrap();
        assert_eq!(suggestion.model, "mock");
        assert!(suggestion.text.contains("about 1644 kcal"));
        assert!(suggestion.text.contains("Lunch: 575 kcal"));
        assert!(suggestion.text.contains("Excluded: peanuts"));
    }

    #[test]
    fn test_mock_generator_falls_back_to_active() {
        let text = MockDietGenerator::suggest(&profile(None));
        assert!(text.contains("about 2194 kcal"));
    }
}
