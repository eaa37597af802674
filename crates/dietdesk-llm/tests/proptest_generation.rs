//! Property tests for prompt building and completion parsing.

use dietdesk_llm::{build_diet_prompt, parse_completion, DietProfile, MockDietGenerator};
use proptest::prelude::*;

fn arb_profile() -> impl Strategy<Value = DietProfile> {
    (
        40.0f64..180.0,
        prop::option::of(1200.0f64..4000.0),
        prop::option::of("[a-z]{3,12}"),
        prop::sample::select(vec!["lose", "gain", "maintain"]),
    )
        .prop_map(|(weight, target, allergies, goal)| DietProfile {
            sex: "female".into(),
            age_years: Some(40),
            height_cm: Some(168.0),
            weight_kg: weight,
            body_fat_percent: None,
            activity_level: "moderate".into(),
            goal: goal.into(),
            weekly_rate_kg: 0.5,
            pathologies: None,
            allergies,
            bmi: None,
            base_metabolism: None,
            active_metabolism: None,
            target_calories: target,
        })
}

proptest! {
    #[test]
    fn prompt_carries_profile(profile in arb_profile()) {
        let messages = build_diet_prompt(&profile);
        prop_assert_eq!(messages.len(), 2);
        prop_assert_eq!(messages[0].role.as_str(), "system");

        let user = &messages[1].content;
        prop_assert!(user.contains(&profile.goal));
        if let Some(allergies) = &profile.allergies {
            prop_assert!(user.contains(allergies.as_str()));
        }
        if let Some(target) = profile.target_calories {
            let expected = format!("{} kcal", target);
            prop_assert!(user.contains(&expected));
        }
    }

    #[test]
    fn completion_text_survives_json(text in "[A-Za-zéà ,.:'0-9]{1,80}") {
        prop_assume!(!text.trim().is_empty());
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
        .to_string();
        prop_assert_eq!(parse_completion(&body).unwrap(), text.trim());
    }

    #[test]
    fn mock_mentions_allergies(profile in arb_profile()) {
        let text = MockDietGenerator::suggest(&profile);
        match &profile.allergies {
            Some(a) => {
                let expected = format!("Excluded: {}", a);
                prop_assert!(text.contains(&expected));
            }
            None => prop_assert!(!text.contains("Excluded")),
        }
    }
}
