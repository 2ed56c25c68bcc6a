//! Rule-based advice used whenever the remote provider is unavailable.
//!
//! The warning-level functions are also applied to remote responses, so the
//! severity a user sees never depends on which path produced the text.

use super::{
    prompts,
    types::{LightContext, RecommendationResult, WarningLevel, MAX_ACTION_ITEMS},
};
use crate::light::LightStatus;

pub const LIGHT_FALLBACK_CONFIDENCE: f64 = 0.70;
pub const STRAIN_FALLBACK_CONFIDENCE: f64 = 0.75;

pub fn light_warning_level(lux: f64) -> WarningLevel {
    if !(100.0..=1000.0).contains(&lux) {
        WarningLevel::High
    } else if !(200.0..=700.0).contains(&lux) {
        WarningLevel::Medium
    } else {
        WarningLevel::Low
    }
}

/// `break_compliance` is a percentage.
pub fn strain_warning_level(
    screen_time_hours: f64,
    break_compliance: f64,
    symptoms: &[String],
) -> WarningLevel {
    if !symptoms.is_empty() || screen_time_hours > 8.0 || break_compliance < 50.0 {
        WarningLevel::High
    } else if screen_time_hours > 6.0 || break_compliance < 70.0 {
        WarningLevel::Medium
    } else {
        WarningLevel::Low
    }
}

/// Items from lines starting with `•`, `-`, `*`, or a list number (`1.`, `2)`).
pub fn extract_action_items(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| strip_list_marker(line.trim()))
        .filter(|item| !item.is_empty())
        .take(MAX_ACTION_ITEMS)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix(['•', '-', '*']) {
        return Some(rest.trim_start_matches(['•', '-', '*']).trim());
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(['.', ')'])
        .map(str::trim)
}

pub fn light_fallback(light: &LightContext) -> RecommendationResult {
    let warning = light_warning_level(light.lux);
    let text = match light.status {
        LightStatus::VeryLow | LightStatus::Low => prompts::low_light_response(light.lux),
        LightStatus::High => prompts::high_light_response(light.lux),
        LightStatus::Changing => prompts::changing_light_response(light.lux),
        LightStatus::Optimal => prompts::optimal_light_response(light.lux, warning),
    };
    let items = extract_action_items(&text);

    RecommendationResult::new(text, LIGHT_FALLBACK_CONFIDENCE, items, warning)
}

pub fn strain_fallback(
    screen_time_hours: f64,
    break_compliance: f64,
    symptoms: &[String],
) -> RecommendationResult {
    let mut advice = Vec::new();

    if screen_time_hours > 8.0 {
        advice.push("Your screen time is very high (over 8 hours). Take longer breaks.".to_string());
    } else if screen_time_hours > 6.0 {
        advice.push("Screen time is above recommended levels. Take breaks more often.".to_string());
    }

    if break_compliance < 50.0 {
        advice.push("Break compliance is low. Try more frequent reminders.".to_string());
    } else if break_compliance < 70.0 {
        advice.push("Completing more of your breaks will reduce eye strain.".to_string());
    }

    if !symptoms.is_empty() {
        advice.push(format!(
            "You reported: {}. Consider consulting an eye care professional.",
            symptoms.join(", ")
        ));
    }

    if advice.is_empty() {
        advice.push("You're maintaining good eye care habits. Keep it up!".to_string());
    }

    let text = advice.join("\n\n");
    let warning = strain_warning_level(screen_time_hours, break_compliance, symptoms);
    RecommendationResult::new(text, STRAIN_FALLBACK_CONFIDENCE, advice, warning)
}

pub fn exercise_fallback(minutes_since_break: u64, strain_level: WarningLevel) -> &'static str {
    if minutes_since_break > 30 || strain_level == WarningLevel::High {
        prompts::EXERCISE_20_20_20
    } else if strain_level == WarningLevel::Medium {
        prompts::EXERCISE_FOCUS_SHIFT
    } else {
        prompts::EXERCISE_EYE_ROLLING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(lux: f64, status: LightStatus) -> LightContext {
        LightContext { lux, status }
    }

    #[test]
    fn light_warning_thresholds() {
        assert_eq!(light_warning_level(50.0), WarningLevel::High);
        assert_eq!(light_warning_level(1200.0), WarningLevel::High);
        assert_eq!(light_warning_level(150.0), WarningLevel::Medium);
        assert_eq!(light_warning_level(800.0), WarningLevel::Medium);
        assert_eq!(light_warning_level(400.0), WarningLevel::Low);
        assert_eq!(light_warning_level(100.0), WarningLevel::Medium);
        assert_eq!(light_warning_level(200.0), WarningLevel::Low);
        assert_eq!(light_warning_level(1000.0), WarningLevel::Medium);
    }

    #[test]
    fn strain_warning_thresholds() {
        assert_eq!(strain_warning_level(9.0, 90.0, &[]), WarningLevel::High);
        assert_eq!(strain_warning_level(2.0, 40.0, &[]), WarningLevel::High);
        assert_eq!(strain_warning_level(7.0, 90.0, &[]), WarningLevel::Medium);
        assert_eq!(strain_warning_level(2.0, 60.0, &[]), WarningLevel::Medium);
        assert_eq!(strain_warning_level(2.0, 90.0, &[]), WarningLevel::Low);
        assert_eq!(
            strain_warning_level(2.0, 90.0, &["dry eyes".to_string()]),
            WarningLevel::High
        );
    }

    #[test]
    fn heavy_use_with_symptoms_is_high() {
        let result = strain_fallback(10.0, 40.0, &["headache".to_string()]);
        assert_eq!(result.warning_level, WarningLevel::High);
        assert!(result.text.contains("headache"));
        assert_eq!(result.action_items.len(), 3);
        assert!(!result.from_cache);
    }

    #[test]
    fn healthy_habits_get_encouragement() {
        let result = strain_fallback(3.0, 95.0, &[]);
        assert_eq!(result.warning_level, WarningLevel::Low);
        assert_eq!(result.action_items.len(), 1);
    }

    #[test]
    fn light_fallback_picks_text_by_status() {
        let dim = light_fallback(&light(80.0, LightStatus::VeryLow));
        assert!(dim.text.starts_with("Low light"));
        assert_eq!(dim.warning_level, WarningLevel::High);
        assert_eq!(dim.action_items.len(), 4);
        assert_eq!(dim.action_items[0], "Turn on overhead lights");

        let bright = light_fallback(&light(900.0, LightStatus::High));
        assert!(bright.text.starts_with("Bright light"));
        assert_eq!(bright.warning_level, WarningLevel::Medium);

        let good = light_fallback(&light(400.0, LightStatus::Optimal));
        assert_eq!(good.warning_level, WarningLevel::Low);
        assert!(good.text.contains("low risk"));
        assert!(!good.action_items.is_empty());
    }

    #[test]
    fn action_items_accept_bullets_and_numbers() {
        let text = "Intro line\n\
                    • Turn on a lamp\n\
                    - Lower brightness\n\
                    * Blink more\n\
                    1. Look away\n\
                    12) Stretch\n\
                    2026 was a good year\n\
                    -\n\
                    Closing words";
        assert_eq!(
            extract_action_items(text),
            vec![
                "Turn on a lamp",
                "Lower brightness",
                "Blink more",
                "Look away",
                "Stretch",
            ]
        );
    }

    #[test]
    fn action_items_keep_leading_numbers_in_content() {
        assert_eq!(
            extract_action_items("- 20 seconds looking away"),
            vec!["20 seconds looking away"]
        );
    }

    #[test]
    fn action_items_are_capped() {
        let text = (1..=8).map(|i| format!("- item {i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(extract_action_items(&text).len(), MAX_ACTION_ITEMS);
    }

    #[test]
    fn exercise_selection() {
        assert_eq!(exercise_fallback(45, WarningLevel::Low), prompts::EXERCISE_20_20_20);
        assert_eq!(exercise_fallback(10, WarningLevel::High), prompts::EXERCISE_20_20_20);
        assert_eq!(exercise_fallback(10, WarningLevel::Medium), prompts::EXERCISE_FOCUS_SHIFT);
        assert_eq!(exercise_fallback(10, WarningLevel::Low), prompts::EXERCISE_EYE_ROLLING);
    }
}
