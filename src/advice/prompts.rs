//! Prompt and canned-response texts for the advice layer.

use chrono::Local;

use super::types::{LightContext, UserContext, WarningLevel};
use crate::light::LightStatus;

pub const LIGHT_ANALYSIS_SYSTEM: &str = "You are an eye care specialist with expertise in \
ergonomics and lighting. Given the user's ambient light and screen settings, reply with short \
bullet points covering any immediate action, ideal screen and room lighting, and habits to keep. \
Stay under 150 words.";

pub const EYE_STRAIN_SYSTEM: &str = "You are a preventive eye care assistant for computer \
vision syndrome. Given the user's screen time, break compliance and symptoms, reply with short \
bullet points: relief exercises, environment adjustments, when to see a professional, and \
prevention for tomorrow. Mention the 20-20-20 rule when relevant. Stay under 200 words.";

pub const BREAK_EXERCISE_SYSTEM: &str = "You are a wellness coach for screen workers. Recommend \
ONE exercise (20-20-20, eye rolling, focus shifting, palming, or a full screen break) formatted \
as EXERCISE, DURATION, INSTRUCTIONS, BENEFIT. Stay under 100 words.";

pub fn light_user_prompt(light: &LightContext, user: &UserContext) -> String {
    let brightness = user
        .screen_brightness
        .map(|value| format!("{value}%"))
        .unwrap_or_else(|| "auto".into());

    format!(
        "Current conditions:\n\
         - Light level: {:.0} lux\n\
         - Status: {}\n\
         - Time: {}\n\
         - Screen brightness: {}\n\
         - Current activity: {}\n\n\
         Please analyze and provide specific recommendations.",
        light.lux,
        light.status.as_str(),
        Local::now().format("%I:%M %p"),
        brightness,
        user.activity
    )
}

pub fn strain_user_prompt(screen_time_hours: f64, break_compliance: f64, symptoms: &[String]) -> String {
    let symptoms = if symptoms.is_empty() {
        "None reported".to_string()
    } else {
        symptoms.join(", ")
    };

    format!(
        "User status:\n\
         - Screen time today: {screen_time_hours:.1} hours\n\
         - Break compliance: {break_compliance:.0}%\n\
         - Symptoms: {symptoms}\n\n\
         Please provide concise, actionable advice."
    )
}

pub fn break_user_prompt(
    minutes_since_break: u64,
    strain_level: WarningLevel,
    light_status: Option<LightStatus>,
) -> String {
    format!(
        "Current state:\n\
         - Minutes since last break: {minutes_since_break}\n\
         - Strain level: {}\n\
         - Light conditions: {}\n\n\
         Recommend the best exercise for this moment.",
        strain_level.as_str(),
        light_status.map(|s| s.as_str()).unwrap_or("unknown"),
    )
}

pub fn low_light_response(lux: f64) -> String {
    format!(
        "Low light detected\n\n\
         Current: {lux:.0} lux (recommended: 300-500 lux)\n\n\
         Quick actions:\n\
         • Turn on overhead lights\n\
         • Reduce screen brightness to 40-60%\n\
         • Add a desk lamp with 400-500 lux output\n\
         • Enable the blue light filter (night mode)\n\n\
         This lighting level may cause eye strain within 30 minutes."
    )
}

pub fn high_light_response(lux: f64) -> String {
    format!(
        "Bright light detected\n\n\
         Current: {lux:.0} lux (recommended: 300-500 lux)\n\n\
         Quick actions:\n\
         • Close blinds or curtains\n\
         • Increase screen brightness to 70-80%\n\
         • Position the screen to avoid glare\n\
         • Use a matte screen protector if glare persists\n\n\
         Excessive brightness can cause discomfort and headaches."
    )
}

pub fn changing_light_response(lux: f64) -> String {
    format!(
        "Uneven or changing light detected\n\n\
         Current: about {lux:.0} lux with strong bright spots\n\n\
         Quick actions:\n\
         • Move the screen out of direct sunlight or lamp glare\n\
         • Draw blinds partially to even out the room\n\
         • Let auto-brightness settle before adjusting manually\n\n\
         Rapid contrast changes make your eyes refocus constantly."
    )
}

pub fn optimal_light_response(lux: f64, risk: WarningLevel) -> String {
    format!(
        "Optimal lighting conditions\n\n\
         Current: {lux:.0} lux, good for screen work.\n\n\
         Maintain this setup:\n\
         • Keep the current screen brightness\n\
         • Take regular breaks every 20 minutes\n\
         • Keep this lighting consistent\n\
         • You're at {} risk for eye strain",
        risk.as_str()
    )
}

pub const EXERCISE_20_20_20: &str = "20-20-20 Rule Exercise\n\n\
Every 20 minutes, look at something 20 feet away for 20 seconds.\n\n\
1. Find an object at least 20 feet away\n\
2. Focus on it for a full 20 seconds\n\
3. Blink naturally while looking\n\
4. Take a deep breath and return to work";

pub const EXERCISE_FOCUS_SHIFT: &str = "Focus Shifting Exercise (30 seconds)\n\n\
1. Hold your thumb 10 inches from your face\n\
2. Focus on it for 5 seconds\n\
3. Shift focus to an object 10-20 feet away for 5 seconds\n\
4. Repeat 3 times, then close your eyes for 5 seconds";

pub const EXERCISE_EYE_ROLLING: &str = "Eye Rolling Exercise (60 seconds)\n\n\
1. Sit comfortably and keep your head still\n\
2. Slowly roll your eyes clockwise 5 times\n\
3. Rest for 5 seconds\n\
4. Roll counter-clockwise 5 times\n\
5. Close your eyes and rest for 10 seconds";
