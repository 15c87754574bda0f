//! Host-mutable game settings
//!
//! Only future rounds read these; a round already in progress keeps the
//! deadline it started with.

use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_BASE_DURATION: u32 = 5;
pub const MAX_BASE_DURATION: u32 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub team_mode: bool,
    pub shuffle_choices: bool,
    /// When set, overrides every question's own duration
    pub base_duration: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            team_mode: false,
            shuffle_choices: true,
            base_duration: None,
        }
    }
}

/// Partial update sent with `host:set-settings`. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub team_mode: Option<bool>,
    #[serde(default)]
    pub shuffle_choices: Option<bool>,
    /// `Some(None)` clears the override: sent as `null`, `0`, or any
    /// non-numeric value
    #[serde(
        default,
        deserialize_with = "nullable_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_duration: Option<Option<i64>>,
}

/// Seconds as a number or numeric string, rounded. Falsy values clear.
fn nullable_seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Option<i64>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let seconds = match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    };
    Ok(Some(
        seconds
            .filter(|n| n.is_finite())
            .map(|n| n.round() as i64)
            .filter(|&n| n != 0),
    ))
}

pub fn clamp_base_duration(seconds: i64) -> u32 {
    seconds.clamp(i64::from(MIN_BASE_DURATION), i64::from(MAX_BASE_DURATION)) as u32
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(team_mode) = patch.team_mode {
            self.team_mode = team_mode;
        }
        if let Some(shuffle) = patch.shuffle_choices {
            self.shuffle_choices = shuffle;
        }
        match patch.base_duration {
            Some(Some(seconds)) => self.base_duration = Some(clamp_base_duration(seconds)),
            Some(None) => self.base_duration = None,
            None => {}
        }
    }

    /// Duration for a question under the current settings
    pub fn duration_for(&self, question_seconds: u32) -> u32 {
        self.base_duration.unwrap_or(question_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut settings = Settings::default();
        settings.apply(SettingsPatch {
            team_mode: Some(true),
            ..Default::default()
        });

        assert!(settings.team_mode);
        assert!(settings.shuffle_choices);
        assert_eq!(settings.base_duration, None);
    }

    #[test]
    fn test_base_duration_is_clamped() {
        let mut settings = Settings::default();

        settings.apply(SettingsPatch {
            base_duration: Some(Some(1)),
            ..Default::default()
        });
        assert_eq!(settings.base_duration, Some(5));

        settings.apply(SettingsPatch {
            base_duration: Some(Some(600)),
            ..Default::default()
        });
        assert_eq!(settings.base_duration, Some(120));

        settings.apply(SettingsPatch {
            base_duration: Some(Some(-3)),
            ..Default::default()
        });
        assert_eq!(settings.base_duration, Some(5));
    }

    #[test]
    fn test_base_duration_overrides_question_duration() {
        let mut settings = Settings::default();
        assert_eq!(settings.duration_for(10), 10);

        settings.base_duration = Some(45);
        assert_eq!(settings.duration_for(10), 45);
    }

    #[test]
    fn test_null_or_zero_base_duration_clears_override() {
        let mut settings = Settings {
            base_duration: Some(45),
            ..Settings::default()
        };

        let patch: SettingsPatch = serde_json::from_str(r#"{"baseDuration": null}"#).unwrap();
        assert_eq!(patch.base_duration, Some(None));
        settings.apply(patch);
        assert_eq!(settings.base_duration, None);
        assert_eq!(settings.duration_for(10), 10);

        settings.base_duration = Some(45);
        settings.apply(serde_json::from_str(r#"{"baseDuration": 0}"#).unwrap());
        assert_eq!(settings.base_duration, None);
    }

    #[test]
    fn test_base_duration_accepts_floats_and_numeric_strings() {
        let patch: SettingsPatch = serde_json::from_str(r#"{"baseDuration": 30.0}"#).unwrap();
        assert_eq!(patch.base_duration, Some(Some(30)));

        let patch: SettingsPatch = serde_json::from_str(r#"{"baseDuration": " 25 "}"#).unwrap();
        assert_eq!(patch.base_duration, Some(Some(25)));

        let patch: SettingsPatch = serde_json::from_str(r#"{"baseDuration": "soon"}"#).unwrap();
        assert_eq!(patch.base_duration, Some(None));

        let patch: SettingsPatch = serde_json::from_str(r#"{"teamMode": true}"#).unwrap();
        assert_eq!(patch.base_duration, None);
    }
}
