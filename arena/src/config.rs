//! Session configuration: per-start settings and their validation.

use serde::{Deserialize, Serialize};

use crate::roster::BiasPolicy;

/// Shortest topic accepted, after trimming.
const MIN_TOPIC_LEN: usize = 3;

/// Reference cast size.
pub const DEFAULT_DEBATER_COUNT: usize = 5;

/// Options recognized on a `start` control message. Unknown fields are
/// ignored; missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateSettings {
    /// Think-time base delay, in seconds.
    pub base_delay_secs: u64,
    /// Full round-robin passes in the main loop.
    pub max_rounds: u32,
    /// Arbiter participation and its bias policy. `None` disables it.
    pub arbiter: Option<BiasPolicy>,
    /// Tone intensity, 0 to 100. Mapped to a fixed bucket consumed only by
    /// prompt framing.
    pub intensity: u8,
    /// Locale tag consumed only by prompt framing.
    pub locale: String,
    /// Whether observer messages are accepted mid-session.
    pub observer_participation: bool,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            base_delay_secs: 5,
            max_rounds: 10,
            arbiter: None,
            intensity: 50,
            locale: "en".to_string(),
            observer_participation: true,
        }
    }
}

impl DebateSettings {
    /// Client-supplied seconds, so the conversion must not overflow.
    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_secs.saturating_mul(1000)
    }

    pub fn tone(&self) -> Tone {
        Tone::from_intensity(self.intensity)
    }

    /// Human-language name for the locale tag, for prompt framing.
    /// Unrecognized tags fall back to English.
    pub fn locale_language(&self) -> &'static str {
        match self.locale.as_str() {
            "pl" => "Polish",
            "es" => "Spanish",
            "de" => "German",
            "fr" => "French",
            "it" => "Italian",
            "pt" => "Portuguese",
            "ru" => "Russian",
            "ja" => "Japanese",
            "ko" => "Korean",
            "tr" => "Turkish",
            "ar" => "Arabic",
            _ => "English",
        }
    }
}

/// Fixed tone bucket derived from the intensity ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Calm,
    Measured,
    Heated,
    Aggressive,
    Unfiltered,
    Scorched,
}

impl Tone {
    pub fn from_intensity(level: u8) -> Self {
        match level {
            0..=15 => Self::Calm,
            16..=35 => Self::Measured,
            36..=55 => Self::Heated,
            56..=75 => Self::Aggressive,
            76..=90 => Self::Unfiltered,
            _ => Self::Scorched,
        }
    }

    /// Short style directive for prompt framing.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Calm => "calm and measured, polite disagreements, still opinionated",
            Self::Measured => "firm and occasionally sharp, visibly annoyed at bad arguments",
            Self::Heated => "heated debate energy, emotionally invested, doesn't hold back",
            Self::Aggressive => "aggressive and confrontational, heavy sarcasm and mockery",
            Self::Unfiltered => "very aggressive, almost no filter, roasts opponents personally",
            Self::Scorched => "maximum fury, scorched earth, every reply drips with contempt",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calm => write!(f, "calm"),
            Self::Measured => write!(f, "measured"),
            Self::Heated => write!(f, "heated"),
            Self::Aggressive => write!(f, "aggressive"),
            Self::Unfiltered => write!(f, "unfiltered"),
            Self::Scorched => write!(f, "scorched"),
        }
    }
}

/// Error from start-message validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Topic is too short.")]
    TopicTooShort,
}

/// Validate and normalize a debate topic. Rejected topics never create a
/// session. Length counts characters, not bytes.
pub fn validate_topic(topic: &str) -> Result<String, ConfigError> {
    let trimmed = topic.trim();
    if trimmed.chars().count() < MIN_TOPIC_LEN {
        return Err(ConfigError::TopicTooShort);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DebateSettings::default();
        assert_eq!(settings.base_delay_secs, 5);
        assert_eq!(settings.max_rounds, 10);
        assert!(settings.arbiter.is_none());
        assert_eq!(settings.intensity, 50);
        assert_eq!(settings.locale, "en");
        assert!(settings.observer_participation);
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: DebateSettings =
            serde_json::from_str(r#"{"max_rounds": 2, "arbiter": "random"}"#).unwrap();
        assert_eq!(settings.max_rounds, 2);
        assert_eq!(settings.arbiter, Some(BiasPolicy::Random));
        assert_eq!(settings.base_delay_secs, 5);
    }

    #[test]
    fn test_tone_buckets() {
        assert_eq!(Tone::from_intensity(0), Tone::Calm);
        assert_eq!(Tone::from_intensity(15), Tone::Calm);
        assert_eq!(Tone::from_intensity(16), Tone::Measured);
        assert_eq!(Tone::from_intensity(50), Tone::Heated);
        assert_eq!(Tone::from_intensity(75), Tone::Aggressive);
        assert_eq!(Tone::from_intensity(90), Tone::Unfiltered);
        assert_eq!(Tone::from_intensity(100), Tone::Scorched);
    }

    #[test]
    fn test_topic_validation() {
        assert!(validate_topic("ok?").is_ok());
        assert_eq!(validate_topic("  cats  ").unwrap(), "cats");
        assert!(matches!(
            validate_topic("  x "),
            Err(ConfigError::TopicTooShort)
        ));
        assert!(validate_topic("").is_err());
    }

    #[test]
    fn test_topic_length_counts_characters_not_bytes() {
        // One multibyte character is still one character.
        assert!(matches!(
            validate_topic("日"),
            Err(ConfigError::TopicTooShort)
        ));
        assert!(validate_topic("日本語").is_ok());
        assert!(matches!(validate_topic("ää"), Err(ConfigError::TopicTooShort)));
    }

    #[test]
    fn test_base_delay_conversion_saturates() {
        let settings = DebateSettings {
            base_delay_secs: u64::MAX,
            ..DebateSettings::default()
        };
        assert_eq!(settings.base_delay_ms(), u64::MAX);

        let settings = DebateSettings::default();
        assert_eq!(settings.base_delay_ms(), 5000);
    }

    #[test]
    fn test_locale_fallback() {
        let mut settings = DebateSettings::default();
        assert_eq!(settings.locale_language(), "English");
        settings.locale = "pl".to_string();
        assert_eq!(settings.locale_language(), "Polish");
        settings.locale = "xx".to_string();
        assert_eq!(settings.locale_language(), "English");
    }
}
