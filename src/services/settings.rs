use serde::{Deserialize, Serialize};

/// Cards are always authored against English; only the target side varies.
pub const SOURCE_LANGUAGE: &str = "en";
pub const DEFAULT_TARGET_LANGUAGE: &str = "es";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TranslationDirection {
    /// Input is in the source language; the target word is generated.
    #[default]
    SourceToTarget,
    /// Input is already in the target language; the source word is generated.
    TargetToSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardSettings {
    pub source_language: String,
    pub target_language: String,
    pub translation_direction: TranslationDirection,
    pub tone_instructions: String,
    pub selected_voice: String,
}

impl Default for FlashcardSettings {
    fn default() -> Self {
        Self {
            source_language: SOURCE_LANGUAGE.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            translation_direction: TranslationDirection::SourceToTarget,
            tone_instructions: String::new(),
            selected_voice: String::new(),
        }
    }
}

/// Partial settings update. `source_language` is pinned and therefore absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_direction: Option<TranslationDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_voice: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.target_language.is_none()
            && self.translation_direction.is_none()
            && self.tone_instructions.is_none()
            && self.selected_voice.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChange {
    pub target_language_changed: bool,
}

impl FlashcardSettings {
    pub fn with_target_language(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            ..Self::default()
        }
    }

    /// Merges `patch` into the current settings, leaving unspecified fields intact.
    pub fn apply(&mut self, patch: SettingsPatch) -> SettingsChange {
        let mut change = SettingsChange::default();

        if let Some(target_language) = patch.target_language {
            change.target_language_changed = target_language != self.target_language;
            self.target_language = target_language;
        }
        if let Some(direction) = patch.translation_direction {
            self.translation_direction = direction;
        }
        if let Some(tone) = patch.tone_instructions {
            self.tone_instructions = tone;
        }
        if let Some(voice) = patch.selected_voice {
            self.selected_voice = voice;
        }

        change
    }

    /// Tone passed to generators; blank instructions mean a neutral register.
    pub fn tone_or_neutral(&self) -> &str {
        let tone = self.tone_instructions.trim();
        if tone.is_empty() {
            "neutral"
        } else {
            tone
        }
    }

    /// Keeps `selected_voice` within the freshly loaded voice list.
    ///
    /// An empty list leaves the selection alone. Otherwise an empty or stale
    /// selection falls back to the first voice. Returns whether the selection
    /// changed.
    pub fn reconcile_voice(&mut self, voices: &[VoiceOption]) -> bool {
        let Some(first) = voices.first() else {
            return false;
        };

        let still_valid = !self.selected_voice.is_empty()
            && voices.iter().any(|v| v.id == self.selected_voice);
        if still_valid {
            return false;
        }

        self.selected_voice = first.id.clone();
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageOption {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceOption {
    pub id: String,
    pub name: String,
    pub language: String,
    pub gender: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, language: &str) -> VoiceOption {
        VoiceOption {
            id: id.to_string(),
            name: id.to_string(),
            language: language.to_string(),
            gender: "Female".to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = FlashcardSettings::default();
        assert_eq!(settings.source_language, "en");
        assert_eq!(settings.target_language, "es");
        assert_eq!(settings.translation_direction, TranslationDirection::SourceToTarget);
        assert!(settings.tone_instructions.is_empty());
        assert!(settings.selected_voice.is_empty());
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut settings = FlashcardSettings::default();
        let before = settings.clone();
        let change = settings.apply(SettingsPatch::default());
        assert_eq!(settings, before);
        assert!(!change.target_language_changed);
    }

    #[test]
    fn test_patch_preserves_unspecified_fields() {
        let mut settings = FlashcardSettings::default();
        settings.selected_voice = "es-ES-ElviraNeural".to_string();

        let change = settings.apply(SettingsPatch {
            tone_instructions: Some("playful".to_string()),
            ..SettingsPatch::default()
        });

        assert_eq!(settings.tone_instructions, "playful");
        assert_eq!(settings.selected_voice, "es-ES-ElviraNeural");
        assert_eq!(settings.target_language, "es");
        assert!(!change.target_language_changed);
    }

    #[test]
    fn test_same_target_language_is_not_a_change() {
        let mut settings = FlashcardSettings::default();
        let change = settings.apply(SettingsPatch {
            target_language: Some("es".to_string()),
            ..SettingsPatch::default()
        });
        assert!(!change.target_language_changed);

        let change = settings.apply(SettingsPatch {
            target_language: Some("fr".to_string()),
            ..SettingsPatch::default()
        });
        assert!(change.target_language_changed);
    }

    #[test]
    fn test_reconcile_voice_defaults_to_first() {
        let mut settings = FlashcardSettings::default();
        let voices = vec![voice("es-a", "es"), voice("es-b", "es")];
        assert!(settings.reconcile_voice(&voices));
        assert_eq!(settings.selected_voice, "es-a");

        settings.selected_voice = "es-b".to_string();
        assert!(!settings.reconcile_voice(&voices));
        assert_eq!(settings.selected_voice, "es-b");
    }

    #[test]
    fn test_reconcile_voice_replaces_stale_and_ignores_empty() {
        let mut settings = FlashcardSettings::default();
        settings.selected_voice = "fr-x".to_string();

        assert!(!settings.reconcile_voice(&[]));
        assert_eq!(settings.selected_voice, "fr-x");

        assert!(settings.reconcile_voice(&[voice("de-a", "de")]));
        assert_eq!(settings.selected_voice, "de-a");
    }

    #[test]
    fn test_patch_deserializes_camel_case() {
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"translationDirection":"targetToSource"}"#).unwrap();
        assert_eq!(patch.translation_direction, Some(TranslationDirection::TargetToSource));
        assert!(patch.target_language.is_none());
    }
}
