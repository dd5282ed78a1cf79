use crate::services::settings::{LanguageOption, VoiceOption};

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("ru", "Russian"),
    ("pt", "Portuguese"),
];

// (id, name, language, gender)
const VOICES: &[(&str, &str, &str, &str)] = &[
    ("en-US-JennyNeural", "Jenny", "en", "Female"),
    ("en-US-GuyNeural", "Guy", "en", "Male"),
    ("es-ES-ElviraNeural", "Elvira", "es", "Female"),
    ("es-ES-AlvaroNeural", "Alvaro", "es", "Male"),
    ("fr-FR-DeniseNeural", "Denise", "fr", "Female"),
    ("fr-FR-HenriNeural", "Henri", "fr", "Male"),
    ("de-DE-KatjaNeural", "Katja", "de", "Female"),
    ("de-DE-ConradNeural", "Conrad", "de", "Male"),
];

pub fn languages() -> Vec<LanguageOption> {
    LANGUAGES
        .iter()
        .map(|(code, name)| LanguageOption {
            code: (*code).to_string(),
            name: (*name).to_string(),
        })
        .collect()
}

pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGES.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

pub fn voices_for(language_code: &str) -> Vec<VoiceOption> {
    VOICES
        .iter()
        .filter(|(_, _, language, _)| *language == language_code)
        .map(|(id, name, language, gender)| VoiceOption {
            id: (*id).to_string(),
            name: (*name).to_string(),
            language: (*language).to_string(),
            gender: (*gender).to_string(),
        })
        .collect()
}

pub fn voice_gender(voice_id: &str) -> Option<&'static str> {
    VOICES.iter().find(|(id, ..)| *id == voice_id).map(|(.., gender)| *gender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voices_filtered_by_language() {
        let voices = voices_for("es");
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].id, "es-ES-ElviraNeural");
        assert!(voices_for("ja").is_empty());
    }

    #[test]
    fn test_language_lookup() {
        assert_eq!(languages().len(), 10);
        assert_eq!(language_name("de"), Some("German"));
        assert_eq!(language_name("xx"), None);
    }
}
