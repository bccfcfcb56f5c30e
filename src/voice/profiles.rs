//! Voice profiles, language table and speech-parameter clamping.
//!
//! Profiles describe a persona's nominal rate/pitch/volume. The values
//! actually sent to the host are clamped into a narrow band that keeps
//! synthesized speech sounding natural, whatever the profile asks for.

use serde::{Deserialize, Serialize};

const RATE_RANGE: (f32, f32) = (0.8, 1.0);
const PITCH_RANGE: (f32, f32) = (0.9, 1.1);
const VOLUME_RANGE: (f32, f32) = (0.85, 0.95);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Professional,
    Friendly,
    Authoritative,
    Casual,
    Energetic,
}

impl VoiceType {
    /// Lowercase name fragments that suggest a voice suits this persona.
    pub fn name_hints(&self) -> &'static [&'static str] {
        match self {
            Self::Professional => &["aria", "jenny", "samantha", "karen"],
            Self::Friendly => &["jenny", "zira", "susan", "hazel"],
            Self::Authoritative => &["guy", "davis", "mark", "david", "daniel"],
            Self::Casual => &["tony", "jason", "alex", "fred"],
            Self::Energetic => &["sara", "emma", "ava", "nova"],
        }
    }
}

impl std::fmt::Display for VoiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Professional => write!(f, "professional"),
            Self::Friendly => write!(f, "friendly"),
            Self::Authoritative => write!(f, "authoritative"),
            Self::Casual => write!(f, "casual"),
            Self::Energetic => write!(f, "energetic"),
        }
    }
}

/// A named speaking persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice_type: VoiceType,
    #[serde(default)]
    pub language: Option<String>,
}

impl VoiceProfile {
    fn preset(
        name: &str,
        description: &str,
        rate: f32,
        pitch: f32,
        volume: f32,
        voice_type: VoiceType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rate,
            pitch,
            volume,
            voice_type,
            language: None,
        }
    }

    /// Check the nominal values against the documented profile ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.5..=2.0).contains(&self.rate) {
            return Err(format!("rate {} outside 0.5-2.0", self.rate));
        }
        if !(0.0..=2.0).contains(&self.pitch) {
            return Err(format!("pitch {} outside 0-2", self.pitch));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(format!("volume {} outside 0-1", self.volume));
        }
        Ok(())
    }

    /// Parameters that will actually be handed to the speech facility.
    pub fn speech_params(&self) -> SpeechParams {
        SpeechParams {
            rate: clamp_into(self.rate, RATE_RANGE),
            pitch: clamp_into(self.pitch, PITCH_RANGE),
            volume: clamp_into(self.volume, VOLUME_RANGE),
        }
    }
}

/// Rate, pitch and volume after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

fn clamp_into(value: f32, (lo, hi): (f32, f32)) -> f32 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}

/// Built-in personas.
pub fn presets() -> Vec<VoiceProfile> {
    vec![
        VoiceProfile::preset(
            "professional",
            "Professional interviewer: measured and clear",
            0.95,
            1.0,
            0.9,
            VoiceType::Professional,
        ),
        VoiceProfile::preset(
            "friendly",
            "Friendly coach: warm and encouraging",
            1.0,
            1.1,
            0.9,
            VoiceType::Friendly,
        ),
        VoiceProfile::preset(
            "executive",
            "Executive panel member: slow, low and deliberate",
            0.85,
            0.9,
            0.95,
            VoiceType::Authoritative,
        ),
        VoiceProfile::preset(
            "casual",
            "Casual mentor: relaxed peer conversation",
            1.05,
            1.0,
            0.85,
            VoiceType::Casual,
        ),
        VoiceProfile::preset(
            "energetic",
            "Energetic recruiter: upbeat and quick",
            1.2,
            1.2,
            1.0,
            VoiceType::Energetic,
        ),
    ]
}

/// Presets plus valid profiles from config. A config profile with a preset's
/// name replaces the preset.
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: Vec<VoiceProfile>,
}

impl ProfileCatalog {
    pub fn new(extra: &[VoiceProfile]) -> Self {
        let mut profiles = presets();
        for profile in extra {
            if let Err(e) = profile.validate() {
                tracing::warn!("Ignoring voice profile '{}': {e}", profile.name);
                continue;
            }
            match profiles.iter_mut().find(|p| p.name == profile.name) {
                Some(existing) => *existing = profile.clone(),
                None => profiles.push(profile.clone()),
            }
        }
        Self { profiles }
    }

    pub fn get(&self, name: &str) -> Option<&VoiceProfile> {
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn all(&self) -> &[VoiceProfile] {
        &self.profiles
    }
}

/// A language the narrator knows how to request voices for.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageSupport {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
    pub voices: &'static [&'static str],
}

pub const LANGUAGES: &[LanguageSupport] = &[
    LanguageSupport {
        code: "en-US",
        name: "English (US)",
        native_name: "English",
        voices: &["en-US-AriaNeural", "en-US-GuyNeural", "en-US-JennyNeural"],
    },
    LanguageSupport {
        code: "en-GB",
        name: "English (UK)",
        native_name: "English",
        voices: &["en-GB-SoniaNeural", "en-GB-RyanNeural"],
    },
    LanguageSupport {
        code: "es-ES",
        name: "Spanish",
        native_name: "Español",
        voices: &["es-ES-ElviraNeural", "es-ES-AlvaroNeural"],
    },
    LanguageSupport {
        code: "fr-FR",
        name: "French",
        native_name: "Français",
        voices: &["fr-FR-DeniseNeural", "fr-FR-HenriNeural"],
    },
    LanguageSupport {
        code: "de-DE",
        name: "German",
        native_name: "Deutsch",
        voices: &["de-DE-KatjaNeural", "de-DE-ConradNeural"],
    },
    LanguageSupport {
        code: "it-IT",
        name: "Italian",
        native_name: "Italiano",
        voices: &["it-IT-ElsaNeural", "it-IT-DiegoNeural"],
    },
    LanguageSupport {
        code: "pt-BR",
        name: "Portuguese (Brazil)",
        native_name: "Português",
        voices: &["pt-BR-FranciscaNeural", "pt-BR-AntonioNeural"],
    },
    LanguageSupport {
        code: "ja-JP",
        name: "Japanese",
        native_name: "日本語",
        voices: &["ja-JP-NanamiNeural", "ja-JP-KeitaNeural"],
    },
    LanguageSupport {
        code: "zh-CN",
        name: "Chinese (Mandarin)",
        native_name: "中文",
        voices: &["zh-CN-XiaoxiaoNeural", "zh-CN-YunxiNeural"],
    },
    LanguageSupport {
        code: "hi-IN",
        name: "Hindi",
        native_name: "हिन्दी",
        voices: &["hi-IN-SwaraNeural", "hi-IN-MadhurNeural"],
    },
];

pub fn find_language(code: &str) -> Option<&'static LanguageSupport> {
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Primary subtag of a BCP-47 tag, lowercased: "en-US" → "en".
pub fn base_language(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
