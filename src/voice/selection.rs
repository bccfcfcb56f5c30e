//! Voice matching against the host's voice list.
//!
//! Fallback chain:
//! 1. voices whose language shares the requested base code
//! 2. within those, a neural/premium/enhanced voice (persona hints break ties)
//! 3. a voice whose name matches the persona hints
//! 4. the first in-language voice
//! 5. the first voice of any language
//! 6. nothing, only when the host offers no voices at all

use tracing::{debug, warn};

use super::profiles::{base_language, VoiceProfile};
use super::synth::HostVoice;

const PREMIUM_MARKERS: &[&str] = &["neural", "premium", "enhanced", "natural"];

fn name_has_any(voice: &HostVoice, needles: &[&str]) -> bool {
    let name = voice.name.to_lowercase();
    needles.iter().any(|n| name.contains(n))
}

pub fn find_matching_voice<'a>(
    voices: &'a [HostVoice],
    profile: &VoiceProfile,
    language: &str,
) -> Option<&'a HostVoice> {
    let base = base_language(language);
    let in_language: Vec<&HostVoice> = voices
        .iter()
        .filter(|v| !base.is_empty() && base_language(&v.lang) == base)
        .collect();

    if in_language.is_empty() {
        if voices.is_empty() {
            warn!("Host offers no voices");
        } else {
            warn!("No voice for language '{language}', using first available voice");
        }
        return voices.first();
    }

    let hints = profile.voice_type.name_hints();
    let premium: Vec<&HostVoice> = in_language
        .iter()
        .copied()
        .filter(|v| name_has_any(v, PREMIUM_MARKERS))
        .collect();

    let chosen = premium
        .iter()
        .find(|v| name_has_any(v, hints))
        .or_else(|| premium.first())
        .or_else(|| in_language.iter().find(|v| name_has_any(v, hints)))
        .or_else(|| in_language.first())
        .copied();

    if let Some(v) = chosen {
        debug!("Selected voice '{}' ({}) for {}", v.name, v.lang, profile.voice_type);
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::profiles::{presets, VoiceType};

    fn profile(voice_type: VoiceType) -> VoiceProfile {
        presets()
            .into_iter()
            .find(|p| p.voice_type == voice_type)
            .unwrap()
    }

    fn voices(list: &[(&str, &str)]) -> Vec<HostVoice> {
        list.iter().map(|(n, l)| HostVoice::new(*n, *l)).collect()
    }

    #[test]
    fn test_prefers_premium_in_language() {
        let list = voices(&[
            ("Microsoft David", "en-US"),
            ("Google français", "fr-FR"),
            ("Microsoft Aria Online (Natural)", "en-US"),
        ]);
        let v = find_matching_voice(&list, &profile(VoiceType::Casual), "en-US").unwrap();
        assert_eq!(v.name, "Microsoft Aria Online (Natural)");
    }

    #[test]
    fn test_premium_tie_broken_by_persona() {
        let list = voices(&[
            ("en-US-AriaNeural", "en-US"),
            ("en-US-GuyNeural", "en-US"),
        ]);
        let v = find_matching_voice(&list, &profile(VoiceType::Authoritative), "en-US").unwrap();
        assert_eq!(v.name, "en-US-GuyNeural");
    }

    #[test]
    fn test_persona_hint_without_premium() {
        let list = voices(&[
            ("Samantha", "en-US"),
            ("Mark", "en-GB"),
            ("Fred", "en-US"),
        ]);
        let v = find_matching_voice(&list, &profile(VoiceType::Authoritative), "en-US").unwrap();
        assert_eq!(v.name, "Mark");
    }

    #[test]
    fn test_first_in_language_when_nothing_matches() {
        let list = voices(&[("Thomas", "fr-FR"), ("Zed", "de-DE"), ("Yuri", "de_DE")]);
        let v = find_matching_voice(&list, &profile(VoiceType::Energetic), "de-AT").unwrap();
        assert_eq!(v.name, "Zed");
    }

    #[test]
    fn test_any_voice_when_language_missing() {
        let list = voices(&[("Kyoko", "ja-JP"), ("Thomas", "fr-FR")]);
        for p in presets() {
            let v = find_matching_voice(&list, &p, "hi-IN");
            assert_eq!(v.map(|v| v.name.as_str()), Some("Kyoko"));
        }
    }

    #[test]
    fn test_none_only_for_empty_list() {
        assert!(find_matching_voice(&[], &profile(VoiceType::Friendly), "en-US").is_none());
        let list = voices(&[("Only", "xx")]);
        assert!(find_matching_voice(&list, &profile(VoiceType::Friendly), "").is_some());
    }
}
