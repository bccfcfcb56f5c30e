//! Narration pipeline: optional LLM rewrite → speech heuristics → voice
//! matching → one utterance on the host facility.
//!
//! Profile and language are passed into every call. The only state kept
//! here is the random source for discourse markers and whether the missing
//! speech facility has already been reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use super::generator::TextGenerator;
use super::patterns::{add_natural_pauses, apply_natural_speech_patterns};
use super::profiles::VoiceProfile;
use super::prompts::{self, ENHANCE_MAX_TOKENS, FALLBACK_RESPONSE, RESPONSE_MAX_TOKENS};
use super::selection::find_matching_voice;
use super::synth::{HostVoice, SpeechSynthesis, Utterance};

const IDLE_POLL: Duration = Duration::from_millis(100);

/// What happened to a speak request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Handed to the host; `voice` is `None` when the host default is used.
    Spoken { voice: Option<String> },
    /// Nothing left to say after normalization.
    Empty,
    /// No speech facility on this host.
    Unsupported,
    /// The host refused the utterance.
    Failed,
}

impl SpeakOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Spoken { .. } => "spoken",
            Self::Empty => "empty",
            Self::Unsupported => "unsupported",
            Self::Failed => "failed",
        }
    }

    pub fn voice(&self) -> Option<&str> {
        match self {
            Self::Spoken { voice } => voice.as_deref(),
            _ => None,
        }
    }
}

/// Text produced by a generation-backed call, and how it was produced.
#[derive(Debug, Clone)]
pub struct Narration {
    pub text: String,
    /// The endpoint supplied the text.
    pub generated: bool,
    /// The endpoint failed and local fallback text was used.
    pub fallback: bool,
    pub generation_ms: f64,
    pub outcome: SpeakOutcome,
}

pub struct VoiceNarrator {
    synth: Option<Arc<dyn SpeechSynthesis>>,
    generator: Arc<dyn TextGenerator>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    unsupported_reported: AtomicBool,
}

impl VoiceNarrator {
    pub fn new(synth: Option<Arc<dyn SpeechSynthesis>>, generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_rng(synth, generator, StdRng::from_entropy())
    }

    pub fn with_rng(
        synth: Option<Arc<dyn SpeechSynthesis>>,
        generator: Arc<dyn TextGenerator>,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        let rng: Box<dyn RngCore + Send> = Box::new(rng);
        Self {
            synth,
            generator,
            rng: Mutex::new(rng),
            unsupported_reported: AtomicBool::new(false),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.synth.is_some()
    }

    fn host(&self) -> Option<&Arc<dyn SpeechSynthesis>> {
        if self.synth.is_none() {
            if !self.unsupported_reported.swap(true, Ordering::Relaxed) {
                warn!("Speech output is not supported on this host, narration disabled");
            } else {
                debug!("Speech output unsupported, ignoring request");
            }
        }
        self.synth.as_ref()
    }

    /// Informalize text with the narrator's random source.
    pub fn naturalize(&self, text: &str) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        apply_natural_speech_patterns(text, &mut **rng)
    }

    /// Speak `text` with the given persona, replacing anything already playing.
    pub fn speak(&self, text: &str, profile: &VoiceProfile, language: &str) -> SpeakOutcome {
        match self.host() {
            Some(host) => deliver(host.as_ref(), text, profile, language),
            None => SpeakOutcome::Unsupported,
        }
    }

    /// `speak` on the blocking pool; the host call waits on child processes.
    pub async fn speak_off_runtime(
        &self,
        text: &str,
        profile: &VoiceProfile,
        language: &str,
    ) -> SpeakOutcome {
        let Some(host) = self.host().cloned() else {
            return SpeakOutcome::Unsupported;
        };
        let text = text.to_string();
        let profile = profile.clone();
        let language = language.to_string();

        match tokio::task::spawn_blocking(move || deliver(host.as_ref(), &text, &profile, &language)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Speech task failed: {e}");
                SpeakOutcome::Failed
            }
        }
    }

    pub fn stop(&self) {
        if let Some(host) = self.host() {
            host.cancel();
        }
    }

    pub fn pause(&self) {
        if let Some(host) = self.host() {
            host.pause();
        }
    }

    pub fn resume(&self) {
        if let Some(host) = self.host() {
            host.resume();
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.synth.as_ref().is_some_and(|s| s.is_speaking())
    }

    pub fn available_voices(&self) -> Vec<HostVoice> {
        self.synth.as_ref().map(|s| s.voices()).unwrap_or_default()
    }

    /// Wait until the host reports no active utterance.
    pub async fn wait_until_idle(&self) {
        while self.is_speaking() {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Ask the endpoint to rewrite `text` for speech. Returns the input
    /// unchanged if the endpoint fails.
    pub async fn enhance_text_for_speech(&self, text: &str, context: Option<&str>) -> String {
        self.try_enhance(text, context).await.0
    }

    async fn try_enhance(&self, text: &str, context: Option<&str>) -> (String, bool, f64) {
        if text.trim().is_empty() {
            return (text.to_string(), false, 0.0);
        }
        let t_start = Instant::now();
        let prompt = prompts::enhance_prompt(text, context);
        let result = self.generator.generate(&prompt, ENHANCE_MAX_TOKENS).await;
        let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(enhanced) => {
                debug!("Enhanced {} chars → {} chars ({latency_ms:.0}ms)", text.len(), enhanced.len());
                (enhanced, true, latency_ms)
            }
            Err(e) => {
                warn!("Speech enhancement failed, using original text: {e}");
                (text.to_string(), false, latency_ms)
            }
        }
    }

    /// Rewrite (when `enhance` is set), informalize and speak pre-written text.
    pub async fn speak_with_generation(
        &self,
        text: &str,
        profile: &VoiceProfile,
        language: &str,
        context: Option<&str>,
        enhance: bool,
    ) -> Narration {
        let (base, generated, generation_ms) = if enhance {
            self.try_enhance(text, context).await
        } else {
            (text.to_string(), false, 0.0)
        };

        let spoken = self.naturalize(&base);
        let outcome = self.speak_off_runtime(&spoken, profile, language).await;
        Narration {
            text: spoken,
            generated,
            fallback: enhance && !generated,
            generation_ms,
            outcome,
        }
    }

    /// Generate the interviewer's next line from the conversation and speak
    /// it. Always yields something to say.
    pub async fn generate_and_speak_response(
        &self,
        user_input: &str,
        conversation_context: &str,
        profile: &VoiceProfile,
        language: &str,
    ) -> Narration {
        let t_start = Instant::now();
        let prompt = prompts::response_prompt(user_input, conversation_context);
        let result = self.generator.generate(&prompt, RESPONSE_MAX_TOKENS).await;
        let generation_ms = t_start.elapsed().as_secs_f64() * 1000.0;

        let (reply, generated) = match result {
            Ok(reply) => (reply, true),
            Err(e) => {
                warn!("Response generation failed, using fallback: {e}");
                (FALLBACK_RESPONSE.to_string(), false)
            }
        };

        let mut spoken = self.naturalize(&reply);
        if spoken.trim().is_empty() {
            spoken = self.naturalize(FALLBACK_RESPONSE);
        }
        let outcome = self.speak_off_runtime(&spoken, profile, language).await;

        Narration {
            text: spoken,
            generated,
            fallback: !generated,
            generation_ms,
            outcome,
        }
    }
}

/// Normalize, pick a voice, cancel whatever is playing and hand the
/// utterance to `host`.
fn deliver(host: &dyn SpeechSynthesis, text: &str, profile: &VoiceProfile, language: &str) -> SpeakOutcome {
    let prepared = add_natural_pauses(text);
    if prepared.is_empty() {
        debug!("Nothing to speak");
        return SpeakOutcome::Empty;
    }

    let voices = host.voices();
    let voice = find_matching_voice(&voices, profile, language).cloned();
    if voice.is_none() {
        warn!("No voices available, using host default voice");
    }

    let params = profile.speech_params();
    let voice_name = voice.as_ref().map(|v| v.name.clone());
    let utterance = Utterance::new(prepared, voice, language, params);

    host.cancel();
    match host.speak(utterance) {
        Ok(()) => {
            info!(
                "Speaking {} chars as '{}' (voice: {}, rate={:.2} pitch={:.2} volume={:.2})",
                text.len(),
                profile.name,
                voice_name.as_deref().unwrap_or("default"),
                params.rate,
                params.pitch,
                params.volume,
            );
            SpeakOutcome::Spoken { voice: voice_name }
        }
        Err(e) => {
            warn!("Speech output failed: {e}");
            SpeakOutcome::Failed
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::voice::generator::GenerationError;
    use crate::voice::profiles::presets;
    use crate::voice::synth::SynthesisError;
    use async_trait::async_trait;
    use rand::rngs::mock::StepRng;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Speak(String),
        Cancel,
        Pause,
        Resume,
    }

    /// Records calls and keeps a single "active" utterance, like a browser.
    #[derive(Default)]
    pub(crate) struct FakeSynthesis {
        pub calls: Mutex<Vec<Call>>,
        pub active: Mutex<Option<Utterance>>,
        pub voices: Vec<HostVoice>,
        pub refuse: bool,
        pub speak_threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl FakeSynthesis {
        pub fn with_voices(voices: Vec<HostVoice>) -> Self {
            Self {
                voices,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn active(&self) -> Option<Utterance> {
            self.active.lock().unwrap().clone()
        }
    }

    impl SpeechSynthesis for FakeSynthesis {
        fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError> {
            if self.refuse {
                return Err(SynthesisError::Spawn(
                    "fake",
                    std::io::Error::new(std::io::ErrorKind::NotFound, "refused"),
                ));
            }
            self.speak_threads.lock().unwrap().push(std::thread::current().id());
            self.calls.lock().unwrap().push(Call::Speak(utterance.text.clone()));
            *self.active.lock().unwrap() = Some(utterance);
            Ok(())
        }

        fn cancel(&self) {
            self.calls.lock().unwrap().push(Call::Cancel);
            *self.active.lock().unwrap() = None;
        }

        fn pause(&self) {
            self.calls.lock().unwrap().push(Call::Pause);
        }

        fn resume(&self) {
            self.calls.lock().unwrap().push(Call::Resume);
        }

        fn voices(&self) -> Vec<HostVoice> {
            self.voices.clone()
        }

        fn is_speaking(&self) -> bool {
            self.active.lock().unwrap().is_some()
        }
    }

    /// Returns a canned reply, or fails when `reply` is `None`.
    pub(crate) struct FakeGenerator {
        pub reply: Option<String>,
        pub prompts: Mutex<Vec<(String, u32)>>,
    }

    impl FakeGenerator {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push((prompt.to_string(), max_tokens));
            self.reply.clone().ok_or(GenerationError::Unsuccessful)
        }
    }

    fn profile(name: &str) -> VoiceProfile {
        presets().into_iter().find(|p| p.name == name).unwrap()
    }

    /// Never draws a discourse marker.
    pub(crate) fn no_markers() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    pub(crate) fn narrator(synth: Arc<FakeSynthesis>, generator: FakeGenerator) -> VoiceNarrator {
        let synth: Arc<dyn SpeechSynthesis> = synth;
        VoiceNarrator::with_rng(Some(synth), Arc::new(generator), no_markers())
    }

    fn en_voices() -> Vec<HostVoice> {
        vec![
            HostVoice::new("Microsoft David", "en-US"),
            HostVoice::new("Microsoft Guy Online (Natural)", "en-US"),
            HostVoice::new("Thomas", "fr-FR"),
        ]
    }

    #[test]
    fn test_speak_twice_cancels_first() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = narrator(synth.clone(), FakeGenerator::failing());
        let p = profile("professional");

        n.speak("First question.", &p, "en-US");
        n.speak("Second question.", &p, "en-US");

        assert_eq!(
            synth.calls(),
            vec![
                Call::Cancel,
                Call::Speak("First question.".into()),
                Call::Cancel,
                Call::Speak("Second question.".into()),
            ]
        );
        assert_eq!(synth.active().map(|u| u.text), Some("Second question.".into()));
        assert!(n.is_speaking());
    }

    #[test]
    fn test_speak_clamps_and_selects_voice() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = narrator(synth.clone(), FakeGenerator::failing());

        let outcome = n.speak("Hello.", &profile("energetic"), "en-US");
        assert_eq!(
            outcome,
            SpeakOutcome::Spoken {
                voice: Some("Microsoft Guy Online (Natural)".into())
            }
        );

        let u = synth.active().unwrap();
        assert_eq!(u.rate, 1.0);
        assert_eq!(u.pitch, 1.1);
        assert_eq!(u.volume, 0.95);
        assert_eq!(u.lang, "en-US");
    }

    #[test]
    fn test_speak_without_voices_uses_default() {
        let synth = Arc::new(FakeSynthesis::default());
        let n = narrator(synth.clone(), FakeGenerator::failing());
        let outcome = n.speak("Hello.", &profile("casual"), "en-US");
        assert_eq!(outcome, SpeakOutcome::Spoken { voice: None });
        assert!(synth.active().unwrap().voice.is_none());
    }

    #[test]
    fn test_speak_applies_pauses() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = narrator(synth.clone(), FakeGenerator::failing());
        n.speak("  Hmm...  let me   think ", &profile("friendly"), "en-US");
        assert_eq!(synth.active().unwrap().text, "Hmm. let me think");
    }

    #[test]
    fn test_empty_text_is_not_spoken() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = narrator(synth.clone(), FakeGenerator::failing());
        assert_eq!(n.speak("   ", &profile("friendly"), "en-US"), SpeakOutcome::Empty);
        assert!(synth.calls().is_empty());
    }

    #[test]
    fn test_host_refusal_is_swallowed() {
        let synth = Arc::new(FakeSynthesis {
            refuse: true,
            ..FakeSynthesis::default()
        });
        let n = narrator(synth, FakeGenerator::failing());
        assert_eq!(n.speak("Hi.", &profile("friendly"), "en-US"), SpeakOutcome::Failed);
    }

    #[test]
    fn test_unsupported_host_is_noop() {
        let n = VoiceNarrator::new(None, Arc::new(FakeGenerator::failing()));
        let p = profile("friendly");
        assert_eq!(n.speak("Hi.", &p, "en-US"), SpeakOutcome::Unsupported);
        assert_eq!(n.speak("Again.", &p, "en-US"), SpeakOutcome::Unsupported);
        n.stop();
        n.pause();
        n.resume();
        assert!(!n.is_speaking());
        assert!(n.available_voices().is_empty());
    }

    #[test]
    fn test_passthrough_controls() {
        let synth = Arc::new(FakeSynthesis::default());
        let n = narrator(synth.clone(), FakeGenerator::failing());
        n.pause();
        n.resume();
        n.stop();
        assert_eq!(synth.calls(), vec![Call::Pause, Call::Resume, Call::Cancel]);
    }

    #[tokio::test]
    async fn test_response_fallback_when_endpoint_fails() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = narrator(synth.clone(), FakeGenerator::failing());

        let narration = n
            .generate_and_speak_response("I shipped it.", "", &profile("professional"), "en-US")
            .await;

        assert!(!narration.text.trim().is_empty());
        assert!(narration.fallback);
        assert!(!narration.generated);
        assert!(narration.text.contains("I'm sorry"), "{}", narration.text);
        assert!(!narration.text.contains("Could you please"));
        assert!(synth.active().is_some());
    }

    #[tokio::test]
    async fn test_response_fallback_without_host() {
        let n = VoiceNarrator::new(None, Arc::new(FakeGenerator::failing()));
        let narration = n
            .generate_and_speak_response("Hello", "", &profile("professional"), "en-US")
            .await;
        assert!(!narration.text.is_empty());
        assert_eq!(narration.outcome, SpeakOutcome::Unsupported);
    }

    #[tokio::test]
    async fn test_response_uses_generated_reply() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let generator = FakeGenerator::replying("That is great. What did you learn?");
        let n = narrator(synth.clone(), generator);

        let narration = n
            .generate_and_speak_response("I led a migration.", "Q: Tell me about a project.", &profile("friendly"), "en-US")
            .await;

        assert!(narration.generated);
        assert_eq!(narration.text, "That's great. What did you learn?");
        assert_eq!(synth.active().unwrap().text, "That's great. What did you learn?");
    }

    #[tokio::test]
    async fn test_response_prompt_carries_context() {
        let generator = Arc::new(FakeGenerator::replying("Nice."));
        let n = VoiceNarrator::new(None, generator.clone());
        n.generate_and_speak_response("My answer", "Q: first question", &profile("friendly"), "en-US")
            .await;

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("Q: first question"));
        assert!(prompts[0].0.contains("My answer"));
        assert_eq!(prompts[0].1, RESPONSE_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_enhance_returns_original_on_failure() {
        let n = VoiceNarrator::new(None, Arc::new(FakeGenerator::failing()));
        let text = "Welcome to your mock interview.";
        assert_eq!(n.enhance_text_for_speech(text, None).await, text);
    }

    #[tokio::test]
    async fn test_enhance_returns_rewrite() {
        let n = VoiceNarrator::new(None, Arc::new(FakeGenerator::replying("Hey, welcome in!")));
        assert_eq!(
            n.enhance_text_for_speech("Welcome to your mock interview.", Some("intro")).await,
            "Hey, welcome in!"
        );
    }

    #[tokio::test]
    async fn test_speak_with_generation_falls_back_to_local_heuristics() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = narrator(synth.clone(), FakeGenerator::failing());

        let narration = n
            .speak_with_generation(
                "Please describe your experience with project management.",
                &profile("executive"),
                "en-US",
                None,
                true,
            )
            .await;

        assert!(narration.fallback);
        assert_eq!(narration.text, "Tell me about your experience with project management.");
        assert_eq!(
            synth.active().map(|u| u.text),
            Some("Tell me about your experience with project management.".into())
        );
    }

    #[tokio::test]
    async fn test_speak_with_generation_skips_endpoint_when_disabled() {
        let generator = Arc::new(FakeGenerator::replying("rewritten"));
        let synth: Arc<dyn SpeechSynthesis> = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = VoiceNarrator::with_rng(Some(synth), generator.clone(), no_markers());

        let narration = n
            .speak_with_generation("I am ready.", &profile("casual"), "en-US", None, false)
            .await;

        assert_eq!(narration.text, "I'm ready.");
        assert!(!narration.fallback);
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generated_speech_runs_on_blocking_pool() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = narrator(synth.clone(), FakeGenerator::replying("Sounds good."));

        n.speak_with_generation("Ready?", &profile("casual"), "en-US", None, true).await;
        n.generate_and_speak_response("Yes.", "", &profile("casual"), "en-US").await;

        let runtime_thread = std::thread::current().id();
        let threads = synth.speak_threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|t| *t != runtime_thread));
        assert_eq!(
            synth.calls(),
            vec![
                Call::Cancel,
                Call::Speak("Sounds good.".into()),
                Call::Cancel,
                Call::Speak("Sounds good.".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_speak_off_runtime_without_host() {
        let n = VoiceNarrator::new(None, Arc::new(FakeGenerator::failing()));
        assert_eq!(
            n.speak_off_runtime("Hi.", &profile("casual"), "en-US").await,
            SpeakOutcome::Unsupported
        );
    }

    #[tokio::test]
    async fn test_wait_until_idle_returns_after_stop() {
        let synth = Arc::new(FakeSynthesis::with_voices(en_voices()));
        let n = Arc::new(narrator(synth, FakeGenerator::failing()));
        n.speak("Hello.", &profile("casual"), "en-US");
        assert!(n.is_speaking());

        let waiter = {
            let n = n.clone();
            tokio::spawn(async move { n.wait_until_idle().await })
        };
        n.stop();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
