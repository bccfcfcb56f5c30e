//! HTTP control API for the interview UI.
//!
//! Runs on 127.0.0.1:8768 (configurable) using axum. `/speak` is
//! fire-and-forget; `/respond` waits for the generated reply so the UI can
//! show it as a caption.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::history::{NarrationHistory, NarrationRecord};
use super::narrator::VoiceNarrator;
use super::profiles::{LanguageSupport, ProfileCatalog, VoiceProfile, LANGUAGES};
use super::synth::HostVoice;
use crate::config::VoiceConfig;

#[derive(Clone)]
pub struct VoiceApiState {
    pub narrator: Arc<VoiceNarrator>,
    pub profiles: Arc<ProfileCatalog>,
    pub history: Option<Arc<NarrationHistory>>,
    pub defaults: VoiceConfig,
    pub generation_enabled: bool,
}

impl VoiceApiState {
    /// Resolve the requested profile and language, falling back to the
    /// configured defaults and then to the profile's own language.
    fn resolve(
        &self,
        profile: Option<&str>,
        language: Option<&str>,
    ) -> Result<(VoiceProfile, String), String> {
        let name = profile.unwrap_or(&self.defaults.profile);
        let profile = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Unknown profile: {name}"))?;
        let language = language
            .map(str::to_string)
            .or_else(|| profile.language.clone())
            .unwrap_or_else(|| self.defaults.language.clone());
        Ok((profile, language))
    }

    fn record(&self, record: NarrationRecord) {
        if let Some(history) = &self.history {
            history.save(&record);
        }
    }
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SpeakRequest {
    text: String,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    enhance: Option<bool>,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Deserialize)]
struct RespondRequest {
    input: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    speaking: bool,
    supported: bool,
    profile: String,
    language: String,
    generation_enabled: bool,
}

#[derive(Serialize)]
struct SimpleResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Self {
        Self {
            status: status.into(),
            text: None,
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            text: None,
            error: Some(message.into()),
        }
    }
}

/// Build the axum router.
pub fn router(state: VoiceApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/profiles", get(handle_profiles))
        .route("/languages", get(handle_languages))
        .route("/voices", get(handle_voices))
        .route("/speak", post(handle_speak))
        .route("/respond", post(handle_respond))
        .route("/stop", post(handle_stop))
        .route("/pause", post(handle_pause))
        .route("/resume", post(handle_resume))
        .with_state(state)
}

/// Serve the API until the listener fails.
pub async fn serve_voice_api(state: VoiceApiState, port: u16) -> std::io::Result<()> {
    let app = router(state);
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Voice API listening on {addr}");
    axum::serve(listener, app).await
}

// --- Handlers ---

async fn handle_status(State(state): State<VoiceApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        speaking: state.narrator.is_speaking(),
        supported: state.narrator.is_supported(),
        profile: state.defaults.profile.clone(),
        language: state.defaults.language.clone(),
        generation_enabled: state.generation_enabled,
    })
}

async fn handle_profiles(State(state): State<VoiceApiState>) -> Json<Vec<VoiceProfile>> {
    Json(state.profiles.all().to_vec())
}

async fn handle_languages() -> Json<&'static [LanguageSupport]> {
    Json(LANGUAGES)
}

async fn handle_voices(State(state): State<VoiceApiState>) -> Json<Vec<HostVoice>> {
    let narrator = state.narrator.clone();
    let voices = tokio::task::spawn_blocking(move || narrator.available_voices())
        .await
        .unwrap_or_default();
    Json(voices)
}

async fn handle_speak(
    State(state): State<VoiceApiState>,
    Json(req): Json<SpeakRequest>,
) -> Json<SimpleResponse> {
    if req.text.trim().is_empty() {
        return Json(SimpleResponse::err("empty text"));
    }
    let (profile, language) = match state.resolve(req.profile.as_deref(), req.language.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => return Json(SimpleResponse::err(e)),
    };

    let preview: String = req.text.chars().take(80).collect();
    info!(
        "HTTP /speak [{}/{}]: \"{}{}\" ({} chars)",
        profile.name,
        language,
        preview.replace('\n', " "),
        if req.text.chars().count() > 80 { "..." } else { "" },
        req.text.len(),
    );

    let enhance = req.enhance.unwrap_or(state.defaults.enhance) && state.generation_enabled;
    tokio::spawn(async move {
        let narration = state
            .narrator
            .speak_with_generation(&req.text, &profile, &language, req.context.as_deref(), enhance)
            .await;
        state.record(NarrationRecord::from_narration(
            "speak",
            &req.text,
            &narration,
            &profile.name,
            &language,
        ));
    });

    Json(SimpleResponse::ok("speaking"))
}

async fn handle_respond(
    State(state): State<VoiceApiState>,
    Json(req): Json<RespondRequest>,
) -> Json<SimpleResponse> {
    if req.input.trim().is_empty() {
        return Json(SimpleResponse::err("empty input"));
    }
    let (profile, language) = match state.resolve(req.profile.as_deref(), req.language.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => return Json(SimpleResponse::err(e)),
    };

    info!("HTTP /respond [{}/{}]: {} chars of input", profile.name, language, req.input.len());

    let narration = state
        .narrator
        .generate_and_speak_response(&req.input, &req.context, &profile, &language)
        .await;
    if narration.fallback {
        warn!("Responded with fallback text");
    }
    state.record(NarrationRecord::from_narration(
        "respond",
        &req.input,
        &narration,
        &profile.name,
        &language,
    ));

    Json(SimpleResponse {
        text: Some(narration.text),
        ..SimpleResponse::ok("ok")
    })
}

/// Controls signal or reap the host's child process, so they run on the blocking pool.
async fn run_control(state: &VoiceApiState, control: fn(&VoiceNarrator)) {
    let narrator = state.narrator.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || control(&narrator)).await {
        warn!("Speech control task failed: {e}");
    }
}

async fn handle_stop(State(state): State<VoiceApiState>) -> Json<SimpleResponse> {
    run_control(&state, VoiceNarrator::stop).await;
    Json(SimpleResponse::ok("stopped"))
}

async fn handle_pause(State(state): State<VoiceApiState>) -> Json<SimpleResponse> {
    run_control(&state, VoiceNarrator::pause).await;
    Json(SimpleResponse::ok("paused"))
}

async fn handle_resume(State(state): State<VoiceApiState>) -> Json<SimpleResponse> {
    run_control(&state, VoiceNarrator::resume).await;
    Json(SimpleResponse::ok("resumed"))
}
