//! Voice narration for mock interviews.
//!
//! Components:
//! - `patterns`: pause insertion and conversational rewrites of text
//! - `selection`: matching a persona to one of the host's voices
//! - `profiles`: personas, language table, rate/pitch/volume clamping
//! - `synth`: host speech-output contract + espeak-ng backend
//! - `generator`: remote text-generation client
//! - `prompts`: prompt templates for the generation endpoint
//! - `narrator`: the pipeline tying the above together
//! - `history`: narration history and reporting
//! - `api`: Axum HTTP server (port 8768) for the interview UI

pub mod api;
pub mod generator;
pub mod history;
pub mod narrator;
pub mod patterns;
pub mod profiles;
pub mod prompts;
pub mod selection;
pub mod synth;
