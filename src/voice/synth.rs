//! Host speech-output facility.
//!
//! `SpeechSynthesis` is the narrow contract the narrator speaks through:
//! speak / cancel / pause / resume / voices. `EspeakSynthesis` drives the
//! `espeak-ng` command line, keeping at most one child process alive.

use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::profiles::SpeechParams;

const ESPEAK_BIN: &str = "espeak-ng";
const BASE_WPM: f32 = 175.0;

/// A synthetic voice offered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostVoice {
    pub name: String,
    pub lang: String,
}

impl HostVoice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// One request to vocalize a string.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<HostVoice>,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: String, voice: Option<HostVoice>, lang: &str, params: SpeechParams) -> Self {
        Self {
            text,
            voice,
            lang: lang.to_string(),
            rate: params.rate,
            pitch: params.pitch,
            volume: params.volume,
        }
    }
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("failed to start {0}: {1}")]
    Spawn(&'static str, #[source] std::io::Error),
}

pub trait SpeechSynthesis: Send + Sync {
    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError>;
    fn cancel(&self);
    fn pause(&self);
    fn resume(&self);
    fn voices(&self) -> Vec<HostVoice>;
    fn is_speaking(&self) -> bool;
}

/// espeak-ng backed speech output. The voice table is read once at detection.
pub struct EspeakSynthesis {
    current: Mutex<Option<Child>>,
    voices: Vec<HostVoice>,
}

impl EspeakSynthesis {
    /// Returns `None` when espeak-ng is not installed.
    pub fn detect() -> Option<Self> {
        let status = Command::new(ESPEAK_BIN)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => {
                let voices = list_espeak_voices();
                info!("Using {ESPEAK_BIN} for speech output ({} voices)", voices.len());
                Some(Self::with_voices(voices))
            }
            Ok(s) => {
                warn!("{ESPEAK_BIN} --version exited with {s}");
                None
            }
            Err(e) => {
                debug!("{ESPEAK_BIN} not available: {e}");
                None
            }
        }
    }

    fn with_voices(voices: Vec<HostVoice>) -> Self {
        Self {
            current: Mutex::new(None),
            voices,
        }
    }

    fn signal(&self, sig: &str) {
        let guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(child) = guard.as_ref() else {
            return;
        };
        let pid = child.id().to_string();
        if let Err(e) = Command::new("kill").args([sig, pid.as_str()]).status() {
            warn!("Failed to send {sig} to {ESPEAK_BIN} ({pid}): {e}");
        }
    }
}

impl SpeechSynthesis for EspeakSynthesis {
    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError> {
        let args = espeak_args(&utterance);
        debug!("{ESPEAK_BIN} {:?}", &args[..args.len() - 1]);

        let child = Command::new(ESPEAK_BIN)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SynthesisError::Spawn(ESPEAK_BIN, e))?;

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(child);
        if let Some(mut previous) = previous {
            let _ = previous.kill();
            let _ = previous.wait();
        }
        Ok(())
    }

    fn cancel(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = current {
            let _ = child.kill();
            let _ = child.wait();
            debug!("Speech cancelled");
        }
    }

    fn pause(&self) {
        self.signal("-STOP");
    }

    fn resume(&self) {
        self.signal("-CONT");
    }

    fn voices(&self) -> Vec<HostVoice> {
        self.voices.clone()
    }

    fn is_speaking(&self) -> bool {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                *guard = None;
                false
            }
            None => false,
        }
    }
}

fn list_espeak_voices() -> Vec<HostVoice> {
    match Command::new(ESPEAK_BIN).arg("--voices").output() {
        Ok(out) if out.status.success() => parse_espeak_voices(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            warn!("{ESPEAK_BIN} --voices exited with {}", out.status);
            Vec::new()
        }
        Err(e) => {
            warn!("Failed to list {ESPEAK_BIN} voices: {e}");
            Vec::new()
        }
    }
}

/// Command-line arguments for one utterance. The text is always last.
fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let voice = utterance
        .voice
        .as_ref()
        .map(|v| v.name.clone())
        .unwrap_or_else(|| utterance.lang.to_ascii_lowercase());

    let wpm = (BASE_WPM * utterance.rate).round() as u32;
    let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
    let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;

    vec![
        "-v".into(),
        voice,
        "-s".into(),
        wpm.to_string(),
        "-p".into(),
        pitch.to_string(),
        "-a".into(),
        amplitude.to_string(),
        "--".into(),
        utterance.text.clone(),
    ]
}

/// Parse the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 10)
/// ```
fn parse_espeak_voices(output: &str) -> Vec<HostVoice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(HostVoice::new(fields[3], fields[1]))
        })
        .collect()
}
