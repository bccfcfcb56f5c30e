//! Narration history and reporting.
//!
//! Stores one JSONL file per day at ~/.interview-voice-history/{date}.jsonl.
//! Failures to write are logged and otherwise ignored.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::narrator::{Narration, SpeakOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationRecord {
    pub timestamp: String,
    pub event_type: String,
    pub input_chars: usize,
    pub spoken_text: String,
    pub generated: bool,
    pub fallback: bool,
    pub generation_latency_ms: i64,
    pub voice: Option<String>,
    pub profile: String,
    pub language: String,
    pub outcome: String,
}

impl NarrationRecord {
    pub fn from_outcome(
        event_type: &str,
        input: &str,
        spoken_text: &str,
        outcome: &SpeakOutcome,
        profile: &str,
        language: &str,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            event_type: event_type.to_string(),
            input_chars: input.chars().count(),
            spoken_text: spoken_text.to_string(),
            generated: false,
            fallback: false,
            generation_latency_ms: 0,
            voice: outcome.voice().map(str::to_string),
            profile: profile.to_string(),
            language: language.to_string(),
            outcome: outcome.label().to_string(),
        }
    }

    pub fn from_narration(
        event_type: &str,
        input: &str,
        narration: &Narration,
        profile: &str,
        language: &str,
    ) -> Self {
        Self {
            generated: narration.generated,
            fallback: narration.fallback,
            generation_latency_ms: narration.generation_ms as i64,
            ..Self::from_outcome(event_type, input, &narration.text, &narration.outcome, profile, language)
        }
    }
}

pub struct NarrationHistory {
    dir: PathBuf,
}

impl NarrationHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// ~/.interview-voice-history, or ./.interview-voice-history without a home directory.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".interview-voice-history")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}.jsonl"))
    }

    pub fn save(&self, record: &NarrationRecord) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Failed to create narration history dir: {e}");
            return;
        }

        let date = Local::now().format("%Y-%m-%d").to_string();
        let path = self.file(&date);

        let mut file = match fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open narration history file: {e}");
                return;
            }
        };

        match serde_json::to_string(record) {
            Ok(line) => {
                if let Err(e) = writeln!(file, "{line}") {
                    warn!("Failed to write narration record: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize narration record: {e}"),
        }
    }

    pub fn load(&self, date: &str) -> Vec<NarrationRecord> {
        let contents = match fs::read_to_string(self.file(date)) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn dates(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        let mut dates: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(".jsonl").map(str::to_string)
            })
            .collect();
        dates.sort();
        dates
    }

    pub fn report(&self, date: &str) -> String {
        let records = self.load(date);
        if records.is_empty() {
            return format!("No narration records for {date}.");
        }

        let total = records.len();
        let generated = records.iter().filter(|r| r.generated).count();
        let fallbacks = records.iter().filter(|r| r.fallback).count();
        let unsupported = records.iter().filter(|r| r.outcome == "unsupported").count();

        let with_generation: Vec<i64> = records
            .iter()
            .filter(|r| r.generated || r.fallback)
            .map(|r| r.generation_latency_ms)
            .collect();
        let avg_generation = if with_generation.is_empty() {
            0.0
        } else {
            with_generation.iter().sum::<i64>() as f64 / with_generation.len() as f64
        };

        let mut event_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for r in &records {
            *event_counts.entry(r.event_type.as_str()).or_insert(0) += 1;
        }

        let mut report = format!(
            "# Narration Report for {date}\n\n\
            - Total events: {total}\n\
            - Generated by endpoint: {generated}\n\
            - Fallbacks: {fallbacks}\n\
            - Unsupported host: {unsupported}\n\
            - Avg generation latency: {avg_generation:.0}ms\n\n\
            ## Event Types\n"
        );

        for (event, count) in &event_counts {
            report.push_str(&format!("- {event}: {count}\n"));
        }

        report
    }
}
