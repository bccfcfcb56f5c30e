//! Text heuristics that make synthesized speech sound less robotic.
//!
//! `add_natural_pauses` is deterministic. `apply_natural_speech_patterns`
//! takes the random source as a parameter so callers decide how discourse
//! markers get sprinkled in.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};

/// Sentences longer than this get split into chunks.
const LONG_SENTENCE_CHARS: usize = 150;
/// Target upper bound for a chunk of a split sentence.
const MAX_CHUNK_CHARS: usize = 120;

/// Chance that a sentence gets a discourse marker.
pub const DISCOURSE_MARKER_PROBABILITY: f64 = 0.2;
pub const DISCOURSE_MARKERS: &[&str] = &["Well,", "So,", "Now,"];

const CONTRACTIONS: &[(&str, &str)] = &[
    ("I will", "I'll"),
    ("I am", "I'm"),
    ("I would", "I'd"),
    ("I have", "I've"),
    ("you are", "you're"),
    ("You are", "You're"),
    ("you will", "you'll"),
    ("You will", "You'll"),
    ("we are", "we're"),
    ("We are", "We're"),
    ("it is", "it's"),
    ("It is", "It's"),
    ("that is", "that's"),
    ("That is", "That's"),
    ("let us", "let's"),
    ("Let us", "Let's"),
    ("do not", "don't"),
    ("Do not", "Don't"),
    ("does not", "doesn't"),
    ("did not", "didn't"),
    ("cannot", "can't"),
    ("will not", "won't"),
    ("would not", "wouldn't"),
];

const OPENERS: &[(&str, &str)] = &[
    ("Please describe", "Tell me about"),
    ("Please explain", "Walk me through"),
    ("Please provide", "Can you share"),
    ("Please elaborate on", "Tell me more about"),
    ("Could you please", "Could you"),
    ("Additionally,", "Also,"),
    ("Furthermore,", "Plus,"),
    ("In addition,", "Also,"),
    ("Therefore,", "So"),
];

static CONTRACTION_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| compile(CONTRACTIONS));
static OPENER_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| compile(OPENERS));

static ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{3,}|…").expect("valid regex"));
static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,.!?;:])").expect("valid regex"));
static MISSING_SPACE_AFTER_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,!?;:])([A-Za-z])|(\.)([A-Z][a-z])").expect("valid regex"));
static REPEATED_STOPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])(?:\s*\.)+").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static BREAK_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(,)\s+|\s+\b(and|but|or|so|because|while|which)\b\s+").expect("valid regex")
});

fn compile(rules: &[(&'static str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .map(|(from, to)| {
            let pattern = format!(r"\b{}", regex::escape(from));
            let pattern = if from.ends_with(',') {
                pattern
            } else {
                format!(r"{pattern}\b")
            };
            (Regex::new(&pattern).expect("valid regex"), *to)
        })
        .collect()
}

/// Informalize phrasing: contractions, softer openers and the occasional
/// discourse marker at the start of a sentence.
pub fn apply_natural_speech_patterns<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut out = text.to_string();
    for (re, replacement) in CONTRACTION_RULES.iter().chain(OPENER_RULES.iter()) {
        out = re.replace_all(&out, *replacement).into_owned();
    }

    let sentences: Vec<String> = split_sentences(&out)
        .into_iter()
        .map(|sentence| {
            if starts_with_marker(sentence) || !rng.gen_bool(DISCOURSE_MARKER_PROBABILITY) {
                return sentence.to_string();
            }
            let marker = DISCOURSE_MARKERS[rng.gen_range(0..DISCOURSE_MARKERS.len())];
            format!("{marker} {}", lowercase_first(sentence))
        })
        .collect();

    sentences.join(" ")
}

/// Normalize punctuation spacing and break overly long sentences into
/// chunks the synthesizer will pause between.
pub fn add_natural_pauses(text: &str) -> String {
    let text = ELLIPSIS.replace_all(text, ". ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = REPEATED_STOPS.replace_all(&text, "$1");
    let text = MISSING_SPACE_AFTER_PUNCT.replace_all(&text, |caps: &Captures| {
        match (caps.get(1), caps.get(2)) {
            (Some(p), Some(c)) => format!("{} {}", p.as_str(), c.as_str()),
            _ => format!("{} {}", &caps[3], &caps[4]),
        }
    });
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim();

    split_sentences(text)
        .into_iter()
        .map(|sentence| {
            if sentence.chars().count() > LONG_SENTENCE_CHARS {
                chunk_sentence(sentence)
            } else {
                sentence.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split at `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?') && bytes.get(i + 1).is_some_and(u8::is_ascii_whitespace) {
            let s = text[start..=i].trim();
            if !is_bare_punctuation(s) {
                sentences.push(s);
            }
            start = i + 1;
        }
    }

    let s = text[start..].trim();
    if !is_bare_punctuation(s) {
        sentences.push(s);
    }
    sentences
}

/// Empty, or nothing but stops and separators (a leading ellipsis leaves a lone ".").
fn is_bare_punctuation(s: &str) -> bool {
    s.chars().all(|c| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
}

fn starts_with_marker(sentence: &str) -> bool {
    DISCOURSE_MARKERS.iter().any(|m| sentence.starts_with(m))
}

/// Lowercase the first letter unless the sentence opens with "I" or "I'm".
fn lowercase_first(sentence: &str) -> String {
    let first_word = sentence.split_whitespace().next().unwrap_or_default();
    if first_word == "I" || first_word.starts_with("I'") {
        return sentence.to_string();
    }
    let mut chars = sentence.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capitalize_first(chunk: &str) -> String {
    let mut chars = chunk.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split at the last comma/conjunction that keeps the chunk within
/// `MAX_CHUNK_CHARS`, or the first one beyond it. Text with no break point
/// stays whole.
fn chunk_sentence(sentence: &str) -> String {
    let mut chunks: Vec<String> = Vec::new();
    let mut rest = sentence;

    while rest.chars().count() > MAX_CHUNK_CHARS {
        let mut within: Option<(usize, usize)> = None;
        let mut beyond: Option<(usize, usize)> = None;

        for caps in BREAK_POINT.captures_iter(rest) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
            let (cut, next) = match (caps.get(1), caps.get(2)) {
                (Some(_), _) => whole,
                (None, Some(conj)) => (whole.0, conj.start()),
                (None, None) => continue,
            };
            if rest[..cut].trim().is_empty() || rest[next..].trim().is_empty() {
                continue;
            }
            if rest[..cut].chars().count() <= MAX_CHUNK_CHARS {
                within = Some((cut, next));
            } else {
                beyond = Some((cut, next));
                break;
            }
        }

        let Some((cut, next)) = within.or(beyond) else {
            break;
        };
        chunks.push(rest[..cut].trim().trim_end_matches([',', ';', ':']).to_string());
        rest = rest[next..].trim_start();
    }
    chunks.push(rest.to_string());

    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(chunk);
            continue;
        }
        if !out.ends_with(['.', '!', '?']) {
            out.push('.');
        }
        out.push(' ');
        out.push_str(&capitalize_first(chunk));
    }
    out
}
