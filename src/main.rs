//! interview-voice-rs: conversational voice narration for mock interviews.

mod config;
mod voice;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voice::generator::GenerationClient;
use voice::history::{NarrationHistory, NarrationRecord};
use voice::narrator::VoiceNarrator;
use voice::profiles::{find_language, ProfileCatalog, VoiceProfile};
use voice::synth::{EspeakSynthesis, SpeechSynthesis};

#[derive(Parser, Debug)]
#[command(name = "interview-voice-rs", about = "Conversational voice narration for mock interviews")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP control API (default)
    Serve,
    /// Speak pre-written text
    Speak {
        text: String,
        #[arg(short, long)]
        profile: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
        /// Extra context for the conversational rewrite
        #[arg(long)]
        context: Option<String>,
        /// Skip the conversational rewrite
        #[arg(long)]
        no_enhance: bool,
    },
    /// Generate and speak the interviewer's reply to a candidate answer
    Ask {
        input: String,
        /// Conversation so far
        #[arg(long, default_value = "")]
        context: String,
        #[arg(short, long)]
        profile: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// List the host's voices
    Voices,
    /// List voice profiles
    Profiles,
    /// Print the narration report for a day (default: today)
    Report { date: Option<String> },
}

fn resolve_profile(
    catalog: &ProfileCatalog,
    requested: Option<&str>,
    default: &str,
) -> Result<VoiceProfile, Box<dyn std::error::Error>> {
    let name = requested.unwrap_or(default);
    catalog
        .get(name)
        .cloned()
        .ok_or_else(|| format!("unknown profile '{name}'").into())
}

fn resolve_language(requested: Option<&str>, profile: &VoiceProfile, default: &str) -> String {
    let language = requested
        .map(str::to_string)
        .or_else(|| profile.language.clone())
        .unwrap_or_else(|| default.to_string());
    if find_language(&language).is_none() {
        warn!("Language '{language}' is not in the supported table, voice matching may fall back");
    }
    language
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::Config::load(args.config.as_deref());
    let catalog = Arc::new(ProfileCatalog::new(&config.profiles));

    let synth = EspeakSynthesis::detect().map(|s| Arc::new(s) as Arc<dyn SpeechSynthesis>);
    let generator = GenerationClient::new(&config.generation)?;
    if config.generation.enabled {
        info!("Text generation endpoint: {}", generator.endpoint());
    } else {
        info!("Text generation disabled, using local heuristics only");
    }
    let narrator = Arc::new(VoiceNarrator::new(synth, Arc::new(generator)));

    let history = config.history.enabled.then(|| {
        Arc::new(NarrationHistory::new(
            config
                .history
                .dir
                .clone()
                .unwrap_or_else(NarrationHistory::default_dir),
        ))
    });

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            if !config.api.enabled {
                warn!("API disabled in config, nothing to serve");
                return Ok(());
            }
            let state = voice::api::VoiceApiState {
                narrator,
                profiles: catalog,
                history,
                defaults: config.voice.clone(),
                generation_enabled: config.generation.enabled,
            };
            voice::api::serve_voice_api(state, config.api.port).await?;
        }
        Command::Speak {
            text,
            profile,
            language,
            context,
            no_enhance,
        } => {
            let profile = resolve_profile(&catalog, profile.as_deref(), &config.voice.profile)?;
            let language = resolve_language(language.as_deref(), &profile, &config.voice.language);
            let enhance = config.voice.enhance && config.generation.enabled && !no_enhance;

            let narration = narrator
                .speak_with_generation(&text, &profile, &language, context.as_deref(), enhance)
                .await;
            println!("{}", narration.text);
            if let Some(history) = &history {
                history.save(&NarrationRecord::from_narration(
                    "speak", &text, &narration, &profile.name, &language,
                ));
            }
            narrator.wait_until_idle().await;
        }
        Command::Ask {
            input,
            context,
            profile,
            language,
        } => {
            let profile = resolve_profile(&catalog, profile.as_deref(), &config.voice.profile)?;
            let language = resolve_language(language.as_deref(), &profile, &config.voice.language);

            let narration = narrator
                .generate_and_speak_response(&input, &context, &profile, &language)
                .await;
            println!("{}", narration.text);
            if let Some(history) = &history {
                history.save(&NarrationRecord::from_narration(
                    "respond", &input, &narration, &profile.name, &language,
                ));
            }
            narrator.wait_until_idle().await;
        }
        Command::Voices => {
            for v in narrator.available_voices() {
                println!("{:<12} {}", v.lang, v.name);
            }
        }
        Command::Profiles => {
            for p in catalog.all() {
                let params = p.speech_params();
                println!(
                    "{:<14} {:<14} rate={:.2} pitch={:.2} volume={:.2}  {}",
                    p.name,
                    p.voice_type.to_string(),
                    params.rate,
                    params.pitch,
                    params.volume,
                    p.description
                );
            }
        }
        Command::Report { date } => {
            let history = history.ok_or("history is disabled in config")?;
            let date = date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
            println!("{}", history.report(&date));
            let dates = history.dates();
            if !dates.is_empty() {
                println!("Days with history in {}: {}", history.dir().display(), dates.join(", "));
            }
        }
    }

    Ok(())
}
