//! Papercast CLI - Daily Papers Podcast
//!
//! Generates a two-host podcast episode from the daily research papers feed,
//! prints the latest episode and optionally publishes it to object storage.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, Timelike};
use clap::{Parser, Subcommand};
use colored::Colorize;
use cron::Schedule;
use papercast_core::config::{Config, Secrets, SpeechBackend, default_config};
use papercast_core::{
    ArtifactStore, HttpFeed, KokoroSynthesizer, OpenAiCompletion, Pipeline, PipelineCallback,
    PipelineEvent, PodcastError, RemoteSpeech, RunOutcome, S3Store, SpeechSynthesizer,
    probe_episode, publish_all,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const POWERED_BY: [(&str, &str); 3] = [
    (
        "HF Daily Papers Feeds",
        "https://github.com/404missinglink/HF-Daily-Papers-Feeds",
    ),
    ("TLDR Takara AI", "https://tldr.takara.ai/"),
    ("Takara AI Papers Feed", "http://papers.takara.ai/api/feed"),
];

#[derive(Parser)]
#[command(
    name = "papercast",
    version,
    about = "Daily Papers Podcast - AI research, read aloud",
    long_about = "Turns the daily research papers feed into a two-host podcast episode with show notes."
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate today's episode unless it already exists
    Run {
        /// Regenerate even if today's episode exists
        #[arg(short, long)]
        force: bool,

        /// Upload the artifacts after a successful run
        #[arg(short, long)]
        publish: bool,
    },

    /// Print the latest episode, show notes and transcript
    Show,

    /// Upload the current artifacts to object storage
    Publish,

    /// Stay running and generate once a day
    Daily {
        /// Local time of the daily run, or a cron expression
        /// ("sec min hour day-of-month month day-of-week")
        #[arg(long, default_value = "06:00", value_name = "HH:MM|CRON", value_parser = parse_schedule)]
        at: Schedule,

        /// Upload the artifacts after each successful run
        #[arg(short, long)]
        publish: bool,
    },
}

/// Accept a plain `HH:MM` or a full cron expression.
fn parse_schedule(value: &str) -> Result<Schedule, String> {
    let expression = match NaiveTime::parse_from_str(value.trim(), "%H:%M") {
        Ok(time) => format!("0 {} {} * * *", time.minute(), time.hour()),
        Err(_) => value.to_string(),
    };
    Schedule::from_str(&expression)
        .map_err(|e| format!("expected HH:MM or a cron expression: {}", e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    let secrets = Secrets::from_env();

    match cli.command {
        Command::Show => {
            let store = ArtifactStore::new(&config.output.dir);
            show(&store, &mut io::stdout().lock())?;
            Ok(())
        }
        Command::Publish => {
            let store = ArtifactStore::new(&config.output.dir);
            upload(&config, &secrets, &store).await?;
            Ok(())
        }
        Command::Run { force, publish } => {
            let publish = publish || config.publish.enabled;
            match config.speech.backend {
                SpeechBackend::Local => {
                    let synth = local_speech(&config).await?;
                    run_once(&config, &secrets, synth, force, publish).await
                }
                SpeechBackend::Remote => {
                    let synth = remote_speech(&config, &secrets)?;
                    run_once(&config, &secrets, synth, force, publish).await
                }
            }
        }
        Command::Daily { at, publish } => {
            let publish = publish || config.publish.enabled;
            match config.speech.backend {
                SpeechBackend::Local => {
                    let synth = local_speech(&config).await?;
                    run_daily(&config, &secrets, synth, at, publish).await
                }
                SpeechBackend::Remote => {
                    let synth = remote_speech(&config, &secrets)?;
                    run_daily(&config, &secrets, synth, at, publish).await
                }
            }
        }
    }
}

async fn local_speech(config: &Config) -> Result<KokoroSynthesizer, PodcastError> {
    println!("{}", "Initializing TTS engine...".dimmed());
    let synth = KokoroSynthesizer::new().await?;
    synth.validate_voices(&config.voices.voice_map())?;
    Ok(synth)
}

fn remote_speech(config: &Config, secrets: &Secrets) -> Result<RemoteSpeech, PodcastError> {
    let api_key = secrets.speech_api_key.clone().ok_or_else(|| {
        PodcastError::ConfigError("SPEECH_API_KEY not set for remote speech".to_string())
    })?;
    RemoteSpeech::new(&config.speech, api_key)
}

fn build_pipeline<S: SpeechSynthesizer>(
    config: &Config,
    secrets: &Secrets,
    synth: S,
) -> Result<Pipeline<HttpFeed, OpenAiCompletion, S>, PodcastError> {
    let api_key = secrets.api_key.clone().unwrap_or_else(|| {
        eprintln!(
            "{}",
            "Warning: DEEPINFRA_API not set. API calls may fail.".yellow()
        );
        String::new()
    });

    let completion = OpenAiCompletion::new(&config.model, &api_key)?;
    let feed = HttpFeed::new(&config.feed.url);

    Ok(Pipeline::new(config, feed, completion, synth).with_callback(create_console_callback()))
}

async fn run_once<S: SpeechSynthesizer>(
    config: &Config,
    secrets: &Secrets,
    synth: S,
    force: bool,
    publish: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = build_pipeline(config, secrets, synth)?;
    print_header("Daily Papers Podcast");

    let outcome = pipeline.run(config.output.calendar.today(), force).await?;
    if let RunOutcome::Generated(report) = &outcome {
        println!();
        println!(
            "{} {}",
            "Episode:".bold(),
            report.episode.path.display().to_string().bright_white()
        );
        println!(
            "{} {}",
            "Show notes:".bold(),
            report.show_notes.display()
        );
        println!(
            "{} {}",
            "Conversation:".bold(),
            report.conversation.display()
        );
    }

    if should_publish(&outcome, publish) {
        upload(config, secrets, pipeline.store()).await?;
    }
    Ok(())
}

/// Only a freshly generated episode is uploaded.
fn should_publish(outcome: &RunOutcome, publish: bool) -> bool {
    publish && matches!(outcome, RunOutcome::Generated(_))
}

async fn run_daily<S: SpeechSynthesizer>(
    config: &Config,
    secrets: &Secrets,
    synth: S,
    schedule: Schedule,
    publish: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = build_pipeline(config, secrets, synth)?;
    print_header("Daily Papers Podcast - scheduler");
    tracing::info!(%schedule, "Starting daily scheduler");

    loop {
        let (next, wait) = next_fire(&schedule)
            .ok_or_else(|| PodcastError::ConfigError("Schedule has no upcoming runs".to_string()))?;
        tracing::info!(next = %next, wait_secs = wait.as_secs(), "Waiting for next daily run");
        tokio::time::sleep(wait).await;

        match pipeline.run(config.output.calendar.today(), false).await {
            Ok(outcome) if should_publish(&outcome, publish) => {
                if let Err(e) = upload(config, secrets, pipeline.store()).await {
                    tracing::error!(error = %e, "Publishing failed");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Daily run failed"),
        }
    }
}

/// Next local fire time of `schedule` and how long until it.
fn next_fire(schedule: &Schedule) -> Option<(DateTime<Local>, Duration)> {
    let next = schedule.upcoming(Local).next()?;
    let wait = (next - Local::now()).to_std().unwrap_or_default();
    Some((next, wait))
}

/// Upload the current artifacts. Local files are kept whatever the outcome.
async fn upload(
    config: &Config,
    secrets: &Secrets,
    store: &ArtifactStore,
) -> Result<(), PodcastError> {
    let artifacts = store.artifact_paths();
    if let Some(path) = artifacts.iter().find(|p| !p.is_file()) {
        return Err(PodcastError::UploadError {
            path: path.clone(),
            reason: "Artifact not found, generate an episode first".to_string(),
        });
    }

    let bucket = S3Store::new(&config.publish, secrets)?;
    match publish_all(&bucket, &artifacts).await {
        Ok(keys) => {
            println!(
                "{} {}",
                "Published:".green().bold(),
                keys.join(", ")
            );
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "{} {} (local artifacts kept)",
                "Upload failed:".red().bold(),
                e
            );
            Err(e)
        }
    }
}

/// Render the latest artifacts, tolerating any of them being missing.
fn show<W: Write>(store: &ArtifactStore, out: &mut W) -> io::Result<()> {
    write_header(out, "Today's Daily Papers Podcast")?;
    writeln!(out, "{}", "Powered by:".bold())?;
    for (name, url) in POWERED_BY {
        writeln!(out, "  {} {}", name.bright_cyan(), url.dimmed())?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "Listen to the Podcast".bright_magenta().bold())?;
    match store.episode() {
        Some(path) => write_episode(out, &path)?,
        None => writeln!(
            out,
            "  {}",
            "No podcast available. Please generate an episode.".yellow()
        )?,
    }
    writeln!(out)?;

    writeln!(out, "{}", "Show Notes".bright_magenta().bold())?;
    match store.load_show_notes() {
        Ok(Some(notes)) => {
            for line in notes.lines() {
                writeln!(out, "  {}", line)?;
            }
        }
        Ok(None) => writeln!(out, "  {}", "No show notes available.".yellow())?,
        Err(e) => writeln!(out, "  {} {}", "Show notes unavailable:".yellow(), e)?,
    }
    writeln!(out)?;

    writeln!(out, "{}", "Podcast Conversation".bright_magenta().bold())?;
    match store.load_conversation() {
        Ok(Some(conversation)) => {
            for line in conversation.lines() {
                writeln!(out, "  {}", format!("{}:", line.speaker).bright_cyan().bold())?;
                for text in textwrap(&line.text, 66).lines() {
                    writeln!(out, "    {}", text)?;
                }
            }
        }
        Ok(None) => writeln!(out, "  {}", "No conversation data available.".yellow())?,
        Err(e) => writeln!(out, "  {} {}", "Conversation unavailable:".yellow(), e)?,
    }

    match store.last_run() {
        Ok(Some(date)) => {
            writeln!(out)?;
            writeln!(out, "{} {}", "Last generated:".dimmed(), date)?;
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read run marker"),
    }
    Ok(())
}

fn write_episode<W: Write>(out: &mut W, path: &Path) -> io::Result<()> {
    match probe_episode(path) {
        Ok((episode, format)) => {
            let secs = episode.duration_secs().round() as u64;
            writeln!(
                out,
                "  {} ({}:{:02}, {})",
                path.display().to_string().bright_white(),
                secs / 60,
                secs % 60,
                format.dimmed()
            )
        }
        Err(e) => writeln!(out, "  {} {}", "Episode unavailable:".yellow(), e),
    }
}

fn write_header<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "═".repeat(70).bright_blue())?;
    writeln!(out, "{}", format!("  {}", title).bright_blue().bold())?;
    writeln!(out, "{}", "═".repeat(70).bright_blue())?;
    writeln!(out)
}

fn print_header(title: &str) {
    // Console banners are best effort.
    let _ = write_header(&mut io::stdout().lock(), title);
}

/// Create a callback that prints pipeline events to the console.
fn create_console_callback() -> PipelineCallback {
    Box::new(move |event| match event {
        PipelineEvent::Skipped { last_run } => {
            println!(
                "{} {}",
                "Podcast already generated today:".yellow(),
                last_run
            );
            println!("{}", "Use --force to regenerate.".dimmed());
        }
        PipelineEvent::FeedLoaded { papers } => {
            println!("{} {} papers", "▶".bright_cyan(), papers);
        }
        PipelineEvent::ConversationReady { lines } => {
            println!("{} conversation with {} lines", "▶".bright_cyan(), lines);
        }
        PipelineEvent::SynthesisStarted { lines } => {
            println!("{} generating audio for {} lines...", "▶".bright_cyan(), lines);
        }
        PipelineEvent::EpisodeMerged { duration_secs } => {
            println!(
                "{} merged episode, {:.0} seconds",
                "▶".bright_cyan(),
                duration_secs
            );
        }
        PipelineEvent::ArtifactsWritten { date } => {
            println!();
            println!("{}", "─".repeat(70).dimmed());
            println!(
                "{}",
                format!("  Podcast and show notes generated for {}.", date)
                    .bright_green()
                    .bold()
            );
            println!("{}", "─".repeat(70).dimmed());
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
