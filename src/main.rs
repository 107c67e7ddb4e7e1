use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley::api::ApiServer;
use parley::{Config, InvokeOptions, TurnCoordinator};

/// Parley - Spoken multi-turn conversation gateway
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(long, env = "PARLEY_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Synthesize text to a WAV file
    Say {
        /// Text to speak
        text: String,
        /// Output file
        #[arg(short, long, default_value = "reply.wav")]
        out: PathBuf,
    },
    /// Transcribe a WAV file
    Transcribe {
        /// Input WAV file
        file: PathBuf,
        /// Recognizer variant (e.g. "local-model", "remote-api")
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Run one text-only exchange and print the reply
    Chat {
        /// User message
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let coordinator = Arc::new(TurnCoordinator::from_config(&config));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, coordinator).await,
        Command::Say { text, out } => say(&coordinator, &text, &out).await,
        Command::Transcribe { file, engine } => {
            transcribe(&coordinator, &file, engine.as_deref()).await
        }
        Command::Chat { text } => chat(&coordinator, &text).await,
    }
}

async fn serve(config: &Config, coordinator: Arc<TurnCoordinator>) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        stt = %config.stt.engine,
        llm = %config.llm.backend,
        tts = %config.tts.engine,
        max_turns = config.session.max_turns,
        "starting parley"
    );

    ApiServer::new(coordinator, config.server.port)
        .static_dir(config.server.static_dir.clone())
        .run()
        .await?;
    Ok(())
}

async fn say(coordinator: &TurnCoordinator, text: &str, out: &Path) -> anyhow::Result<()> {
    let audio = coordinator.speak(text, &InvokeOptions::default()).await?;
    tokio::fs::write(out, &audio.wav)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;

    println!(
        "Wrote {} ({} bytes, {} Hz)",
        out.display(),
        audio.wav.len(),
        audio.sample_rate
    );
    Ok(())
}

async fn transcribe(
    coordinator: &TurnCoordinator,
    file: &Path,
    engine: Option<&str>,
) -> anyhow::Result<()> {
    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let transcription = coordinator
        .transcribe(audio, engine, &InvokeOptions::default())
        .await?;

    if transcription.is_empty() {
        println!("(no speech detected)");
    } else {
        println!(
            "{} (confidence {:.2})",
            transcription.text, transcription.confidence
        );
    }
    Ok(())
}

async fn chat(coordinator: &TurnCoordinator, text: &str) -> anyhow::Result<()> {
    match coordinator.reply(text, &InvokeOptions::default()).await? {
        Some(reply) => println!("{reply}"),
        None => println!("(nothing to reply to)"),
    }
    Ok(())
}
