//! Application entry point: Voice Document Assistant.
//!
//! # Startup sequence
//!
//! 1. Parse the command line and initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Probe the host for the configured speech programs.
//! 4. Build the HTTP service client and the speech adapters.
//! 5. Run the terminal input loop until `/quit`, end of input or Ctrl-C.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{BufReader, Stdin};
use voice_doc_assistant::{
    app::{help_text, parse_command, read_line, AssistantApp, Flow, TerminalNotifier},
    config::AppConfig,
    notify::Notifier,
    service::{AssistantService, HttpAssistantService},
    session::new_shared_session,
    speech::{Capabilities, CommandRecognizer, CommandSynthesizer, Recognizer, Synthesizer},
};

#[derive(Parser, Debug)]
#[command(name = "voice-doc-assistant", version, about = "Ask questions about a document, by voice or text")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Assistant server base URL, overriding the settings file
    #[arg(long, env = "VDA_SERVER_URL")]
    server: Option<String>,

    /// Disable voice input and spoken answers
    #[arg(long)]
    no_voice: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice Document Assistant starting up");

    // Config
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    log::info!("Assistant server: {}", config.server.base_url);

    // Speech capabilities
    let caps = if cli.no_voice {
        log::info!("Voice disabled from the command line");
        Capabilities::none()
    } else {
        Capabilities::probe(&config.speech)
    };

    let recognizer: Option<Arc<dyn Recognizer>> =
        match (caps.capture.clone(), config.speech.capture.clone()) {
            (Some(path), Some(spec)) => Some(Arc::new(CommandRecognizer::new(path, spec))),
            _ => None,
        };
    let synthesizer: Option<Arc<dyn Synthesizer>> =
        match (caps.playback.clone(), config.speech.playback.clone()) {
            (Some(path), Some(spec)) => Some(Arc::new(CommandSynthesizer::new(
                path,
                spec,
                config.speech.locale.clone(),
            ))),
            _ => None,
        };

    let service: Arc<dyn AssistantService> =
        Arc::new(HttpAssistantService::from_config(&config.server));
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier);

    let mut app = AssistantApp::new(
        &config,
        new_shared_session(),
        service,
        recognizer,
        synthesizer,
        notifier,
    );

    println!("Voice Document Assistant. Upload a document with /upload <path>, then ask away.");
    println!("{}\n", help_text());

    let mut input = BufReader::new(tokio::io::stdin());
    loop {
        prompt(&app.prompt());

        let line = tokio::select! {
            line = read_line(&mut input) => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            // End of input.
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read input ({e}); shutting down");
                break;
            }
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        match app.handle(command).await {
            Flow::Continue => {}
            Flow::ConfirmDelete => {
                if confirm(&mut input, "Delete the uploaded document? [y/N] ").await {
                    app.delete_document().await;
                }
            }
            Flow::Quit => break,
        }
    }

    app.shutdown().await;
    log::info!("Voice Document Assistant exited");
    Ok(())
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

/// Ask a yes/no question on the terminal.  Anything but `y`/`yes` is a no,
/// including unreadable input.
async fn confirm(input: &mut BufReader<Stdin>, question: &str) -> bool {
    prompt(question);
    match read_line(input).await {
        Ok(answer) => matches!(
            answer.unwrap_or_default().trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ),
        Err(e) => {
            log::warn!("Failed to read confirmation ({e}); not deleting");
            false
        }
    }
}
