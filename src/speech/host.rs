//! Host speech services backed by external programs.
//!
//! Both adapters spawn the configured program with `kill_on_drop`, so
//! cancelling the controller task (which drops the future) also kills the
//! child process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::CommandSpec;

use super::{Alternative, RecognitionResult, Recognizer, SpeechError, Synthesizer};

// ---------------------------------------------------------------------------
// CommandRecognizer
// ---------------------------------------------------------------------------

/// Runs a recognizer program once per capture session.
///
/// Each non-empty stdout line is one transcript alternative, best first, all
/// belonging to a single result.  A non-zero exit is an error whose code is
/// the first stderr line, or `exit-<status>` when stderr is empty.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: PathBuf,
    spec: CommandSpec,
}

impl CommandRecognizer {
    pub fn new(program: PathBuf, spec: CommandSpec) -> Self {
        Self { program, spec }
    }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    async fn recognize(&self, locale: &str) -> Result<Vec<RecognitionResult>, SpeechError> {
        let output = Command::new(&self.program)
            .args(self.spec.render_args(locale, ""))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SpeechError::Runtime(format!("audio-capture: {e}")))?;

        if !output.status.success() {
            return Err(SpeechError::Runtime(error_code(
                &output.stderr,
                output.status.code(),
            )));
        }

        Ok(parse_transcripts(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_transcripts(stdout: &str) -> Vec<RecognitionResult> {
    let alternatives: Vec<Alternative> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(Alternative::new)
        .collect();

    if alternatives.is_empty() {
        Vec::new()
    } else {
        vec![RecognitionResult { alternatives }]
    }
}

fn error_code(stderr: &[u8], status: Option<i32>) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    match stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(line) => line.to_string(),
        None => match status {
            Some(code) => format!("exit-{code}"),
            None => "terminated".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// CommandSynthesizer
// ---------------------------------------------------------------------------

/// Speaks text by running a TTS program such as `espeak-ng`.
///
/// If the argument template has no `{text}` placeholder the text is written
/// to the program's stdin instead.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    spec: CommandSpec,
    locale: String,
}

impl CommandSynthesizer {
    pub fn new(program: PathBuf, spec: CommandSpec, locale: impl Into<String>) -> Self {
        Self {
            program,
            spec,
            locale: locale.into(),
        }
    }

    fn text_via_stdin(&self) -> bool {
        !self.spec.args.iter().any(|a| a.contains("{text}"))
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        use tokio::io::AsyncWriteExt;

        let via_stdin = self.text_via_stdin();
        let mut child = Command::new(&self.program)
            .args(self.spec.render_args(&self.locale, text))
            .stdin(if via_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Runtime(format!("synthesis-failed: {e}")))?;

        if via_stdin {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(text.as_bytes()).await {
                    Ok(()) => {}
                    // The program may exit without reading; its status decides.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(SpeechError::Runtime(format!("synthesis-failed: {e}"))),
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SpeechError::Runtime(format!("synthesis-failed: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SpeechError::Runtime(error_code(
                &output.stderr,
                output.status.code(),
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
