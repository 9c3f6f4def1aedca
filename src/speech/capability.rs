//! Startup probe for host speech capabilities.

use std::path::PathBuf;

use crate::config::{CommandSpec, SpeechConfig};

/// Which speech programs were found on this host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Resolved path of the voice-to-text program.
    pub capture: Option<PathBuf>,
    /// Resolved path of the text-to-speech program.
    pub playback: Option<PathBuf>,
}

impl Capabilities {
    /// Resolve the configured programs.  Missing programs are logged and
    /// leave the matching feature unavailable.
    pub fn probe(config: &SpeechConfig) -> Self {
        let caps = Self {
            capture: resolve("capture", config.capture.as_ref()),
            playback: resolve("playback", config.playback.as_ref()),
        };
        log::info!(
            "speech: capture {}, playback {}",
            availability(&caps.capture),
            availability(&caps.playback)
        );
        caps
    }

    /// No speech at all (e.g. `--no-voice`).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_capture(&self) -> bool {
        self.capture.is_some()
    }

    pub fn has_playback(&self) -> bool {
        self.playback.is_some()
    }
}

fn resolve(kind: &str, spec: Option<&CommandSpec>) -> Option<PathBuf> {
    let spec = spec?;
    match which::which(&spec.program) {
        Ok(path) => Some(path),
        Err(e) => {
            log::warn!("speech: {kind} program {:?} not usable: {e}", spec.program);
            None
        }
    }
}

fn availability(path: &Option<PathBuf>) -> &'static str {
    if path.is_some() {
        "available"
    } else {
        "unavailable"
    }
}
