//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote question-answering / document service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the service; `/query`, `/upload` and `/delete-document`
    /// are resolved against it.
    pub base_url: String,
    /// Maximum seconds to wait for any single request.
    ///
    /// Document indexing on the server can be slow, so this is generous.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// A host program used as a speech capability.
///
/// Arguments may contain the placeholders `{locale}` and `{text}`, which are
/// substituted per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program name (resolved on `PATH`) or absolute path.
    pub program: String,
    /// Argument template.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Expand the argument template for one invocation.
    ///
    /// ```
    /// use voice_doc_assistant::config::CommandSpec;
    ///
    /// let spec = CommandSpec::new("espeak-ng", &["-v", "{locale}", "--", "{text}"]);
    /// assert_eq!(spec.render_args("en-us", "-hello"), vec!["-v", "en-us", "--", "-hello"]);
    /// ```
    pub fn render_args(&self, locale: &str, text: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{locale}", locale).replace("{text}", text))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Host speech services used for voice input and spoken answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Recognition locale passed to the capture program.
    pub locale: String,
    /// Voice-to-text program.  `None` leaves voice input unavailable.
    ///
    /// The program must perform one non-continuous recognition and print
    /// one transcript alternative per stdout line, best first.
    pub capture: Option<CommandSpec>,
    /// Text-to-speech program.  `None` disables spoken answers.
    pub playback: Option<CommandSpec>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            capture: None,
            playback: Some(CommandSpec::new("espeak-ng", &["-v", "en-us", "--", "{text}"])),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Terminal surface behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Ask for confirmation before deleting the uploaded document.
    pub confirm_delete: bool,
    /// Start with the conversation history panel visible.
    pub show_history: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            confirm_delete: true,
            show_history: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_doc_assistant::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// println!("{}", config.server.base_url);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote service settings.
    pub server: ServerConfig,
    /// Host speech capabilities.
    pub speech: SpeechConfig,
    /// Terminal surface settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.server.base_url, "http://localhost:5000");
        assert_eq!(config.speech.locale, "en-US");
        assert!(config.speech.capture.is_none());
        assert!(config.ui.confirm_delete);
    }

    #[test]
    fn default_playback_uses_espeak() {
        let cfg = AppConfig::default();
        let playback = cfg.speech.playback.expect("playback configured");
        assert_eq!(playback.program, "espeak-ng");
        assert!(playback.args.iter().any(|a| a == "{text}"));
    }

    #[test]
    fn default_playback_keeps_leading_dash_text_out_of_options() {
        let playback = SpeechConfig::default().playback.expect("playback configured");

        let args = playback.render_args("en-US", "- Refunds within 30 days");

        let separator = args.iter().position(|a| a == "--").expect("option terminator");
        assert_eq!(args[separator + 1..], ["- Refunds within 30 days"]);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.server.base_url = "http://10.0.0.5:8080".into();
        cfg.server.timeout_secs = 15;
        cfg.speech.locale = "en-GB".into();
        cfg.speech.capture = Some(CommandSpec::new("listen-once", &["--lang", "{locale}"]));
        cfg.speech.playback = None;
        cfg.ui.show_history = true;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.server.base_url, "http://10.0.0.5:8080");
        assert_eq!(loaded.server.timeout_secs, 15);
        assert_eq!(loaded.speech.locale, "en-GB");
        assert_eq!(
            loaded.speech.capture,
            Some(CommandSpec::new("listen-once", &["--lang", "{locale}"]))
        );
        assert!(loaded.speech.playback.is_none());
        assert!(loaded.ui.show_history);
    }

    #[test]
    fn command_args_default_to_empty() {
        let toml_src = r#"
            [server]
            base_url = "http://localhost:5000"
            timeout_secs = 5

            [speech]
            locale = "en-US"

            [speech.playback]
            program = "say"

            [ui]
            confirm_delete = false
            show_history = false
        "#;
        let cfg: AppConfig = toml::from_str(toml_src).expect("parse");
        let playback = cfg.speech.playback.expect("playback");
        assert_eq!(playback.program, "say");
        assert!(playback.args.is_empty());
        assert!(!cfg.ui.confirm_delete);
    }

    #[test]
    fn render_args_substitutes_every_placeholder() {
        let spec = CommandSpec::new("tts", &["--lang={locale}", "{text}", "{text}"]);
        assert_eq!(
            spec.render_args("en-US", "hi"),
            vec!["--lang=en-US", "hi", "hi"]
        );
    }
}
