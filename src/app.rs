//! Terminal surface for the assistant.
//!
//! # Architecture
//!
//! [`AssistantApp`] owns the controllers and turns each input line, parsed
//! into a [`Command`], into one user action.  Long-running work (queries,
//! capture sessions) runs in tasks tracked by a `JoinSet`, so the prompt
//! stays responsive and a second question can be asked while the first is
//! still in flight.
//!
//! # Commands
//!
//! | Input | Action |
//! |-------|--------|
//! | any text | put it in the input line and submit it |
//! | empty line | submit the current input line (e.g. a voice transcript) |
//! | `/voice` | toggle voice input |
//! | `/stop` | stop speaking |
//! | `/again` | speak the last answer again |
//! | `/upload <path>` | upload a PDF, DOC, DOCX or TXT document |
//! | `/delete` | delete the uploaded document (asks first) |
//! | `/history` | show / hide the conversation history |
//! | `/status` | show the current mode and document state |
//! | `/help` | list commands |
//! | `/quit` | exit |

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;

use crate::assistant::{DocumentManager, QueryOrchestrator};
use crate::config::AppConfig;
use crate::notify::{Level, Notification, Notifier};
use crate::service::{AssistantService, UploadFile};
use crate::session::{lock, ConversationEntry, InteractionState, SharedSession};
use crate::speech::{
    CaptureController, CaptureOutcome, CaptureStart, PlaybackController, Recognizer, Synthesizer,
};

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the input line with this text and submit it.
    Ask(String),
    /// Submit the input line as it is.
    Submit,
    Voice,
    Stop,
    SpeakAgain,
    Upload(PathBuf),
    Delete,
    History,
    Status,
    Help,
    Quit,
}

/// Parse an input line.
///
/// ```
/// use voice_doc_assistant::app::{parse_command, Command};
///
/// assert_eq!(parse_command("/voice"), Ok(Command::Voice));
/// assert_eq!(parse_command("What is covered?"), Ok(Command::Ask("What is covered?".into())));
/// ```
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Ok(if line.trim().is_empty() {
            Command::Submit
        } else {
            Command::Ask(line.to_string())
        });
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "voice" | "v" => Ok(Command::Voice),
        "stop" => Ok(Command::Stop),
        "again" | "speak" => Ok(Command::SpeakAgain),
        "upload" | "u" if arg.is_empty() => Err("usage: /upload <path>".into()),
        "upload" | "u" => Ok(Command::Upload(PathBuf::from(arg))),
        "delete" => Ok(Command::Delete),
        "history" | "h" => Ok(Command::History),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command /{other} (try /help)")),
    }
}

/// Read one input line without its line ending.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, so a
/// stray byte on the terminal never ends the session.  `None` at end of
/// input.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Ask the user before calling [`AssistantApp::delete_document`].
    ConfirmDelete,
    Quit,
}

// ---------------------------------------------------------------------------
// TerminalNotifier
// ---------------------------------------------------------------------------

/// Prints notifications on the terminal.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: Notification) {
        log::debug!("notify: {notification}");
        match notification.level {
            Level::Warning | Level::Error => eprintln!("{notification}"),
            Level::Info | Level::Success => println!("{notification}"),
        }
    }
}

// ---------------------------------------------------------------------------
// AssistantApp
// ---------------------------------------------------------------------------

/// Wires the controllers to the terminal.
pub struct AssistantApp {
    session: SharedSession,
    capture: CaptureController,
    playback: PlaybackController,
    queries: QueryOrchestrator,
    documents: DocumentManager,
    notifier: Arc<dyn Notifier>,
    confirm_delete: bool,
    /// Shared with in-flight query tasks, which read it when they finish.
    show_history: Arc<AtomicBool>,
    tasks: JoinSet<()>,
}

impl AssistantApp {
    /// Build the app.  `recognizer` / `synthesizer` are `None` when the host
    /// lacks the capability.
    pub fn new(
        config: &AppConfig,
        session: SharedSession,
        service: Arc<dyn AssistantService>,
        recognizer: Option<Arc<dyn Recognizer>>,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let capture = CaptureController::new(
            session.clone(),
            recognizer,
            notifier.clone(),
            config.speech.locale.clone(),
        );
        let playback = PlaybackController::new(session.clone(), synthesizer, notifier.clone());
        let queries = QueryOrchestrator::new(
            session.clone(),
            service.clone(),
            playback.clone(),
            notifier.clone(),
        );
        let documents = DocumentManager::new(session.clone(), service, notifier.clone());

        Self {
            session,
            capture,
            playback,
            queries,
            documents,
            notifier,
            confirm_delete: config.ui.confirm_delete,
            show_history: Arc::new(AtomicBool::new(config.ui.show_history)),
            tasks: JoinSet::new(),
        }
    }

    /// Run one command.
    pub async fn handle(&mut self, command: Command) -> Flow {
        self.reap();

        match command {
            Command::Ask(text) => {
                lock(&self.session).set_query_text(text);
                self.submit();
            }
            Command::Submit => self.submit(),
            Command::Voice => self.toggle_voice(),
            Command::Stop => {
                if !self.playback.stop() {
                    self.notifier.notify(Notification::info("Nothing is being spoken"));
                }
            }
            Command::SpeakAgain => self.speak_again(),
            Command::Upload(path) => self.upload(path).await,
            Command::Delete => {
                if !self.documents.is_ready() {
                    self.notifier
                        .notify(Notification::warning("No document has been uploaded"));
                } else if self.confirm_delete {
                    return Flow::ConfirmDelete;
                } else {
                    self.delete_document().await;
                }
            }
            Command::History => {
                let shown = !self.show_history.fetch_xor(true, Ordering::SeqCst);
                if shown {
                    print!("{}", render_history(&lock(&self.session).history().snapshot()));
                } else {
                    println!("History hidden.");
                }
            }
            Command::Status => println!("{}", self.status_line()),
            Command::Help => println!("{}", help_text()),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Delete the document.  Call after the user confirmed.
    pub async fn delete_document(&self) {
        // Failures were already shown to the user.
        let _ = self.documents.delete().await;
    }

    /// Stop voice input and speech, and drop in-flight work.
    pub async fn shutdown(&mut self) {
        self.capture.stop_capture();
        self.playback.stop();
        self.tasks.shutdown().await;
        log::info!("app: shut down");
    }

    pub fn show_history(&self) -> bool {
        self.show_history.load(Ordering::SeqCst)
    }

    /// One-line summary of the session.
    pub fn status_line(&self) -> String {
        let s = lock(&self.session);
        render_status(
            s.mode(),
            s.query_text(),
            s.document_ready(),
            s.history().len(),
            self.capture.is_available(),
            self.playback.is_available(),
        )
    }

    /// The prompt shown before each input line.
    pub fn prompt(&self) -> String {
        let s = lock(&self.session);
        match s.mode() {
            InteractionState::Idle => "> ".to_string(),
            mode => format!("[{}] > ", mode.label()),
        }
    }

    // ---- Actions -----------------------------------------------------------

    fn submit(&mut self) {
        let question = lock(&self.session).query_text().to_string();
        let queries = self.queries.clone();
        let session = self.session.clone();
        let show_history = self.show_history.clone();

        self.tasks.spawn(async move {
            if let Ok(answer) = queries.submit(&question).await {
                print!("{}", answer_report(answer.entry.answer(), &show_history, &session));
            }
        });
    }

    fn toggle_voice(&mut self) {
        match self.capture.start_capture() {
            Ok(CaptureStart::Started(task)) => {
                self.tasks.spawn(async move {
                    if let Some(CaptureOutcome::Transcribed(text)) = task.wait().await {
                        println!("\nHeard: {text}\n(press Enter to ask, or type to replace)");
                    }
                });
            }
            Ok(CaptureStart::Stopped) => println!("Voice input stopped."),
            // Already shown to the user by the controller.
            Err(_) => {}
        }
    }

    fn speak_again(&mut self) {
        if lock(&self.session).pending_response().is_none() {
            self.notifier.notify(Notification::info("No answer to repeat yet"));
            return;
        }
        if self.queries.speak_again().is_none() {
            self.notifier
                .notify(Notification::warning("Speech output is not available"));
        }
    }

    async fn upload(&mut self, path: PathBuf) {
        let file = match UploadFile::from_path(&path).await {
            Ok(file) => file,
            Err(e) => {
                self.notifier
                    .notify(Notification::error("Upload Error").with_description(e.to_string()));
                return;
            }
        };
        if self.documents.upload(&file).await.is_ok() {
            println!("Document is ready for querying. Use /upload to upload another document.");
        }
    }

    /// Collect finished background tasks.
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    log::error!("app: background task panicked: {e}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// What is printed when an answer arrives.  The history panel is included
/// when it is visible at that moment.
pub fn answer_report(answer: &str, show_history: &AtomicBool, session: &SharedSession) -> String {
    let mut out = format!("\nResponse: {answer}\n");
    if show_history.load(Ordering::SeqCst) {
        out.push_str(&render_history(&lock(session).history().snapshot()));
    }
    out
}

/// The history panel, newest first.
pub fn render_history(entries: &[ConversationEntry]) -> String {
    if entries.is_empty() {
        return "No conversation yet.\n".to_string();
    }
    let mut out = String::from("Conversation History\n");
    for entry in entries {
        out.push_str(&format!(
            "  Q: {}\n  A: {}\n     {}\n",
            entry.question(),
            entry.answer(),
            entry.timestamp()
        ));
    }
    out
}

/// The `/status` line.
pub fn render_status(
    mode: InteractionState,
    query_text: &str,
    document_ready: bool,
    history_len: usize,
    can_listen: bool,
    can_speak: bool,
) -> String {
    let document = if document_ready {
        "document ready for querying"
    } else {
        "no document (use /upload)"
    };
    let input = if query_text.is_empty() {
        String::from("(empty)")
    } else {
        format!("{query_text:?}")
    };
    format!(
        "mode: {} | {document} | answers: {history_len} | input: {input} | voice in: {} | voice out: {}",
        mode.label(),
        on_off(can_listen),
        on_off(can_speak),
    )
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

pub fn help_text() -> &'static str {
    "Type a question and press Enter to ask it.\n\
     Enter on an empty line asks the current input (e.g. a voice transcript).\n\
     /voice           start or stop voice input\n\
     /stop            stop speaking\n\
     /again           speak the last answer again\n\
     /upload <path>   upload a PDF, DOC, DOCX or TXT document\n\
     /delete          delete the uploaded document\n\
     /history         show or hide the conversation history\n\
     /status          show the current state\n\
     /quit            exit"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::service::ServiceError;
    use crate::session::{new_shared_session, Transition};

    // ---- parse_command ---

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_command("What is the refund policy?\n"),
            Ok(Command::Ask("What is the refund policy?".into()))
        );
    }

    #[test]
    fn blank_line_submits_current_input() {
        assert_eq!(parse_command(""), Ok(Command::Submit));
        assert_eq!(parse_command("   \r\n"), Ok(Command::Submit));
    }

    #[test]
    fn slash_commands() {
        assert_eq!(parse_command("/voice"), Ok(Command::Voice));
        assert_eq!(parse_command("/stop"), Ok(Command::Stop));
        assert_eq!(parse_command("/again"), Ok(Command::SpeakAgain));
        assert_eq!(parse_command("/delete"), Ok(Command::Delete));
        assert_eq!(parse_command("/history"), Ok(Command::History));
        assert_eq!(parse_command("/status"), Ok(Command::Status));
        assert_eq!(parse_command("/help"), Ok(Command::Help));
        assert_eq!(parse_command("/quit"), Ok(Command::Quit));
        assert_eq!(parse_command("  /exit  "), Ok(Command::Quit));
    }

    #[test]
    fn upload_takes_a_path() {
        assert_eq!(
            parse_command("/upload  docs/My Policy.pdf "),
            Ok(Command::Upload(PathBuf::from("docs/My Policy.pdf")))
        );
        assert!(parse_command("/upload").is_err());
    }

    #[tokio::test]
    async fn read_line_replaces_invalid_utf8() {
        let input: &[u8] = b"caf\xe9\r\n/status\n/quit";
        let mut reader = tokio::io::BufReader::new(input);

        let first = read_line(&mut reader).await.expect("read").expect("line");
        assert_eq!(first, "caf\u{fffd}");
        assert_eq!(parse_command(&first), Ok(Command::Ask(first.clone())));

        let second = read_line(&mut reader).await.expect("read");
        assert_eq!(second.as_deref(), Some("/status"));
        let third = read_line(&mut reader).await.expect("read");
        assert_eq!(third.as_deref(), Some("/quit"));
        assert_eq!(read_line(&mut reader).await.expect("read"), None);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = parse_command("/dance").unwrap_err();
        assert!(err.contains("/dance"));
    }

    // ---- rendering ---

    #[test]
    fn history_renders_entries_in_given_order() {
        let entries = vec![
            ConversationEntry::new("second?", "two", "t2"),
            ConversationEntry::new("first?", "one", "t1"),
        ];
        let out = render_history(&entries);
        let second = out.find("Q: second?").expect("second");
        let first = out.find("Q: first?").expect("first");
        assert!(second < first);
        assert!(out.contains("A: one"));
    }

    #[test]
    fn empty_history_renders_placeholder() {
        assert_eq!(render_history(&[]), "No conversation yet.\n");
    }

    #[test]
    fn status_mentions_document_and_mode() {
        let line = render_status(InteractionState::Speaking, "", true, 2, false, true);
        assert!(line.contains("mode: Speaking"));
        assert!(line.contains("document ready for querying"));
        assert!(line.contains("answers: 2"));
        assert!(line.contains("voice in: off"));
        assert!(line.contains("voice out: on"));
    }

    // ---- AssistantApp ---

    #[derive(Default)]
    struct StubService {
        asked: Mutex<Vec<String>>,
        deletes: Mutex<usize>,
    }

    #[async_trait]
    impl AssistantService for StubService {
        async fn query(&self, question: &str) -> Result<String, ServiceError> {
            self.asked.lock().unwrap().push(question.to_string());
            Ok(format!("answer to {question}"))
        }

        async fn upload(&self, _file: &UploadFile) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn delete_document(&self) -> Result<(), ServiceError> {
            *self.deletes.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn app(config: &AppConfig) -> (AssistantApp, SharedSession, Arc<StubService>, Arc<RecordingNotifier>) {
        let session = new_shared_session();
        let service = Arc::new(StubService::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let app = AssistantApp::new(
            config,
            session.clone(),
            service.clone(),
            None,
            None,
            notifier.clone(),
        );
        (app, session, service, notifier)
    }

    async fn settle(app: &mut AssistantApp) {
        while app.tasks.join_next().await.is_some() {}
    }

    #[tokio::test]
    async fn ask_fills_input_and_submits() {
        let (mut app, session, service, _) = app(&AppConfig::default());

        assert_eq!(app.handle(Command::Ask("Is it covered?".into())).await, Flow::Continue);
        settle(&mut app).await;

        assert_eq!(*service.asked.lock().unwrap(), vec!["Is it covered?"]);
        let s = lock(&session);
        assert_eq!(s.pending_response(), Some("answer to Is it covered?"));
        // Without a synthesizer the answer is never spoken, so nothing
        // clears the input line.
        assert_eq!(s.query_text(), "Is it covered?");
        assert_eq!(s.mode(), InteractionState::Idle);
    }

    #[tokio::test]
    async fn submit_with_empty_input_sends_nothing() {
        let (mut app, _, service, notifier) = app(&AppConfig::default());

        app.handle(Command::Submit).await;
        settle(&mut app).await;

        assert!(service.asked.lock().unwrap().is_empty());
        assert_eq!(notifier.count(Level::Warning), 1);
    }

    #[tokio::test]
    async fn voice_without_capability_is_reported() {
        let (mut app, session, _, notifier) = app(&AppConfig::default());

        app.handle(Command::Voice).await;

        assert_eq!(lock(&session).mode(), InteractionState::Idle);
        assert_eq!(notifier.count(Level::Error), 1);
    }

    #[tokio::test]
    async fn delete_asks_for_confirmation_when_configured() {
        let (mut app, session, service, _) = app(&AppConfig::default());
        lock(&session).mark_document_ready();

        assert_eq!(app.handle(Command::Delete).await, Flow::ConfirmDelete);
        assert_eq!(*service.deletes.lock().unwrap(), 0);

        app.delete_document().await;
        assert_eq!(*service.deletes.lock().unwrap(), 1);
        assert!(!lock(&session).document_ready());
    }

    #[tokio::test]
    async fn delete_without_confirmation_runs_immediately() {
        let mut config = AppConfig::default();
        config.ui.confirm_delete = false;
        let (mut app, session, service, _) = app(&config);
        lock(&session).mark_document_ready();

        assert_eq!(app.handle(Command::Delete).await, Flow::Continue);
        assert_eq!(*service.deletes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_without_document_is_refused() {
        let (mut app, _, service, notifier) = app(&AppConfig::default());

        assert_eq!(app.handle(Command::Delete).await, Flow::Continue);
        assert_eq!(*service.deletes.lock().unwrap(), 0);
        assert_eq!(notifier.count(Level::Warning), 1);
    }

    #[tokio::test]
    async fn history_toggles() {
        let (mut app, _, _, _) = app(&AppConfig::default());
        assert!(!app.show_history());
        app.handle(Command::History).await;
        assert!(app.show_history());
        app.handle(Command::History).await;
        assert!(!app.show_history());
    }

    #[tokio::test]
    async fn answer_report_follows_history_toggled_while_in_flight() {
        let (mut app, session, _, _) = app(&AppConfig::default());
        lock(&session).record_answer(ConversationEntry::new("q?", "a.", "t"));
        // The flag as a query task spawned now holds it.
        let in_flight = app.show_history.clone();
        assert!(!answer_report("a.", &in_flight, &session).contains("Q: q?"));

        app.handle(Command::History).await;

        let report = answer_report("a.", &in_flight, &session);
        assert!(report.starts_with("\nResponse: a.\n"));
        assert!(report.contains("Q: q?"));
    }

    #[tokio::test]
    async fn prompt_shows_busy_mode() {
        let (app, session, _, _) = app(&AppConfig::default());
        assert_eq!(app.prompt(), "> ");
        lock(&session).apply(Transition::BeginQuery).unwrap();
        assert_eq!(app.prompt(), "[Processing...] > ");
    }

    #[tokio::test]
    async fn upload_of_unsupported_file_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("scan.png");
        std::fs::write(&path, [0u8; 8]).expect("write");
        let (mut app, session, _, notifier) = app(&AppConfig::default());

        app.handle(Command::Upload(path)).await;

        assert!(!lock(&session).document_ready());
        assert_eq!(notifier.count(Level::Error), 1);
    }

    #[tokio::test]
    async fn quit_ends_the_loop() {
        let (mut app, _, _, _) = app(&AppConfig::default());
        assert_eq!(app.handle(Command::Quit).await, Flow::Quit);
        app.shutdown().await;
    }
}
