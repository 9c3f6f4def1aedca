//! Append-only conversation log.

use serde::Serialize;

/// One answered question.  Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationEntry {
    question: String,
    answer: String,
    timestamp: String,
}

impl ConversationEntry {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Build an entry stamped with the local wall-clock time.
    pub fn now(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self::new(question, answer, timestamp)
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// Insertion-ordered log of [`ConversationEntry`] values.
///
/// Entries are never edited or removed one at a time; the whole log is
/// cleared when the document it refers to is deleted.
#[derive(Debug, Default, Clone)]
pub struct ConversationHistory {
    entries: Vec<ConversationEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries for display, newest first.
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_newest_first() {
        let mut history = ConversationHistory::new();
        history.append(ConversationEntry::new("q1", "a1", "t1"));
        history.append(ConversationEntry::new("q2", "a2", "t2"));
        history.append(ConversationEntry::new("q3", "a3", "t3"));

        let questions: Vec<_> = history
            .snapshot()
            .iter()
            .map(|e| e.question().to_string())
            .collect();
        assert_eq!(questions, vec!["q3", "q2", "q1"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut history = ConversationHistory::new();
        history.append(ConversationEntry::new("q", "a", "t"));
        history.clear();
        assert!(history.is_empty());
        assert!(history.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut history = ConversationHistory::new();
        history.append(ConversationEntry::new("q", "a", "t"));
        let snap = history.snapshot();
        history.clear();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].answer(), "a");
    }

    #[test]
    fn now_stamps_entry() {
        let entry = ConversationEntry::now("q", "a");
        assert!(!entry.timestamp().is_empty());
        assert_eq!(entry.question(), "q");
    }
}
