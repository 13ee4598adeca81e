use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::form::{FormFields, PromptAssembler, PromptMode};
use crate::transcript::Transcript;

/// Per-session state: the transcript, the prompt assembler, and the
/// currently selected model label.
///
/// Sessions are explicit objects keyed by an identifier and injected into
/// the conversation engine; nothing reads them from ambient globals.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    pub transcript: Transcript,
    pub prompt: PromptAssembler,
    pub model_label: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(mode: PromptMode, model_label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            transcript: Transcript::new(),
            prompt: PromptAssembler::new(mode),
            model_label: model_label.into(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[allow(dead_code)]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[allow(dead_code)]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// The reset action: clears the transcript in full. Form field contents
    /// are left exactly as typed (matches the original app's behavior).
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.touch();
    }

    /// The initialize action: snapshot the instruction block from the given
    /// field values. No effect on the transcript.
    pub fn initialize(&mut self, fields: &FormFields) {
        self.prompt.initialize(fields);
        self.touch();
    }
}

/// Sessions keyed by identifier. The TUI drives a single session, but the
/// engine is written against this store so nothing assumes a singleton.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, SessionContext>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session and return its identifier.
    pub fn create(&mut self, mode: PromptMode, model_label: impl Into<String>) -> String {
        let session = SessionContext::new(mode, model_label);
        let id = session.session_id().to_string();
        self.sessions.insert(id.clone(), session);
        id
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionContext> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut SessionContext> {
        self.sessions.get_mut(session_id)
    }

    pub fn remove(&mut self, session_id: &str) -> Option<SessionContext> {
        self.sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Message;

    #[test]
    fn reset_clears_transcript_only() {
        let mut session = SessionContext::new(PromptMode::Snapshot, "OpenAI 4o-mini");
        session.initialize(&FormFields::default());
        for i in 0..5 {
            session.transcript.append(Message::user(format!("msg {i}")));
        }
        assert_eq!(session.transcript.len(), 5);

        session.reset();
        assert!(session.transcript.is_empty());
        // The prompt snapshot survives; reset touches nothing else.
        assert_eq!(
            session.prompt.current(&FormFields::empty()),
            FormFields::default().instruction_block()
        );
    }

    #[test]
    fn initialize_snapshots_without_touching_transcript() {
        let mut session = SessionContext::new(PromptMode::Snapshot, "OpenAI 4o-mini");
        session.transcript.append(Message::user("hello"));

        let fields = FormFields::default();
        session.initialize(&fields);

        assert_eq!(session.transcript.len(), 1);
        assert_eq!(
            session.prompt.current(&FormFields::empty()),
            fields.instruction_block()
        );
    }

    #[test]
    fn store_keys_sessions_by_id() {
        let mut store = SessionStore::new();
        let a = store.create(PromptMode::Live, "OpenAI 4o-mini");
        let b = store.create(PromptMode::Snapshot, "Claude Haiku 3.5");

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&b).unwrap().model_label, "Claude Haiku 3.5");

        store.remove(&a);
        assert!(store.get(&a).is_none());
    }
}
