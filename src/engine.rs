use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::form::FormFields;
use crate::llm::{CompletionRequest, LlmClient, LlmEvent, WireMessage};
use crate::models;
use crate::session::SessionContext;
use crate::transcript::{Message, Transcript};

const MAX_TOKENS: u32 = 4000;

/// Outcome of draining a turn stream.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Stream ran to completion; holds the full accumulated text.
    Completed(String),
    /// Provider failed mid-turn; `partial` is whatever had arrived.
    Failed { partial: String, error: String },
}

/// Pull-based fragment sequence for a single turn.
///
/// Finite and non-restartable: drain it with `next_fragment` until it
/// returns `None`, then pass `finish()` to `ConversationEngine::complete_turn`
/// to commit the assistant message. Moving the stream into `finish` is what
/// makes the commit happen at most once.
pub struct TurnStream {
    rx: mpsc::Receiver<LlmEvent>,
    accumulated: String,
    outcome: Option<TurnOutcome>,
}

impl TurnStream {
    pub(crate) fn new(rx: mpsc::Receiver<LlmEvent>) -> Self {
        Self {
            rx,
            accumulated: String::new(),
            outcome: None,
        }
    }

    /// Next text fragment, or `None` once the stream has ended (normally or
    /// with an error).
    pub async fn next_fragment(&mut self) -> Option<String> {
        if self.outcome.is_some() {
            return None;
        }

        while let Some(event) = self.rx.recv().await {
            match event {
                LlmEvent::TextDelta(delta) => {
                    self.accumulated.push_str(&delta);
                    return Some(delta);
                }
                LlmEvent::StreamComplete => {
                    self.outcome = Some(TurnOutcome::Completed(self.accumulated.clone()));
                    return None;
                }
                LlmEvent::Error(error) => {
                    self.outcome = Some(TurnOutcome::Failed {
                        partial: self.accumulated.clone(),
                        error,
                    });
                    return None;
                }
            }
        }

        // Sender dropped without a terminal event; whatever accumulated is
        // the final text.
        self.outcome = Some(TurnOutcome::Completed(self.accumulated.clone()));
        None
    }

    /// Text received so far, for partial display.
    #[allow(dead_code)]
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Consume the drained stream. Call after `next_fragment` returns `None`.
    pub fn finish(mut self) -> TurnOutcome {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => TurnOutcome::Failed {
                partial: self.accumulated,
                error: "stream dropped before completion".to_string(),
            },
        }
    }
}

/// Mediates between the session transcript, the form, and the remote
/// completion provider.
#[derive(Clone)]
pub struct ConversationEngine {
    llm: LlmClient,
}

impl ConversationEngine {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Append the user turn to the session transcript and start the
    /// streaming completion for it.
    ///
    /// The outbound request is the instruction block as a leading
    /// system-role message followed by the full transcript, the new user
    /// turn included. Callers must not submit while a prior turn's stream
    /// is still live.
    pub async fn submit_user_turn(
        &self,
        session: &mut SessionContext,
        fields: &FormFields,
        text: String,
    ) -> Result<TurnStream> {
        debug_assert!(!text.trim().is_empty(), "composer suppresses empty submits");

        session.transcript.append(Message::user(text));
        session.touch();

        let spec = models::resolve(&session.model_label)?;
        let messages = build_wire_messages(&session.prompt.current(fields), &session.transcript);

        debug!(
            session = session.session_id(),
            model = spec.model,
            transcript_len = session.transcript.len(),
            "submitting user turn"
        );

        let rx = self
            .llm
            .stream_completion(CompletionRequest {
                spec,
                messages,
                max_tokens: MAX_TOKENS,
            })
            .await?;

        Ok(TurnStream::new(rx))
    }

    /// Commit a drained turn. On success the accumulated text becomes the
    /// assistant message, appended exactly once. A failed turn appends
    /// nothing; partial text already shown is discarded from the transcript
    /// and the session stays usable.
    pub fn complete_turn(&self, session: &mut SessionContext, outcome: TurnOutcome) -> Result<()> {
        match outcome {
            TurnOutcome::Completed(content) => {
                session.transcript.append(Message::assistant(content));
                session.touch();
                Ok(())
            }
            TurnOutcome::Failed { partial, error } => {
                warn!(
                    session = session.session_id(),
                    partial_len = partial.len(),
                    "turn failed"
                );
                bail!("turn failed: {error}")
            }
        }
    }
}

/// Leading system-role instruction block, then the transcript in order.
fn build_wire_messages(instruction_block: &str, transcript: &Transcript) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(WireMessage {
        role: "system".to_string(),
        content: instruction_block.to_string(),
    });
    for message in transcript.messages() {
        messages.push(WireMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        });
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::form::PromptMode;
    use crate::transcript::Role;

    fn engine() -> ConversationEngine {
        ConversationEngine::new(LlmClient::new(Config::default()).unwrap())
    }

    fn session() -> SessionContext {
        SessionContext::new(PromptMode::Live, "OpenAI 4o-mini")
    }

    /// Drive a TurnStream from a hand-fed event channel.
    fn stream_of(events: Vec<LlmEvent>) -> TurnStream {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        TurnStream::new(rx)
    }

    #[tokio::test]
    async fn fragments_accumulate_and_commit_once() {
        let mut turn = stream_of(vec![
            LlmEvent::TextDelta("Hel".to_string()),
            LlmEvent::TextDelta("lo".to_string()),
            LlmEvent::TextDelta(" world".to_string()),
            LlmEvent::StreamComplete,
        ]);

        let mut seen = Vec::new();
        while let Some(fragment) = turn.next_fragment().await {
            seen.push(fragment);
        }
        assert_eq!(seen, vec!["Hel", "lo", " world"]);
        assert_eq!(turn.accumulated(), "Hello world");

        let engine = engine();
        let mut session = session();
        session.transcript.append(Message::user("hi"));
        engine.complete_turn(&mut session, turn.finish()).unwrap();

        assert_eq!(session.transcript.len(), 2);
        let last = session.transcript.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hello world");
    }

    #[tokio::test]
    async fn failure_mid_stream_appends_no_assistant_entry() {
        let mut turn = stream_of(vec![
            LlmEvent::TextDelta("Hel".to_string()),
            LlmEvent::Error("rate limited".to_string()),
        ]);

        assert_eq!(turn.next_fragment().await.as_deref(), Some("Hel"));
        assert!(turn.next_fragment().await.is_none());

        let engine = engine();
        let mut session = session();
        session.transcript.append(Message::user("hi"));

        let err = engine
            .complete_turn(&mut session, turn.finish())
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));

        // No assistant entry for the failed turn; session stays usable.
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript.last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn sender_drop_without_terminal_event_completes() {
        let (tx, rx) = mpsc::channel(16);
        tx.send(LlmEvent::TextDelta("partial".to_string()))
            .await
            .unwrap();
        drop(tx);

        let mut turn = TurnStream::new(rx);
        assert_eq!(turn.next_fragment().await.as_deref(), Some("partial"));
        assert!(turn.next_fragment().await.is_none());
        match turn.finish() {
            TurnOutcome::Completed(text) => assert_eq!(text, "partial"),
            TurnOutcome::Failed { .. } => panic!("expected completion"),
        }
    }

    #[tokio::test]
    async fn transcript_alternates_over_successful_turns() {
        let engine = engine();
        let mut session = session();

        for i in 0..4 {
            session.transcript.append(Message::user(format!("q{i}")));
            let mut turn = stream_of(vec![
                LlmEvent::TextDelta(format!("a{i}")),
                LlmEvent::StreamComplete,
            ]);
            while turn.next_fragment().await.is_some() {}
            engine.complete_turn(&mut session, turn.finish()).unwrap();
        }

        // 2N messages, strictly alternating starting with the user.
        assert_eq!(session.transcript.len(), 8);
        for (i, message) in session.transcript.messages().iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected);
        }
    }

    #[test]
    fn wire_messages_lead_with_instruction_block() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("question"));
        transcript.append(Message::assistant("answer"));
        transcript.append(Message::user("follow-up"));

        let messages = build_wire_messages("data\nsystem\npersona\nhistory", &transcript);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "data\nsystem\npersona\nhistory");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[3].content, "follow-up");
    }
}
