//! Per-session conversation state.
//!
//! The history is append-only between resets. A session is either idle or waiting
//! on exactly one outstanding submission; a second submission is rejected until the
//! reply (or failure) for the first has been recorded.

use serde::Serialize;

use crate::core::{
    domain::{Message, Role},
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Empty,
    AwaitingReply,
}

/// Owns the message history of one interactive session.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    messages: Vec<Message>,
    candidates: Vec<String>,
    phase: Phase,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            candidates: Vec::new(),
            phase: Phase::Empty,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Uncommitted multi-sample candidates from the latest submission.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Records a user submission and moves to `AwaitingReply`.
    ///
    /// Returns the message list to send: an optional leading system message followed
    /// by the full history, including the new user turn.
    pub fn submit(
        &mut self,
        text: impl Into<String>,
        system_prompt: Option<&str>,
    ) -> Result<Vec<Message>> {
        if self.phase == Phase::AwaitingReply {
            return Err(Error::InvalidState(
                "a submission is already awaiting its reply".into(),
            ));
        }
        self.messages.push(Message::user(text));
        self.candidates.clear();
        self.phase = Phase::AwaitingReply;
        Ok(self.request_messages(system_prompt))
    }

    /// Commits a single assistant reply to history (chat mode).
    pub fn record_reply(&mut self, text: impl Into<String>) -> Result<()> {
        self.expect_awaiting()?;
        self.messages.push(Message::assistant(text));
        self.phase = Phase::Empty;
        Ok(())
    }

    /// Stores side-by-side candidates without committing any to history (multi-sample mode).
    pub fn record_candidates(&mut self, candidates: Vec<String>) -> Result<()> {
        self.expect_awaiting()?;
        self.candidates = candidates;
        self.phase = Phase::Empty;
        Ok(())
    }

    /// Commits the error text in place of the reply, so history keeps alternating
    /// between user and assistant turns.
    pub fn record_failure(&mut self, error_text: impl Into<String>) -> Result<()> {
        self.record_reply(error_text)
    }

    /// Withdraws the outstanding submission as if it had never been made.
    pub fn abandon(&mut self) -> Result<()> {
        self.expect_awaiting()?;
        // The pending user turn is always last while awaiting.
        self.messages.pop();
        self.phase = Phase::Empty;
        Ok(())
    }

    /// Clears history and candidates from any phase.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.candidates.clear();
        self.phase = Phase::Empty;
    }

    pub fn request_messages(&self, system_prompt: Option<&str>) -> Vec<Message> {
        let system = system_prompt
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .map(Message::system);
        system
            .into_iter()
            .chain(
                self.messages
                    .iter()
                    .filter(|message| message.role != Role::System)
                    .cloned(),
            )
            .collect()
    }

    fn expect_awaiting(&self) -> Result<()> {
        if self.phase == Phase::AwaitingReply {
            Ok(())
        } else {
            Err(Error::InvalidState("no submission is awaiting a reply".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_cycle_appends_user_then_assistant() {
        let mut state = ConversationState::new();
        let outgoing = state.submit("hello", Some("be brief")).unwrap();
        assert_eq!(state.phase(), Phase::AwaitingReply);
        assert_eq!(
            outgoing,
            vec![Message::system("be brief"), Message::user("hello")]
        );

        state.record_reply("hi there").unwrap();
        assert_eq!(state.phase(), Phase::Empty);
        assert_eq!(
            state.messages(),
            &[Message::user("hello"), Message::assistant("hi there")]
        );

        let outgoing = state.submit("again", None).unwrap();
        assert_eq!(outgoing.len(), 3);
        assert_eq!(outgoing[0], Message::user("hello"));
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let mut state = ConversationState::new();
        let outgoing = state.submit("q", Some("   ")).unwrap();
        assert_eq!(outgoing, vec![Message::user("q")]);
    }

    #[test]
    fn second_submission_is_rejected_while_awaiting() {
        let mut state = ConversationState::new();
        state.submit("one", None).unwrap();
        let err = state.submit("two", None).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn reply_without_submission_is_rejected() {
        let mut state = ConversationState::new();
        assert!(state.record_reply("orphan").is_err());
        assert!(state.record_candidates(vec!["a".into()]).is_err());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn candidates_are_not_committed_to_history() {
        let mut state = ConversationState::new();
        state.submit("tell a joke", None).unwrap();
        state
            .record_candidates(vec!["joke a".into(), "joke b".into()])
            .unwrap();
        assert_eq!(state.phase(), Phase::Empty);
        assert_eq!(state.messages(), &[Message::user("tell a joke")]);
        assert_eq!(state.candidates(), ["joke a", "joke b"]);

        state.submit("another", None).unwrap();
        assert!(state.candidates().is_empty());
    }

    #[test]
    fn failure_commits_error_text_as_the_reply() {
        let mut state = ConversationState::new();
        state.submit("hello", None).unwrap();
        state.record_failure("Error: 500").unwrap();
        assert_eq!(state.phase(), Phase::Empty);
        assert_eq!(
            state.messages(),
            &[Message::user("hello"), Message::assistant("Error: 500")]
        );

        let outgoing = state.submit("again", None).unwrap();
        let roles: Vec<_> = outgoing.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn abandon_withdraws_only_the_pending_turn() {
        let mut state = ConversationState::new();
        state.submit("a", None).unwrap();
        state.record_reply("b").unwrap();
        state.submit("c", None).unwrap();

        state.abandon().unwrap();
        assert_eq!(state.phase(), Phase::Empty);
        assert_eq!(
            state.messages(),
            &[Message::user("a"), Message::assistant("b")]
        );
        assert!(state.abandon().is_err());
    }

    #[test]
    fn reset_clears_from_empty() {
        let mut state = ConversationState::new();
        state.submit("a", None).unwrap();
        state.record_reply("b").unwrap();
        state.reset();
        assert!(state.messages().is_empty());
        assert_eq!(state.phase(), Phase::Empty);
    }

    #[test]
    fn reset_clears_while_awaiting_reply() {
        let mut state = ConversationState::new();
        state.submit("a", None).unwrap();
        state.reset();
        assert!(state.messages().is_empty());
        assert!(state.candidates().is_empty());
        assert_eq!(state.phase(), Phase::Empty);
        assert!(state.submit("fresh", None).is_ok());
    }
}
