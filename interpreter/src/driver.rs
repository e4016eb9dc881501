use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::capability::Capabilities;
use crate::error::ExecuteError;
use crate::executor::execute_script;
use crate::prompt::{
    AUTONOMOUS_SYSTEM_PROMPT, CONVERSATIONAL_SYSTEM_PROMPT, CodePrompt, build_prompt,
};
use crate::session::{Message, Role, SessionState};

// ---------------------------------------------------------------------------
// Model backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("the conversation no longer fits in the model's context window")]
    ContextLengthExceeded,

    #[error("model request failed: {0}")]
    Failed(String),
}

impl ModelError {
    /// Short advice shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ModelError::ContextLengthExceeded => {
                "The conversation is too long for the model. Delete some messages or clear the conversation."
            }
            ModelError::Failed(_) => "Failed to fetch a response, try again.",
        }
    }
}

/// A role-tagged message as sent to the model backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Text-in/text-out completion backend.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ModelError>;
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    /// Autonomous sessions use the command prompt and keep calling the model
    /// while commands leave follow-up content.
    pub autonomous: bool,
    /// Cap on automatic follow-up turns per submission. `None` = unbounded.
    pub max_auto_turns: Option<usize>,
    /// Replaces the built-in system prompt.
    pub system_prompt: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            model: "gpt-4".to_string(),
            autonomous: true,
            max_auto_turns: None,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingModelReply,
    ApplyingCommands,
}

/// How a submission ended. Each variant carries every model reply the
/// submission received, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The last reply left nothing to follow up on.
    Completed { replies: Vec<String> },
    /// Follow-up content is pending but the session stopped: it is not
    /// autonomous or the automatic turn limit was reached.
    Pending { replies: Vec<String> },
    /// A reply's script failed; the error text was merged into the pending
    /// request and the loop stopped.
    Halted { replies: Vec<String>, error: String },
}

impl TurnOutcome {
    pub fn replies(&self) -> &[String] {
        match self {
            TurnOutcome::Completed { replies }
            | TurnOutcome::Pending { replies }
            | TurnOutcome::Halted { replies, .. } => replies,
        }
    }

    pub fn model_calls(&self) -> usize {
        self.replies().len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a conversation turn is already in progress")]
    Busy,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("unrecoverable command failure: {0}")]
    Interpreter(#[source] ExecuteError),
}

/// One conversation: owns the session state and drives model round-trips.
pub struct Session {
    state: SessionState,
    caps: Capabilities,
    backend: Arc<dyn ModelBackend>,
    config: SessionConfig,
    phase: Phase,
}

impl Session {
    pub fn new(backend: Arc<dyn ModelBackend>, caps: Capabilities, config: SessionConfig) -> Self {
        Session {
            state: SessionState::new(),
            caps,
            backend,
            config,
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Attach a context snippet to the next request.
    pub fn attach(&mut self, snippet: CodePrompt) {
        self.state.code_prompts.push(snippet);
        self.caps.presenter.snippets_updated(&self.state.code_prompts);
    }

    pub fn remove_snippet(&mut self, index: usize) -> Option<CodePrompt> {
        if index >= self.state.code_prompts.len() {
            return None;
        }
        let removed = self.state.code_prompts.remove(index);
        self.caps.presenter.snippets_updated(&self.state.code_prompts);
        Some(removed)
    }

    pub fn delete_message(&mut self, index: usize) -> Option<Message> {
        if index < self.state.conversation_history.len() {
            Some(self.state.conversation_history.remove(index))
        } else {
            None
        }
    }

    pub fn clear_conversation(&mut self) {
        self.state.conversation_history.clear();
    }

    /// Send `text` (after any pending request text) to the model and apply
    /// the reply. In autonomous mode this keeps going while commands queue
    /// follow-up content.
    pub async fn submit(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        let mut request = std::mem::take(&mut self.state.current_user_request);
        if !request.is_empty() && !text.is_empty() && !request.ends_with('\n') {
            request.push('\n');
        }
        request.push_str(text);

        let mut replies = Vec::new();
        loop {
            let reply = match self.request_reply(request).await {
                Ok(reply) => reply,
                Err(error) => {
                    self.phase = Phase::Idle;
                    return Err(error.into());
                }
            };

            self.phase = Phase::ApplyingCommands;
            let applied = self.apply_reply(&reply).await;
            self.phase = Phase::Idle;
            replies.push(reply);

            if let Some(error) = applied? {
                self.state.append_request(&format!("error: {}", error));
                self.caps.presenter.request_updated(&self.state.current_user_request);
                self.caps
                    .presenter
                    .notify_error("A command failed; the error was added to your request.");
                return Ok(TurnOutcome::Halted { replies, error });
            }

            if !self.state.has_pending() {
                return Ok(TurnOutcome::Completed { replies });
            }
            let limit_reached = self
                .config
                .max_auto_turns
                .is_some_and(|max| replies.len() > max);
            if !self.config.autonomous || limit_reached {
                return Ok(TurnOutcome::Pending { replies });
            }

            tracing::debug!(model_calls = replies.len(), "continuing with pending content");
            request = std::mem::take(&mut self.state.current_user_request);
        }
    }

    /// Push the user turn and call the model. On failure the user turn is
    /// retracted and the request text is restored as pending.
    async fn request_reply(&mut self, request: String) -> Result<String, ModelError> {
        self.phase = Phase::AwaitingModelReply;
        let snippets = self.state.code_prompts.clone();
        self.state
            .conversation_history
            .push(Message::user(snippets, request.clone()));

        let messages = self.model_messages();
        tracing::info!(model = %self.config.model, messages = messages.len(), "requesting model reply");

        match self.backend.complete(&self.config.model, &messages).await {
            Ok(reply) => {
                self.state.conversation_history.push(Message::assistant(reply.clone()));
                self.state.code_prompts.clear();
                self.caps.presenter.snippets_updated(&self.state.code_prompts);
                self.caps.presenter.request_updated("");
                Ok(reply)
            }
            Err(error) => {
                tracing::warn!(%error, "model request failed");
                self.state.conversation_history.pop();
                self.state.current_user_request = request;
                self.caps.presenter.notify_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Parse and execute a reply. Returns the error text of a recoverable
    /// failure.
    async fn apply_reply(&mut self, reply: &str) -> Result<Option<String>, SessionError> {
        let script = match script::parse(reply) {
            Ok(script) => script,
            Err(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                return Ok(Some(messages.join("\n")));
            }
        };
        for warning in &script.warnings {
            tracing::warn!(%warning, "command script warning");
        }

        let state = std::mem::take(&mut self.state);
        match execute_script(&script.commands, state, &self.caps).await {
            Ok(state) => {
                self.state = state;
                Ok(None)
            }
            Err(aborted) => {
                self.state = aborted.state;
                if aborted.error.is_recoverable() {
                    Ok(Some(aborted.error.to_string()))
                } else {
                    Err(SessionError::Interpreter(aborted.error))
                }
            }
        }
    }

    /// System prompt followed by the rendered history.
    pub fn model_messages(&self) -> Vec<ChatMessage> {
        let system = match (&self.config.system_prompt, self.config.autonomous) {
            (Some(prompt), _) => prompt.clone(),
            (None, true) => AUTONOMOUS_SYSTEM_PROMPT.to_string(),
            (None, false) => CONVERSATIONAL_SYSTEM_PROMPT.to_string(),
        };
        let mut messages = vec![ChatMessage {
            role: Role::System,
            content: system,
        }];
        messages.extend(self.state.conversation_history.iter().map(|m| ChatMessage {
            role: m.role,
            content: match m.role {
                Role::User => build_prompt(&m.code_prompts, &m.text),
                Role::System | Role::Assistant => m.text.clone(),
            },
        }));
        messages
    }
}

/// A session shared between tasks. Submissions made while a turn is in
/// flight are rejected, not queued.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        SharedSession {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, SessionError> {
        let mut session = self.inner.try_lock().map_err(|_| SessionError::Busy)?;
        session.submit(text).await
    }

    /// Wait for any in-flight turn and borrow the session.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }
}
