use std::fmt;

use serde::Serialize;

use crate::capability::EditableDocument;
use crate::prompt::CodePrompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    /// Snippets that were attached when a user message was sent.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub code_prompts: Vec<CodePrompt>,
    pub text: String,
}

impl Message {
    pub fn user(code_prompts: Vec<CodePrompt>, text: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            code_prompts,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            code_prompts: Vec::new(),
            text: text.into(),
        }
    }
}

/// Mutable context threaded through one interpreter pass and kept across
/// model round-trips.
#[derive(Default)]
pub struct SessionState {
    /// Context snippets attached to the next model call.
    pub code_prompts: Vec<CodePrompt>,
    /// Pending request text; commands append "response to @X" blocks here.
    pub current_user_request: String,
    /// The active document. Commands that show a document replace it.
    pub editor: Option<Box<dyn EditableDocument>>,
    /// Scratch memory the model keeps across turns.
    pub memory: String,
    pub conversation_history: Vec<Message>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a command queued content for another model turn.
    pub fn has_pending(&self) -> bool {
        !self.current_user_request.trim().is_empty() || !self.code_prompts.is_empty()
    }

    pub fn active_path(&self) -> Option<&str> {
        self.editor.as_deref().map(|doc| doc.path())
    }

    /// Append text to the pending request, separated by a newline.
    pub fn append_request(&mut self, text: &str) {
        if !self.current_user_request.is_empty() && !self.current_user_request.ends_with('\n') {
            self.current_user_request.push('\n');
        }
        self.current_user_request.push_str(text);
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("code_prompts", &self.code_prompts)
            .field("current_user_request", &self.current_user_request)
            .field("editor", &self.active_path())
            .field("memory", &self.memory)
            .field("conversation_history", &self.conversation_history)
            .finish()
    }
}
