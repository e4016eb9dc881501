#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

use interpreter::capability::{
    CapabilityResult, Confirmer, DiagnosticsSource, EditableDocument, Editor, EditorDiagnostic,
    ProcessOutput, ProcessRunner,
};
use interpreter::prompt::CodePrompt;
use interpreter::{
    BatchAborted, Capabilities, CapabilityError, ChatMessage, LocalWorkspace, ModelBackend,
    ModelError, Presenter, SessionState,
};

/// A temporary workspace seeded with `files`.
pub fn workspace(files: &[(&str, &str)]) -> (TempDir, Capabilities) {
    let dir = tempfile::Builder::new()
        .prefix("pilot")
        .tempdir()
        .expect("tempdir");
    for (path, contents) in files {
        let file = dir.path().join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(file, contents).expect("seed file");
    }
    let caps = LocalWorkspace::new(dir.path()).capabilities();
    (dir, caps)
}

pub fn read(dir: &TempDir, path: &str) -> String {
    std::fs::read_to_string(dir.path().join(path)).expect("read file")
}

pub fn exists(dir: &Path, path: &str) -> bool {
    dir.join(path).exists()
}

/// Wrap command lines in a script.
pub fn batch(lines: &str) -> String {
    format!("prose before\n@startCommand\n{}\n@endCommand\nprose after", lines)
}

pub async fn run(
    reply: &str,
    state: SessionState,
    caps: &Capabilities,
) -> Result<SessionState, BatchAborted> {
    let script = script::parse(reply).expect("reply should parse");
    interpreter::execute_script(&script.commands, state, caps).await
}

/// Run a reply that must not abort.
pub async fn run_ok(reply: &str, caps: &Capabilities) -> SessionState {
    run(reply, SessionState::new(), caps)
        .await
        .unwrap_or_else(|aborted| panic!("batch aborted: {}", aborted))
}

pub fn response(command: &str, payload: &str) -> String {
    format!("response to @{}:\n```\n{}\n```", command, payload)
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingPresenter {
    pub requests: Mutex<Vec<String>>,
    pub snippets: Mutex<Vec<Vec<CodePrompt>>>,
    pub errors: Mutex<Vec<String>>,
}

impl Presenter for RecordingPresenter {
    fn request_updated(&self, request: &str) {
        self.requests.lock().push(request.to_string());
    }

    fn snippets_updated(&self, snippets: &[CodePrompt]) {
        self.snippets.lock().push(snippets.to_vec());
    }

    fn notify_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

pub struct FakeRunner {
    pub output: ProcessOutput,
    pub commands: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new(success: bool, stdout: &str, stderr: &str) -> Self {
        FakeRunner {
            output: ProcessOutput {
                success,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
            commands: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, command: &str) -> CapabilityResult<ProcessOutput> {
        self.commands.lock().push(command.to_string());
        Ok(self.output.clone())
    }
}

pub struct Decline;

#[async_trait]
impl Confirmer for Decline {
    async fn confirm(&self, _command: &str) -> bool {
        false
    }
}

pub struct FixedDiagnostics(pub Vec<EditorDiagnostic>);

#[async_trait]
impl DiagnosticsSource for FixedDiagnostics {
    async fn diagnostics(&self, _path: &str) -> CapabilityResult<Vec<EditorDiagnostic>> {
        Ok(self.0.clone())
    }
}

/// An editor whose every open fails with an internal error.
pub struct BrokenEditor;

#[async_trait]
impl Editor for BrokenEditor {
    async fn open(&self, _path: &str) -> CapabilityResult<Box<dyn EditableDocument>> {
        Err(CapabilityError::Internal("editor crashed".to_string()))
    }
}

/// Replies from a queue and records every request.
#[derive(Default)]
pub struct ScriptedBackend {
    pub replies: Mutex<VecDeque<Result<String, ModelError>>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(ScriptedBackend {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Content of the last message of call `index`.
    pub fn last_message(&self, index: usize) -> String {
        let calls = self.calls.lock();
        calls[index].last().expect("empty call").content.clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, _model: &str, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.calls.lock().push(messages.to_vec());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Failed("no scripted reply left".to_string())))
    }
}

/// Blocks inside `complete` until released.
#[derive(Default)]
pub struct GatedBackend {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl ModelBackend for GatedBackend {
    async fn complete(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("done".to_string())
    }
}
