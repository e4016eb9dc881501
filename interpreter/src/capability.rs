use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CapabilityError;
use crate::prompt::CodePrompt;

pub type CapabilityResult<T> = Result<T, CapabilityError>;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Zero-based line and column (in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        TextRange { start, end }
    }

    pub fn from_coords(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        TextRange {
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    /// An empty range (a cursor) at `at`.
    pub fn caret(at: Position) -> Self {
        TextRange { start: at, end: at }
    }

    /// The same range with start and end ordered.
    pub fn normalized(self) -> Self {
        if self.end < self.start {
            TextRange {
                start: self.end,
                end: self.start,
            }
        } else {
            self
        }
    }
}

// ---------------------------------------------------------------------------
// Capability data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    SymbolicLink,
    Unknown,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::File => "File",
            FileKind::Directory => "Directory",
            FileKind::SymbolicLink => "SymbolicLink",
            FileKind::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// One regex match found by a workspace search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorDiagnostic {
    pub message: String,
    pub severity: Severity,
    pub range: TextRange,
}

/// Captured result of a shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Workspace-relative file access.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read_file(&self, path: &str) -> CapabilityResult<String>;

    /// Create or overwrite a file.
    async fn write_file(&self, path: &str, contents: &str) -> CapabilityResult<()>;

    async fn list_dir(&self, path: &str) -> CapabilityResult<Vec<DirEntry>>;

    /// Workspace-wide, case-insensitive regex search.
    async fn search(&self, pattern: &str) -> CapabilityResult<Vec<SearchHit>>;
}

/// Opens documents for editing. The returned handle becomes the session's
/// active document when a command shows it.
#[async_trait]
pub trait Editor: Send + Sync {
    async fn open(&self, path: &str) -> CapabilityResult<Box<dyn EditableDocument>>;
}

/// An open text document with a selection and an edit history.
#[async_trait]
pub trait EditableDocument: Send + Sync {
    fn path(&self) -> &str;

    fn selection(&self) -> TextRange;

    fn set_selection(&mut self, range: TextRange);

    fn line_count(&self) -> usize;

    fn line_text(&self, line: usize) -> CapabilityResult<String>;

    fn text_in(&self, range: TextRange) -> CapabilityResult<String>;

    async fn insert(&mut self, at: Position, text: &str) -> CapabilityResult<()>;

    async fn replace(&mut self, range: TextRange, text: &str) -> CapabilityResult<()>;

    async fn delete(&mut self, range: TextRange) -> CapabilityResult<()>;

    async fn undo(&mut self) -> CapabilityResult<()>;

    async fn redo(&mut self) -> CapabilityResult<()>;
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn read_text(&self) -> CapabilityResult<String>;

    async fn write_text(&self, text: &str) -> CapabilityResult<()>;
}

/// Runs shell commands in the workspace root. No timeout is applied.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &str) -> CapabilityResult<ProcessOutput>;
}

#[async_trait]
pub trait DiagnosticsSource: Send + Sync {
    async fn diagnostics(&self, path: &str) -> CapabilityResult<Vec<EditorDiagnostic>>;
}

/// Asks the user before a terminal command runs.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, command: &str) -> bool;
}

/// Receives live progress while a batch runs.
pub trait Presenter: Send + Sync {
    /// The accumulated request text changed.
    fn request_updated(&self, request: &str);

    /// The attached context snippets changed.
    fn snippets_updated(&self, snippets: &[CodePrompt]);

    /// A non-fatal failure the user should know about.
    fn notify_error(&self, message: &str);
}

/// A presenter that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPresenter;

impl Presenter for SilentPresenter {
    fn request_updated(&self, _request: &str) {}

    fn snippets_updated(&self, _snippets: &[CodePrompt]) {}

    fn notify_error(&self, _message: &str) {}
}

/// The full capability surface handed to the interpreter.
#[derive(Clone)]
pub struct Capabilities {
    pub files: Arc<dyn FileStore>,
    pub editor: Arc<dyn Editor>,
    pub clipboard: Arc<dyn Clipboard>,
    pub processes: Arc<dyn ProcessRunner>,
    pub diagnostics: Arc<dyn DiagnosticsSource>,
    pub presenter: Arc<dyn Presenter>,
    /// When set, `@runInTerminal` asks before running anything.
    pub confirmer: Option<Arc<dyn Confirmer>>,
}

impl Capabilities {
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }
}
