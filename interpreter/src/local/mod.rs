//! A workspace backed by a directory on disk.
//!
//! Documents are held in memory once opened and written back after every
//! edit, so other tools see the changes immediately. A buffer is reloaded
//! whenever the file on disk no longer matches it.

mod buffer;
mod document;
mod services;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::RegexBuilder;

use crate::capability::{
    Capabilities, CapabilityResult, DirEntry, EditableDocument, Editor, FileKind, FileStore,
    SearchHit, SilentPresenter,
};
use crate::error::CapabilityError;

pub use buffer::{OutOfBounds, TextBuffer};
use document::sync_from_disk;
pub use document::{LocalDocument, SharedBuffer};
pub use services::{MemoryClipboard, NoDiagnostics, ShellRunner};

/// Search stops after this many matches.
const MAX_SEARCH_HITS: usize = 500;

pub struct LocalWorkspace {
    root: PathBuf,
    buffers: Mutex<HashMap<PathBuf, SharedBuffer>>,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalWorkspace {
            root: root.into(),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path. Absolute paths and `..` are
    /// rejected so nothing outside the root is reachable.
    pub fn resolve(&self, path: &str) -> CapabilityResult<PathBuf> {
        let mut file = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => file.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(CapabilityError::InvalidInput(format!(
                        "path '{}' leaves the workspace",
                        path
                    )));
                }
            }
        }
        Ok(file)
    }

    /// Every capability served from this workspace: disk files, shared
    /// buffers, an in-memory clipboard, `sh` in the root, no diagnostics.
    pub fn capabilities(self) -> Capabilities {
        let processes = Arc::new(ShellRunner::new(self.root.clone()));
        let workspace = Arc::new(self);
        Capabilities {
            files: workspace.clone(),
            editor: workspace,
            clipboard: Arc::new(MemoryClipboard::default()),
            processes,
            diagnostics: Arc::new(NoDiagnostics),
            presenter: Arc::new(SilentPresenter),
            confirmer: None,
        }
    }

    fn cached_buffer(&self, file: &Path) -> Option<SharedBuffer> {
        self.buffers.lock().get(file).cloned()
    }
}

#[async_trait]
impl FileStore for LocalWorkspace {
    async fn read_file(&self, path: &str) -> CapabilityResult<String> {
        let file = self.resolve(path)?;
        let text = match self.cached_buffer(&file) {
            Some(buffer) => sync_from_disk(&file, &buffer).await,
            None => tokio::fs::read_to_string(&file).await,
        };
        text.map_err(|e| CapabilityError::from_io(path, e))
    }

    async fn write_file(&self, path: &str, contents: &str) -> CapabilityResult<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CapabilityError::from_io(path, e))?;
        }
        tokio::fs::write(&file, contents)
            .await
            .map_err(|e| CapabilityError::from_io(path, e))?;

        if let Some(buffer) = self.cached_buffer(&file) {
            buffer.lock().reload(contents);
        }
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> CapabilityResult<Vec<DirEntry>> {
        let mut dir = tokio::fs::read_dir(self.resolve(path)?)
            .await
            .map_err(|e| CapabilityError::from_io(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| CapabilityError::from_io(path, e))?
        {
            let kind = match entry.file_type().await {
                Ok(t) if t.is_symlink() => FileKind::SymbolicLink,
                Ok(t) if t.is_dir() => FileKind::Directory,
                Ok(t) if t.is_file() => FileKind::File,
                _ => FileKind::Unknown,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn search(&self, pattern: &str) -> CapabilityResult<Vec<SearchHit>> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CapabilityError::InvalidInput(format!("bad search pattern: {}", e)))?;
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || search_tree(&root, &regex))
            .await
            .map_err(|e| CapabilityError::Internal(format!("search task failed: {}", e)))
    }
}

/// Walk `root` honouring ignore files and collect regex matches.
fn search_tree(root: &Path, regex: &regex::Regex) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for entry in ignore::WalkBuilder::new(root).build().flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        // Binary and non-UTF-8 files are skipped.
        let Ok(text) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let file = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        for (line, content) in text.split('\n').enumerate() {
            for found in regex.find_iter(content) {
                hits.push(SearchHit {
                    file: file.clone(),
                    line,
                    column: content[..found.start()].chars().count(),
                    length: found.as_str().chars().count(),
                });
                if hits.len() >= MAX_SEARCH_HITS {
                    return hits;
                }
            }
        }
    }
    hits
}

#[async_trait]
impl Editor for LocalWorkspace {
    async fn open(&self, path: &str) -> CapabilityResult<Box<dyn EditableDocument>> {
        let file = self.resolve(path)?;
        let buffer = match self.cached_buffer(&file) {
            Some(buffer) => {
                sync_from_disk(&file, &buffer)
                    .await
                    .map_err(|e| CapabilityError::from_io(path, e))?;
                buffer
            }
            None => {
                let text = tokio::fs::read_to_string(&file)
                    .await
                    .map_err(|e| CapabilityError::from_io(path, e))?;
                let mut buffers = self.buffers.lock();
                buffers
                    .entry(file.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(TextBuffer::new(&text))))
                    .clone()
            }
        };
        Ok(Box::new(LocalDocument::new(path, file, buffer)))
    }
}
