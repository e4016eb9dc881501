use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::buffer::{OutOfBounds, TextBuffer};
use crate::capability::{CapabilityResult, EditableDocument, Position, TextRange};
use crate::error::CapabilityError;

pub type SharedBuffer = Arc<Mutex<TextBuffer>>;

/// Reload `buffer` when `file` was changed behind its back, returning the
/// text on disk. Buffers are written through on every edit, so a mismatch
/// always means an outside change.
pub(crate) async fn sync_from_disk(file: &Path, buffer: &SharedBuffer) -> io::Result<String> {
    let on_disk = tokio::fs::read_to_string(file).await?;
    let mut buffer = buffer.lock();
    if buffer.text() != on_disk {
        tracing::debug!(file = %file.display(), "file changed on disk; reloading");
        buffer.reload(&on_disk);
    }
    Ok(on_disk)
}

/// A handle to an open file. Every handle for the same path shares one
/// buffer; each handle keeps its own selection.
pub struct LocalDocument {
    path: String,
    file: PathBuf,
    buffer: SharedBuffer,
    selection: TextRange,
}

impl LocalDocument {
    pub(crate) fn new(path: &str, file: PathBuf, buffer: SharedBuffer) -> Self {
        LocalDocument {
            path: path.to_string(),
            file,
            buffer,
            selection: TextRange::default(),
        }
    }

    fn out_of_range(&self, OutOfBounds(at): OutOfBounds) -> CapabilityError {
        CapabilityError::OutOfRange {
            path: self.path.clone(),
            line: at.line,
            column: at.column,
            line_count: self.line_count(),
        }
    }

    /// Pick up outside changes before editing. A file removed on disk is
    /// recreated from the buffer by the next save.
    async fn refresh(&self) -> CapabilityResult<()> {
        match sync_from_disk(&self.file, &self.buffer).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(CapabilityError::from_io(&self.path, e))
            }
            _ => Ok(()),
        }
    }

    /// Write the buffer back to disk.
    async fn save(&self) -> CapabilityResult<()> {
        let text = self.buffer.lock().text();
        tokio::fs::write(&self.file, text)
            .await
            .map_err(|e| CapabilityError::from_io(&self.path, e))
    }
}

#[async_trait]
impl EditableDocument for LocalDocument {
    fn path(&self) -> &str {
        &self.path
    }

    fn selection(&self) -> TextRange {
        self.selection
    }

    fn set_selection(&mut self, range: TextRange) {
        self.selection = range;
    }

    fn line_count(&self) -> usize {
        self.buffer.lock().line_count()
    }

    fn line_text(&self, line: usize) -> CapabilityResult<String> {
        let text = self.buffer.lock().line(line).map(str::to_string);
        text.ok_or_else(|| self.out_of_range(OutOfBounds(Position::new(line, 0))))
    }

    fn text_in(&self, range: TextRange) -> CapabilityResult<String> {
        let text = self.buffer.lock().text_in(range);
        text.map_err(|e| self.out_of_range(e))
    }

    async fn insert(&mut self, at: Position, text: &str) -> CapabilityResult<()> {
        self.replace(TextRange::caret(at), text).await
    }

    async fn replace(&mut self, range: TextRange, text: &str) -> CapabilityResult<()> {
        self.refresh().await?;
        let edited = self.buffer.lock().replace(range, text);
        edited.map_err(|e| self.out_of_range(e))?;
        self.save().await
    }

    async fn delete(&mut self, range: TextRange) -> CapabilityResult<()> {
        self.replace(range, "").await
    }

    async fn undo(&mut self) -> CapabilityResult<()> {
        self.refresh().await?;
        let undone = self.buffer.lock().undo();
        if !undone {
            tracing::debug!(path = %self.path, "nothing to undo");
            return Ok(());
        }
        self.save().await
    }

    async fn redo(&mut self) -> CapabilityResult<()> {
        self.refresh().await?;
        let redone = self.buffer.lock().redo();
        if !redone {
            tracing::debug!(path = %self.path, "nothing to redo");
            return Ok(());
        }
        self.save().await
    }
}
