use crate::capability::{Position, TextRange};

/// A position that does not exist in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds(pub Position);

/// Line-based text with snapshot undo/redo.
///
/// Columns count characters. A column past the end of its line is clamped to
/// the line end; a line past the last line is out of bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
    undo: Vec<Vec<String>>,
    redo: Vec<Vec<String>>,
}

impl TextBuffer {
    pub fn new(text: &str) -> Self {
        TextBuffer {
            lines: split_lines(text),
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }

    /// Replace the whole text and forget the edit history.
    pub fn reload(&mut self, text: &str) {
        self.lines = split_lines(text);
        self.undo.clear();
        self.redo.clear();
    }

    pub fn text_in(&self, range: TextRange) -> Result<String, OutOfBounds> {
        let range = range.normalized();
        let start = self.byte_offset(range.start)?;
        let end = self.byte_offset(range.end)?;

        if range.start.line == range.end.line {
            let line = &self.lines[range.start.line];
            return Ok(line[start..end.max(start)].to_string());
        }
        let mut out = self.lines[range.start.line][start..].to_string();
        for line in &self.lines[range.start.line + 1..range.end.line] {
            out.push('\n');
            out.push_str(line);
        }
        out.push('\n');
        out.push_str(&self.lines[range.end.line][..end]);
        Ok(out)
    }

    pub fn replace(&mut self, range: TextRange, text: &str) -> Result<(), OutOfBounds> {
        let range = range.normalized();
        let start = self.byte_offset(range.start)?;
        let end = self.byte_offset(range.end)?;
        let end = if range.start.line == range.end.line {
            end.max(start)
        } else {
            end
        };

        let mut joined = self.lines[range.start.line][..start].to_string();
        joined.push_str(text);
        joined.push_str(&self.lines[range.end.line][end..]);

        self.undo.push(self.lines.clone());
        self.redo.clear();
        self.lines
            .splice(range.start.line..=range.end.line, split_lines(&joined));
        Ok(())
    }

    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.undo.pop() {
            Some(previous) => {
                self.redo.push(std::mem::replace(&mut self.lines, previous));
                true
            }
            None => false,
        }
    }

    /// Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.redo.pop() {
            Some(next) => {
                self.undo.push(std::mem::replace(&mut self.lines, next));
                true
            }
            None => false,
        }
    }

    fn byte_offset(&self, at: Position) -> Result<usize, OutOfBounds> {
        let line = self.lines.get(at.line).ok_or(OutOfBounds(at))?;
        Ok(line
            .char_indices()
            .nth(at.column)
            .map(|(offset, _)| offset)
            .unwrap_or(line.len()))
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}
