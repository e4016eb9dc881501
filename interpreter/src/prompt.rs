use std::fmt::Write as _;

use serde::Serialize;

/// A captured code excerpt attached to the next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CodePrompt {
    File {
        location: String,
        content: String,
    },
    Function {
        name: String,
        location: String,
        content: String,
        start_line: usize,
    },
    Selection {
        location: String,
        content: String,
        start_line: usize,
    },
}

impl CodePrompt {
    pub fn file(location: impl Into<String>, content: impl Into<String>) -> Self {
        CodePrompt::File {
            location: location.into(),
            content: content.into(),
        }
    }

    pub fn function(
        name: impl Into<String>,
        location: impl Into<String>,
        content: impl Into<String>,
        start_line: usize,
    ) -> Self {
        CodePrompt::Function {
            name: name.into(),
            location: location.into(),
            content: content.into(),
            start_line,
        }
    }

    pub fn selection(
        location: impl Into<String>,
        content: impl Into<String>,
        start_line: usize,
    ) -> Self {
        CodePrompt::Selection {
            location: location.into(),
            content: content.into(),
            start_line,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            CodePrompt::File { location, .. }
            | CodePrompt::Function { location, .. }
            | CodePrompt::Selection { location, .. } => location,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            CodePrompt::File { content, .. }
            | CodePrompt::Function { content, .. }
            | CodePrompt::Selection { content, .. } => content,
        }
    }

    fn start_line(&self) -> usize {
        match self {
            CodePrompt::File { .. } => 0,
            CodePrompt::Function { start_line, .. } | CodePrompt::Selection { start_line, .. } => {
                *start_line
            }
        }
    }

    /// Render the snippet header followed by its numbered lines.
    pub fn render(&self) -> String {
        let mut out = match self {
            CodePrompt::File { location, content } => format!(
                "# file @ \"{}\" totalLines: {}\n",
                location,
                content.split('\n').count()
            ),
            CodePrompt::Function {
                name,
                location,
                start_line,
                ..
            } => format!("# function \"{}\" @ \"{}:{}\"\n", name, location, start_line),
            CodePrompt::Selection {
                location,
                start_line,
                ..
            } => format!("# selection @ \"{}:{}\n", location, start_line),
        };
        out.push_str(&add_line_numbers(self.content(), self.start_line()));
        out.push('\n');
        out
    }
}

/// Prefix every line with its absolute (zero-based) line number.
pub fn add_line_numbers(text: &str, start_line: usize) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{} {}", start_line + index, line);
    }
    out
}

/// Build the user turn sent to the model: snippets first, then the request.
pub fn build_prompt(snippets: &[CodePrompt], request: &str) -> String {
    if snippets.is_empty() {
        return format!("# User request\n{}", request);
    }
    let rendered: Vec<String> = snippets.iter().map(CodePrompt::render).collect();
    format!("{}\n# User request\n{}", rendered.join("\n"), request)
}

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

/// System prompt for autonomous mode: teaches the model the command grammar.
pub const AUTONOMOUS_SYSTEM_PROMPT: &str = r#"You are a programming assistant that edits a software project by issuing commands.
Wrap every batch of commands in a single @startCommand / @endCommand pair; text outside it is read as conversation.
Lines and columns are zero-based. Paths are relative to the workspace root. Quote arguments that contain spaces.

Commands:
@listFiles <path> - list a directory; the listing is sent back to you.
@readFile <path> [<startLine> <endLine>] - attach a file (or a line range of it) as context.
@createFile <path> - create an empty file, overwriting any existing one.
@startInput <path> <line> <column>
<text>
@endInput - insert text; the surrounding lines are sent back to you.
@startReplace <path> <startLine> <startColumn> <endLine> <endColumn>
<text>
@endReplace - replace a range with text.
@select <startLine> <startColumn> <endLine> <endColumn> - select a range in the open document; the selection is sent back to you.
@copy <path> <startLine> <startColumn> <endLine> <endColumn> - copy a range to the clipboard.
@cut <path> <startLine> <startColumn> <endLine> <endColumn> - cut a range to the clipboard.
@paste <path> <line> <column> - paste the clipboard.
@undo / @redo - undo or redo the last edit in the open document.
@getSyntaxErrors - report errors in the open document.
@search <regex> - search the workspace.
@runInTerminal <command> - run a shell command; its output is sent back to you.
@startMemoryWrite
<text>
@endMemoryWrite - append to your long-term memory.
@readMemory - read your long-term memory.
@clearMemory - erase your long-term memory.
@clearConversation - erase the conversation history.

Old messages may be dropped, so keep plans and findings in memory and read it before acting.
Check for syntax errors after editing. Use @undo to correct mistakes.
Explain your long- and short-term goals briefly before each command batch."#;

/// System prompt for conversational mode.
pub const CONVERSATIONAL_SYSTEM_PROMPT: &str = r#"You are a helpful assistant that helps develop software.
You receive files, functions and selections as context, each line prefixed with its line number.
Ask for more code when you need it and provide code snippets whenever you can."#;
