use serde::Serialize;

use script::command::Command;

use crate::capability::{
    CapabilityResult, Capabilities, EditableDocument, Position, Severity, TextRange,
};
use crate::error::{BatchAborted, CapabilityError, ExecuteError};
use crate::prompt::CodePrompt;
use crate::schema::{BoundArgs, Directive};
use crate::session::SessionState;

/// Lines of context shown around an insertion.
const INSERT_CONTEXT_LINES: usize = 20;

const TERMINAL_CANCELLED: &str = "user cancelled command";

/// Execute a batch of commands in order, threading the session state.
///
/// The first failing command aborts the batch; the returned
/// [`BatchAborted`] carries the state as it was after the last command that
/// completed.
pub async fn execute_script(
    commands: &[Command],
    state: SessionState,
    caps: &Capabilities,
) -> Result<SessionState, BatchAborted> {
    let mut state = state;
    for (index, command) in commands.iter().enumerate() {
        tracing::debug!(%command, index, "executing command");
        if let Err(error) = execute_command(command, &mut state, caps).await {
            tracing::warn!(%command, index, %error, "command batch aborted");
            return Err(BatchAborted {
                state,
                index,
                error,
            });
        }
    }
    Ok(state)
}

/// Execute a single command against the session state.
/// Unknown command names are logged and ignored.
pub async fn execute_command(
    command: &Command,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let Some(directive) = Directive::from_name(&command.name) else {
        tracing::warn!(name = %command.name, "ignoring unknown command");
        return Ok(());
    };
    let args = directive.bind(command)?;
    let name = command.name.as_str();

    match directive {
        Directive::ReadFile => read_file(&args, state, caps).await,
        Directive::ListFiles => list_files(&args, state, caps).await,
        Directive::CreateFile => create_file(&args, state, caps).await,
        Directive::Undo => {
            let doc = active_document(state, name)?;
            doc.undo().await.map_err(capability(name))
        }
        Directive::Redo => {
            let doc = active_document(state, name)?;
            doc.redo().await.map_err(capability(name))
        }
        Directive::Input => input(&args, state, caps).await,
        Directive::Select => select(&args, state, caps),
        Directive::Replace => replace(&args, state, caps).await,
        Directive::Copy => {
            copy_range(name, &args, caps).await?;
            Ok(())
        }
        Directive::Cut => {
            active_document(state, name)?;
            let (mut doc, range) = copy_range(name, &args, caps).await?;
            doc.delete(range).await.map_err(capability(name))
        }
        Directive::Paste => paste(&args, state, caps).await,
        Directive::GetSyntaxErrors => syntax_errors(state, caps).await,
        Directive::Search => search(&args, state, caps).await,
        Directive::RunInTerminal => run_in_terminal(&args, state, caps).await,
        Directive::MemoryWrite => {
            state.memory.push_str(args.text(0));
            Ok(())
        }
        Directive::ReadMemory => {
            let memory = state.memory.clone();
            respond(state, caps, name, &memory);
            Ok(())
        }
        Directive::ClearMemory => {
            state.memory.clear();
            Ok(())
        }
        Directive::ClearConversation => {
            state.conversation_history.clear();
            Ok(())
        }
    }
}

/// Format a command result the way it is fed back to the model.
pub fn response_block(command: &str, payload: &str) -> String {
    format!(
        "response to @{}:\n```\n{}\n```",
        command,
        payload.trim_end_matches('\n')
    )
}

// ---------------------------------------------------------------------------
// File commands
// ---------------------------------------------------------------------------

async fn read_file(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let path = args.text(0);
    let content = match soft("readFile", caps.files.read_file(path).await)? {
        Ok(content) => content,
        Err(message) => {
            respond(state, caps, "readFile", &message);
            return Ok(());
        }
    };

    let snippet = match args.opt_int(1) {
        Some(start) => {
            let lines: Vec<&str> = content.split('\n').collect();
            let last = lines.len() - 1;
            let end = args.opt_int(2).unwrap_or(last).min(last);
            let excerpt = if start <= end {
                lines[start..=end].join("\n")
            } else {
                String::new()
            };
            CodePrompt::selection(path, excerpt, start)
        }
        None => CodePrompt::file(path, content),
    };
    let line_count = snippet.content().split('\n').count();

    state.code_prompts.push(snippet);
    caps.presenter.snippets_updated(&state.code_prompts);
    respond(
        state,
        caps,
        "readFile",
        &format!("attached \"{}\" as context ({} lines)", path, line_count),
    );
    Ok(())
}

async fn list_files(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let payload = match soft("listFiles", caps.files.list_dir(args.text(0)).await)? {
        Ok(entries) => entries
            .iter()
            .map(|entry| format!("{} ({})", entry.name, entry.kind))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(message) => message,
    };
    respond(state, caps, "listFiles", &payload);
    Ok(())
}

/// Creates an empty file, overwriting whatever was there.
async fn create_file(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    if let Err(message) = soft("createFile", caps.files.write_file(args.text(0), "").await)? {
        respond(state, caps, "createFile", &message);
    }
    Ok(())
}

async fn search(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let payload = match soft("search", caps.files.search(args.text(0)).await)? {
        Ok(hits) => pretty_json(&hits),
        Err(message) => message,
    };
    respond(state, caps, "search", &payload);
    Ok(())
}

async fn run_in_terminal(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let command = args.text(0);

    if let Some(confirmer) = &caps.confirmer {
        if !confirmer.confirm(command).await {
            respond(state, caps, "runInTerminal", TERMINAL_CANCELLED);
            return Ok(());
        }
    }

    let payload = match soft("runInTerminal", caps.processes.run(command).await)? {
        Ok(output) if !output.success => {
            format!("Command failed: {}\n{}", command, output.stderr)
        }
        Ok(output) if !output.stderr.is_empty() => output.stderr,
        Ok(output) => output.stdout,
        Err(message) => message,
    };
    respond(state, caps, "runInTerminal", &payload);
    Ok(())
}

// ---------------------------------------------------------------------------
// Editor commands
// ---------------------------------------------------------------------------

async fn input(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let (path, line, column, text) = (args.text(0), args.int(1), args.int(2), args.text(3));
    let doc = match caps.editor.open(path).await {
        Ok(doc) => doc,
        Err(CapabilityError::NotFound(_)) => {
            caps.files
                .write_file(path, "")
                .await
                .map_err(capability("input"))?;
            caps.editor.open(path).await.map_err(capability("input"))?
        }
        Err(e) => return Err(capability("input")(e)),
    };

    let doc = state.editor.insert(doc);
    let at = Position::new(line, column);
    doc.set_selection(TextRange::caret(at));
    doc.insert(at, text).await.map_err(capability("input"))?;

    let window = insertion_window(&**doc, line, text).map_err(capability("input"))?;
    respond(state, caps, "input", &window);
    Ok(())
}

/// The inserted text plus surrounding lines.
fn insertion_window(
    doc: &dyn EditableDocument,
    line: usize,
    text: &str,
) -> CapabilityResult<String> {
    let last = doc.line_count().saturating_sub(1);
    let start = line.saturating_sub(INSERT_CONTEXT_LINES);
    let end = (line + text.split('\n').count() + INSERT_CONTEXT_LINES).min(last);
    let end_column = doc.line_text(end)?.chars().count();
    doc.text_in(TextRange::from_coords(start, 0, end, end_column))
}

fn select(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let doc = active_document(state, "select")?;
    let range = range_at(args, 0);
    doc.set_selection(range);
    let selected = doc.text_in(range).map_err(capability("select"))?;
    respond(state, caps, "select", &selected);
    Ok(())
}

/// Range bounds are not checked here; the editor decides what is valid.
async fn replace(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    let doc = caps
        .editor
        .open(args.text(0))
        .await
        .map_err(capability("replace"))?;
    let doc = state.editor.insert(doc);
    doc.replace(range_at(args, 1), args.text(5))
        .await
        .map_err(capability("replace"))
}

/// Copy a range of `path` to the clipboard. Returns the handle used so a cut
/// can delete the same range.
async fn copy_range(
    command: &str,
    args: &BoundArgs,
    caps: &Capabilities,
) -> Result<(Box<dyn EditableDocument>, TextRange), ExecuteError> {
    let doc = caps
        .editor
        .open(args.text(0))
        .await
        .map_err(capability(command))?;
    let range = range_at(args, 1);
    let text = doc.text_in(range).map_err(capability(command))?;
    caps.clipboard
        .write_text(&text)
        .await
        .map_err(capability(command))?;
    Ok((doc, range))
}

async fn paste(
    args: &BoundArgs,
    state: &mut SessionState,
    caps: &Capabilities,
) -> Result<(), ExecuteError> {
    active_document(state, "paste")?;
    let doc = caps
        .editor
        .open(args.text(0))
        .await
        .map_err(capability("paste"))?;
    let text = caps
        .clipboard
        .read_text()
        .await
        .map_err(capability("paste"))?;
    let doc = state.editor.insert(doc);
    doc.insert(Position::new(args.int(1), args.int(2)), &text)
        .await
        .map_err(capability("paste"))
}

#[derive(Serialize)]
struct SyntaxError<'a> {
    message: &'a str,
    line: usize,
    column: usize,
    length: usize,
}

async fn syntax_errors(state: &mut SessionState, caps: &Capabilities) -> Result<(), ExecuteError> {
    let path = active_document(state, "getSyntaxErrors")?.path().to_string();
    let diagnostics = caps
        .diagnostics
        .diagnostics(&path)
        .await
        .map_err(capability("getSyntaxErrors"))?;

    let errors: Vec<SyntaxError<'_>> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| SyntaxError {
            message: &d.message,
            line: d.range.start.line,
            column: d.range.start.column,
            length: d.range.end.column.saturating_sub(d.range.start.column),
        })
        .collect();
    let payload = pretty_json(&errors);
    respond(state, caps, "getSyntaxErrors", &payload);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Append a "response to @X" block and push the new request text live.
fn respond(state: &mut SessionState, caps: &Capabilities, command: &str, payload: &str) {
    state.append_request(&response_block(command, payload));
    caps.presenter.request_updated(&state.current_user_request);
}

fn active_document<'s>(
    state: &'s mut SessionState,
    command: &str,
) -> Result<&'s mut Box<dyn EditableDocument>, ExecuteError> {
    state
        .editor
        .as_mut()
        .ok_or_else(|| ExecuteError::NoActiveDocument {
            command: command.to_string(),
        })
}

fn range_at(args: &BoundArgs, first: usize) -> TextRange {
    TextRange::from_coords(
        args.int(first),
        args.int(first + 1),
        args.int(first + 2),
        args.int(first + 3),
    )
}

fn capability(command: &str) -> impl FnOnce(CapabilityError) -> ExecuteError + '_ {
    move |source| ExecuteError::Capability {
        command: command.to_string(),
        source,
    }
}

/// Probing commands report I/O failures as data. Internal failures still abort.
fn soft<T>(
    command: &str,
    result: CapabilityResult<T>,
) -> Result<Result<T, String>, ExecuteError> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(e @ CapabilityError::Internal(_)) => Err(capability(command)(e)),
        Err(e) => Ok(Err(e.to_string())),
    }
}

fn pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("unserializable result: {}", e))
}
