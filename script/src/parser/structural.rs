use std::ops::Range;

use crate::block::BlockKind;
use crate::command::{Arg, Command};
use crate::parser::directive::Directive;
use crate::parser::error::ParseError;

const START_SCRIPT: &str = "startCommand";
const END_SCRIPT: &str = "endCommand";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse reply text line by line into commands and warnings.
pub(crate) fn parse_lines(
    source: &str,
    file_id: usize,
) -> Result<(Vec<Command>, Vec<ParseError>), Vec<ParseError>> {
    let mut state = ParseState::new(file_id);
    let mut offset = 0;

    for raw in source.split('\n') {
        let span = offset..offset + raw.len();
        offset += raw.len() + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        state.process_line(line, span);
    }

    state.finalize(source.len())
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

/// At most one block is open at a time; nesting is not supported.
enum BlockState {
    Idle,
    Open {
        kind: BlockKind,
        args: Vec<Arg>,
        body: String,
        span_start: usize,
    },
}

struct ParseState {
    file_id: usize,
    /// True between `@startCommand` and `@endCommand`.
    active: bool,
    block: BlockState,
    commands: Vec<Command>,
    warnings: Vec<ParseError>,
    errors: Vec<ParseError>,
}

impl ParseState {
    fn new(file_id: usize) -> Self {
        ParseState {
            file_id,
            active: false,
            block: BlockState::Idle,
            commands: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &str, span: Range<usize>) {
        let Some(directive) = Directive::parse(line) else {
            self.push_body(line);
            return;
        };

        match directive.name {
            START_SCRIPT => self.active = true,
            END_SCRIPT => {
                self.drop_open_block(span.start, "the script ended");
                self.active = false;
            }
            _ if matches!(self.block, BlockState::Open { .. }) => {
                self.process_in_block(&directive, span)
            }
            _ if !self.active => {}
            name => {
                if let Some(kind) = BlockKind::from_opener(name) {
                    self.open_block(kind, &directive, span);
                } else if BlockKind::from_closer(name).is_some() {
                    self.warnings.push(
                        ParseError::warning(
                            format!("@{} without a matching opener", name),
                            span,
                            self.file_id,
                        )
                        .with_note("the directive was ignored"),
                    );
                } else {
                    self.emit(&directive, span);
                }
            }
        }
    }

    /// Handle a directive line while a block body is being collected.
    fn process_in_block(&mut self, directive: &Directive<'_>, span: Range<usize>) {
        let BlockState::Open { kind, .. } = &self.block else {
            return;
        };
        let kind = *kind;

        if directive.name == kind.closer() {
            self.close_block(span.end);
        } else if let Some(other) = BlockKind::from_opener(directive.name) {
            self.warnings.push(
                ParseError::warning(
                    format!(
                        "@{} while @{} is still open",
                        other.opener(),
                        kind.opener()
                    ),
                    span,
                    self.file_id,
                )
                .with_note("blocks cannot be nested; the inner opener was ignored"),
            );
        } else {
            self.warnings.push(
                ParseError::warning(
                    format!("@{} inside @{}", directive.name, kind.opener()),
                    span,
                    self.file_id,
                )
                .with_note("directive lines are not part of a block body; the line was dropped"),
            );
        }
    }

    fn open_block(&mut self, kind: BlockKind, directive: &Directive<'_>, span: Range<usize>) {
        let args = match directive.decode_args() {
            Ok(args) => args,
            Err(token) => {
                self.errors.push(invalid_argument(directive.name, token, span, self.file_id));
                return;
            }
        };
        self.block = BlockState::Open {
            kind,
            args,
            body: String::new(),
            span_start: span.start,
        };
    }

    fn close_block(&mut self, span_end: usize) {
        let BlockState::Open {
            kind,
            mut args,
            body,
            span_start,
        } = std::mem::replace(&mut self.block, BlockState::Idle)
        else {
            return;
        };
        args.push(Arg::Text(body.trim_end().to_string()));
        self.commands
            .push(Command::new(kind.command_name(), args).with_span(span_start..span_end));
    }

    fn drop_open_block(&mut self, at: usize, reason: &str) {
        if let BlockState::Open {
            kind, span_start, ..
        } = std::mem::replace(&mut self.block, BlockState::Idle)
        {
            self.warnings.push(
                ParseError::warning(
                    format!("@{} was never closed before {}", kind.opener(), reason),
                    span_start..at,
                    self.file_id,
                )
                .with_note(format!(
                    "expected @{}; the {} command was dropped",
                    kind.closer(),
                    kind.command_name()
                )),
            );
        }
    }

    fn push_body(&mut self, line: &str) {
        if let BlockState::Open { body, .. } = &mut self.block {
            body.push_str(line);
            body.push('\n');
        }
    }

    fn emit(&mut self, directive: &Directive<'_>, span: Range<usize>) {
        match directive.decode_args() {
            Ok(args) => self
                .commands
                .push(Command::new(directive.name, args).with_span(span)),
            Err(token) => {
                self.errors.push(invalid_argument(directive.name, token, span, self.file_id))
            }
        }
    }

    fn finalize(
        mut self,
        source_len: usize,
    ) -> Result<(Vec<Command>, Vec<ParseError>), Vec<ParseError>> {
        self.drop_open_block(source_len, "the end of the reply");
        if self.errors.is_empty() {
            Ok((self.commands, self.warnings))
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid_argument(name: &str, token: &str, span: Range<usize>, file_id: usize) -> ParseError {
    ParseError::error(format!("invalid @{} argument: {}", name, token), span, file_id)
        .with_note("arguments must be JSON literals, e.g. \"path/to/file\" 10 0")
}
