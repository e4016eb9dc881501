pub mod block;
pub mod command;
pub mod parser;

use crate::command::Command;
use crate::parser::ParseError;

/// A parsed command script: the commands found between `@startCommand` and
/// `@endCommand` in one model reply, in emission order.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub commands: Vec<Command>,
    /// Non-fatal findings, e.g. blocks that were opened but never closed.
    pub warnings: Vec<ParseError>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Script {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Parse raw reply text with source ID 0.
pub fn parse(source: &str) -> Result<Script, Vec<ParseError>> {
    parser::Parser::new(source.to_string(), 0).parse()
}
