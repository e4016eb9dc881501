pub mod directive;
pub mod error;
mod structural;

pub use directive::{Directive, tokenize};
pub use error::ParseError;

use crate::Script;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse model reply text into a command script.
    ///
    /// Fails only when a directive with strict argument decoding (`@input`)
    /// carries a malformed argument; everything else is tolerated.
    pub fn parse(&self) -> Result<Script, Vec<ParseError>> {
        let (commands, warnings) = structural::parse_lines(&self.source, self.file_id)?;
        Ok(Script {
            commands,
            warnings,
            source_id: self.file_id,
        })
    }
}
