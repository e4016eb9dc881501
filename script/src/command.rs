use std::fmt;
use std::ops::Range;

use serde::Serialize;

/// A single directive argument, decoded opportunistically as a JSON scalar.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Arg {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Arg {
    /// Decode a raw token. Quoted strings unwrap, numbers and booleans become
    /// typed values. Returns `None` when the token is not a JSON scalar.
    pub fn decode(token: &str) -> Option<Arg> {
        match serde_json::from_str::<serde_json::Value>(token).ok()? {
            serde_json::Value::String(s) => Some(Arg::Text(s)),
            serde_json::Value::Bool(b) => Some(Arg::Boolean(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Arg::Integer(i)),
                None => n.as_f64().map(Arg::Float),
            },
            _ => None,
        }
    }

    /// Decode a token, keeping its raw text when it is not a JSON scalar.
    pub fn decode_lenient(token: &str) -> Arg {
        Arg::decode(token).unwrap_or_else(|| Arg::Text(token.to_string()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Text(_) => "text",
            Arg::Integer(_) => "integer",
            Arg::Float(_) => "float",
            Arg::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Text(s) => write!(f, "{}", s),
            Arg::Integer(i) => write!(f, "{}", i),
            Arg::Float(n) => write!(f, "{}", n),
            Arg::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Text(a), Arg::Text(b)) => a == b,
            (Arg::Integer(a), Arg::Integer(b)) => a == b,
            (Arg::Float(a), Arg::Float(b)) => a == b,
            (Arg::Integer(a), Arg::Float(b)) | (Arg::Float(b), Arg::Integer(a)) => {
                *a as f64 == *b
            }
            (Arg::Boolean(a), Arg::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Integer(i)
    }
}

/// A named command with its ordered arguments.
/// Produced by the parser, consumed by the interpreter; never mutated in between.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub name: String,
    pub args: Vec<Arg>,
    /// Byte span of the directive line(s) in the reply text.
    #[serde(skip)]
    pub span: Range<usize>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Command {
            name: name.into(),
            args,
            span: 0..0,
        }
    }

    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        for arg in &self.args {
            match arg {
                Arg::Text(s) if s.contains('\n') => write!(f, " <{} bytes>", s.len())?,
                Arg::Text(s) if s.is_empty() || s.contains(char::is_whitespace) => {
                    write!(f, " {:?}", s)?
                }
                other => write!(f, " {}", other)?,
            }
        }
        Ok(())
    }
}
