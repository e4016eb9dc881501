use crate::command::Arg;

/// Directive whose arguments must all decode as JSON scalars.
const STRICT_DIRECTIVE: &str = "input";

/// A single `@name arg...` line, split into raw tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive<'a> {
    pub name: &'a str,
    /// Raw argument tokens, quotes still attached.
    pub tokens: Vec<&'a str>,
}

impl<'a> Directive<'a> {
    /// Recognize a directive line. A line is a directive iff it starts with
    /// `@` and has at least one token after it.
    pub fn parse(line: &'a str) -> Option<Self> {
        let rest = line.strip_prefix('@')?;
        let mut tokens = tokenize(rest);
        if tokens.is_empty() {
            return None;
        }
        let name = tokens.remove(0);
        Some(Directive { name, tokens })
    }

    /// Decode every argument token.
    ///
    /// Returns the offending token when the directive is strict and a token
    /// is not a JSON scalar.
    pub fn decode_args(&self) -> Result<Vec<Arg>, &'a str> {
        let strict = self.name == STRICT_DIRECTIVE;
        self.tokens
            .iter()
            .map(|token| match Arg::decode(token) {
                Some(arg) => Ok(arg),
                None if strict => Err(*token),
                None => Ok(Arg::Text(unquote(token).to_string())),
            })
            .collect()
    }
}

/// Quote-aware whitespace splitter.
///
/// A token is a run of non-whitespace characters and double-quoted segments;
/// a quoted segment may contain whitespace. A quote with no closing partner
/// ends the current token and is skipped.
pub fn tokenize(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        // Skip leading whitespace (and any stray unmatched quote)
        let c = text[i..].chars().next().unwrap_or(' ');
        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }
        if c == '"' && closing_quote(text, i).is_none() {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() {
            let c = text[i..].chars().next().unwrap_or(' ');
            if c.is_whitespace() {
                break;
            }
            if c == '"' {
                match closing_quote(text, i) {
                    Some(end) => i = end + 1,
                    None => break,
                }
                continue;
            }
            i += c.len_utf8();
        }
        tokens.push(&text[start..i]);
    }

    tokens
}

/// Byte index of the quote closing the one at `open`.
fn closing_quote(text: &str, open: usize) -> Option<usize> {
    text[open + 1..].find('"').map(|p| open + 1 + p)
}

/// Strip one pair of surrounding double quotes, if present.
fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}
