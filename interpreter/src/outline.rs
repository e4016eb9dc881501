//! Locating the function that encloses a line, for function snippets.
//!
//! This is a line-based heuristic, not a parser. Brace-delimited functions
//! (`fn`, `function`, arrow functions bound to a name) end at the matching
//! closing brace; Python `def`s end where the indentation drops back.

use std::sync::LazyLock;

use regex::Regex;

use crate::prompt::CodePrompt;

static FUNCTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?:(?:pub(?:\([^)]*\))?|export|default|async|const|unsafe|static|extern\s+\S+)\s+)*",
        r"(?P<keyword>fn|function\*?|def)\s+(?P<named>[A-Za-z_$][\w$]*)",
        r"|^\s*(?:export\s+)?(?:const|let|var)\s+(?P<bound>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*",
        r"(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
    ))
    .expect("function header pattern is valid")
});

/// A function found in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    /// Zero-based first and last line, inclusive.
    pub start_line: usize,
    pub end_line: usize,
}

impl FunctionSpan {
    /// Build the snippet for this function out of `source`.
    pub fn to_prompt(&self, location: &str, source: &str) -> CodePrompt {
        let text = source
            .split('\n')
            .skip(self.start_line)
            .take(self.end_line - self.start_line + 1)
            .collect::<Vec<_>>()
            .join("\n");
        CodePrompt::function(&self.name, location, text, self.start_line)
    }
}

/// Every function the heuristic recognizes, in source order.
pub fn functions(source: &str) -> Vec<FunctionSpan> {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut found = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let Some(captures) = FUNCTION_HEADER.captures(line) else {
            continue;
        };
        let Some(name) = captures.name("named").or_else(|| captures.name("bound")) else {
            continue;
        };
        let end = match captures.name("keyword") {
            Some(keyword) if keyword.as_str() == "def" => indented_block_end(&lines, index),
            _ => brace_block_end(&lines, index),
        };
        if let Some(end_line) = end {
            found.push(FunctionSpan {
                name: name.as_str().to_string(),
                start_line: index,
                end_line,
            });
        }
    }
    found
}

/// The innermost function whose lines include `line`.
pub fn function_at(source: &str, line: usize) -> Option<FunctionSpan> {
    functions(source)
        .into_iter()
        .filter(|f| f.start_line <= line && line <= f.end_line)
        .min_by_key(|f| f.end_line - f.start_line)
}

/// Line holding the brace that closes the body opened at or after `start`.
/// `None` for a declaration without a body.
fn brace_block_end(lines: &[&str], start: usize) -> Option<usize> {
    let arrow = lines[start].contains("=>");
    let mut depth = 0usize;
    let mut opened = false;
    for (index, line) in lines.iter().enumerate().skip(start) {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '"' | '`' => i = skip_string(&chars, i),
                '\'' => i = skip_char_literal(&chars, i),
                '/' if chars.get(i + 1) == Some(&'/') => break,
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    if opened && depth == 0 {
                        return Some(index);
                    }
                }
                // `const f = (x) => x + 1;` has no braces to match.
                ';' if !opened => return arrow.then_some(index),
                _ => {}
            }
            i += 1;
        }
    }
    None
}

/// Index of the closing quote of the string starting at `open`.
fn skip_string(chars: &[char], open: usize) -> usize {
    let quote = chars[open];
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            c if c == quote => return i,
            _ => {}
        }
        i += 1;
    }
    i
}

/// Skip `'x'` and `'\n'` style literals. A lone quote (a Rust lifetime)
/// is left alone.
fn skip_char_literal(chars: &[char], open: usize) -> usize {
    match chars.get(open + 1..) {
        Some(['\\', _, '\'', ..]) => open + 3,
        Some([_, '\'', ..]) => open + 2,
        _ => open,
    }
}

/// Last non-blank line indented deeper than the `def` at `start`.
fn indented_block_end(lines: &[&str], start: usize) -> Option<usize> {
    let indent = |line: &str| line.len() - line.trim_start().len();
    let header_indent = indent(lines[start]);
    let mut end = start;
    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent(line) <= header_indent {
            break;
        }
        end = index;
    }
    (end > start).then_some(end)
}
