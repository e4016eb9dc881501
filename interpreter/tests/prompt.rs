use interpreter::outline::{FunctionSpan, function_at, functions};
use interpreter::prompt::add_line_numbers;
use interpreter::{CodePrompt, build_prompt};

#[test]
fn file_snippet_counts_lines_from_zero() {
    let snippet = CodePrompt::file("src/a.rs", "fn a() {}\n\nfn b() {}");
    assert_eq!(
        snippet.render(),
        "# file @ \"src/a.rs\" totalLines: 3\n0 fn a() {}\n1 \n2 fn b() {}\n"
    );
}

#[test]
fn selection_header_has_no_closing_quote() {
    let snippet = CodePrompt::selection("notes.md", "two\nthree", 7);
    assert_eq!(snippet.render(), "# selection @ \"notes.md:7\n7 two\n8 three\n");
}

#[test]
fn function_snippet_names_the_function() {
    let snippet = CodePrompt::function("parse", "src/lib.rs", "fn parse() {\n}", 12);
    assert_eq!(
        snippet.render(),
        "# function \"parse\" @ \"src/lib.rs:12\"\n12 fn parse() {\n13 }\n"
    );
}

#[test]
fn line_numbers_start_at_the_given_line() {
    assert_eq!(add_line_numbers("a\nb", 41), "41 a\n42 b");
    assert_eq!(add_line_numbers("", 3), "3 ");
}

#[test]
fn prompt_without_snippets_is_just_the_request() {
    assert_eq!(build_prompt(&[], "fix it"), "# User request\nfix it");
}

#[test]
fn prompt_lists_every_snippet_kind_before_the_request() {
    let snippets = [
        CodePrompt::file("a.ts", "x"),
        CodePrompt::function("f", "b.ts", "function f() {}", 2),
        CodePrompt::selection("c.ts", "y", 5),
    ];
    assert_eq!(
        build_prompt(&snippets, "explain"),
        concat!(
            "# file @ \"a.ts\" totalLines: 1\n0 x\n",
            "\n",
            "# function \"f\" @ \"b.ts:2\"\n2 function f() {}\n",
            "\n",
            "# selection @ \"c.ts:5\n5 y\n",
            "\n",
            "# User request\nexplain"
        )
    );
}

// --- function lookup ---

const RUST: &str = "\
use std::fmt;

pub fn outer(x: &'a str) -> usize {
    let brace = '{';
    let s = \"}\";
    x.len()
}

fn declared();

impl Thing {
    pub(crate) async fn method(&self) {
        if true {
            inner();
        }
    }
}";

#[test]
fn finds_brace_delimited_functions() {
    assert_eq!(
        functions(RUST),
        vec![
            FunctionSpan {
                name: "outer".to_string(),
                start_line: 2,
                end_line: 6,
            },
            FunctionSpan {
                name: "method".to_string(),
                start_line: 11,
                end_line: 15,
            },
        ]
    );
}

#[test]
fn innermost_function_wins() {
    let source = "function outer() {\n  const inner = (a) => {\n    return a;\n  };\n  return inner;\n}";
    assert_eq!(function_at(source, 2).map(|f| f.name), Some("inner".to_string()));
    assert_eq!(function_at(source, 4).map(|f| f.name), Some("outer".to_string()));
    assert_eq!(function_at(source, 6), None);
}

#[test]
fn single_expression_arrow_ends_at_semicolon() {
    let source = "export const double = (x: number): number => x * 2;\nconst y = 1;";
    let found = function_at(source, 0).expect("arrow function");
    assert_eq!((found.name.as_str(), found.start_line, found.end_line), ("double", 0, 0));
}

#[test]
fn python_functions_end_at_dedent() {
    let source = "def first(a):\n    if a:\n\n        return 1\n    return 2\n\ndef second():\n    pass";
    let found = function_at(source, 3).expect("def");
    assert_eq!((found.name.as_str(), found.end_line), ("first", 4));
    assert_eq!(function_at(source, 7).map(|f| f.name), Some("second".to_string()));
}

#[test]
fn function_span_builds_a_function_snippet() {
    let found = function_at(RUST, 4).expect("outer");
    let snippet = found.to_prompt("src/lib.rs", RUST);
    assert_eq!(
        snippet,
        CodePrompt::function(
            "outer",
            "src/lib.rs",
            "pub fn outer(x: &'a str) -> usize {\n    let brace = '{';\n    let s = \"}\";\n    x.len()\n}",
            2
        )
    );
}
