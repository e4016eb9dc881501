use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use interpreter::{LocalWorkspace, SessionState};
use script::parser::ParseError;

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based line of the reply.
    #[serde(default)]
    pub line: Option<usize>,
}

/// Frontmatter of a `.test.md` file. The body is a model reply.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    pub description: Option<String>,

    /// Files seeded into a scratch workspace, path -> contents.
    pub files: BTreeMap<String, String>,

    /// Parsed commands, in their `@name args` display form.
    pub expect_commands: Option<Vec<String>>,

    /// The reply must fail to parse.
    pub expect_parse_error: bool,

    /// If present (even empty), warning count and content are checked.
    pub expect_warnings: Option<Vec<ExpectedWarning>>,

    /// The batch must abort with an error containing this substring.
    pub expect_error: Option<String>,

    /// Substrings the pending request text must contain afterwards.
    pub expect_request_contains: Vec<String>,

    pub expect_memory: Option<String>,

    /// Exact workspace file contents afterwards.
    pub expect_files: BTreeMap<String, String>,

    /// Path of the active document afterwards.
    pub expect_active: Option<String>,
}

/// Split a `.test.md` file into its TOML frontmatter and reply body.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let frontmatter = after_open[..close].trim_end_matches('\r');
    let rest = &after_open[close + 4..];
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config = toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, body))
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    /// `None` on success, the failure reason otherwise.
    pub failure: Option<String>,
}

impl TestResult {
    fn label(&self) -> String {
        self.description.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.trim_end_matches(".test.md").to_string())
                .unwrap_or_else(|| "?".to_string())
        })
    }
}

async fn run_single_test(path: &Path) -> TestResult {
    let (description, failure) = match std::fs::read_to_string(path) {
        Err(e) => (None, Some(format!("cannot read file: {}", e))),
        Ok(content) => match parse_test_file(&content) {
            Err(e) => (None, Some(format!("frontmatter error: {}", e))),
            Ok((config, body)) => {
                let failure = check(&config, body).await.err();
                (config.description, failure)
            }
        },
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        failure,
    }
}

/// Run one reply against a scratch workspace and check every expectation.
async fn check(config: &TestConfig, body: &str) -> Result<(), String> {
    let parsed = script::parse(body);
    if config.expect_parse_error {
        return match parsed {
            Err(_) => Ok(()),
            Ok(_) => Err("expected parse error, but parsing succeeded".into()),
        };
    }
    let script = parsed.map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        format!("unexpected parse error: {}", messages.join("; "))
    })?;

    if let Some(expected) = &config.expect_commands {
        let actual: Vec<String> = script.commands.iter().map(ToString::to_string).collect();
        if &actual != expected {
            return Err(format!(
                "command mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }
    if let Some(expected) = &config.expect_warnings {
        check_warnings(body, &script.warnings, expected)?;
    }

    let dir = tempfile::tempdir().map_err(|e| format!("cannot create workspace: {}", e))?;
    for (path, contents) in &config.files {
        let file = dir.path().join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("cannot seed {}: {}", path, e))?;
        }
        std::fs::write(&file, contents).map_err(|e| format!("cannot seed {}: {}", path, e))?;
    }
    let caps = LocalWorkspace::new(dir.path()).capabilities();

    let result = interpreter::execute_script(&script.commands, SessionState::new(), &caps).await;
    let state = match (&config.expect_error, result) {
        (Some(expected), Err(aborted)) => {
            let message = aborted.error.to_string();
            if !message.contains(expected.as_str()) {
                return Err(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, message
                ));
            }
            aborted.state
        }
        (Some(expected), Ok(_)) => {
            return Err(format!(
                "expected error containing \"{}\", but the batch completed",
                expected
            ));
        }
        (None, Err(aborted)) => return Err(format!("unexpected abort: {}", aborted)),
        (None, Ok(state)) => state,
    };

    for needle in &config.expect_request_contains {
        if !state.current_user_request.contains(needle.as_str()) {
            return Err(format!(
                "request text does not contain \"{}\"\n  actual: {}",
                needle, state.current_user_request
            ));
        }
    }
    if let Some(expected) = &config.expect_memory {
        if &state.memory != expected {
            return Err(format!(
                "memory mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, state.memory
            ));
        }
    }
    if let Some(expected) = &config.expect_active {
        if state.active_path() != Some(expected.as_str()) {
            return Err(format!(
                "expected active document {}, got {:?}",
                expected,
                state.active_path()
            ));
        }
    }
    for (path, expected) in &config.expect_files {
        let actual = std::fs::read_to_string(dir.path().join(path))
            .map_err(|e| format!("cannot read {}: {}", path, e))?;
        if &actual != expected {
            return Err(format!(
                "{} mismatch\n  expected: {:?}\n  actual:   {:?}",
                path, expected, actual
            ));
        }
    }
    Ok(())
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

fn check_warnings(
    source: &str,
    warnings: &[ParseError],
    expected: &[ExpectedWarning],
) -> Result<(), String> {
    if warnings.len() != expected.len() {
        let actual: Vec<String> = warnings.iter().map(|w| format!("    - {}", w)).collect();
        return Err(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            warnings.len(),
            if actual.is_empty() {
                "    (none)".to_string()
            } else {
                actual.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in warnings.iter().zip(expected).enumerate() {
        let message = actual.to_string();
        if !message.contains(&expected.contains) {
            return Err(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, message
            ));
        }
        if let Some(line) = expected.line {
            let actual_line = byte_offset_to_line(source, actual.span.start);
            if actual_line != line {
                return Err(format!(
                    "warning[{}]: expected on line {}, but span is on line {}",
                    i, line, actual_line
                ));
            }
        }
    }
    Ok(())
}

/// Discover `.test.md` files grouped by subfolder relative to `root`.
/// Files directly in `root` get the category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".test.md"));
        if is_test {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        let label = if category.is_empty() { "(root)" } else { category.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }
}

/// Select the categories to run. Unknown names are reported and skipped.
fn filter_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for name in requested {
        let name = name.trim_matches('/');
        let prefix = format!("{}/", name);
        let before = selected.len();
        for (category, files) in all {
            if category == name || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files);
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all
                .keys()
                .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                .collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                name,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run all `.test.md` files under `path` (or the single file `path`).
/// Returns the process exit code.
pub async fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { color: !no_color };

    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        let selected = filter_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(category, files)| (category.to_string(), files.clone()))
            .collect()
    };
    let single = path.is_file();

    let mut passed = 0usize;
    let mut failures = Vec::new();
    for (category, files) in &groups {
        if !single {
            let header = if category.is_empty() { "(root)" } else { category.as_str() };
            eprintln!();
            eprintln!("{}", style.paint("1", header));
        }
        for file in files {
            let result = run_single_test(file).await;
            if result.failure.is_none() {
                passed += 1;
                eprintln!("  {}  {}", style.pass(), result.label());
            } else {
                eprintln!("  {}  {}", style.fail(), result.label());
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            for line in failure.failure.iter().flat_map(|reason| reason.lines()) {
                eprintln!("  {}", line);
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontmatter_and_body_are_split() {
        let content = "---\ndescription = \"demo\"\n[files]\n\"a.txt\" = \"x\"\n---\n@startCommand\n";
        let (config, body) = parse_test_file(content).unwrap();
        assert_eq!(config.description.as_deref(), Some("demo"));
        assert_eq!(config.files.get("a.txt").map(String::as_str), Some("x"));
        assert_eq!(body, "@startCommand\n");
    }

    #[test]
    fn missing_frontmatter_is_rejected() {
        assert!(parse_test_file("@startCommand").is_err());
    }
}
