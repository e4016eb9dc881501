mod config;
mod console;
mod openai;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use interpreter::outline;
use interpreter::prompt::CodePrompt;
use interpreter::{Capabilities, LocalWorkspace, Session, SessionError, SessionState, TurnOutcome};
use script::parser::ParseError;

use crate::console::{ConsolePresenter, StdinConfirmer};
use crate::openai::OpenAiBackend;

const SUBCOMMANDS: &[&str] = &["run", "chat", "models", "test", "help"];

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PILOT_LOG";

#[derive(Parser)]
#[command(name = "pilot", version, about = "Model-driven command script runner")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the commands in a saved model reply
    Run(RunArgs),

    /// Talk to a model that edits the workspace
    Chat(ChatArgs),

    /// List the models the configured endpoint serves
    Models(ModelsArgs),

    /// Run .test.md script tests
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// File holding the model reply
    file: String,

    /// Workspace root the commands act on
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Parse only, don't execute (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Print the parsed commands and exit
    #[arg(long)]
    commands: bool,

    /// Ask before running terminal commands
    #[arg(long)]
    confirm: bool,

    /// Don't echo responses while the commands run
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct ChatArgs {
    /// Config file (defaults to ./pilot.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workspace root the model works in
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Override the configured model
    #[arg(long)]
    model: Option<String>,

    /// Only talk: pending command output waits for your next message
    #[arg(long)]
    manual: bool,

    /// Run terminal commands without asking
    #[arg(short, long)]
    yes: bool,
}

#[derive(clap::Args)]
struct ModelsArgs {
    /// Config file (defaults to ./pilot.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only list models whose id contains this text
    #[arg(long, default_value = "gpt-")]
    filter: String,

    /// List every model, ignoring --filter
    #[arg(long)]
    all: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_logging();

    // Shorthand: `pilot reply.txt` is `pilot run reply.txt`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_positional = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, a)| !a.starts_with('-'))
        .map(|(i, a)| (i, a.clone()));
    if let Some((index, first)) = first_positional {
        if !SUBCOMMANDS.contains(&first.as_str()) {
            args.insert(index, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let exit_code = match cli.command {
        Command::Run(run_args) => do_run(run_args, color_choice).await,
        Command::Chat(chat_args) => do_chat(chat_args).await,
        Command::Models(models_args) => do_models(models_args).await,
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                0
            } else {
                test_runner::run_tests(path, cli.no_color, &test_args.category).await
            }
        }
    };
    process::exit(exit_code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn do_run(args: RunArgs, color_choice: ColorChoice) -> i32 {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            return 1;
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let script = match script::parser::Parser::new(source, file_id).parse() {
        Ok(script) => script,
        Err(errors) => {
            emit_parse_errors(&writer, &config, &files, &errors);
            return 1;
        }
    };
    emit_parse_errors(&writer, &config, &files, &script.warnings);

    if args.check {
        eprintln!(
            "ok: {} parsed successfully ({} commands)",
            args.file,
            script.commands.len()
        );
        return 0;
    }
    if args.commands {
        for command in &script.commands {
            println!("{}", command);
        }
        return 0;
    }

    let mut caps = LocalWorkspace::new(&args.root).capabilities();
    if !args.quiet {
        caps = caps.with_presenter(Arc::new(ConsolePresenter::default()));
    }
    if args.confirm {
        caps = caps.with_confirmer(Arc::new(StdinConfirmer::default()));
    }

    match interpreter::execute_script(&script.commands, SessionState::new(), &caps).await {
        Ok(state) => {
            if !state.current_user_request.is_empty() {
                println!("{}", state.current_user_request);
            }
            0
        }
        Err(aborted) => {
            let span = script.commands[aborted.index].span.clone();
            let diagnostic = Diagnostic::error()
                .with_message(aborted.error.to_string())
                .with_labels(vec![
                    Label::primary(file_id, span).with_message("this command failed"),
                ])
                .with_notes(vec![format!(
                    "{} of {} commands completed",
                    aborted.index,
                    script.commands.len()
                )]);
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            1
        }
    }
}

fn emit_parse_errors(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    errors: &[ParseError],
) {
    for error in errors {
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &error.to_diagnostic());
    }
}

// ---------------------------------------------------------------------------
// chat
// ---------------------------------------------------------------------------

const CHAT_HELP: &str = "\
/attach <path> [start end]  attach a file or line range as context
/attach <path> fn <line>    attach the function around a line
/memory                     show the model's memory
/clear                      clear the conversation
/quit                       leave";

fn backend_for(config: &config::Config) -> OpenAiBackend {
    let api_key = config.api_key();
    if api_key.is_none() {
        tracing::warn!(var = %config.api_key_env, "no API key set; sending unauthenticated requests");
    }
    OpenAiBackend::new(&config.base_url, api_key, config.temperature)
}

async fn do_models(args: ModelsArgs) -> i32 {
    let config = match config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    match backend_for(&config).list_models().await {
        Ok(models) => {
            for id in models
                .iter()
                .filter(|id| args.all || id.contains(args.filter.as_str()))
            {
                println!("{}", id);
            }
            0
        }
        Err(e) => {
            eprintln!("error: failed to fetch models: {}", e);
            1
        }
    }
}

async fn do_chat(args: ChatArgs) -> i32 {
    let mut config = match config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    if let Some(model) = args.model {
        config.model = model;
    }
    if args.manual {
        config.autonomous = false;
    }
    let backend = Arc::new(backend_for(&config));

    let mut caps: Capabilities = LocalWorkspace::new(&args.root)
        .capabilities()
        .with_presenter(Arc::new(ConsolePresenter::default()));
    if config.confirm_terminal && !args.yes {
        caps = caps.with_confirmer(Arc::new(StdinConfirmer::default()));
    }
    let mut session = Session::new(backend, caps, config.session_config());

    eprintln!("pilot chat ({}) in {}. /help for commands.", config.model, args.root.display());
    loop {
        eprint!("> ");
        let Some(line) = console::read_line().await else {
            return 0;
        };
        let line = line.trim_end_matches(['\r', '\n']);

        match line.split_whitespace().next() {
            Some("/quit") => return 0,
            Some("/help") => eprintln!("{}", CHAT_HELP),
            Some("/clear") => {
                session.clear_conversation();
                eprintln!("conversation cleared");
            }
            Some("/memory") => println!("{}", session.state().memory),
            Some("/attach") => {
                if let Err(message) = attach(&mut session, &args.root, line).await {
                    eprintln!("error: {}", message);
                }
            }
            _ => {
                if let Err(e) = converse(&mut session, line).await {
                    eprintln!("error: {}", e);
                    if matches!(e, SessionError::Interpreter(_)) {
                        return 1;
                    }
                }
            }
        }
    }
}

/// Submit one message and print every assistant reply it produced.
async fn converse(session: &mut Session, text: &str) -> Result<(), SessionError> {
    let outcome = session.submit(text).await?;
    for reply in outcome.replies() {
        println!("{}\n", reply);
    }
    match outcome {
        TurnOutcome::Completed { replies } => {
            tracing::debug!(model_calls = replies.len(), "turn completed");
        }
        TurnOutcome::Pending { .. } => {
            eprintln!("(command output is pending; press enter to send it)");
        }
        TurnOutcome::Halted { error, .. } => {
            eprintln!("(stopped: {}; it will be sent with your next message)", error);
        }
    }
    Ok(())
}

async fn attach(session: &mut Session, root: &Path, line: &str) -> Result<(), String> {
    let parts: Vec<&str> = line.split_whitespace().skip(1).collect();
    let Some(path) = parts.first() else {
        return Err("usage: /attach <path> [start end | fn <line>]".to_string());
    };
    let content = tokio::fs::read_to_string(root.join(path))
        .await
        .map_err(|e| format!("cannot read '{}': {}", path, e))?;

    let snippet = match parts[1..] {
        ["fn", line] => {
            let line: usize = line.parse().map_err(|_| format!("bad line number '{}'", line))?;
            let function = outline::function_at(&content, line)
                .ok_or_else(|| format!("no function found around line {} of {}", line, path))?;
            function.to_prompt(path, &content)
        }
        [start, end] => {
            let start: usize = start.parse().map_err(|_| format!("bad line number '{}'", start))?;
            let end: usize = end.parse().map_err(|_| format!("bad line number '{}'", end))?;
            let lines: Vec<&str> = content.split('\n').collect();
            let end = end.min(lines.len() - 1);
            if start > end {
                return Err(format!("empty range {}..{}", start, end));
            }
            CodePrompt::selection(*path, lines[start..=end].join("\n"), start)
        }
        [] => CodePrompt::file(*path, content),
        _ => return Err("usage: /attach <path> [start end | fn <line>]".to_string()),
    };
    session.attach(snippet);
    Ok(())
}
