use std::io::Write;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use interpreter::Presenter;
use interpreter::capability::Confirmer;
use interpreter::prompt::CodePrompt;

/// Echoes interpreter progress to stderr.
#[derive(Default)]
pub struct ConsolePresenter {
    /// Length of the request text already shown.
    shown: Mutex<usize>,
}

impl Presenter for ConsolePresenter {
    fn request_updated(&self, request: &str) {
        let mut shown = self.shown.lock();
        let fresh = match request.get(*shown..) {
            Some(tail) if *shown > 0 => tail,
            _ => request,
        };
        if !fresh.trim().is_empty() {
            eprintln!("{}", fresh.trim_start_matches('\n'));
        }
        *shown = request.len();
    }

    fn snippets_updated(&self, snippets: &[CodePrompt]) {
        if snippets.is_empty() {
            return;
        }
        let names: Vec<&str> = snippets.iter().map(CodePrompt::location).collect();
        eprintln!("context: {}", names.join(", "));
    }

    fn notify_error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

/// Asks on the terminal before a shell command runs.
#[derive(Default)]
pub struct StdinConfirmer {
    prompt: AsyncMutex<()>,
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, command: &str) -> bool {
        let _guard = self.prompt.lock().await;
        eprint!("run `{}`? [y/N] ", command);
        let _ = std::io::stderr().flush();
        match read_line().await {
            Some(answer) => matches!(answer.trim(), "y" | "Y" | "yes"),
            None => false,
        }
    }
}

/// Read one line from stdin without blocking the runtime. `None` at EOF.
pub async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}
