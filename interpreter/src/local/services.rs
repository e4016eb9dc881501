use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::capability::{
    CapabilityResult, Clipboard, DiagnosticsSource, EditorDiagnostic, ProcessOutput,
    ProcessRunner,
};
use crate::error::CapabilityError;

/// A clipboard private to the process.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn read_text(&self) -> CapabilityResult<String> {
        Ok(self.text.lock().clone())
    }

    async fn write_text(&self, text: &str) -> CapabilityResult<()> {
        *self.text.lock() = text.to_string();
        Ok(())
    }
}

/// Runs commands through `sh -c` in a fixed directory.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    cwd: PathBuf,
}

impl ShellRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        ShellRunner { cwd: cwd.into() }
    }
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(&self, command: &str) -> CapabilityResult<ProcessOutput> {
        tracing::info!(command, cwd = %self.cwd.display(), "running shell command");
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .output()
            .await
            .map_err(|e| CapabilityError::Io(format!("cannot run `{}`: {}", command, e)))?;

        Ok(ProcessOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Reports no diagnostics. Used when no language server is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiagnostics;

#[async_trait]
impl DiagnosticsSource for NoDiagnostics {
    async fn diagnostics(&self, _path: &str) -> CapabilityResult<Vec<EditorDiagnostic>> {
        Ok(Vec::new())
    }
}
