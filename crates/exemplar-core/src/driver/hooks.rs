//! Edit hooks
//!
//! Commands run immediately before and after a file is written, so that
//! external tools (permission changes, checkouts, formatters, `sed`) can
//! cooperate with the rewrite. A hook is a whitespace-separated argument
//! list; `{}` in any argument after the first is replaced by the file path,
//! the way `find -exec` does it.
//!
//! Hook failures are advisory: they are logged and never stop a run.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Placeholder replaced by the current file's path
pub const PLACEHOLDER: &str = "{}";

/// A parsed hook command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCommand {
    raw: String,
    words: Vec<String>,
}

impl HookCommand {
    /// Split `command` on whitespace; `None` for a blank command
    pub fn parse(command: &str) -> Option<Self> {
        let words: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            return None;
        }
        Some(Self {
            raw: command.to_string(),
            words,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Argument vector for `path`; the program word is never substituted
    pub fn argv_for(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.words
            .iter()
            .enumerate()
            .map(|(i, word)| {
                if i == 0 {
                    word.clone()
                } else {
                    word.replace(PLACEHOLDER, &path)
                }
            })
            .collect()
    }
}

/// Exit status and any captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn exited(code: i32) -> Self {
        Self {
            status: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs hook commands
pub trait CommandExecutor {
    fn execute(&mut self, argv: &[String]) -> io::Result<CommandOutput>;
}

/// Runs commands as blocking child processes sharing this process's stdio
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl CommandExecutor for ProcessExecutor {
    fn execute(&mut self, argv: &[String]) -> io::Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        Ok(CommandOutput {
            status: status.code(),
            ..CommandOutput::default()
        })
    }
}

/// When a hook runs relative to the write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeEdit,
    AfterEdit,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::BeforeEdit => write!(f, "before edit"),
            HookPhase::AfterEdit => write!(f, "after edit"),
        }
    }
}

/// A failed hook invocation
#[derive(thiserror::Error, Debug)]
pub enum HookError {
    #[error("{argv:?} failed: {source}")]
    Spawn {
        argv: Vec<String>,
        #[source]
        source: io::Error,
    },

    #[error("{argv:?} failed: {}", exit_description(.status))]
    Status { argv: Vec<String>, status: Option<i32> },
}

fn exit_description(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Run one hook against `path`
pub fn run_hook(
    executor: &mut dyn CommandExecutor,
    hook: &HookCommand,
    path: &Path,
) -> Result<(), HookError> {
    let argv = hook.argv_for(path);
    debug!(command = hook.raw(), ?argv, "Running edit hook");

    match executor.execute(&argv) {
        Ok(output) if output.success() => Ok(()),
        Ok(output) => Err(HookError::Status {
            argv,
            status: output.status,
        }),
        Err(source) => Err(HookError::Spawn { argv, source }),
    }
}

/// Run every hook in order, logging failures as warnings
///
/// Returns the number of hooks that failed.
pub fn run_hooks(
    executor: &mut dyn CommandExecutor,
    hooks: &[HookCommand],
    path: &Path,
    phase: HookPhase,
) -> usize {
    let mut failures = 0;
    for hook in hooks {
        if let Err(e) = run_hook(executor, hook, path) {
            warn!("{phase} hook {:?} failed ({e})", hook.raw());
            failures += 1;
        }
    }
    failures
}
