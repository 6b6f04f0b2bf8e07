//! Output stage: what happens to a file once it has been rewritten.
//!
//! In print mode the new source goes to the output stream. In write mode the
//! file is persisted in place, flanked by the before-edit and after-edit
//! hooks. A failed write is recorded and the run moves on; hooks that fail
//! only produce warnings.

use std::io::{self, Write};
use std::path::Path;

use tracing::error;

use super::hooks::{run_hooks, CommandExecutor, HookCommand, HookPhase};
use crate::syntax::SourceFile;

/// Where rewritten files go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Render to the output stream, leave the filesystem alone
    #[default]
    Print,
    /// Persist in place, running hooks around the write
    Write,
}

/// Persists file contents
pub trait FileSink {
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Writes files to disk
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSink;

impl FileSink for DiskSink {
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// No matches; nothing was printed, written or run
    Skipped,
    Printed,
    Written,
    WriteFailed(String),
}

/// Print or persist matched files
pub struct OutputStage {
    mode: OutputMode,
    before_edit: Vec<HookCommand>,
    after_edit: Vec<HookCommand>,
    executor: Box<dyn CommandExecutor>,
    sink: Box<dyn FileSink>,
}

impl OutputStage {
    pub fn new(
        mode: OutputMode,
        executor: Box<dyn CommandExecutor>,
        sink: Box<dyn FileSink>,
    ) -> Self {
        Self {
            mode,
            before_edit: Vec::new(),
            after_edit: Vec::new(),
            executor,
            sink,
        }
    }

    /// Hook commands from configuration; blank ones are dropped
    pub fn with_hooks(mut self, before_edit: &[String], after_edit: &[String]) -> Self {
        self.before_edit = before_edit.iter().filter_map(|c| HookCommand::parse(c)).collect();
        self.after_edit = after_edit.iter().filter_map(|c| HookCommand::parse(c)).collect();
        self
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn set_executor(&mut self, executor: Box<dyn CommandExecutor>) {
        self.executor = executor;
    }

    pub fn set_sink(&mut self, sink: Box<dyn FileSink>) {
        self.sink = sink;
    }

    /// Handle one rewritten file
    ///
    /// Only a failure of the output stream itself is returned as an error;
    /// write failures are reported through the outcome.
    pub fn emit(&mut self, file: &SourceFile, out: &mut dyn Write) -> io::Result<EditOutcome> {
        match self.mode {
            OutputMode::Print => {
                out.write_all(file.source().as_bytes())?;
                Ok(EditOutcome::Printed)
            }
            OutputMode::Write => Ok(self.write_file(file)),
        }
    }

    fn write_file(&mut self, file: &SourceFile) -> EditOutcome {
        let path = file.path();

        run_hooks(self.executor.as_mut(), &self.before_edit, path, HookPhase::BeforeEdit);

        if let Err(e) = self.sink.write(path, file.source()) {
            let message = format!("{}: {e}", path.display());
            error!("{message}");
            return EditOutcome::WriteFailed(message);
        }

        run_hooks(self.executor.as_mut(), &self.after_edit, path, HookPhase::AfterEdit);
        EditOutcome::Written
    }
}
