//! # Exemplar Core
//!
//! Example-based refactoring of Rust sources, including:
//! - Syntax trees and span edits over tree-sitter
//! - Source loading into directory packages with declaration tables
//! - Template compilation and before/after rewriting
//! - The driver pipeline: template location, per-file rewriting, output and
//!   edit hooks
//!
//! The `exemplar` binary is a thin layer over [`Pipeline`]; every collaborator
//! the pipeline talks to sits behind a trait so it can be swapped in tests.

#![warn(clippy::all)]

use std::path::PathBuf;

pub mod driver;
pub mod loader;
pub mod rewrite;
pub mod syntax;

// Re-export commonly used types
pub use driver::{
    hooks::{CommandExecutor, CommandOutput, HookCommand, ProcessExecutor},
    locator::{locate_template, Template},
    output::{DiskSink, EditOutcome, FileSink, OutputMode},
    Pipeline, RunSummary,
};
pub use loader::{FsLoader, LoadError, Package, PackageId, SourceLoader, TypeInfo};
pub use rewrite::{
    ExampleTransformer, ExampleTransformerFactory, MatchStats, TemplateError, Transformer,
    TransformerFactory,
};
pub use syntax::{Edit, EditError, SourceFile};

/// Exemplar version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the exemplar crates
///
/// Logs go to stderr so that print mode keeps stdout for rewritten sources.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // A second initialisation (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Run configuration, populated once before the pipeline starts
#[derive(Debug, Clone, Default)]
pub struct ExemplarConfig {
    /// Template file declaring `before` and `after`
    pub template: Option<PathBuf>,
    /// Target patterns forwarded to the source loader
    pub targets: Vec<String>,
    /// Rewrite files in place instead of printing them
    pub write: bool,
    /// Verbose matcher diagnostics
    pub verbose: bool,
    /// Commands run before each file is written, in order
    pub before_edit: Vec<String>,
    /// Commands run after each file is written, in order
    pub after_edit: Vec<String>,
    /// Enabled `feature = "..."` tags for file-level cfg attributes
    pub tags: Vec<String>,
}

impl ExemplarConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn write(mut self, enabled: bool) -> Self {
        self.write = enabled;
        self
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    pub fn before_edit(mut self, command: impl Into<String>) -> Self {
        self.before_edit.push(command.into());
        self
    }

    pub fn after_edit(mut self, command: impl Into<String>) -> Self {
        self.after_edit.push(command.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.write {
            OutputMode::Write
        } else {
            OutputMode::Print
        }
    }
}

/// Run-aborting errors
#[derive(thiserror::Error, Debug)]
pub enum ExemplarError {
    /// No template flag was given
    #[error("no -t template file specified")]
    NoTemplate,

    /// The template path could not be resolved to a file
    #[error("unable to resolve template path {path}: {source}")]
    TemplatePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No loaded package contains the template
    #[error("didn't find template {path} among the loaded packages")]
    TemplateNotFound { path: PathBuf },

    /// The template does not declare a usable before/after pair
    #[error("malformed template: {0}")]
    Template(#[from] TemplateError),

    /// Source loading failed
    #[error("load: {0}")]
    Load(#[from] LoadError),

    /// Output stream error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for exemplar core operations
pub type Result<T> = std::result::Result<T, ExemplarError>;
