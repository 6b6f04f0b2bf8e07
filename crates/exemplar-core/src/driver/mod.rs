/*!
# Driver

Batch orchestration of one refactoring run:

1. Load the template's package and every target package
2. Locate the template and take its package out of the working set
3. Build a transformer from the template
4. Rewrite each file of each remaining package, in load order
5. Print or write every file that changed, running edit hooks around writes

Fatal problems (no template, unloadable sources, a malformed template) abort
the run before any file is touched. Per-file write failures are collected in
the [`RunSummary`] and the run continues.

## Example Usage

```rust,ignore
use exemplar_core::{ExemplarConfig, Pipeline};

let config = ExemplarConfig::new()
    .with_template("refactor/template.rs")
    .with_targets(["src/..."])
    .write(true);
let summary = Pipeline::new(config).run(&mut std::io::stdout())?;
if summary.had_errors() {
    std::process::exit(1);
}
```
*/

use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info};

pub mod hooks;
pub mod locator;
pub mod output;

use self::hooks::{CommandExecutor, ProcessExecutor};
use self::locator::locate_template;
use self::output::{DiskSink, EditOutcome, FileSink, OutputStage};
use crate::loader::{FsLoader, SourceLoader};
use crate::rewrite::{ExampleTransformerFactory, MatchStats, TransformerFactory};
use crate::{ExemplarConfig, ExemplarError, Result};

/// Totals for one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub packages_visited: usize,
    pub files_visited: usize,
    /// Files with at least one rewritten site
    pub files_matched: usize,
    pub total_matches: usize,
    /// Per visited file, in visit order
    pub outcomes: Vec<(PathBuf, EditOutcome)>,
    /// Non-fatal errors; any entry makes the run fail
    pub errors: Vec<String>,
    pub stats: MatchStats,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn had_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn record(&mut self, path: PathBuf, matches: usize, outcome: EditOutcome) {
        if outcome != EditOutcome::Skipped {
            self.files_matched += 1;
        }
        self.total_matches += matches;
        if let EditOutcome::WriteFailed(message) = &outcome {
            self.errors.push(message.clone());
        }
        self.outcomes.push((path, outcome));
    }

    /// One-line account of the run for the log
    pub fn report(&self) -> String {
        format!(
            "{} of {} files changed, {} matches; {} candidates, {} type rejections, \
             match rate {:.1}%",
            self.files_matched,
            self.files_visited,
            self.total_matches,
            self.stats.candidates,
            self.stats.type_rejections,
            self.stats.match_rate() * 100.0
        )
    }

    /// Paths of files persisted in write mode
    pub fn written(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == EditOutcome::Written)
            .map(|(path, _)| path)
    }
}

/// One configured refactoring run and its collaborators
pub struct Pipeline {
    config: ExemplarConfig,
    loader: Box<dyn SourceLoader>,
    factory: Box<dyn TransformerFactory>,
    output: OutputStage,
}

impl Pipeline {
    /// Pipeline over the filesystem, the example transformer and real processes
    pub fn new(config: ExemplarConfig) -> Self {
        let loader = FsLoader::new().with_tags(config.tags.clone());
        let output = OutputStage::new(
            config.output_mode(),
            Box::new(ProcessExecutor),
            Box::new(DiskSink),
        )
        .with_hooks(&config.before_edit, &config.after_edit);

        Self {
            config,
            loader: Box::new(loader),
            factory: Box::new(ExampleTransformerFactory),
            output,
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn SourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_factory(mut self, factory: Box<dyn TransformerFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_executor(mut self, executor: Box<dyn CommandExecutor>) -> Self {
        self.output.set_executor(executor);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn FileSink>) -> Self {
        self.output.set_sink(sink);
        self
    }

    pub fn config(&self) -> &ExemplarConfig {
        &self.config
    }

    /// Run to completion, printing rewritten files to `out` in print mode
    pub fn run(&mut self, out: &mut dyn Write) -> Result<RunSummary> {
        let template_path = self
            .config
            .template
            .as_ref()
            .ok_or(ExemplarError::NoTemplate)?;
        let template_path =
            template_path
                .canonicalize()
                .map_err(|source| ExemplarError::TemplatePath {
                    path: template_path.clone(),
                    source,
                })?;

        let packages = self.loader.load(&template_path, &self.config.targets)?;
        let (template, packages) = locate_template(packages, &template_path)?;
        let mut transformer =
            self.factory
                .build(template.file(), &template.package.types, self.config.verbose)?;

        info!("visiting {} packages", packages.len());
        let mut summary = RunSummary::new();

        for mut package in packages {
            summary.packages_visited += 1;
            debug!(package = %package.id, files = package.files.len(), "Visiting package");

            for file in &mut package.files {
                summary.files_visited += 1;
                let matches = transformer.transform(&package.types, &package.id, file);
                if matches == 0 {
                    summary.record(file.path().to_path_buf(), 0, EditOutcome::Skipped);
                    continue;
                }

                info!("=== {} ({} matches)", file.path().display(), matches);
                let outcome = self.output.emit(file, out)?;
                summary.record(file.path().to_path_buf(), matches, outcome);
            }
        }

        summary.stats = transformer.stats();
        debug!(
            files = summary.files_visited,
            matched = summary.files_matched,
            matches = summary.total_matches,
            errors = summary.errors.len(),
            "Run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io;
    use std::path::Path;
    use std::rc::Rc;

    use crate::driver::hooks::CommandOutput;
    use crate::loader::{LoadError, Package, PackageId};
    use crate::syntax::SourceFile;

    const TEMPLATE: &str = "\
fn before(x: u32) -> u32 { double(x) }
fn after(x: u32) -> u32 { x * 2 }
";

    /// Serves fixed packages; the template package is rebuilt around the
    /// canonical template path the pipeline passes in
    struct FixedLoader {
        targets: Vec<Package>,
    }

    impl SourceLoader for FixedLoader {
        fn load(
            &self,
            template: &Path,
            _patterns: &[String],
        ) -> std::result::Result<Vec<Package>, LoadError> {
            let dir = template.parent().unwrap();
            let file = SourceFile::parse(template, TEMPLATE).unwrap();
            let mut packages = vec![Package::new(PackageId::new(dir), vec![file])];
            packages.extend(self.targets.iter().cloned());
            Ok(packages)
        }
    }

    type Journal = Rc<RefCell<Vec<String>>>;

    struct JournalExecutor(Journal);

    impl CommandExecutor for JournalExecutor {
        fn execute(&mut self, argv: &[String]) -> io::Result<CommandOutput> {
            self.0.borrow_mut().push(argv.join(" "));
            Ok(CommandOutput::exited(0))
        }
    }

    struct JournalSink(Journal, Vec<&'static str>);

    impl FileSink for JournalSink {
        fn write(&mut self, path: &Path, _contents: &str) -> io::Result<()> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.0.borrow_mut().push(format!("<write {name}>"));
            if self.1.contains(&name.as_str()) {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
            } else {
                Ok(())
            }
        }
    }

    fn target(dir: &str, files: &[(&str, &str)]) -> Package {
        let files = files
            .iter()
            .map(|(name, source)| SourceFile::parse(format!("{dir}/{name}"), *source).unwrap())
            .collect();
        Package::new(PackageId::new(dir), files)
    }

    fn pipeline(
        config: ExemplarConfig,
        targets: Vec<Package>,
        journal: &Journal,
        failing: Vec<&'static str>,
    ) -> Pipeline {
        Pipeline::new(config)
            .with_loader(Box::new(FixedLoader { targets }))
            .with_executor(Box::new(JournalExecutor(journal.clone())))
            .with_sink(Box::new(JournalSink(journal.clone(), failing)))
    }

    fn template_file() -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(".rs").tempfile().unwrap()
    }

    #[test]
    fn test_missing_template_flag() {
        let journal = Journal::default();
        let mut pipeline = pipeline(ExemplarConfig::new(), Vec::new(), &journal, Vec::new());
        let err = pipeline.run(&mut io::sink()).unwrap_err();
        assert!(matches!(err, ExemplarError::NoTemplate));
    }

    #[test]
    fn test_print_mode_prints_only_matched_files() {
        let template = template_file();
        let journal = Journal::default();
        let targets = vec![
            target(
                "/a",
                &[
                    ("one.rs", "fn f(n: u32) -> u32 { double(n) }\n"),
                    ("two.rs", "fn g() {}\n"),
                ],
            ),
            target("/b", &[("three.rs", "fn h(n: u32) -> u32 { double(n) + double(1) }\n")]),
        ];
        let config = ExemplarConfig::new().with_template(template.path());
        let mut out = Vec::new();

        let summary = pipeline(config, targets, &journal, Vec::new()).run(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "fn f(n: u32) -> u32 { n * 2 }\nfn h(n: u32) -> u32 { (n * 2) + (1 * 2) }\n"
        );
        assert_eq!(summary.packages_visited, 2);
        assert_eq!(summary.files_visited, 3);
        assert_eq!(summary.files_matched, 2);
        assert_eq!(summary.total_matches, 3);
        assert!(!summary.had_errors());
        assert!(journal.borrow().is_empty());
        assert_eq!(summary.stats.matches, 3);
        assert_eq!(summary.stats.files_changed, 2);
        assert_eq!(
            summary.report(),
            format!(
                "2 of 3 files changed, 3 matches; {} candidates, 0 type rejections, \
                 match rate {:.1}%",
                summary.stats.candidates,
                summary.stats.match_rate() * 100.0
            )
        );
    }

    #[test]
    fn test_report_counts_skipped_files() {
        let mut summary = RunSummary::new();
        summary.files_visited = 2;
        summary.record(PathBuf::from("/a/one.rs"), 0, EditOutcome::Skipped);
        summary.record(PathBuf::from("/a/two.rs"), 3, EditOutcome::Written);
        summary.stats = MatchStats {
            candidates: 4,
            matches: 3,
            type_rejections: 1,
            files_changed: 1,
        };

        assert_eq!(summary.files_matched, 1);
        assert_eq!(
            summary.report(),
            "1 of 2 files changed, 3 matches; 4 candidates, 1 type rejections, match rate 75.0%"
        );
    }

    #[test]
    fn test_write_failure_is_recorded_and_run_continues() {
        let template = template_file();
        let journal = Journal::default();
        let targets = vec![target(
            "/a",
            &[
                ("bad.rs", "fn f(n: u32) -> u32 { double(n) }\n"),
                ("good.rs", "fn g(n: u32) -> u32 { double(n) }\n"),
            ],
        )];
        let config = ExemplarConfig::new()
            .with_template(template.path())
            .write(true)
            .before_edit("chmod +w {}")
            .after_edit("fmt {}");

        let summary = pipeline(config, targets, &journal, vec!["bad.rs"])
            .run(&mut io::sink())
            .unwrap();

        assert!(summary.had_errors());
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.written().count(), 1);
        assert_eq!(
            *journal.borrow(),
            vec![
                "chmod +w /a/bad.rs",
                "<write bad.rs>",
                "chmod +w /a/good.rs",
                "<write good.rs>",
                "fmt /a/good.rs",
            ]
        );
    }

    #[test]
    fn test_no_matches_touch_nothing() {
        let template = template_file();
        let journal = Journal::default();
        let targets = vec![target("/a", &[("one.rs", "fn f() {}\n")])];
        let config = ExemplarConfig::new()
            .with_template(template.path())
            .write(true)
            .before_edit("chmod +w {}");

        let summary = pipeline(config, targets, &journal, Vec::new())
            .run(&mut io::sink())
            .unwrap();

        assert_eq!(summary.files_visited, 1);
        assert_eq!(summary.files_matched, 0);
        assert_eq!(
            summary.outcomes,
            vec![(PathBuf::from("/a/one.rs"), EditOutcome::Skipped)]
        );
        assert!(journal.borrow().is_empty());
    }
}
