/*!
# Pipeline Integration Tests

End-to-end runs over real directories: loading, template exclusion,
rewriting, printing and writing.
*/

use exemplar_core::{EditOutcome, ExemplarConfig, ExemplarError, Pipeline};
use pretty_assertions::assert_eq;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const TEMPLATE: &str = "\
// Swap the argument order of the error helper.
fn before(err: Error, s: &str) -> Error { wrap(err, s) }
fn after(err: Error, s: &str) -> Error { new_err(s, err) }
";

const TARGET: &str = "\
pub fn handle(e: Error) -> Error {
    wrap(e, \"msg\")
}
";

const REWRITTEN: &str = "\
pub fn handle(e: Error) -> Error {
    new_err(\"msg\", e)
}
";

struct Workspace {
    root: tempfile::TempDir,
}

impl Workspace {
    fn new() -> anyhow::Result<Self> {
        let root = tempfile::tempdir()?;
        let ws = Self { root };
        ws.write("tmpl/template.rs", TEMPLATE)?;
        ws.write("app/handler.rs", TARGET)?;
        ws.write("app/untouched.rs", "pub fn noop() {}\n")?;
        Ok(ws)
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    fn write(&self, relative: &str, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn read(&self, relative: &str) -> anyhow::Result<String> {
        Ok(fs::read_to_string(self.path(relative))?)
    }

    fn config(&self, targets: &[&str]) -> ExemplarConfig {
        ExemplarConfig::new()
            .with_template(self.path("tmpl/template.rs"))
            .with_targets(targets.iter().map(|t| pattern(&self.path(t))))
    }
}

fn pattern(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_print_mode_leaves_files_alone() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let mut out = Vec::new();

    let summary = Pipeline::new(ws.config(&["app"])).run(&mut out)?;

    assert_eq!(String::from_utf8(out)?, REWRITTEN);
    assert_eq!(summary.files_visited, 2);
    assert_eq!(summary.files_matched, 1);
    assert_eq!(summary.total_matches, 1);
    let outcomes: Vec<_> = summary
        .outcomes
        .iter()
        .map(|(path, outcome)| (path.file_name().and_then(|n| n.to_str()), outcome.clone()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (Some("handler.rs"), EditOutcome::Printed),
            (Some("untouched.rs"), EditOutcome::Skipped),
        ]
    );
    assert_eq!(ws.read("app/handler.rs")?, TARGET);
    Ok(())
}

#[test]
fn test_write_mode_rewrites_in_place() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let mut out = Vec::new();

    let summary = Pipeline::new(ws.config(&["app"]).write(true)).run(&mut out)?;

    assert!(out.is_empty());
    assert!(!summary.had_errors());
    assert_eq!(summary.written().count(), 1);
    assert_eq!(ws.read("app/handler.rs")?, REWRITTEN);
    assert_eq!(ws.read("app/untouched.rs")?, "pub fn noop() {}\n");
    assert_eq!(ws.read("tmpl/template.rs")?, TEMPLATE);
    Ok(())
}

#[test]
fn test_rerun_over_nested_sites_is_a_no_op() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    ws.write(
        "app/handler.rs",
        "pub fn handle(e: Error) -> Error {\n    wrap(wrap(e, \"inner\"), \"outer\")\n}\n",
    )?;

    let first = Pipeline::new(ws.config(&["app"]).write(true)).run(&mut io::sink())?;
    let after_first = ws.read("app/handler.rs")?;
    let second = Pipeline::new(ws.config(&["app"]).write(true)).run(&mut io::sink())?;

    assert_eq!(first.total_matches, 2);
    assert_eq!(
        after_first,
        "pub fn handle(e: Error) -> Error {\n    new_err(\"outer\", new_err(\"inner\", e))\n}\n"
    );
    assert_eq!(second.total_matches, 0);
    assert_eq!(second.written().count(), 0);
    assert_eq!(ws.read("app/handler.rs")?, after_first);
    Ok(())
}

#[test]
fn test_template_package_is_never_rewritten() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    ws.write("tmpl/helpers.rs", TARGET)?;
    let root = format!("{}/...", pattern(ws.root.path()));
    let config = ws.config(&["tmpl"]).with_targets([root]).write(true);

    let summary = Pipeline::new(config).run(&mut io::sink())?;

    assert_eq!(summary.files_matched, 1);
    assert_eq!(ws.read("tmpl/helpers.rs")?, TARGET);
    assert_eq!(ws.read("tmpl/template.rs")?, TEMPLATE);
    assert_eq!(ws.read("app/handler.rs")?, REWRITTEN);
    Ok(())
}

#[test]
fn test_zero_matches_produce_no_output() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let mut out = Vec::new();

    let summary = Pipeline::new(ws.config(&["tmpl"])).run(&mut out)?;

    assert!(out.is_empty());
    assert_eq!(summary.packages_visited, 0);
    assert!(summary.outcomes.is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_hooks_run_around_writes() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let config = ws
        .config(&["app"])
        .write(true)
        .before_edit("cp {} {}.orig")
        .before_edit("exemplar-no-such-program {}")
        .after_edit("cp {} {}.new");

    let summary = Pipeline::new(config).run(&mut io::sink())?;

    assert!(!summary.had_errors());
    assert_eq!(ws.read("app/handler.rs.orig")?, TARGET);
    assert_eq!(ws.read("app/handler.rs.new")?, REWRITTEN);
    assert!(!ws.path("app/untouched.rs.orig").exists());
    Ok(())
}

#[test]
fn test_missing_template_flag_is_fatal() {
    let err = Pipeline::new(ExemplarConfig::new().with_targets(["."]))
        .run(&mut io::sink())
        .unwrap_err();
    assert!(matches!(err, ExemplarError::NoTemplate));
    assert_eq!(err.to_string(), "no -t template file specified");
}

#[test]
fn test_unresolvable_template_is_fatal() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let config = ExemplarConfig::new()
        .with_template(ws.path("tmpl/missing.rs"))
        .with_targets([pattern(&ws.path("app"))]);

    let err = Pipeline::new(config).run(&mut io::sink()).unwrap_err();

    assert!(matches!(err, ExemplarError::TemplatePath { .. }));
    Ok(())
}

#[test]
fn test_malformed_template_is_fatal_before_any_write() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    ws.write("tmpl/template.rs", "fn after(err: Error) -> Error { err }\n")?;

    let err = Pipeline::new(ws.config(&["app"]).write(true))
        .run(&mut io::sink())
        .unwrap_err();

    assert!(matches!(err, ExemplarError::Template(_)));
    assert_eq!(ws.read("app/handler.rs")?, TARGET);
    Ok(())
}

#[test]
fn test_unloadable_target_is_fatal() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    let err = Pipeline::new(ws.config(&["nowhere/..."]))
        .run(&mut io::sink())
        .unwrap_err();

    assert!(matches!(err, ExemplarError::Load(_)));
    Ok(())
}

#[test]
fn test_syntax_errors_abort_loading() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    ws.write("app/broken.rs", "fn broken( {\n")?;

    let err = Pipeline::new(ws.config(&["app"]).write(true))
        .run(&mut io::sink())
        .unwrap_err();

    assert!(matches!(err, ExemplarError::Load(_)));
    assert_eq!(ws.read("app/handler.rs")?, TARGET);
    Ok(())
}
