//! Exemplar CLI - command-line driver for example-based refactoring
//!
//! Parses the command line into an [`ExemplarConfig`], runs the
//! [`Pipeline`] and maps the outcome to a process exit status:
//! `0` on success, `1` on a fatal error or any failed write, `2` for help,
//! usage errors and a missing target list.

use std::io::Write;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use exemplar_core::{loader::split_tags, ExemplarConfig, Pipeline};
use tracing::{debug, info};

/// Flags also accepted with a single leading dash
const LONG_FLAGS: &[&str] = &["help", "beforeedit", "afteredit", "tags", "version"];

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

pub const USAGE: &str = concat!(
    "exemplar -t template.rs [-w] [-v] [-beforeedit cmd] [-afteredit cmd] ",
    "[-tags tags] pattern ..."
);

pub const HELP: &str = r#"exemplar rewrites Rust code by example.

The template file is a Rust source file declaring two functions, `before`
and `after`, with the same parameter types and the same result type:

    fn before(err: Error, msg: &str) -> Error { wrap(err, msg) }
    fn after(err: Error, msg: &str) -> Error { new_err(msg, err) }

Each body is a single expression (or a single expression statement). The
parameters of `before` are wildcards: any expression of a consistent type
matches them. Every match of the `before` body in the target packages is
replaced by the `after` body, with `after`'s parameters bound by position.

Targets are directories of .rs files, single .rs files (meaning their
directory), or `dir/...` for every directory below dir. The template's own
directory is never rewritten.

By default the rewritten files are printed to standard output. With -w they
are written back in place. -beforeedit and -afteredit name commands run
before and after each write; `{}` in any argument after the command name is
replaced by the file's path, so

    exemplar -w -afteredit 'rustfmt {}' -t tmpl/template.rs src/...

formats every rewritten file. Both flags may be repeated; hook failures are
reported but never stop the run.

Flags:
    -t FILE         template file (required)
    -w              write files in place instead of printing them
    -v              report candidates rejected by type checks
    -beforeedit CMD command run before each write
    -afteredit CMD  command run after each successful write
    -tags TAGS      enabled features for #![cfg(feature = "...")] files
    -help           show this help
"#;

/// Rewrite single-dash long flags (`-help`, `-afteredit=cmd`) to `--` form
///
/// Everything after a bare `--` is passed through untouched.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut passthrough = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || passthrough {
                return arg;
            }
            if arg == "--" {
                passthrough = true;
                return arg;
            }
            match arg.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split('=').next().unwrap_or(rest);
                    if LONG_FLAGS.contains(&name) {
                        format!("-{arg}")
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

pub fn build_command() -> Command {
    Command::new("exemplar")
        .version(exemplar_core::VERSION)
        .about("Example-based refactoring for Rust sources")
        .override_usage(USAGE)
        .disable_help_flag(true)
        .arg(
            Arg::new("template")
                .short('t')
                .value_name("FILE")
                .help("Template file declaring `before` and `after`"),
        )
        .arg(
            Arg::new("write")
                .short('w')
                .help("Write rewritten files in place")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .help("Verbose matcher diagnostics")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("beforeedit")
                .long("beforeedit")
                .value_name("CMD")
                .help("Command run before each write; {} is the file path")
                .allow_hyphen_values(true)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("afteredit")
                .long("afteredit")
                .value_name("CMD")
                .help("Command run after each write; {} is the file path")
                .allow_hyphen_values(true)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("tags")
                .long("tags")
                .value_name("TAGS")
                .help("Space or comma separated build features"),
        )
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .help("Show extended help")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("targets")
                .value_name("PATTERN")
                .help("Target packages: directories, .rs files or dir/...")
                .num_args(0..)
                .action(ArgAction::Append),
        )
}

pub fn config_from_matches(matches: &ArgMatches) -> ExemplarConfig {
    let strings = |id: &str| -> Vec<String> {
        matches
            .get_many::<String>(id)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    let mut config = ExemplarConfig::new()
        .with_targets(strings("targets"))
        .write(matches.get_flag("write"))
        .verbose(matches.get_flag("verbose"));
    if let Some(template) = matches.get_one::<String>("template") {
        config = config.with_template(template);
    }
    if let Some(tags) = matches.get_one::<String>("tags") {
        config = config.with_tags(split_tags(tags));
    }
    config.before_edit = strings("beforeedit");
    config.after_edit = strings("afteredit");
    config
}

/// Run the tool with `args` (program name first), returning the exit status
pub fn run<I>(args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = String>,
{
    let matches = match build_command().try_get_matches_from(normalize_args(args)) {
        Ok(matches) => matches,
        Err(e) => {
            let _ = if e.use_stderr() {
                write!(err, "{e}")
            } else {
                write!(out, "{e}")
            };
            return e.exit_code();
        }
    };

    if matches.get_flag("help") {
        let _ = writeln!(err, "usage: {USAGE}\n\n{HELP}");
        return EXIT_USAGE;
    }

    let config = config_from_matches(&matches);
    if config.targets.is_empty() {
        let _ = writeln!(err, "usage: {USAGE}\nRun 'exemplar -help' for details.");
        return EXIT_USAGE;
    }

    match execute(config, out) {
        Ok(code) => code,
        Err(e) => {
            let _ = writeln!(err, "exemplar: {e}");
            EXIT_FAILURE
        }
    }
}

fn execute(config: ExemplarConfig, out: &mut dyn Write) -> Result<i32> {
    debug!(?config, "Starting run");
    let summary = Pipeline::new(config).run(out)?;
    out.flush()?;
    info!("{}", summary.report());

    if summary.had_errors() {
        Ok(EXIT_FAILURE)
    } else {
        Ok(EXIT_OK)
    }
}
