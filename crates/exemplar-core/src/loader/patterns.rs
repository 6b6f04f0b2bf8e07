/*!
# Target Patterns

Resolution of command-line target patterns to package directories, and the
file-level `cfg` filter driven by build tags.
*/

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

use super::LoadError;
use crate::syntax::SourceFile;

/// Suffix marking a recursive pattern, as in `src/...`
pub const RECURSIVE_SUFFIX: &str = "...";

/// A parsed target pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPattern {
    /// `dir/...`: every package at or below `dir`
    Recursive(PathBuf),
    /// A directory or a file; names the package of that directory
    Path(PathBuf),
}

impl TargetPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix(RECURSIVE_SUFFIX) {
            Some(root) => {
                let root = root.trim_end_matches(['/', '\\']);
                let root = if root.is_empty() { "." } else { root };
                TargetPattern::Recursive(PathBuf::from(root))
            }
            None => TargetPattern::Path(PathBuf::from(pattern)),
        }
    }

    /// Canonical package directories named by this pattern, in visit order
    pub fn package_dirs(&self, original: &str) -> Result<Vec<PathBuf>, LoadError> {
        let no_match = || LoadError::NoMatch {
            pattern: original.to_string(),
        };

        match self {
            TargetPattern::Recursive(root) => {
                if !root.is_dir() {
                    return Err(no_match());
                }
                let mut dirs = Vec::new();
                let walker = WalkDir::new(root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry.path()));
                for entry in walker {
                    let entry = entry?;
                    if entry.file_type().is_dir() && !rust_files(entry.path())?.is_empty() {
                        dirs.push(canonical(entry.path())?);
                    }
                }
                if dirs.is_empty() {
                    return Err(no_match());
                }
                Ok(dirs)
            }
            TargetPattern::Path(path) => {
                if path.is_dir() {
                    if rust_files(path)?.is_empty() {
                        return Err(no_match());
                    }
                    Ok(vec![canonical(path)?])
                } else if path.is_file() && is_rust_file(path) {
                    let file = canonical(path)?;
                    let dir = file.parent().map(Path::to_path_buf).ok_or_else(no_match)?;
                    Ok(vec![dir])
                } else {
                    Err(no_match())
                }
            }
        }
    }
}

/// `.rs` files directly inside `dir`, sorted by name
pub fn rust_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| LoadError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() && is_rust_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn canonical(path: &Path) -> Result<PathBuf, LoadError> {
    path.canonicalize().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_rust_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rs")
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == "target" || name.starts_with('.'))
}

fn cfg_feature_regex() -> &'static Regex {
    static CFG_FEATURE: OnceLock<Regex> = OnceLock::new();
    CFG_FEATURE.get_or_init(|| {
        Regex::new(r#"^#!\[cfg\((not\()?feature\s*=\s*"([^"]+)"\)?\)\]$"#)
            .expect("cfg feature pattern is valid")
    })
}

/// Whether a file survives the build tags
///
/// Only leading inner attributes of the form `#![cfg(feature = "x")]` and
/// `#![cfg(not(feature = "x"))]` are honoured; anything else is loaded.
pub fn file_enabled(file: &SourceFile, tags: &[String]) -> bool {
    let root = file.root();
    let mut cursor = root.walk();
    for item in root.named_children(&mut cursor) {
        if crate::syntax::is_comment(item) {
            continue;
        }
        if item.kind() != "inner_attribute_item" {
            break;
        }

        let compact: String = file.text(item).split_whitespace().collect();
        let Some(captures) = cfg_feature_regex().captures(&compact) else {
            continue;
        };
        let negated = captures.get(1).is_some();
        let enabled = tags.iter().any(|tag| tag == &captures[2]);
        if enabled == negated {
            return false;
        }
    }
    true
}

/// Split a `-tags` value on spaces and commas
pub fn split_tags(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
