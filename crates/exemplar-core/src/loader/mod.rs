/*!
# Source Loader

Turns a template path and a list of target patterns into packages: one
package per directory of `.rs` files, each with its parsed files and a table
of its top-level declarations.

The template's package is always loaded first so that later stages can find
it, and every package is loaded at most once however many patterns name it.
*/

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

pub mod patterns;
pub mod types;

pub use patterns::{split_tags, TargetPattern};
pub use types::{normalize_type, Declaration, Param, TypeInfo};

use crate::syntax::SourceFile;

/// Source loading errors
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// A target pattern named no Rust sources
    #[error("no Rust sources match pattern `{pattern}`")]
    NoMatch { pattern: String },

    /// Reading a directory or file failed
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed
    #[error("walking target directories: {0}")]
    Walk(#[from] walkdir::Error),

    /// Loaded files contain syntax errors
    #[error("error loading packages ({count} syntax errors)")]
    Syntax { count: usize },
}

/// Identity of a package: its canonical directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(PathBuf);

impl PackageId {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self(dir.into())
    }

    pub fn dir(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A loaded package: parsed files in name order plus their declarations
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    pub files: Vec<SourceFile>,
    pub types: TypeInfo,
}

impl Package {
    pub fn new(id: PackageId, files: Vec<SourceFile>) -> Self {
        let types = TypeInfo::from_files(&files);
        Self { id, files, types }
    }

    pub fn file_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(SourceFile::path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.file_paths().any(|file| file == path)
    }
}

/// Loads and parses every package reachable from the template and targets
pub trait SourceLoader {
    fn load(&self, template: &Path, patterns: &[String]) -> Result<Vec<Package>, LoadError>;
}

/// Filesystem loader over tree-sitter
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    tags: Vec<String>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build tags enabling `#![cfg(feature = "...")]` files
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    fn load_package(&self, dir: &Path) -> Result<Package, LoadError> {
        let mut files = Vec::new();
        for path in patterns::rust_files(dir)? {
            let path = patterns::canonical(&path)?;
            let file = SourceFile::read(&path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            if patterns::file_enabled(&file, &self.tags) {
                files.push(file);
            } else {
                debug!(file = %path.display(), "Skipping file excluded by build tags");
            }
        }
        Ok(Package::new(PackageId::new(dir), files))
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, template: &Path, patterns: &[String]) -> Result<Vec<Package>, LoadError> {
        let template_dir = template
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| LoadError::NoMatch {
                pattern: template.display().to_string(),
            })?;

        let mut dirs = vec![patterns::canonical(&template_dir)?];
        for pattern in patterns {
            for dir in TargetPattern::parse(pattern).package_dirs(pattern)? {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }

        let packages = dirs
            .iter()
            .map(|dir| self.load_package(dir))
            .collect::<Result<Vec<_>, _>>()?;

        let mut count = 0;
        for package in &packages {
            for file in &package.files {
                for syntax_error in file.syntax_errors() {
                    error!("{syntax_error}");
                    count += 1;
                }
            }
        }
        if count > 0 {
            return Err(LoadError::Syntax { count });
        }

        debug!(packages = packages.len(), "Loaded packages");
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_template_package_first_and_deduplicated() {
        let root = tempfile::tempdir().unwrap();
        let template = write(root.path(), "tmpl/template.rs", "fn before() {}\n");
        write(root.path(), "app/b.rs", "fn b() {}\n");
        write(root.path(), "app/a.rs", "fn a() {}\n");

        let patterns = vec![
            root.path().join("app").display().to_string(),
            root.path().join("app/a.rs").display().to_string(),
            root.path().join("tmpl").display().to_string(),
        ];
        let packages = FsLoader::new()
            .load(&template.canonicalize().unwrap(), &patterns)
            .unwrap();

        assert_eq!(packages.len(), 2);
        assert!(packages[0].contains(&template.canonicalize().unwrap()));
        let names: Vec<_> = packages[1]
            .file_paths()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_recursive_pattern_skips_target_and_hidden() {
        let root = tempfile::tempdir().unwrap();
        let template = write(root.path(), "tmpl/template.rs", "fn before() {}\n");
        write(root.path(), "src/lib.rs", "fn a() {}\n");
        write(root.path(), "src/nested/mod.rs", "fn b() {}\n");
        write(root.path(), "src/target/gen.rs", "fn c() {}\n");
        write(root.path(), "src/.hidden/x.rs", "fn d() {}\n");

        let pattern = format!("{}/...", root.path().join("src").display());
        let packages = FsLoader::new()
            .load(&template.canonicalize().unwrap(), &[pattern])
            .unwrap();

        let dirs: Vec<_> = packages[1..]
            .iter()
            .map(|p| p.id.dir().file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(dirs, vec!["src", "nested"]);
    }

    #[test]
    fn test_unmatched_pattern_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let template = write(root.path(), "tmpl/template.rs", "fn before() {}\n");

        let missing = root.path().join("nowhere").display().to_string();
        let err = FsLoader::new()
            .load(&template.canonicalize().unwrap(), &[missing])
            .unwrap_err();
        assert!(matches!(err, LoadError::NoMatch { .. }));
    }

    #[test]
    fn test_syntax_errors_fail_the_load() {
        let root = tempfile::tempdir().unwrap();
        let template = write(root.path(), "tmpl/template.rs", "fn before() {}\n");
        write(root.path(), "app/broken.rs", "fn broken( {\n");

        let pattern = root.path().join("app").display().to_string();
        let err = FsLoader::new()
            .load(&template.canonicalize().unwrap(), &[pattern])
            .unwrap_err();
        assert!(matches!(err, LoadError::Syntax { count } if count > 0));
    }

    #[test]
    fn test_tags_filter_files() {
        let root = tempfile::tempdir().unwrap();
        let template = write(root.path(), "tmpl/template.rs", "fn before() {}\n");
        write(root.path(), "app/plain.rs", "fn a() {}\n");
        write(
            root.path(),
            "app/fast.rs",
            "#![cfg(feature = \"fast\")]\nconst SPEED: u32 = 9;\n",
        );

        let pattern = root.path().join("app").display().to_string();
        let template = template.canonicalize().unwrap();

        let without = FsLoader::new().load(&template, &[pattern.clone()]).unwrap();
        assert_eq!(without[1].files.len(), 1);
        assert_eq!(without[1].types.value_type("SPEED"), None);

        let with = FsLoader::new()
            .with_tags(vec!["fast".to_string()])
            .load(&template, &[pattern])
            .unwrap();
        assert_eq!(with[1].files.len(), 2);
        assert_eq!(with[1].types.value_type("SPEED"), Some("u32"));
    }
}
