// Syntax layer - Rust sources parsed with tree-sitter
use std::fmt;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Tree};

pub mod edit;

pub use edit::{apply_edits, Edit, EditError};

/// Parsing and re-parsing errors
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// The Rust grammar could not be loaded into the parser
    #[error("failed to load the Rust grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// tree-sitter returned no tree
    #[error("parser produced no tree for {0}")]
    NoTree(PathBuf),

    /// An in-place edit could not be applied
    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Thin wrapper over a tree-sitter parser configured for Rust
pub struct RustParser {
    parser: tree_sitter::Parser,
}

impl RustParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_rust::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    /// Parse `source`; syntax errors are recorded in the tree, not returned
    pub fn parse(&mut self, path: &Path, source: &str) -> Result<Tree, ParseError> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| ParseError::NoTree(path.to_path_buf()))
    }
}

/// A syntax error located in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub path: PathBuf,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path.display(),
            self.line,
            self.column,
            self.message
        )
    }
}

/// One parsed Rust file: its path, current text and syntax tree
///
/// The tree always describes `source`; every mutation goes through
/// [`SourceFile::apply_edits`], which re-parses.
#[derive(Clone)]
pub struct SourceFile {
    path: PathBuf,
    source: String,
    tree: Tree,
}

impl SourceFile {
    pub fn parse(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self, ParseError> {
        let path = path.into();
        let source = source.into();
        let tree = RustParser::new()?.parse(&path, &source)?;
        Ok(Self { path, source, tree })
    }

    pub fn read(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        let source = std::fs::read_to_string(&path)?;
        Self::parse(path, source).map_err(std::io::Error::other)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`
    pub fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }

    /// Every ERROR or MISSING node in the tree
    pub fn syntax_errors(&self) -> Vec<SyntaxError> {
        let mut errors = Vec::new();
        if self.root().has_error() {
            self.collect_errors(self.root(), &mut errors);
        }
        errors
    }

    fn collect_errors(&self, node: Node<'_>, errors: &mut Vec<SyntaxError>) {
        if node.is_error() || node.is_missing() {
            let position = node.start_position();
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "syntax error".to_string()
            };
            errors.push(SyntaxError {
                path: self.path.clone(),
                line: position.row + 1,
                column: position.column + 1,
                message,
            });
            return;
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.has_error() || child.is_missing() {
                self.collect_errors(child, errors);
            }
        }
    }

    /// Replace spans of the source in place and re-parse
    pub fn apply_edits(&mut self, edits: &[Edit]) -> Result<(), ParseError> {
        if edits.is_empty() {
            return Ok(());
        }
        let source = apply_edits(&self.source, edits)?;
        self.tree = RustParser::new()?.parse(&self.path, &source)?;
        self.source = source;
        Ok(())
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("len", &self.source.len())
            .finish()
    }
}

/// Comments never take part in structural comparison
pub fn is_comment(node: Node<'_>) -> bool {
    node.is_extra() || matches!(node.kind(), "line_comment" | "block_comment")
}

/// Children of `node` that carry structure (comments dropped)
pub fn structural_children<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| !is_comment(*child))
        .collect()
}
