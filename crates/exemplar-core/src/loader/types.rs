/*!
# Package Declarations

A lightweight stand-in for type information: the top-level items each package
declares, with the type text the source spells out for them. The rewriter
reads function signatures from here when compiling a template, and const and
static types when checking that a substitution is type-consistent.
*/

use std::collections::BTreeMap;

use tree_sitter::Node;

use crate::syntax::SourceFile;

/// A named, typed function parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

/// What a top-level name refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Function {
        /// Parameters in order; `None` for patterns that are not plain identifiers
        params: Vec<Option<Param>>,
        /// Raw text of every parameter, for diagnostics
        param_text: Vec<String>,
        /// Return type, `None` for unit
        ret: Option<String>,
    },
    Const { ty: String },
    Static { ty: String },
    Type,
}

/// Declarations of one package, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeInfo {
    declarations: BTreeMap<String, Declaration>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the top-level declarations of every file, first one wins
    pub fn from_files(files: &[SourceFile]) -> Self {
        let mut info = Self::new();
        for file in files {
            info.collect(file);
        }
        info
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declared type of a const or static
    pub fn value_type(&self, name: &str) -> Option<&str> {
        match self.declarations.get(name)? {
            Declaration::Const { ty } | Declaration::Static { ty } => Some(ty.as_str()),
            _ => None,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, declaration: Declaration) {
        self.declarations.entry(name.into()).or_insert(declaration);
    }

    fn collect(&mut self, file: &SourceFile) {
        let root = file.root();
        let mut cursor = root.walk();
        for item in root.named_children(&mut cursor) {
            if let Some((name, declaration)) = declaration_of(file, item) {
                self.insert(name, declaration);
            }
        }
    }
}

fn declaration_of(file: &SourceFile, item: Node<'_>) -> Option<(String, Declaration)> {
    let name = item.child_by_field_name("name").map(|n| file.text(n).to_string())?;
    let type_text = |field: &str| {
        item.child_by_field_name(field)
            .map(|n| normalize_type(file.text(n)))
    };

    let declaration = match item.kind() {
        "function_item" => {
            let mut params = Vec::new();
            let mut param_text = Vec::new();
            if let Some(list) = item.child_by_field_name("parameters") {
                let mut cursor = list.walk();
                for param in list.named_children(&mut cursor) {
                    if crate::syntax::is_comment(param) || param.kind() == "attribute_item" {
                        continue;
                    }
                    param_text.push(file.text(param).to_string());
                    params.push(plain_param(file, param));
                }
            }
            Declaration::Function {
                params,
                param_text,
                ret: type_text("return_type"),
            }
        }
        "const_item" => Declaration::Const {
            ty: type_text("type")?,
        },
        "static_item" => Declaration::Static {
            ty: type_text("type")?,
        },
        "struct_item" | "enum_item" | "union_item" | "type_item" | "trait_item" => {
            Declaration::Type
        }
        _ => return None,
    };

    Some((name, declaration))
}

fn plain_param(file: &SourceFile, param: Node<'_>) -> Option<Param> {
    if param.kind() != "parameter" {
        return None;
    }
    let pattern = param.child_by_field_name("pattern")?;
    if pattern.kind() != "identifier" {
        return None;
    }
    let ty = param.child_by_field_name("type")?;
    Some(Param {
        name: file.text(pattern).to_string(),
        ty: normalize_type(file.text(ty)),
    })
}

/// Canonical spelling of a type: whitespace kept only between two word
/// characters, `'static` on string slices dropped
pub fn normalize_type(text: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut compact = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && compact.chars().last().is_some_and(is_word) && is_word(c) {
            compact.push(' ');
        }
        pending_space = false;
        compact.push(c);
    }
    match compact.as_str() {
        "&'static str" => "&str".to_string(),
        _ => compact,
    }
}
