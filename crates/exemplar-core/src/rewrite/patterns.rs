/*!
# Pattern Unification

Compiled `before` patterns and the unifier that matches them against target
syntax trees. Parameters of the template become wildcards; every other token
must match exactly. Matching is structural, so comments and whitespace in
the target never matter.
*/

use tree_sitter::Node;

use crate::loader::{Param, TypeInfo};
use crate::syntax::{structural_children, SourceFile};

/// A compiled pattern node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternNode {
    /// A template parameter, by position
    Wildcard(usize),
    /// A leaf token that must match kind and text
    Token { kind: &'static str, text: String },
    /// An interior node whose children must match pairwise
    Node {
        kind: &'static str,
        children: Vec<PatternNode>,
    },
}

impl PatternNode {
    /// Compile the subtree at `node`, turning identifiers named in `params`
    /// into wildcards
    pub fn compile(file: &SourceFile, node: Node<'_>, params: &[String]) -> Self {
        if let Some(index) = parameter_index(file, node, params) {
            return PatternNode::Wildcard(index);
        }

        let children = structural_children(node);
        if children.is_empty() {
            PatternNode::Token {
                kind: node.kind(),
                text: file.text(node).to_string(),
            }
        } else {
            PatternNode::Node {
                kind: node.kind(),
                children: children
                    .into_iter()
                    .map(|child| Self::compile(file, child, params))
                    .collect(),
            }
        }
    }

    /// Node kind a target must have to be worth unifying against
    pub fn root_kind(&self) -> Option<&'static str> {
        match self {
            PatternNode::Wildcard(_) => None,
            PatternNode::Token { kind, .. } | PatternNode::Node { kind, .. } => Some(*kind),
        }
    }
}

/// Position of `node` in `params` when it is a plain identifier naming one
///
/// Identifiers inside paths (`module::name`) are never parameters.
pub fn parameter_index(file: &SourceFile, node: Node<'_>, params: &[String]) -> Option<usize> {
    if node.kind() != "identifier" {
        return None;
    }
    let scoped = |parent: Node<'_>| {
        matches!(parent.kind(), "scoped_identifier" | "scoped_type_identifier")
    };
    if node.parent().is_some_and(scoped) {
        return None;
    }
    let text = file.text(node);
    params.iter().position(|param| param == text)
}

/// Wildcard bindings for one unification attempt
pub type Bindings<'tree> = Vec<Option<Node<'tree>>>;

/// Outcome of unifying a pattern with one target node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unification {
    Matched,
    NoMatch,
    /// Structure matched but a binding has the wrong type
    TypeRejected { param: String, reason: String },
}

/// Unify `pattern` with `node`, filling `bindings` on success
pub fn unify<'tree>(
    pattern: &PatternNode,
    node: Node<'tree>,
    file: &'tree SourceFile,
    params: &[Param],
    types: &TypeInfo,
    bindings: &mut Bindings<'tree>,
) -> Unification {
    bindings.clear();
    bindings.resize(params.len(), None);

    if !bind(pattern, node, file, bindings) {
        return Unification::NoMatch;
    }

    for (param, bound) in params.iter().zip(bindings.iter()) {
        if let Some(bound) = bound {
            if let Err(reason) = check_binding(param, *bound, file, types) {
                return Unification::TypeRejected {
                    param: param.name.clone(),
                    reason,
                };
            }
        }
    }

    Unification::Matched
}

fn bind<'tree>(
    pattern: &PatternNode,
    node: Node<'tree>,
    file: &'tree SourceFile,
    bindings: &mut Bindings<'tree>,
) -> bool {
    match pattern {
        PatternNode::Wildcard(index) => {
            if !node.is_named() {
                return false;
            }
            match bindings[*index] {
                Some(previous) => same_tree(previous, node, file),
                None => {
                    bindings[*index] = Some(node);
                    true
                }
            }
        }
        PatternNode::Token { kind, text } => {
            node.kind() == *kind
                && structural_children(node).is_empty()
                && file.text(node) == text
        }
        PatternNode::Node { kind, children } => {
            if node.kind() != *kind {
                return false;
            }
            let targets = structural_children(node);
            targets.len() == children.len()
                && children
                    .iter()
                    .zip(targets)
                    .all(|(child, target)| bind(child, target, file, bindings))
        }
    }
}

/// Structural equality of two target subtrees, ignoring comments and layout
pub fn same_tree(a: Node<'_>, b: Node<'_>, file: &SourceFile) -> bool {
    if a.kind() != b.kind() {
        return false;
    }
    let left = structural_children(a);
    let right = structural_children(b);
    if left.is_empty() && right.is_empty() {
        return file.text(a) == file.text(b);
    }
    left.len() == right.len()
        && left
            .into_iter()
            .zip(right)
            .all(|(l, r)| same_tree(l, r, file))
}

/// Primitive type families a literal can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Str,
    Char,
    Bool,
    Int,
    Float,
    /// Byte strings, C strings and the like
    Other,
}

const INT_TYPES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
];
const FLOAT_TYPES: &[&str] = &["f32", "f64"];

fn type_family(ty: &str) -> Option<Family> {
    if ty == "&str" || (ty.starts_with("&'") && ty.ends_with(" str")) {
        Some(Family::Str)
    } else if ty == "char" {
        Some(Family::Char)
    } else if ty == "bool" {
        Some(Family::Bool)
    } else if INT_TYPES.contains(&ty) {
        Some(Family::Int)
    } else if FLOAT_TYPES.contains(&ty) {
        Some(Family::Float)
    } else {
        None
    }
}

/// Family and explicit suffix of a literal node, `None` if not a literal
fn literal_family<'a>(kind: &str, text: &'a str) -> Option<(Family, Option<&'a str>)> {
    let suffix = |candidates: &[&'static str]| {
        candidates
            .iter()
            .find(|ty| text.ends_with(*ty))
            .map(|ty| &text[text.len() - ty.len()..])
    };

    match kind {
        "string_literal" | "raw_string_literal" => {
            if text.starts_with('"') || text.starts_with('r') {
                Some((Family::Str, None))
            } else {
                Some((Family::Other, None))
            }
        }
        "char_literal" => Some((Family::Char, None)),
        "boolean_literal" => Some((Family::Bool, None)),
        "integer_literal" => {
            let hex = text.starts_with("0x") || text.starts_with("0X");
            if let Some(ty) = suffix(INT_TYPES) {
                Some((Family::Int, Some(ty)))
            } else if let Some(ty) = suffix(FLOAT_TYPES).filter(|_| !hex) {
                Some((Family::Float, Some(ty)))
            } else {
                Some((Family::Int, None))
            }
        }
        "float_literal" => Some((Family::Float, suffix(FLOAT_TYPES))),
        _ => None,
    }
}

/// Check that `bound` is a type-consistent value for `param`
pub fn check_binding(
    param: &Param,
    bound: Node<'_>,
    file: &SourceFile,
    types: &TypeInfo,
) -> Result<(), String> {
    let text = file.text(bound);

    if let Some((family, suffix)) = literal_family(bound.kind(), text) {
        let Some(expected) = type_family(&param.ty) else {
            return Ok(());
        };
        if family != expected {
            return Err(format!("literal `{text}` cannot have type `{}`", param.ty));
        }
        if let Some(suffix) = suffix {
            if suffix != param.ty {
                return Err(format!("literal `{text}` has type `{suffix}`, not `{}`", param.ty));
            }
        }
        return Ok(());
    }

    if bound.kind() == "identifier" {
        if let Some(declared) = types.value_type(text) {
            if declared != param.ty {
                return Err(format!("`{text}` is declared `{declared}`, not `{}`", param.ty));
            }
        }
    }

    Ok(())
}
