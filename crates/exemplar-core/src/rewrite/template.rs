/*!
# Templates

A template is a Rust file declaring two functions with identical signatures:

```rust,ignore
fn before(err: Error, s: &str) -> Error { wrap(err, s) }
fn after(err: Error, s: &str) -> Error { new_err(s, err) }
```

The parameters of `before` are wildcards in the pattern; `after` refers to the
same values by position, so its parameter names are free to differ.
*/

use std::ops::Range;

use tree_sitter::Node;

use super::patterns::{parameter_index, PatternNode};
use crate::loader::{Declaration, Param, TypeInfo};
use crate::syntax::{is_comment, SourceFile};

pub const BEFORE: &str = "before";
pub const AFTER: &str = "after";

/// Reasons a template cannot be compiled
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template declares no `{0}` function")]
    MissingFunction(&'static str),

    #[error("`before` and `after` signatures differ: {0}")]
    SignatureMismatch(String),

    #[error("unsupported parameter `{0}`: parameters must be `name: Type`")]
    UnsupportedParameter(String),

    #[error("unsupported body in `{0}`: {1}")]
    UnsupportedBody(&'static str, String),

    #[error("`before` body is a bare parameter and would match every expression")]
    BareWildcard,
}

/// Expression kinds that bind looser than a method call or field access
const LOOSE_KINDS: &[&str] = &[
    "assignment_expression",
    "binary_expression",
    "closure_expression",
    "compound_assignment_expr",
    "range_expression",
    "reference_expression",
    "type_cast_expression",
    "unary_expression",
];

/// Parents in which any expression can stand without parentheses
const DELIMITING_PARENTS: &[&str] = &[
    "arguments",
    "array_expression",
    "block",
    "expression_statement",
    "field_initializer",
    "let_declaration",
    "match_arm",
    "parenthesized_expression",
    "return_expression",
    "token_tree",
    "tuple_expression",
];

pub fn is_loose(kind: &str) -> bool {
    LOOSE_KINDS.contains(&kind)
}

pub fn is_delimiting(parent: Option<Node<'_>>) -> bool {
    parent.map_or(true, |parent| DELIMITING_PARENTS.contains(&parent.kind()))
}

/// A parameter occurrence inside the `after` text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hole {
    /// Byte range relative to the replacement text
    pub range: Range<usize>,
    /// Index of the `before` parameter it stands for
    pub param: usize,
    /// Whether the occurrence sits where loose expressions need no parentheses
    pub delimited: bool,
    /// Field name of a shorthand initializer (`Foo { x }`), spelled out as
    /// `x: <bound>` on instantiation
    pub field: Option<String>,
}

/// The `after` body, ready to be instantiated with bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub text: String,
    pub holes: Vec<Hole>,
    /// The replacement itself binds loosely
    pub loose: bool,
}

impl Replacement {
    fn compile(file: &SourceFile, body: Node<'_>, params: &[String]) -> Self {
        let offset = body.start_byte();
        let mut holes = Vec::new();
        collect_holes(file, body, params, offset, &mut holes);
        holes.sort_by_key(|hole| hole.range.start);

        Self {
            text: file.text(body).to_string(),
            holes,
            loose: is_loose(body.kind()),
        }
    }

    /// Substitute bound source texts (with their node kinds) into the holes
    pub fn instantiate(&self, bound: &[(&str, &'static str)]) -> String {
        let mut result = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for hole in &self.holes {
            result.push_str(&self.text[cursor..hole.range.start]);
            let (text, kind) = bound[hole.param];
            if let Some(field) = &hole.field {
                if field != text {
                    result.push_str(field);
                    result.push_str(": ");
                }
                result.push_str(text);
            } else if is_loose(kind) && !hole.delimited {
                result.push('(');
                result.push_str(text);
                result.push(')');
            } else {
                result.push_str(text);
            }
            cursor = hole.range.end;
        }
        result.push_str(&self.text[cursor..]);
        result
    }
}

fn collect_holes(
    file: &SourceFile,
    node: Node<'_>,
    params: &[String],
    offset: usize,
    holes: &mut Vec<Hole>,
) {
    let range = node.byte_range();
    let range = range.start - offset..range.end - offset;
    if let Some(param) = shorthand_field_index(file, node, params) {
        holes.push(Hole {
            range,
            param,
            delimited: true,
            field: Some(file.text(node).to_string()),
        });
        return;
    }
    if let Some(param) = parameter_index(file, node, params) {
        holes.push(Hole {
            range,
            param,
            delimited: is_delimiting(node.parent()),
            field: None,
        });
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_holes(file, child, params, offset, holes);
    }
}

fn shorthand_field_index(file: &SourceFile, node: Node<'_>, params: &[String]) -> Option<usize> {
    let in_shorthand = node
        .parent()
        .is_some_and(|parent| parent.kind() == "shorthand_field_initializer");
    if node.kind() != "identifier" || !in_shorthand {
        return None;
    }
    let text = file.text(node);
    params.iter().position(|param| param == text)
}

/// First shorthand field initializer in `node` that names a parameter
fn find_shorthand_param<'tree>(
    file: &'tree SourceFile,
    node: Node<'tree>,
    params: &[String],
) -> Option<Node<'tree>> {
    if shorthand_field_index(file, node, params).is_some() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| find_shorthand_param(file, child, params))
}

/// A validated before/after pair
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    /// Parameters of `before`, in order
    pub params: Vec<Param>,
    pub before: PatternNode,
    /// Source text of the `before` expression, for diagnostics
    pub before_text: String,
    pub after: Replacement,
}

impl CompiledTemplate {
    /// Validate signatures from `types` and compile both bodies from `file`
    pub fn compile(file: &SourceFile, types: &TypeInfo) -> Result<Self, TemplateError> {
        let (before_params, before_ret) = signature(types, BEFORE)?;
        let (after_params, after_ret) = signature(types, AFTER)?;

        if before_params.len() != after_params.len() {
            return Err(TemplateError::SignatureMismatch(format!(
                "`before` takes {} parameters, `after` takes {}",
                before_params.len(),
                after_params.len()
            )));
        }
        for (index, (b, a)) in before_params.iter().zip(&after_params).enumerate() {
            if b.ty != a.ty {
                return Err(TemplateError::SignatureMismatch(format!(
                    "parameter {} is `{}` in `before` but `{}` in `after`",
                    index + 1,
                    b.ty,
                    a.ty
                )));
            }
        }
        if before_ret != after_ret {
            return Err(TemplateError::SignatureMismatch(format!(
                "return types `{}` and `{}`",
                before_ret.as_deref().unwrap_or("()"),
                after_ret.as_deref().unwrap_or("()")
            )));
        }

        let before_names: Vec<String> = before_params.iter().map(|p| p.name.clone()).collect();
        let after_names: Vec<String> = after_params.iter().map(|p| p.name.clone()).collect();

        let before_body = body_expression(file, BEFORE)?;
        if let Some(field) = find_shorthand_param(file, before_body, &before_names) {
            let name = file.text(field);
            return Err(TemplateError::UnsupportedBody(
                BEFORE,
                format!("shorthand field `{name}` binds a parameter; write `{name}: {name}`"),
            ));
        }
        let before = PatternNode::compile(file, before_body, &before_names);
        if matches!(before, PatternNode::Wildcard(_)) {
            return Err(TemplateError::BareWildcard);
        }

        let after_body = body_expression(file, AFTER)?;
        let after = Replacement::compile(file, after_body, &after_names);

        Ok(Self {
            params: before_params,
            before,
            before_text: file.text(before_body).to_string(),
            after,
        })
    }
}

fn signature(
    types: &TypeInfo,
    name: &'static str,
) -> Result<(Vec<Param>, Option<String>), TemplateError> {
    match types.get(name) {
        Some(Declaration::Function {
            params,
            param_text,
            ret,
        }) => {
            let params = params
                .iter()
                .zip(param_text)
                .map(|(param, text)| {
                    param
                        .clone()
                        .ok_or_else(|| TemplateError::UnsupportedParameter(text.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok((params, ret.clone()))
        }
        _ => Err(TemplateError::MissingFunction(name)),
    }
}

fn find_function<'tree>(file: &'tree SourceFile, name: &str) -> Option<Node<'tree>> {
    let root = file.root();
    let mut cursor = root.walk();
    let found = root.named_children(&mut cursor).find(|item| {
        item.kind() == "function_item"
            && item
                .child_by_field_name("name")
                .is_some_and(|n| file.text(n) == name)
    });
    found
}

/// The single expression a template function body holds
fn body_expression<'tree>(
    file: &'tree SourceFile,
    name: &'static str,
) -> Result<Node<'tree>, TemplateError> {
    let function = find_function(file, name).ok_or(TemplateError::MissingFunction(name))?;
    let body = function
        .child_by_field_name("body")
        .ok_or_else(|| TemplateError::UnsupportedBody(name, "missing body".to_string()))?;

    let items = named_items(body);
    if items.len() != 1 {
        return Err(TemplateError::UnsupportedBody(
            name,
            format!("body must hold exactly one expression, found {} items", items.len()),
        ));
    }

    let mut node = items[0];
    loop {
        match node.kind() {
            "expression_statement" | "return_expression" => {
                node = named_items(node).into_iter().next().ok_or_else(|| {
                    TemplateError::UnsupportedBody(name, "empty return".to_string())
                })?;
            }
            kind if kind == "let_declaration"
                || kind == "empty_statement"
                || kind.ends_with("_item")
                || kind == "macro_definition" =>
            {
                return Err(TemplateError::UnsupportedBody(
                    name,
                    format!("`{}` is not an expression", file.text(node)),
                ));
            }
            _ => return Ok(node),
        }
    }
}

fn named_items(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !is_comment(*child))
        .collect()
}
