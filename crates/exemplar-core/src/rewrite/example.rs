/*!
# Example Transformer

The default [`Transformer`]: finds every site matching the compiled `before`
pattern and splices in the instantiated `after` text.
*/

use tracing::{debug, error, info, warn};
use tree_sitter::Node;

use super::patterns::{unify, Bindings, Unification};
use super::template::{is_delimiting, CompiledTemplate, TemplateError};
use super::{MatchStats, Transformer};
use crate::loader::{PackageId, TypeInfo};
use crate::syntax::{structural_children, Edit, SourceFile};

/// Upper bound on rewrite passes over one file
const MAX_PASSES: usize = 16;

/// Result of one pass over a file
#[derive(Debug, Default)]
struct Scan {
    edits: Vec<Edit>,
    /// Matches found inside an already matched subtree
    nested: usize,
}

/// Tree-sitter rewrite engine for one before/after template
pub struct ExampleTransformer {
    template: CompiledTemplate,
    stats: MatchStats,
    verbose: bool,
}

impl ExampleTransformer {
    pub fn new(template: &SourceFile, types: &TypeInfo) -> Result<Self, TemplateError> {
        let template = CompiledTemplate::compile(template, types)?;
        debug!(
            before = %template.before_text,
            after = %template.after.text,
            params = template.params.len(),
            "Compiled template"
        );
        Ok(Self {
            template,
            stats: MatchStats::new(),
            verbose: false,
        })
    }

    /// Report every rejected candidate at info level
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }

    /// Edits for every outermost match in `file`, in source order
    pub fn find_edits(&mut self, types: &TypeInfo, file: &SourceFile) -> Vec<Edit> {
        self.scan(types, file, true).edits
    }

    /// One top-down pass over `file`
    ///
    /// Matches inside a matched subtree get no edit of their own; they are
    /// only counted so that the caller knows another pass is needed.
    fn scan(&mut self, types: &TypeInfo, file: &SourceFile, first_pass: bool) -> Scan {
        let mut scan = Scan::default();
        let Some(kind) = self.template.before.root_kind() else {
            return scan;
        };

        let mut bindings: Bindings<'_> = Vec::new();
        let mut stack = vec![(file.root(), false)];

        while let Some((node, inside_match)) = stack.pop() {
            let mut matched = inside_match;
            if node.kind() == kind {
                let counted = first_pass && !inside_match;
                if counted {
                    self.stats.candidates += 1;
                }
                match unify(
                    &self.template.before,
                    node,
                    file,
                    &self.template.params,
                    types,
                    &mut bindings,
                ) {
                    Unification::Matched if inside_match => scan.nested += 1,
                    Unification::Matched => {
                        scan.edits.push(self.replacement(node, file, &bindings));
                        matched = true;
                    }
                    Unification::TypeRejected { param, reason } if counted => {
                        self.stats.type_rejections += 1;
                        self.report_rejection(file, node, &param, &reason);
                    }
                    _ => {}
                }
            }

            let children = structural_children(node);
            stack.extend(children.into_iter().rev().map(|child| (child, matched)));
        }

        scan
    }

    fn replacement(&self, node: Node<'_>, file: &SourceFile, bindings: &Bindings<'_>) -> Edit {
        let bound: Vec<(&str, &'static str)> = bindings
            .iter()
            .map(|binding| match binding {
                Some(bound) => (file.text(*bound), bound.kind()),
                None => ("", "identifier"),
            })
            .collect();

        let mut text = self.template.after.instantiate(&bound);
        if self.template.after.loose && !is_delimiting(node.parent()) {
            text = format!("({text})");
        }
        Edit::new(node.byte_range(), text)
    }

    fn report_rejection(&self, file: &SourceFile, node: Node<'_>, param: &str, reason: &str) {
        let position = node.start_position();
        let location = format!(
            "{}:{}:{}",
            file.path().display(),
            position.row + 1,
            position.column + 1
        );
        if self.verbose {
            info!(
                "{location}: `{}` matches but `{param}` is not type-consistent: {reason}",
                file.text(node)
            );
        } else {
            debug!(%location, param, reason, "Rejected candidate");
        }
    }
}

impl Transformer for ExampleTransformer {
    /// Rewrites outermost matches first, then passes again over the result
    /// while the previous pass left matches nested inside a rewritten site
    fn transform(
        &mut self,
        types: &TypeInfo,
        package: &PackageId,
        file: &mut SourceFile,
    ) -> usize {
        let mut total = 0;

        for pass in 0..MAX_PASSES {
            let scan = self.scan(types, file, pass == 0);
            if scan.edits.is_empty() {
                break;
            }

            if let Err(e) = file.apply_edits(&scan.edits) {
                error!(
                    package = %package,
                    file = %file.path().display(),
                    error = %e,
                    "Failed to apply rewrites"
                );
                break;
            }
            total += scan.edits.len();

            if scan.nested == 0 {
                break;
            }
            if pass + 1 == MAX_PASSES {
                warn!(
                    file = %file.path().display(),
                    passes = MAX_PASSES,
                    "Nested matches remain; the template may reproduce its own pattern"
                );
            }
        }

        if total > 0 {
            self.stats.matches += total as u64;
            self.stats.files_changed += 1;
        }
        total
    }

    fn stats(&self) -> MatchStats {
        self.stats
    }
}
