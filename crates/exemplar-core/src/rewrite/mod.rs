/*!
# Example-Based Rewriting

The rewrite engine bound to one template. A [`TransformerFactory`] compiles a
template into a [`Transformer`]; the transformer is then applied file by file
and reports how many sites it rewrote.

## Architecture

- `Transformer`: applies the bound rewrite to one file, in place
- `TransformerFactory`: builds a transformer from a template file
- `template`: validates the before/after pair and compiles both bodies
- `patterns`: wildcard unification and type-consistency checks
- `example`: the default tree-sitter transformer

## Example Usage

```rust,ignore
use exemplar_core::rewrite::{ExampleTransformerFactory, TransformerFactory};

let factory = ExampleTransformerFactory;
let mut transformer = factory.build(&template_file, &template_package.types, false)?;
let count = transformer.transform(&package.types, &package.id, &mut file);
```
*/

pub mod example;
pub mod patterns;
pub mod template;

// Re-export main types
pub use example::ExampleTransformer;
pub use patterns::{PatternNode, Unification};
pub use template::{CompiledTemplate, TemplateError};

use crate::loader::{PackageId, TypeInfo};
use crate::syntax::SourceFile;

/// A rewrite engine bound to one template
///
/// Reused across every file of a run. Matches are rewritten in the file's
/// tree and text; the return value is the number of rewritten sites.
pub trait Transformer {
    fn transform(
        &mut self,
        types: &TypeInfo,
        package: &PackageId,
        file: &mut SourceFile,
    ) -> usize;

    /// Diagnostics accumulated so far
    fn stats(&self) -> MatchStats {
        MatchStats::default()
    }
}

/// Builds a transformer from a template file and its package declarations
pub trait TransformerFactory {
    fn build(
        &self,
        template: &SourceFile,
        types: &TypeInfo,
        verbose: bool,
    ) -> Result<Box<dyn Transformer>, TemplateError>;
}

/// Factory for [`ExampleTransformer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleTransformerFactory;

impl TransformerFactory for ExampleTransformerFactory {
    fn build(
        &self,
        template: &SourceFile,
        types: &TypeInfo,
        verbose: bool,
    ) -> Result<Box<dyn Transformer>, TemplateError> {
        let transformer = ExampleTransformer::new(template, types)?.verbose(verbose);
        Ok(Box::new(transformer))
    }
}

/// Matcher statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchStats {
    /// Nodes of the pattern's kind that were tried
    pub candidates: u64,
    pub matches: u64,
    /// Structural matches refused because a binding had the wrong type
    pub type_rejections: u64,
    pub files_changed: u64,
}

impl MatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: MatchStats) {
        self.candidates += other.candidates;
        self.matches += other.matches;
        self.type_rejections += other.type_rejections;
        self.files_changed += other.files_changed;
    }

    pub fn match_rate(&self) -> f64 {
        if self.candidates == 0 {
            0.0
        } else {
            (self.matches as f64) / (self.candidates as f64)
        }
    }
}
