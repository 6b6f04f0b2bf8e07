//! Template location: find the package holding the template file and take it
//! out of the working set.

use std::path::Path;

use crate::loader::Package;
use crate::syntax::SourceFile;
use crate::{ExemplarError, Result};

/// The template file together with the package it was taken from
#[derive(Debug, Clone)]
pub struct Template {
    pub package: Package,
    file_index: usize,
}

impl Template {
    pub fn file(&self) -> &SourceFile {
        &self.package.files[self.file_index]
    }
}

/// Split `packages` into the template and the working set
///
/// The first package containing `template_path` is the template's; the
/// remaining packages keep their relative order.
pub fn locate_template(
    mut packages: Vec<Package>,
    template_path: &Path,
) -> Result<(Template, Vec<Package>)> {
    let not_found = || ExemplarError::TemplateNotFound {
        path: template_path.to_path_buf(),
    };

    let index = packages
        .iter()
        .position(|package| package.contains(template_path))
        .ok_or_else(not_found)?;
    let package = packages.remove(index);

    let file_index = package
        .file_paths()
        .position(|path| path == template_path)
        .ok_or_else(not_found)?;

    Ok((
        Template {
            package,
            file_index,
        },
        packages,
    ))
}
