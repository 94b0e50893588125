//! Citation markers and the files they point at.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::stream::backend::FileObject;
use crate::stream::events::Text;
use crate::stream::ui::Element;

/// Looks up cited files under two roots, in order.
///
/// A file found under the resources root is shown as an inline PDF; one found
/// under the uploaded-files root is shown as a generic file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResolver {
    resources_root: PathBuf,
    files_root: PathBuf,
}

impl ResourceResolver {
    pub fn new(resources_root: impl Into<PathBuf>, files_root: impl Into<PathBuf>) -> Self {
        Self {
            resources_root: resources_root.into(),
            files_root: files_root.into(),
        }
    }

    pub fn resources_root(&self) -> &Path {
        &self.resources_root
    }

    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    pub fn resolve(&self, file: &FileObject) -> Option<Element> {
        let resource = self.resources_root.join(&file.filename);
        if resource.exists() {
            return Some(Element::Pdf {
                name: file.filename.clone(),
                path: resource,
            });
        }
        let uploaded = self.files_root.join(&file.filename);
        if uploaded.exists() {
            return Some(Element::File {
                name: file.filename.clone(),
                path: uploaded,
            });
        }
        debug!(file = %file.filename, "cited file not found under any resource root");
        None
    }
}

impl Default for ResourceResolver {
    fn default() -> Self {
        Self::new("resources", ".files")
    }
}

/// Replace each annotation marker with its bracketed index, `[0]`, `[1]`, ...
pub fn replace_markers(text: &Text) -> String {
    text.annotations
        .iter()
        .enumerate()
        .fold(text.value.clone(), |value, (index, annotation)| {
            if annotation.text.is_empty() {
                value
            } else {
                value.replace(&annotation.text, &format!("[{index}]"))
            }
        })
}
