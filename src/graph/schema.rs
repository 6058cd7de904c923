//! Graph schema descriptions
//!
//! Both workflow variants get their schema the same way: a [`SchemaProvider`]
//! resolves a reference (a file name for the markdown provider) into the text
//! handed to the query generator.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::SchemaLoadError;

/// Returns a textual description of the graph structure.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn load(&self, reference: &str) -> Result<String, SchemaLoadError>;
}

/// Reads the schema from a markdown file.
///
/// The reference is tried as given first, then relative to the base directory.
#[derive(Debug, Clone, Default)]
pub struct MarkdownSchemaProvider {
    base_dir: Option<PathBuf>,
}

impl MarkdownSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to `base_dir` for relative references
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn candidates(&self, reference: &str) -> Vec<PathBuf> {
        let given = PathBuf::from(reference);
        let mut paths = vec![given.clone()];
        if let Some(base) = &self.base_dir {
            if given.is_relative() {
                paths.push(base.join(&given));
            }
        }
        paths
    }

    async fn read(path: &Path) -> Result<Option<String>, SchemaLoadError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SchemaLoadError::Unreadable {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[async_trait]
impl SchemaProvider for MarkdownSchemaProvider {
    async fn load(&self, reference: &str) -> Result<String, SchemaLoadError> {
        for path in self.candidates(reference) {
            if let Some(content) = Self::read(&path).await? {
                if content.trim().is_empty() {
                    return Err(SchemaLoadError::Empty { path });
                }
                tracing::debug!(path = %path.display(), bytes = content.len(), "schema loaded");
                return Ok(content);
            }
        }

        Err(SchemaLoadError::NotFound {
            reference: reference.to_string(),
        })
    }
}
