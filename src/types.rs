//! Core data objects flowing through the generation and publish pipeline.
//!
//! Everything here is created per-request and dropped when the request
//! completes; configuration is the only state that outlives a request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backends::BackendKind;

/// A single generation request. Immutable once created.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Correlation id used in logs
    pub id: Uuid,
    /// The user's app description
    pub prompt: String,
    /// Optional clarification answers or extra context appended to the prompt
    pub enrichment: Option<String>,
    /// Backend the user wants tried first, if any
    pub preferred_backend: Option<BackendKind>,
}

impl GenerationRequest {
    /// Create a request for the given prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            enrichment: None,
            preferred_backend: None,
        }
    }

    #[must_use]
    pub fn with_enrichment(mut self, enrichment: impl Into<String>) -> Self {
        self.enrichment = Some(enrichment.into());
        self
    }

    #[must_use]
    pub fn with_preferred_backend(mut self, backend: BackendKind) -> Self {
        self.preferred_backend = Some(backend);
        self
    }
}

/// The accepted output of one successful adapter call. Never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Sanitized source text
    pub text: String,
    /// Backend that produced the text
    pub backend: BackendKind,
    /// Concrete model that produced the text
    pub model: String,
}

/// One file in a publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub content: String,
}

/// Ordered set of files written in a single publish attempt, unique by path.
///
/// The entry set is fixed once the publish attempt starts; the pipeline
/// writes all of it or none of it.
#[derive(Debug, Clone, Default)]
pub struct PublishManifest {
    entries: Vec<ManifestEntry>,
}

impl PublishManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any earlier entry at the same path while keeping
    /// the original position.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.path == path) {
            existing.content = content;
        } else {
            self.entries.push(ManifestEntry { path, content });
        }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for PublishManifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for (path, content) in iter {
            manifest.insert(path, content);
        }
        manifest
    }
}

/// Where a publish attempt lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    /// Repository name under the authenticated account
    pub name: String,
    /// Branch whose ref is updated
    pub branch: String,
    /// Whether a freshly created repository should be private
    pub private: bool,
    /// Description applied on creation
    pub description: String,
}

impl RepositoryTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branch: "main".to_string(),
            private: false,
            description: String::new(),
        }
    }
}

/// Remote repository descriptor as returned by the host.
///
/// Represents remote mutable state; never cached across requests: the
/// pipeline re-reads it through the existence check on every attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    pub name: String,
    pub full_name: String,
    #[serde(rename = "html_url")]
    pub url: String,
}

/// Terminal artifact of a successful publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub tree_sha: String,
    pub commit_sha: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_is_unique_by_path() {
        let mut manifest = PublishManifest::new();
        manifest.insert("src/App.jsx", "one");
        manifest.insert("README.md", "readme");
        manifest.insert("src/App.jsx", "two");

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries()[0].path, "src/App.jsx");
        assert_eq!(manifest.entries()[0].content, "two");
        assert_eq!(manifest.entries()[1].path, "README.md");
    }

    #[test]
    fn manifest_preserves_insertion_order() {
        let manifest: PublishManifest = [
            ("b.txt".to_string(), String::new()),
            ("a.txt".to_string(), String::new()),
        ]
        .into_iter()
        .collect();

        let paths: Vec<&str> = manifest.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["b.txt", "a.txt"]);
    }
}
