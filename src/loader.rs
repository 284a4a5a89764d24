//! Corpus loading and document normalization.
//!
//! Walks the corpus root, dispatches files to a loader by extension
//! (PDF → one document per page, plain-text formats → one document per
//! file), normalizes the `source` metadata field, and tags every document
//! with an access [`Scope`] derived from its top-level corpus directory.
//! Files with unrecognized extensions are skipped silently.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use walkdir::WalkDir;

/// Plain-text extensions loaded as one document per file.
const TEXT_EXTS: [&str; 5] = ["txt", "md", "tex", "bib", "csv"];

/// Metadata keys consulted (in order) when normalizing `source`.
const SOURCE_KEYS: [&str; 4] = ["source", "file_path", "path", "filename"];

/// Raw loaded unit: text plus whatever metadata the loader populated.
/// Discarded after normalization and chunking.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: HashMap<String, String>,
}

/// A document with normalized citation metadata, ready for chunking.
#[derive(Debug, Clone)]
pub struct TaggedDocument {
    pub content: String,
    pub source: Option<String>,
    pub page: Option<i64>,
    pub scope: Scope,
}

/// Coarse visibility classification derived from corpus folder structure.
/// Descriptive only: computed once at ingestion, stored as chunk metadata,
/// and never enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Public,
    Internal,
    Unknown,
}

impl Scope {
    /// Scope from an already corpus-relative path: the first path segment
    /// decides, case-insensitively.
    pub fn from_relative(rel: &Path) -> Scope {
        let top = rel
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .unwrap_or_default();

        if top.eq_ignore_ascii_case("internal") {
            Scope::Internal
        } else if top.eq_ignore_ascii_case("public") {
            Scope::Public
        } else {
            Scope::Unknown
        }
    }

    /// Scope for a source path under `root`. Any resolution failure
    /// (missing file, path outside the corpus root, malformed path)
    /// degrades to `Unknown` rather than propagating.
    pub fn for_source(root: &Path, source: &str) -> Scope {
        let resolved = (|| {
            let root = root.canonicalize().ok()?;
            let path = Path::new(source).canonicalize().ok()?;
            path.strip_prefix(&root).ok().map(|rel| rel.to_path_buf())
        })();

        match resolved {
            Some(rel) => Scope::from_relative(&rel),
            None => Scope::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Public => "public",
            Scope::Internal => "internal",
            Scope::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "public" => Scope::Public,
            "internal" => Scope::Internal,
            _ => Scope::Unknown,
        })
    }
}

/// Walks `root` recursively and loads every recognized file.
/// Returned documents are raw; pass them through [`normalize`] before use.
pub fn load_corpus(root: &Path) -> Result<Vec<Document>> {
    let mut docs = Vec::new();

    let mut entries: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    // Sort for deterministic ordering.
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in entries {
        let path = entry.path();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if ext == "pdf" {
            docs.extend(load_pdf(path)?);
        } else if TEXT_EXTS.contains(&ext.as_str()) {
            docs.push(load_text(path)?);
        }
        // Anything else is skipped silently.
    }

    Ok(docs)
}

/// One document per PDF page, with a 0-based `page` metadata field.
fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .with_context(|| format!("Failed to extract PDF: {}", path.display()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let mut metadata = HashMap::new();
            metadata.insert("source".to_string(), path.display().to_string());
            metadata.insert("page".to_string(), i.to_string());
            Document { content, metadata }
        })
        .collect())
}

/// One document per plain-text file.
fn load_text(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), path.display().to_string());
    Ok(Document { content, metadata })
}

/// Normalizes a raw document: resolves `source` from whichever candidate
/// key the loader populated, parses the page number, and computes the
/// scope tag from the corpus-relative path.
pub fn normalize(root: &Path, doc: Document) -> TaggedDocument {
    let source = SOURCE_KEYS
        .iter()
        .find_map(|key| doc.metadata.get(*key))
        .cloned();

    let page = doc.metadata.get("page").and_then(|p| p.parse::<i64>().ok());

    let scope = match &source {
        Some(src) => Scope::for_source(root, src),
        None => Scope::Unknown,
    };

    TaggedDocument {
        content: doc.content,
        source,
        page,
        scope,
    }
}
