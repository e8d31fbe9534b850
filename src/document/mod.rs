//! Documents and chunks
//!
//! A [`Document`] is one imported source (a crawled page or a local file).
//! A [`Chunk`] is an addressable slice of a document's text. Both are plain
//! values; persistence lives in the [`crate::graph`] module.

mod format;

pub use format::{code_language, DocumentFormat};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Author recorded when extraction finds none
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Title recorded when neither metadata nor filename yield one
pub const UNTITLED: &str = "Untitled";

/// Chunk metadata key holding the serialized embedding
pub const EMBEDDING_KEY: &str = "embedding";

/// Chunk metadata key holding the SHA-256 of the chunk content
pub const CONTENT_HASH_KEY: &str = "contentHash";

/// An imported document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// URL or file path the document was imported from
    pub source: String,
    pub format: DocumentFormat,
    pub original_filename: String,
    pub imported_at: DateTime<Utc>,
    pub title: String,
    pub author: String,
    pub tags: Vec<String>,
}

impl Document {
    /// Creates a new document with a fresh id
    ///
    /// Empty or missing title falls back to the filename stem, then to the
    /// whole filename. Empty or missing author becomes [`UNKNOWN_AUTHOR`].
    pub fn new(
        source: impl Into<String>,
        format: DocumentFormat,
        original_filename: impl Into<String>,
        title: Option<String>,
        author: Option<String>,
    ) -> Self {
        let original_filename = original_filename.into();
        let title = non_empty(title).unwrap_or_else(|| title_from_filename(&original_filename));
        let author = non_empty(author).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            format,
            original_filename,
            imported_at: Utc::now(),
            title,
            author,
            tags: Vec::new(),
        }
    }

    /// Adds tags, skipping blanks and duplicates
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        merge_tags(&mut self.tags, tags);
    }
}

/// Derives a display title from a filename
///
/// # Examples
///
/// ```
/// use docshop::document::title_from_filename;
///
/// assert_eq!(title_from_filename("getting-started.md"), "getting-started");
/// assert_eq!(title_from_filename(".env"), ".env");
/// assert_eq!(title_from_filename(""), "Untitled");
/// ```
pub fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .unwrap_or_default();

    if !stem.is_empty() {
        stem.to_string()
    } else if !filename.trim().is_empty() {
        filename.trim().to_string()
    } else {
        UNTITLED.to_string()
    }
}

/// An ordered slice of a document's text
///
/// Content is fixed at construction. Enrichment only adds tags and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_type: DocumentFormat,
    content: String,
    pub position: u32,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Creates a chunk of `document_id` at `position`
    ///
    /// The id is derived from the document id and the position, so chunking
    /// the same document twice yields the same ids.
    pub fn new(
        document_id: Uuid,
        chunk_type: DocumentFormat,
        position: u32,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let mut metadata = BTreeMap::new();
        metadata.insert(CONTENT_HASH_KEY.to_string(), content_hash(&content));

        Self {
            id: chunk_id(document_id, position),
            document_id,
            chunk_type,
            content,
            position,
            tags: Vec::new(),
            metadata,
        }
    }

    /// Rebuilds a chunk read back from a store
    pub(crate) fn restore(
        id: Uuid,
        document_id: Uuid,
        chunk_type: DocumentFormat,
        position: u32,
        content: String,
        tags: Vec<String>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            document_id,
            chunk_type,
            content,
            position,
            tags,
            metadata,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Adds tags, skipping blanks and duplicates
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        merge_tags(&mut self.tags, tags);
    }

    /// Stores an embedding as comma-joined floats under [`EMBEDDING_KEY`]
    pub fn set_embedding(&mut self, embedding: &[f32]) {
        self.metadata
            .insert(EMBEDDING_KEY.to_string(), serialize_embedding(embedding));
    }

    /// Returns the stored embedding, if the chunk has been enriched
    pub fn embedding(&self) -> Option<Vec<f32>> {
        self.metadata
            .get(EMBEDDING_KEY)
            .and_then(|raw| parse_embedding(raw))
    }

    /// True once an embedding has been written
    pub fn is_enriched(&self) -> bool {
        self.metadata.contains_key(EMBEDDING_KEY)
    }
}

/// Deterministic chunk id for a document and position
pub fn chunk_id(document_id: Uuid, position: u32) -> Uuid {
    Uuid::new_v5(&document_id, format!("chunk:{}", position).as_bytes())
}

/// SHA-256 hex digest of chunk content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn serialize_embedding(embedding: &[f32]) -> String {
    embedding
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_embedding(raw: &str) -> Option<Vec<f32>> {
    if raw.trim().is_empty() {
        return Some(Vec::new());
    }
    raw.split(',').map(|v| v.trim().parse().ok()).collect()
}

fn merge_tags<I, S>(existing: &mut Vec<String>, tags: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !existing.iter().any(|t| t == tag) {
            existing.push(tag.to_string());
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
