//! Document ingestion
//!
//! Turns a local file, a URL, or an already fetched page into a
//! [`Document`] plus its chunks, and hands both to the graph gateway.
//! The format is fixed by the file extension; fetched resources without a
//! usable extension fall back to their `Content-Type`.

pub mod extract;

use crate::chunk::Chunker;
use crate::crawler::{fetch_page, FetchError, FetchedPage};
use crate::document::{Document, DocumentFormat};
use crate::graph::{GraphGateway, PersistOutcome, StoreError};
use crate::retry::RetryPolicy;
use crate::url::{last_path_segment, path_filename};
use reqwest::Client;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// What to do when a source has already been imported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with [`IngestError::Duplicate`]
    Reject,
    /// Import again as a new document
    Allow,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unrecognized format: {location}")]
    UnrecognizedFormat { location: String },

    #[error("Failed to extract {format} content from {location}: {message}")]
    Extraction {
        location: String,
        format: DocumentFormat,
        message: String,
    },

    #[error("{location} was already imported as document {existing_id}")]
    Duplicate { location: String, existing_id: Uuid },

    #[error("Failed to read {location}: {error}")]
    Io {
        location: String,
        #[source]
        error: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to persist {location}: {error}")]
    Store {
        location: String,
        #[source]
        error: StoreError,
    },
}

impl IngestError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// A successfully ingested document
#[derive(Debug)]
pub struct IngestOutcome {
    pub document: Document,
    pub chunk_count: usize,
    pub persisted: PersistOutcome,
}

pub struct Ingestor {
    gateway: GraphGateway,
    chunker: Chunker,
    client: Client,
    retry: RetryPolicy,
}

impl Ingestor {
    pub fn new(gateway: GraphGateway, chunker: Chunker, client: Client, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            chunker,
            client,
            retry,
        }
    }

    pub fn gateway(&self) -> &GraphGateway {
        &self.gateway
    }

    /// Imports a local file
    ///
    /// # Arguments
    ///
    /// * `path` - File to import; its extension fixes the format
    /// * `policy` - Whether an earlier import of the same path is an error
    ///
    /// # Returns
    ///
    /// * `Ok(IngestOutcome)` - The stored document, its chunk count and pending enrichment
    /// * `Err(IngestError)` - Unknown format, duplicate, unreadable file or store failure
    pub async fn ingest_file(
        &self,
        path: &Path,
        policy: DuplicatePolicy,
    ) -> Result<IngestOutcome, IngestError> {
        let location = std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();

        let format = DocumentFormat::from_path(path).ok_or_else(|| IngestError::UnrecognizedFormat {
            location: location.clone(),
        })?;

        self.check_duplicate(&location, policy).await?;

        let bytes = tokio::fs::read(path).await.map_err(|error| IngestError::Io {
            location: location.clone(),
            error,
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.clone());
        let extension = extension_of(&filename);

        self.ingest_bytes(location, filename, None, &extension, format, &bytes)
            .await
    }

    /// Downloads and imports a URL
    ///
    /// The duplicate check runs before the download, against the URL as given.
    pub async fn ingest_url(
        &self,
        url: &Url,
        policy: DuplicatePolicy,
    ) -> Result<IngestOutcome, IngestError> {
        self.check_duplicate(url.as_str(), policy).await?;
        let page = fetch_page(&self.client, url, &self.retry).await?;
        self.ingest_fetched(&page, DuplicatePolicy::Allow).await
    }

    /// Imports a page that has already been fetched
    pub async fn ingest_fetched(
        &self,
        page: &FetchedPage,
        policy: DuplicatePolicy,
    ) -> Result<IngestOutcome, IngestError> {
        let location = page.url.to_string();
        // A host root has no filename; the host names it as is
        let (filename, extension, fallback_title) = match path_filename(&page.url) {
            Some(filename) => {
                let extension = extension_of(&filename);
                (filename, extension, None)
            }
            None => {
                let host = last_path_segment(&page.url);
                (host.clone(), String::new(), Some(host))
            }
        };

        let format = DocumentFormat::from_extension(&extension)
            .or_else(|| {
                page.content_type
                    .as_deref()
                    .and_then(DocumentFormat::from_content_type)
            })
            .ok_or_else(|| IngestError::UnrecognizedFormat {
                location: location.clone(),
            })?;

        self.check_duplicate(&location, policy).await?;
        self.ingest_bytes(location, filename, fallback_title, &extension, format, &page.body)
            .await
    }

    async fn check_duplicate(&self, location: &str, policy: DuplicatePolicy) -> Result<(), IngestError> {
        if policy == DuplicatePolicy::Allow {
            return Ok(());
        }
        let existing = self
            .gateway
            .find_document_by_source(location)
            .await
            .map_err(|error| IngestError::Store {
                location: location.to_string(),
                error,
            })?;
        match existing {
            Some(document) => Err(IngestError::Duplicate {
                location: location.to_string(),
                existing_id: document.id,
            }),
            None => Ok(()),
        }
    }

    async fn ingest_bytes(
        &self,
        location: String,
        filename: String,
        fallback_title: Option<String>,
        extension: &str,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        let extracted =
            extract::extract(format, bytes, extension).map_err(|message| IngestError::Extraction {
                location: location.clone(),
                format,
                message,
            })?;

        let mut document = Document::new(
            location.clone(),
            format,
            filename,
            extracted.title.or(fallback_title),
            extracted.author,
        );
        document.add_tags(&extracted.tags);

        let chunks = self.chunker.chunk(&document, &extracted.text);
        debug!(
            "Extracted {} chars from {} into {} chunks",
            extracted.text.len(),
            location,
            chunks.len()
        );

        let persisted = self
            .gateway
            .persist(&document, &chunks)
            .await
            .map_err(|error| IngestError::Store {
                location: location.clone(),
                error,
            })?;

        info!("Imported {} as {} ({})", location, document.id, format);
        Ok(IngestOutcome {
            chunk_count: chunks.len(),
            document,
            persisted,
        })
    }
}

/// Lowercased extension of a filename, empty when there is none
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}
