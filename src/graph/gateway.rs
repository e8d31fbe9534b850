//! Persistence gateway between the domain model and a graph store
//!
//! Persisting a document is a staged pipeline:
//!
//! 1. the Document node is created; if that fails nothing else happens
//! 2. each chunk gets a Chunk node and a `HAS_CHUNK` edge; one failed chunk
//!    does not stop its siblings
//! 3. every created chunk is enriched on its own task (tags and embedding);
//!    enrichment failures leave that chunk un-enriched
//!
//! Store calls made by the gateway itself are retried on transient errors.
//! Enrichment is not retried.

use super::traits::{
    GraphCommand, GraphStore, NodeLabel, NodeRef, Properties, Property, RelType, StoreError,
    StoreResult,
};
use crate::ai::ChunkEnricher;
use crate::document::{Chunk, Document, DocumentFormat};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What a call to [`GraphGateway::persist`] achieved
#[derive(Debug)]
pub struct PersistOutcome {
    pub document_id: Uuid,
    pub chunks_created: usize,
    pub chunks_failed: usize,
    enrichment: Vec<JoinHandle<bool>>,
}

/// Result of the enrichment tasks of one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub enriched: usize,
    pub failed: usize,
}

impl PersistOutcome {
    /// Number of enrichment tasks dispatched
    pub fn enrichment_tasks(&self) -> usize {
        self.enrichment.len()
    }

    /// Waits for every enrichment task of this document
    ///
    /// Callers that do not care may simply drop the outcome; the tasks keep
    /// running.
    pub async fn wait_for_enrichment(self) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        for handle in self.enrichment {
            match handle.await {
                Ok(true) => summary.enriched += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }
}

#[derive(Clone)]
pub struct GraphGateway {
    store: Arc<dyn GraphStore>,
    enricher: Option<Arc<dyn ChunkEnricher>>,
    retry: RetryPolicy,
}

impl GraphGateway {
    pub fn new(
        store: Arc<dyn GraphStore>,
        enricher: Option<Arc<dyn ChunkEnricher>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            enricher,
            retry,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn initialize(&self) -> StoreResult<()> {
        self.store.initialize().await
    }

    async fn execute(&self, command: GraphCommand) -> StoreResult<Vec<Properties>> {
        let store = &self.store;
        let command = &command;
        self.retry
            .run(
                command.name(),
                move || store.execute(command),
                StoreError::failure_type,
            )
            .await
    }

    /// Writes a document and its chunks, then dispatches enrichment
    ///
    /// # Arguments
    ///
    /// * `document` - Document node to create
    /// * `chunks` - Chunks linked to the document in order
    ///
    /// # Returns
    ///
    /// * `Ok(PersistOutcome)` - Created and failed chunk counts plus one enrichment task per created chunk
    /// * `Err(StoreError)` - The document node could not be created
    pub async fn persist(&self, document: &Document, chunks: &[Chunk]) -> StoreResult<PersistOutcome> {
        let created = self
            .execute(GraphCommand::CreateNode {
                label: NodeLabel::Document,
                properties: document_properties(document),
            })
            .await;

        if let Err(e) = created {
            error!(
                "Failed to create document node for {} ({}): {}",
                document.source, document.id, e
            );
            return Err(e);
        }

        let mut outcome = PersistOutcome {
            document_id: document.id,
            chunks_created: 0,
            chunks_failed: 0,
            enrichment: Vec::new(),
        };

        for chunk in chunks {
            match self.persist_chunk(document.id, chunk).await {
                Ok(()) => {
                    outcome.chunks_created += 1;
                    if let Some(enricher) = &self.enricher {
                        outcome.enrichment.push(tokio::spawn(enrich_chunk(
                            self.store.clone(),
                            enricher.clone(),
                            chunk.clone(),
                        )));
                    }
                }
                Err(e) => {
                    outcome.chunks_failed += 1;
                    warn!(
                        "Failed to persist chunk {} of {}: {}",
                        chunk.position, document.source, e
                    );
                }
            }
        }

        info!(
            "Persisted '{}' with {}/{} chunks",
            document.title,
            outcome.chunks_created,
            chunks.len()
        );
        Ok(outcome)
    }

    async fn persist_chunk(&self, document_id: Uuid, chunk: &Chunk) -> StoreResult<()> {
        self.execute(GraphCommand::CreateNode {
            label: NodeLabel::Chunk,
            properties: chunk_properties(chunk),
        })
        .await?;
        self.execute(GraphCommand::CreateEdge {
            rel: RelType::HasChunk,
            from: document_id,
            to: chunk.id,
            properties: Properties::new(),
        })
        .await?;
        Ok(())
    }

    /// Creates a Requirement node and returns its id
    pub async fn create_requirement(&self, title: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        let mut properties = Properties::new();
        properties.insert("id".into(), json!(id.to_string()));
        properties.insert("title".into(), json!(title));
        self.execute(GraphCommand::CreateNode {
            label: NodeLabel::Requirement,
            properties,
        })
        .await?;
        Ok(id)
    }

    /// `LINKED_TO` edge between two chunks; `link_type` is stored on the edge
    pub async fn link_chunks(&self, from: Uuid, to: Uuid, link_type: &str) -> StoreResult<()> {
        let mut properties = Properties::new();
        properties.insert("type".into(), json!(link_type));
        self.execute(GraphCommand::CreateEdge {
            rel: RelType::LinkedTo,
            from,
            to,
            properties,
        })
        .await?;
        Ok(())
    }

    pub async fn mark_satisfies(&self, chunk: Uuid, requirement: Uuid) -> StoreResult<()> {
        self.execute(GraphCommand::CreateEdge {
            rel: RelType::Satisfies,
            from: chunk,
            to: requirement,
            properties: Properties::new(),
        })
        .await?;
        Ok(())
    }

    pub async fn update_property(
        &self,
        node: NodeRef,
        property: Property,
        value: Value,
    ) -> StoreResult<()> {
        if !property.applies_to(node.label) {
            return Err(StoreError::Invalid(format!(
                "{} nodes have no '{}' property",
                node.label, property
            )));
        }
        self.execute(GraphCommand::SetProperty {
            node,
            property,
            value,
        })
        .await?;
        Ok(())
    }

    pub async fn delete_node(&self, node: NodeRef) -> StoreResult<()> {
        self.execute(GraphCommand::DeleteNode { node }).await?;
        Ok(())
    }

    pub async fn delete_edge(&self, rel: RelType, from: Uuid, to: Uuid) -> StoreResult<()> {
        self.execute(GraphCommand::DeleteEdge { rel, from, to }).await?;
        Ok(())
    }

    pub async fn chunks_by_tag(&self, tag: &str) -> StoreResult<Vec<Chunk>> {
        let rows = self
            .execute(GraphCommand::ChunksByTag {
                tag: tag.to_string(),
            })
            .await?;
        rows.iter().map(chunk_from_properties).collect()
    }

    /// Full-text search over chunk content
    pub async fn search_chunks(&self, query: &str) -> StoreResult<Vec<Chunk>> {
        let rows = self
            .execute(GraphCommand::ChunkFullText {
                query: query.to_string(),
            })
            .await?;
        rows.iter().map(chunk_from_properties).collect()
    }

    pub async fn chunks_satisfying(&self, requirement: Uuid) -> StoreResult<Vec<Chunk>> {
        let rows = self
            .execute(GraphCommand::ChunksSatisfying { requirement })
            .await?;
        rows.iter().map(chunk_from_properties).collect()
    }

    pub async fn linked_chunks(&self, chunk: Uuid) -> StoreResult<Vec<Chunk>> {
        let rows = self.execute(GraphCommand::LinkedChunks { chunk }).await?;
        rows.iter().map(chunk_from_properties).collect()
    }

    pub async fn find_document_by_source(&self, source: &str) -> StoreResult<Option<Document>> {
        let rows = self
            .execute(GraphCommand::DocumentBySource {
                source: source.to_string(),
            })
            .await?;
        rows.first().map(document_from_properties).transpose()
    }
}

/// Derives tags and an embedding for one chunk and writes them back
///
/// Returns whether the chunk ended up enriched.
async fn enrich_chunk(
    store: Arc<dyn GraphStore>,
    enricher: Arc<dyn ChunkEnricher>,
    mut chunk: Chunk,
) -> bool {
    let tags = match enricher.tags(chunk.content()).await {
        Ok(tags) => tags,
        Err(e) => {
            warn!("Tag generation failed for chunk {}: {}", chunk.id, e);
            return false;
        }
    };
    let embedding = match enricher.embed(chunk.content()).await {
        Ok(embedding) => embedding,
        Err(e) => {
            warn!("Embedding failed for chunk {}: {}", chunk.id, e);
            return false;
        }
    };

    chunk.add_tags(tags);
    chunk.set_embedding(&embedding);

    let metadata = match serde_json::to_string(&chunk.metadata) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Could not serialize metadata of chunk {}: {}", chunk.id, e);
            return false;
        }
    };

    let updates = [
        GraphCommand::SetProperty {
            node: NodeRef::chunk(chunk.id),
            property: Property::Tags,
            value: json!(chunk.tags),
        },
        GraphCommand::SetProperty {
            node: NodeRef::chunk(chunk.id),
            property: Property::Metadata,
            value: Value::String(metadata),
        },
    ];
    for update in &updates {
        if let Err(e) = store.execute(update).await {
            warn!("Failed to store enrichment of chunk {}: {}", chunk.id, e);
            return false;
        }
    }

    debug!("Enriched chunk {} with {} tags", chunk.id, chunk.tags.len());
    true
}

fn document_properties(document: &Document) -> Properties {
    let mut p = Properties::new();
    p.insert("id".into(), json!(document.id.to_string()));
    p.insert("title".into(), json!(document.title));
    p.insert("author".into(), json!(document.author));
    p.insert("type".into(), json!(document.format.as_str()));
    p.insert("tags".into(), json!(document.tags));
    p.insert("importedAt".into(), json!(document.imported_at.to_rfc3339()));
    p.insert("source".into(), json!(document.source));
    p.insert("originalFilename".into(), json!(document.original_filename));
    p
}

/// Chunk metadata is stored as a JSON string; stores only keep flat values
fn chunk_properties(chunk: &Chunk) -> Properties {
    let metadata = serde_json::to_string(&chunk.metadata).unwrap_or_else(|_| "{}".to_string());
    let mut p = Properties::new();
    p.insert("id".into(), json!(chunk.id.to_string()));
    p.insert("documentId".into(), json!(chunk.document_id.to_string()));
    p.insert("type".into(), json!(chunk.chunk_type.as_str()));
    p.insert("content".into(), json!(chunk.content()));
    p.insert("position".into(), json!(chunk.position));
    p.insert("tags".into(), json!(chunk.tags));
    p.insert("metadata".into(), json!(metadata));
    p
}

fn str_field<'a>(p: &'a Properties, key: &str) -> StoreResult<&'a str> {
    p.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode(format!("missing '{}'", key)))
}

fn uuid_field(p: &Properties, key: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(str_field(p, key)?)
        .map_err(|e| StoreError::Decode(format!("bad '{}': {}", key, e)))
}

fn format_field(p: &Properties) -> StoreResult<DocumentFormat> {
    let raw = str_field(p, "type")?;
    DocumentFormat::parse(raw).ok_or_else(|| StoreError::Decode(format!("unknown type '{}'", raw)))
}

fn tags_field(p: &Properties) -> Vec<String> {
    p.get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn chunk_from_properties(p: &Properties) -> StoreResult<Chunk> {
    let position = p
        .get("position")
        .and_then(Value::as_u64)
        .ok_or_else(|| StoreError::Decode("missing 'position'".into()))?;
    let metadata: BTreeMap<String, String> = match p.get("metadata").and_then(Value::as_str) {
        Some(raw) => {
            serde_json::from_str(raw).map_err(|e| StoreError::Decode(e.to_string()))?
        }
        None => BTreeMap::new(),
    };

    Ok(Chunk::restore(
        uuid_field(p, "id")?,
        uuid_field(p, "documentId")?,
        format_field(p)?,
        position as u32,
        str_field(p, "content")?.to_string(),
        tags_field(p),
        metadata,
    ))
}

fn document_from_properties(p: &Properties) -> StoreResult<Document> {
    let imported_at = DateTime::parse_from_rfc3339(str_field(p, "importedAt")?)
        .map_err(|e| StoreError::Decode(e.to_string()))?
        .with_timezone(&Utc);

    Ok(Document {
        id: uuid_field(p, "id")?,
        source: str_field(p, "source")?.to_string(),
        format: format_field(p)?,
        original_filename: str_field(p, "originalFilename")?.to_string(),
        imported_at,
        title: str_field(p, "title")?.to_string(),
        author: str_field(p, "author")?.to_string(),
        tags: tags_field(p),
    })
}
