//! Integration tests for the graph persistence gateway
//!
//! Runs the gateway against the embedded SQLite backend: persistence,
//! asynchronous enrichment, and every read and write operation.

use async_trait::async_trait;
use docshop::ai::{AiError, ChunkEnricher};
use docshop::chunk::Chunker;
use docshop::document::{Chunk, Document, DocumentFormat};
use docshop::graph::{
    GraphGateway, GraphStore, NodeRef, Property, RelType, SqliteGraphStore, StoreError,
};
use docshop::retry::RetryPolicy;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Tags every chunk with "graph" plus a word from its content
struct WordEnricher;

#[async_trait]
impl ChunkEnricher for WordEnricher {
    async fn tags(&self, text: &str) -> Result<Vec<String>, AiError> {
        if text.contains("offline") {
            return Err(AiError::Request("model offline".to_string()));
        }
        let first = text
            .split_whitespace()
            .find(|w| w.chars().all(char::is_alphabetic))
            .unwrap_or("none")
            .to_lowercase();
        Ok(vec!["graph".to_string(), first])
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        Ok(vec![text.len() as f32, 0.5])
    }
}

fn gateway(enricher: Option<Arc<dyn ChunkEnricher>>) -> GraphGateway {
    let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new_in_memory().unwrap());
    GraphGateway::new(store, enricher, RetryPolicy::no_retry())
}

fn markdown_document(text: &str) -> (Document, Vec<Chunk>) {
    let document = Document::new(
        "/docs/graph.md",
        DocumentFormat::Markdown,
        "graph.md",
        Some("Graph".to_string()),
        None,
    );
    let chunks = Chunker::new(40).chunk(&document, text);
    (document, chunks)
}

#[tokio::test]
async fn test_persist_and_enrich() {
    let gateway = gateway(Some(Arc::new(WordEnricher)));
    let (document, chunks) =
        markdown_document("Nodes hold properties.\n\nEdges connect nodes.\n\nThe model is offline.");
    assert_eq!(chunks.len(), 3);

    let outcome = gateway.persist(&document, &chunks).await.unwrap();
    assert_eq!(outcome.document_id, document.id);
    assert_eq!(outcome.chunks_created, 3);
    assert_eq!(outcome.chunks_failed, 0);
    assert_eq!(outcome.enrichment_tasks(), 3);

    let summary = outcome.wait_for_enrichment().await;
    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.failed, 1);

    let tagged = gateway.chunks_by_tag("graph").await.unwrap();
    assert_eq!(tagged.len(), 2);
    assert!(tagged.iter().all(|c| c.is_enriched()));
    assert_eq!(tagged[0].position, 0);
    assert!(tagged[0].embedding().is_some());

    let edges = gateway.chunks_by_tag("edges").await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].content(), "Edges connect nodes.");

    // The failed chunk stays created but un-enriched
    let offline = gateway.search_chunks("offline").await.unwrap();
    assert_eq!(offline.len(), 1);
    assert!(!offline[0].is_enriched());
    assert!(offline[0].tags.is_empty());
}

#[tokio::test]
async fn test_persisted_chunks_round_trip() {
    let gateway = gateway(None);
    let (document, chunks) = markdown_document("First part of the text.\n\nSecond part of the text.");
    assert_eq!(chunks.len(), 2);
    let outcome = gateway.persist(&document, &chunks).await.unwrap();
    assert_eq!(outcome.enrichment_tasks(), 0);

    let found = gateway.search_chunks("PART").await.unwrap();
    assert_eq!(found, chunks);

    let stored = gateway
        .find_document_by_source("/docs/graph.md")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, document.id);
    assert_eq!(stored.title, "Graph");
    assert_eq!(stored.author, "Unknown");
    assert!(gateway.find_document_by_source("/docs/other.md").await.unwrap().is_none());
}

#[tokio::test]
async fn test_full_text_requires_every_term() {
    let gateway = gateway(None);
    let (document, chunks) = markdown_document("Tokio runtime basics.\n\nRuntime metrics only.");
    gateway.persist(&document, &chunks).await.unwrap();

    assert_eq!(gateway.search_chunks("runtime").await.unwrap().len(), 2);
    assert_eq!(gateway.search_chunks("tokio runtime").await.unwrap().len(), 1);
    assert!(gateway.search_chunks("100%").await.unwrap().is_empty());
    assert!(gateway.search_chunks("   ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_links_and_requirements() {
    let gateway = gateway(None);
    let (document, chunks) = markdown_document(
        "Authentication overview page.\n\nToken refresh happens hourly.\n\nLogout flow clears sessions.",
    );
    gateway.persist(&document, &chunks).await.unwrap();
    let (a, b, c) = (chunks[0].id, chunks[1].id, chunks[2].id);

    gateway.link_chunks(a, b, "next").await.unwrap();
    gateway.link_chunks(a, c, "see-also").await.unwrap();
    let linked: Vec<Uuid> = gateway
        .linked_chunks(a)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(linked, vec![b, c]);
    assert!(gateway.linked_chunks(b).await.unwrap().is_empty());

    let requirement = gateway.create_requirement("Sessions expire").await.unwrap();
    gateway.mark_satisfies(b, requirement).await.unwrap();
    gateway.mark_satisfies(c, requirement).await.unwrap();
    assert_eq!(gateway.chunks_satisfying(requirement).await.unwrap().len(), 2);

    gateway.delete_edge(RelType::Satisfies, c, requirement).await.unwrap();
    let remaining = gateway.chunks_satisfying(requirement).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, b);
}

#[tokio::test]
async fn test_delete_node_detaches_edges() {
    let gateway = gateway(None);
    let (document, chunks) = markdown_document("Chunk number one is here.\n\nChunk number two is here.");
    gateway.persist(&document, &chunks).await.unwrap();
    gateway.link_chunks(chunks[0].id, chunks[1].id, "next").await.unwrap();

    gateway.delete_node(NodeRef::chunk(chunks[1].id)).await.unwrap();

    assert!(gateway.linked_chunks(chunks[0].id).await.unwrap().is_empty());
    assert_eq!(gateway.search_chunks("two").await.unwrap().len(), 0);
    assert_eq!(gateway.search_chunks("one").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_property() {
    let gateway = gateway(None);
    let (document, chunks) = markdown_document("Retry policies.");
    gateway.persist(&document, &chunks).await.unwrap();

    gateway
        .update_property(
            NodeRef::chunk(chunks[0].id),
            Property::Tags,
            json!(["resilience"]),
        )
        .await
        .unwrap();
    let tagged = gateway.chunks_by_tag("resilience").await.unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, chunks[0].id);

    gateway
        .update_property(NodeRef::document(document.id), Property::Title, json!("Retries"))
        .await
        .unwrap();
    let stored = gateway
        .find_document_by_source(&document.source)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Retries");

    let err = gateway
        .update_property(NodeRef::chunk(chunks[0].id), Property::Author, json!("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[tokio::test]
async fn test_file_backed_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.db");
    let (document, chunks) = markdown_document("Persisted across runs.");

    {
        let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(&path).unwrap());
        let gateway = GraphGateway::new(store, None, RetryPolicy::no_retry());
        gateway.initialize().await.unwrap();
        gateway.persist(&document, &chunks).await.unwrap();
    }

    let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(&path).unwrap());
    let gateway = GraphGateway::new(store, None, RetryPolicy::no_retry());
    gateway.initialize().await.unwrap();
    assert_eq!(gateway.backend_name(), "sqlite");
    assert_eq!(gateway.search_chunks("across").await.unwrap().len(), 1);
}
