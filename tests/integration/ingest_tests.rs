//! Integration tests for document ingestion
//!
//! Files are written to temp directories, remote documents are served by
//! wiremock, and everything lands in an in-memory graph store.

use async_trait::async_trait;
use docshop::chunk::Chunker;
use docshop::graph::{
    GraphCommand, GraphGateway, GraphStore, NodeLabel, Properties, SqliteGraphStore, StoreError,
    StoreResult,
};
use docshop::ingest::{DuplicatePolicy, IngestError, Ingestor};
use docshop::retry::RetryPolicy;
use docshop::DocumentFormat;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_ingestor(store: Arc<dyn GraphStore>) -> Ingestor {
    Ingestor::new(
        GraphGateway::new(store, None, RetryPolicy::no_retry()),
        Chunker::default(),
        Client::new(),
        RetryPolicy::no_retry(),
    )
}

fn sqlite_ingestor() -> Ingestor {
    create_ingestor(Arc::new(SqliteGraphStore::new_in_memory().unwrap()))
}

fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Fails every document node creation and records all commands
struct DocumentRejectingStore {
    inner: SqliteGraphStore,
    log: Mutex<Vec<GraphCommand>>,
}

#[async_trait]
impl GraphStore for DocumentRejectingStore {
    async fn initialize(&self) -> StoreResult<()> {
        self.inner.initialize().await
    }

    async fn execute(&self, command: &GraphCommand) -> StoreResult<Vec<Properties>> {
        self.log.lock().unwrap().push(command.clone());
        if let GraphCommand::CreateNode {
            label: NodeLabel::Document,
            ..
        } = command
        {
            return Err(StoreError::Rejected("Neo.ClientError.Schema.ConstraintValidationFailed".into()));
        }
        self.inner.execute(command).await
    }

    fn backend_name(&self) -> &'static str {
        "rejecting"
    }
}

#[tokio::test]
async fn test_empty_plaintext_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "release-notes.txt", b"");

    let outcome = sqlite_ingestor()
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .expect("empty file should import");

    assert_eq!(outcome.document.title, "release-notes");
    assert_eq!(outcome.document.author, "Unknown");
    assert_eq!(outcome.document.format, DocumentFormat::Plaintext);
    assert_eq!(outcome.chunk_count, 0);
    assert_eq!(outcome.persisted.chunks_created, 0);
}

#[tokio::test]
async fn test_document_node_failure_creates_no_chunks() {
    let store = Arc::new(DocumentRejectingStore {
        inner: SqliteGraphStore::new_in_memory().unwrap(),
        log: Mutex::new(Vec::new()),
    });
    let ingestor = create_ingestor(store.clone());

    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "guide.md", b"# Guide\n\nFirst.\n\n## More\n\nSecond.\n");

    let err = ingestor
        .ingest_file(&path, DuplicatePolicy::Allow)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Store { .. }), "got {err:?}");

    let log = store.log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert!(!log.iter().any(|c| matches!(
        c,
        GraphCommand::CreateNode {
            label: NodeLabel::Chunk,
            ..
        } | GraphCommand::CreateEdge { .. }
    )));
}

#[tokio::test]
async fn test_markdown_file_round_trip_through_graph() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "tokio.md",
        b"---\ntitle: Tokio Notes\nauthor: Ferris\ntags: [async, runtime]\n---\n\n# Runtime\n\nThe scheduler polls futures.\n",
    );

    let ingestor = sqlite_ingestor();
    let outcome = ingestor
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .unwrap();

    assert_eq!(outcome.document.title, "Tokio Notes");
    assert_eq!(outcome.document.author, "Ferris");
    assert!(outcome.document.tags.contains(&"async".to_string()));
    assert!(outcome.chunk_count >= 1);

    let found = ingestor.gateway().search_chunks("scheduler polls").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].document_id, outcome.document.id);
}

#[tokio::test]
async fn test_duplicate_file_is_reported_then_reimported() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.txt", b"alpha\n\nbeta\n");
    let ingestor = sqlite_ingestor();

    let first = ingestor
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .unwrap();

    let err = ingestor
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
    match err {
        IngestError::Duplicate { existing_id, .. } => assert_eq!(existing_id, first.document.id),
        other => panic!("unexpected error: {other:?}"),
    }

    let second = ingestor
        .ingest_file(&path, DuplicatePolicy::Allow)
        .await
        .unwrap();
    assert_ne!(second.document.id, first.document.id);
}

#[tokio::test]
async fn test_unrecognized_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "archive.xyz", b"whatever");

    let err = sqlite_ingestor()
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnrecognizedFormat { .. }));
}

#[tokio::test]
async fn test_legacy_doc_is_an_extraction_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "spec.doc", b"\xD0\xCF\x11\xE0legacy");

    let err = sqlite_ingestor()
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .unwrap_err();
    match err {
        IngestError::Extraction { format, .. } => assert_eq!(format, DocumentFormat::Word),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = sqlite_ingestor()
        .ingest_file(&dir.path().join("absent.md"), DuplicatePolicy::Allow)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Io { .. }));
}

#[tokio::test]
async fn test_code_file_is_tagged_with_language() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "client.py",
        b"import os\n\n\ndef connect():\n    return os.getenv('HOST')\n\n\nclass Client:\n    pass\n",
    );

    let outcome = sqlite_ingestor()
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .unwrap();
    assert_eq!(outcome.document.format, DocumentFormat::Code);
    assert!(outcome.document.tags.contains(&"python".to_string()));
    assert!(outcome.chunk_count >= 1);
}

#[tokio::test]
async fn test_openapi_spec_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "petstore.yaml",
        br#"openapi: "3.0.0"
info:
  title: Petstore
  contact:
    name: API Team
paths:
  /pets:
    get:
      summary: List pets
"#,
    );

    let outcome = sqlite_ingestor()
        .ingest_file(&path, DuplicatePolicy::Reject)
        .await
        .unwrap();
    assert_eq!(outcome.document.format, DocumentFormat::StructuredApiSpec);
    assert_eq!(outcome.document.title, "Petstore");
    assert_eq!(outcome.document.author, "API Team");
    assert!(outcome.document.tags.contains(&"openapi".to_string()));
}

#[tokio::test]
async fn test_ingest_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guide/setup.md"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("# Setup\n\nInstall the toolchain.\n", "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ingestor = sqlite_ingestor();
    let url = Url::parse(&format!("{}/guide/setup.md", server.uri())).unwrap();
    let outcome = ingestor
        .ingest_url(&url, DuplicatePolicy::Reject)
        .await
        .unwrap();

    assert_eq!(outcome.document.format, DocumentFormat::Markdown);
    assert_eq!(outcome.document.title, "Setup");
    assert_eq!(outcome.document.original_filename, "setup.md");

    // The duplicate check runs before fetching
    let err = ingestor
        .ingest_url(&url, DuplicatePolicy::Reject)
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
}

#[tokio::test]
async fn test_ingest_url_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/missing.md", server.uri())).unwrap();
    let err = sqlite_ingestor()
        .ingest_url(&url, DuplicatePolicy::Allow)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Fetch(_)));
}
