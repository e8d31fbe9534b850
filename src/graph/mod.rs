//! Graph persistence
//!
//! - [`traits`]: the closed command set and the [`GraphStore`] trait
//! - [`cypher`]: Cypher rendering for Neo4j
//! - [`Neo4jStore`] / [`SqliteGraphStore`]: the two backends
//! - [`GraphGateway`]: documents and chunks in, nodes and edges out

mod cypher;
mod gateway;
mod neo4j;
mod schema;
mod sqlite;
mod traits;

pub use cypher::{render, Statement, FULLTEXT_INDEX};
pub use gateway::{EnrichmentSummary, GraphGateway, PersistOutcome};
pub use neo4j::Neo4jStore;
pub use sqlite::SqliteGraphStore;
pub use traits::{
    GraphCommand, GraphStore, NodeLabel, NodeRef, Properties, Property, RelType, StoreError,
    StoreResult,
};

use crate::config::{GraphBackend, GraphConfig};
use std::path::Path;
use std::sync::Arc;

/// Opens the configured backend; the caller still has to `initialize` it
pub fn open_store(config: &GraphConfig) -> crate::Result<Arc<dyn GraphStore>> {
    let store: Arc<dyn GraphStore> = match config.backend {
        GraphBackend::Neo4j => Arc::new(Neo4jStore::from_config(config)?),
        GraphBackend::Sqlite => Arc::new(SqliteGraphStore::new(Path::new(&config.sqlite_path))?),
    };
    Ok(store)
}
