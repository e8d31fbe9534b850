//! Embedded graph store on SQLite
//!
//! Labels and relationship types are stored as their fixed names; property
//! maps as JSON text queried with SQLite's JSON functions.

use super::schema::initialize_schema;
use super::traits::{
    GraphCommand, GraphStore, NodeLabel, Properties, RelType, StoreError, StoreResult,
};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const CHUNK_ORDER: &str =
    "ORDER BY json_extract(n.properties, '$.documentId'), json_extract(n.properties, '$.position')";

pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    /// Opens or creates the database file at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(map_sqlite_error)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(map_sqlite_error)?;
        initialize_schema(&conn).map_err(map_sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        initialize_schema(&conn).map_err(map_sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, command: &GraphCommand) -> StoreResult<Vec<Properties>> {
        let mut conn = self.lock();

        match command {
            GraphCommand::CreateNode { label, properties } => {
                let id = properties
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StoreError::Invalid("node properties lack an id".into()))?;
                conn.execute(
                    "INSERT INTO nodes (id, label, properties) VALUES (?1, ?2, ?3)",
                    params![id, label.as_str(), to_json(properties)?],
                )
                .map_err(map_sqlite_error)?;
                Ok(Vec::new())
            }
            GraphCommand::CreateEdge {
                rel,
                from,
                to,
                properties,
            } => {
                let (from_label, to_label) = rel.endpoints();
                let inserted = conn
                    .execute(
                        "INSERT INTO edges (from_id, rel_type, to_id, properties)
                         SELECT ?1, ?2, ?3, ?4
                         WHERE EXISTS (SELECT 1 FROM nodes WHERE id = ?1 AND label = ?5)
                           AND EXISTS (SELECT 1 FROM nodes WHERE id = ?3 AND label = ?6)",
                        params![
                            from.to_string(),
                            rel.as_str(),
                            to.to_string(),
                            to_json(properties)?,
                            from_label.as_str(),
                            to_label.as_str()
                        ],
                    )
                    .map_err(map_sqlite_error)?;
                if inserted == 0 {
                    debug!("No {} edge created: {} -> {} not both present", rel, from, to);
                }
                Ok(Vec::new())
            }
            GraphCommand::SetProperty {
                node,
                property,
                value,
            } => {
                let value = serde_json::to_string(value)
                    .map_err(|e| StoreError::Invalid(e.to_string()))?;
                conn.execute(
                    "UPDATE nodes SET properties = json_set(properties, '$.' || ?1, json(?2))
                     WHERE id = ?3 AND label = ?4",
                    params![property.as_str(), value, node.id.to_string(), node.label.as_str()],
                )
                .map_err(map_sqlite_error)?;
                Ok(Vec::new())
            }
            GraphCommand::DeleteNode { node } => {
                let tx = conn.transaction().map_err(map_sqlite_error)?;
                let id = node.id.to_string();
                let removed = tx
                    .execute(
                        "DELETE FROM nodes WHERE id = ?1 AND label = ?2",
                        params![id, node.label.as_str()],
                    )
                    .map_err(map_sqlite_error)?;
                if removed > 0 {
                    tx.execute(
                        "DELETE FROM edges WHERE from_id = ?1 OR to_id = ?1",
                        params![id],
                    )
                    .map_err(map_sqlite_error)?;
                }
                tx.commit().map_err(map_sqlite_error)?;
                Ok(Vec::new())
            }
            GraphCommand::DeleteEdge { rel, from, to } => {
                conn.execute(
                    "DELETE FROM edges WHERE from_id = ?1 AND rel_type = ?2 AND to_id = ?3",
                    params![from.to_string(), rel.as_str(), to.to_string()],
                )
                .map_err(map_sqlite_error)?;
                Ok(Vec::new())
            }
            GraphCommand::ChunksByTag { tag } => query_nodes(
                &conn,
                &format!(
                    "SELECT n.properties FROM nodes n
                     WHERE n.label = 'Chunk'
                       AND EXISTS (SELECT 1 FROM json_each(n.properties, '$.tags') t WHERE t.value = ?1)
                     {}",
                    CHUNK_ORDER
                ),
                vec![tag.clone()],
            ),
            GraphCommand::ChunkFullText { query } => {
                let terms: Vec<String> = query
                    .split_whitespace()
                    .map(|term| format!("%{}%", escape_like(term)))
                    .collect();
                if terms.is_empty() {
                    return Ok(Vec::new());
                }
                let conditions = (1..=terms.len())
                    .map(|i| {
                        format!(
                            "AND json_extract(n.properties, '$.content') LIKE ?{} ESCAPE '\\'",
                            i
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                query_nodes(
                    &conn,
                    &format!(
                        "SELECT n.properties FROM nodes n WHERE n.label = 'Chunk' {} {}",
                        conditions, CHUNK_ORDER
                    ),
                    terms,
                )
            }
            GraphCommand::ChunksSatisfying { requirement } => query_nodes(
                &conn,
                &format!(
                    "SELECT n.properties FROM edges e
                     JOIN nodes n ON n.id = e.from_id AND n.label = 'Chunk'
                     WHERE e.rel_type = '{}' AND e.to_id = ?1
                     {}",
                    RelType::Satisfies.as_str(),
                    CHUNK_ORDER
                ),
                vec![requirement.to_string()],
            ),
            GraphCommand::LinkedChunks { chunk } => query_nodes(
                &conn,
                &format!(
                    "SELECT n.properties FROM edges e
                     JOIN nodes n ON n.id = e.to_id AND n.label = 'Chunk'
                     WHERE e.rel_type = '{}' AND e.from_id = ?1
                     {}",
                    RelType::LinkedTo.as_str(),
                    CHUNK_ORDER
                ),
                vec![chunk.to_string()],
            ),
            GraphCommand::DocumentBySource { source } => query_nodes(
                &conn,
                &format!(
                    "SELECT n.properties FROM nodes n
                     WHERE n.label = '{}' AND json_extract(n.properties, '$.source') = ?1
                     LIMIT 1",
                    NodeLabel::Document.as_str()
                ),
                vec![source.clone()],
            ),
        }
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn initialize(&self) -> StoreResult<()> {
        initialize_schema(&self.lock()).map_err(map_sqlite_error)
    }

    async fn execute(&self, command: &GraphCommand) -> StoreResult<Vec<Properties>> {
        self.apply(command)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn query_nodes(conn: &Connection, sql: &str, args: Vec<String>) -> StoreResult<Vec<Properties>> {
    let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
    let raw: Vec<String> = stmt
        .query_map(params_from_iter(args), |row| row.get(0))
        .map_err(map_sqlite_error)?
        .collect::<Result<_, _>>()
        .map_err(map_sqlite_error)?;

    raw.iter().map(|json| from_json(json)).collect()
}

fn to_json(properties: &Properties) -> StoreResult<String> {
    serde_json::to_string(properties).map_err(|e| StoreError::Invalid(e.to_string()))
}

fn from_json(raw: &str) -> StoreResult<Properties> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Decode(format!("expected object, got {}", other))),
        Err(e) => Err(StoreError::Decode(e.to_string())),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Rejected(err.to_string()),
    }
}
