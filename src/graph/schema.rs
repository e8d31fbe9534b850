//! Table layout of the embedded SQLite graph store
//!
//! Nodes and edges keep their properties as JSON text so both stores see the
//! same property maps.

use rusqlite::Connection;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    properties TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id TEXT NOT NULL,
    rel_type TEXT NOT NULL,
    to_id TEXT NOT NULL,
    properties TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id, rel_type);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id, rel_type);
"#;

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
