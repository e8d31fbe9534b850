//! Cypher rendering of graph commands
//!
//! This is the only place Cypher text is produced. Labels, relationship
//! types and property names come from closed enums; every value travels as
//! a statement parameter.

use super::traits::{GraphCommand, Properties};
use serde_json::Value;

/// Name of the full-text index over chunk content
pub const FULLTEXT_INDEX: &str = "chunkContentIndex";

/// A parameterized Cypher statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub parameters: Properties,
}

impl Statement {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Properties::new(),
        }
    }

    fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }
}

/// Statements run once when a store is initialized
pub fn schema_statements() -> Vec<Statement> {
    vec![Statement::new(format!(
        "CREATE FULLTEXT INDEX {} IF NOT EXISTS FOR (c:Chunk) ON EACH [c.content]",
        FULLTEXT_INDEX
    ))]
}

pub fn render(command: &GraphCommand) -> Statement {
    match command {
        GraphCommand::CreateNode { label, properties } => {
            Statement::new(format!("CREATE (n:{} $props)", label))
                .param("props", Value::Object(properties.clone()))
        }
        GraphCommand::CreateEdge {
            rel,
            from,
            to,
            properties,
        } => {
            let (from_label, to_label) = rel.endpoints();
            Statement::new(format!(
                "MATCH (a:{} {{id: $from}}), (b:{} {{id: $to}}) CREATE (a)-[r:{} $props]->(b)",
                from_label, to_label, rel
            ))
            .param("from", from.to_string())
            .param("to", to.to_string())
            .param("props", Value::Object(properties.clone()))
        }
        GraphCommand::SetProperty {
            node,
            property,
            value,
        } => Statement::new(format!(
            "MATCH (n:{} {{id: $id}}) SET n.{} = $value",
            node.label, property
        ))
        .param("id", node.id.to_string())
        .param("value", value.clone()),
        GraphCommand::DeleteNode { node } => {
            Statement::new(format!("MATCH (n:{} {{id: $id}}) DETACH DELETE n", node.label))
                .param("id", node.id.to_string())
        }
        GraphCommand::DeleteEdge { rel, from, to } => {
            let (from_label, to_label) = rel.endpoints();
            Statement::new(format!(
                "MATCH (a:{} {{id: $from}})-[r:{}]->(b:{} {{id: $to}}) DELETE r",
                from_label, rel, to_label
            ))
            .param("from", from.to_string())
            .param("to", to.to_string())
        }
        GraphCommand::ChunksByTag { tag } => Statement::new(
            "MATCH (c:Chunk) WHERE $tag IN c.tags RETURN c ORDER BY c.documentId, c.position",
        )
        .param("tag", tag.as_str()),
        GraphCommand::ChunkFullText { query } => Statement::new(format!(
            "CALL db.index.fulltext.queryNodes('{}', $query) YIELD node RETURN node",
            FULLTEXT_INDEX
        ))
        .param("query", query.as_str()),
        GraphCommand::ChunksSatisfying { requirement } => Statement::new(
            "MATCH (r:Requirement {id: $id})<-[:SATISFIES]-(c:Chunk) RETURN c",
        )
        .param("id", requirement.to_string()),
        GraphCommand::LinkedChunks { chunk } => Statement::new(
            "MATCH (c:Chunk {id: $id})-[:LINKED_TO]->(related:Chunk) RETURN related",
        )
        .param("id", chunk.to_string()),
        GraphCommand::DocumentBySource { source } => {
            Statement::new("MATCH (d:Document {source: $source}) RETURN d LIMIT 1")
                .param("source", source.as_str())
        }
    }
}
