//! Graph store interface
//!
//! Every operation the crate performs against a graph store is one variant of
//! the closed [`GraphCommand`] enum. Node labels, relationship types and
//! updatable properties are closed enums too, so a backend never has to
//! splice a caller-supplied name into a statement.

use crate::retry::FailureType;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Property map of a node or edge
pub type Properties = Map<String, Value>;

/// Errors returned by graph store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or answered with a server error
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    /// The store answered and refused the command
    #[error("Graph store rejected the command: {0}")]
    Rejected(String),

    /// The command was malformed before it reached the store
    #[error("Invalid graph command: {0}")]
    Invalid(String),

    /// A node read back from the store could not be decoded
    #[error("Unreadable graph record: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Unavailable(_) => FailureType::Transient,
            Self::Rejected(_) | Self::Invalid(_) | Self::Decode(_) => FailureType::Permanent,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Document,
    Chunk,
    Requirement,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Chunk => "Chunk",
            Self::Requirement => "Requirement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Some(Self::Document),
            "chunk" => Some(Self::Chunk),
            "requirement" => Some(Self::Requirement),
            _ => None,
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelType {
    /// Document -> Chunk
    HasChunk,
    /// Chunk -> Chunk, with a `type` property
    LinkedTo,
    /// Chunk -> Requirement
    Satisfies,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasChunk => "HAS_CHUNK",
            Self::LinkedTo => "LINKED_TO",
            Self::Satisfies => "SATISFIES",
        }
    }

    /// Labels of the start and end node
    pub fn endpoints(&self) -> (NodeLabel, NodeLabel) {
        match self {
            Self::HasChunk => (NodeLabel::Document, NodeLabel::Chunk),
            Self::LinkedTo => (NodeLabel::Chunk, NodeLabel::Chunk),
            Self::Satisfies => (NodeLabel::Chunk, NodeLabel::Requirement),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HAS_CHUNK" => Some(Self::HasChunk),
            "LINKED_TO" => Some(Self::LinkedTo),
            "SATISFIES" => Some(Self::Satisfies),
            _ => None,
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node properties that may change after creation
///
/// Chunk content is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Title,
    Author,
    Tags,
    Metadata,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Tags => "tags",
            Self::Metadata => "metadata",
        }
    }

    /// Whether nodes with `label` carry this property
    pub fn applies_to(&self, label: NodeLabel) -> bool {
        match self {
            Self::Title => matches!(label, NodeLabel::Document | NodeLabel::Requirement),
            Self::Author => label == NodeLabel::Document,
            Self::Tags => matches!(label, NodeLabel::Document | NodeLabel::Chunk),
            Self::Metadata => label == NodeLabel::Chunk,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Some(Self::Title),
            "author" => Some(Self::Author),
            "tags" => Some(Self::Tags),
            "metadata" => Some(Self::Metadata),
            _ => None,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node addressed by label and id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub id: Uuid,
}

impl NodeRef {
    pub fn new(label: NodeLabel, id: Uuid) -> Self {
        Self { label, id }
    }

    pub fn document(id: Uuid) -> Self {
        Self::new(NodeLabel::Document, id)
    }

    pub fn chunk(id: Uuid) -> Self {
        Self::new(NodeLabel::Chunk, id)
    }

    pub fn requirement(id: Uuid) -> Self {
        Self::new(NodeLabel::Requirement, id)
    }
}

/// Every operation a graph store must support
#[derive(Debug, Clone, PartialEq)]
pub enum GraphCommand {
    /// `properties` must carry a string `id`
    CreateNode {
        label: NodeLabel,
        properties: Properties,
    },
    CreateEdge {
        rel: RelType,
        from: Uuid,
        to: Uuid,
        properties: Properties,
    },
    SetProperty {
        node: NodeRef,
        property: Property,
        value: Value,
    },
    /// Removes the node and every edge touching it
    DeleteNode { node: NodeRef },
    DeleteEdge { rel: RelType, from: Uuid, to: Uuid },
    ChunksByTag { tag: String },
    ChunkFullText { query: String },
    ChunksSatisfying { requirement: Uuid },
    LinkedChunks { chunk: Uuid },
    DocumentBySource { source: String },
}

impl GraphCommand {
    /// Read commands return node property maps; writes return nothing
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ChunksByTag { .. }
                | Self::ChunkFullText { .. }
                | Self::ChunksSatisfying { .. }
                | Self::LinkedChunks { .. }
                | Self::DocumentBySource { .. }
        )
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateNode { .. } => "create_node",
            Self::CreateEdge { .. } => "create_edge",
            Self::SetProperty { .. } => "set_property",
            Self::DeleteNode { .. } => "delete_node",
            Self::DeleteEdge { .. } => "delete_edge",
            Self::ChunksByTag { .. } => "chunks_by_tag",
            Self::ChunkFullText { .. } => "chunk_full_text",
            Self::ChunksSatisfying { .. } => "chunks_satisfying",
            Self::LinkedChunks { .. } => "linked_chunks",
            Self::DocumentBySource { .. } => "document_by_source",
        }
    }
}

/// A graph store backend
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Prepares indexes or tables; safe to call repeatedly
    async fn initialize(&self) -> StoreResult<()>;

    /// Executes one command; reads return one property map per node
    async fn execute(&self, command: &GraphCommand) -> StoreResult<Vec<Properties>>;

    fn backend_name(&self) -> &'static str;
}
