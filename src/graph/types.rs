//! Core type definitions for the object graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to a node in an [`ObjectGraph`](crate::graph::ObjectGraph) arena.
///
/// A `NodeId` never owns the node it names; the graph does. Holding an id
/// after the node (or the graph) is gone is allowed — resolving it through
/// the graph then fails with `GraphError::NodeNotFound` instead of touching
/// freed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// How a graph keeps node classification caches up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationMode {
    /// Re-test every node against the live registry after each mutation.
    Dynamic,
    /// Classes are fixed at node construction and never re-derived.
    Static,
}

/// Equality notion used when importing nodes across graphs to decide
/// whether an incoming node is "already there".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Same node in the same graph instance. Across graphs nothing ever
    /// matches, so every dependency is copied.
    Identity,
    /// Same literal attributes (link attributes ignored).
    Literals,
    /// Same values for the unique attributes of the node's virtual class.
    Unique,
    /// Same attribute names and same literal values for all of them.
    /// Link attributes never match across graphs, so a node carrying
    /// any is always copied.
    Value,
    /// Reserved: match on valid attributes only. Not implemented; using it
    /// fails with `GraphError::UnsupportedOperation`.
    ValidValue,
}
