//! Object graph implementation
//!
//! This module implements the object graph data model:
//! - Nodes with literal attributes and mirrored directed edges
//! - Arena storage with stable [`NodeId`] handles
//! - Dynamic multi-classification against the schema registry
//! - Chained traversal, queries, cross-graph merging, and persistence

pub mod node;
pub mod store;
pub mod types;
pub mod value;

// Re-export main types
pub use node::{Link, ObjectNode, Prop};
pub use store::{
    default_mirror, ChainValue, GraphError, GraphResult, NodeDisplay, ObjectGraph, SetValue,
};
pub use types::{ClassificationMode, MergePolicy, NodeId};
pub use value::{LiteralKind, Value};
