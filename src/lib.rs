//! Ogma object graph store
//!
//! An embedded, in-memory object graph: nodes carry literal attributes
//! and mirrored directed edges, and are classified dynamically against a
//! registry of schema classes instead of host-language types. Writing a
//! link keeps its reverse edge in sync automatically; reading walks the
//! graph like plain property access.
//!
//! # Core pieces
//!
//! - [`graph::ObjectGraph`]: arena-backed node storage, link
//!   maintenance, classification, queries, merging, persistence
//! - [`graph::ObjectNode`]: one vertex, attribute slots plus a
//!   classification cache
//! - [`schema::SchemaRegistry`]: the class hierarchy nodes are
//!   classified against
//!
//! # Example Usage
//!
//! ```rust
//! use ogma::graph::{ClassificationMode, ObjectGraph};
//! use ogma::schema::{AttrType, Schema, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new();
//! registry
//!     .register(
//!         Schema::builder("Person")
//!             .attr("name", AttrType::text())
//!             .required(["name"])
//!             .unique(["name"])
//!             .build(),
//!     )
//!     .unwrap();
//! registry
//!     .register(
//!         Schema::builder("Movie")
//!             .attr("title", AttrType::text())
//!             .link("director", AttrType::node("Person"), "isDirectorOf")
//!             .required(["title"])
//!             .unique(["title"])
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let mut graph = ObjectGraph::with_registry(registry, ClassificationMode::Dynamic);
//!
//! let nolan = graph.find_or_create("Person", &[("name", "Christopher Nolan".into())]).unwrap();
//! let movie = graph.create_node_of("Movie", [
//!     ("title".to_string(), "Inception".into(), None),
//! ]).unwrap();
//! graph.set(movie, "director", nolan, None).unwrap();
//!
//! // The reverse edge exists without ever being written explicitly.
//! let directed: Vec<_> = graph.get(nolan, "isDirectorOf").unwrap().targets().collect();
//! assert_eq!(directed, vec![movie]);
//!
//! // Chained access collapses singleton links.
//! use ogma::graph::{ChainValue, Value};
//! assert_eq!(
//!     graph.get_chained(movie, &["director", "name"]).unwrap(),
//!     ChainValue::Literal(Value::Text("Christopher Nolan".into())),
//! );
//! ```

pub mod graph;
pub mod schema;

pub use graph::{
    ChainValue, ClassificationMode, GraphError, GraphResult, Link, LiteralKind, MergePolicy,
    NodeId, ObjectGraph, ObjectNode, Prop, SetValue, Value,
};
pub use schema::{AttrType, Schema, SchemaBuilder, SchemaError, SchemaRegistry, BASE_CLASS};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
