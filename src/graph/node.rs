//! Node implementation for the object graph
//!
//! An [`ObjectNode`] is one vertex of the graph. It stores literal
//! attributes inline and link attributes as sets of mirrored directed
//! edges, and carries a cache of the schema classes it currently
//! satisfies. All edge mutation goes through the owning
//! [`ObjectGraph`](super::ObjectGraph), which keeps both directions of
//! every edge consistent; the methods here only touch this node's own
//! slot map.

use super::types::NodeId;
use super::value::Value;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// One directed edge entry as seen from its source node.
///
/// The mirror name is the attribute under which the reverse entry lives
/// on the target node; the graph guarantees that entry exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub target: NodeId,
    pub mirror: String,
}

impl Link {
    pub fn new(target: NodeId, mirror: impl Into<String>) -> Self {
        Link {
            target,
            mirror: mirror.into(),
        }
    }
}

/// Storage for one attribute name. A name holds either a literal or an
/// edge set, never both; writing one kind evicts the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Slot {
    Literal(Value),
    Links(Vec<Link>),
}

/// Borrowed view of one attribute, as returned by `get`.
///
/// `get` never fails for a missing attribute; it yields [`Prop::Absent`],
/// which callers must handle before chaining further lookups.
#[derive(Debug, Clone, Copy)]
pub enum Prop<'a> {
    Absent,
    Literal(&'a Value),
    Links(&'a [Link]),
}

impl<'a> Prop<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Prop::Absent)
    }

    pub fn as_literal(&self) -> Option<&'a Value> {
        match self {
            Prop::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_links(&self) -> Option<&'a [Link]> {
        match self {
            Prop::Links(links) => Some(links),
            _ => None,
        }
    }

    /// Pull-based iterator over the linked node ids (empty for literals
    /// and absent attributes).
    pub fn targets(&self) -> impl Iterator<Item = NodeId> + 'a {
        let links: &'a [Link] = match self {
            Prop::Links(links) => links,
            _ => &[],
        };
        links.iter().map(|l| l.target)
    }
}

/// A node in the object graph.
///
/// Equality on `ObjectNode` is identity (same id in the same graph);
/// structural comparison is a separate, explicit operation
/// ([`same_properties`](Self::same_properties)) because two nodes with
/// equal attributes are still distinct vertices. For the same reason the
/// type exposes no content hash — `Hash` is by id only, and a structural
/// hash of a mutable node would never be stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectNode {
    /// Handle of this node in the owning graph's arena.
    pub id: NodeId,

    /// Attribute slots, in insertion order.
    pub(crate) attrs: IndexMap<String, Slot>,

    /// Classification cache: names of the schemas this node currently
    /// satisfies, in registry iteration order. Recomputed, never saved
    /// as authoritative state.
    pub(crate) classes: IndexSet<String>,
}

impl ObjectNode {
    pub(crate) fn new(id: NodeId) -> Self {
        ObjectNode {
            id,
            attrs: IndexMap::new(),
            classes: IndexSet::new(),
        }
    }

    /// Look up one attribute.
    pub fn get(&self, name: &str) -> Prop<'_> {
        match self.attrs.get(name) {
            None => Prop::Absent,
            Some(Slot::Literal(v)) => Prop::Literal(v),
            Some(Slot::Links(links)) => Prop::Links(links),
        }
    }

    /// Whether `name` is some attribute of this node, literal or link.
    pub fn contains_key(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Overwrite the literal slot for `name`, evicting a stale edge set
    /// under the same name if one exists.
    pub(crate) fn set_literal(&mut self, name: impl Into<String>, value: Value) {
        self.attrs.insert(name.into(), Slot::Literal(value));
    }

    /// Add one edge entry under `name`. A stale literal under the same
    /// name is evicted first.
    pub(crate) fn add_edge_entry(&mut self, name: &str, link: Link) {
        match self.attrs.get_mut(name) {
            Some(Slot::Links(links)) => links.push(link),
            _ => {
                self.attrs.insert(name.to_string(), Slot::Links(vec![link]));
            }
        }
    }

    /// Remove one matching edge entry under `name`. Returns whether an
    /// entry was removed; an empty edge set disappears entirely so the
    /// attribute reads as absent afterwards.
    pub(crate) fn remove_edge_entry(&mut self, name: &str, target: NodeId, mirror: &str) -> bool {
        let Some(Slot::Links(links)) = self.attrs.get_mut(name) else {
            return false;
        };
        let Some(pos) = links
            .iter()
            .position(|l| l.target == target && l.mirror == mirror)
        else {
            return false;
        };
        links.remove(pos);
        if links.is_empty() {
            self.attrs.shift_remove(name);
        }
        true
    }

    /// Edge entries under `name` (empty for literals and absent names).
    pub fn links(&self, name: &str) -> &[Link] {
        match self.attrs.get(name) {
            Some(Slot::Links(links)) => links,
            _ => &[],
        }
    }

    // --- container protocol -------------------------------------------

    /// Names of the literal attributes, in insertion order.
    pub fn literal_keys(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Literal(_)))
            .map(|(k, _)| k.as_str())
    }

    /// Names of the link attributes, in insertion order.
    pub fn edge_keys(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Links(_)))
            .map(|(k, _)| k.as_str())
    }

    /// All attribute names: literals first, then links.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.literal_keys().chain(self.edge_keys())
    }

    /// Literal attributes as `(name, value)` pairs.
    pub fn literal_items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().filter_map(|(k, s)| match s {
            Slot::Literal(v) => Some((k.as_str(), v)),
            Slot::Links(_) => None,
        })
    }

    /// Link attributes as `(name, edge set)` pairs.
    pub fn edge_items(&self) -> impl Iterator<Item = (&str, &[Link])> {
        self.attrs.iter().filter_map(|(k, s)| match s {
            Slot::Links(links) => Some((k.as_str(), links.as_slice())),
            Slot::Literal(_) => None,
        })
    }

    /// All attributes in key order (literals first, then links).
    pub fn items(&self) -> impl Iterator<Item = (&str, Prop<'_>)> {
        self.literal_items()
            .map(|(k, v)| (k, Prop::Literal(v)))
            .chain(self.edge_items().map(|(k, l)| (k, Prop::Links(l))))
    }

    /// All attribute values in key order.
    pub fn values(&self) -> impl Iterator<Item = Prop<'_>> {
        self.items().map(|(_, v)| v)
    }

    /// Number of attributes of either kind.
    pub fn attr_count(&self) -> usize {
        self.attrs.len()
    }

    // --- classification cache -----------------------------------------

    /// Names of the schemas this node currently satisfies.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.as_str())
    }

    /// Class membership test. This is the supported "is-a" query; the
    /// cache is the only source of truth for a node's classes.
    pub fn is_instance(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub(crate) fn set_classes(&mut self, classes: impl IntoIterator<Item = String>) {
        self.classes = classes.into_iter().collect();
    }

    // --- structural equality ------------------------------------------

    /// Full structural equality: same attribute names and, for each,
    /// equal values. Link attributes compare by target identity within
    /// the graph (same node ids, order-insensitive).
    pub fn same_properties(&self, other: &ObjectNode) -> bool {
        self.same_properties_excluding(other, &[])
    }

    /// Structural equality ignoring the given attribute names (used to
    /// skip auto-generated mirror attributes during merges).
    pub fn same_properties_excluding(&self, other: &ObjectNode, exclude: &[&str]) -> bool {
        let mine: Vec<&str> = self.keys().filter(|k| !exclude.contains(k)).collect();
        let theirs: Vec<&str> = other.keys().filter(|k| !exclude.contains(k)).collect();
        if mine.len() != theirs.len() {
            return false;
        }
        mine.iter()
            .all(|k| theirs.contains(k) && self.attr_equal(other, k))
    }

    /// Structural equality over a chosen subset of attribute names.
    pub fn same_properties_over<'a>(
        &self,
        other: &ObjectNode,
        names: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        names.into_iter().all(|k| self.attr_equal(other, k))
    }

    /// Cross-graph structural equality: same attribute names (minus the
    /// excluded ones) and equal literal values for all of them. Node
    /// identity does not carry across graphs, so a link attribute on
    /// either side makes the nodes differ.
    pub fn same_literal_content(&self, other: &ObjectNode, exclude: &[&str]) -> bool {
        let mine: Vec<&str> = self.keys().filter(|k| !exclude.contains(k)).collect();
        let theirs: Vec<&str> = other.keys().filter(|k| !exclude.contains(k)).collect();
        if mine.len() != theirs.len() {
            return false;
        }
        mine.iter().all(|k| {
            theirs.contains(k)
                && matches!(
                    (self.attrs.get(*k), other.attrs.get(*k)),
                    (Some(Slot::Literal(a)), Some(Slot::Literal(b))) if a == b
                )
        })
    }

    fn attr_equal(&self, other: &ObjectNode, name: &str) -> bool {
        match (self.attrs.get(name), other.attrs.get(name)) {
            (None, None) => true,
            (Some(Slot::Literal(a)), Some(Slot::Literal(b))) => a == b,
            (Some(Slot::Links(a)), Some(Slot::Links(b))) => {
                let mut a: Vec<NodeId> = a.iter().map(|l| l.target).collect();
                let mut b: Vec<NodeId> = b.iter().map(|l| l.target).collect();
                a.sort_unstable();
                b.sort_unstable();
                a == b
            }
            _ => false,
        }
    }
}

/// Identity equality: same vertex handle. Structural comparison is
/// [`ObjectNode::same_properties`].
impl PartialEq for ObjectNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectNode {}

impl std::hash::Hash for ObjectNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
