//! Schema descriptors and the class registry
//!
//! A [`Schema`] is per-class metadata: which attributes instances carry,
//! which of them are required for a node to classify as the class, which
//! identify an instance for merge purposes, and which mirror names to use
//! for automatically created reverse edges. The [`SchemaRegistry`] owns
//! the set of known classes and the single-inheritance hierarchy between
//! them; nodes are classified against it, never against host-language
//! types.

use crate::graph::value::LiteralKind;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the universal base class every registry starts with.
pub const BASE_CLASS: &str = "Object";

/// Declared type of a schema attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    /// A literal scalar of the given kind.
    Literal(LiteralKind),
    /// A single link to a node of the given class.
    Node(String),
    /// Zero or more links to nodes of the given class.
    Many(String),
}

impl AttrType {
    pub fn text() -> Self {
        AttrType::Literal(LiteralKind::Text)
    }

    pub fn integer() -> Self {
        AttrType::Literal(LiteralKind::Integer)
    }

    pub fn float() -> Self {
        AttrType::Literal(LiteralKind::Float)
    }

    pub fn boolean() -> Self {
        AttrType::Literal(LiteralKind::Boolean)
    }

    pub fn node(class: impl Into<String>) -> Self {
        AttrType::Node(class.into())
    }

    pub fn many(class: impl Into<String>) -> Self {
        AttrType::Many(class.into())
    }

    /// The expected class for node-valued attributes, regardless of
    /// multiplicity.
    pub fn node_class(&self) -> Option<&str> {
        match self {
            AttrType::Node(c) | AttrType::Many(c) => Some(c),
            AttrType::Literal(_) => None,
        }
    }

    /// The expected literal kind, if this is a literal attribute.
    pub fn literal_kind(&self) -> Option<LiteralKind> {
        match self {
            AttrType::Literal(k) => Some(*k),
            _ => None,
        }
    }
}

/// Errors raised while validating a class definition at registration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("class '{class}' names unknown parent class '{parent}'")]
    UnknownParent { class: String, parent: String },

    #[error("class '{0}' has not been registered")]
    UnknownClass(String),

    #[error("in '{class}': '{list}' names attribute '{attr}' which is not in the schema")]
    NotInSchema {
        class: String,
        list: &'static str,
        attr: String,
    },

    #[error("in '{class}': node-valued attribute '{attr}' declares no mirror name")]
    MissingMirror { class: String, attr: String },

    #[error("in '{class}': mirror declared for '{attr}' which is not a node-valued attribute")]
    MirrorOnLiteral { class: String, attr: String },

    #[error("in '{class}': '{list}' must be a superset of the parent class's")]
    NotParentSuperset { class: String, list: &'static str },
}

/// Per-class descriptor: attribute typing, validity, identity, and
/// mirror-edge naming. Carries no logic beyond lookups.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    parent: Option<String>,
    attributes: IndexMap<String, AttrType>,
    required: IndexSet<String>,
    unique: IndexSet<String>,
    reverse_mirrors: IndexMap<String, String>,
    implicit: IndexSet<String>,
}

impl Schema {
    /// Start building a class descriptor. The parent defaults to the
    /// base class.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                name: name.into(),
                parent: Some(BASE_CLASS.to_string()),
                attributes: IndexMap::new(),
                required: IndexSet::new(),
                unique: IndexSet::new(),
                reverse_mirrors: IndexMap::new(),
                implicit: IndexSet::new(),
            },
        }
    }

    fn base() -> Self {
        Schema {
            name: BASE_CLASS.to_string(),
            parent: None,
            attributes: IndexMap::new(),
            required: IndexSet::new(),
            unique: IndexSet::new(),
            reverse_mirrors: IndexMap::new(),
            implicit: IndexSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Declared type of an attribute, if the schema knows it.
    pub fn attr_type(&self, name: &str) -> Option<&AttrType> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttrType)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attributes that must be present and correctly typed for a node to
    /// satisfy this class.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(|s| s.as_str())
    }

    /// Attributes whose combined values identify an instance for merge
    /// and deduplication purposes.
    pub fn unique(&self) -> impl Iterator<Item = &str> {
        self.unique.iter().map(|s| s.as_str())
    }

    /// Mirror name to use when the given attribute is linked.
    pub fn mirror_for(&self, attr: &str) -> Option<&str> {
        self.reverse_mirrors.get(attr).map(|s| s.as_str())
    }

    /// Whether the attribute is an auto-generated mirror, suppressed
    /// from default rendering.
    pub fn is_implicit(&self, attr: &str) -> bool {
        self.implicit.contains(attr)
    }

    pub fn implicit(&self) -> impl Iterator<Item = &str> {
        self.implicit.iter().map(|s| s.as_str())
    }
}

/// Builder for [`Schema`] values.
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.schema.parent = Some(parent.into());
        self
    }

    /// Declare an attribute and its expected type.
    pub fn attr(mut self, name: impl Into<String>, ty: AttrType) -> Self {
        self.schema.attributes.insert(name.into(), ty);
        self
    }

    /// Declare a node-valued attribute together with its mirror name.
    pub fn link(
        mut self,
        name: impl Into<String>,
        ty: AttrType,
        mirror: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.schema.attributes.insert(name.clone(), ty);
        self.schema.reverse_mirrors.insert(name, mirror.into());
        self
    }

    /// Mark attributes as required for classification.
    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.required.extend(names.into_iter().map(Into::into));
        self
    }

    /// Mark attributes as identifying for merge purposes.
    pub fn unique<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.unique.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Registry of class descriptors, seeded with the base class.
///
/// Iteration order is insertion order; classification and rendering rely
/// on that being deterministic.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    classes: IndexMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let mut classes = IndexMap::new();
        classes.insert(BASE_CLASS.to_string(), Schema::base());
        SchemaRegistry { classes }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.classes.get(name)
    }

    /// Like [`get`](Self::get), but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<&Schema, SchemaError> {
        self.classes
            .get(name)
            .ok_or_else(|| SchemaError::UnknownClass(name.to_string()))
    }

    /// All registered schemas, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.classes.values()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether `class` is `ancestor` or derives from it. Unknown names
    /// are not subclasses of anything.
    pub fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.classes.get(name).and_then(|s| s.parent());
        }
        false
    }

    /// Distance from the base class (base itself is 0).
    pub fn depth(&self, class: &str) -> usize {
        let mut depth = 0;
        let mut current = self.classes.get(class).and_then(|s| s.parent());
        while let Some(name) = current {
            depth += 1;
            current = self.classes.get(name).and_then(|s| s.parent());
        }
        depth
    }

    /// The given class and all of its registered subclasses.
    pub fn subclasses(&self, class: &str) -> Vec<String> {
        self.classes
            .keys()
            .filter(|c| self.is_subclass(c, class))
            .cloned()
            .collect()
    }

    /// Validate and install a class definition.
    ///
    /// The child inherits its parent's attributes, mirrors, and implicit
    /// set; its own declarations take precedence. Mirror declarations
    /// propagate to the linked class and its registered subclasses,
    /// creating the implicit reverse attribute there (so `Comment.movie`
    /// with mirror `comments` makes `Movie.comments` exist).
    ///
    /// Re-registering an existing class name is ignored with a warning.
    pub fn register(&mut self, schema: Schema) -> Result<(), SchemaError> {
        if self.classes.contains_key(schema.name()) {
            warn!(class = schema.name(), "class already registered, ignoring new definition");
            return Ok(());
        }

        let own_mirrors = schema.reverse_mirrors.clone();
        let merged = self.validate(schema)?;
        let name = merged.name.clone();

        debug!(class = %name, attrs = merged.attributes.len(), "registering class");
        self.classes.insert(name.clone(), merged);
        self.propagate_mirrors(&name, &own_mirrors);

        Ok(())
    }

    /// Check a definition against its parent and return the merged
    /// (inheritance-resolved) descriptor.
    fn validate(&self, mut schema: Schema) -> Result<Schema, SchemaError> {
        let class = schema.name.clone();

        let parent_name = schema.parent.clone().unwrap_or_else(|| BASE_CLASS.to_string());
        let parent = self
            .classes
            .get(&parent_name)
            .ok_or_else(|| SchemaError::UnknownParent {
                class: class.clone(),
                parent: parent_name.clone(),
            })?;

        // Node-valued attributes must reference registered classes; the
        // class being defined may reference itself.
        for ty in schema.attributes.values() {
            if let Some(target) = ty.node_class() {
                if target != class && !self.classes.contains_key(target) {
                    return Err(SchemaError::UnknownClass(target.to_string()));
                }
            }
        }

        // Inherit from the parent; own declarations win.
        let mut attributes = parent.attributes.clone();
        attributes.extend(schema.attributes.clone());
        let mut mirrors = parent.reverse_mirrors.clone();
        mirrors.extend(schema.reverse_mirrors.clone());
        let mut implicit = parent.implicit.clone();
        implicit.extend(schema.implicit.iter().cloned());

        let required: IndexSet<String> = schema.required.iter().cloned().collect();
        let unique: IndexSet<String> = schema.unique.iter().cloned().collect();

        for (list, set) in [("required", &required), ("unique", &unique)] {
            if let Some(attr) = set.iter().find(|a| !attributes.contains_key(*a)) {
                return Err(SchemaError::NotInSchema {
                    class,
                    list,
                    attr: attr.clone(),
                });
            }
        }
        if let Some(attr) = mirrors.keys().find(|a| !attributes.contains_key(*a)) {
            return Err(SchemaError::NotInSchema {
                class,
                list: "mirrors",
                attr: attr.clone(),
            });
        }

        // Required/unique may only grow down the hierarchy.
        if !parent.required.is_subset(&required) {
            return Err(SchemaError::NotParentSuperset {
                class,
                list: "required",
            });
        }
        if !parent.unique.is_subset(&unique) {
            return Err(SchemaError::NotParentSuperset {
                class,
                list: "unique",
            });
        }

        // Every explicit node-valued attribute needs a mirror name, and
        // mirrors may only name node-valued attributes.
        for (attr, ty) in &attributes {
            let is_node = ty.node_class().is_some();
            let has_mirror = mirrors.contains_key(attr);
            if implicit.contains(attr) {
                continue;
            }
            if is_node && !has_mirror {
                return Err(SchemaError::MissingMirror {
                    class,
                    attr: attr.clone(),
                });
            }
            if !is_node && has_mirror {
                return Err(SchemaError::MirrorOnLiteral {
                    class,
                    attr: attr.clone(),
                });
            }
        }

        schema.parent = Some(parent_name);
        schema.attributes = attributes;
        schema.reverse_mirrors = mirrors;
        schema.implicit = implicit;
        schema.required = required;
        schema.unique = unique;
        Ok(schema)
    }

    /// Install the implicit reverse attribute on every class a mirror
    /// declaration points at.
    fn propagate_mirrors(&mut self, class: &str, own_mirrors: &IndexMap<String, String>) {
        for (attr, mirror) in own_mirrors {
            let Some(target_class) = self
                .classes
                .get(class)
                .and_then(|s| s.attributes.get(attr))
                .and_then(|t| t.node_class())
                .map(str::to_string)
            else {
                continue;
            };

            for c in self.subclasses(&target_class) {
                let Some(target) = self.classes.get_mut(&c) else {
                    continue;
                };
                target
                    .attributes
                    .insert(mirror.clone(), AttrType::Many(class.to_string()));
                target.implicit.insert(mirror.clone());
                target
                    .reverse_mirrors
                    .insert(mirror.clone(), attr.clone());
                debug!(class = %c, attr = %mirror, source = %class, "implicit mirror attribute added");
            }
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
