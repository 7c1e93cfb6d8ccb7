//! Interning of object schemas.
//!
//! A schema's identity is its declaring type together with the resolved
//! generic arguments it was instantiated with: `Page<Account>` and
//! `Page<Order>` are two schemas, `Page<Account>` requested twice is one.

use crate::introspect::TypeDecl;
use crate::model::{SchemaId, Shape};
use log::debug;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Serialized property name.
    pub name: String,
    pub shape: Shape,
    pub required: bool,
    pub description: Option<String>,
}

/// Fields and description produced for a freshly interned schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaBody {
    pub fields: Vec<SchemaField>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub id: SchemaId,
    /// Simple name of the declaring type.
    pub type_name: String,
    pub qualified_name: String,
    pub generic_args: Vec<Shape>,
    /// Encoded generic arguments, empty for non-generic schemas.
    pub signature: String,
    pub fields: Vec<SchemaField>,
    pub description: Option<String>,
}

type SchemaKey = (String, Vec<Shape>);

/// Arena of schema entries.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: Vec<SchemaEntry>,
    index: HashMap<SchemaKey, usize>,
    taken: HashSet<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `decl` instantiated with `args`, creating the entry
    /// on first request.
    ///
    /// The entry is reserved before `body` runs, so a type reaching itself
    /// through its fields gets the reserved id back instead of recursing.
    /// `body` runs at most once per identity.
    pub fn intern<F>(&mut self, decl: &TypeDecl, args: Vec<Shape>, body: F) -> SchemaId
    where
        F: FnOnce(&mut SchemaRegistry) -> SchemaBody,
    {
        let key = (decl.qualified_name.clone(), args);
        if let Some(&slot) = self.index.get(&key) {
            return self.entries[slot].id.clone();
        }

        let signature = key.1.iter().map(encode).collect::<Vec<_>>().join(".");
        let base = if signature.is_empty() {
            decl.name.clone()
        } else {
            format!("{}.{}", decl.name, signature)
        };
        let id = self.unique_id(base);
        debug!("Registering schema {} for {}", id, decl.qualified_name);

        let slot = self.entries.len();
        self.entries.push(SchemaEntry {
            id: id.clone(),
            type_name: decl.name.clone(),
            qualified_name: decl.qualified_name.clone(),
            generic_args: key.1.clone(),
            signature,
            fields: Vec::new(),
            description: None,
        });
        self.index.insert(key, slot);

        let SchemaBody {
            fields,
            description,
        } = body(self);
        let entry = &mut self.entries[slot];
        entry.fields = fields;
        entry.description = description;

        id
    }

    fn unique_id(&mut self, base: String) -> SchemaId {
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        SchemaId(candidate)
    }

    pub fn get(&self, id: &SchemaId) -> Option<&SchemaEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deterministic text form of a generic argument.
pub fn encode(shape: &Shape) -> String {
    match shape {
        Shape::Primitive(kind, format) => format
            .map(|f| f.as_str())
            .unwrap_or_else(|| kind.as_str())
            .to_string(),
        Shape::ArrayOf(inner) => format!("Array-{}", encode(inner)),
        Shape::MapOf(inner) => format!("Map-{}", encode(inner)),
        Shape::EnumOf(literals) => literals.name.clone(),
        Shape::Reference(id) => id.to_string(),
        Shape::Unknown => "Object".to_string(),
    }
}
