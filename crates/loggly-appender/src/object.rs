// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured payload graphs.
//!
//! Applications can log an object instead of a string. Its fields become
//! top-level keys of the formatted event. Payloads are modelled as a graph of
//! shared [`ObjectNode`]s so that back references (a child pointing at its
//! parent, a node pointing at itself) can be expressed.
//!
//! # Cycles
//!
//! [`ObjectValue::to_json`] walks the graph depth first and keeps the
//! identities of the nodes on the current path. A field that would re-enter
//! a node already on the path is omitted; the rest of the object is kept.
//! A node reachable twice without a loop (a diamond) is serialized twice.
//!
//! ```text
//!   order ──► customer ──► last_order ─┐
//!     ▲                                │
//!     └────────────────────────────────┘   "last_order" omitted
//! ```

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// A value inside a structured payload.
#[derive(Debug, Clone)]
pub enum ObjectValue {
    /// A plain JSON value (scalar, array or object without shared identity).
    Json(Value),
    /// A shared node with fields.
    Node(Arc<ObjectNode>),
    /// A list that may contain nodes.
    List(Vec<ObjectValue>),
}

/// An object with named fields and an identity.
#[derive(Default)]
pub struct ObjectNode {
    fields: RwLock<Vec<(String, ObjectValue)>>,
}

impl ObjectNode {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(ObjectNode::default())
    }

    #[must_use]
    pub fn with_fields<K, V, I>(fields: I) -> Arc<Self>
    where
        K: Into<String>,
        V: Into<ObjectValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let node = ObjectNode::new();
        for (key, value) in fields {
            node.set(key, value);
        }
        node
    }

    /// Sets a field, replacing an existing one with the same name in place.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ObjectValue>) {
        let key = key.into();
        let value = value.into();
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = fields.iter_mut().find(|(name, _)| *name == key) {
            slot.1 = value;
        } else {
            fields.push((key, value));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Field values are not printed, they may point back at this node.
impl fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ObjectNode")
            .field(
                "fields",
                &fields.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ObjectValue {
    /// Serializes the graph, dropping fields and list items that would close a loop.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut path = HashSet::new();
        self.resolve(&mut path).unwrap_or(Value::Null)
    }

    fn resolve(&self, path: &mut HashSet<*const ObjectNode>) -> Option<Value> {
        match self {
            ObjectValue::Json(value) => Some(value.clone()),
            ObjectValue::List(items) => Some(Value::Array(
                items.iter().filter_map(|item| item.resolve(path)).collect(),
            )),
            ObjectValue::Node(node) => {
                let id = Arc::as_ptr(node);
                if !path.insert(id) {
                    return None;
                }
                let mut map = Map::new();
                {
                    let fields = node.fields.read().unwrap_or_else(PoisonError::into_inner);
                    for (name, value) in fields.iter() {
                        if let Some(value) = value.resolve(path) {
                            map.insert(name.clone(), value);
                        }
                    }
                }
                path.remove(&id);
                Some(Value::Object(map))
            }
        }
    }
}

impl From<Value> for ObjectValue {
    fn from(value: Value) -> Self {
        ObjectValue::Json(value)
    }
}

impl From<Arc<ObjectNode>> for ObjectValue {
    fn from(node: Arc<ObjectNode>) -> Self {
        ObjectValue::Node(node)
    }
}

impl From<Vec<ObjectValue>> for ObjectValue {
    fn from(items: Vec<ObjectValue>) -> Self {
        ObjectValue::List(items)
    }
}

impl From<&str> for ObjectValue {
    fn from(value: &str) -> Self {
        ObjectValue::Json(Value::from(value))
    }
}

impl From<String> for ObjectValue {
    fn from(value: String) -> Self {
        ObjectValue::Json(Value::from(value))
    }
}

impl From<i64> for ObjectValue {
    fn from(value: i64) -> Self {
        ObjectValue::Json(Value::from(value))
    }
}

impl From<f64> for ObjectValue {
    fn from(value: f64) -> Self {
        ObjectValue::Json(Value::from(value))
    }
}

impl From<bool> for ObjectValue {
    fn from(value: bool) -> Self {
        ObjectValue::Json(Value::from(value))
    }
}
