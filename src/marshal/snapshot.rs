use std::sync::Arc;

use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};

use crate::{marshal::SharedCell, worklet::WorkletDescriptor};

/// An environment-independent copy of a script value.
///
/// Heap variants use `Arc` so snapshots clone cheaply when a worklet closure is
/// handed to several environments. Snapshots are immutable; the one mutable
/// variant is [`Snapshot::Cell`], whose contents are shared by reference.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<Snapshot>>),
    /// Own enumerable properties in engine order.
    Object(Arc<Vec<(String, Snapshot)>>),
    Worklet(WorkletDescriptor),
    Cell(SharedCell),
}

impl Snapshot {
    pub fn string(value: impl AsRef<str>) -> Self {
        Snapshot::String(Arc::from(value.as_ref()))
    }

    pub fn array(items: Vec<Snapshot>) -> Self {
        Snapshot::Array(Arc::new(items))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Snapshot)>) -> Self {
        Snapshot::Object(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        ))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Snapshot::Undefined => "undefined",
            Snapshot::Null => "null",
            Snapshot::Bool(_) => "boolean",
            Snapshot::Number(_) => "number",
            Snapshot::String(_) => "string",
            Snapshot::Array(_) => "array",
            Snapshot::Object(_) => "object",
            Snapshot::Worklet(_) => "worklet",
            Snapshot::Cell(_) => "cell",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Snapshot::Undefined | Snapshot::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Snapshot::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Snapshot::String(s) => Some(s),
            _ => None,
        }
    }

    /// Property lookup on an object snapshot.
    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        match self {
            Snapshot::Object(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Snapshot::Undefined, Snapshot::Undefined) | (Snapshot::Null, Snapshot::Null) => true,
            (Snapshot::Bool(a), Snapshot::Bool(b)) => a == b,
            (Snapshot::Number(a), Snapshot::Number(b)) => a == b,
            (Snapshot::String(a), Snapshot::String(b)) => a == b,
            (Snapshot::Array(a), Snapshot::Array(b)) => a == b,
            (Snapshot::Object(a), Snapshot::Object(b)) => a == b,
            (Snapshot::Worklet(a), Snapshot::Worklet(b)) => a == b,
            (Snapshot::Cell(a), Snapshot::Cell(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Snapshot {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Snapshot::Null,
            serde_json::Value::Bool(b) => Snapshot::Bool(b),
            serde_json::Value::Number(n) => Snapshot::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Snapshot::String(Arc::from(s)),
            serde_json::Value::Array(items) => {
                Snapshot::array(items.into_iter().map(Snapshot::from).collect())
            }
            serde_json::Value::Object(map) => {
                Snapshot::object(map.into_iter().map(|(k, v)| (k, Snapshot::from(v))))
            }
        }
    }
}

impl From<bool> for Snapshot {
    fn from(value: bool) -> Self {
        Snapshot::Bool(value)
    }
}

impl From<f64> for Snapshot {
    fn from(value: f64) -> Self {
        Snapshot::Number(value)
    }
}

impl From<&str> for Snapshot {
    fn from(value: &str) -> Self {
        Snapshot::string(value)
    }
}

impl From<SharedCell> for Snapshot {
    fn from(cell: SharedCell) -> Self {
        Snapshot::Cell(cell)
    }
}

/// JSON view for diagnostics. Undefined becomes `null`, worklets serialize
/// as a summary and cells as their id (cells may form cycles through
/// each other).
impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Snapshot::Undefined | Snapshot::Null => serializer.serialize_unit(),
            Snapshot::Bool(b) => serializer.serialize_bool(*b),
            Snapshot::Number(n) => serializer.serialize_f64(*n),
            Snapshot::String(s) => serializer.serialize_str(s),
            Snapshot::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Snapshot::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Snapshot::Worklet(descriptor) => descriptor.summary().serialize(serializer),
            Snapshot::Cell(cell) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("cell", &cell.id())?;
                map.end()
            }
        }
    }
}
