//! Moving values across the environment boundary.
//!
//! [`wrap`] copies a script value out of an environment into a [`Snapshot`];
//! [`unwrap`] rebuilds a fresh script value from a snapshot inside another
//! (or the same) environment. Unwrapping never consumes the snapshot.
//!
//! Values with no portable form become `undefined` placeholders rather than
//! errors: symbols, bigints, plain functions, cyclic back-references, values
//! nested deeper than [`MAX_MARSHAL_DEPTH`] and properties whose getters throw.
//! Functions decorated as worklets travel as descriptors, and shared-cell
//! views travel by reference.

pub mod shared_cell;
mod snapshot;


use boa_engine::{
    Context, JsObject, JsString, JsValue, object::builtins::JsArray, property::PropertyKey,
};

use crate::{
    config::MAX_MARSHAL_DEPTH,
    worklet::{WorkletDescriptor, descriptor, materialize},
};

pub use shared_cell::SharedCell;
pub use snapshot::Snapshot;

/// Copies `value` out of `context`.
pub fn wrap(context: &mut Context, value: &JsValue) -> Snapshot {
    Marshaler::new().wrap(context, value)
}

/// Builds a fresh value for `snapshot` inside `context`.
pub fn unwrap(snapshot: &Snapshot, context: &mut Context) -> JsValue {
    match snapshot {
        Snapshot::Undefined => JsValue::undefined(),
        Snapshot::Null => JsValue::null(),
        Snapshot::Bool(b) => JsValue::from(*b),
        Snapshot::Number(n) => JsValue::from(*n),
        Snapshot::String(s) => JsValue::from(JsString::from(&**s)),
        Snapshot::Array(items) => {
            let values: Vec<JsValue> = items.iter().map(|item| unwrap(item, context)).collect();
            JsArray::from_iter(values, context).into()
        }
        Snapshot::Object(entries) => {
            let object = JsObject::with_object_proto(context.intrinsics());
            for (key, value) in entries.iter() {
                let value = unwrap(value, context);
                if let Err(err) = object.set(JsString::from(key.as_str()), value, false, context) {
                    tracing::trace!(key = %key, error = %err, "dropping property during unwrap");
                }
            }
            object.into()
        }
        Snapshot::Worklet(descriptor) => materialize::nested_callable(descriptor, context),
        Snapshot::Cell(cell) => cell.to_js(context).into(),
    }
}

/// Walks one value tree. The ancestor chain detects cycles and bounds depth;
/// a value reached twice through different paths (a DAG) is copied twice.
pub(crate) struct Marshaler {
    ancestors: Vec<JsObject>,
}

impl Marshaler {
    pub(crate) fn new() -> Self {
        Self {
            ancestors: Vec::new(),
        }
    }

    pub(crate) fn wrap(&mut self, context: &mut Context, value: &JsValue) -> Snapshot {
        if value.is_undefined() {
            return Snapshot::Undefined;
        }
        if value.is_null() {
            return Snapshot::Null;
        }
        if let Some(b) = value.as_boolean() {
            return Snapshot::Bool(b);
        }
        if let Some(n) = value.as_number() {
            return Snapshot::Number(n);
        }
        if let Some(s) = value.as_string() {
            return Snapshot::string(s.to_std_string_escaped());
        }
        match value.as_object() {
            Some(object) => self.wrap_object(context, object),
            None => {
                tracing::trace!("value has no portable form; using undefined");
                Snapshot::Undefined
            }
        }
    }

    /// Marks `object` as being walked. Pair with [`Marshaler::leave`].
    pub(crate) fn enter(&mut self, object: &JsObject) {
        self.ancestors.push(object.clone());
    }

    pub(crate) fn leave(&mut self) {
        self.ancestors.pop();
    }

    fn wrap_object(&mut self, context: &mut Context, object: &JsObject) -> Snapshot {
        if self.ancestors.len() >= MAX_MARSHAL_DEPTH {
            tracing::debug!(depth = self.ancestors.len(), "value nested too deeply; using undefined");
            return Snapshot::Undefined;
        }
        if self
            .ancestors
            .iter()
            .any(|ancestor| JsObject::equals(ancestor, object))
        {
            tracing::debug!("cyclic reference; using undefined");
            return Snapshot::Undefined;
        }
        if let Some(cell) = SharedCell::from_js(object, context) {
            return Snapshot::Cell(cell);
        }
        if object.is_callable() {
            return self.wrap_function(context, object);
        }

        self.enter(object);
        let snapshot = if object.is_array() {
            self.wrap_array(context, object)
        } else {
            self.wrap_plain(context, object)
        };
        self.leave();
        snapshot
    }

    fn wrap_function(&mut self, context: &mut Context, function: &JsObject) -> Snapshot {
        if !descriptor::is_decorated(context, function) {
            tracing::trace!("plain function has no portable form; using undefined");
            return Snapshot::Undefined;
        }
        match WorkletDescriptor::parse_function(context, function, self) {
            Ok(Some(descriptor)) => Snapshot::Worklet(descriptor),
            Ok(None) => Snapshot::Undefined,
            Err(err) => {
                tracing::warn!(location = err.location(), "nested worklet rejected: {err}");
                Snapshot::Undefined
            }
        }
    }

    fn wrap_array(&mut self, context: &mut Context, object: &JsObject) -> Snapshot {
        let Ok(array) = JsArray::from_object(object.clone()) else {
            return Snapshot::Undefined;
        };
        let len = array.length(context).unwrap_or(0);
        let mut items = Vec::new();
        for i in 0..len {
            let item = match array.get(i, context) {
                Ok(item) => self.wrap(context, &item),
                Err(_) => Snapshot::Undefined,
            };
            items.push(item);
        }
        Snapshot::array(items)
    }

    fn wrap_plain(&mut self, context: &mut Context, object: &JsObject) -> Snapshot {
        let keys = match object.own_property_keys(context) {
            Ok(keys) => keys,
            Err(err) => {
                tracing::debug!(error = %err, "could not list properties; using undefined");
                return Snapshot::Undefined;
            }
        };
        let is_enumerable = context
            .intrinsics()
            .constructors()
            .object()
            .prototype()
            .get(JsString::from("propertyIsEnumerable"), context)
            .ok()
            .and_then(|f| f.as_object().cloned());
        let this = JsValue::from(object.clone());
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let name = match &key {
                PropertyKey::String(s) => s.to_std_string_escaped(),
                PropertyKey::Index(i) => i.get().to_string(),
                PropertyKey::Symbol(_) => continue,
            };
            let enumerable = is_enumerable.as_ref().is_some_and(|f| {
                f.call(&this, &[JsValue::from(&key)], context)
                    .is_ok_and(|flag| flag.to_boolean())
            });
            if !enumerable {
                continue;
            }
            let value = match object.get(key, context) {
                Ok(value) => self.wrap(context, &value),
                Err(_) => Snapshot::Undefined,
            };
            entries.push((name, value));
        }
        Snapshot::object(entries)
    }
}
