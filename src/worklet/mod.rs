//! Worklets: descriptors parsed from decorated functions, per-environment
//! materialization and invocation.
//!
//! A compiler plugin decorates each captured function with metadata. Two
//! layouts exist:
//!
//! | Property                    | Modern              | Legacy        |
//! |-----------------------------|---------------------|---------------|
//! | source text                 | `__initData.code`   | `asString`    |
//! | origin                      | `__initData.location` | `__location` |
//! | source map                  | `__initData.__sourceMap` | n/a      |
//! | captured variables          | `_closure` or `__closure` | same    |
//! | identity                    | `__workletHash`     | same          |
//!
//! Modern worklets read their captured variables through `this`; legacy ones
//! through the global `jsThis`.

mod ambient_this;
mod cache;
pub(crate) mod descriptor;
mod invoke;
mod invoker;
pub(crate) mod materialize;


use boa_engine::{Context, JsObject, JsString, JsValue};

pub use cache::{CompiledFunctionCache, Resolved};
pub use descriptor::{DescriptorBuilder, EncodingVariant, WorkletDescriptor, looks_like_worklet};
pub use invoker::{InvokerState, WorkletInvoker};

pub const PROP_WORKLET_HASH: &str = "__workletHash";
pub const PROP_INIT_DATA: &str = "__initData";
pub const PROP_INIT_DATA_CODE: &str = "code";
pub const PROP_INIT_DATA_LOCATION: &str = "location";
pub const PROP_INIT_DATA_SOURCE_MAP: &str = "__sourceMap";
pub const PROP_LEGACY_SOURCE: &str = "asString";
pub const PROP_LEGACY_LOCATION: &str = "__location";
pub const PROP_CLOSURE: &str = "_closure";
pub const PROP_CLOSURE_LEGACY: &str = "__closure";
pub const PROP_JS_THIS: &str = "jsThis";
pub const PROP_FUNCTION_NAME: &str = "name";

/// Reads `name` from `object`; a throwing getter reads as `undefined`.
pub(crate) fn read_property(object: &JsObject, name: &str, context: &mut Context) -> JsValue {
    object
        .get(JsString::from(name), context)
        .unwrap_or_else(|_| JsValue::undefined())
}

pub(crate) fn read_string(object: &JsObject, name: &str, context: &mut Context) -> Option<String> {
    read_property(object, name, context)
        .as_string()
        .map(|s| s.to_std_string_escaped())
}
