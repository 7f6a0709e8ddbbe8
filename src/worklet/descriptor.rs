use std::{fmt, sync::Arc};

use boa_engine::{Context, JsObject, JsValue};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    config::{DEFAULT_WORKLET_NAME, MIN_SOURCE_LEN, UNKNOWN_LOCATION},
    error::{ValidationError, WorkletError},
    marshal::{Marshaler, Snapshot},
    worklet::{
        PROP_CLOSURE, PROP_CLOSURE_LEGACY, PROP_FUNCTION_NAME, PROP_INIT_DATA,
        PROP_INIT_DATA_CODE, PROP_INIT_DATA_LOCATION, PROP_INIT_DATA_SOURCE_MAP,
        PROP_LEGACY_LOCATION, PROP_LEGACY_SOURCE, PROP_WORKLET_HASH, read_property, read_string,
    },
};

/// Which metadata layout a worklet was decorated with. Decides how captured
/// variables reach the function body at invocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingVariant {
    /// Closure is read from `this._closure` / `this.__closure`.
    Modern,
    /// Closure is read from the global `jsThis`.
    Legacy,
}

struct DescriptorInner {
    source_text: String,
    location: String,
    closure: Option<Snapshot>,
    name: String,
    encoding: EncodingVariant,
    hash: String,
    source_map: Option<String>,
}

/// Everything needed to rebuild a worklet in any environment.
///
/// Immutable after creation and cheap to clone; clones share one allocation.
#[derive(Clone)]
pub struct WorkletDescriptor {
    inner: Arc<DescriptorInner>,
}

impl WorkletDescriptor {
    pub fn builder(source_text: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(source_text)
    }

    /// Parses a decorated function.
    ///
    /// `Ok(None)` means the function is not a usable worklet (missing or
    /// mistyped source metadata); callers treat that as a soft failure.
    /// Source text that is empty after trimming is a hard
    /// [`ValidationError`].
    pub fn from_value(context: &mut Context, value: &JsValue) -> Result<Option<Self>, WorkletError> {
        let Some(function) = value.as_object().filter(|object| object.is_callable()) else {
            return Err(WorkletError::NotAFunction);
        };
        Ok(Self::parse_function(context, function, &mut Marshaler::new())?)
    }

    pub(crate) fn parse_function(
        context: &mut Context,
        function: &JsObject,
        marshaler: &mut Marshaler,
    ) -> Result<Option<Self>, ValidationError> {
        let Some(metadata) = SourceMetadata::read(context, function) else {
            tracing::debug!("function lacks worklet source metadata");
            return Ok(None);
        };
        let location = normalized_location(metadata.location);
        let source_text = validated_source(&metadata.code, &location)?;

        let closure = read_closure(context, function);
        let closure = if closure.is_null_or_undefined() {
            None
        } else {
            marshaler.enter(function);
            let snapshot = marshaler.wrap(context, &closure);
            marshaler.leave();
            Some(snapshot)
        };
        let name = read_string(function, PROP_FUNCTION_NAME, context).filter(|name| !name.is_empty());
        let hash = read_hash_marker(context, function);

        let descriptor = Self::assemble(
            source_text,
            location,
            closure,
            name,
            metadata.encoding,
            hash,
            metadata.source_map,
        );
        tracing::debug!(
            location = %descriptor.location(),
            name = %descriptor.name(),
            encoding = ?descriptor.encoding(),
            "parsed worklet descriptor"
        );
        Ok(Some(descriptor))
    }

    fn assemble(
        source_text: String,
        location: String,
        closure: Option<Snapshot>,
        name: Option<String>,
        encoding: EncodingVariant,
        hash: Option<String>,
        source_map: Option<String>,
    ) -> Self {
        let hash = hash.unwrap_or_else(|| source_hash(&source_text));
        Self {
            inner: Arc::new(DescriptorInner {
                source_text,
                location,
                closure,
                name: name.unwrap_or_else(|| String::from(DEFAULT_WORKLET_NAME)),
                encoding,
                hash,
                source_map,
            }),
        }
    }

    /// Trimmed function source, without the evaluation wrapper.
    pub fn source_text(&self) -> &str {
        &self.inner.source_text
    }

    pub fn location(&self) -> &str {
        &self.inner.location
    }

    pub fn closure(&self) -> Option<&Snapshot> {
        self.inner.closure.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn encoding(&self) -> EncodingVariant {
        self.inner.encoding
    }

    /// The plugin's hash marker, or a SHA-256 of the source text.
    pub fn hash(&self) -> &str {
        &self.inner.hash
    }

    pub fn source_map(&self) -> Option<&str> {
        self.inner.source_map.as_deref()
    }

    /// Source text as evaluated: parenthesized so a function declaration
    /// evaluates to the function, with a newline so a trailing line comment
    /// cannot swallow the closing parenthesis.
    pub(crate) fn wrapped_source(&self) -> String {
        format!("({}\n)", self.inner.source_text)
    }

    pub(crate) fn summary(&self) -> DescriptorSummary<'_> {
        DescriptorSummary {
            worklet: self.name(),
            location: self.location(),
            hash: self.hash(),
            encoding: self.encoding(),
        }
    }
}

impl PartialEq for WorkletDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.hash() == other.hash()
                && self.location() == other.location()
                && self.source_text() == other.source_text()
                && self.encoding() == other.encoding())
    }
}

impl fmt::Debug for WorkletDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkletDescriptor")
            .field("name", &self.name())
            .field("location", &self.location())
            .field("encoding", &self.encoding())
            .field("hash", &self.hash())
            .field("has_closure", &self.closure().is_some())
            .finish()
    }
}

#[derive(Serialize)]
pub(crate) struct DescriptorSummary<'a> {
    worklet: &'a str,
    location: &'a str,
    hash: &'a str,
    encoding: EncodingVariant,
}

/// Assembles a descriptor without a script function, for hosts that receive
/// worklet metadata from elsewhere (a bundle, a test).
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    source_text: String,
    location: Option<String>,
    closure: Option<Snapshot>,
    name: Option<String>,
    encoding: EncodingVariant,
    hash: Option<String>,
    source_map: Option<String>,
}

impl DescriptorBuilder {
    fn new(source_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            location: None,
            closure: None,
            name: None,
            encoding: EncodingVariant::Modern,
            hash: None,
            source_map: None,
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// A nullish closure is treated as no closure.
    pub fn closure(mut self, closure: Snapshot) -> Self {
        self.closure = (!closure.is_nullish()).then_some(closure);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into()).filter(|name| !name.is_empty());
        self
    }

    pub fn encoding(mut self, encoding: EncodingVariant) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn source_map(mut self, source_map: impl Into<String>) -> Self {
        self.source_map = Some(source_map.into());
        self
    }

    pub fn build(self) -> Result<WorkletDescriptor, ValidationError> {
        let location = normalized_location(self.location.unwrap_or_default());
        let source_text = validated_source(&self.source_text, &location)?;
        Ok(WorkletDescriptor::assemble(
            source_text,
            location,
            self.closure,
            self.name,
            self.encoding,
            self.hash,
            self.source_map,
        ))
    }
}

/// True when `value` is a function decorated as a worklet: it carries a
/// string or number hash marker, or a non-null closure together with source metadata.
pub fn looks_like_worklet(context: &mut Context, value: &JsValue) -> bool {
    value
        .as_object()
        .filter(|object| object.is_callable())
        .is_some_and(|function| is_decorated(context, function))
}

pub(crate) fn is_decorated(context: &mut Context, function: &JsObject) -> bool {
    if read_hash_marker(context, function).is_some() {
        return true;
    }
    if read_closure(context, function).is_null_or_undefined() {
        return false;
    }
    read_property(function, PROP_INIT_DATA, context).is_object()
        || read_property(function, PROP_LEGACY_SOURCE, context)
            .as_string()
            .is_some()
}

struct SourceMetadata {
    code: String,
    location: String,
    encoding: EncodingVariant,
    source_map: Option<String>,
}

impl SourceMetadata {
    /// `__initData` wins when present; its fields must then be strings.
    fn read(context: &mut Context, function: &JsObject) -> Option<Self> {
        let init_data = read_property(function, PROP_INIT_DATA, context);
        if let Some(init_data) = init_data.as_object() {
            let location = read_string(init_data, PROP_INIT_DATA_LOCATION, context)?;
            let code = read_string(init_data, PROP_INIT_DATA_CODE, context)?;
            let source_map = read_string(init_data, PROP_INIT_DATA_SOURCE_MAP, context);
            return Some(Self {
                code,
                location,
                encoding: EncodingVariant::Modern,
                source_map,
            });
        }

        let code = read_string(function, PROP_LEGACY_SOURCE, context)?;
        let location = read_string(function, PROP_LEGACY_LOCATION, context)?;
        Some(Self {
            code,
            location,
            encoding: EncodingVariant::Legacy,
            source_map: None,
        })
    }
}

fn normalized_location(location: String) -> String {
    if location.is_empty() {
        String::from(UNKNOWN_LOCATION)
    } else {
        location
    }
}

fn validated_source(code: &str, location: &str) -> Result<String, ValidationError> {
    let trimmed = code.trim();
    if trimmed.chars().count() <= MIN_SOURCE_LEN {
        tracing::error!(location, "rejected worklet with empty source");
        return Err(ValidationError::empty_source(location));
    }
    Ok(trimmed.to_owned())
}

/// `_closure` when present and non-nullish, otherwise `__closure`.
fn read_closure(context: &mut Context, function: &JsObject) -> JsValue {
    let closure = read_property(function, PROP_CLOSURE, context);
    if closure.is_null_or_undefined() {
        read_property(function, PROP_CLOSURE_LEGACY, context)
    } else {
        closure
    }
}

fn read_hash_marker_value(context: &mut Context, function: &JsObject) -> JsValue {
    read_property(function, PROP_WORKLET_HASH, context)
}

fn read_hash_marker(context: &mut Context, function: &JsObject) -> Option<String> {
    let marker = read_hash_marker_value(context, function);
    if let Some(s) = marker.as_string() {
        return Some(s.to_std_string_escaped());
    }
    marker.as_number().map(|n| n.to_string())
}

fn source_hash(source_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
