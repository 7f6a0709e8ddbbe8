use std::path::Path;

use boa_engine::{Context, JsObject, JsValue, NativeFunction, Source};

use crate::{
    marshal,
    worklet::{WorkletDescriptor, invoke::invoke},
};

/// The callable a descriptor evaluated to in one environment.
pub(crate) struct Materialized {
    pub function: JsObject,
    /// Set when `function` is the no-op stand-in.
    pub fallback: Option<String>,
}

/// Evaluates the descriptor's source in `context`.
///
/// Never fails: a syntax error, a thrown exception or a non-callable result
/// yields a no-op function and a logged warning, so that a broken worklet
/// does not take its caller down.
pub(crate) fn materialize(context: &mut Context, descriptor: &WorkletDescriptor) -> Materialized {
    let wrapped = descriptor.wrapped_source();
    let source = Source::from_bytes(wrapped.as_bytes()).with_path(Path::new(descriptor.location()));
    let evaluated = match context.eval(source) {
        Ok(value) => value,
        Err(err) => return fallback(context, descriptor, format!("evaluation failed: {err}")),
    };
    let Some(object) = evaluated.as_object() else {
        return fallback(context, descriptor, String::from("source did not evaluate to an object"));
    };
    if !object.is_callable() {
        return fallback(context, descriptor, String::from("source did not evaluate to a function"));
    }
    tracing::trace!(location = %descriptor.location(), name = %descriptor.name(), "materialized worklet");
    Materialized {
        function: object.clone(),
        fallback: None,
    }
}

fn fallback(context: &mut Context, descriptor: &WorkletDescriptor, reason: String) -> Materialized {
    tracing::warn!(
        location = %descriptor.location(),
        name = %descriptor.name(),
        %reason,
        "worklet failed to materialize; substituting a no-op"
    );
    Materialized {
        function: noop_function(context),
        fallback: Some(reason),
    }
}

fn noop_function(context: &mut Context) -> JsObject {
    let function = NativeFunction::from_fn_ptr(|_this, _args, _context| Ok(JsValue::undefined()))
        .to_js_function(context.realm());
    JsObject::clone(&function)
}

/// A callable standing in for a worklet nested inside another worklet's
/// closure. Calling it injects the nested worklet's own closure the same way
/// a top-level invocation does.
pub(crate) fn nested_callable(descriptor: &WorkletDescriptor, context: &mut Context) -> JsValue {
    let function = materialize(context, descriptor).function;
    let closure = descriptor
        .closure()
        .map(|snapshot| marshal::unwrap(snapshot, context))
        .unwrap_or_else(JsValue::undefined);
    let encoding = descriptor.encoding();
    NativeFunction::from_copy_closure_with_captures(
        move |this, args, (function, closure): &(JsObject, JsValue), context| {
            invoke(context, function, encoding, closure, this, args)
        },
        (function, closure),
    )
    .to_js_function(context.realm())
    .into()
}
