#![allow(dead_code)]

use std::sync::Arc;

use boa_engine::JsValue;
use worklets::{
    ExecutionContext, WorkletDescriptor, WorkletInvoker, config::ContextConfig, runtime::Environment,
};

pub fn spawn_context(name: &str) -> Arc<ExecutionContext> {
    ExecutionContext::spawn(ContextConfig::named(name))
        .unwrap_or_else(|e| panic!("failed to spawn context `{name}`: {e}"))
}

/// JS that evaluates to a function decorated the way the worklet compiler
/// plugin does it for modern builds.
pub fn modern_worklet_js(code: &str, location: &str, closure_js: &str) -> String {
    format!(
        "(() => {{ const f = {code}; f.__initData = {{ code: {code:?}, location: {location:?} }}; f._closure = {closure_js}; return f; }})()"
    )
}

/// Same as [`modern_worklet_js`] for the legacy layout.
pub fn legacy_worklet_js(code: &str, location: &str, closure_js: &str) -> String {
    format!(
        "(() => {{ const f = {code}; f.asString = {code:?}; f.__location = {location:?}; f.__closure = {closure_js}; return f; }})()"
    )
}

pub fn eval(env: &mut Environment, source: &str) -> JsValue {
    env.eval(source, "<test>")
        .unwrap_or_else(|e| panic!("failed to evaluate test script: {e}\n{source}"))
}

/// Parses a decorated function inside `context` and hands back its
/// descriptor, which is free to travel to other contexts.
pub fn descriptor_on(context: &ExecutionContext, source: String) -> WorkletDescriptor {
    context
        .run_sync(move |env| {
            let value = eval(env, &source);
            WorkletDescriptor::from_value(env.context_mut(), &value)
                .map_err(|e| e.to_string())
                .and_then(|parsed| parsed.ok_or_else(|| String::from("not a worklet")))
        })
        .expect("run_sync")
        .unwrap_or_else(|e| panic!("failed to parse worklet: {e}"))
}

/// Calls `invoker` on `context` with numeric arguments and reads back a
/// number, `None` for any other result.
pub fn call_number(
    context: &ExecutionContext,
    invoker: &Arc<WorkletInvoker>,
    args: &[f64],
) -> Option<f64> {
    let invoker = Arc::clone(invoker);
    let args = args.to_vec();
    context
        .run_sync(move |env| {
            let args: Vec<JsValue> = args.into_iter().map(JsValue::from).collect();
            invoker.call(env, &JsValue::undefined(), &args).as_number()
        })
        .expect("run_sync")
}
