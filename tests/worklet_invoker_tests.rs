mod common;

use std::sync::Arc;

use boa_engine::{JsString, JsValue};
use common::{call_number, descriptor_on, legacy_worklet_js, modern_worklet_js, spawn_context};
use worklets::{
    EncodingVariant, InvokerState, WorkletError, WorkletInvoker, runtime::leak_detector,
};

#[test]
fn add_runs_on_a_worklet_context() {
    let context = spawn_context("add");
    let descriptor = descriptor_on(
        &context,
        modern_worklet_js("function add(a, b) { return a + b; }", "add.js:1:1", "undefined"),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));

    assert_eq!(call_number(&context, &invoker, &[2.0, 3.0]), Some(5.0));
    assert_eq!(invoker.state(), InvokerState::Materialized);
    context.shutdown();
}

#[test]
fn closure_captured_on_one_context_is_visible_on_another() {
    let host = spawn_context("capture-host");
    let worker = spawn_context("capture-worker");
    let descriptor = descriptor_on(
        &host,
        modern_worklet_js(
            "function () { return this._closure.x + this.__closure.x; }",
            "capture.js",
            "{ x: 21 }",
        ),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));

    assert_eq!(call_number(&worker, &invoker, &[]), Some(42.0));
    host.shutdown();
    worker.shutdown();
}

#[test]
fn legacy_closure_is_reachable_from_the_global_scope() {
    let context = spawn_context("legacy");
    let descriptor = descriptor_on(
        &context,
        legacy_worklet_js(
            "function (y) { return jsThis._closure.x * y + jsThis.__closure.x; }",
            "legacy.js",
            "{ x: 4 }",
        ),
    );
    assert_eq!(descriptor.encoding(), EncodingVariant::Legacy);
    let invoker = Arc::new(WorkletInvoker::new(descriptor));

    assert_eq!(call_number(&context, &invoker, &[10.0]), Some(44.0));
    let leftover = context
        .run_sync(|env| {
            let value = common::eval(env, "typeof jsThis === 'undefined' || jsThis === undefined");
            value.as_boolean()
        })
        .expect("run_sync");
    assert_eq!(leftover, Some(true));
    context.shutdown();
}

#[test]
fn throwing_worklet_returns_undefined_and_context_keeps_working() {
    let context = spawn_context("throws");
    let descriptor = descriptor_on(
        &context,
        modern_worklet_js("function () { throw new Error('nope'); }", "throws.js", "undefined"),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));
    let call = Arc::clone(&invoker);

    let (undefined, strict) = context
        .run_sync(move |env| {
            let undefined = call.call(env, &JsValue::undefined(), &[]).is_undefined();
            let strict = call.try_call(env, &JsValue::undefined(), &[]).map(|_| ());
            (undefined, strict.map_err(|e| e.to_string()))
        })
        .expect("run_sync");
    assert!(undefined);
    let reason = strict.expect_err("strict call reports the throw");
    assert!(reason.contains("throws.js"), "{reason}");

    assert_eq!(context.run_sync(|_| 1).expect("still running"), 1);
    context.shutdown();
}

#[test]
fn source_is_evaluated_once_per_environment() {
    let host = spawn_context("once-host");
    let a = spawn_context("once-a");
    let b = spawn_context("once-b");
    // Parsing evaluates the decorated expression once on the host.
    let descriptor = descriptor_on(
        &host,
        modern_worklet_js(
            "(globalThis.evaluations = (globalThis.evaluations || 0) + 1, function () { return globalThis.evaluations; })",
            "once.js",
            "undefined",
        ),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));

    for _ in 0..5 {
        assert_eq!(call_number(&a, &invoker, &[]), Some(1.0));
        assert_eq!(call_number(&b, &invoker, &[]), Some(1.0));
    }
    assert_eq!(invoker.materializations(), 2);
    host.shutdown();
    a.shutdown();
    b.shutdown();
}

#[test]
fn environments_never_share_a_function() {
    let a = spawn_context("isolated-a");
    let b = spawn_context("isolated-b");
    let descriptor = descriptor_on(
        &a,
        modern_worklet_js(
            "function () { globalThis.count = (globalThis.count || 0) + 1; return globalThis.count; }",
            "count.js",
            "undefined",
        ),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));

    assert_eq!(call_number(&a, &invoker, &[]), Some(1.0));
    assert_eq!(call_number(&a, &invoker, &[]), Some(2.0));
    assert_eq!(call_number(&b, &invoker, &[]), Some(1.0));

    let env_a = a.run_sync(|env| env.id()).expect("env id");
    assert!(invoker.release_environment(env_a));
    assert!(!invoker.is_materialized_in(env_a));
    assert!(invoker.is_materialized_in(b.run_sync(|env| env.id()).expect("env id")));
    assert_eq!(call_number(&b, &invoker, &[]), Some(2.0));
    assert_eq!(invoker.materializations(), 2);
    assert_eq!(call_number(&a, &invoker, &[]), Some(3.0));
    assert_eq!(invoker.materializations(), 3);
    a.shutdown();
    b.shutdown();
}

#[test]
fn disposal_releases_on_the_owning_thread() {
    let context = spawn_context("dispose");
    let descriptor = descriptor_on(
        &context,
        modern_worklet_js("function () { return 7; }", "dispose.js", "undefined"),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));
    assert_eq!(call_number(&context, &invoker, &[]), Some(7.0));

    let before = context
        .run_sync(|_| leak_detector::released_on_current_thread())
        .expect("run_sync");
    let here_before = leak_detector::released_on_current_thread();

    invoker.dispose();
    let after = context
        .run_sync(|_| leak_detector::released_on_current_thread())
        .expect("run_sync");

    assert_eq!(after, before + 1);
    assert_eq!(leak_detector::released_on_current_thread(), here_before);
    assert_eq!(invoker.state(), InvokerState::Disposed);
    assert_eq!(call_number(&context, &invoker, &[]), None);
    context.shutdown();
}

#[test]
fn dropping_the_last_owner_disposes() {
    let context = spawn_context("drop");
    let descriptor = descriptor_on(
        &context,
        modern_worklet_js("function () { return 1; }", "drop.js", "undefined"),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));
    assert_eq!(call_number(&context, &invoker, &[]), Some(1.0));

    let before = context
        .run_sync(|_| leak_detector::released_on_current_thread())
        .expect("run_sync");
    drop(invoker);
    let after = context
        .run_sync(|_| leak_detector::released_on_current_thread())
        .expect("run_sync");
    assert_eq!(after, before + 1);
    context.shutdown();
}

#[test]
fn from_value_distinguishes_failures() {
    let context = spawn_context("from-value");
    let outcome = context
        .run_sync(|env| {
            let plain = common::eval(env, "(function () {})");
            let number = JsValue::from(3);
            let empty = common::eval(
                env,
                &modern_worklet_js("function () {}", "empty.js", "undefined")
                    .replace("code: \"function () {}\"", "code: \"  \""),
            );
            [plain, number, empty]
                .iter()
                .map(|value| match WorkletInvoker::from_value(env.context_mut(), value) {
                    Ok(_) => "ok",
                    Err(WorkletError::NotAWorklet) => "not-a-worklet",
                    Err(WorkletError::NotAFunction) => "not-a-function",
                    Err(WorkletError::Validation(_)) => "validation",
                    Err(_) => "other",
                })
                .collect::<Vec<_>>()
        })
        .expect("run_sync");
    assert_eq!(outcome, ["not-a-worklet", "not-a-function", "validation"]);
    context.shutdown();
}

#[test]
fn nested_worklet_in_closure_runs_on_another_context() {
    let host = spawn_context("nested-host");
    let worker = spawn_context("nested-worker");
    let inner = modern_worklet_js(
        "function (v) { return v + this._closure.bump; }",
        "inner.js",
        "{ bump: 100 }",
    );
    let descriptor = descriptor_on(
        &host,
        modern_worklet_js(
            "function (v) { return this._closure.inner(v) * 2; }",
            "outer.js",
            &format!("{{ inner: {inner} }}"),
        ),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));

    assert_eq!(call_number(&worker, &invoker, &[1.0]), Some(202.0));
    host.shutdown();
    worker.shutdown();
}

#[test]
fn shared_cell_carries_writes_between_contexts() {
    let host = spawn_context("cell-host");
    let worker = spawn_context("cell-worker");
    let descriptor = descriptor_on(
        &host,
        modern_worklet_js(
            "function () { this._closure.counter.value += 1; return this._closure.counter.value; }",
            "cell.js",
            "{ counter: (globalThis.counter = createSharedValue(0)) }",
        ),
    );
    let invoker = Arc::new(WorkletInvoker::new(descriptor));

    assert_eq!(call_number(&worker, &invoker, &[]), Some(1.0));
    assert_eq!(call_number(&worker, &invoker, &[]), Some(2.0));
    let seen = host
        .run_sync(|env| common::eval(env, "counter.value").as_number())
        .expect("run_sync");
    assert_eq!(seen, Some(2.0));

    let label = worker
        .run_sync(|env| {
            common::eval(env, "String(typeof createSharedValue)")
                .as_string()
                .map(JsString::to_std_string_escaped)
        })
        .expect("run_sync");
    assert_eq!(label.as_deref(), Some("function"));
    host.shutdown();
    worker.shutdown();
}
