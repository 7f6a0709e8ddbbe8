use boa_engine::{Context, JsObject, JsResult, JsString, JsValue};

use crate::worklet::{
    EncodingVariant, PROP_CLOSURE, PROP_CLOSURE_LEGACY, ambient_this::AmbientThis,
};

/// Calls a materialized worklet with its closure injected.
///
/// Modern: the closure is set on the receiver (the caller's `this` when it is
/// an object, otherwise a fresh object) under both closure names.
///
/// Legacy: a fresh object carrying the closure is installed as the global
/// `jsThis` for the duration of the call; the receiver is `this` when it is
/// an object and `undefined` otherwise.
pub(crate) fn invoke(
    context: &mut Context,
    function: &JsObject,
    encoding: EncodingVariant,
    closure: &JsValue,
    this: &JsValue,
    args: &[JsValue],
) -> JsResult<JsValue> {
    match encoding {
        EncodingVariant::Modern => {
            let receiver = match this.as_object() {
                Some(object) => object.clone(),
                None => JsObject::with_object_proto(context.intrinsics()),
            };
            attach_closure(&receiver, closure, context)?;
            function.call(&receiver.into(), args, context)
        }
        EncodingVariant::Legacy => {
            let js_this = JsObject::with_object_proto(context.intrinsics());
            attach_closure(&js_this, closure, context)?;
            let receiver = if this.is_object() {
                this.clone()
            } else {
                JsValue::undefined()
            };
            let mut ambient = AmbientThis::install(context, js_this.into())?;
            function.call(&receiver, args, ambient.context())
        }
    }
}

fn attach_closure(target: &JsObject, closure: &JsValue, context: &mut Context) -> JsResult<()> {
    if closure.is_null_or_undefined() {
        return Ok(());
    }
    target.set(JsString::from(PROP_CLOSURE), closure.clone(), false, context)?;
    target.set(JsString::from(PROP_CLOSURE_LEGACY), closure.clone(), false, context)?;
    Ok(())
}
