use std::mem;

use boa_engine::{Context, JsResult, JsString, JsValue};

use crate::worklet::PROP_JS_THIS;

/// Scoped override of the global `jsThis`.
///
/// The previous value is put back when the guard drops, whether the call
/// made through [`AmbientThis::context`] returned, threw or panicked.
pub(crate) struct AmbientThis<'ctx> {
    context: &'ctx mut Context,
    previous: JsValue,
}

impl<'ctx> AmbientThis<'ctx> {
    pub(crate) fn install(context: &'ctx mut Context, value: JsValue) -> JsResult<Self> {
        let global = context.global_object();
        let previous = global.get(JsString::from(PROP_JS_THIS), context)?;
        global.set(JsString::from(PROP_JS_THIS), value, false, context)?;
        Ok(Self { context, previous })
    }

    pub(crate) fn context(&mut self) -> &mut Context {
        &mut *self.context
    }
}

impl Drop for AmbientThis<'_> {
    fn drop(&mut self) {
        let previous = mem::replace(&mut self.previous, JsValue::undefined());
        let global = self.context.global_object();
        if let Err(err) = global.set(JsString::from(PROP_JS_THIS), previous, false, &mut *self.context) {
            tracing::warn!(error = %err, "failed to restore jsThis");
        }
    }
}
