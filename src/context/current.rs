use std::{
    cell::RefCell,
    sync::{Arc, Weak},
};

use super::ExecutionContext;

thread_local! {
    static CURRENT: RefCell<Option<Weak<ExecutionContext>>> = const { RefCell::new(None) };
}

pub(super) fn enter(context: Weak<ExecutionContext>) {
    let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = Some(context));
}

pub(super) fn leave() {
    let _ = CURRENT.try_with(|slot| slot.borrow_mut().take());
}

/// The context whose thread is executing the caller, if any.
pub fn current() -> Option<Arc<ExecutionContext>> {
    CURRENT
        .try_with(|slot| slot.borrow().as_ref().and_then(Weak::upgrade))
        .ok()
        .flatten()
}
