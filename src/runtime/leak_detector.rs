use std::{
    cell::Cell,
    sync::atomic::{AtomicUsize, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakStats {
    pub materialized: usize,
    pub released: usize,
    pub leaked: usize,
}

static MATERIALIZED: AtomicUsize = AtomicUsize::new(0);
static RELEASED: AtomicUsize = AtomicUsize::new(0);
static LEAKED: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static RELEASED_HERE: Cell<usize> = const { Cell::new(0) };
}

pub fn record_materialized() {
    MATERIALIZED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_release() {
    RELEASED.fetch_add(1, Ordering::Relaxed);
    let _ = RELEASED_HERE.try_with(|count| count.set(count.get() + 1));
}

pub fn record_leak() {
    LEAKED.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> LeakStats {
    LeakStats {
        materialized: MATERIALIZED.load(Ordering::Relaxed),
        released: RELEASED.load(Ordering::Relaxed),
        leaked: LEAKED.load(Ordering::Relaxed),
    }
}

/// Releases performed on the calling thread since it started.
pub fn released_on_current_thread() -> usize {
    RELEASED_HERE.try_with(Cell::get).unwrap_or(0)
}
