use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use boa_engine::{
    Context, JsObject, JsResult, JsString, JsValue, NativeFunction, object::ObjectInitializer,
    property::Attribute,
};

use crate::marshal::{self, Snapshot};

/// Global installed in every environment: `createSharedValue(initial)`.
pub const CREATE_SHARED_VALUE: &str = "createSharedValue";

/// Accessor through which scripts read and write a cell.
pub const PROP_CELL_VALUE: &str = "value";

/// Hidden, non-enumerable marker that lets a wrapped cell view be recognized.
pub(crate) const PROP_CELL_ID: &str = "__sharedCellId";

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);
static REGISTRY: LazyLock<Mutex<HashMap<u64, Weak<CellInner>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn registry() -> MutexGuard<'static, HashMap<u64, Weak<CellInner>>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CellInner {
    id: u64,
    value: Mutex<Snapshot>,
}

impl Drop for CellInner {
    fn drop(&mut self) {
        registry().remove(&self.id);
    }
}

/// A mutable slot shared by every environment it is marshaled into.
///
/// Inside an environment a cell appears as an object whose `value` accessor
/// reads and writes the shared slot. Wrapping that object again yields the
/// same cell rather than a copy.
#[derive(Clone)]
pub struct SharedCell(Arc<CellInner>);

impl SharedCell {
    pub fn new(initial: Snapshot) -> Self {
        let inner = Arc::new(CellInner {
            id: NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed),
            value: Mutex::new(initial),
        });
        registry().insert(inner.id, Arc::downgrade(&inner));
        Self(inner)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn get(&self) -> Snapshot {
        self.slot().clone()
    }

    /// References to this cell inside `value` are stored as `undefined`, the
    /// same way the marshaler cuts cycles. A cycle running through another
    /// cell is not detected and keeps both cells alive.
    pub fn set(&self, value: Snapshot) {
        let value = if self.is_referenced_by(&value) {
            tracing::debug!(cell = self.id(), "cell assigned to itself; storing undefined");
            self.without_self(&value)
        } else {
            value
        };
        let previous = std::mem::replace(&mut *self.slot(), value);
        drop(previous);
    }

    fn is_referenced_by(&self, value: &Snapshot) -> bool {
        match value {
            Snapshot::Cell(cell) => self.ptr_eq(cell),
            Snapshot::Array(items) => items.iter().any(|item| self.is_referenced_by(item)),
            Snapshot::Object(entries) => entries.iter().any(|(_, v)| self.is_referenced_by(v)),
            _ => false,
        }
    }

    fn without_self(&self, value: &Snapshot) -> Snapshot {
        match value {
            Snapshot::Cell(cell) if self.ptr_eq(cell) => Snapshot::Undefined,
            Snapshot::Array(items) => {
                Snapshot::array(items.iter().map(|item| self.without_self(item)).collect())
            }
            Snapshot::Object(entries) => Snapshot::object(
                entries
                    .iter()
                    .map(|(key, v)| (key.clone(), self.without_self(v))),
            ),
            other => other.clone(),
        }
    }

    pub fn ptr_eq(&self, other: &SharedCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn slot(&self) -> MutexGuard<'_, Snapshot> {
        self.0.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lookup(id: u64) -> Option<SharedCell> {
        let weak = registry().get(&id).cloned();
        weak.and_then(|weak| weak.upgrade()).map(SharedCell)
    }

    /// Recognizes a cell view previously produced by [`SharedCell::to_js`].
    pub(crate) fn from_js(object: &JsObject, context: &mut Context) -> Option<SharedCell> {
        let key = JsString::from(PROP_CELL_ID);
        if !object.has_own_property(key.clone(), context).ok()? {
            return None;
        }
        let id = object.get(key, context).ok()?.as_number()?;
        Self::lookup(id as u64)
    }

    /// A fresh view of this cell inside `context`.
    pub(crate) fn to_js(&self, context: &mut Context) -> JsObject {
        let read = self.clone();
        // SAFETY: the closure captures only a `SharedCell`, which holds no
        // garbage-collected engine values.
        let getter = unsafe {
            NativeFunction::from_closure(move |_this, _args, context| {
                Ok(marshal::unwrap(&read.get(), context))
            })
        };
        let write = self.clone();
        // SAFETY: as above.
        let setter = unsafe {
            NativeFunction::from_closure(move |_this, args, context| {
                let value = args.first().cloned().unwrap_or_else(JsValue::undefined);
                write.set(marshal::wrap(context, &value));
                Ok(JsValue::undefined())
            })
        };
        let getter = getter.to_js_function(context.realm());
        let setter = setter.to_js_function(context.realm());

        ObjectInitializer::new(context)
            .accessor(
                JsString::from(PROP_CELL_VALUE),
                Some(getter),
                Some(setter),
                Attribute::ENUMERABLE | Attribute::CONFIGURABLE,
            )
            .property(
                JsString::from(PROP_CELL_ID),
                JsValue::from(self.id() as f64),
                Attribute::empty(),
            )
            .build()
    }
}

impl fmt::Debug for SharedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCell").field(&self.0.id).finish()
    }
}

pub(crate) fn install_factory(context: &mut Context) -> JsResult<()> {
    context.register_global_callable(
        JsString::from(CREATE_SHARED_VALUE),
        1,
        NativeFunction::from_fn_ptr(|_this, args, context| {
            let initial = match args.first() {
                Some(value) => marshal::wrap(context, value),
                None => Snapshot::Undefined,
            };
            Ok(SharedCell::new(initial).to_js(context).into())
        }),
    )
}
