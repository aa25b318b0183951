//! The context a unit of work is bound to when it runs.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased receiver handed to work on invocation.
///
/// Registration may supply any `Send + Sync` value; when it does not, the
/// engine binds the work to a handle of itself. Work recovers the concrete
/// type with [`Binding::downcast_ref`].
#[derive(Clone)]
pub struct Binding(Arc<dyn Any + Send + Sync>);

impl Binding {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wrap an already shared value without another allocation.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Shared handle to the bound value, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Binding(..)")
    }
}
