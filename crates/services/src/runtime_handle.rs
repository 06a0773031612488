use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pacer_core::runtime::SessionRuntime;

/// The single mutable session runtime, shared by reference between the
/// timer driver and the services that operate on it.
pub type SharedRuntime = Arc<Mutex<SessionRuntime>>;

#[must_use]
pub fn new_shared_runtime(runtime: SessionRuntime) -> SharedRuntime {
    Arc::new(Mutex::new(runtime))
}

/// Lock the runtime. Critical sections are short and never held across an
/// await; a poisoned lock recovers with the inner state.
pub fn lock_runtime(runtime: &SharedRuntime) -> MutexGuard<'_, SessionRuntime> {
    runtime.lock().unwrap_or_else(PoisonError::into_inner)
}
