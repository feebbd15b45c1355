//! Process-wide hooks for signals that have nowhere left to go.
//!
//! Once a subscriber has received its terminal signal it must never see
//! another one. Errors that show up after that point are handed to the hook
//! installed here, or logged when there is none.

use crate::error::FlowError;
use parking_lot::RwLock;
use std::sync::Arc;

type ErrorHook = Arc<dyn Fn(&FlowError) + Send + Sync>;

static ON_ERROR_DROPPED: RwLock<Option<ErrorHook>> = parking_lot::const_rwlock(None);

/// Installs `hook`, replacing any previous one.
pub fn set_on_error_dropped<F>(hook: F)
where
    F: Fn(&FlowError) + Send + Sync + 'static,
{
    *ON_ERROR_DROPPED.write() = Some(Arc::new(hook));
}

/// Removes the installed hook; dropped errors go back to being logged.
pub fn reset_on_error_dropped() {
    *ON_ERROR_DROPPED.write() = None;
}

/// Reports an error that could not be delivered.
pub fn on_error_dropped(error: FlowError) {
    let hook = ON_ERROR_DROPPED.read().clone();
    match hook {
        Some(hook) => hook(&error),
        None => tracing::warn!(label = error.as_label(), error = %error, "error dropped after terminal signal"),
    }
}
