//! Containment for caller-supplied code.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}

/// Runs `f`, turning a panic into its message.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Runs a callback, logging instead of unwinding if it panics. Returns
/// whether it completed.
pub(crate) fn contain_panic(label: &str, site: &'static str, callback: impl FnOnce()) -> bool {
    match catch_panic(callback) {
        Ok(()) => true,
        Err(message) => {
            warn!(%label, site, %message, "callback panicked");
            false
        }
    }
}
