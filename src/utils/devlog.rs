//! Developer bench lines: one JSON object per store call or request, logged at TRACE
//! on [`DEV_TARGET`]. Lines can be captured per thread, so tests assert on them
//! without installing a global logger.

use serde_json::Value;
use std::cell::RefCell;
use std::time::Instant;

#[doc(hidden)]
pub use serde_json::json;

/// Log target for bench lines; `logger::configure_logging` can route it to `dev.log`.
pub const DEV_TARGET: &str = "doctables::dev";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<Value>>> = const { RefCell::new(None) };
}

/// Stops capturing on the current thread when dropped.
#[must_use = "capture stops as soon as the guard is dropped"]
pub struct Capture(());

impl Drop for Capture {
    fn drop(&mut self) {
        CAPTURED.with(|c| *c.borrow_mut() = None);
    }
}

impl Capture {
    /// Removes and returns the lines captured so far.
    pub fn take(&self) -> Vec<Value> {
        CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
    }

    /// Captured lines whose `bench` field equals `kind`, left in place.
    #[must_use]
    pub fn of_kind(&self, kind: &str) -> Vec<Value> {
        CAPTURED.with(|c| {
            c.borrow()
                .iter()
                .flatten()
                .filter(|v| v.get("bench").and_then(Value::as_str) == Some(kind))
                .cloned()
                .collect()
        })
    }
}

/// Starts capturing bench lines emitted on the current thread.
pub fn capture() -> Capture {
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    Capture(())
}

/// Logs one bench line and keeps a copy if this thread is capturing.
pub fn record(line: Value) {
    log::trace!(target: DEV_TARGET, "{line}");
    CAPTURED.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(line);
        }
    });
}

/// Whole milliseconds since `start`, saturating.
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Records a bench line written in `json!` object syntax.
#[macro_export]
macro_rules! devlog {
    ($($line:tt)+) => {
        $crate::utils::devlog::record($crate::utils::devlog::json!($($line)+))
    };
}
