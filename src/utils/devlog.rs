//! Developer traces. Every trace goes to the `aggrelite::dev6` log target at TRACE and,
//! while a [`Capture`] is alive on the current thread, into that capture as well, so
//! tests can assert on traces without installing a global logger.

use serde::Serialize;
use std::cell::RefCell;

/// Log target for developer traces; `utils::logger` routes it to `dev6.log`.
pub const DEV6_TARGET: &str = "aggrelite::dev6";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Collects this thread's traces until dropped.
#[derive(Debug)]
pub struct Capture(());

impl Capture {
    #[must_use]
    pub fn start() -> Self {
        CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
        Self(())
    }

    /// Returns and clears the traces captured so far.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        CAPTURED.with(|c| *c.borrow_mut() = None);
    }
}

pub fn emit(line: String) {
    log::trace!(target: DEV6_TARGET, "{line}");
    CAPTURED.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(line);
        }
    });
}

/// Emits `record` as one line of JSON.
pub fn emit_json<T: Serialize>(record: &T) {
    match serde_json::to_string(record) {
        Ok(line) => emit(line),
        Err(e) => log::warn!("dev trace not serializable: {e}"),
    }
}
