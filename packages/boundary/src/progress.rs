//! Progress reporting for boundary downloads.
//!
//! The downloader only knows about [`ProgressCallback`]; the binary plugs
//! in a terminal progress bar and tests use [`NullProgress`].

use std::sync::Arc;

/// Receives byte counts while an archive is streamed to disk.
pub trait ProgressCallback: Send + Sync {
    /// Sets the expected size in bytes, when the server reports one.
    fn set_total(&self, total: u64);

    /// Advances by `delta` bytes.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the download complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
