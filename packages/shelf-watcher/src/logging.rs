//! Logging capability handed to the cycle controller.

use crate::traits::BaseLogger;

/// Forwards to `tracing` under the `shelf_watcher` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl BaseLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "shelf_watcher", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "shelf_watcher", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "shelf_watcher", "{}", message);
    }
}
