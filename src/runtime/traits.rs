//! Trait abstractions for runtime side effects
//!
//! The transport seam lives in [`crate::client::ChatClient`]; this module holds
//! the notification seam so tests can record what the user would have seen.

use crate::state_machine::NotifyLevel;
use std::sync::Arc;

/// Receives user-facing notifications (error toasts and the like)
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, level: NotifyLevel, message: &str) {
        (**self).notify(level, message);
    }
}

/// Default notifier: notifications become log records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        match level {
            NotifyLevel::Info => tracing::info!(notification = %message, "Notification"),
            NotifyLevel::Warning => tracing::warn!(notification = %message, "Notification"),
            NotifyLevel::Error => tracing::error!(notification = %message, "Notification"),
        }
    }
}
