//! Forced sign-out
//!
//! When a session cannot be renewed the client clears the stored credentials
//! and always invokes the installed [`SessionReload`] so the application can
//! drop its state and return to the login screen.

use super::error::SignOutReason;
use tracing::warn;

/// Application hook run after a forced sign-out
pub trait SessionReload: Send + Sync {
    fn reload(&self, reason: &SignOutReason);
}

/// Default hook: records the sign-out in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReload;

impl SessionReload for LogReload {
    fn reload(&self, reason: &SignOutReason) {
        warn!(%reason, "Session terminated, login required");
    }
}

impl<F> SessionReload for F
where
    F: Fn(&SignOutReason) + Send + Sync,
{
    fn reload(&self, reason: &SignOutReason) {
        self(reason);
    }
}
