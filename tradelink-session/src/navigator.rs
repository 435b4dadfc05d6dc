//! Navigation adapter
//!
//! The session manager decides *that* a redirect is needed; a [`Navigator`]
//! performs it for whatever router the host application uses.

use tracing::info;
use tradelink_core::RedirectTarget;

pub trait Navigator: Send + Sync {
    /// Move the user to `route`, the configured path for `target`
    fn navigate(&self, target: RedirectTarget, route: &str);
}

/// Navigator for hosts that read the required action from the snapshot instead
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _target: RedirectTarget, _route: &str) {}
}

/// Navigator that only logs redirects
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, target: RedirectTarget, route: &str) {
        info!(redirect = %target, route = route, "Redirect required");
    }
}
