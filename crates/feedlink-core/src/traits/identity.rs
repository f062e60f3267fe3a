//! Identity trait — who the live channel connects as.

use std::sync::{Arc, RwLock};

/// Resolves the identity (user id) used in the channel endpoint.
/// Returns `None` while the user session is not yet resolvable.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<String>;
}

/// Identity that can be set after construction (e.g. once login completes).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    inner: Arc<RwLock<Option<String>>>,
}

impl StaticIdentity {
    pub fn new(identity: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(identity.filter(|s| !s.is_empty()))),
        }
    }

    /// Replace the identity; empty strings clear it.
    pub fn set(&self, identity: Option<String>) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = identity.filter(|s| !s.is_empty());
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<String> {
        self.inner.read().ok().and_then(|g| g.clone())
    }
}
