//! Session identity
//!
//! [`IdentityContext`] is the one source of truth for who is using the
//! application. Every other component reads it; only the hosting
//! application's sign-in flow writes it.
//!
//! Observers are notified synchronously, in subscription order, after the
//! state change is visible. The observer list is bounded.

use crate::error::SyncError;
use parking_lot::RwLock;
use plansync_model::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Default bound on the observer list
pub const DEFAULT_MAX_OBSERVERS: usize = 16;

/// Who the session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub authenticated: bool,
}

impl SessionIdentity {
    /// Signed-out session
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Signed-in session
    #[inline]
    #[must_use]
    pub fn signed_in(user_id: UserId) -> Self {
        Self {
            user_id,
            authenticated: true,
        }
    }
}

/// Receives every identity change
pub trait IdentityObserver: Send + Sync {
    /// Called after the new identity is in place
    fn identity_changed(&self, identity: &SessionIdentity);
}

impl<F> IdentityObserver for F
where
    F: Fn(&SessionIdentity) + Send + Sync,
{
    fn identity_changed(&self, identity: &SessionIdentity) {
        self(identity);
    }
}

struct IdentityInner {
    state: RwLock<SessionIdentity>,
    observers: RwLock<Vec<Arc<dyn IdentityObserver>>>,
    max_observers: usize,
}

/// Shared handle to the session identity
#[derive(Clone)]
pub struct IdentityContext {
    inner: Arc<IdentityInner>,
}

impl IdentityContext {
    /// Create an anonymous session accepting up to `max_observers` observers
    #[must_use]
    pub fn new(max_observers: usize) -> Self {
        Self {
            inner: Arc::new(IdentityInner {
                state: RwLock::new(SessionIdentity::anonymous()),
                observers: RwLock::new(Vec::new()),
                max_observers,
            }),
        }
    }

    /// Current user, the anonymous sentinel when signed out
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.inner.state.read().user_id.clone()
    }

    /// Whether a user is signed in
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().authenticated
    }

    /// Consistent copy of user and flag
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> SessionIdentity {
        self.inner.state.read().clone()
    }

    /// Sign `user_id` in and notify observers
    ///
    /// A blank identifier, or the anonymous sentinel itself, is logged and
    /// ignored.
    pub fn set_user(&self, user_id: &str) {
        let user = match UserId::parse(user_id) {
            Ok(user) if !user.is_anonymous() => user,
            Ok(_) | Err(_) => {
                warn!(user_id, "ignoring sign-in with unusable user id");
                return;
            }
        };
        info!(user = %user, "user signed in");
        self.replace(SessionIdentity::signed_in(user));
    }

    /// Return to the anonymous session and notify observers
    pub fn clear_user(&self) {
        info!("user signed out");
        self.replace(SessionIdentity::anonymous());
    }

    /// Register an observer for the lifetime of the context
    ///
    /// # Errors
    /// `SyncError::Config` once the observer bound is reached
    pub fn subscribe(&self, observer: impl IdentityObserver + 'static) -> Result<(), SyncError> {
        let mut observers = self.inner.observers.write();
        if observers.len() >= self.inner.max_observers {
            return Err(SyncError::Config(format!(
                "identity observer limit of {} reached",
                self.inner.max_observers
            )));
        }
        observers.push(Arc::new(observer));
        Ok(())
    }

    /// Number of registered observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    fn replace(&self, identity: SessionIdentity) {
        *self.inner.state.write() = identity.clone();
        // Observers may read the context or subscribe again
        let observers: Vec<_> = self.inner.observers.read().clone();
        for observer in observers {
            observer.identity_changed(&identity);
        }
    }
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OBSERVERS)
    }
}

impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("identity", &*self.inner.state.read())
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn starts_anonymous() {
        let identity = IdentityContext::default();
        assert!(!identity.is_authenticated());
        assert!(identity.user_id().is_anonymous());
    }

    #[test]
    fn set_and_clear_notify_observers_in_order() {
        let identity = IdentityContext::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            identity
                .subscribe(move |id: &SessionIdentity| {
                    seen.lock().push((tag, id.user_id.to_string(), id.authenticated));
                })
                .unwrap();
        }

        identity.set_user("  alice ");
        assert_eq!(identity.user_id(), UserId::new("alice"));
        assert!(identity.is_authenticated());

        identity.clear_user();
        assert!(!identity.is_authenticated());

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                ("first", "alice".to_string(), true),
                ("second", "alice".to_string(), true),
                ("first", "anonymous".to_string(), false),
                ("second", "anonymous".to_string(), false),
            ]
        );
    }

    #[test]
    fn blank_user_is_ignored() {
        let identity = IdentityContext::default();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        identity
            .subscribe(move |_: &SessionIdentity| *counter.lock() += 1)
            .unwrap();

        identity.set_user("   ");
        identity.set_user("anonymous");
        assert!(!identity.is_authenticated());
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn observer_reads_new_state() {
        let identity = IdentityContext::default();
        let reader = identity.clone();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        identity
            .subscribe(move |_: &SessionIdentity| *slot.lock() = Some(reader.user_id()))
            .unwrap();

        identity.set_user("bob");
        assert_eq!(*seen.lock(), Some(UserId::new("bob")));
    }

    #[test]
    fn observer_list_is_bounded() {
        let identity = IdentityContext::new(1);
        identity.subscribe(|_: &SessionIdentity| {}).unwrap();
        assert!(matches!(
            identity.subscribe(|_: &SessionIdentity| {}),
            Err(SyncError::Config(_))
        ));
        assert_eq!(identity.observer_count(), 1);
    }
}
