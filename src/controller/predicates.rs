//! # Event Filtering
//!
//! Suppresses reconciles caused by the controller's own writes so a status
//! update does not immediately re-trigger the state machine.
//!
//! Two transitions are considered self-induced on a `GithubApp`:
//! `expiresAt` going from unset to set, and `error` going from non-empty to
//! empty. Create events for access-token Secrets the controller just wrote
//! are likewise self-induced.
//!
//! kube-rs delivers triggers as object refs rather than old/new pairs, so the
//! filter runs at reconcile entry: after each of its own status writes the
//! reconciler records the written status per key, and the next trigger whose
//! observed status matches the record is swallowed exactly once. Periodic
//! requeues always run the full state machine.

use crate::crd::GithubAppStatus;
use std::collections::HashMap;
use std::sync::Mutex;

/// True iff the status change is one the controller makes itself:
/// `expiresAt` unset -> set, or `error` non-empty -> empty, with no other
/// difference
pub fn is_own_status_transition(old: &GithubAppStatus, new: &GithubAppStatus) -> bool {
    if old == new {
        return false;
    }

    let expires_set = old.expires_at.is_none() && new.expires_at.is_some();
    let error_cleared = !old.error.is_empty() && new.error.is_empty();

    if expires_set && error_cleared {
        return true;
    }
    if expires_set {
        return old.error == new.error;
    }
    if error_cleared {
        return old.expires_at == new.expires_at;
    }
    false
}

/// Per-key record of the controller's most recent status write
///
/// `record` is called after every status write; `consume_if_match` swallows
/// at most one subsequent trigger carrying exactly that status.
#[derive(Debug, Default)]
pub struct SelfWriteTracker {
    inner: Mutex<HashMap<String, GithubAppStatus>>,
}

impl SelfWriteTracker {
    /// Remember the status just written for a namespaced key
    pub fn record(&self, key: &str, status: &GithubAppStatus) {
        self.inner
            .lock()
            .expect("self-write tracker poisoned")
            .insert(key.to_string(), status.clone());
    }

    /// Swallow the trigger if the observed status is the recorded self-write
    ///
    /// The record is consumed either way once inspected against a matching
    /// key, so only the immediate echo of a write is suppressed.
    pub fn consume_if_match(&self, key: &str, observed: Option<&GithubAppStatus>) -> bool {
        let mut inner = self.inner.lock().expect("self-write tracker poisoned");
        match (inner.remove(key), observed) {
            (Some(recorded), Some(observed)) if recorded == *observed => true,
            _ => false,
        }
    }

    /// Drop any record for a key, used on teardown
    pub fn forget(&self, key: &str) {
        self.inner
            .lock()
            .expect("self-write tracker poisoned")
            .remove(key);
    }
}
