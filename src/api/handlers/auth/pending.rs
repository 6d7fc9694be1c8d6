//! In-flight authorization attempts, keyed by the `state` nonce.
//!
//! Entries are take-once: the callback consumes its entry, so a replayed
//! `state` finds nothing and fails. Expired entries are swept on insert.

use crate::api::handlers::auth::providers::Provider;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub(crate) struct PendingAuthorization {
    pub provider: Provider,
    pub next: Option<String>,
    created_at: Instant,
}

pub(crate) struct PendingAuthorizations {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingAuthorization>>,
}

impl Default for PendingAuthorizations {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl PendingAuthorizations {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Remember a new attempt under its state nonce.
    pub(crate) fn insert(&self, state: String, provider: Provider, next: Option<String>) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        entries.insert(
            state,
            PendingAuthorization {
                provider,
                next,
                created_at: Instant::now(),
            },
        );
    }

    /// Consume the attempt for `state`. Unknown, replayed and expired
    /// nonces all come back as `None`.
    pub(crate) fn take(&self, state: &str) -> Option<PendingAuthorization> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.remove(state)?;
        (entry.created_at.elapsed() < self.ttl).then_some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_the_entry() {
        let pending = PendingAuthorizations::default();
        pending.insert(
            "nonce".to_string(),
            Provider::Google,
            Some("/stores".to_string()),
        );

        let entry = pending.take("nonce").expect("entry");
        assert_eq!(entry.provider, Provider::Google);
        assert_eq!(entry.next.as_deref(), Some("/stores"));

        // Replay finds nothing.
        assert!(pending.take("nonce").is_none());
    }

    #[test]
    fn unknown_state_is_none() {
        let pending = PendingAuthorizations::default();
        assert!(pending.take("never-issued").is_none());
    }

    #[test]
    fn expired_entries_are_rejected() {
        let pending = PendingAuthorizations::new(Duration::from_millis(10));
        pending.insert("nonce".to_string(), Provider::Facebook, None);
        std::thread::sleep(Duration::from_millis(20));
        assert!(pending.take("nonce").is_none());
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let pending = PendingAuthorizations::new(Duration::from_millis(10));
        pending.insert("old".to_string(), Provider::Google, None);
        std::thread::sleep(Duration::from_millis(20));
        pending.insert("new".to_string(), Provider::Google, None);

        let entries = pending.entries.lock().expect("lock");
        assert!(!entries.contains_key("old"));
        assert!(entries.contains_key("new"));
    }
}
