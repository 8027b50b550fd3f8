//! In-process e-mail verification codes

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, warn};

use crate::application::ports::{CodeStatus, CollaboratorError, EmailCodeVerifier};

struct IssuedCode {
    code: String,
    issued_at: DateTime<Utc>,
}

const DEFAULT_MAX_PENDING: usize = 10_000;

/// DashMap-backed code store. One live code per address; issuing again
/// replaces the previous code. Expired codes are dropped whenever a code is
/// issued or verified.
pub struct InMemoryEmailCodeStore {
    codes: DashMap<String, IssuedCode>,
    ttl: Duration,
    max_pending: usize,
    unavailable: AtomicBool,
}

impl InMemoryEmailCodeStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limit(ttl, DEFAULT_MAX_PENDING)
    }

    pub fn with_limit(ttl: Duration, max_pending: usize) -> Self {
        Self {
            codes: DashMap::new(),
            ttl,
            max_pending,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Generate and store a six digit code for `email`. Re-issuing to an
    /// address with a live code always succeeds; a new address is refused
    /// while the store is full.
    pub fn issue(&self, email: &str) -> Result<String, CollaboratorError> {
        self.purge_expired();
        let key = email.to_lowercase();
        if !self.codes.contains_key(&key) && self.codes.len() >= self.max_pending {
            warn!(pending = self.codes.len(), "email code store full");
            return Err(CollaboratorError::Rejected("too many pending codes".into()));
        }
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.insert(email, &code, Utc::now());
        debug!(email, "email code issued");
        Ok(code)
    }

    fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        issued_at + self.ttl <= now
    }

    /// Drop every code past its lifetime.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.codes.retain(|_, issued| !self.is_expired(issued.issued_at, now));
    }

    pub fn pending(&self) -> usize {
        self.codes.len()
    }

    pub fn insert(&self, email: &str, code: &str, issued_at: DateTime<Utc>) {
        self.codes.insert(
            email.to_lowercase(),
            IssuedCode {
                code: code.to_string(),
                issued_at,
            },
        );
    }

    pub fn contains(&self, email: &str) -> bool {
        self.codes.contains_key(&email.to_lowercase())
    }

    /// Simulate the verification backend being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CollaboratorError::Unavailable("email code store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EmailCodeVerifier for InMemoryEmailCodeStore {
    async fn verify_code(&self, email: &str, code: &str) -> Result<CodeStatus, CollaboratorError> {
        self.check_available()?;
        let key = email.to_lowercase();
        let now = Utc::now();
        let status = match self.codes.get(&key) {
            None => return Ok(CodeStatus::Invalid),
            Some(issued) if self.is_expired(issued.issued_at, now) => CodeStatus::Expired,
            Some(issued) if issued.code != code => CodeStatus::Invalid,
            Some(_) => CodeStatus::Valid,
        };
        if status == CodeStatus::Expired {
            self.codes.remove(&key);
            self.purge_expired();
        }
        Ok(status)
    }

    async fn remove_code(&self, email: &str) -> Result<(), CollaboratorError> {
        self.check_available()?;
        self.codes.remove(&email.to_lowercase());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_code_verifies_once_removed_it_is_gone() {
        let store = InMemoryEmailCodeStore::new(Duration::minutes(5));
        let code = store.issue("Pilot@Example.com").unwrap();
        assert_eq!(code.len(), 6);

        let status = store.verify_code("pilot@example.com", &code).await.unwrap();
        assert_eq!(status, CodeStatus::Valid);

        store.remove_code("pilot@example.com").await.unwrap();
        let status = store.verify_code("pilot@example.com", &code).await.unwrap();
        assert_eq!(status, CodeStatus::Invalid);
    }

    #[tokio::test]
    async fn stale_and_wrong_codes() {
        let store = InMemoryEmailCodeStore::new(Duration::minutes(5));
        store.insert("a@example.com", "123456", Utc::now() - Duration::minutes(6));
        store.insert("b@example.com", "123456", Utc::now());

        assert_eq!(
            store.verify_code("a@example.com", "123456").await.unwrap(),
            CodeStatus::Expired
        );
        assert_eq!(
            store.verify_code("b@example.com", "654321").await.unwrap(),
            CodeStatus::Invalid
        );
    }

    #[tokio::test]
    async fn expired_codes_are_purged() {
        let store = InMemoryEmailCodeStore::new(Duration::minutes(5));
        for i in 0..50 {
            store.insert(&format!("old{i}@example.com"), "123456", Utc::now() - Duration::minutes(10));
        }
        store.insert("live@example.com", "123456", Utc::now());
        assert_eq!(store.pending(), 51);

        store.issue("fresh@example.com").unwrap();
        assert_eq!(store.pending(), 2);
        assert!(!store.contains("old0@example.com"));

        store.insert("late@example.com", "123456", Utc::now() - Duration::minutes(10));
        assert_eq!(
            store.verify_code("late@example.com", "123456").await.unwrap(),
            CodeStatus::Expired
        );
        assert!(!store.contains("late@example.com"));
        assert_eq!(store.pending(), 2);
    }

    #[tokio::test]
    async fn issuance_is_capped_for_new_addresses() {
        let store = InMemoryEmailCodeStore::with_limit(Duration::minutes(5), 2);
        store.issue("a@example.com").unwrap();
        store.issue("b@example.com").unwrap();

        assert!(matches!(
            store.issue("c@example.com"),
            Err(CollaboratorError::Rejected(_))
        ));
        assert!(!store.contains("c@example.com"));

        let again = store.issue("A@example.com").unwrap();
        assert_eq!(
            store.verify_code("a@example.com", &again).await.unwrap(),
            CodeStatus::Valid
        );

        store.remove_code("b@example.com").await.unwrap();
        store.issue("c@example.com").unwrap();
        assert_eq!(store.pending(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = InMemoryEmailCodeStore::new(Duration::minutes(5));
        store.set_unavailable(true);
        assert!(store.verify_code("a@example.com", "1").await.is_err());
    }
}
