use std::sync::Arc;
use std::time::Duration;

use crate::throttle::LoginThrottle;
use crate::tokens::TokenService;

/// Periodically drops revocation markers whose token has expired anyway, so the
/// in-process store stays bounded by the number of live refresh tokens.
#[derive(Clone)]
pub struct RevocationSweeper {
    tokens: Arc<TokenService>,
    every: Duration,
}

impl RevocationSweeper {
    pub fn new(tokens: Arc<TokenService>, every: Duration) -> Self {
        Self { tokens, every }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.every).await;
                self.tick();
            }
        })
    }

    fn tick(&self) -> usize {
        let purged = self.tokens.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "expired revocation markers purged");
        }
        purged
    }
}

/// Periodically forgets login-throttle identities whose attempts have aged out, so
/// failed logins for addresses nobody retries do not pile up.
#[derive(Clone)]
pub struct ThrottleSweeper {
    throttle: Arc<LoginThrottle>,
    every: Duration,
}

impl ThrottleSweeper {
    pub fn new(throttle: Arc<LoginThrottle>, every: Duration) -> Self {
        Self { throttle, every }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.every).await;
                self.tick();
            }
        })
    }

    fn tick(&self) -> usize {
        let purged = self.throttle.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "idle throttle identities purged");
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::InMemoryThrottleStore;
    use crate::tokens::{InMemoryRevocationStore, RevocationStore};
    use chrono::Utc;

    #[test]
    fn tick_purges_expired_markers() {
        let store = Arc::new(InMemoryRevocationStore::new());
        let tokens = Arc::new(TokenService::new(
            b"test-secret",
            chrono::Duration::minutes(30),
            chrono::Duration::days(7),
            store.clone(),
        ));
        store.revoke("stale", Utc::now() - chrono::Duration::minutes(1));
        store.revoke("fresh", Utc::now() + chrono::Duration::days(1));

        let sweeper = RevocationSweeper::new(tokens, Duration::from_secs(60));
        assert_eq!(sweeper.tick(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(sweeper.tick(), 0);
    }

    #[tokio::test]
    async fn throttle_tick_forgets_aged_out_identities() {
        let store = Arc::new(InMemoryThrottleStore::new());
        let throttle = Arc::new(LoginThrottle::new(3, Duration::from_millis(500), store.clone()));
        throttle.record_attempt("ghost1@x.com");
        throttle.record_attempt("ghost2@x.com");

        let sweeper = ThrottleSweeper::new(throttle.clone(), Duration::from_secs(60));
        assert_eq!(sweeper.tick(), 0);
        assert_eq!(store.tracked_identities(), 2);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(sweeper.tick(), 2);
        assert_eq!(store.tracked_identities(), 0);
    }
}
