//! Periodic cleanup of expired sessions and password-reset tokens

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use trainhub_common::types::SweepSummary;
use trainhub_storage::repository::SessionRepository;

/// Rows removed by one cleanup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub sessions_deleted: u64,
    pub reset_tokens_deleted: u64,
    /// Cleanup steps that failed
    pub errors: usize,
}

impl CleanupReport {
    /// Deleted rows count as successes, failed steps as failures
    pub fn summary(&self) -> SweepSummary {
        let deleted = (self.sessions_deleted + self.reset_tokens_deleted) as usize;
        SweepSummary {
            processed: deleted + self.errors,
            success: deleted,
            failed: self.errors,
        }
    }
}

/// Cleanup job for expired authentication data
pub struct TokenCleanup {
    sessions: Arc<dyn SessionRepository>,
}

impl TokenCleanup {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }

    pub async fn run(&self) -> CleanupReport {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();

        match self.sessions.delete_expired_sessions(now).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleaned up {} expired sessions", count);
                }
                report.sessions_deleted = count;
            }
            Err(e) => {
                warn!("Failed to clean up expired sessions: {}", e);
                report.errors += 1;
            }
        }

        match self.sessions.delete_expired_reset_tokens(now).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleaned up {} expired password-reset tokens", count);
                }
                report.reset_tokens_deleted = count;
            }
            Err(e) => {
                warn!("Failed to clean up expired password-reset tokens: {}", e);
                report.errors += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_removes_only_expired_rows() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.add_session(now - Duration::hours(1));
        store.add_session(now);
        store.add_session(now + Duration::hours(1));
        store.add_reset_token(now - Duration::minutes(5));

        let report = TokenCleanup::new(store.clone()).run_at(now).await;

        assert_eq!(
            report,
            CleanupReport {
                sessions_deleted: 2,
                reset_tokens_deleted: 1,
                errors: 0
            }
        );
        assert_eq!(
            report.summary(),
            SweepSummary {
                processed: 3,
                success: 3,
                failed: 0
            }
        );
        assert_eq!(store.session_count(), 1);
    }
}
