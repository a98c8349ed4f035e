//! Store-boundary retry.

use std::future::Future;

use admissions_core::error::DomainError;
use tracing::warn;

use crate::config::RetryPolicy;

impl RetryPolicy {
    /// Runs `call`, re-issuing it after a backoff while it fails with a
    /// transient error and attempts remain.
    pub(crate) async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let backoff = self.backoff(attempt);
                    warn!(operation, attempt, ?backoff, error = %err, "transient store failure, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
