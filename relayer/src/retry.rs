// Copyright (c) BNB Chain, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry with a fixed delay.
//!
//! Source-side sequence queries must not spin forever: a pass that cannot read
//! the chain should fail and be retried on the next tick. The policy is a
//! plain value so call sites can carry different attempt counts and delays.

use crate::error::{RelayerError, RelayerResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `f` up to `attempts` times, sleeping `delay` between failures and
    /// logging each one. Returns the last error once attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut f: F) -> RelayerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RelayerResult<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut last_err = RelayerError::Generic(format!("{op_name}: no attempt was made"));
        for attempt in 1..=attempts {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "failed to {op_name}, attempt: {attempt} times, max_attempts: {attempts}, err={e}"
                    );
                    last_err = e;
                    if attempt < attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let result = policy
            .run("query sequence", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RelayerError::TransientRpc("connection refused".into()))
                    } else {
                        Ok(42u64)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_and_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let err = policy
            .run("query sequence", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u64, _>(RelayerError::TransientRpc("down".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, RelayerError::TransientRpc(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let result = policy.run("noop", || async { Ok(7u64) }).await.unwrap();
        assert_eq!(result, 7);
    }
}
