// SPDX-License-Identifier: AGPL-3.0

//! Trace retrieval with bounded retries

use soloptic_chain::ExecutionEnvironment;
use soloptic_constants::{
    TRACE_MAX_ATTEMPTS, TRACE_PENDING_DELAY_MS, TRACE_RETRY_DELAY_MS, TRACE_SETTLE_DELAY_MS,
};
use soloptic_exceptions::{SolopticException, SolopticResult};
use soloptic_logs::Logger;
use soloptic_traces::ExecutionTrace;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRetryPolicy {
    pub max_attempts: u32,
    /// Wait before the first attempt
    pub settle_delay: Duration,
    /// Wait after an attempt that found the transaction not yet mined
    pub pending_delay: Duration,
    /// Wait after any other retryable failure
    pub retry_delay: Duration,
}

impl Default for TraceRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: TRACE_MAX_ATTEMPTS,
            settle_delay: Duration::from_millis(TRACE_SETTLE_DELAY_MS),
            pending_delay: Duration::from_millis(TRACE_PENDING_DELAY_MS),
            retry_delay: Duration::from_millis(TRACE_RETRY_DELAY_MS),
        }
    }
}

impl TraceRetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            settle_delay: Duration::ZERO,
            pending_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
        }
    }

    fn delay_after(&self, err: &SolopticException) -> Duration {
        match err {
            SolopticException::TraceNotMined { .. } => self.pending_delay,
            _ => self.retry_delay,
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Fetch a trace, retrying transient failures.
///
/// A structurally invalid trace is returned at once; retrying cannot fix it.
pub async fn fetch_trace<E: ExecutionEnvironment + ?Sized>(
    env: &E,
    transaction_id: &str,
    policy: &TraceRetryPolicy,
    logger: &Logger,
) -> SolopticResult<ExecutionTrace> {
    let attempts = policy.max_attempts.max(1);
    pause(policy.settle_delay).await;

    let mut last_error = None;
    for attempt in 1..=attempts {
        match env.trace(transaction_id).await {
            Ok(trace) => return Ok(trace),
            Err(e) if !e.is_retryable_trace_failure() => return Err(e),
            Err(e) => {
                logger.debug(&format!(
                    "trace attempt {}/{} for {} failed: {}",
                    attempt, attempts, transaction_id, e
                ));
                if attempt < attempts {
                    pause(policy.delay_after(&e)).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(SolopticException::TraceUnavailable {
        tx_id: transaction_id.to_string(),
        reason: format!(
            "failed after {} attempts: {}",
            attempts,
            last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string())
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = TraceRetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.settle_delay, Duration::from_millis(50));
        assert_eq!(
            policy.delay_after(&SolopticException::TraceNotMined { tx_id: "0x1".into() }),
            Duration::from_millis(500)
        );
        assert_eq!(
            policy.delay_after(&SolopticException::Rpc("down".into())),
            Duration::from_secs(1)
        );
    }
}
