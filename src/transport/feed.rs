use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::decode_message;
use crate::clock::Clock;
use crate::error::TrackingError;
use crate::pipeline::DispatchHandle;

pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Exponential backoff between reconnect attempts. Retries never run out.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64).min(self.max_delay)
    }
}

/// Reads newline-delimited JSON positions from a TCP feed and hands them to
/// the dispatcher.
pub struct FeedClient {
    addr: String,
    dispatch: DispatchHandle,
    clock: Arc<dyn Clock>,
    policy: ReconnectPolicy,
}

impl FeedClient {
    pub fn new(addr: impl Into<String>, dispatch: DispatchHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            addr: addr.into(),
            dispatch,
            clock,
            policy: ReconnectPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connect and consume the feed until cancelled, reconnecting on any
    /// disconnect. Returns early only if the dispatcher has shut down.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), TrackingError> {
        let mut attempt: u32 = 0;

        loop {
            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = TcpStream::connect(&self.addr) => result,
            };

            match connected {
                Ok(stream) => {
                    tracing::info!(addr = %self.addr, "Connected to position feed");
                    attempt = 0;

                    match pump_lines(stream, &self.dispatch, self.clock.as_ref(), &cancel).await {
                        Ok(count) => {
                            tracing::warn!(addr = %self.addr, samples = count, "Position feed closed")
                        }
                        Err(TrackingError::PipelineClosed) => return Err(TrackingError::PipelineClosed),
                        Err(e) => tracing::warn!(addr = %self.addr, "Position feed error: {}", e),
                    }
                }
                Err(e) => {
                    tracing::warn!(addr = %self.addr, "Could not connect to position feed: {}", e);
                }
            }

            if cancel.is_cancelled() {
                break;
            }

            attempt = attempt.saturating_add(1);
            let delay = self.policy.delay_for_attempt(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Position feed client stopped");
        Ok(())
    }
}

/// Decode and submit every line from `reader` until EOF or cancellation.
///
/// Malformed lines are logged and skipped. Returns how many samples were
/// queued.
pub async fn pump_lines<R>(
    reader: R,
    dispatch: &DispatchHandle,
    clock: &dyn Clock,
    cancel: &CancellationToken,
) -> Result<u64, TrackingError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut queued = 0;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        if line.trim().is_empty() {
            continue;
        }

        match decode_message(line.as_bytes(), clock.now()) {
            Ok(sample) => {
                dispatch.submit(sample).await?;
                queued += 1;
            }
            Err(e) => tracing::warn!("Dropping feed message: {}", e),
        }
    }

    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_doubles_up_to_cap() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(1_000), Duration::from_secs(30));
    }

    #[test]
    fn test_custom_policy() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(25),
            multiplier: 3.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(25));
    }
}
