//! Transport-level resend for collaborator calls.
//!
//! A request is resent only when no HTTP response arrived (connection
//! refused, reset, or timed out). Any response, success or not, ends the
//! loop. A timed-out write may still have been applied upstream, so the
//! caller learns how many sends it took through [`Sent::retried`] and
//! reconciles non-idempotent writes itself.

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

/// Sends after the first one.
const MAX_RESENDS: u32 = 3;

/// Wait before resend `n` (1-based) is `RESEND_DELAY * 2^(n-1)`.
const RESEND_DELAY: Duration = Duration::from_millis(200);

/// A response together with the number of sends it took.
#[derive(Debug)]
pub(crate) struct Sent {
    pub response: reqwest::Response,
    pub attempts: u32,
}

impl Sent {
    /// An earlier send failed in transit and may have reached the server.
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }
}

fn backoff(resend: u32) -> Duration {
    RESEND_DELAY * 2u32.pow(resend.saturating_sub(1))
}

/// Send through `send`, resending on transport failure.
///
/// The final transport error becomes [`ClientError::Http`] for `endpoint`.
pub(crate) async fn send_with_retry<F, Fut>(endpoint: &str, send: F) -> Result<Sent, ClientError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match send().await {
            Ok(response) => return Ok(Sent { response, attempts }),
            Err(source) if attempts > MAX_RESENDS => {
                return Err(ClientError::Http {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
            Err(e) => {
                let delay = backoff(attempts);
                tracing::warn!(
                    endpoint,
                    attempt = attempts,
                    timed_out = e.is_timeout(),
                    "collaborator unreachable, resending in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
