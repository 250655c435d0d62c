use std::error::Error;
use std::time::Duration;

use log::info;
use serde_json::Value;

/// Status codes worth another attempt: rate limiting and transient
/// server-side failures.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry, backoff and timeout settings shared by every outbound request.
#[derive(Debug, Clone)]
pub struct HttpPolicy {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Number of retries after the initial attempt.
    pub retries: u32,
    /// Multiplier for the exponential backoff delay, in seconds.
    pub backoff_factor: f64,
}

impl HttpPolicy {
    /// Delay before retry number `attempt` (counted from 0).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_factor * f64::powi(2.0, attempt as i32))
    }
}

/// A reqwest client with the retry policy applied to every GET.
pub struct HttpClient {
    inner: reqwest::Client,
    policy: HttpPolicy,
}

impl HttpClient {
    pub fn new(policy: HttpPolicy) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder().timeout(policy.timeout).build()?;
        Ok(Self { inner, policy })
    }

    /// GET `url` with the given query string and parse the response body as
    /// JSON. Responses with a status in `RETRY_STATUSES` are retried with
    /// exponential backoff up to the policy's retry count; the last
    /// response's status then surfaces as an error.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, Box<dyn Error>> {
        let mut attempt = 0;
        loop {
            let response = self.inner.get(url).query(query).send().await?;
            let status = response.status();
            if RETRY_STATUSES.contains(&status.as_u16()) && attempt < self.policy.retries {
                let delay = self.policy.backoff_delay(attempt);
                info!(
                    "HTTP {} response when making request.  Will retry after backoff ({} seconds).",
                    status.as_u16(),
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Ok(response.error_for_status()?.json().await?);
        }
    }
}
