use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::artifact::sha256_hex;
use crate::config::FetchSettings;
use crate::db::{self, CachedDoc};
use crate::error::PipelineError;

/// Sequential HTTP client with retry on rate limits and server errors.
pub struct Fetcher {
    client: Client,
    throttle: Duration,
    max_retries: u32,
    base_backoff_ms: u64,
}

/// `base * 2^attempt`, saturating instead of overflowing.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt))
}

/// A successful (2xx) response, redirects already followed.
pub struct Fetched {
    pub requested_url: String,
    pub final_url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl Fetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Fetcher {
            client,
            throttle: Duration::from_millis(settings.throttle_ms),
            max_retries: settings.max_retries,
            base_backoff_ms: settings.base_backoff_ms,
        })
    }

    /// GET `url`. Non-2xx responses are errors, never empty bodies.
    pub async fn get(&self, url: &str) -> Result<Fetched, PipelineError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url).await {
                Ok(fetched) => return Ok(fetched),
                Err((retryable, err)) if retryable && attempt < self.max_retries => {
                    let backoff = Duration::from_millis(backoff_ms(self.base_backoff_ms, attempt));
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        err,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err((_, err)) => return Err(err),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<Fetched, (bool, PipelineError)> {
        let fail = |reason: String| PipelineError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| (e.is_timeout() || e.is_connect(), fail(e.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err((retryable, fail(format!("HTTP {status}"))));
        }

        let final_url = resp.url().to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|e| (false, fail(e.to_string())))?;

        Ok(Fetched {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }

    /// Cache-aside read: serve `doc_id` from the cache, otherwise fetch,
    /// store, then sleep the throttle interval.
    pub async fn cached(&self, conn: &Connection, doc_id: &str, url: &str) -> Result<CachedDoc> {
        if let Some(doc) = db::get_document(conn, doc_id)? {
            debug!(doc_id, "cache hit");
            return Ok(doc);
        }

        let fetched = self.get(url).await?;
        let doc = CachedDoc {
            doc_id: doc_id.to_string(),
            url: fetched.requested_url,
            final_url: fetched.final_url,
            status: fetched.status,
            sha256: sha256_hex(&fetched.body),
            body: fetched.body,
            fetched_at: Utc::now().to_rfc3339(),
        };
        db::save_document(conn, &doc)?;

        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_ms(500, 0), 500);
        assert_eq!(backoff_ms(500, 1), 1000);
        assert_eq!(backoff_ms(500, 3), 4000);
    }

    #[test]
    fn backoff_saturates_on_large_attempts() {
        assert_eq!(backoff_ms(500, 63), u64::MAX);
        assert_eq!(backoff_ms(500, 64), u64::MAX);
        assert_eq!(backoff_ms(1, 200), u64::MAX);
        assert_eq!(backoff_ms(0, 200), 0);
    }
}
