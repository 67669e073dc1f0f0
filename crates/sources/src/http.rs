use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use tracing::{debug, warn};

use crate::SourceError;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Blocking HTTP client with a per-request timeout and bounded retries.
#[derive(Debug, Clone)]
pub(crate) struct Fetcher {
    client: Client,
    service: &'static str,
    retries: u32,
}

impl Fetcher {
    pub(crate) fn new(
        service: &'static str,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parker_overlay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| SourceError::DataSourceUnavailable {
                service,
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            service,
            retries,
        })
    }

    /// GET `url` and return the body text.
    ///
    /// Connection failures, timeouts, and 5xx responses are retried; other HTTP
    /// errors fail immediately.
    pub(crate) fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
        accept: &str,
    ) -> Result<String, SourceError> {
        let mut attempt = 0;
        loop {
            debug!(service = self.service, url, attempt, "requesting");
            let result = self
                .client
                .get(url)
                .query(query)
                .header(ACCEPT, accept)
                .send()
                .and_then(|response| response.error_for_status())
                .and_then(|response| response.text());
            match result {
                Ok(body) => return Ok(body),
                Err(err) => {
                    let transient = err.is_timeout()
                        || err.is_connect()
                        || err.status().is_none_or(|status| status.is_server_error());
                    if !transient || attempt >= self.retries {
                        return Err(SourceError::DataSourceUnavailable {
                            service: self.service,
                            reason: err.to_string(),
                        });
                    }
                    attempt += 1;
                    warn!(service = self.service, attempt, error = %err, "request failed, retrying");
                    thread::sleep(RETRY_BACKOFF * attempt);
                }
            }
        }
    }
}
