use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use eaconsole_api::*;
use eaconsole_core::controls::HistogramParam;
use eaconsole_core::open_set::join_keys;

use crate::{Transport, TransportError};

/// Per-request deadlines. A request that outlives its deadline is aborted
/// and reported as [`TransportError::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    /// `/alerts`, `/subjects` and `/noop`.
    pub poll: Duration,
    pub bootstrap: Duration,
    pub mutation: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(500),
            bootstrap: Duration::from_millis(1000),
            mutation: Duration::from_millis(1000),
        }
    }
}

/// Typed HTTP client for the console server.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeouts: RequestTimeouts,
}

impl ApiClient {
    pub fn new(base_url: &str, timeouts: RequestTimeouts) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, base_url, timeouts))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str, timeouts: RequestTimeouts) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeouts,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeouts(&self) -> RequestTimeouts {
        self.timeouts
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    pub async fn noop(&self) -> Result<NoopResponse, TransportError> {
        self.get_json(paths::NOOP, paths::NOOP, self.timeouts.poll)
            .await
    }

    pub async fn domain(&self) -> Result<DomainResponse, TransportError> {
        self.get_json(paths::DOMAIN, paths::DOMAIN, self.timeouts.bootstrap)
            .await
    }

    pub async fn alerts(&self) -> Result<AlertPoll, TransportError> {
        self.get_json(paths::ALERTS, paths::ALERTS, self.timeouts.poll)
            .await
    }

    /// The key list goes out comma-joined and unescaped: `?details=2,7`.
    pub async fn subjects(&self, details: &[SubjectKey]) -> Result<SubjectsResponse, TransportError> {
        let path_and_query = format!("{}?details={}", paths::SUBJECTS, join_keys(details));
        self.get_json(paths::SUBJECTS, &path_and_query, self.timeouts.poll)
            .await
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    pub async fn set_knob(&self, req: &SetValueRequest) -> Result<StatusResponse, TransportError> {
        self.mutate(paths::SET_KNOB, req).await
    }

    pub async fn set_histogram(
        &self,
        param: HistogramParam,
        req: &SetValueRequest,
    ) -> Result<StatusResponse, TransportError> {
        let path = format!("{}/{}", paths::SET_HISTOGRAM, param);
        self.mutate(&path, req).await
    }

    pub async fn answer_case(&self, req: &AnswerCaseRequest) -> Result<StatusResponse, TransportError> {
        self.mutate(paths::ANSWER_CASE, req).await
    }

    pub async fn set_time(&self, req: &SetTimeRequest) -> Result<StatusResponse, TransportError> {
        self.mutate(paths::SET_TIME, req).await
    }

    // ── Plumbing ──────────────────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        path_and_query: &str,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let request = self.client.get(self.url(path_and_query)).timeout(timeout);
        send(path, timeout, request).await
    }

    async fn mutate<B: Serialize>(&self, path: &str, body: &B) -> Result<StatusResponse, TransportError> {
        let timeout = self.timeouts.mutation;
        let request = self.client.put(self.url(path)).json(body).timeout(timeout);
        let status: StatusResponse = send(path, timeout, request).await?;
        if !status.is_success() {
            return Err(TransportError::Rejected {
                path: path.to_string(),
                message: status.message(),
            });
        }
        Ok(status)
    }
}

/// Send a request and decode a 2xx JSON body; anything else is an error
/// carrying the status and body text.
async fn send<T: DeserializeOwned>(
    path: &str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
) -> Result<T, TransportError> {
    let classify = |source: reqwest::Error| {
        if source.is_timeout() {
            TransportError::Timeout {
                path: path.to_string(),
                timeout,
            }
        } else {
            TransportError::Network {
                path: path.to_string(),
                source,
            }
        }
    };

    let resp = request.send().await.map_err(classify)?;
    let status = resp.status();
    let body = resp.text().await.map_err(classify)?;
    if !status.is_success() {
        debug!(path, %status, "non-success response");
        return Err(TransportError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| TransportError::Decode {
        path: path.to_string(),
        source,
    })
}

impl Transport for ApiClient {
    async fn domain(&self) -> Result<DomainResponse, TransportError> {
        ApiClient::domain(self).await
    }

    async fn alerts(&self) -> Result<AlertPoll, TransportError> {
        ApiClient::alerts(self).await
    }

    async fn subjects(&self, details: &[SubjectKey]) -> Result<SubjectsResponse, TransportError> {
        ApiClient::subjects(self, details).await
    }

    async fn set_knob(&self, request: SetValueRequest) -> Result<StatusResponse, TransportError> {
        ApiClient::set_knob(self, &request).await
    }

    async fn set_histogram(
        &self,
        param: HistogramParam,
        request: SetValueRequest,
    ) -> Result<StatusResponse, TransportError> {
        ApiClient::set_histogram(self, param, &request).await
    }

    async fn answer_case(&self, request: AnswerCaseRequest) -> Result<StatusResponse, TransportError> {
        ApiClient::answer_case(self, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = ApiClient::new("http://127.0.0.1:9876/", RequestTimeouts::default()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9876");
        assert_eq!(client.url("/alerts"), "http://127.0.0.1:9876/alerts");
    }

    #[test]
    fn default_poll_timeout_is_half_a_second() {
        assert_eq!(RequestTimeouts::default().poll, Duration::from_millis(500));
    }
}
