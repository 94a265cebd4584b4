use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use petclinic_domain::constants::{
    DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_USER_AGENT,
};
use petclinic_domain::{ApiSettings, NetworkError, PetClinicError};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::Client as ReqwestClient;
use tracing::debug;

use crate::api::{ApiRequest, ApiResponse, Transport};

/// Single-attempt HTTP transport backed by reqwest.
///
/// Failures are classified into [`NetworkError`]; retries belong to the
/// request executor.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
}

impl HttpTransport {
    /// Start building a new HTTP transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Transport configured from the `[api]` settings block.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self, PetClinicError> {
        Self::builder().base_url(&settings.base_url).timeout(settings.request_timeout()).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`. Absolute `http(s)://` paths pass through.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        credential: Option<&str>,
    ) -> Result<ApiResponse, NetworkError> {
        let url = self.url_for(&request.path);
        let method = request.method.clone();

        let mut builder =
            self.client.request(method.clone(), &url).header(ACCEPT, "application/json");
        if let Some(token) = credential {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(%method, %url, "sending HTTP request");
        let response = builder.send().await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            classify_transport_error(&err)
        })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.bytes().await.map_err(|err| classify_transport_error(&err))?;
        debug!(%method, %url, %status, bytes = body.len(), "received HTTP response");

        if status.is_success() {
            return Ok(ApiResponse::new(status.as_u16(), body.to_vec()));
        }

        let message = String::from_utf8_lossy(&body);
        Err(NetworkError::from_status(status.as_u16(), retry_after, message.trim()))
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: None,
        }
    }
}

impl HttpTransportBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Client-level timeout. The executor applies its own per-attempt bound
    /// on top of this.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpTransport, PetClinicError> {
        let base_url = self.base_url.trim().to_string();
        if base_url.is_empty() {
            return Err(PetClinicError::Config("base URL must not be empty".into()));
        }
        reqwest::Url::parse(&base_url)
            .map_err(|err| PetClinicError::Config(format!("invalid base URL '{base_url}': {err}")))?;

        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .no_proxy();

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| PetClinicError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpTransport { client, base_url })
    }
}

/// Classify a reqwest failure that produced no HTTP status.
pub fn classify_transport_error(err: &reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        return NetworkError::Timeout;
    }
    if err.is_connect() {
        return if is_dns_failure(err) {
            NetworkError::DnsError
        } else {
            NetworkError::NoConnectivity
        };
    }
    if err.is_request() {
        return NetworkError::NoConnectivity;
    }
    NetworkError::Unknown { message: err.to_string(), retryable: false }
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// `Retry-After` in integer seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}
