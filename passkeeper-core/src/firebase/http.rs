use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{PassKeeperError, PassKeeperResult};

/// HTTP client wrapper for the Firebase REST APIs. Sets a timeout and
/// user-agent, insists on HTTPS and retries transient failures.
pub(super) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: usize,
    require_https: bool,
}

impl Request {
    pub(super) fn new() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        {
            // Fails harmlessly when a provider is already installed.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }

        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3, // total attempts = 4
            require_https: !cfg!(test),
        }
    }

    fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("passkeeper-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    pub(super) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    pub(super) fn patch(&self, url: &str) -> RequestBuilder {
        self.req(Method::PATCH, url)
    }

    pub(super) fn delete(&self, url: &str) -> RequestBuilder {
        self.req(Method::DELETE, url)
    }

    /// Sends `request_builder`, retrying on 429, 5xx, timeouts and connection
    /// errors. Other statuses are handed back for the caller to interpret.
    ///
    /// Plain `http` URLs are refused with a validation error before anything
    /// is sent.
    pub(super) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> PassKeeperResult<Response> {
        let request_builder = self.check_scheme(request_builder)?;
        let Some(template) = request_builder.try_clone() else {
            return execute_request_builder(request_builder)
                .await
                .map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(
                    "<unknown>".to_string(),
                    None,
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute_request_builder(request_builder).await
        })
        .retry(backoff)
        .when(RequestHandleError::is_retryable)
        .notify(|err, after| {
            log::debug!("retrying {} in {after:?}: {}", err.url, err.error);
        })
        .await
        .map_err(Into::into)
    }
}

impl Request {
    fn check_scheme(&self, request_builder: RequestBuilder) -> PassKeeperResult<RequestBuilder> {
        let (client, request) = request_builder.build_split();
        let request = request.map_err(|err| PassKeeperError::Network {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: None,
            error: format!("request build failed: {err}"),
        })?;
        if self.require_https && request.url().scheme() != "https" {
            return Err(PassKeeperError::Validation {
                field: "endpoint".to_string(),
                reason: format!("{} is not an https URL", request.url()),
            });
        }
        Ok(RequestBuilder::from_parts(client, request))
    }
}

#[derive(Debug)]
struct RequestHandleError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl RequestHandleError {
    const fn retryable(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: true,
        }
    }

    const fn permanent(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<RequestHandleError> for PassKeeperError {
    fn from(value: RequestHandleError) -> Self {
        Self::Network {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}

async fn execute_request_builder(
    request_builder: RequestBuilder,
) -> Result<Response, RequestHandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(
            err.url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            None,
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                return Err(RequestHandleError::retryable(
                    url,
                    Some(status),
                    format!("request error with bad status code {status}"),
                ));
            }
            Ok(resp)
        }
        Err(err) => {
            if err.is_timeout() || err.is_connect() {
                return Err(RequestHandleError::retryable(
                    url,
                    None,
                    format!("request timeout/connect error: {err}"),
                ));
            }

            Err(RequestHandleError::permanent(
                url,
                None,
                format!("request failed: {err}"),
            ))
        }
    }
}

/// Error body shared by the Google REST APIs.
#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    #[serde(default)]
    pub(super) message: String,
    #[serde(default)]
    pub(super) status: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

/// Decodes a JSON response body. Non-success responses carrying a Google
/// error body are turned into an error by `reject`; anything else becomes a
/// network error.
pub(super) async fn read_json<T: DeserializeOwned>(
    response: Response,
    reject: impl FnOnce(ApiError) -> PassKeeperError,
) -> PassKeeperResult<T> {
    let url = response.url().to_string();
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }

    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => Err(reject(envelope.error)),
        Err(_) => Err(PassKeeperError::Network {
            url,
            status: Some(status.as_u16()),
            error: format!("unexpected response: {body}"),
        }),
    }
}

/// `PERMISSION_DENIED` → `permission-denied`.
pub(super) fn kebab_case(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['_', ' '], "-")
}
