//! # Request Executor
//!
//! Performs one HTTP exchange and turns its outcome into a [`RequestSample`].
//!
//! Every failure mode is absorbed here: transport errors and timeouts become
//! samples carrying the reserved response code `0`, non-2xx responses are
//! recorded with their real code, and a body that cannot be drained leaves
//! `time_total` unset. Nothing escapes to the worker as an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode, Url, Version};
use tracing::warn;

use crate::request::RequestSpec;

/// Response code recorded when no HTTP response was received
pub const NO_RESPONSE: u16 = 0;

// ============================================================================
// SAMPLES
// ============================================================================

/// Outcome and timing of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSample {
    /// HTTP status code, or [`NO_RESPONSE`]
    pub response_code: u16,
    /// Time until the response headers arrived
    pub time_to_first_byte: Option<Duration>,
    /// Time until the response body was fully drained
    pub time_total: Option<Duration>,
    /// Status code is in the 2xx range
    pub successful: bool,
}

impl RequestSample {
    /// Sample for an exchange that never produced a response
    pub fn no_response() -> Self {
        Self {
            response_code: NO_RESPONSE,
            time_to_first_byte: None,
            time_total: None,
            successful: false,
        }
    }

    /// Sample for a received response
    pub fn response(
        response_code: u16,
        time_to_first_byte: Duration,
        time_total: Option<Duration>,
    ) -> Self {
        Self {
            response_code,
            time_to_first_byte: Some(time_to_first_byte),
            time_total,
            successful: is_success_code(response_code),
        }
    }

    /// Successful and fully timed; only such samples contribute to averages
    pub fn is_measured(&self) -> bool {
        self.successful && self.time_to_first_byte.is_some() && self.time_total.is_some()
    }
}

fn is_success_code(code: u16) -> bool {
    (200..300).contains(&code)
}

/// Why an exchange produced no response. Only surfaces in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Connect,
    Other,
}

impl TransportFailure {
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connect"),
            Self::Other => write!(f, "transport"),
        }
    }
}

// ============================================================================
// OBSERVER
// ============================================================================

/// Outgoing request as it is put on the wire
#[derive(Debug)]
pub struct RequestDescriptor<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    pub version: Version,
    pub headers: &'a HeaderMap,
    pub body: &'a Bytes,
}

/// Incoming response after its body was drained
#[derive(Debug)]
pub struct ResponseDescriptor<'a> {
    pub version: Version,
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

/// Side channel for tracing exchanges. Never influences the sample.
pub trait ExchangeObserver: Send + Sync {
    fn on_request(&self, request: &RequestDescriptor<'_>);

    fn on_response(&self, response: &ResponseDescriptor<'_>);
}

// ============================================================================
// EXECUTORS
// ============================================================================

/// Performs one request/response cycle
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, spec: &RequestSpec) -> RequestSample;
}

/// Executor backed by the shared reqwest client
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    observer: Option<Arc<dyn ExchangeObserver>>,
}

impl HttpExecutor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            observer: None,
        }
    }

    /// Attach an exchange observer
    pub fn with_observer(mut self, observer: Arc<dyn ExchangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, spec: &RequestSpec) -> RequestSample {
        let start = Instant::now();

        let request = match self
            .client
            .request(spec.method().clone(), spec.url().clone())
            .headers(spec.headers().clone())
            .body(spec.body().clone())
            .build()
        {
            Ok(request) => request,
            Err(e) => {
                warn!("building request for {} failed: {}", spec.url(), e);
                return RequestSample::no_response();
            }
        };

        if let Some(observer) = &self.observer {
            observer.on_request(&RequestDescriptor {
                method: request.method(),
                url: request.url(),
                version: request.version(),
                headers: request.headers(),
                body: spec.body(),
            });
        }

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                let failure = TransportFailure::classify(&e);
                warn!(failure = %failure, "fetching {} failed: {}", spec.url(), e);
                return RequestSample::no_response();
            }
        };
        let time_to_first_byte = start.elapsed();

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();

        match response.bytes().await {
            Ok(body) => {
                let time_total = start.elapsed();
                if let Some(observer) = &self.observer {
                    observer.on_response(&ResponseDescriptor {
                        version,
                        status,
                        headers: &headers,
                        body: &body,
                    });
                }
                RequestSample::response(status.as_u16(), time_to_first_byte, Some(time_total))
            }
            Err(e) => {
                warn!("reading response from {} failed: {}", spec.url(), e);
                RequestSample::response(status.as_u16(), time_to_first_byte, None)
            }
        }
    }
}
