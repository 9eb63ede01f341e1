//! Immutable description of the request every virtual client repeats

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use crate::error::{EngineError, Result};

/// Request issued against one target for a whole sweep.
///
/// Built once before the sweep starts and shared read-only by every worker.
#[derive(Clone, Debug)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestSpec {
    /// Plain GET request without headers or body
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url, HeaderMap::new(), Bytes::new())
    }

    pub fn new(method: Method, url: &str, headers: HeaderMap, body: Bytes) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| EngineError::InvalidRequest(format!("{}: {}", url, e)))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(EngineError::InvalidRequest(format!(
                    "unsupported scheme {:?} in {}",
                    other, url
                )))
            }
        }
        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    /// Same request against a different target
    pub fn with_url(&self, url: &str) -> Result<Self> {
        Self::new(
            self.method.clone(),
            url,
            self.headers.clone(),
            self.body.clone(),
        )
    }

    /// Append a header value, keeping values already present under the same name
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EngineError::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EngineError::InvalidRequest(format!("header value {:?}: {}", value, e)))?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
