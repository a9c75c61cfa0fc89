//! Service session: the HTTP layer of the verifier
//!
//! One session per service under test. Holds the reqwest client, the
//! service root, and the headers the calling rule supplied (auth,
//! content negotiation). Sessions are cheap to clone and safe to share
//! across concurrent verification attempts.

use std::time::Duration;

use serde_json::Value;
use url::Url;
use wireproof_schema::FormatVersion;

use crate::error::VerifyResult;

/// Configuration for a verification session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root URL of the service under test
    pub base_url: String,
    /// Headers attached to every request
    pub headers: Vec<(String, String)>,
    /// Per-request timeout; exceeding it hard-fails the attempt,
    /// requests are never retried
    pub timeout: Duration,
    /// Payload-encoding generation of the service
    pub format_version: FormatVersion,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
            format_version: FormatVersion::V4,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_format(mut self, version: FormatVersion) -> Self {
        self.format_version = version;
        self
    }
}

/// A captured request/response round-trip.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub url: String,
    pub method: String,
    pub request_body: Option<String>,
    pub status: u16,
    pub response_body: String,
    /// Location header of the response, if the service sent one
    pub location: Option<String>,
    /// ETag header of the response, if the service sent one
    pub etag: Option<String>,
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the response body as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.response_body).ok()
    }
}

/// HTTP client bound to one service under test.
#[derive(Debug, Clone)]
pub struct ServiceSession {
    client: reqwest::Client,
    base_url: String,
    headers: Vec<(String, String)>,
    format_version: FormatVersion,
}

impl ServiceSession {
    /// Build a session from its configuration.
    pub fn new(config: SessionConfig) -> VerifyResult<Self> {
        // Parse up front so a bad root fails the session, not every
        // attempt.
        Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers: config.headers,
            format_version: config.format_version,
        })
    }

    pub fn format_version(&self) -> FormatVersion {
        self.format_version
    }

    /// Absolute URL for an entity set.
    pub fn set_url(&self, entity_set: &str) -> String {
        format!("{}/{}", self.base_url, entity_set)
    }

    /// Resolve a possibly-relative resource identifier against the
    /// service root.
    pub fn absolute(&self, identifier: &str) -> String {
        if identifier.starts_with("http://") || identifier.starts_with("https://") {
            identifier.to_string()
        } else {
            format!("{}/{}", self.base_url, identifier.trim_start_matches('/'))
        }
    }

    /// POST a structured entity payload to an entity set.
    pub async fn create(&self, entity_set: &str, payload: &Value) -> VerifyResult<Exchange> {
        let url = self.set_url(entity_set);
        let body = payload.to_string();
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body.clone());
        request = self.apply_headers(request);
        let response = request.send().await?;
        self.capture(url, "POST", Some(body), response).await
    }

    /// POST a media entity as a raw octet stream.
    pub async fn create_media(&self, entity_set: &str, content: Vec<u8>) -> VerifyResult<Exchange> {
        let url = self.set_url(entity_set);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .body(content.clone());
        request = self.apply_headers(request);
        let response = request.send().await?;
        self.capture(url, "POST", Some(format!("<{} media bytes>", content.len())), response)
            .await
    }

    /// GET a resource, optionally with an `$expand` query.
    pub async fn read(&self, resource_url: &str, expand: Option<&str>) -> VerifyResult<Exchange> {
        let url = match expand {
            Some(expr) if !expr.is_empty() => format!("{resource_url}?$expand={expr}"),
            _ => resource_url.to_string(),
        };
        let mut request = self.client.get(&url).header("Accept", "application/json");
        request = self.apply_headers(request);
        let response = request.send().await?;
        self.capture(url, "GET", None, response).await
    }

    /// DELETE a resource, with `If-Match` when an ETag is known.
    pub async fn delete(&self, resource_url: &str, etag: Option<&str>) -> VerifyResult<Exchange> {
        let mut request = self.client.delete(resource_url);
        request = request.header("If-Match", etag.unwrap_or("*"));
        request = self.apply_headers(request);
        let response = request.send().await?;
        self.capture(resource_url.to_string(), "DELETE", None, response)
            .await
    }

    fn apply_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        request
    }

    async fn capture(
        &self,
        url: String,
        method: &str,
        request_body: Option<String>,
        response: reqwest::Response,
    ) -> VerifyResult<Exchange> {
        let status = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let location = header("Location");
        let etag = header("ETag");
        let response_body = response.text().await?;
        tracing::debug!(%url, method, status, "service exchange");
        Ok(Exchange {
            url,
            method: method.to_string(),
            request_body,
            status,
            response_body,
            location,
            etag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ServiceSession::new(SessionConfig::new("not a url")).is_err());
    }

    #[test]
    fn test_url_joining() {
        let session =
            ServiceSession::new(SessionConfig::new("http://svc.example/odata/")).unwrap();
        assert_eq!(session.set_url("Customers"), "http://svc.example/odata/Customers");
        assert_eq!(
            session.absolute("Customers(1)"),
            "http://svc.example/odata/Customers(1)"
        );
        assert_eq!(
            session.absolute("http://svc.example/odata/Customers(1)"),
            "http://svc.example/odata/Customers(1)"
        );
    }
}
