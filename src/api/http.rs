//! HTTP transport for Campus REST API calls

use super::auth::CredentialProvider;
use crate::config::ClientConfig;
use crate::error::{Error, Result, TransportKind};
use crate::resource::Verb;
use crate::schema::{validate_response, SchemaRegistry};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Maximum length of a server message carried in an error
const MAX_MESSAGE_LENGTH: usize = 500;

/// Upper bound for a single retry delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();

    if cleaned.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &cleaned[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        cleaned
    }
}

/// Cap a caller-facing message without altering its characters
fn truncate_message(message: &str) -> String {
    let message = message.trim();
    match message.char_indices().nth(MAX_MESSAGE_LENGTH) {
        Some((end, _)) => format!("{}...", &message[..end]),
        None => message.to_string(),
    }
}

/// Pull a human-readable message out of an error body
///
/// Campus answers with `{"error_code": ..., "message": ...}`; other APIs
/// nest it as `{"error": {"message": ...}}`.
fn error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            truncate_message(body)
        }
    };

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    let message = json
        .get("message")
        .and_then(|v| v.as_str())
        .or_else(|| json.get("error").and_then(|e| e.as_str()))
        .or_else(|| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
        });

    match (json.get("error_code"), message) {
        (Some(code), Some(msg)) => format!("{}: {}", value_text(code), truncate_message(msg)),
        (Some(code), None) => value_text(code),
        (None, Some(msg)) => truncate_message(msg),
        (None, None) => fallback(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

fn classify(err: &reqwest::Error) -> TransportKind {
    if err.is_timeout() {
        TransportKind::Timeout
    } else {
        TransportKind::ConnectionFailed
    }
}

/// A fully resolved call, ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Verb,
    /// Path segments below the API root, parameters already substituted
    pub segments: Vec<String>,
    pub body: Option<Value>,
    /// Schema the response must satisfy
    pub response_schema: Option<String>,
    /// Per-call timeout overriding the client-wide one
    pub timeout: Option<Duration>,
}

/// HTTP transport shared by every resource of a client
#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
    version: String,
    retries: u32,
    retry_delay: Duration,
    credentials: Arc<dyn CredentialProvider>,
    registry: Arc<SchemaRegistry>,
}

impl Transport {
    /// Create a transport from a validated configuration
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            version: config.version.clone(),
            retries: config.retries,
            retry_delay: config.retry_delay,
            credentials,
            registry,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Compose the absolute URL for a list of path segments
    ///
    /// Segments are percent-encoded, so a bound value can never add path
    /// components or a query string.
    pub fn url(&self, segments: &[String]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                Error::Configuration(format!("base URL `{}` cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend(self.version.split('/').filter(|s| !s.is_empty()));
            path.extend(segments);
        }
        Ok(url)
    }

    /// Execute a request, retrying transient failures
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value> {
        let url = self.url(&request.segments)?;
        let max_attempts = self.retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(request, &url, attempt).await {
                Ok(body) => return self.check(request, body),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = backoff_delay(self.retry_delay, attempt);
                    tracing::warn!(
                        "{} {} failed (attempt {}/{}): {}; retrying in {:?}",
                        request.method,
                        url,
                        attempt,
                        max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt; `Ok(None)` means the server sent no content
    async fn attempt(&self, request: &ApiRequest, url: &Url, attempt: u32) -> Result<Option<Value>> {
        tracing::debug!("{} {}", request.method, url);

        let transport_error = |kind: TransportKind, status: Option<u16>, message: String| {
            Error::Transport {
                kind,
                url: url.to_string(),
                status,
                message,
                attempts: attempt,
            }
        };

        let credential = self.credentials.credential().await?;

        let mut builder = self
            .client
            .request(request.method.to_method(), url.clone());
        builder = credential.apply(builder);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(classify(&e), None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(classify(&e), Some(status.as_u16()), e.to_string()))?;

        tracing::debug!("{} {} -> {}", request.method, url, status);

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            let kind = if status.is_server_error() {
                TransportKind::ServerError
            } else {
                TransportKind::ClientError
            };
            return Err(transport_error(
                kind,
                Some(status.as_u16()),
                error_message(status, &body),
            ));
        }

        // Handle empty response
        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            transport_error(
                TransportKind::InvalidBody,
                Some(status.as_u16()),
                format!("failed to parse response JSON: {}", e),
            )
        })?;

        // Campus may report failures in a 2xx body
        if value.get("error_code").is_some() {
            tracing::error!("API error in {} body: {}", status, sanitize_for_log(&body));
            return Err(transport_error(
                TransportKind::ClientError,
                Some(status.as_u16()),
                error_message(status, &body),
            ));
        }

        Ok(Some(value))
    }

    /// Validate against the response schema; an empty body counts as `null`
    fn check(&self, request: &ApiRequest, body: Option<Value>) -> Result<Value> {
        let value = body.unwrap_or(Value::Null);

        if let Some(schema) = &request.response_schema {
            validate_response(&self.registry, schema, &value).map_err(Error::SchemaMismatch)?;
        }

        Ok(value)
    }
}
