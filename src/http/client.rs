//! reqwest-backed resource client.

use std::error::Error as _;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::envelope::Envelope;
use crate::error::ApiError;

/// A REST resource rooted at a base URL.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpResource {
    client: Client,
    base: Url,
    bearer: Option<String>,
}

impl HttpResource {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        Ok(Self::with_client(Client::new(), normalize_base(base)?))
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self {
            client,
            base,
            bearer: None,
        }
    }

    /// Build with a connect timeout. The per-call deadline is enforced by the
    /// caller's policy, not here.
    pub fn with_connect_timeout(base: &str, connect_timeout: Duration) -> Result<Self, ApiError> {
        let base = normalize_base(base).map_err(|e| ApiError::validation(e.to_string()))?;
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ApiError::from_transport(e.to_string()))?;
        Ok(Self::with_client(client, base))
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` against the base URL. Leading slashes are ignored so
    /// the base path is kept.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::validation(format!("invalid path '{path}': {e}")))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
        self.send::<(), T>(Method::DELETE, path, None).await
    }

    /// Send one request and decode the response envelope.
    pub async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Envelope<T>, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            tracing::debug!(method = %method, url = %url, status = status.as_u16(), "Request failed");
            return Err(ApiError::from_status(status.as_u16(), error_message(status, &text)));
        }

        decode_envelope(status, &text)
    }
}

/// Directory-style base so `join` appends instead of replacing the last segment.
fn normalize_base(base: &str) -> Result<Url, url::ParseError> {
    if base.ends_with('/') {
        Url::parse(base)
    } else {
        Url::parse(&format!("{base}/"))
    }
}

/// Transport failures carry no status; timeouts are network-class too.
fn classify_transport(err: reqwest::Error) -> ApiError {
    // The platform's exhaustion code can sit anywhere in the source chain.
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    ApiError::from_transport(message)
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        })
}

/// Accept both `{data, meta}` envelopes and bare payloads.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<Envelope<T>, ApiError> {
    let value: Value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(body)
            .map_err(|e| ApiError::server(format!("invalid JSON response: {e}")).with_status(status.as_u16()))?
    };

    let is_envelope = value.as_object().is_some_and(|o| o.contains_key("data"));
    if is_envelope {
        let mut envelope: Envelope<T> = serde_json::from_value(value)
            .map_err(|e| ApiError::server(format!("unexpected response shape: {e}")))?;
        envelope.meta = Some(merge_status(envelope.meta.take(), status));
        return Ok(envelope);
    }

    let data: T = serde_json::from_value(value)
        .map_err(|e| ApiError::server(format!("unexpected response shape: {e}")))?;
    Ok(Envelope::with_meta(data, merge_status(None, status)))
}

fn merge_status(meta: Option<Value>, status: StatusCode) -> Value {
    let mut object = match meta {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    object.insert("status".into(), json!(status.as_u16()));
    Value::Object(object)
}
