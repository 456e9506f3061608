//! DanubeData REST API client
//!
//! Bearer-token authenticated JSON calls with bounded retries. Every mutating
//! call carries an `Idempotency-Key` generated once per call and reused for
//! each retry, so a POST that reached the server before a network fault is
//! not executed twice.

use crate::error::{api_error, transport_error};
use danubedata_config::ProviderConfig;
use danubedata_core::{ApplyContext, ProviderError, Result, RetryConfig};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// DanubeData API client
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Outcome of one HTTP attempt that did not succeed
struct Failure {
    error: ProviderError,
    retry_after: Option<Duration>,
}

impl From<ProviderError> for Failure {
    fn from(error: ProviderError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl ApiClient {
    /// Create a client from the provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_token = config
            .require_token()
            .map_err(|e| ProviderError::Config(e.to_string()))?
            .to_string();
        config
            .validate()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("pulumi-danubedata/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Create a resource in `collection`; returns the created object
    pub async fn create(&self, collection: &str, body: &Value, ctx: &ApplyContext) -> Result<Value> {
        let key = Uuid::new_v4().to_string();
        let created = self
            .execute(Method::POST, collection, Some(body), Some(&key), ctx)
            .await?;
        created.ok_or_else(|| ProviderError::ResourceNotFound(collection.to_string()))
    }

    /// Fetch a resource; `None` if the API reports it missing
    pub async fn get(&self, collection: &str, id: &str, ctx: &ApplyContext) -> Result<Option<Value>> {
        let path = item_path(collection, id);
        self.execute(Method::GET, &path, None, None, ctx).await
    }

    /// List every item under `path`
    ///
    /// Accepts a bare array or a `{"data": [...]}` envelope and follows
    /// `meta.last_page` through `?page=N`.
    pub async fn list(&self, path: &str, ctx: &ApplyContext) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 1u64;

        loop {
            let page_path = if page == 1 {
                path.to_string()
            } else {
                format!("{}?page={}", path, page)
            };
            let payload = self
                .execute(Method::GET, &page_path, None, None, ctx)
                .await?
                .ok_or_else(|| ProviderError::ResourceNotFound(path.to_string()))?;

            let (batch, last_page) = list_page(path, payload)?;
            items.extend(batch);
            if page >= last_page {
                break;
            }
            page += 1;
        }

        tracing::debug!("Listed {} items from {} ({} pages)", items.len(), path, page);
        Ok(items)
    }

    /// Patch a resource with the given fields
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        body: &Value,
        ctx: &ApplyContext,
    ) -> Result<Value> {
        let path = item_path(collection, id);
        let key = Uuid::new_v4().to_string();
        self.execute(Method::PATCH, &path, Some(body), Some(&key), ctx)
            .await?
            .ok_or(ProviderError::ResourceNotFound(path))
    }

    /// Delete a resource; returns `false` if it was already gone
    pub async fn delete(&self, collection: &str, id: &str, ctx: &ApplyContext) -> Result<bool> {
        let path = item_path(collection, id);
        let key = Uuid::new_v4().to_string();
        let deleted = self
            .execute(Method::DELETE, &path, None, Some(&key), ctx)
            .await?;
        Ok(deleted.is_some())
    }

    /// Send a request, retrying transient failures with backoff
    ///
    /// Returns `None` on 404.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
        ctx: &ApplyContext,
    ) -> Result<Option<Value>> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let outcome = ctx
                .run(async {
                    Ok(self
                        .send_once(method.clone(), path, body, idempotency_key)
                        .await)
                })
                .await?;

            let failure = match outcome {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !failure.error.is_transient() || attempts == 1 {
                return Err(failure.error);
            }

            if attempt + 1 >= attempts {
                return Err(ProviderError::RetriesExhausted {
                    attempts,
                    source: Box::new(failure.error),
                });
            }

            // a server-requested delay is honoured as is; the context deadline bounds it
            let delay = failure
                .retry_after
                .unwrap_or_else(|| self.retry.delay_for_attempt(attempt));
            tracing::warn!(
                "{} {} failed (attempt {}/{}): {}. Retrying in {:?}",
                method,
                path,
                attempt + 1,
                attempts,
                failure.error,
                delay
            );
            ctx.sleep(delay).await?;
            attempt += 1;
        }
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
    ) -> std::result::Result<Option<Value>, Failure> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let retry_after = retry_after(&response);
        let text = response.text().await.map_err(transport_error)?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            // gateways answer with HTML; keep the status, drop the body
            let payload = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Err(Failure {
                error: api_error(status.as_u16(), &payload),
                retry_after,
            });
        }

        Ok(Some(unwrap_envelope(parse_body(&text)?)))
    }
}

fn item_path(collection: &str, id: &str) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), id)
}

fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

/// `{"data": {...}}` -> `{...}`
fn unwrap_envelope(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Items and last page number of one list response
fn list_page(path: &str, payload: Value) -> Result<(Vec<Value>, u64)> {
    match payload {
        Value::Array(items) => Ok((items, 1)),
        Value::Object(mut map) => {
            let last_page = map
                .get("meta")
                .and_then(|meta| meta.get("last_page"))
                .and_then(Value::as_u64)
                .unwrap_or(1);
            match map.remove("data") {
                Some(Value::Array(items)) => Ok((items, last_page)),
                _ => Err(ProviderError::InvalidResponse(format!(
                    "{} returned no item list",
                    path
                ))),
            }
        }
        _ => Err(ProviderError::InvalidResponse(format!(
            "{} returned no item list",
            path
        ))),
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope() {
        assert_eq!(
            unwrap_envelope(json!({"data": {"id": 1}, "meta": {}})),
            json!({"id": 1})
        );
        // list envelopes are left alone
        assert_eq!(
            unwrap_envelope(json!({"data": [1, 2]})),
            json!({"data": [1, 2]})
        );
        assert_eq!(unwrap_envelope(json!({"id": 2})), json!({"id": 2}));
    }

    #[test]
    fn test_list_page_forms() {
        let (items, last) = list_page("/vps", json!([{"id": 1}])).unwrap();
        assert_eq!((items.len(), last), (1, 1));

        let (items, last) = list_page(
            "/vps",
            json!({"data": [{"id": 1}, {"id": 2}], "meta": {"current_page": 1, "last_page": 3}}),
        )
        .unwrap();
        assert_eq!((items.len(), last), (2, 3));

        let err = list_page("/vps", json!({"data": {"id": 1}})).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_item_path() {
        assert_eq!(item_path("/vps", "12"), "/vps/12");
        assert_eq!(item_path("/storage/buckets/", "b-1"), "/storage/buckets/b-1");
    }

    #[test]
    fn test_parse_empty_body() {
        assert_eq!(parse_body("").unwrap(), Value::Null);
        assert!(parse_body("<html>").is_err());
    }

    #[test]
    fn test_new_requires_token() {
        let err = ApiClient::new(&ProviderConfig::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }
}
