//! Shared outbound HTTP plumbing for provider clients

use crate::config::UpstreamConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::limiter::RateLimiter;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

pub fn build_client(cfg: &UpstreamConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .timeout(cfg.timeout())
        .build()
        .context("building HTTP client")
}

/// One provider's view of the shared client: its name for logs and errors,
/// and its optional rate limiter.
#[derive(Clone)]
pub struct Upstream {
    client: reqwest::Client,
    provider: &'static str,
    limiter: Option<Arc<RateLimiter>>,
}

impl Upstream {
    pub fn new(client: reqwest::Client, provider: &'static str, rate_limit: Option<u32>) -> Self {
        Self {
            client,
            provider,
            limiter: rate_limit.map(|l| Arc::new(RateLimiter::per_minute(l))),
        }
    }

    /// GET `url` and decode the JSON body. `auth` goes into the
    /// `Authorization` header verbatim.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        auth: Option<&str>,
    ) -> ProviderResult<T> {
        if let Some(limiter) = &self.limiter {
            if !limiter.try_acquire() {
                warn!(
                    "{}: local rate limit exhausted, retry in {:.1}s",
                    self.provider,
                    limiter.retry_after().as_secs_f64()
                );
                return Err(ProviderError::RateLimited {
                    provider: self.provider,
                });
            }
        }

        debug!("{}: GET {} {:?}", self.provider, url, redact(query));

        let mut req = self
            .client
            .get(url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = auth {
            req = req.header(reqwest::header::AUTHORIZATION, key);
        }

        let resp = req.send().await.map_err(|source| {
            warn!("{}: request to {} failed: {}", self.provider, url, source);
            ProviderError::Http {
                provider: self.provider,
                source,
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("{}: HTTP {} from {}: {}", self.provider, status, url, body);
            return Err(ProviderError::Status {
                provider: self.provider,
                status,
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|source| ProviderError::Http {
            provider: self.provider,
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!("{}: undecodable body from {}: {}", self.provider, url, e);
            ProviderError::decode(self.provider, e)
        })
    }
}

/// Hide API keys carried in query strings from logs.
fn redact<'a>(query: &'a [(&'a str, String)]) -> Vec<(&'a str, &'a str)> {
    query
        .iter()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("apikey") || k.eq_ignore_ascii_case("api_key") {
                (*k, "***")
            } else {
                (*k, v.as_str())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubUpstream;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn decodes_body_and_forwards_auth_header() {
        let stub = StubUpstream::start(Router::new().route(
            "/echo",
            get(|headers: axum::http::HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({ "auth": auth }))
            }),
        ))
        .await;

        let upstream = Upstream::new(reqwest::Client::new(), "stub", None);
        let body: Value = upstream
            .get_json(&stub.url("/echo"), &[], Some("secret"))
            .await
            .unwrap();
        assert_eq!(body["auth"], "secret");
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let stub = StubUpstream::start(Router::new().route(
            "/down",
            get(|| async { (StatusCode::UNAUTHORIZED, "invalid key") }),
        ))
        .await;

        let upstream = Upstream::new(reqwest::Client::new(), "stub", None);
        let err = upstream
            .get_json::<Value>(&stub.url("/down"), &[], None)
            .await
            .unwrap_err();
        match err {
            ProviderError::Status { status, body, .. } => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert_eq!(body, "invalid key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_limiter_fails_without_calling_upstream() {
        let stub = StubUpstream::json("/ok", json!({ "ok": true })).await;
        let upstream = Upstream::new(reqwest::Client::new(), "stub", Some(1));

        let first: ProviderResult<Value> = upstream.get_json(&stub.url("/ok"), &[], None).await;
        assert!(first.is_ok());
        let second: ProviderResult<Value> = upstream.get_json(&stub.url("/ok"), &[], None).await;
        assert!(matches!(second, Err(ProviderError::RateLimited { .. })));
        assert_eq!(stub.hits("/ok"), 1);
    }

    #[test]
    fn api_keys_are_redacted() {
        let query = vec![("apikey", "secret".to_string()), ("function", "CPI".to_string())];
        assert_eq!(redact(&query), vec![("apikey", "***"), ("function", "CPI")]);
    }
}
