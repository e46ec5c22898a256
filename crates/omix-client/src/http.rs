//! Thin async HTTP layer over `reqwest`.
//!
//! Every call takes a [`CancellationToken`]; a cancelled call resolves to
//! [`OmixError::Cancelled`] and the underlying request is dropped.

use std::future::Future;
use std::sync::Arc;

use omix_core::{ClientConfig, OmixError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared HTTP client bound to one backend. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl ApiClient {
    pub fn new(config: Arc<ClientConfig>) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(auth_headers(&config)?)
            .build()
            .map_err(|e| OmixError::Network(format!("could not build http client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: &CancellationToken,
    ) -> Result<T> {
        let req = self.request(Method::GET, path)?.query(query);
        let body = self.execute(req, token).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: &CancellationToken,
    ) -> Result<T> {
        let req = self.request(Method::POST, path)?.json(body);
        let body = self.execute(req, token).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: &CancellationToken,
    ) -> Result<T> {
        let req = self.request(Method::PATCH, path)?.json(body);
        let body = self.execute(req, token).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// DELETE; the response body is ignored.
    pub async fn delete(&self, path: &str, token: &CancellationToken) -> Result<()> {
        let req = self.request(Method::DELETE, path)?;
        self.execute(req, token).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.config.api_url(path)?;
        Ok(self.http.request(method, url))
    }

    async fn execute(&self, req: RequestBuilder, token: &CancellationToken) -> Result<Vec<u8>> {
        cancellable(token, async move {
            let response = req.send().await.map_err(network_error)?;
            let status = response.status();
            let url = response.url().clone();
            let body = response.bytes().await.map_err(network_error)?;
            debug!(%url, status = status.as_u16(), bytes = body.len(), "Backend response");
            if !status.is_success() {
                return Err(OmixError::HttpStatus {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).trim().to_string(),
                });
            }
            Ok(body.to_vec())
        })
        .await
    }
}

/// Races `fut` against `token`; cancellation wins ties.
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(OmixError::Cancelled),
        res = fut => res,
    }
}

fn network_error(e: reqwest::Error) -> OmixError {
    OmixError::Network(e.to_string())
}

fn auth_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let auth = &config.auth;
    if let Some(token) = &auth.token {
        headers.insert(AUTHORIZATION, header_value(&format!("Token {token}"))?);
    }
    if let Some(csrf) = &auth.csrf_token {
        headers.insert("X-CSRFToken", header_value(csrf)?);
    }
    if let Some(cookie) = session_cookie(config) {
        headers.insert(COOKIE, header_value(&cookie)?);
    }
    Ok(headers)
}

/// `Cookie` value carrying the session and CSRF cookies, if any are set.
pub(crate) fn session_cookie(config: &ClientConfig) -> Option<String> {
    let mut parts = vec![];
    if let Some(session) = &config.auth.session_id {
        parts.push(format!("sessionid={session}"));
    }
    if let Some(csrf) = &config.auth.csrf_token {
        parts.push(format!("csrftoken={csrf}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|_| OmixError::Config("credentials contain invalid header characters".into()))
}
