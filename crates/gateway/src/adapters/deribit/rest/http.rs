//! HTTP seam of the REST client

use crate::config::{Credentials, RestConfig};
use crate::error::RestError;
use async_trait::async_trait;
use reqwest::Client;

/// One GET against the JSON-RPC-over-HTTP API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// e.g. `/api/v2/private/get_positions`
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Attach basic auth
    pub authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request and returns the raw status and body
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RestError>;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl ReqwestTransport {
    pub fn new(config: &RestConfig, credentials: Credentials) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RestError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.get(&url).query(&request.query);
        if request.authenticated {
            builder = builder.basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            );
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}
