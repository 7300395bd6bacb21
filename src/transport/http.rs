//! reqwest-backed transport

use super::{AuthContext, Method, PreparedRequest, Response, Transport};
use crate::error::TransportError;

/// Production [`Transport`] that sends requests through the session's
/// reqwest client
#[derive(Clone, Debug, Default)]
pub struct HttpTransport;

impl HttpTransport {
    /// Create the transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: PreparedRequest,
        auth: &AuthContext,
    ) -> Result<Response, TransportError> {
        let url = url::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", request.url, e)))?;

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = auth.client().request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        tracing::debug!(method = ?request.method, url = %request.url, "Sending request");

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(url = %request.url, status, bytes = body.len(), "Received response");

        Ok(Response { status, body })
    }
}
