//! Authenticated HTTP transport.
//!
//! Task units build a fully prepared [`PreparedRequest`] and hand it to a
//! [`Transport`] together with the [`AuthContext`] whose cookies should
//! accompany it. The production implementation is [`HttpTransport`]; tests
//! substitute their own.

mod http;

pub use http::HttpTransport;

use crate::config::ConnectionConfig;
use crate::error::TransportError;
use reqwest::cookie::{CookieStore, Jar};
use std::sync::Arc;

/// HTTP method of a prepared request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// A request ready to be executed: nothing is added by the transport apart
/// from the session cookies and the client's user agent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Headers in insertion order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Vec<u8>>,
}

impl PreparedRequest {
    /// A GET request for `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request for `url` without a body
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a form-encoded body from ordered fields
    pub fn form(self, fields: &[(&str, &str)]) -> Self {
        let mut request = self.header("Content-Type", "application/x-www-form-urlencoded");
        request.body = Some(crate::utils::form_urlencode(fields).into_bytes());
        request
    }

    /// Value of the first header named `name` (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text, if any
    pub fn body_text(&self) -> Option<&str> {
        self.body
            .as_deref()
            .and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// Response returned by a transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Full response body
    pub body: Vec<u8>,
}

impl Response {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`TransportError::Status`]
    pub fn error_for_status(self, url: &str) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status,
                url: url.to_string(),
            })
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes prepared requests under an authentication context
///
/// Any HTTP status is a successful execution; only failures to obtain a
/// response are errors.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request`, sending the session state held by `auth`
    async fn execute(
        &self,
        request: PreparedRequest,
        auth: &AuthContext,
    ) -> Result<Response, TransportError>;
}

/// Cookie-carrying HTTP session
///
/// Cloning shares the underlying client and cookie jar, so a login performed
/// through one clone is visible to all of them.
#[derive(Clone, Debug)]
pub struct AuthContext {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl AuthContext {
    /// Create a fresh session with an empty cookie jar
    pub fn new(config: &ConnectionConfig) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, jar })
    }

    /// The HTTP client bound to this session's cookie jar
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Whether the jar holds a cookie named `name` for `url`
    pub fn has_cookie(&self, url: &str, name: &str) -> bool {
        let Ok(url) = url::Url::parse(url) else {
            return false;
        };
        let Some(header) = self.jar.cookies(&url) else {
            return false;
        };
        let Ok(value) = header.to_str() else {
            return false;
        };
        value
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .any(|(n, v)| n == name && !v.is_empty())
    }
}
