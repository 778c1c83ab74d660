// crates/nutri-probe/src/probe.rs
// ============================================================================
// Module: Route Prober
// Description: Single-attempt HTTP probes with captured raw responses.
// Purpose: Exercise one endpoint and hand status, headers, and body to checks.
// Dependencies: reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! A probe is one HTTP request issued through a session's client. Redirects
//! are never followed, so a `302` to the login page is observable. Non-2xx
//! statuses are data, not errors: [`ProbeError`] is reserved for transport
//! failures (connection refused, timeout, unreadable body) so they stay
//! distinguishable from application-level failures.
//! There is no retry: every probe is a single attempt.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

use crate::config::ProbeConfig;
use crate::config::TargetConfig;
use crate::telemetry::EventOutcome;
use crate::telemetry::ProbeEvent;
use crate::telemetry::ProbeEventSink;
use crate::telemetry::emit;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport-level probe failures.
///
/// # Invariants
/// - HTTP error statuses are never represented here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    Client(String),
    /// The request could not be built (bad route, header, or body).
    #[error("invalid probe request: {0}")]
    InvalidRequest(String),
    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The request or body read exceeded the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The response exceeded the configured size limit.
    #[error("response exceeds size limit of {max_bytes} bytes")]
    TooLarge {
        /// Configured limit in bytes.
        max_bytes: usize,
    },
    /// Any other transport failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ProbeError {
    /// Returns a stable label for the failure category.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Connect(_) => "connect",
            Self::Timeout(_) => "timeout",
            Self::TooLarge {
                ..
            } => "too_large",
            Self::Transport(_) => "transport",
        }
    }

    /// Classifies a reqwest error into a probe failure category.
    fn from_reqwest(err: &reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_connect() {
            Self::Connect(message)
        } else if err.is_builder() {
            Self::InvalidRequest(message)
        } else {
            Self::Transport(message)
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// HTTP methods used by probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl Method {
    /// Returns the wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Converts to the reqwest method type.
    const fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProbeBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document.
    Json(Value),
    /// Form-encoded pairs.
    Form(Vec<(String, String)>),
}

/// One probe request relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    /// HTTP method.
    pub method: Method,
    /// Route path beginning with `/`.
    pub path: String,
    /// Query pairs appended in order.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: ProbeBody,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl ProbeRequest {
    /// Creates a request with no query, body, or extra headers.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: ProbeBody::Empty,
            headers: Vec::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Creates a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Creates a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Creates a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Appends a query pair.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = ProbeBody::Json(value);
        self
    }

    /// Sets a form-encoded body.
    #[must_use]
    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = ProbeBody::Form(pairs);
        self
    }

    /// Appends a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Raw probe response.
///
/// # Invariants
/// - `headers` names are lowercase.
/// - `body.len()` never exceeds the configured response limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// Absolute URL that was requested.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers in wire order.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Vec<u8>,
    /// Time from send to fully read body.
    pub elapsed: Duration,
}

impl ProbeResponse {
    /// Returns the first header value for a name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Returns the raw `Location` header.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Resolves the `Location` header against the request URL.
    #[must_use]
    pub fn location_url(&self) -> Option<Url> {
        let location = self.location()?;
        Url::parse(&self.url).ok()?.join(location).ok()
    }

    /// Returns the path component of the redirect target.
    #[must_use]
    pub fn location_path(&self) -> Option<String> {
        self.location_url().map(|url| url.path().to_string())
    }

    /// Returns true for 3xx statuses.
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when the body is not JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Returns the first `max_chars` characters of the body for display.
    #[must_use]
    pub fn excerpt(&self, max_chars: usize) -> String {
        let text = self.text();
        let mut excerpt: String = text.chars().take(max_chars).collect();
        if text.chars().count() > max_chars {
            excerpt.push('…');
        }
        excerpt
    }
}

// ============================================================================
// SECTION: Prober
// ============================================================================

/// HTTP client bound to a configuration and a cookie jar.
#[derive(Clone)]
pub struct Prober {
    /// Shared probe configuration.
    config: Arc<ProbeConfig>,
    /// Blocking client with redirects disabled.
    client: Client,
    /// Cookie jar persisted across requests.
    jar: Arc<Jar>,
}

impl Prober {
    /// Builds a prober with a fresh cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Client`] when the client cannot be built.
    pub fn new(config: Arc<ProbeConfig>) -> Result<Self, ProbeError> {
        let jar = Arc::new(Jar::default());
        let client = build_http_client(&config.target, Arc::clone(&jar))?;
        Ok(Self {
            config,
            client,
            jar,
        })
    }

    /// Returns the configuration this prober resolves routes against.
    #[must_use]
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Returns the cookie jar shared by every request.
    #[must_use]
    pub const fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// Sends one probe and captures the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] for transport failures only; any HTTP status is
    /// returned as a [`ProbeResponse`].
    pub fn send(
        &self,
        request: &ProbeRequest,
        sink: &dyn ProbeEventSink,
    ) -> Result<ProbeResponse, ProbeError> {
        let started = Instant::now();
        let result = self.send_inner(request, started);
        emit_probe(sink, request.method.as_str(), &request.path, started, &result);
        result
    }

    /// Sends a GET to an absolute URL (used to follow a login redirect).
    ///
    /// Emits a probe event for the URL path, like [`Prober::send`].
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] for transport failures.
    pub fn get_absolute(
        &self,
        url: &Url,
        sink: &dyn ProbeEventSink,
    ) -> Result<ProbeResponse, ProbeError> {
        let started = Instant::now();
        let builder = self.client.get(url.clone());
        let result = self.execute(builder, url, started);
        emit_probe(sink, "GET", url.path(), started, &result);
        result
    }

    /// Builds and executes the request without event emission.
    fn send_inner(
        &self,
        request: &ProbeRequest,
        started: Instant,
    ) -> Result<ProbeResponse, ProbeError> {
        if !request.path.starts_with('/') {
            return Err(ProbeError::InvalidRequest(format!(
                "path must start with '/': {}",
                request.path
            )));
        }
        let url = self
            .config
            .url_for(&request.path, &request.query)
            .map_err(|err| ProbeError::InvalidRequest(err.to_string()))?;
        let mut builder = self.client.request(request.method.to_reqwest(), url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            ProbeBody::Empty => builder,
            ProbeBody::Json(value) => builder.json(value),
            ProbeBody::Form(pairs) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encode_form(pairs)),
        };
        self.execute(builder, &url, started)
    }

    /// Sends a prepared request and reads the bounded body.
    fn execute(
        &self,
        builder: RequestBuilder,
        url: &Url,
        started: Instant,
    ) -> Result<ProbeResponse, ProbeError> {
        let mut response = builder.send().map_err(|err| ProbeError::from_reqwest(&err))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_ascii_lowercase(), value)
            })
            .collect();
        let body = read_response_limited(&mut response, self.config.target.max_response_bytes)?;
        Ok(ProbeResponse {
            url: url.to_string(),
            status,
            headers,
            body,
            elapsed: started.elapsed(),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Emits the probe event for one finished request.
fn emit_probe(
    sink: &dyn ProbeEventSink,
    method: &str,
    path: &str,
    started: Instant,
    result: &Result<ProbeResponse, ProbeError>,
) {
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let (status, outcome, error_kind) = match result {
        Ok(response) => (Some(response.status), EventOutcome::Ok, None),
        Err(err) => (None, EventOutcome::Error, Some(err.kind())),
    };
    emit(
        sink,
        &ProbeEvent::Probe {
            method: method.to_string(),
            path: path.to_string(),
            status,
            elapsed_ms,
            outcome,
            error_kind,
        },
    );
}

/// Builds a blocking client with redirects disabled and a shared cookie jar.
fn build_http_client(target: &TargetConfig, jar: Arc<Jar>) -> Result<Client, ProbeError> {
    Client::builder()
        .timeout(Duration::from_millis(target.timeout_ms))
        .user_agent(target.user_agent.clone())
        .redirect(Policy::none())
        .cookie_provider(jar)
        .build()
        .map_err(|err| ProbeError::Client(err.to_string()))
}

/// Encodes pairs as `application/x-www-form-urlencoded`.
pub(crate) fn encode_form(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .finish()
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut reqwest::blocking::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ProbeError> {
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| ProbeError::TooLarge {
        max_bytes,
    })?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(ProbeError::TooLarge {
            max_bytes,
        });
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::TimedOut {
            ProbeError::Timeout(err.to_string())
        } else {
            ProbeError::Transport(format!("failed to read response: {err}"))
        }
    })?;
    if buf.len() > max_bytes {
        return Err(ProbeError::TooLarge {
            max_bytes,
        });
    }
    Ok(buf)
}
