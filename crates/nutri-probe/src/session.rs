// crates/nutri-probe/src/session.rs
// ============================================================================
// Module: Session Bootstrapper
// Description: Anonymous and authenticated cookie-persisting probe sessions.
// Purpose: Log in through the HTML form and reuse cookies for later probes.
// Dependencies: reqwest, url
// ============================================================================

//! ## Overview
//! A [`ProbeSession`] owns one cookie jar and one HTTP client. Login follows
//! the browser flow: fetch the form, pull the anti-forgery token out of the
//! markup, then POST the credentials with that token. A redirect away from the
//! login page is success; anything else is a typed [`SessionError`].
//!
//! A missing token does not abort the attempt. The POST is sent without it
//! and the outcome reports `token_found = false`, so a server that rejects the
//! form can be told apart from a page that never rendered a token.
//!
//! Security posture: passwords and token values never leave this module
//! except as a short prefix from [`token_preview`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use reqwest::cookie::CookieStore;
use thiserror::Error;

use crate::config::Credentials;
use crate::config::DEFAULT_CSRF_FIELD;
use crate::config::ProbeConfig;
use crate::html::HtmlDocument;
use crate::probe::Method;
use crate::probe::ProbeError;
use crate::probe::ProbeRequest;
use crate::probe::ProbeResponse;
use crate::probe::Prober;
use crate::telemetry::EventOutcome;
use crate::telemetry::ProbeEvent;
use crate::telemetry::ProbeEventSink;
use crate::telemetry::emit;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the anti-forgery token on mutating API requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";
/// Meta tag name used by pages that expose the token to scripts.
const CSRF_META_NAME: &str = "csrf-token";
/// Number of token characters shown by [`token_preview`].
const TOKEN_PREVIEW_CHARS: usize = 8;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Session bootstrap failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The HTTP client could not be constructed.
    #[error("session setup failed: {0}")]
    Setup(ProbeError),
    /// A transport failure interrupted the login flow.
    #[error("login transport failure: {0}")]
    Network(ProbeError),
    /// The login page did not render.
    #[error("login page returned status {status}")]
    LoginPage {
        /// Status of the login page GET.
        status: u16,
    },
    /// The server did not accept the credentials.
    #[error("login rejected with status {status}: {reason}")]
    Rejected {
        /// Status of the credential POST.
        status: u16,
        /// Short human-readable reason.
        reason: String,
    },
    /// The post-login landing page lacked the success marker.
    #[error("login landing page does not contain {marker:?}")]
    LandingMismatch {
        /// Marker that was expected.
        marker: String,
    },
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Identity a session acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    /// No login performed.
    Anonymous,
    /// Logged in through the form.
    Authenticated {
        /// Username used to log in.
        username: String,
    },
}

/// Observations from a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Status of the credential POST.
    pub status: u16,
    /// Raw `Location` header of the login redirect.
    pub location: Option<String>,
    /// Whether the login page carried an anti-forgery token.
    pub token_found: bool,
    /// Redacted token prefix for display.
    pub token_preview: Option<String>,
    /// Whether the landing page was fetched and carried the success marker.
    pub landing_verified: bool,
}

/// Cookie-persisting probe session.
#[derive(Clone)]
pub struct ProbeSession {
    /// Client and cookie jar.
    prober: Prober,
    /// Identity of the session.
    kind: SessionKind,
    /// Anti-forgery token captured at login.
    csrf_token: Option<String>,
}

// ============================================================================
// SECTION: Session
// ============================================================================

impl ProbeSession {
    /// Creates an unauthenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Setup`] when the HTTP client cannot be built.
    pub fn anonymous(config: Arc<ProbeConfig>) -> Result<Self, SessionError> {
        let prober = Prober::new(config).map_err(SessionError::Setup)?;
        Ok(Self {
            prober,
            kind: SessionKind::Anonymous,
            csrf_token: None,
        })
    }

    /// Logs in through the HTML form and returns the authenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the login page is unavailable, the
    /// credentials are rejected, or landing verification fails.
    pub fn login(
        config: Arc<ProbeConfig>,
        credentials: &Credentials,
        sink: &dyn ProbeEventSink,
    ) -> Result<(Self, LoginOutcome), SessionError> {
        let prober = Prober::new(Arc::clone(&config)).map_err(SessionError::Setup)?;
        let username = credentials.username.clone();
        let report = |status: Option<u16>, token_found: bool, outcome: EventOutcome| {
            emit(
                sink,
                &ProbeEvent::Login {
                    username: username.clone(),
                    status,
                    token_found,
                    outcome,
                },
            );
        };

        let login_path = config.login.path.as_str();
        let page = prober.send(&ProbeRequest::get(login_path), sink).map_err(|err| {
            report(None, false, EventOutcome::Error);
            SessionError::Network(err)
        })?;
        if page.status != 200 {
            report(Some(page.status), false, EventOutcome::Failed);
            return Err(SessionError::LoginPage {
                status: page.status,
            });
        }

        let token = extract_csrf_token(&page.text(), &config.login.csrf_field);
        let token_found = token.is_some();
        let mut form = vec![
            ("username".to_string(), credentials.username.clone()),
            ("password".to_string(), credentials.password.clone()),
        ];
        if let Some(token) = &token {
            form.push((config.login.csrf_field.clone(), token.clone()));
        }
        let response =
            prober.send(&ProbeRequest::post(login_path).form(form), sink).map_err(|err| {
                report(None, token_found, EventOutcome::Error);
                SessionError::Network(err)
            })?;

        if let Err(reason) = login_redirect_ok(&config, &response) {
            report(Some(response.status), token_found, EventOutcome::Failed);
            return Err(SessionError::Rejected {
                status: response.status,
                reason,
            });
        }

        let mut landing_verified = false;
        if config.login.verify_landing {
            let landing = match response.location_url() {
                Some(url) => prober.get_absolute(&url, sink).map_err(|err| {
                    report(Some(response.status), token_found, EventOutcome::Error);
                    SessionError::Network(err)
                })?,
                None => {
                    report(Some(response.status), token_found, EventOutcome::Failed);
                    return Err(SessionError::LandingMismatch {
                        marker: config.login.success_marker.clone(),
                    });
                }
            };
            if !landing.text().contains(config.login.success_marker.as_str()) {
                report(Some(landing.status), token_found, EventOutcome::Failed);
                return Err(SessionError::LandingMismatch {
                    marker: config.login.success_marker.clone(),
                });
            }
            landing_verified = true;
        }

        report(Some(response.status), token_found, EventOutcome::Ok);
        let outcome = LoginOutcome {
            status: response.status,
            location: response.location().map(str::to_string),
            token_found,
            token_preview: token.as_deref().map(token_preview),
            landing_verified,
        };
        let session = Self {
            prober,
            kind: SessionKind::Authenticated {
                username: credentials.username.clone(),
            },
            csrf_token: token,
        };
        Ok((session, outcome))
    }

    /// Returns the session identity.
    #[must_use]
    pub const fn kind(&self) -> &SessionKind {
        &self.kind
    }

    /// Returns true when the server has set at least one cookie for the target.
    #[must_use]
    pub fn has_cookies(&self) -> bool {
        let config = self.prober.config();
        [config.url_for("/", &[]), config.url_for(&config.login.path, &[])]
            .into_iter()
            .flatten()
            .any(|url| self.prober.jar().cookies(&url).is_some())
    }

    /// Sends a probe through this session.
    ///
    /// Mutating requests from an authenticated session carry the login token
    /// in [`CSRF_HEADER`] unless the request sets that header itself.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] for transport failures only.
    pub fn send(
        &self,
        request: &ProbeRequest,
        sink: &dyn ProbeEventSink,
    ) -> Result<ProbeResponse, ProbeError> {
        let needs_token = request.method != Method::Get
            && !request.headers.iter().any(|(name, _)| name.eq_ignore_ascii_case(CSRF_HEADER));
        match (&self.csrf_token, needs_token) {
            (Some(token), true) => {
                let request = request.clone().header(CSRF_HEADER, token.clone());
                self.prober.send(&request, sink)
            }
            _ => self.prober.send(request, sink),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the anti-forgery token from login page markup.
///
/// Looks for the first `<input>` whose `name` equals `field`. When `field` is
/// the default `csrf_token`, a `<meta name="csrf-token">` tag is accepted as a
/// fallback. Empty values count as absent.
#[must_use]
pub fn extract_csrf_token(html: &str, field: &str) -> Option<String> {
    let doc = HtmlDocument::parse(html);
    let from_input = doc.input_value(field).filter(|value| !value.is_empty());
    let token = match from_input {
        Some(value) => Some(value),
        None if field == DEFAULT_CSRF_FIELD => {
            doc.meta_content(CSRF_META_NAME).filter(|value| !value.is_empty())
        }
        None => None,
    };
    token.map(str::to_string)
}

/// Returns a redacted token prefix suitable for console output.
#[must_use]
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
    format!("{prefix}…")
}

/// Decides whether a credential POST response indicates a successful login.
fn login_redirect_ok(config: &ProbeConfig, response: &ProbeResponse) -> Result<(), String> {
    if !response.is_redirect() {
        return Err(if response.status == 200 {
            "login form was rendered again".to_string()
        } else {
            format!("expected a redirect, got status {}", response.status)
        });
    }
    let Some(target) = response.location_path() else {
        return Err("redirect without a usable Location header".to_string());
    };
    let login_route = config
        .url_for(&config.login.path, &[])
        .map_or_else(|_| config.login.path.clone(), |url| url.path().to_string());
    if target == login_route {
        return Err("redirected back to the login page".to_string());
    }
    Ok(())
}
