// crates/nutri-probe/src/config/mod.rs
// ============================================================================
// Module: Probe Configuration
// Description: Typed configuration for the target application and identities.
// Purpose: Read settings once at startup and inject them into every probe.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Probe configuration is read from an optional TOML file and then overridden
//! by environment variables. The merged result is validated before any
//! network traffic is issued, so a bad base URL or an empty password fails
//! closed instead of producing misleading probe output.
//!
//! Seeded identifiers in `[seed]` describe data the target environment is
//! expected to hold. They are environment-dependent and checks that need them
//! are only built when they are set.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

pub use env::ProbeEnv;
pub use env::read_env_strict;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default base URL of a locally running Nutri Tracker instance.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";
/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Upper bound accepted for `target.timeout_ms`.
pub const MAX_TIMEOUT_MS: u64 = 300_000;
/// Default maximum response body size in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;
/// Default login route.
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
/// Default anti-forgery form field name.
pub const DEFAULT_CSRF_FIELD: &str = "csrf_token";
/// Placeholder written in place of secrets when configuration is displayed.
pub const REDACTED: &str = "********";
/// Maximum size of a configuration file.
const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Messages never embed credential values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {message}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// An environment override is malformed.
    #[error("invalid environment override: {0}")]
    Env(String),
    /// The merged configuration violates an invariant.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Root probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Target application settings.
    pub target: TargetConfig,
    /// Login form settings.
    pub login: LoginConfig,
    /// Identities used for authenticated probes.
    pub credentials: CredentialSet,
    /// Environment-dependent seed data.
    pub seed: SeedConfig,
    /// Report output settings.
    pub report: ReportConfig,
}

/// Target application settings.
///
/// # Invariants
/// - `base_url` uses `http` or `https` and carries no credentials, query, or fragment.
/// - `timeout_ms` is in `1..=MAX_TIMEOUT_MS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Base URL of the application, optionally with a path prefix.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum accepted response body size.
    pub max_response_bytes: usize,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: format!("nutri-probe/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Login form settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginConfig {
    /// Route serving the login form and accepting the credential POST.
    pub path: String,
    /// Name attribute of the hidden anti-forgery input.
    pub csrf_field: String,
    /// Text expected on the post-login landing page.
    pub success_marker: String,
    /// Fetch the redirect target after login and require `success_marker`.
    pub verify_landing: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_LOGIN_PATH.to_string(),
            csrf_field: DEFAULT_CSRF_FIELD.to_string(),
            success_marker: "Dashboard".to_string(),
            verify_landing: false,
        }
    }
}

/// Username/password pair for one identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Identities available to the probe run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialSet {
    /// Administrator identity (required).
    pub admin: Option<Credentials>,
    /// Regular user identity used for authorization checks.
    pub user: Option<Credentials>,
}

/// A food the target database is expected to contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnownFood {
    /// Search query that should return exactly this food.
    pub query: String,
    /// Substring expected in the food name.
    pub name_contains: String,
    /// Expected calories per 100 g.
    pub calories_per_100g: i64,
}

/// Environment-dependent seed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedConfig {
    /// A food that exists and has servings.
    pub food_id: Option<u64>,
    /// A food referenced by at least one meal log.
    pub referenced_food_id: Option<u64>,
    /// An identifier guaranteed not to exist.
    pub missing_food_id: u64,
    /// A serving belonging to `food_id`.
    pub serving_id: Option<u64>,
    /// A non-admin user that may receive a password reset.
    pub user_id: Option<u64>,
    /// Single-result search scenario.
    pub known_food: Option<KnownFood>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            food_id: None,
            referenced_food_id: None,
            missing_food_id: 99_999,
            serving_id: None,
            user_id: None,
            known_food: None,
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Human-readable console text.
    #[default]
    Text,
    /// Machine-readable JSON document.
    Json,
}

/// Report output settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Output format for the final report.
    pub format: ReportFormat,
    /// Optional JSON-lines event log path.
    pub log_path: Option<PathBuf>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ProbeConfig {
    /// Parses configuration from TOML text without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text does not match the schema.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration from an optional file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, an
    /// override is malformed, or the merged configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| read_env_strict(name).map_err(ConfigError::Env))
    }

    /// Loads configuration using an injected environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading, overriding, or validation fails.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let env_path = match path {
            Some(_) => None,
            None => lookup(ProbeEnv::ConfigPath.as_str())?
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        };
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => Self::from_toml_str(&read_config_file(path)?)?,
            None => Self::default(),
        };
        env::apply_overrides(&mut config, &lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.target.base_url)?;
        if self.target.timeout_ms == 0 || self.target.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "target.timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.target.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "target.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        if !self.login.path.starts_with('/') {
            return Err(ConfigError::Invalid("login.path must start with '/'".to_string()));
        }
        if self.login.csrf_field.trim().is_empty() {
            return Err(ConfigError::Invalid("login.csrf_field must not be empty".to_string()));
        }
        let Some(admin) = &self.credentials.admin else {
            return Err(ConfigError::Invalid("credentials.admin is required".to_string()));
        };
        validate_credentials("credentials.admin", admin)?;
        if let Some(user) = &self.credentials.user {
            validate_credentials("credentials.user", user)?;
        }
        if let Some(known) = &self.seed.known_food
            && (known.query.trim().is_empty() || known.name_contains.is_empty())
        {
            return Err(ConfigError::Invalid(
                "seed.known_food requires a query and name_contains".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds an absolute URL for a route path and optional query pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the joined URL does not parse.
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url, ConfigError> {
        let base = self.target.base_url.trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        let mut url = Url::parse(&joined)
            .map_err(|err| ConfigError::Invalid(format!("invalid route {path}: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Returns a copy with every password replaced by [`REDACTED`].
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for creds in [&mut copy.credentials.admin, &mut copy.credentials.user].into_iter().flatten()
        {
            creds.password = REDACTED.to_string();
        }
        copy
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a configuration file while enforcing a size limit.
fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    let io_error = |message: String| ConfigError::Io {
        path: path.to_path_buf(),
        message,
    };
    let metadata = std::fs::metadata(path).map_err(|err| io_error(err.to_string()))?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(io_error(format!("file exceeds {MAX_CONFIG_BYTES} bytes")));
    }
    std::fs::read_to_string(path).map_err(|err| io_error(err.to_string()))
}

/// Validates scheme, credentials, and suffix rules for the base URL.
fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|err| ConfigError::Invalid(format!("target.base_url is not a URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid("target.base_url must use http or https".to_string()));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid("target.base_url requires a host".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid(
            "target.base_url must not embed credentials".to_string(),
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Invalid(
            "target.base_url must not carry a query or fragment".to_string(),
        ));
    }
    Ok(())
}

/// Rejects blank usernames and passwords.
fn validate_credentials(label: &str, creds: &Credentials) -> Result<(), ConfigError> {
    if creds.username.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{label}.username must not be empty")));
    }
    if creds.password.is_empty() {
        return Err(ConfigError::Invalid(format!("{label}.password must not be empty")));
    }
    Ok(())
}
