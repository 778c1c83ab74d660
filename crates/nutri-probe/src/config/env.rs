// crates/nutri-probe/src/config/env.rs
// ============================================================================
// Module: Probe Environment Overrides
// Description: Environment-backed overrides for probe configuration.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 and empty values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use super::ConfigError;
use super::Credentials;
use super::ProbeConfig;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys recognized as configuration overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEnv {
    /// Optional config file path.
    ConfigPath,
    /// Base URL override.
    BaseUrl,
    /// Timeout override in milliseconds (positive integer).
    TimeoutMs,
    /// Administrator username.
    AdminUsername,
    /// Administrator password.
    AdminPassword,
    /// Regular user username.
    UserUsername,
    /// Regular user password.
    UserPassword,
}

impl ProbeEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigPath => "NUTRI_PROBE_CONFIG",
            Self::BaseUrl => "NUTRI_PROBE_BASE_URL",
            Self::TimeoutMs => "NUTRI_PROBE_TIMEOUT_MS",
            Self::AdminUsername => "NUTRI_PROBE_ADMIN_USERNAME",
            Self::AdminPassword => "NUTRI_PROBE_ADMIN_PASSWORD",
            Self::UserUsername => "NUTRI_PROBE_USER_USERNAME",
            Self::UserPassword => "NUTRI_PROBE_USER_PASSWORD",
        }
    }
}

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Applies environment overrides onto a parsed configuration.
pub(super) fn apply_overrides<F>(config: &mut ProbeConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Result<Option<String>, ConfigError>,
{
    if let Some(base_url) = read_nonempty(lookup, ProbeEnv::BaseUrl)? {
        config.target.base_url = base_url;
    }
    if let Some(raw) = read_nonempty(lookup, ProbeEnv::TimeoutMs)? {
        config.target.timeout_ms = parse_positive_ms(ProbeEnv::TimeoutMs.as_str(), &raw)?;
    }
    override_identity(
        &mut config.credentials.admin,
        read_nonempty(lookup, ProbeEnv::AdminUsername)?,
        read_nonempty(lookup, ProbeEnv::AdminPassword)?,
        "admin",
    )?;
    override_identity(
        &mut config.credentials.user,
        read_nonempty(lookup, ProbeEnv::UserUsername)?,
        read_nonempty(lookup, ProbeEnv::UserPassword)?,
        "user",
    )?;
    Ok(())
}

/// Merges a username/password override into an optional identity.
fn override_identity(
    slot: &mut Option<Credentials>,
    username: Option<String>,
    password: Option<String>,
    label: &str,
) -> Result<(), ConfigError> {
    match (username, password) {
        (None, None) => Ok(()),
        (Some(username), Some(password)) => {
            *slot = Some(Credentials::new(username, password));
            Ok(())
        }
        (username, password) => {
            let Some(existing) = slot.as_mut() else {
                return Err(ConfigError::Env(format!(
                    "{label} credentials need both username and password overrides"
                )));
            };
            if let Some(username) = username {
                existing.username = username;
            }
            if let Some(password) = password {
                existing.password = password;
            }
            Ok(())
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an override and rejects empty values.
fn read_nonempty<F>(lookup: &F, key: ProbeEnv) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Result<Option<String>, ConfigError>,
{
    let name = key.as_str();
    match lookup(name)? {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Env(format!("{name} must not be empty")))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive millisecond value.
fn parse_positive_ms(name: &str, raw: &str) -> Result<u64, ConfigError> {
    let value: u64 = raw.trim().parse().map_err(|_| {
        ConfigError::Env(format!("{name} must be a positive integer number of milliseconds"))
    })?;
    if value == 0 {
        return Err(ConfigError::Env(format!("{name} must be greater than zero")));
    }
    Ok(value)
}
