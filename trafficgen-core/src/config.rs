//! Centralized configuration for trafficgen.
//!
//! The generator configuration is immutable once handed to the coordinator.
//! HTTP client settings live separately so simulated runs never need them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Longest user name accepted by the account service.
pub const MAX_USER_NAME_LENGTH: usize = 256;

/// Errors raised while building or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid user name '{name}': {reason}")]
    InvalidUserName { name: String, reason: &'static str },

    #[error("Missing value for {field}")]
    MissingValue { field: &'static str },

    #[error("Empty password for user {user}")]
    EmptyPassword { user: UserName },

    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("Invalid user map line {line}: {reason}")]
    InvalidUserMap { line: usize, reason: String },
}

/// Validated account name.
///
/// Names are lowercase ASCII letters, digits, `_`, `-` and `.`, start with a
/// letter or digit, and are at most [`MAX_USER_NAME_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserName(String);

impl UserName {
    /// Parses and validates a user name.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidUserName` - If the name is empty, too long, or
    ///   contains characters outside the allowed set
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigError::InvalidUserName {
                name,
                reason: "name is empty",
            });
        }
        if name.len() > MAX_USER_NAME_LENGTH {
            return Err(ConfigError::InvalidUserName {
                name,
                reason: "name is longer than 256 characters",
            });
        }
        if !name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return Err(ConfigError::InvalidUserName {
                name,
                reason: "name must start with a lowercase letter or digit",
            });
        }
        let allowed =
            |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.');
        if !name.chars().all(allowed) {
            return Err(ConfigError::InvalidUserName {
                name,
                reason: "name contains characters outside [a-z0-9_.-]",
            });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserName> for String {
    fn from(value: UserName) -> Self {
        value.0
    }
}

/// Everything the coordinator needs to run one campaign.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Administrator used to create the synthetic accounts
    pub admin_name: String,
    /// Administrator password
    pub admin_password: String,
    /// Base URL of the administrative API
    pub admin_api: Url,
    /// Base URL of the user API
    pub user_api: Url,
    /// Appended to each user name to form the account email
    pub user_email_suffix: String,
    /// Fixed pause after every worker action
    pub pause_between_actions: Duration,
    /// Exclusive upper bound of the random extra pause (zero disables it)
    pub pause_jitter_bound: Duration,
    /// Synthetic accounts and their plaintext passwords
    pub users: BTreeMap<UserName, String>,
    /// Seed for reproducible jitter; OS entropy when absent
    pub seed: Option<u64>,
}

impl GeneratorConfig {
    /// Checks the invariants the coordinator relies on.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingValue` - If the admin name or password is empty
    /// - `ConfigError::EmptyPassword` - If any user has an empty password
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_name.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "admin_name",
            });
        }
        if self.admin_password.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "admin_password",
            });
        }
        if let Some((user, _)) = self.users.iter().find(|(_, password)| password.is_empty()) {
            return Err(ConfigError::EmptyPassword { user: user.clone() });
        }
        Ok(())
    }

    /// Email address used when creating the account for `user`.
    pub fn email_for(&self, user: &UserName) -> String {
        format!("{user}{}", self.user_email_suffix)
    }
}

/// HTTP client configuration for the administrative and user APIs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout applied to every request
    pub request_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("trafficgen/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
