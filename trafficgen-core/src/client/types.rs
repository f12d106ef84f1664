//! Commands, responses and errors shared by every client implementation.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::config::UserName;
use crate::password::PasswordHash;

/// Real name given to every account the generator creates.
pub const TRAFFIC_GENERATOR_REAL_NAME: &str = "Traffic Generator";

/// Machine-readable error code reported by the account service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(String);

impl ErrorCode {
    /// An account with the requested name already exists.
    pub const USER_DUPLICATE_ID_NAME: &'static str = "user-duplicate-id-name";
    /// An account with the requested email already exists.
    pub const USER_DUPLICATE_EMAIL: &'static str = "user-duplicate-email";
    /// Credentials were rejected.
    pub const AUTHENTICATION: &'static str = "authentication";
    /// The command requires a logged-in session.
    pub const NOT_LOGGED_IN: &'static str = "not-logged-in";
    /// The service failed for reasons unrelated to the request.
    pub const INTERNAL: &'static str = "internal";

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn duplicate_user_name() -> Self {
        Self::new(Self::USER_DUPLICATE_ID_NAME)
    }

    pub fn authentication() -> Self {
        Self::new(Self::AUTHENTICATION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code reports an account that already exists by name.
    pub fn is_duplicate_user_name(&self) -> bool {
        self.0 == Self::USER_DUPLICATE_ID_NAME
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors reported by administrative and user API clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Server rejected request ({code}): {message}")]
    Server { code: ErrorCode, message: String },

    #[error("Transport failure talking to {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Command issued before login")]
    NotLoggedIn,

    #[error("Client already closed")]
    Closed,
}

impl ClientError {
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Server {
            code: ErrorCode::new(code),
            message: message.into(),
        }
    }

    /// Error code when the service answered with one.
    pub fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            ClientError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether this error reports an account that already exists.
    pub fn is_duplicate_user_name(&self) -> bool {
        self.error_code()
            .is_some_and(ErrorCode::is_duplicate_user_name)
    }
}

/// Credentials presented at login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_name: String,
    pub password: String,
    pub endpoint: Url,
}

impl Credentials {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>, endpoint: Url) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            endpoint,
        }
    }
}

/// Established login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_name: String,
    pub endpoint: Url,
}

/// Commands accepted by the administrative API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdminCommand {
    /// Create a user account.
    UserCreate {
        /// Requested account id; the service picks one when absent
        id: Option<Uuid>,
        #[serde(rename = "userName")]
        user_name: UserName,
        #[serde(rename = "realName")]
        real_name: String,
        email: String,
        password: PasswordHash,
    },
}

impl AdminCommand {
    /// Builds the account-creation command the generator issues for `user_name`.
    pub fn create_user(user_name: UserName, email: String, password: PasswordHash) -> Self {
        AdminCommand::UserCreate {
            id: None,
            user_name,
            real_name: TRAFFIC_GENERATOR_REAL_NAME.to_string(),
            email,
            password,
        }
    }
}

/// Responses returned by the administrative API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdminResponse {
    UserCreated { id: Uuid },
}

/// Commands accepted by the user API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserCommand {
    /// Replace the logged-in user's password.
    PasswordUpdate {
        password: String,
        #[serde(rename = "passwordConfirm")]
        password_confirm: String,
    },
}

impl UserCommand {
    /// Password update that sets the password to its current value.
    pub fn refresh_password(password: &str) -> Self {
        UserCommand::PasswordUpdate {
            password: password.to_string(),
            password_confirm: password.to_string(),
        }
    }
}

/// Responses returned by the user API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserResponse {
    PasswordUpdated,
}

/// Error body the account service sends with non-success statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "errorCode")]
    pub error_code: ErrorCode,
    pub message: String,
}
