//! Account service client abstractions and implementations.
//!
//! The coordinator only talks to the service through these traits. Clients
//! either succeed or fail; retries and pacing belong to the caller.

pub mod http;
pub mod types;

use async_trait::async_trait;

pub use http::{HttpAdminClient, HttpClientFactory, HttpUserClient};
pub use types::{
    AdminCommand, AdminResponse, ClientError, Credentials, ErrorBody, ErrorCode, Session,
    TRAFFIC_GENERATOR_REAL_NAME, UserCommand, UserResponse,
};

/// Administrative API client.
///
/// One instance is owned by the bootstrap phase for the duration of account
/// creation.
#[async_trait]
pub trait AdminClient: Send {
    /// Logs in as an administrator.
    ///
    /// # Errors
    ///
    /// - `ClientError::Server` - If the service rejects the credentials
    /// - `ClientError::Transport` - If the service cannot be reached
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError>;

    /// Executes an administrative command on the logged-in session.
    ///
    /// # Errors
    ///
    /// - `ClientError::Server` - If the service rejects the command; the code
    ///   identifies duplicates
    /// - `ClientError::NotLoggedIn` - If called before a successful login
    async fn execute(&mut self, command: AdminCommand) -> Result<AdminResponse, ClientError>;

    /// Releases the session. Further calls fail with `ClientError::Closed`.
    ///
    /// # Errors
    ///
    /// - `ClientError::Transport` - If logging out of the service fails
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// User API client.
///
/// Each worker owns exactly one instance for its whole lifetime.
#[async_trait]
pub trait UserClient: Send {
    /// Logs in as a regular user.
    ///
    /// # Errors
    ///
    /// - `ClientError::Server` - If the service rejects the credentials
    /// - `ClientError::Transport` - If the service cannot be reached
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError>;

    /// Executes a user command on the logged-in session.
    ///
    /// # Errors
    ///
    /// - `ClientError::Server` - If the service rejects the command
    /// - `ClientError::NotLoggedIn` - If called before a successful login
    async fn execute(&mut self, command: UserCommand) -> Result<UserResponse, ClientError>;

    /// Releases the session. Further calls fail with `ClientError::Closed`.
    ///
    /// # Errors
    ///
    /// - `ClientError::Transport` - If logging out of the service fails
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens fresh client sessions for the coordinator.
pub trait ClientFactory: Send + Sync + 'static {
    type Admin: AdminClient + 'static;
    type User: UserClient + 'static;

    /// Opens an administrative client.
    ///
    /// # Errors
    ///
    /// - `ClientError::Transport` - If the underlying client cannot be built
    fn open_admin(&self) -> Result<Self::Admin, ClientError>;

    /// Opens a user client for one worker.
    ///
    /// # Errors
    ///
    /// - `ClientError::Transport` - If the underlying client cannot be built
    fn open_user(&self) -> Result<Self::User, ClientError>;
}
