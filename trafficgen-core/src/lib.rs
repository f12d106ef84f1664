//! Trafficgen Core - synthetic user traffic against an account service
//!
//! Provisions a fixed set of accounts through the administrative API, then
//! runs one paced worker per account that logs in and keeps refreshing its
//! password until the campaign is stopped.

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod pacing;
pub mod password;
pub mod signal;
pub mod test_mocks;
pub mod tracing_setup;
pub mod worker;

// Re-export main types for convenient access
pub use bootstrap::{BootstrapError, BootstrapReport};
pub use client::{ClientError, ClientFactory, HttpClientFactory};
pub use config::{ClientConfig, ConfigError, GeneratorConfig, UserName};
pub use coordinator::{CampaignReport, TrafficGenerator};
pub use password::{HashingError, PasswordHasher, Pbkdf2Hasher};
pub use signal::CampaignState;
pub use tracing_setup::{CliLogLevel, TracingSetupError, init_tracing};
pub use worker::WorkerReport;

/// Errors that can surface from any trafficgen subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] HashingError),

    #[error("Logging setup error: {0}")]
    Tracing(#[from] TracingSetupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrafficError {
    /// Checks if this error stems from invalid user input.
    pub fn is_user_error(&self) -> bool {
        matches!(self, TrafficError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, TrafficError>;
