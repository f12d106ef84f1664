//! Account provisioning before traffic starts.
//!
//! Logs in as the administrator, creates one account per configured user and
//! launches a worker for each account that exists afterwards. Users are
//! visited in name order; the first unexpected creation failure aborts the
//! rest, leaving workers already launched running. Once the campaign stops,
//! no further account is created and no further worker is launched.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::client::{AdminClient, AdminCommand, ClientError, ClientFactory, Credentials};
use crate::config::{GeneratorConfig, UserName};
use crate::password::{HashingError, PasswordHash, PasswordHasher};
use crate::worker::WorkerPool;

/// Fatal bootstrap failures. Each one ends the campaign.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Cannot open administrative client: {0}")]
    OpenAdmin(#[source] ClientError),

    #[error("Administrator login failed: {0}")]
    AdminLogin(#[source] ClientError),

    #[error("Creating user {user} failed: {source}")]
    CreateUser {
        user: UserName,
        #[source]
        source: ClientError,
    },
}

/// Outcome of provisioning, one list per disposition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Accounts created by this run
    pub created: Vec<UserName>,
    /// Accounts that already existed
    pub existing: Vec<UserName>,
    /// Users left without a worker
    pub skipped: Vec<UserName>,
    /// Users whose worker was launched
    pub launched: Vec<UserName>,
    /// Users left without a worker because the campaign stopped first
    pub abandoned: Vec<UserName>,
}

enum AccountStatus {
    Created,
    Existing,
    Unavailable,
}

/// One provisioning pass over the configured users.
pub struct Bootstrap<'a, F> {
    config: &'a GeneratorConfig,
    factory: &'a F,
    hasher: Arc<dyn PasswordHasher>,
}

impl<'a, F: ClientFactory> Bootstrap<'a, F> {
    pub fn new(config: &'a GeneratorConfig, factory: &'a F, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            config,
            factory,
            hasher,
        }
    }

    /// Provisions accounts and launches their workers into `workers`.
    ///
    /// The administrative client is closed on every path.
    ///
    /// # Errors
    ///
    /// - `BootstrapError::OpenAdmin` - If no administrative client can be opened
    /// - `BootstrapError::AdminLogin` - If the administrator cannot log in
    /// - `BootstrapError::CreateUser` - If account creation fails for a reason
    ///   other than the account already existing
    pub async fn run(&self, workers: &mut WorkerPool) -> Result<BootstrapReport, BootstrapError> {
        let mut admin = self.factory.open_admin().map_err(BootstrapError::OpenAdmin)?;

        let result = self.provision(&mut admin, workers).await;

        if let Err(e) = admin.close().await {
            error!(error = %e, "Closing administrative client failed");
        }
        result
    }

    async fn provision(
        &self,
        admin: &mut F::Admin,
        workers: &mut WorkerPool,
    ) -> Result<BootstrapReport, BootstrapError> {
        info!(admin = %self.config.admin_name, "Logging in as administrator");
        let credentials = Credentials::new(
            self.config.admin_name.as_str(),
            self.config.admin_password.as_str(),
            self.config.admin_api.clone(),
        );
        admin
            .login(&credentials)
            .await
            .map_err(BootstrapError::AdminLogin)?;

        let mut report = BootstrapReport::default();

        for (user_name, password) in &self.config.users {
            if !workers.is_accepting() {
                report.abandoned.push(user_name.clone());
                continue;
            }

            match self.create_account(admin, user_name, password).await? {
                AccountStatus::Created => report.created.push(user_name.clone()),
                AccountStatus::Existing => report.existing.push(user_name.clone()),
                AccountStatus::Unavailable => {
                    report.skipped.push(user_name.clone());
                    continue;
                }
            }

            if !workers.is_accepting() {
                report.abandoned.push(user_name.clone());
                continue;
            }

            match self.factory.open_user() {
                Ok(client) => {
                    workers.launch(user_name.clone(), password.clone(), client);
                    report.launched.push(user_name.clone());
                }
                Err(e) => {
                    error!(user = %user_name, error = %e, "Cannot open user client");
                    report.skipped.push(user_name.clone());
                }
            }
        }

        if !report.abandoned.is_empty() {
            info!(
                abandoned = report.abandoned.len(),
                "Campaign stopped during bootstrap"
            );
        }
        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            skipped = report.skipped.len(),
            launched = report.launched.len(),
            "Bootstrap complete"
        );
        Ok(report)
    }

    /// Hashes on the blocking pool.
    async fn hash_password(&self, password: &str) -> Result<PasswordHash, HashingError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();

        match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(HashingError::Cancelled),
        }
    }

    async fn create_account(
        &self,
        admin: &mut F::Admin,
        user_name: &UserName,
        password: &str,
    ) -> Result<AccountStatus, BootstrapError> {
        let hash = match self.hash_password(password).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(user = %user_name, error = %e, "Password hashing failed, skipping user");
                return Ok(AccountStatus::Unavailable);
            }
        };

        info!(user = %user_name, "Creating user");
        let command =
            AdminCommand::create_user(user_name.clone(), self.config.email_for(user_name), hash);

        match admin.execute(command).await {
            Ok(_) => Ok(AccountStatus::Created),
            Err(e) if e.is_duplicate_user_name() => {
                info!(user = %user_name, "User already exists");
                Ok(AccountStatus::Existing)
            }
            Err(source) => {
                warn!(user = %user_name, error = %source, "User creation failed, aborting bootstrap");
                Err(BootstrapError::CreateUser {
                    user: user_name.clone(),
                    source,
                })
            }
        }
    }
}
