//! In-memory account service.
//!
//! Holds one administrator and every created account behind a shared lock.
//! Error codes match the ones the real service reports, so the coordinator
//! takes the same paths against it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};
use trafficgen_core::client::{
    AdminCommand, AdminResponse, ClientError, ErrorCode, UserCommand, UserResponse,
};
use trafficgen_core::password::{HashingError, PasswordHash, PasswordHasher, Pbkdf2Hasher};
use uuid::Uuid;

use crate::network::NetworkConditions;

/// Password and confirmation differ.
pub const PASSWORD_MISMATCH: &str = "user-password-mismatch";

/// Counters over the lifetime of one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub admin_logins: u64,
    pub user_logins: u64,
    pub rejected_logins: u64,
    pub accounts_created: u64,
    pub duplicate_creates: u64,
    pub password_updates: u64,
    pub injected_failures: u64,
    pub logouts: u64,
}

/// Stored account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub real_name: String,
    pub password: PasswordHash,
    pub password_updates: u64,
}

#[derive(Debug)]
struct ServiceState {
    admin_name: String,
    admin_password: PasswordHash,
    accounts: BTreeMap<String, Account>,
    stats: ServiceStats,
}

/// Shared handle to one simulated service.
#[derive(Debug, Clone)]
pub struct SimulatedAccountService {
    state: Arc<Mutex<ServiceState>>,
    network: NetworkConditions,
}

impl SimulatedAccountService {
    /// Creates a service with one administrator and no accounts.
    ///
    /// # Errors
    ///
    /// - `HashingError::EmptyPassword` - If the administrator password is empty
    pub fn new(admin_name: &str, admin_password: &str) -> Result<Self, HashingError> {
        Ok(Self {
            state: Arc::new(Mutex::new(ServiceState {
                admin_name: admin_name.to_string(),
                admin_password: Pbkdf2Hasher::default().hash(admin_password)?,
                accounts: BTreeMap::new(),
                stats: ServiceStats::default(),
            })),
            network: NetworkConditions::new(),
        })
    }

    /// Applies `network` to every client call.
    pub fn with_network(mut self, network: NetworkConditions) -> Self {
        self.network = network;
        self
    }

    /// Pre-creates an account, as left behind by an earlier run.
    ///
    /// # Errors
    ///
    /// - `HashingError` - If the password cannot be hashed
    pub fn insert_account(&self, user_name: &str, password: &str) -> Result<Uuid, HashingError> {
        let id = Uuid::new_v4();
        let account = Account {
            id,
            email: format!("{user_name}@localhost"),
            real_name: user_name.to_string(),
            password: Pbkdf2Hasher::default().hash(password)?,
            password_updates: 0,
        };
        self.state.lock().accounts.insert(user_name.to_string(), account);
        Ok(id)
    }

    pub fn network(&self) -> &NetworkConditions {
        &self.network
    }

    pub fn stats(&self) -> ServiceStats {
        self.state.lock().stats
    }

    pub fn account(&self, user_name: &str) -> Option<Account> {
        self.state.lock().accounts.get(user_name).cloned()
    }

    pub fn account_names(&self) -> Vec<String> {
        self.state.lock().accounts.keys().cloned().collect()
    }

    /// Simulates one round trip; fails with an internal error when the
    /// network decides so.
    pub(crate) async fn round_trip(&self) -> Result<(), ClientError> {
        if self.network.round_trip().await {
            self.state.lock().stats.injected_failures += 1;
            trace!("Injected failure");
            return Err(ClientError::server(ErrorCode::INTERNAL, "Injected failure"));
        }
        Ok(())
    }

    pub(crate) fn login_admin(&self, user_name: &str, password: &str) -> Result<(), ClientError> {
        let stored = {
            let state = self.state.lock();
            (state.admin_name == user_name).then(|| state.admin_password.clone())
        };
        self.record_login(stored, password, |stats| stats.admin_logins += 1)
    }

    pub(crate) fn login_user(&self, user_name: &str, password: &str) -> Result<(), ClientError> {
        let stored = self
            .state
            .lock()
            .accounts
            .get(user_name)
            .map(|account| account.password.clone());
        self.record_login(stored, password, |stats| stats.user_logins += 1)
    }

    /// Verifies without holding the service lock.
    fn record_login(
        &self,
        stored: Option<PasswordHash>,
        password: &str,
        accepted: impl FnOnce(&mut ServiceStats),
    ) -> Result<(), ClientError> {
        let ok = stored.is_some_and(|hash| verify(&hash, password));

        let mut state = self.state.lock();
        if !ok {
            state.stats.rejected_logins += 1;
            return Err(rejected_login());
        }
        accepted(&mut state.stats);
        Ok(())
    }

    pub(crate) fn logout(&self) {
        self.state.lock().stats.logouts += 1;
    }

    pub(crate) fn execute_admin(&self, command: AdminCommand) -> Result<AdminResponse, ClientError> {
        let AdminCommand::UserCreate {
            id,
            user_name,
            real_name,
            email,
            password,
        } = command;

        let mut state = self.state.lock();
        if state.accounts.contains_key(user_name.as_str()) {
            state.stats.duplicate_creates += 1;
            return Err(ClientError::server(
                ErrorCode::USER_DUPLICATE_ID_NAME,
                format!("User {user_name} already exists"),
            ));
        }
        if state.accounts.values().any(|account| account.email == email) {
            state.stats.duplicate_creates += 1;
            return Err(ClientError::server(
                ErrorCode::USER_DUPLICATE_EMAIL,
                format!("Email {email} already in use"),
            ));
        }

        let id = id.unwrap_or_else(Uuid::new_v4);
        debug!(user = %user_name, %id, "Account created");
        state.accounts.insert(
            user_name.to_string(),
            Account {
                id,
                email,
                real_name,
                password,
                password_updates: 0,
            },
        );
        state.stats.accounts_created += 1;
        Ok(AdminResponse::UserCreated { id })
    }

    pub(crate) fn execute_user(
        &self,
        user_name: &str,
        command: UserCommand,
    ) -> Result<UserResponse, ClientError> {
        let UserCommand::PasswordUpdate {
            password,
            password_confirm,
        } = command;
        if password != password_confirm {
            return Err(ClientError::server(
                PASSWORD_MISMATCH,
                "Password and confirmation differ",
            ));
        }

        let mut state = self.state.lock();
        let Some(account) = state.accounts.get_mut(user_name) else {
            return Err(ClientError::server(
                ErrorCode::NOT_LOGGED_IN,
                format!("No account named {user_name}"),
            ));
        };

        // Rehash with the stored parameters only when the password changes.
        if !verify(&account.password, &password) {
            let hasher = Pbkdf2Hasher::from_algorithm(&account.password.algorithm)
                .map_err(internal)?;
            account.password = hasher.hash(&password).map_err(internal)?;
        }
        account.password_updates += 1;
        state.stats.password_updates += 1;
        Ok(UserResponse::PasswordUpdated)
    }
}

fn verify(hash: &PasswordHash, password: &str) -> bool {
    hash.verify(password).unwrap_or(false)
}

fn rejected_login() -> ClientError {
    ClientError::server(ErrorCode::AUTHENTICATION, "Invalid user name or password")
}

fn internal(e: HashingError) -> ClientError {
    ClientError::server(ErrorCode::INTERNAL, e.to_string())
}

#[cfg(test)]
mod tests {
    use trafficgen_core::config::UserName;

    use super::*;

    fn fast_hash(password: &str) -> PasswordHash {
        Pbkdf2Hasher::new(8, 32).unwrap().hash(password).unwrap()
    }

    fn create(name: &str, email: &str, password: &str) -> AdminCommand {
        AdminCommand::create_user(
            UserName::new(name).unwrap(),
            email.to_string(),
            fast_hash(password),
        )
    }

    fn service() -> SimulatedAccountService {
        SimulatedAccountService::new("admin", "12345678").unwrap()
    }

    #[test]
    fn test_admin_login_checks_credentials() {
        let service = service();
        assert!(service.login_admin("admin", "12345678").is_ok());

        let error = service.login_admin("admin", "wrong").unwrap_err();
        assert_eq!(error.error_code().unwrap().as_str(), ErrorCode::AUTHENTICATION);
        assert!(service.login_admin("root", "12345678").is_err());

        let stats = service.stats();
        assert_eq!(stats.admin_logins, 1);
        assert_eq!(stats.rejected_logins, 2);
    }

    #[test]
    fn test_create_then_login() {
        let service = service();
        service
            .execute_admin(create("alice", "alice@example.com", "pw1"))
            .unwrap();

        assert!(service.login_user("alice", "pw1").is_ok());
        assert!(service.login_user("alice", "pw2").is_err());
        assert!(service.login_user("bob", "pw1").is_err());

        let account = service.account("alice").unwrap();
        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.real_name, "Traffic Generator");
    }

    #[test]
    fn test_duplicate_name_and_email_codes() {
        let service = service();
        service
            .execute_admin(create("alice", "alice@example.com", "pw1"))
            .unwrap();

        let by_name = service
            .execute_admin(create("alice", "other@example.com", "pw1"))
            .unwrap_err();
        assert!(by_name.is_duplicate_user_name());

        let by_email = service
            .execute_admin(create("bob", "alice@example.com", "pw2"))
            .unwrap_err();
        assert_eq!(
            by_email.error_code().unwrap().as_str(),
            ErrorCode::USER_DUPLICATE_EMAIL
        );
        assert_eq!(service.stats().duplicate_creates, 2);
        assert_eq!(service.account_names(), ["alice"]);
    }

    #[test]
    fn test_password_update_keeps_login_working() {
        let service = service();
        service
            .execute_admin(create("alice", "alice@example.com", "pw1"))
            .unwrap();

        for _ in 0..3 {
            service
                .execute_user("alice", UserCommand::refresh_password("pw1"))
                .unwrap();
        }
        assert!(service.login_user("alice", "pw1").is_ok());
        assert_eq!(service.account("alice").unwrap().password_updates, 3);
    }

    #[test]
    fn test_password_change_rehashes() {
        let service = service();
        service
            .execute_admin(create("alice", "alice@example.com", "pw1"))
            .unwrap();

        service
            .execute_user("alice", UserCommand::refresh_password("pw9"))
            .unwrap();
        assert!(service.login_user("alice", "pw9").is_ok());
        assert!(service.login_user("alice", "pw1").is_err());
    }

    #[test]
    fn test_mismatched_confirmation_rejected() {
        let service = service();
        let command = UserCommand::PasswordUpdate {
            password: "a".to_string(),
            password_confirm: "b".to_string(),
        };
        let error = service.execute_user("alice", command).unwrap_err();
        assert_eq!(error.error_code().unwrap().as_str(), PASSWORD_MISMATCH);
    }

    #[test]
    fn test_inserted_account_is_a_duplicate() {
        let service = service();
        service.insert_account("alice", "pw1").unwrap();

        let error = service
            .execute_admin(create("alice", "alice@example.com", "pw1"))
            .unwrap_err();
        assert!(error.is_duplicate_user_name());
        assert!(service.login_user("alice", "pw1").is_ok());
    }

    #[test]
    fn test_concurrent_logins_all_counted() {
        let service = service();
        service.insert_account("alice", "pw1").unwrap();
        service.insert_account("bob", "pw2").unwrap();

        std::thread::scope(|scope| {
            for (user, password) in [("alice", "pw1"), ("bob", "pw2"), ("alice", "bad")] {
                let service = &service;
                scope.spawn(move || {
                    for _ in 0..3 {
                        let _ = service.login_user(user, password);
                        // Stats stay readable while other threads verify.
                        let _ = service.stats();
                    }
                });
            }
        });

        let stats = service.stats();
        assert_eq!(stats.user_logins, 6);
        assert_eq!(stats.rejected_logins, 3);
    }

    #[tokio::test]
    async fn test_round_trip_counts_injected_failures() {
        let service = service().with_network(
            NetworkConditions::builder().failure_rate(1.0).build(),
        );
        assert!(service.round_trip().await.is_err());
        assert!(service.round_trip().await.is_err());
        assert_eq!(service.stats().injected_failures, 2);
    }
}
