//! Scripted clients and hashers for exercising the coordinator without a
//! service.
//!
//! Every client opened by a [`MockClientFactory`] appends to one shared event
//! log, which tests inspect through a [`MockRecorder`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::client::{
    AdminClient, AdminCommand, AdminResponse, ClientError, ClientFactory, Credentials, ErrorCode,
    Session, UserClient, UserCommand, UserResponse,
};
use crate::password::{HashingError, PasswordHash, PasswordHasher};

/// Call observed by a mock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    AdminOpened,
    AdminLogin { user: String, ok: bool },
    AdminCreate { user: String, email: String, real_name: String, ok: bool },
    AdminClosed,
    UserOpened,
    UserLogin { user: String, ok: bool },
    PasswordUpdate { user: String, ok: bool },
    /// `user` is the name of the last login attempt, if any
    UserClosed { user: Option<String> },
}

/// Failure script shared by all clients of one factory.
#[derive(Debug, Clone, Default)]
struct MockScript {
    admin_login_error: Option<String>,
    create_errors: HashMap<String, String>,
    user_login_failures: usize,
    fail_user_open: bool,
    fail_updates: bool,
    panic_on_update: bool,
    fail_close: bool,
    call_delay: Duration,
}

/// Read access to the event log of a [`MockClientFactory`].
#[derive(Debug, Clone, Default)]
pub struct MockRecorder {
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockRecorder {
    fn record(&self, event: MockEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of every event so far, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().clone()
    }

    fn count(&self, predicate: impl Fn(&MockEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// User names passed to account creation, in order.
    pub fn create_attempts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                MockEvent::AdminCreate { user, .. } => Some(user.clone()),
                _ => None,
            })
            .collect()
    }

    /// Users with at least one successful login.
    pub fn logged_in_users(&self) -> BTreeSet<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                MockEvent::UserLogin { user, ok: true } => Some(user.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn user_logins(&self, user: &str) -> usize {
        self.count(|e| matches!(e, MockEvent::UserLogin { user: u, .. } if u == user))
    }

    pub fn password_updates(&self, user: &str) -> usize {
        self.count(|e| matches!(e, MockEvent::PasswordUpdate { user: u, .. } if u == user))
    }

    pub fn user_closes(&self, user: &str) -> usize {
        self.count(|e| matches!(e, MockEvent::UserClosed { user: Some(u) } if u == user))
    }

    pub fn users_opened(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::UserOpened))
    }

    pub fn admin_closes(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::AdminClosed))
    }
}

/// Factory producing scripted admin and user clients.
#[derive(Debug, Clone, Default)]
pub struct MockClientFactory {
    script: MockScript,
    recorder: MockRecorder,
}

impl MockClientFactory {
    /// Creates a factory whose clients always succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Administrator login fails with an authentication error.
    pub fn with_admin_login_failure(mut self) -> Self {
        self.script.admin_login_error = Some(ErrorCode::AUTHENTICATION.to_string());
        self
    }

    /// Creating `user` fails with `code`.
    pub fn with_create_error(mut self, user: &str, code: &str) -> Self {
        self.script
            .create_errors
            .insert(user.to_string(), code.to_string());
        self
    }

    /// Every user client rejects its first `count` logins.
    pub fn with_user_login_failures(mut self, count: usize) -> Self {
        self.script.user_login_failures = count;
        self
    }

    /// Opening a user client always fails.
    pub fn with_failing_user_open(mut self) -> Self {
        self.script.fail_user_open = true;
        self
    }

    /// Password updates fail with an internal error.
    pub fn with_update_failures(mut self) -> Self {
        self.script.fail_updates = true;
        self
    }

    /// Password updates panic.
    pub fn with_panicking_updates(mut self) -> Self {
        self.script.panic_on_update = true;
        self
    }

    /// Closing any client reports a transport error.
    pub fn with_failing_close(mut self) -> Self {
        self.script.fail_close = true;
        self
    }

    /// Login and command calls take `delay` to complete.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.script.call_delay = delay;
        self
    }

    pub fn recorder(&self) -> MockRecorder {
        self.recorder.clone()
    }
}

impl ClientFactory for MockClientFactory {
    type Admin = MockAdminClient;
    type User = MockUserClient;

    fn open_admin(&self) -> Result<Self::Admin, ClientError> {
        self.recorder.record(MockEvent::AdminOpened);
        Ok(MockAdminClient {
            script: self.script.clone(),
            recorder: self.recorder.clone(),
            logged_in: false,
        })
    }

    fn open_user(&self) -> Result<Self::User, ClientError> {
        if self.script.fail_user_open {
            return Err(ClientError::Transport {
                endpoint: "mock".to_string(),
                reason: "scripted open failure".to_string(),
            });
        }
        self.recorder.record(MockEvent::UserOpened);
        Ok(MockUserClient {
            script: self.script.clone(),
            recorder: self.recorder.clone(),
            user: None,
            login_attempts: 0,
            logged_in: false,
        })
    }
}

async fn delay(script: &MockScript) {
    if !script.call_delay.is_zero() {
        tokio::time::sleep(script.call_delay).await;
    }
}

fn close_result(script: &MockScript) -> Result<(), ClientError> {
    if script.fail_close {
        return Err(ClientError::Transport {
            endpoint: "mock".to_string(),
            reason: "scripted close failure".to_string(),
        });
    }
    Ok(())
}

/// Scripted administrative client.
#[derive(Debug)]
pub struct MockAdminClient {
    script: MockScript,
    recorder: MockRecorder,
    logged_in: bool,
}

#[async_trait]
impl AdminClient for MockAdminClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError> {
        delay(&self.script).await;

        let result = match &self.script.admin_login_error {
            Some(code) => Err(ClientError::server(code.clone(), "Invalid credentials")),
            None => Ok(Session {
                user_name: credentials.user_name.clone(),
                endpoint: credentials.endpoint.clone(),
            }),
        };
        self.logged_in = result.is_ok();
        self.recorder.record(MockEvent::AdminLogin {
            user: credentials.user_name.clone(),
            ok: result.is_ok(),
        });
        result
    }

    async fn execute(&mut self, command: AdminCommand) -> Result<AdminResponse, ClientError> {
        delay(&self.script).await;
        if !self.logged_in {
            return Err(ClientError::NotLoggedIn);
        }

        let AdminCommand::UserCreate {
            user_name,
            real_name,
            email,
            ..
        } = command;
        let result = match self.script.create_errors.get(user_name.as_str()) {
            Some(code) => Err(ClientError::server(code.clone(), "Scripted failure")),
            None => Ok(AdminResponse::UserCreated { id: Uuid::new_v4() }),
        };
        self.recorder.record(MockEvent::AdminCreate {
            user: user_name.to_string(),
            email,
            real_name,
            ok: result.is_ok(),
        });
        result
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.recorder.record(MockEvent::AdminClosed);
        close_result(&self.script)
    }
}

/// Scripted user client.
#[derive(Debug)]
pub struct MockUserClient {
    script: MockScript,
    recorder: MockRecorder,
    user: Option<String>,
    login_attempts: usize,
    logged_in: bool,
}

#[async_trait]
impl UserClient for MockUserClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError> {
        delay(&self.script).await;

        self.user = Some(credentials.user_name.clone());
        self.login_attempts += 1;
        let ok = self.login_attempts > self.script.user_login_failures;
        self.logged_in = ok;
        self.recorder.record(MockEvent::UserLogin {
            user: credentials.user_name.clone(),
            ok,
        });

        if ok {
            Ok(Session {
                user_name: credentials.user_name.clone(),
                endpoint: credentials.endpoint.clone(),
            })
        } else {
            Err(ClientError::server(
                ErrorCode::AUTHENTICATION,
                "Invalid credentials",
            ))
        }
    }

    async fn execute(&mut self, command: UserCommand) -> Result<UserResponse, ClientError> {
        delay(&self.script).await;
        if self.script.panic_on_update {
            panic!("scripted panic during {command:?}");
        }
        let Some(user) = self.user.clone().filter(|_| self.logged_in) else {
            return Err(ClientError::NotLoggedIn);
        };

        let ok = !self.script.fail_updates;
        self.recorder.record(MockEvent::PasswordUpdate { user, ok });
        if ok {
            Ok(UserResponse::PasswordUpdated)
        } else {
            Err(ClientError::server(ErrorCode::INTERNAL, "Scripted failure"))
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.recorder.record(MockEvent::UserClosed {
            user: self.user.clone(),
        });
        close_result(&self.script)
    }
}

/// Fast hasher that can be told to reject specific passwords.
#[derive(Debug, Clone, Default)]
pub struct MockHasher {
    failing: HashSet<String>,
}

impl MockHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashing `password` fails.
    pub fn failing_for(mut self, password: &str) -> Self {
        self.failing.insert(password.to_string());
        self
    }
}

impl PasswordHasher for MockHasher {
    fn hash(&self, plaintext: &str) -> Result<PasswordHash, HashingError> {
        if self.failing.contains(plaintext) {
            return Err(HashingError::UnsupportedAlgorithm {
                algorithm: "MOCK".to_string(),
            });
        }
        Ok(PasswordHash {
            algorithm: "MOCK".to_string(),
            hash: hex::encode_upper(plaintext),
            salt: String::new(),
        })
    }
}
