//! Clients backed by a [`SimulatedAccountService`].

use async_trait::async_trait;
use trafficgen_core::client::{
    AdminClient, AdminCommand, AdminResponse, ClientError, ClientFactory, Credentials, Session,
    UserClient, UserCommand, UserResponse,
};

use crate::service::SimulatedAccountService;

/// Session state shared by both simulated client kinds.
#[derive(Debug)]
struct SimulatedSession {
    service: SimulatedAccountService,
    user_name: Option<String>,
    closed: bool,
}

impl SimulatedSession {
    fn new(service: SimulatedAccountService) -> Self {
        Self {
            service,
            user_name: None,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    fn logged_in_user(&self) -> Result<&str, ClientError> {
        self.user_name.as_deref().ok_or(ClientError::NotLoggedIn)
    }

    async fn login(
        &mut self,
        credentials: &Credentials,
        check: impl FnOnce(&SimulatedAccountService, &str, &str) -> Result<(), ClientError>,
    ) -> Result<Session, ClientError> {
        self.ensure_open()?;
        self.service.round_trip().await?;

        check(&self.service, &credentials.user_name, &credentials.password)?;
        self.user_name = Some(credentials.user_name.clone());
        Ok(Session {
            user_name: credentials.user_name.clone(),
            endpoint: credentials.endpoint.clone(),
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.user_name.take().is_some() {
            self.service.logout();
        }
    }
}

/// Administrative client talking to the simulated service.
#[derive(Debug)]
pub struct SimulatedAdminClient {
    session: SimulatedSession,
}

#[async_trait]
impl AdminClient for SimulatedAdminClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError> {
        self.session
            .login(credentials, SimulatedAccountService::login_admin)
            .await
    }

    async fn execute(&mut self, command: AdminCommand) -> Result<AdminResponse, ClientError> {
        self.session.ensure_open()?;
        self.session.logged_in_user()?;
        self.session.service.round_trip().await?;
        self.session.service.execute_admin(command)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.session.close();
        Ok(())
    }
}

/// User client talking to the simulated service.
#[derive(Debug)]
pub struct SimulatedUserClient {
    session: SimulatedSession,
}

#[async_trait]
impl UserClient for SimulatedUserClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError> {
        self.session
            .login(credentials, SimulatedAccountService::login_user)
            .await
    }

    async fn execute(&mut self, command: UserCommand) -> Result<UserResponse, ClientError> {
        self.session.ensure_open()?;
        let user_name = self.session.logged_in_user()?.to_string();
        self.session.service.round_trip().await?;
        self.session.service.execute_user(&user_name, command)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.session.close();
        Ok(())
    }
}

/// Opens clients against one shared simulated service.
#[derive(Debug, Clone)]
pub struct SimulatedClientFactory {
    service: SimulatedAccountService,
}

impl SimulatedClientFactory {
    pub fn new(service: SimulatedAccountService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &SimulatedAccountService {
        &self.service
    }
}

impl ClientFactory for SimulatedClientFactory {
    type Admin = SimulatedAdminClient;
    type User = SimulatedUserClient;

    fn open_admin(&self) -> Result<Self::Admin, ClientError> {
        Ok(SimulatedAdminClient {
            session: SimulatedSession::new(self.service.clone()),
        })
    }

    fn open_user(&self) -> Result<Self::User, ClientError> {
        Ok(SimulatedUserClient {
            session: SimulatedSession::new(self.service.clone()),
        })
    }
}
