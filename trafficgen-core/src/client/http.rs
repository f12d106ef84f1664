//! JSON-over-HTTP clients for the administrative and user APIs.
//!
//! Each client owns its own `reqwest::Client` with a cookie store, so the
//! session cookie set at login is private to that client.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{
    AdminCommand, AdminResponse, ClientError, Credentials, ErrorBody, Session, UserCommand,
    UserResponse,
};
use super::{AdminClient, ClientFactory, UserClient};
use crate::config::ClientConfig;

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "userName")]
    user_name: &'a str,
    password: &'a str,
}

/// Session state common to both APIs.
struct HttpSession {
    client: reqwest::Client,
    endpoint: Option<Url>,
    closed: bool,
}

impl HttpSession {
    fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Transport {
                endpoint: "<client construction>".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: None,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError> {
        self.ensure_open()?;

        let url = join_endpoint(&credentials.endpoint, "login")?;
        let request = LoginRequest {
            user_name: &credentials.user_name,
            password: &credentials.password,
        };
        self.post::<_, serde_json::Value>(&url, &request).await?;

        self.endpoint = Some(credentials.endpoint.clone());
        Ok(Session {
            user_name: credentials.user_name.clone(),
            endpoint: credentials.endpoint.clone(),
        })
    }

    async fn execute<C, R>(&mut self, command: &C) -> Result<R, ClientError>
    where
        C: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.ensure_open()?;
        let endpoint = self.endpoint.as_ref().ok_or(ClientError::NotLoggedIn)?;
        let url = join_endpoint(endpoint, "command")?;
        self.post(&url, command).await
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let Some(endpoint) = self.endpoint.take() else {
            return Ok(());
        };
        let url = join_endpoint(&endpoint, "logout")?;
        let body = serde_json::json!({});
        self.post::<_, serde_json::Value>(&url, &body).await?;
        Ok(())
    }

    async fn post<B, R>(&self, url: &Url, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let transport = |e: reqwest::Error| ClientError::Transport {
            endpoint: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;

        if status.is_success() {
            // Some endpoints answer with an empty body.
            let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
            return serde_json::from_slice(bytes).map_err(|e| ClientError::Protocol {
                message: format!("Malformed response from {url}: {e}"),
            });
        }

        match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => Err(ClientError::Server {
                code: body.error_code,
                message: body.message,
            }),
            Err(_) => Err(ClientError::Protocol {
                message: format!("HTTP {status} from {url} without an error body"),
            }),
        }
    }
}

/// Resolves `path` below `base`, treating `base` as a directory.
fn join_endpoint(base: &Url, path: &str) -> Result<Url, ClientError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }
    base.join(path).map_err(|e| ClientError::Protocol {
        message: format!("Cannot resolve {path} against {base}: {e}"),
    })
}

/// Administrative API client over HTTP.
pub struct HttpAdminClient {
    session: HttpSession,
}

#[async_trait]
impl AdminClient for HttpAdminClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError> {
        self.session.login(credentials).await
    }

    async fn execute(&mut self, command: AdminCommand) -> Result<AdminResponse, ClientError> {
        self.session.execute(&command).await
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.session.close().await
    }
}

/// User API client over HTTP.
pub struct HttpUserClient {
    session: HttpSession,
}

#[async_trait]
impl UserClient for HttpUserClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<Session, ClientError> {
        self.session.login(credentials).await
    }

    async fn execute(&mut self, command: UserCommand) -> Result<UserResponse, ClientError> {
        self.session.execute(&command).await
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.session.close().await
    }
}

/// Opens HTTP clients sharing one configuration.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    config: ClientConfig,
}

impl HttpClientFactory {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for HttpClientFactory {
    type Admin = HttpAdminClient;
    type User = HttpUserClient;

    fn open_admin(&self) -> Result<Self::Admin, ClientError> {
        Ok(HttpAdminClient {
            session: HttpSession::new(&self.config)?,
        })
    }

    fn open_user(&self) -> Result<Self::User, ClientError> {
        Ok(HttpUserClient {
            session: HttpSession::new(&self.config)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_endpoint_treats_base_as_directory() {
        let base = Url::parse("http://localhost:51000/admin").unwrap();
        assert_eq!(
            join_endpoint(&base, "login").unwrap().as_str(),
            "http://localhost:51000/admin/login"
        );

        let base = Url::parse("http://localhost:51000/admin/").unwrap();
        assert_eq!(
            join_endpoint(&base, "command").unwrap().as_str(),
            "http://localhost:51000/admin/command"
        );
    }

    #[test]
    fn test_join_endpoint_root() {
        let base = Url::parse("http://localhost:50000").unwrap();
        assert_eq!(
            join_endpoint(&base, "login").unwrap().as_str(),
            "http://localhost:50000/login"
        );
    }

    #[tokio::test]
    async fn test_execute_before_login_fails() {
        let factory = HttpClientFactory::default();
        let mut client = factory.open_user().unwrap();

        let result = client.execute(UserCommand::refresh_password("pw")).await;
        assert!(matches!(result, Err(ClientError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let factory = HttpClientFactory::default();
        let mut client = factory.open_admin().unwrap();

        // Never logged in, so close does not touch the network.
        client.close().await.unwrap();
        client.close().await.unwrap();

        let credentials = Credentials::new(
            "admin",
            "pw",
            Url::parse("http://localhost:51000/").unwrap(),
        );
        let result = client.login(&credentials).await;
        assert!(matches!(result, Err(ClientError::Closed)));
    }
}
