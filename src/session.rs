//! # Authenticated session with a collaborator service.
//!
//! Concrete modes reach the hub's other services (presence, lights) through a
//! [`ServiceSession`]: log in once, then issue `GET`/`POST` requests whose
//! responses are parsed into an [`Envelope`].
//!
//! ```text
//! ServiceSession::login()   POST {address}/auth/login {username, password}
//!        │                  (session cookie kept in the client's cookie jar)
//!        ▼
//! get("/clients")           GET  {address}/clients          → Envelope
//! post("/toggle", body)     POST {address}/toggle  (json)   → Envelope
//! ```
//!
//! Login happens lazily on the first request; a `401` response drops the
//! login state so the next request authenticates again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::envelope::Envelope;
use crate::error::SessionError;

/// Where a collaborator lives and how to authenticate with it.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Base URL, e.g. `http://10.0.0.5:2300`.
    pub address: String,
    /// Login user name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// Cookie-backed JSON session with one collaborator.
#[derive(Debug)]
pub struct ServiceSession {
    service: &'static str,
    cfg: SessionConfig,
    client: reqwest::Client,
    logged_in: AtomicBool,
}

impl ServiceSession {
    /// Creates a session for the named collaborator (`service` shows up in errors).
    pub fn new(service: &'static str, cfg: SessionConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|source| SessionError::Http { service, source })?;
        Ok(Self {
            service,
            cfg,
            client,
            logged_in: AtomicBool::new(false),
        })
    }

    /// Collaborator name.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Authenticates with the configured credentials.
    pub async fn login(&self) -> Result<Envelope, SessionError> {
        let body = json!({
            "username": self.cfg.username,
            "password": self.cfg.password,
        });
        let req = self.client.post(self.url("/auth/login")).json(&body);
        let env = self.send(req).await?;
        self.logged_in.store(true, Ordering::Release);
        Ok(env)
    }

    /// `GET path`, logging in first if needed.
    pub async fn get(&self, path: &str) -> Result<Envelope, SessionError> {
        self.ensure_login().await?;
        self.send(self.client.get(self.url(path))).await
    }

    /// `POST path` with a JSON body, logging in first if needed.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Envelope, SessionError> {
        self.ensure_login().await?;
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn ensure_login(&self) -> Result<(), SessionError> {
        if !self.logged_in.load(Ordering::Acquire) {
            self.login().await?;
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.cfg.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Envelope, SessionError> {
        let service = self.service;
        let resp = req
            .send()
            .await
            .map_err(|source| SessionError::Http { service, source })?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.logged_in.store(false, Ordering::Release);
        }

        let env: Envelope = resp
            .json()
            .await
            .map_err(|source| SessionError::Http { service, source })?;
        if !status.is_success() || !env.success {
            return Err(SessionError::Rejected {
                service,
                status: status.as_u16(),
                message: env.message.unwrap_or_default(),
            });
        }
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(address: &str) -> ServiceSession {
        ServiceSession::new(
            "presence",
            SessionConfig {
                address: address.into(),
                username: "u".into(),
                password: "p".into(),
                timeout_secs: 1,
            },
        )
        .unwrap()
    }

    #[test]
    fn joins_paths_without_double_slashes() {
        let s = session("http://hub.local:2300/");
        assert_eq!(s.url("/clients"), "http://hub.local:2300/clients");
        assert_eq!(s.url("lights"), "http://hub.local:2300/lights");
    }

    #[tokio::test]
    async fn unreachable_service_is_an_http_error() {
        let s = session("http://127.0.0.1:9");
        let err = s.get("/clients").await.unwrap_err();
        assert_eq!(err.service(), "presence");
        assert_eq!(err.as_label(), "session_http");
    }
}
