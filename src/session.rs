//! Session state produced by the login and registration handshakes, plus the
//! persistence seam for keeping it across restarts.
//!
//! A [`Session`] is owned by the flow that builds it; listeners and the
//! store only ever see completed snapshots, so no observer can read a
//! half-updated value. The cookie is set in exactly one place, the terminal
//! login-success transition.
//!
//! Security boundary: the cookie is a bearer credential for the remote API.
//! [`SessionStore`] implementations are treated as trusted local storage;
//! do not put one in front of shared or world-readable state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::auth::{LoginError, RegistrationError};
use crate::error::Error;

/// Where a session stands after the most recent handshake touched it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No handshake has completed against this session.
    Unevaluated,
    LoginSucceeded,
    LoginFailed(LoginError),
    RegistrationSucceeded,
    RegistrationFailed(RegistrationError),
}

/// Credentials state for one user against one site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    nonce: Option<String>,
    cookie: Option<String>,
    status: SessionStatus,
    /// Raw success payload from the cookie endpoint; deployments attach
    /// extra user fields here and callers may want them.
    payload: Option<Value>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nonce: None,
            cookie: None,
            status: SessionStatus::Unevaluated,
            payload: None,
        }
    }

    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// True once a login handshake completed successfully and produced a
    /// cookie.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::LoginSucceeded && self.cookie.is_some()
    }

    /// The login failure code, when the last handshake was a failed login.
    #[must_use]
    pub fn login_error(&self) -> Option<LoginError> {
        match self.status {
            SessionStatus::LoginFailed(code) => Some(code),
            _ => None,
        }
    }

    pub(crate) fn set_nonce(&mut self, nonce: String) {
        self.nonce = Some(nonce);
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    /// Adopts the cookie endpoint's success body: the cookie itself (servers
    /// spell the field `cookie` or `session`) and the raw payload.
    pub(crate) fn adopt_login_payload(&mut self, body: &Value) {
        self.cookie = body
            .get("cookie")
            .or_else(|| body.get("session"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        self.payload = Some(body.clone());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence seam for the current session.
///
/// Flows persist nonce-stamped and terminal snapshots through this trait;
/// nonce-protected operations read the cookie back. Implementations must be
/// safe to call from concurrent tasks.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    /// Returns [`Error::Store`] if the snapshot cannot be persisted.
    async fn save(&self, session: &Session) -> Result<(), Error>;

    /// # Errors
    /// Returns [`Error::Store`] if the backing storage cannot be read.
    async fn load(&self) -> Result<Option<Session>, Error>;

    /// # Errors
    /// Returns [`Error::Store`] if the backing storage cannot be cleared.
    async fn clear(&self) -> Result<(), Error>;
}

/// Process-local store, the default when none is injected.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), Error> {
        *self.inner.write().await = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.inner.write().await = None;
        Ok(())
    }
}
