//! The two-phase login handshake: nonce acquisition, then cookie issuance.
//!
//! Flow Overview:
//! - Notify the listener that the attempt started, then GET the nonce
//!   endpoint with the controller/method of the cookie action.
//! - A transport failure at either step goes to the connection channel and
//!   the login listener hears nothing further.
//! - A rejected or unusable nonce terminates with `BadNonce`.
//! - The cookie request carries `nonce`, `username`, `password`; acceptance
//!   adopts the cookie into the session, rejection maps the wire code onto
//!   a [`LoginError`].
//!
//! Every terminating branch is its own match arm that returns, which is
//! what holds the one-terminal-callback guarantee.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{debug, error};

use super::classify::{self, CookieOutcome, NonceOutcome};
use super::{Credentials, LoginError, LoginListener, LoginOutcome};
use crate::config::{Config, nonce_params_for};
use crate::dispatch::listeners::ConnectionListener;
use crate::session::{Session, SessionStatus, SessionStore};
use crate::transport::Transport;

pub(crate) struct LoginFlow {
    pub(crate) config: Arc<Config>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) connection: Arc<dyn ConnectionListener>,
    pub(crate) listener: Arc<dyn LoginListener>,
}

impl LoginFlow {
    pub(crate) async fn run(self, credentials: Credentials) -> LoginOutcome {
        self.listener.on_login_start();

        let endpoints = self.config.endpoints();
        let nonce_url = self.config.url_for(&endpoints.nonce);
        let nonce_params = nonce_params_for(&endpoints.cookie);

        let nonce_body = match self.transport.get(&nonce_url, &nonce_params).await {
            Ok(body) => body,
            Err(err) => {
                error!("login nonce request failed: {err}");
                self.connection.on_connection_failure(&err.into());
                return LoginOutcome::ConnectionFailure;
            }
        };

        let mut session = Session::new();

        let nonce = match classify::classify_nonce(&nonce_body) {
            NonceOutcome::Accepted { nonce } => nonce,
            NonceOutcome::Rejected => {
                debug!("login nonce rejected by server");
                return self.fail(session, LoginError::BadNonce).await;
            }
            NonceOutcome::Malformed => {
                error!("login nonce response had no usable nonce");
                return self.fail(session, LoginError::BadNonce).await;
            }
        };

        session.set_nonce(nonce.clone());
        self.persist(&session).await;

        let cookie_url = self.config.url_for(&endpoints.cookie);
        let cookie_params = vec![
            ("nonce".to_string(), nonce),
            ("username".to_string(), credentials.username.clone()),
            (
                "password".to_string(),
                credentials.password.expose_secret().to_string(),
            ),
        ];

        let cookie_body = match self.transport.get(&cookie_url, &cookie_params).await {
            Ok(body) => body,
            Err(err) => {
                error!("login cookie request failed: {err}");
                self.connection.on_connection_failure(&err.into());
                return LoginOutcome::ConnectionFailure;
            }
        };

        match classify::classify_cookie(&cookie_body) {
            CookieOutcome::Accepted => {
                session.adopt_login_payload(&cookie_body);
                session.set_status(SessionStatus::LoginSucceeded);
                self.persist(&session).await;
                debug!(username = %credentials.username, "login succeeded");
                self.listener.on_login_success(session.clone());
                LoginOutcome::Success(session)
            }
            CookieOutcome::Rejected { code } => {
                debug!(?code, "login rejected by server");
                self.fail(session, LoginError::from_code(code)).await
            }
        }
    }

    /// The only place the failure callback fires.
    async fn fail(&self, mut session: Session, error: LoginError) -> LoginOutcome {
        session.set_status(SessionStatus::LoginFailed(error));
        self.persist(&session).await;
        self.listener.on_login_failure(session.clone());
        LoginOutcome::Failure(session)
    }

    /// Persistence is best effort; a store hiccup never changes the
    /// callback contract.
    async fn persist(&self, session: &Session) {
        if let Err(err) = self.store.save(session).await {
            error!("failed to persist session: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TransportError};
    use crate::session::MemorySessionStore;
    use crate::transport::mock::MockTransport;
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLogin {
        events: Mutex<Vec<&'static str>>,
        sessions: Mutex<Vec<Session>>,
    }

    impl LoginListener for RecordingLogin {
        fn on_login_start(&self) {
            self.events.lock().unwrap().push("start");
        }

        fn on_login_success(&self, session: Session) {
            self.events.lock().unwrap().push("success");
            self.sessions.lock().unwrap().push(session);
        }

        fn on_login_failure(&self, session: Session) {
            self.events.lock().unwrap().push("failure");
            self.sessions.lock().unwrap().push(session);
        }
    }

    #[derive(Default)]
    struct RecordingConnection {
        failures: Mutex<Vec<String>>,
    }

    impl ConnectionListener for RecordingConnection {
        fn on_connection_failure(&self, error: &Error) {
            self.failures.lock().unwrap().push(error.to_string());
        }
    }

    struct Harness {
        transport: Arc<MockTransport>,
        listener: Arc<RecordingLogin>,
        connection: Arc<RecordingConnection>,
        store: Arc<MemorySessionStore>,
    }

    impl Harness {
        fn new(transport: MockTransport) -> Self {
            Self {
                transport: Arc::new(transport),
                listener: Arc::new(RecordingLogin::default()),
                connection: Arc::new(RecordingConnection::default()),
                store: Arc::new(MemorySessionStore::new()),
            }
        }

        fn flow(&self) -> LoginFlow {
            LoginFlow {
                config: Arc::new(Config::new("https://blog.example.com").unwrap()),
                transport: self.transport.clone(),
                store: self.store.clone(),
                connection: self.connection.clone(),
                listener: self.listener.clone(),
            }
        }

        fn events(&self) -> Vec<&'static str> {
            self.listener.events.lock().unwrap().clone()
        }

        fn credentials() -> Credentials {
            Credentials::new("admin", SecretString::from("hunter2".to_string()))
        }
    }

    fn nonce_ok() -> serde_json::Value {
        json!({"status": "ok", "controller": "auth", "method": "generate_auth_cookie", "nonce": "abc123"})
    }

    #[tokio::test]
    async fn login_success_stamps_cookie_and_persists() {
        let harness = Harness::new(
            MockTransport::new()
                .reply_ok(nonce_ok())
                .reply_ok(json!({"status": "ok", "cookie": "wp_cookie_1", "user": {"id": 7}})),
        );

        let outcome = harness.flow().run(Harness::credentials()).await;

        let session = match outcome {
            LoginOutcome::Success(session) => session,
            other => panic!("expected success, got {other:?}"),
        };
        assert!(session.is_authenticated());
        assert_eq!(session.cookie(), Some("wp_cookie_1"));
        assert_eq!(harness.events(), vec!["start", "success"]);
        assert_eq!(harness.store.load().await.unwrap(), Some(session));

        let calls = harness.transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].url.ends_with("/api/get_nonce"));
        assert_eq!(calls[0].param("controller"), Some("auth"));
        assert_eq!(calls[0].param("method"), Some("generate_auth_cookie"));
        assert_eq!(calls[0].param("password"), None);
        assert!(calls[1].url.ends_with("/api/auth/generate_auth_cookie"));
        assert_eq!(calls[1].param("nonce"), Some("abc123"));
        assert_eq!(calls[1].param("username"), Some("admin"));
        assert_eq!(calls[1].param("password"), Some("hunter2"));
    }

    #[tokio::test]
    async fn login_accepts_the_session_spelling_of_the_cookie() {
        let harness = Harness::new(
            MockTransport::new()
                .reply_ok(nonce_ok())
                .reply_ok(json!({"status": "ok", "session": "xyz"})),
        );

        let outcome = harness.flow().run(Harness::credentials()).await;

        let session = match outcome {
            LoginOutcome::Success(session) => session,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(session.cookie(), Some("xyz"));
    }

    #[tokio::test]
    async fn bad_password_fires_exactly_one_failure() {
        let harness = Harness::new(
            MockTransport::new()
                .reply_ok(nonce_ok())
                .reply_ok(json!({"status": "fail", "code": 2})),
        );

        let outcome = harness.flow().run(Harness::credentials()).await;

        assert!(matches!(outcome, LoginOutcome::Failure(_)));
        assert_eq!(harness.events(), vec!["start", "failure"]);
        let sessions = harness.listener.sessions.lock().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].login_error(), Some(LoginError::BadPassword));
        assert!(!sessions[0].is_authenticated());
    }

    #[tokio::test]
    async fn string_codes_map_like_numbers() {
        let harness = Harness::new(
            MockTransport::new()
                .reply_ok(nonce_ok())
                .reply_ok(json!({"status": "fail", "code": "3"})),
        );

        harness.flow().run(Harness::credentials()).await;

        let sessions = harness.listener.sessions.lock().unwrap();
        assert_eq!(
            sessions[0].login_error(),
            Some(LoginError::BadUsernameOrPassword)
        );
    }

    #[tokio::test]
    async fn unknown_and_missing_codes_fall_back_to_failed() {
        for body in [json!({"status": "fail", "code": 9}), json!({"status": "fail"})] {
            let harness =
                Harness::new(MockTransport::new().reply_ok(nonce_ok()).reply_ok(body));
            harness.flow().run(Harness::credentials()).await;
            let sessions = harness.listener.sessions.lock().unwrap();
            assert_eq!(sessions[0].login_error(), Some(LoginError::Failed));
        }
    }

    #[tokio::test]
    async fn nonce_rejection_skips_the_cookie_request() {
        let harness =
            Harness::new(MockTransport::new().reply_ok(json!({"status": "fail"})));

        let outcome = harness.flow().run(Harness::credentials()).await;

        assert!(matches!(outcome, LoginOutcome::Failure(_)));
        assert_eq!(harness.events(), vec!["start", "failure"]);
        assert_eq!(harness.transport.calls().len(), 1);
        let sessions = harness.listener.sessions.lock().unwrap();
        assert_eq!(sessions[0].login_error(), Some(LoginError::BadNonce));
    }

    #[tokio::test]
    async fn accepted_status_without_nonce_is_still_a_bad_nonce() {
        let harness = Harness::new(MockTransport::new().reply_ok(json!({"status": "ok"})));

        harness.flow().run(Harness::credentials()).await;

        assert_eq!(harness.transport.calls().len(), 1);
        let sessions = harness.listener.sessions.lock().unwrap();
        assert_eq!(sessions[0].login_error(), Some(LoginError::BadNonce));
    }

    #[tokio::test]
    async fn transport_failure_stays_on_the_connection_channel() {
        let harness = Harness::new(
            MockTransport::new().reply_err(TransportError::Request("dns".to_string())),
        );

        let outcome = harness.flow().run(Harness::credentials()).await;

        assert!(matches!(outcome, LoginOutcome::ConnectionFailure));
        assert_eq!(harness.events(), vec!["start"]);
        assert_eq!(harness.connection.failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cookie_step_transport_failure_also_uses_the_connection_channel() {
        let harness = Harness::new(
            MockTransport::new()
                .reply_ok(nonce_ok())
                .reply_err(TransportError::Status { status: 503 }),
        );

        let outcome = harness.flow().run(Harness::credentials()).await;

        assert!(matches!(outcome, LoginOutcome::ConnectionFailure));
        assert_eq!(harness.events(), vec!["start"]);
        assert_eq!(harness.connection.failures.lock().unwrap().len(), 1);
        assert_eq!(harness.transport.calls().len(), 2);
    }
}
