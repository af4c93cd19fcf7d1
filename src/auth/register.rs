//! The registration handshake: nonce acquisition, then account submission.
//!
//! Mirrors the login flow's structure with registration parameters and the
//! registration code table. Nonce-stage failures, whether the server
//! rejected the request or the accepted response carried no usable nonce,
//! terminate with a generic failure; the two cases stay distinguishable in
//! the logs. The submitted registration is judged by the numeric `code`
//! field alone, zero meaning success.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{debug, error};

use super::classify::{self, NonceOutcome};
use super::{RegisterListener, Registration, RegistrationError, RegistrationOutcome};
use crate::config::{Config, nonce_params_for};
use crate::dispatch::listeners::ConnectionListener;
use crate::session::{Session, SessionStatus, SessionStore};
use crate::transport::Transport;

pub(crate) struct RegisterFlow {
    pub(crate) config: Arc<Config>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) connection: Arc<dyn ConnectionListener>,
    pub(crate) listener: Arc<dyn RegisterListener>,
}

impl RegisterFlow {
    pub(crate) async fn run(self, registration: Registration) -> RegistrationOutcome {
        self.listener.on_register_start();

        let endpoints = self.config.endpoints();
        let nonce_url = self.config.url_for(&endpoints.nonce);
        let nonce_params = nonce_params_for(&endpoints.register);

        let nonce_body = match self.transport.get(&nonce_url, &nonce_params).await {
            Ok(body) => body,
            Err(err) => {
                error!("registration nonce request failed: {err}");
                self.connection.on_connection_failure(&err.into());
                return RegistrationOutcome::ConnectionFailure;
            }
        };

        let mut session = Session::new();

        let nonce = match classify::classify_nonce(&nonce_body) {
            NonceOutcome::Accepted { nonce } => nonce,
            NonceOutcome::Rejected => {
                debug!("registration nonce rejected by server");
                return self.fail(session, RegistrationError::Failed).await;
            }
            NonceOutcome::Malformed => {
                error!("registration nonce response had no usable nonce");
                return self.fail(session, RegistrationError::Failed).await;
            }
        };

        session.set_nonce(nonce.clone());
        self.persist(&session).await;

        let register_url = self.config.url_for(&endpoints.register);
        let register_params = vec![
            ("nonce".to_string(), nonce),
            ("username".to_string(), registration.username.clone()),
            ("display_name".to_string(), registration.display_name.clone()),
            ("email".to_string(), registration.email.clone()),
            (
                "password".to_string(),
                registration.password.expose_secret().to_string(),
            ),
        ];

        let body = match self.transport.get(&register_url, &register_params).await {
            Ok(body) => body,
            Err(err) => {
                error!("registration request failed: {err}");
                self.connection.on_connection_failure(&err.into());
                return RegistrationOutcome::ConnectionFailure;
            }
        };

        match RegistrationError::from_code(classify::registration_code(&body)) {
            None => {
                session.set_status(SessionStatus::RegistrationSucceeded);
                self.persist(&session).await;
                debug!(username = %registration.username, "registration succeeded");
                self.listener.on_register_success();
                RegistrationOutcome::Success
            }
            Some(error) => {
                debug!(code = error.code(), "registration rejected by server");
                self.fail(session, error).await
            }
        }
    }

    /// The only place the failure callback fires.
    async fn fail(
        &self,
        mut session: Session,
        error: RegistrationError,
    ) -> RegistrationOutcome {
        session.set_status(SessionStatus::RegistrationFailed(error));
        self.persist(&session).await;
        self.listener.on_register_failure(error);
        RegistrationOutcome::Failure(error)
    }

    /// Persistence is best effort; a store hiccup never changes the
    /// callback contract.
    async fn persist(&self, session: &Session) {
        if let Err(err) = self.store.save(session).await {
            error!("failed to persist session: {err}");
        }
    }
}
