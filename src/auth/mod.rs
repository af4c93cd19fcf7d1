//! Authentication and registration: handshake inputs, wire codes, outcome
//! types, and the listener traits the flows call back on.
//!
//! Both handshakes are two network steps (nonce, then the credentialed
//! request) driven entirely by the pure classifiers in [`classify`]. Each
//! run delivers exactly one terminal callback; transport failures go to the
//! connection channel instead and never masquerade as credential problems.

pub(crate) mod classify;
mod login;
mod register;

pub(crate) use login::LoginFlow;
pub(crate) use register::RegisterFlow;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Username and password for the login handshake.
///
/// The password is wrapped in [`SecretString`] and exposed only while the
/// cookie request parameters are built.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Account fields for the registration handshake.
#[derive(Clone, Debug)]
pub struct Registration {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub password: SecretString,
}

impl Registration {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
            email: email.into(),
            password,
        }
    }
}

/// Login failure codes as the cookie endpoint reports them, plus the
/// nonce-stage rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginError {
    /// The server rejected the attempt without a recognizable code.
    Failed,
    BadUsername,
    BadPassword,
    BadUsernameOrPassword,
    /// The nonce request was rejected or returned no usable nonce.
    BadNonce,
}

impl LoginError {
    /// Maps a wire code onto a failure. Unknown, negative, and absent codes
    /// all collapse to [`LoginError::Failed`].
    pub(crate) fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Self::BadUsername,
            Some(2) => Self::BadPassword,
            Some(3) => Self::BadUsernameOrPassword,
            _ => Self::Failed,
        }
    }

    /// The numeric code as the wire protocol spells it.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Failed => -1,
            Self::BadUsername => 1,
            Self::BadPassword => 2,
            Self::BadUsernameOrPassword => 3,
            Self::BadNonce => 4,
        }
    }
}

/// Registration failure codes as the register endpoint reports them.
///
/// There is deliberately no nonce variant here: nonce-stage failures
/// terminate with [`RegistrationError::Failed`], because the wire protocol
/// reuses code 4 for both a bad nonce and an invalid email and the
/// ambiguity is not worth preserving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationError {
    /// The server rejected the attempt without a recognizable code.
    Failed,
    InvalidUsername,
    InvalidDisplayName,
    UsernameInUse,
    InvalidEmail,
    EmailInUse,
    InvalidPassword,
}

impl RegistrationError {
    /// Maps a wire code onto a failure; `None` for the success code 0.
    /// Unknown codes collapse to [`RegistrationError::Failed`].
    pub(crate) fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(Self::InvalidUsername),
            2 => Some(Self::InvalidDisplayName),
            3 => Some(Self::UsernameInUse),
            4 => Some(Self::InvalidEmail),
            5 => Some(Self::EmailInUse),
            6 => Some(Self::InvalidPassword),
            _ => Some(Self::Failed),
        }
    }

    /// The numeric code as the wire protocol spells it.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Failed => -1,
            Self::InvalidUsername => 1,
            Self::InvalidDisplayName => 2,
            Self::UsernameInUse => 3,
            Self::InvalidEmail => 4,
            Self::EmailInUse => 5,
            Self::InvalidPassword => 6,
        }
    }
}

/// Terminal result of one login handshake.
#[derive(Clone, Debug, PartialEq)]
pub enum LoginOutcome {
    Success(Session),
    /// The stamped session carries the failure code.
    Failure(Session),
    /// The exchange never completed; reported on the connection channel.
    ConnectionFailure,
}

/// Terminal result of one registration handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Success,
    Failure(RegistrationError),
    /// The exchange never completed; reported on the connection channel.
    ConnectionFailure,
}

/// Callbacks for the login lifecycle. One start notification, then exactly
/// one terminal call per attempt.
pub trait LoginListener: Send + Sync {
    fn on_login_start(&self) {}
    fn on_login_success(&self, session: Session);
    /// The session's status holds the [`LoginError`].
    fn on_login_failure(&self, session: Session);
}

/// Callbacks for the registration lifecycle. One start notification, then
/// exactly one terminal call per attempt.
pub trait RegisterListener: Send + Sync {
    fn on_register_start(&self) {}
    fn on_register_success(&self);
    fn on_register_failure(&self, error: RegistrationError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_codes_round_trip() {
        for error in [
            LoginError::BadUsername,
            LoginError::BadPassword,
            LoginError::BadUsernameOrPassword,
        ] {
            assert_eq!(LoginError::from_code(Some(error.code())), error);
        }
    }

    #[test]
    fn unknown_login_codes_collapse_to_failed() {
        assert_eq!(LoginError::from_code(None), LoginError::Failed);
        assert_eq!(LoginError::from_code(Some(0)), LoginError::Failed);
        assert_eq!(LoginError::from_code(Some(9)), LoginError::Failed);
        assert_eq!(LoginError::from_code(Some(-2)), LoginError::Failed);
    }

    #[test]
    fn registration_code_zero_is_success() {
        assert_eq!(RegistrationError::from_code(0), None);
    }

    #[test]
    fn registration_codes_round_trip() {
        for error in [
            RegistrationError::InvalidUsername,
            RegistrationError::InvalidDisplayName,
            RegistrationError::UsernameInUse,
            RegistrationError::InvalidEmail,
            RegistrationError::EmailInUse,
            RegistrationError::InvalidPassword,
        ] {
            assert_eq!(RegistrationError::from_code(error.code()), Some(error));
        }
    }

    #[test]
    fn unknown_registration_codes_collapse_to_failed() {
        assert_eq!(
            RegistrationError::from_code(7),
            Some(RegistrationError::Failed)
        );
        assert_eq!(
            RegistrationError::from_code(-1),
            Some(RegistrationError::Failed)
        );
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials::new("admin", SecretString::from("hunter2".to_string()));
        let printed = format!("{credentials:?}");
        assert!(!printed.contains("hunter2"));
    }
}
