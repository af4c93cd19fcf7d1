//! # Presspass (Session Handshake & Response Routing)
//!
//! `presspass` is an asynchronous client for CMS deployments that expose the
//! WordPress JSON API plugin family: content reads, comment submission, and
//! the nonce-protected write methods, with the two-phase authentication
//! handshakes those writes depend on.
//!
//! ## Handshakes
//!
//! Login and registration are each two sequential requests: a **nonce** for
//! the protected action, then the action itself carrying that nonce. Both
//! flows notify a listener once at the start and deliver exactly one
//! terminal callback. A successful login stamps a [`session::Session`] with
//! the issued cookie and persists it through the configured
//! [`session::SessionStore`]; nonce-protected mutations later replay that
//! cookie with a freshly acquired nonce.
//!
//! ## Response Routing
//!
//! Every request is issued against one response family
//! ([`dispatch::RequestKind`]) and owns the listener it will deliver to.
//! Responses are decoded into a typed [`dispatch::Payload`] and routed to
//! that listener only, so overlapping requests of the same family cannot
//! cross wires no matter the order responses arrive in. Each operation
//! returns a [`RequestId`] for correlation.
//!
//! ## Failure Channels
//!
//! - **Semantic outcomes** (rejected credentials, registration refusals)
//!   reach the family listener as typed errors.
//! - **Connection-level failures** (transport errors, undecodable bodies,
//!   `status: "error"` rejections on entity endpoints) reach the
//!   client-wide connection listener; the family listener stays silent.
//!
//! ## Cancellation
//!
//! [`Client::cancel_all`] abandons everything in flight. No callback begins
//! after it returns; responses that were already received but not yet
//! delivered are dropped.

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod query;
pub mod session;
pub mod transport;

pub use client::{Client, ClientBuilder, RequestId};
pub use config::{APP_USER_AGENT, Config, Endpoints};
pub use error::{DecodeError, Error, TransportError};
