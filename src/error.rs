//! Error taxonomy for client operations.
//!
//! Three situations are kept distinct so callers can react to each: the
//! request never completed ([`TransportError`]), the server answered with a
//! machine-readable rejection ([`Error::Api`]), or a response arrived but
//! could not be decoded into the expected shape ([`DecodeError`]).
//! Handshake flows never surface these directly; they classify transport
//! failures onto the connection channel and everything else into session
//! status codes.

use thiserror::Error;

/// Failures raised while performing the HTTP exchange itself.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived (DNS, connect,
    /// timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered outside the 2xx range.
    #[error("server returned status {status}")]
    Status { status: u16 },

    /// The response body was not valid JSON.
    #[error("response body was not JSON: {0}")]
    Body(String),

    /// A local attachment could not be read before upload.
    #[error("attachment unreadable: {0}")]
    Attachment(String),
}

/// Failures raised while decoding a well-formed JSON body into a typed
/// result.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A field the response shape requires was absent.
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    /// A required field was present with an unusable type.
    #[error("field `{field}` has an unexpected type")]
    WrongType { field: &'static str },

    /// An embedded entity failed to deserialize.
    #[error("malformed entity: {0}")]
    Entity(#[from] serde_json::Error),
}

/// Everything a client operation can report through the failure channel.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration was rejected before any request was made.
    #[error("configuration error: {0}")]
    Config(String),

    /// The exchange failed below the protocol level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server processed the request and rejected it.
    #[error("api rejected the request: {message}")]
    Api { message: String },

    /// The response could not be decoded into the expected shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The operation needs a logged-in session and none is stored.
    #[error("no authenticated session is stored")]
    NotAuthenticated,

    /// The session store failed to persist or produce a session.
    #[error("session store error: {0}")]
    Store(String),
}
