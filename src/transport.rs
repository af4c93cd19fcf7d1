//! HTTP transport seam between client operations and the network.
//!
//! This module keeps connectivity in one place so every API call shares
//! request construction, timeouts, and error classification. Flows and the
//! dispatcher depend on the [`Transport`] trait, not on reqwest, which is
//! what lets the handshake tests script exchanges without a server.
//!
//! Flow Overview:
//! - [`HttpTransport::new`] builds one reqwest client from the [`Config`]
//!   knobs (user agent, connect and request timeouts).
//! - `get`/`post` return the decoded JSON body; every non-2xx status and
//!   every non-JSON body is a [`TransportError`], so callers above never
//!   touch raw responses.
//! - POST switches to multipart when the form carries an [`Attachment`].

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;
use tracing::{Instrument, debug, info_span};

use crate::config::Config;
use crate::error::TransportError;
use crate::model::Attachment;

/// Parameters plus an optional upload for POST requests.
#[derive(Clone, Debug, Default)]
pub struct RequestForm {
    pub params: Vec<(String, String)>,
    pub attachment: Option<Attachment>,
}

impl RequestForm {
    #[must_use]
    pub fn from_params(params: Vec<(String, String)>) -> Self {
        Self {
            params,
            attachment: None,
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// One JSON exchange with the remote API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    /// Returns a [`TransportError`] when the exchange fails or the body is
    /// not JSON.
    async fn get(&self, url: &str, params: &[(String, String)])
        -> Result<Value, TransportError>;

    /// # Errors
    /// Returns a [`TransportError`] when the exchange fails, the attachment
    /// cannot be read, or the body is not JSON.
    async fn post(&self, url: &str, form: RequestForm) -> Result<Value, TransportError>;
}

/// Production transport over reqwest.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let span = info_span!("api.get", url = %url);
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .instrument(span)
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        decode_response(url, response).await
    }

    async fn post(&self, url: &str, form: RequestForm) -> Result<Value, TransportError> {
        let span = info_span!("api.post", url = %url);
        let request = if let Some(attachment) = form.attachment {
            let bytes = tokio::fs::read(&attachment.path).await.map_err(|err| {
                TransportError::Attachment(format!("{}: {err}", attachment.path.display()))
            })?;
            let part = multipart::Part::bytes(bytes).file_name(attachment.file_name);
            let mut multipart_form = multipart::Form::new();
            for (name, value) in form.params {
                multipart_form = multipart_form.text(name, value);
            }
            multipart_form = multipart_form.part(attachment.field, part);
            self.client.post(url).multipart(multipart_form)
        } else {
            self.client.post(url).form(&form.params)
        };

        let response = request
            .send()
            .instrument(span)
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        decode_response(url, response).await
    }
}

async fn decode_response(
    url: &str,
    response: reqwest::Response,
) -> Result<Value, TransportError> {
    let status = response.status();
    if !status.is_success() {
        debug!("request to {url} returned {status}");
        return Err(TransportError::Status {
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|err| TransportError::Request(err.to_string()))?;

    serde_json::from_str(&body).map_err(|err| TransportError::Body(err.to_string()))
}
