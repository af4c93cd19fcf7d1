//! Client configuration: validated site URL, API path prefix, the endpoint
//! table, and transport knobs.
//!
//! Endpoint paths are configuration, not constants: WordPress JSON API
//! deployments route the same methods under different prefixes and custom
//! controllers, so every suffix in [`Endpoints`] can be overridden while the
//! defaults match the stock plugin (`<site>/<prefix>/<controller>/<method>`).
//! Configuration values are public; do not store secrets here.

use std::time::Duration;
use url::Url;

use crate::error::Error;

/// Default User-Agent sent with every request.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const DEFAULT_API_PREFIX: &str = "api";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Path suffixes for every API method the client calls, relative to the API
/// prefix. Overridable per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub nonce: String,
    pub cookie: String,
    pub register: String,
    pub posts: String,
    pub recent_posts: String,
    pub post: String,
    pub page: String,
    pub category_posts: String,
    pub tag_posts: String,
    pub author_posts: String,
    pub date_posts: String,
    pub search: String,
    pub category_index: String,
    pub comments: String,
    pub submit_comment: String,
    pub create_post: String,
    pub update_post: String,
    pub add_meta: String,
    pub update_meta: String,
    pub delete_meta: String,
    pub post_custom: String,
    pub post_custom_keys: String,
    pub post_custom_values: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            nonce: "get_nonce".to_string(),
            cookie: "auth/generate_auth_cookie".to_string(),
            register: "user/register".to_string(),
            posts: "get_posts".to_string(),
            recent_posts: "get_recent_posts".to_string(),
            post: "get_post".to_string(),
            page: "get_page".to_string(),
            category_posts: "get_category_posts".to_string(),
            tag_posts: "get_tag_posts".to_string(),
            author_posts: "get_author_posts".to_string(),
            date_posts: "get_date_posts".to_string(),
            search: "get_search_results".to_string(),
            category_index: "get_category_index".to_string(),
            // comments ride along on the single-post response
            comments: "get_post".to_string(),
            submit_comment: "respond/submit_comment".to_string(),
            create_post: "posts/create_post".to_string(),
            update_post: "posts/update_post".to_string(),
            add_meta: "meta/add_post_meta".to_string(),
            update_meta: "meta/update_post_meta".to_string(),
            delete_meta: "meta/delete_post_meta".to_string(),
            post_custom: "meta/get_post_custom".to_string(),
            post_custom_keys: "meta/get_post_custom_keys".to_string(),
            post_custom_values: "meta/get_post_custom_values".to_string(),
        }
    }
}

/// Everything the client needs to talk to one site.
#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    api_prefix: String,
    endpoints: Endpoints,
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Config {
    /// Builds a configuration for the given site URL with stock endpoint
    /// defaults.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the URL cannot be parsed, has no host,
    /// or uses a scheme other than http(s).
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let parsed = Url::parse(base_url)
            .map_err(|err| Error::Config(format!("invalid base URL: {err}")))?;

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(Error::Config(format!("unsupported scheme {scheme}")));
        }
        if parsed.host().is_none() {
            return Err(Error::Config("base URL has no host".to_string()));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            endpoints: Endpoints::default(),
            user_agent: APP_USER_AGENT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Replaces the API path prefix (`api` by default). An empty prefix
    /// addresses methods directly under the site root.
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        self.api_prefix = prefix.trim_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Full URL for an endpoint suffix from the [`Endpoints`] table.
    pub(crate) fn url_for(&self, suffix: &str) -> String {
        let suffix = suffix.trim_matches('/');
        if self.api_prefix.is_empty() {
            format!("{}/{}", self.base_url, suffix)
        } else {
            format!("{}/{}/{}", self.base_url, self.api_prefix, suffix)
        }
    }

    /// Full URL for a custom `controller/method` pair, for pass-through
    /// requests outside the endpoint table.
    pub(crate) fn url_for_method(&self, controller: &str, method: &str) -> String {
        self.url_for(&format!(
            "{}/{}",
            controller.trim_matches('/'),
            method.trim_matches('/')
        ))
    }
}

/// Query parameters identifying the protected action a nonce is requested
/// for, derived from that action's endpoint suffix
/// (`posts/create_post` -> `controller=posts&method=create_post`).
pub(crate) fn nonce_params_for(endpoint: &str) -> Vec<(String, String)> {
    match endpoint.trim_matches('/').rsplit_once('/') {
        Some((controller, method)) => vec![
            ("controller".to_string(), controller.to_string()),
            ("method".to_string(), method.to_string()),
        ],
        None => vec![("method".to_string(), endpoint.trim_matches('/').to_string())],
    }
}
