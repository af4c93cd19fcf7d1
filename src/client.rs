//! The asynchronous client: issues API calls, correlates responses with
//! the listener that asked for them, and tracks everything in flight.
//!
//! Flow Overview:
//! - Every operation spawns a task, returns a [`RequestId`], and resolves
//!   to exactly one terminal callback: the family listener on success, the
//!   connection channel on transport, decode, or rejection failures.
//! - Each request owns its listener for its whole lifetime, so two
//!   overlapping calls of the same family deliver to their own listeners
//!   no matter which response arrives first.
//! - [`Client::cancel_all`] advances a cancellation epoch and aborts the
//!   tracked tasks; a delivery guard re-checks the epoch right before any
//!   callback, so none begins after `cancel_all` returns.
//!
//! Nonce-protected mutations re-run the nonce handshake per call and replay
//! the stored session cookie; without an authenticated session on file they
//! fail fast instead of letting the server reject an empty cookie.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, error, info_span};
use ulid::Ulid;

use crate::auth::classify::{self, NonceOutcome};
use crate::auth::{
    Credentials, LoginFlow, LoginListener, RegisterFlow, RegisterListener, Registration,
    RegistrationError,
};
use crate::config::{Config, nonce_params_for};
use crate::dispatch::listeners::{
    ApiListener, CategoriesListener, CommentSubmittedListener, CommentsListener,
    ConnectionListener, CreatePostListener, CustomFieldsListener, PostListener, PostsListener,
};
use crate::dispatch::{self, Recipient};
use crate::error::{DecodeError, Error};
use crate::model::{Attachment, CustomField, NewComment, NewPost};
use crate::query::PostQuery;
use crate::session::{MemorySessionStore, Session, SessionStore};
use crate::transport::{HttpTransport, RequestForm, Transport};

/// Correlation id stamped on every issued request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Ulid);

impl RequestId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Bookkeeping for requests in flight. The epoch advances on `cancel_all`;
/// a callback admitted under an older epoch is dropped.
struct Inflight {
    epoch: AtomicU64,
    tasks: Mutex<HashMap<RequestId, AbortHandle>>,
}

impl Inflight {
    fn new() -> Self {
        Self {
            epoch: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn guard(self: &Arc<Self>) -> Guard {
        Guard {
            inflight: Arc::clone(self),
            epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<RequestId, AbortHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Epoch snapshot taken when a request is issued.
#[derive(Clone)]
struct Guard {
    inflight: Arc<Inflight>,
    epoch: u64,
}

impl Guard {
    fn admit(&self) -> bool {
        self.inflight.epoch.load(Ordering::SeqCst) == self.epoch
    }
}

/// Listener wrapper that drops callbacks once the epoch has moved past the
/// request it was issued for.
struct Guarded<T: ?Sized> {
    guard: Guard,
    inner: Arc<T>,
}

impl<T: ?Sized> Guarded<T> {
    fn new(guard: Guard, inner: Arc<T>) -> Self {
        Self { guard, inner }
    }
}

impl LoginListener for Guarded<dyn LoginListener> {
    fn on_login_start(&self) {
        if self.guard.admit() {
            self.inner.on_login_start();
        }
    }

    fn on_login_success(&self, session: Session) {
        if self.guard.admit() {
            self.inner.on_login_success(session);
        }
    }

    fn on_login_failure(&self, session: Session) {
        if self.guard.admit() {
            self.inner.on_login_failure(session);
        }
    }
}

impl RegisterListener for Guarded<dyn RegisterListener> {
    fn on_register_start(&self) {
        if self.guard.admit() {
            self.inner.on_register_start();
        }
    }

    fn on_register_success(&self) {
        if self.guard.admit() {
            self.inner.on_register_success();
        }
    }

    fn on_register_failure(&self, error: RegistrationError) {
        if self.guard.admit() {
            self.inner.on_register_failure(error);
        }
    }
}

impl ConnectionListener for Guarded<dyn ConnectionListener> {
    fn on_connection_failure(&self, error: &Error) {
        if self.guard.admit() {
            self.inner.on_connection_failure(error);
        }
    }
}

/// Client for one site. Cheap to share behind an [`Arc`]; all operations
/// take `&self`.
pub struct Client {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    connection: Arc<dyn ConnectionListener>,
    inflight: Arc<Inflight>,
}

/// Assembles a [`Client`] with a custom transport or session store.
pub struct ClientBuilder {
    config: Config,
    connection: Arc<dyn ConnectionListener>,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl ClientBuilder {
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// # Errors
    /// Returns [`Error::Transport`] if the HTTP transport cannot be built.
    pub fn build(self) -> Result<Client, Error> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        Ok(Client {
            config: Arc::new(self.config),
            transport,
            store,
            connection: self.connection,
            inflight: Arc::new(Inflight::new()),
        })
    }
}

impl Client {
    /// Client with the default HTTP transport and an in-memory session
    /// store. Connection-level failures for every request go to
    /// `connection`.
    ///
    /// # Errors
    /// Returns [`Error::Transport`] if the HTTP transport cannot be built.
    pub fn new(config: Config, connection: Arc<dyn ConnectionListener>) -> Result<Self, Error> {
        Self::builder(config, connection).build()
    }

    #[must_use]
    pub fn builder(config: Config, connection: Arc<dyn ConnectionListener>) -> ClientBuilder {
        ClientBuilder {
            config,
            connection,
            transport: None,
            store: None,
        }
    }

    /// The store this client persists handshake results into.
    #[must_use]
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    /// Runs the two-phase login handshake. The listener hears one start
    /// notification and exactly one terminal callback.
    pub fn login(&self, credentials: Credentials, listener: Arc<dyn LoginListener>) -> RequestId {
        let guard = self.inflight.guard();
        let flow = LoginFlow {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            connection: Arc::new(Guarded::new(guard.clone(), Arc::clone(&self.connection))),
            listener: Arc::new(Guarded::new(guard, listener)),
        };
        let id = RequestId::new();
        let span = info_span!("login", request = %id);
        self.spawn(
            id,
            async move {
                flow.run(credentials).await;
            }
            .instrument(span),
        )
    }

    /// Runs the two-phase registration handshake.
    pub fn register(
        &self,
        registration: Registration,
        listener: Arc<dyn RegisterListener>,
    ) -> RequestId {
        let guard = self.inflight.guard();
        let flow = RegisterFlow {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            connection: Arc::new(Guarded::new(guard.clone(), Arc::clone(&self.connection))),
            listener: Arc::new(Guarded::new(guard, listener)),
        };
        let id = RequestId::new();
        let span = info_span!("register", request = %id);
        self.spawn(
            id,
            async move {
                flow.run(registration).await;
            }
            .instrument(span),
        )
    }

    /// Lists posts with the given query knobs.
    pub fn posts(&self, query: &PostQuery, listener: Arc<dyn PostsListener>) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().posts);
        self.issue(url, query.params(), Recipient::Posts(listener))
    }

    /// Most recent posts with server-default paging.
    pub fn recent_posts(&self, listener: Arc<dyn PostsListener>) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().recent_posts);
        self.issue(url, Vec::new(), Recipient::Posts(listener))
    }

    pub fn post(&self, post_id: u64, listener: Arc<dyn PostListener>) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().post);
        let params = vec![("id".to_string(), post_id.to_string())];
        self.issue(url, params, Recipient::Post(listener))
    }

    pub fn page(&self, page_id: u64, listener: Arc<dyn PostListener>) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().page);
        let params = vec![("id".to_string(), page_id.to_string())];
        self.issue(url, params, Recipient::Post(listener))
    }

    pub fn posts_by_category(
        &self,
        category_id: u64,
        query: &PostQuery,
        listener: Arc<dyn PostsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().category_posts);
        let mut params = vec![("id".to_string(), category_id.to_string())];
        params.extend(query.params());
        self.issue(url, params, Recipient::Posts(listener))
    }

    pub fn posts_by_tag(
        &self,
        tag_id: u64,
        query: &PostQuery,
        listener: Arc<dyn PostsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().tag_posts);
        let mut params = vec![("id".to_string(), tag_id.to_string())];
        params.extend(query.params());
        self.issue(url, params, Recipient::Posts(listener))
    }

    pub fn posts_by_author(
        &self,
        author_id: u64,
        query: &PostQuery,
        listener: Arc<dyn PostsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().author_posts);
        let mut params = vec![("id".to_string(), author_id.to_string())];
        params.extend(query.params());
        self.issue(url, params, Recipient::Posts(listener))
    }

    /// Posts published under a date, `YYYY-MM-DD` or any prefix of it.
    pub fn posts_by_date(
        &self,
        date: &str,
        query: &PostQuery,
        listener: Arc<dyn PostsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().date_posts);
        let mut params = vec![("date".to_string(), date.to_string())];
        params.extend(query.params());
        self.issue(url, params, Recipient::Posts(listener))
    }

    pub fn search_posts(
        &self,
        term: &str,
        query: &PostQuery,
        listener: Arc<dyn PostsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().search);
        let mut params = vec![("search".to_string(), term.to_string())];
        params.extend(query.params());
        self.issue(url, params, Recipient::Posts(listener))
    }

    pub fn category_index(&self, listener: Arc<dyn CategoriesListener>) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().category_index);
        self.issue(url, Vec::new(), Recipient::Categories(listener))
    }

    /// Comments on a post, pulled from the single-post response.
    pub fn comments(&self, post_id: u64, listener: Arc<dyn CommentsListener>) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().comments);
        let params = vec![("id".to_string(), post_id.to_string())];
        self.issue(url, params, Recipient::Comments(listener))
    }

    pub fn submit_comment(
        &self,
        comment: NewComment,
        listener: Arc<dyn CommentSubmittedListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().submit_comment);
        let NewComment {
            post_id,
            name,
            email,
            url: author_url,
            content,
        } = comment;
        let mut params = vec![
            ("post_id".to_string(), post_id.to_string()),
            ("name".to_string(), name),
            ("email".to_string(), email),
            ("content".to_string(), content),
        ];
        if let Some(author_url) = author_url {
            params.push(("url".to_string(), author_url));
        }
        self.issue(url, params, Recipient::CommentSubmit(listener))
    }

    /// Creates a post. Nonce-protected: requires an authenticated session
    /// in the store, acquires a fresh nonce, and POSTs the form, as
    /// multipart when an attachment rides along.
    pub fn create_post(&self, post: NewPost, listener: Arc<dyn CreatePostListener>) -> RequestId {
        let endpoint = self.config.endpoints().create_post.clone();
        let params = post_params(&post);
        self.mutate(
            endpoint,
            params,
            post.attachment,
            Recipient::PostCreate(listener),
        )
    }

    /// Updates an existing post; nonce-protected like [`Self::create_post`].
    pub fn update_post(
        &self,
        post_id: u64,
        post: NewPost,
        listener: Arc<dyn PostListener>,
    ) -> RequestId {
        let endpoint = self.config.endpoints().update_post.clone();
        let mut params = vec![("id".to_string(), post_id.to_string())];
        params.extend(post_params(&post));
        self.mutate(endpoint, params, post.attachment, Recipient::Post(listener))
    }

    /// Attaches a custom field to a post. With `unique` set the server
    /// refuses a second value under the same key.
    pub fn add_post_meta(
        &self,
        post_id: u64,
        field: CustomField,
        unique: bool,
        listener: Arc<dyn CustomFieldsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().add_meta);
        let params = vec![
            ("post_id".to_string(), post_id.to_string()),
            ("meta_key".to_string(), field.key),
            ("meta_value".to_string(), field.value),
            ("unique".to_string(), unique.to_string()),
        ];
        self.issue(url, params, Recipient::CustomFieldWrite(listener))
    }

    /// Rewrites a custom field. With `prev_value` set only that stored
    /// value is replaced.
    pub fn update_post_meta(
        &self,
        post_id: u64,
        field: CustomField,
        prev_value: Option<&str>,
        listener: Arc<dyn CustomFieldsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().update_meta);
        let mut params = vec![
            ("post_id".to_string(), post_id.to_string()),
            ("meta_key".to_string(), field.key),
            ("meta_value".to_string(), field.value),
        ];
        if let Some(prev_value) = prev_value {
            params.push(("prev_value".to_string(), prev_value.to_string()));
        }
        self.issue(url, params, Recipient::CustomFieldWrite(listener))
    }

    /// Deletes a custom field, one stored value or the whole key.
    pub fn delete_post_meta(
        &self,
        post_id: u64,
        key: &str,
        value: Option<&str>,
        listener: Arc<dyn CustomFieldsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().delete_meta);
        let mut params = vec![
            ("post_id".to_string(), post_id.to_string()),
            ("meta_key".to_string(), key.to_string()),
        ];
        if let Some(value) = value {
            params.push(("meta_value".to_string(), value.to_string()));
        }
        self.issue(url, params, Recipient::CustomFieldWrite(listener))
    }

    /// All custom fields on a post.
    pub fn post_custom(
        &self,
        post_id: u64,
        listener: Arc<dyn CustomFieldsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().post_custom);
        let params = vec![("post_id".to_string(), post_id.to_string())];
        self.issue(url, params, Recipient::CustomFields(listener))
    }

    /// Custom field keys on a post; the delivered fields carry empty
    /// values.
    pub fn post_custom_keys(
        &self,
        post_id: u64,
        listener: Arc<dyn CustomFieldsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().post_custom_keys);
        let params = vec![("post_id".to_string(), post_id.to_string())];
        self.issue(url, params, Recipient::CustomFields(listener))
    }

    /// Stored values under one custom field key; the delivered fields carry
    /// empty keys.
    pub fn post_custom_values(
        &self,
        post_id: u64,
        key: &str,
        listener: Arc<dyn CustomFieldsListener>,
    ) -> RequestId {
        let url = self.config.url_for(&self.config.endpoints().post_custom_values);
        let params = vec![
            ("post_id".to_string(), post_id.to_string()),
            ("meta_key".to_string(), key.to_string()),
        ];
        self.issue(url, params, Recipient::CustomFields(listener))
    }

    /// Pass-through call to any `controller/method` the deployment exposes.
    /// The raw body is delivered as-is, server-reported errors included.
    pub fn api_request(
        &self,
        controller: &str,
        method: &str,
        params: Vec<(String, String)>,
        listener: Arc<dyn ApiListener>,
    ) -> RequestId {
        let url = self.config.url_for_method(controller, method);
        self.issue(url, params, Recipient::Api(listener))
    }

    /// Abandons everything in flight. No callback begins after this
    /// returns; responses already received but not yet delivered are
    /// dropped.
    pub fn cancel_all(&self) {
        self.inflight.epoch.fetch_add(1, Ordering::SeqCst);
        let handles: Vec<AbortHandle> = {
            let mut tasks = self.inflight.lock_tasks();
            tasks.drain().map(|(_, handle)| handle).collect()
        };
        debug!(count = handles.len(), "cancelling requests in flight");
        for handle in handles {
            handle.abort();
        }
    }

    fn issue(
        &self,
        url: String,
        params: Vec<(String, String)>,
        recipient: Recipient,
    ) -> RequestId {
        let transport = Arc::clone(&self.transport);
        let connection = Arc::clone(&self.connection);
        let guard = self.inflight.guard();
        let id = RequestId::new();
        let span = info_span!("api.request", request = %id, kind = ?recipient.kind());
        self.spawn(
            id,
            async move {
                let result = transport.get(&url, &params).await.map_err(Error::from);
                finish(result, &recipient, &connection, &guard);
            }
            .instrument(span),
        )
    }

    fn mutate(
        &self,
        endpoint: String,
        params: Vec<(String, String)>,
        attachment: Option<Attachment>,
        recipient: Recipient,
    ) -> RequestId {
        let config = Arc::clone(&self.config);
        let transport = Arc::clone(&self.transport);
        let store = Arc::clone(&self.store);
        let connection = Arc::clone(&self.connection);
        let guard = self.inflight.guard();
        let id = RequestId::new();
        let span = info_span!("api.mutation", request = %id, endpoint = %endpoint);
        self.spawn(
            id,
            async move {
                let result = protected_mutation(
                    &config,
                    transport.as_ref(),
                    store.as_ref(),
                    &endpoint,
                    params,
                    attachment,
                )
                .await;
                finish(result, &recipient, &connection, &guard);
            }
            .instrument(span),
        )
    }

    fn spawn<F>(&self, id: RequestId, future: F) -> RequestId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inflight = Arc::clone(&self.inflight);
        let handle = tokio::spawn(async move {
            future.await;
            inflight.lock_tasks().remove(&id);
        });
        let abort = handle.abort_handle();
        let mut tasks = self.inflight.lock_tasks();
        tasks.insert(id, abort);
        // the task may have finished before the insert
        if handle.is_finished() {
            tasks.remove(&id);
        }
        id
    }
}

/// Terminal delivery for one entity request: decode on success, route to
/// the recipient; any failure goes to the connection channel. The guard is
/// consulted immediately before either callback.
fn finish(
    result: Result<Value, Error>,
    recipient: &Recipient,
    connection: &Arc<dyn ConnectionListener>,
    guard: &Guard,
) {
    match result.and_then(|body| dispatch::decode(recipient.kind(), &body)) {
        Ok(payload) => {
            if guard.admit() {
                dispatch::dispatch(recipient, payload);
            }
        }
        Err(err) => {
            error!(kind = ?recipient.kind(), "request failed: {err}");
            if guard.admit() {
                connection.on_connection_failure(&err);
            }
        }
    }
}

/// Acquires a fresh nonce for `endpoint`, replays the stored session
/// cookie, and POSTs the mutation.
async fn protected_mutation(
    config: &Config,
    transport: &dyn Transport,
    store: &dyn SessionStore,
    endpoint: &str,
    mut params: Vec<(String, String)>,
    attachment: Option<Attachment>,
) -> Result<Value, Error> {
    let cookie = store
        .load()
        .await?
        .filter(Session::is_authenticated)
        .and_then(|session| session.cookie().map(ToString::to_string))
        .ok_or(Error::NotAuthenticated)?;

    let nonce_url = config.url_for(&config.endpoints().nonce);
    let nonce_body = transport
        .get(&nonce_url, &nonce_params_for(endpoint))
        .await?;
    let nonce = match classify::classify_nonce(&nonce_body) {
        NonceOutcome::Accepted { nonce } => nonce,
        NonceOutcome::Rejected => {
            return Err(Error::Api {
                message: "nonce request rejected".to_string(),
            });
        }
        NonceOutcome::Malformed => {
            return Err(Error::Decode(DecodeError::MissingField { field: "nonce" }));
        }
    };

    params.push(("nonce".to_string(), nonce));
    params.push(("cookie".to_string(), cookie));

    let url = config.url_for(endpoint);
    let mut form = RequestForm::from_params(params);
    if let Some(attachment) = attachment {
        form = form.with_attachment(attachment);
    }
    Ok(transport.post(&url, form).await?)
}

fn post_params(post: &NewPost) -> Vec<(String, String)> {
    let mut params = vec![
        ("title".to_string(), post.title.clone()),
        ("content".to_string(), post.content.clone()),
        ("status".to_string(), post.status.clone()),
    ];
    if !post.categories.is_empty() {
        params.push(("categories".to_string(), post.categories.join(",")));
    }
    if !post.tags.is_empty() {
        params.push(("tags".to_string(), post.tags.join(",")));
    }
    params
}
