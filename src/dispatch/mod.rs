//! Response decoding and routing.
//!
//! Every issued request is tagged with the [`RequestKind`] it expects.
//! [`decode`] turns `(kind, body)` into exactly one [`Payload`] or a
//! failure; [`dispatch`] hands the payload to the one listener the request
//! owns. Decoding is a pure function of its inputs, so decoding the same
//! body twice yields the same payload with no state left behind, and a
//! response can only ever reach the listener of the request that produced
//! it.

pub mod listeners;
mod page;

pub use page::PageMeta;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

use self::listeners::{
    ApiListener, CategoriesListener, CommentSubmittedListener, CommentsListener,
    CreatePostListener, CustomFieldsListener, PostListener, PostsListener,
};
use crate::error::{DecodeError, Error};
use crate::model::{Category, Comment, CommentAck, CustomField, FieldAck, Post};

/// Which response family a request expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Posts,
    Post,
    PostCreate,
    Comments,
    CommentSubmit,
    Categories,
    CustomFields,
    CustomFieldWrite,
    Api,
}

/// One decoded response, one variant per family.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Posts {
        posts: Vec<Post>,
        page: PageMeta,
    },
    Post(Box<Post>),
    PostCreated(Box<Post>),
    Comments {
        comments: Vec<Comment>,
        page: Option<PageMeta>,
    },
    CommentSubmitted(CommentAck),
    Categories {
        categories: Vec<Category>,
        page: Option<PageMeta>,
    },
    CustomFields(Vec<CustomField>),
    CustomFieldWritten(FieldAck),
    Api(Value),
}

/// The one listener an issued request delivers to. Building a recipient
/// fixes the request's kind, so decode and delivery cannot disagree.
#[derive(Clone)]
pub(crate) enum Recipient {
    Posts(Arc<dyn PostsListener>),
    Post(Arc<dyn PostListener>),
    PostCreate(Arc<dyn CreatePostListener>),
    Comments(Arc<dyn CommentsListener>),
    CommentSubmit(Arc<dyn CommentSubmittedListener>),
    Categories(Arc<dyn CategoriesListener>),
    CustomFields(Arc<dyn CustomFieldsListener>),
    CustomFieldWrite(Arc<dyn CustomFieldsListener>),
    Api(Arc<dyn ApiListener>),
}

impl Recipient {
    pub(crate) fn kind(&self) -> RequestKind {
        match self {
            Self::Posts(_) => RequestKind::Posts,
            Self::Post(_) => RequestKind::Post,
            Self::PostCreate(_) => RequestKind::PostCreate,
            Self::Comments(_) => RequestKind::Comments,
            Self::CommentSubmit(_) => RequestKind::CommentSubmit,
            Self::Categories(_) => RequestKind::Categories,
            Self::CustomFields(_) => RequestKind::CustomFields,
            Self::CustomFieldWrite(_) => RequestKind::CustomFieldWrite,
            Self::Api(_) => RequestKind::Api,
        }
    }
}

/// Decodes `body` into the payload `kind` expects.
///
/// # Errors
/// [`Error::Api`] when the server reports `status: "error"` (pass-through
/// requests excepted, they deliver raw bodies); [`Error::Decode`] when the
/// shape does not match. A failed decode never produces a partial payload.
pub fn decode(kind: RequestKind, body: &Value) -> Result<Payload, Error> {
    if kind != RequestKind::Api {
        if let Some(message) = rejection_message(body) {
            return Err(Error::Api { message });
        }
    }

    let payload = match kind {
        RequestKind::Posts => Payload::Posts {
            posts: entity_vec::<Post>(body, "posts")?,
            page: PageMeta::require(body)?,
        },
        RequestKind::Post => {
            // page responses carry the same shape under their own key
            let value = body
                .get("post")
                .or_else(|| body.get("page"))
                .ok_or(DecodeError::MissingField { field: "post" })?;
            let post: Post = serde_json::from_value(value.clone()).map_err(DecodeError::Entity)?;
            Payload::Post(Box::new(post))
        }
        RequestKind::PostCreate => {
            Payload::PostCreated(Box::new(entity::<Post>(body, "post")?))
        }
        RequestKind::Comments => Payload::Comments {
            comments: comment_list(body)?,
            page: PageMeta::detect(body),
        },
        RequestKind::CommentSubmit => Payload::CommentSubmitted(comment_ack(body)?),
        RequestKind::Categories => Payload::Categories {
            categories: entity_vec::<Category>(body, "categories")?,
            page: PageMeta::detect(body),
        },
        RequestKind::CustomFields => Payload::CustomFields(custom_fields(body)?),
        RequestKind::CustomFieldWrite => Payload::CustomFieldWritten(FieldAck {
            id: ack_id(body, &["meta_id", "id"]),
        }),
        RequestKind::Api => Payload::Api(body.clone()),
    };

    Ok(payload)
}

/// Delivers a payload to the request's listener. Exactly one listener
/// method runs per call.
pub(crate) fn dispatch(recipient: &Recipient, payload: Payload) {
    match (recipient, payload) {
        (Recipient::Posts(listener), Payload::Posts { posts, page }) => {
            listener.on_posts_received(posts, page);
        }
        (Recipient::Post(listener), Payload::Post(post)) => {
            listener.on_post_received(*post);
        }
        (Recipient::PostCreate(listener), Payload::PostCreated(post)) => {
            listener.on_post_created(*post);
        }
        (Recipient::Comments(listener), Payload::Comments { comments, page }) => {
            listener.on_comments_received(comments, page);
        }
        (Recipient::CommentSubmit(listener), Payload::CommentSubmitted(ack)) => {
            listener.on_comment_submitted(ack);
        }
        (Recipient::Categories(listener), Payload::Categories { categories, page }) => {
            listener.on_categories_received(categories, page);
        }
        (Recipient::CustomFields(listener), Payload::CustomFields(fields)) => {
            listener.on_custom_fields_received(fields);
        }
        (Recipient::CustomFieldWrite(listener), Payload::CustomFieldWritten(ack)) => {
            listener.on_custom_field_written(ack);
        }
        (Recipient::Api(listener), Payload::Api(body)) => {
            listener.on_api_response(body);
        }
        (recipient, payload) => {
            error!(kind = ?recipient.kind(), payload = ?payload, "payload did not match its recipient");
        }
    }
}

/// A top-level `status: "error"` is a remote rejection; its message rides
/// in the `error` field.
fn rejection_message(body: &Value) -> Option<String> {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unspecified api error");
        return Some(message.to_string());
    }
    None
}

fn entity<T: DeserializeOwned>(body: &Value, field: &'static str) -> Result<T, DecodeError> {
    let value = body.get(field).ok_or(DecodeError::MissingField { field })?;
    serde_json::from_value(value.clone()).map_err(DecodeError::Entity)
}

fn entity_vec<T: DeserializeOwned>(
    body: &Value,
    field: &'static str,
) -> Result<Vec<T>, DecodeError> {
    let value = body.get(field).ok_or(DecodeError::MissingField { field })?;
    if !value.is_array() {
        return Err(DecodeError::WrongType { field });
    }
    serde_json::from_value(value.clone()).map_err(DecodeError::Entity)
}

/// Comment lists arrive at top level or nested inside the post the
/// single-post endpoint returns.
fn comment_list(body: &Value) -> Result<Vec<Comment>, DecodeError> {
    if body.get("comments").is_some() {
        return entity_vec::<Comment>(body, "comments");
    }
    match body.get("post").and_then(|post| post.get("comments")) {
        Some(value) if value.is_array() => {
            serde_json::from_value(value.clone()).map_err(DecodeError::Entity)
        }
        Some(_) => Err(DecodeError::WrongType { field: "comments" }),
        None => Err(DecodeError::MissingField { field: "comments" }),
    }
}

fn comment_ack(body: &Value) -> Result<CommentAck, DecodeError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField { field: "status" })?;
    let pending = match status {
        "ok" => false,
        "pending" => true,
        _ => return Err(DecodeError::WrongType { field: "status" }),
    };
    Ok(CommentAck {
        id: ack_id(body, &["comment_id", "id"]),
        pending,
    })
}

fn ack_id(body: &Value, fields: &[&str]) -> Option<u64> {
    fields
        .iter()
        .find_map(|field| body.get(field).and_then(page::coerce_u64))
}

/// Custom fields arrive in several shapes: an array of `{key, value}`
/// objects, the WordPress map of key to value list, or the bare key/value
/// lists of the key-only and value-only read methods.
fn custom_fields(body: &Value) -> Result<Vec<CustomField>, DecodeError> {
    if let Some(value) = body.get("custom_fields") {
        return match value {
            Value::Array(_) => serde_json::from_value(value.clone()).map_err(DecodeError::Entity),
            Value::Object(map) => Ok(flatten_field_map(map)),
            _ => Err(DecodeError::WrongType {
                field: "custom_fields",
            }),
        };
    }
    if let Some(value) = body.get("keys") {
        let keys = string_list(value, "keys")?;
        return Ok(keys
            .into_iter()
            .map(|key| CustomField::new(key, ""))
            .collect());
    }
    if let Some(value) = body.get("values") {
        let values = string_list(value, "values")?;
        return Ok(values
            .into_iter()
            .map(|value| CustomField::new("", value))
            .collect());
    }
    Err(DecodeError::MissingField {
        field: "custom_fields",
    })
}

fn flatten_field_map(map: &serde_json::Map<String, Value>) -> Vec<CustomField> {
    let mut fields = Vec::new();
    for (key, entry) in map {
        match entry {
            Value::Array(values) => {
                for value in values {
                    fields.push(CustomField::new(key.clone(), scalar_string(value)));
                }
            }
            other => fields.push(CustomField::new(key.clone(), scalar_string(other))),
        }
    }
    fields
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn string_list(value: &Value, field: &'static str) -> Result<Vec<String>, DecodeError> {
    let list = value.as_array().ok_or(DecodeError::WrongType { field })?;
    Ok(list.iter().map(scalar_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn posts_body() -> Value {
        json!({
            "status": "ok",
            "count": 2,
            "count_total": 11,
            "pages": 6,
            "posts": [
                {"id": 1, "title": "First"},
                {"id": 2, "title": "Second"}
            ]
        })
    }

    #[test]
    fn decodes_a_posts_page() {
        let payload = decode(RequestKind::Posts, &posts_body()).unwrap();
        match payload {
            Payload::Posts { posts, page } => {
                assert_eq!(posts.len(), 2);
                assert_eq!(posts[0].title, "First");
                assert_eq!(page.count, 2);
                assert_eq!(page.count_total, 11);
                assert_eq!(page.pages, 6);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn decoding_is_idempotent() {
        let body = posts_body();
        let first = decode(RequestKind::Posts, &body).unwrap();
        let second = decode(RequestKind::Posts, &body).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn posts_without_a_list_are_a_decode_failure() {
        let err = decode(RequestKind::Posts, &json!({"status": "ok", "count": 0, "pages": 0}))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::MissingField { field: "posts" })
        ));
    }

    #[test]
    fn a_bad_post_entity_fails_the_whole_list() {
        let body = json!({
            "status": "ok",
            "count": 2,
            "pages": 1,
            "posts": [{"id": 1}, {"id": "two"}]
        });
        let err = decode(RequestKind::Posts, &body).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Entity(_))));
    }

    #[test]
    fn remote_rejection_carries_the_server_message() {
        let err = decode(
            RequestKind::Posts,
            &json!({"status": "error", "error": "Not found."}),
        )
        .unwrap_err();
        match err {
            Error::Api { message } => assert_eq!(message, "Not found."),
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn remote_rejection_without_a_message_still_rejects() {
        let err = decode(RequestKind::Post, &json!({"status": "error"})).unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
    }

    #[test]
    fn decodes_a_single_post() {
        let payload = decode(
            RequestKind::Post,
            &json!({"status": "ok", "post": {"id": 9, "title": "Nine"}}),
        )
        .unwrap();
        match payload {
            Payload::Post(post) => assert_eq!(post.id, 9),
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn pages_decode_under_their_own_key() {
        let payload = decode(
            RequestKind::Post,
            &json!({"status": "ok", "page": {"id": 12, "type": "page"}}),
        )
        .unwrap();
        match payload {
            Payload::Post(post) => {
                assert_eq!(post.id, 12);
                assert_eq!(post.post_type, "page");
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn a_missing_post_is_a_decode_failure() {
        let err = decode(RequestKind::Post, &json!({"status": "ok"})).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::MissingField { field: "post" })
        ));
    }

    #[test]
    fn comments_decode_from_the_top_level() {
        let payload = decode(
            RequestKind::Comments,
            &json!({"status": "ok", "count": 1, "comments": [{"id": 4, "content": "hi"}]}),
        )
        .unwrap();
        match payload {
            Payload::Comments { comments, page } => {
                assert_eq!(comments.len(), 1);
                assert_eq!(page.unwrap().count, 1);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn comments_decode_from_inside_the_post() {
        let payload = decode(
            RequestKind::Comments,
            &json!({"status": "ok", "post": {"id": 1, "comments": [{"id": 4}, {"id": 5}]}}),
        )
        .unwrap();
        match payload {
            Payload::Comments { comments, page } => {
                assert_eq!(comments.len(), 2);
                assert!(page.is_none());
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn missing_comments_are_a_decode_failure() {
        let err =
            decode(RequestKind::Comments, &json!({"status": "ok", "post": {"id": 1}}))
                .unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::MissingField { field: "comments" })
        ));
    }

    #[test]
    fn comment_ack_distinguishes_pending() {
        let ok = decode(
            RequestKind::CommentSubmit,
            &json!({"status": "ok", "comment_id": 33}),
        )
        .unwrap();
        assert_eq!(
            ok,
            Payload::CommentSubmitted(CommentAck {
                id: Some(33),
                pending: false
            })
        );

        let held = decode(RequestKind::CommentSubmit, &json!({"status": "pending"})).unwrap();
        assert_eq!(
            held,
            Payload::CommentSubmitted(CommentAck {
                id: None,
                pending: true
            })
        );
    }

    #[test]
    fn comment_ack_rejects_unknown_statuses() {
        let err =
            decode(RequestKind::CommentSubmit, &json!({"status": "maybe"})).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn decodes_the_category_index() {
        let payload = decode(
            RequestKind::Categories,
            &json!({
                "status": "ok",
                "count": 2,
                "categories": [
                    {"id": 3, "slug": "news", "title": "News", "post_count": 7},
                    {"id": 4, "slug": "opinion", "title": "Opinion"}
                ]
            }),
        )
        .unwrap();
        match payload {
            Payload::Categories { categories, page } => {
                assert_eq!(categories.len(), 2);
                assert_eq!(categories[0].slug, "news");
                assert_eq!(page.unwrap().count, 2);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn custom_fields_decode_from_an_object_array() {
        let payload = decode(
            RequestKind::CustomFields,
            &json!({"status": "ok", "custom_fields": [{"key": "mood", "value": "sunny"}]}),
        )
        .unwrap();
        assert_eq!(
            payload,
            Payload::CustomFields(vec![CustomField::new("mood", "sunny")])
        );
    }

    #[test]
    fn custom_fields_flatten_the_map_shape() {
        let payload = decode(
            RequestKind::CustomFields,
            &json!({
                "status": "ok",
                "custom_fields": {
                    "mood": ["sunny", "stormy"],
                    "rating": 5
                }
            }),
        )
        .unwrap();
        match payload {
            Payload::CustomFields(fields) => {
                assert!(fields.contains(&CustomField::new("mood", "sunny")));
                assert!(fields.contains(&CustomField::new("mood", "stormy")));
                assert!(fields.contains(&CustomField::new("rating", "5")));
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn key_lists_become_key_only_fields() {
        let payload = decode(
            RequestKind::CustomFields,
            &json!({"status": "ok", "keys": ["mood", "rating"]}),
        )
        .unwrap();
        assert_eq!(
            payload,
            Payload::CustomFields(vec![
                CustomField::new("mood", ""),
                CustomField::new("rating", ""),
            ])
        );
    }

    #[test]
    fn value_lists_become_value_only_fields() {
        let payload = decode(
            RequestKind::CustomFields,
            &json!({"status": "ok", "values": ["sunny", "stormy"]}),
        )
        .unwrap();
        assert_eq!(
            payload,
            Payload::CustomFields(vec![
                CustomField::new("", "sunny"),
                CustomField::new("", "stormy"),
            ])
        );
    }

    #[test]
    fn field_write_ack_reads_the_meta_id() {
        let payload = decode(
            RequestKind::CustomFieldWrite,
            &json!({"status": "ok", "meta_id": 91}),
        )
        .unwrap();
        assert_eq!(payload, Payload::CustomFieldWritten(FieldAck { id: Some(91) }));

        let bare = decode(RequestKind::CustomFieldWrite, &json!({"status": "ok"})).unwrap();
        assert_eq!(bare, Payload::CustomFieldWritten(FieldAck { id: None }));
    }

    #[test]
    fn pass_through_delivers_raw_bodies_even_errors() {
        let body = json!({"status": "error", "error": "custom controller unhappy"});
        let payload = decode(RequestKind::Api, &body).unwrap();
        assert_eq!(payload, Payload::Api(body));
    }

    #[derive(Default)]
    struct RecordingPosts {
        received: Mutex<Vec<usize>>,
    }

    impl PostsListener for RecordingPosts {
        fn on_posts_received(&self, posts: Vec<Post>, _page: PageMeta) {
            self.received.lock().unwrap().push(posts.len());
        }
    }

    #[test]
    fn dispatch_invokes_exactly_one_listener() {
        let listener = Arc::new(RecordingPosts::default());
        let recipient = Recipient::Posts(listener.clone());
        let payload = decode(recipient.kind(), &posts_body()).unwrap();

        dispatch(&recipient, payload);

        assert_eq!(listener.received.lock().unwrap().as_slice(), &[2]);
    }

    #[test]
    fn mismatched_payloads_invoke_nothing() {
        let listener = Arc::new(RecordingPosts::default());
        let recipient = Recipient::Posts(listener.clone());

        dispatch(&recipient, Payload::Api(json!({})));

        assert!(listener.received.lock().unwrap().is_empty());
    }
}
