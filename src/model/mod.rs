//! Domain entities decoded from API responses, plus outbound payloads for
//! content-creating calls.
//!
//! Inbound types are lenient on purpose: only the `id` is required and every
//! other field falls back to its default, because deployments prune response
//! fields per request. A present-but-mistyped field still fails the decode
//! rather than producing a partially populated entity.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A post or page as returned by the content endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(rename = "type", default)]
    pub post_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub custom_fields: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent: u64,
    #[serde(default)]
    pub post_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub post_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent: u64,
}

/// One custom field attached to a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub key: String,
    pub value: String,
}

impl CustomField {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Acknowledgement for a submitted comment. `pending` is set when the
/// server holds the comment for moderation instead of publishing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentAck {
    pub id: Option<u64>,
    pub pending: bool,
}

/// Acknowledgement for a custom-field write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldAck {
    pub id: Option<u64>,
}

/// A local file to upload alongside a created post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Multipart field name the server expects.
    pub field: String,
    pub file_name: String,
    pub path: PathBuf,
}

impl Attachment {
    #[must_use]
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            path,
        }
    }
}

/// Outbound payload for post creation and updates.
#[derive(Clone, Debug, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    /// Publication status sent to the server, `publish` unless overridden.
    pub status: String,
    /// Category slugs, joined with commas on the wire.
    pub categories: Vec<String>,
    /// Tag slugs, joined with commas on the wire.
    pub tags: Vec<String>,
    pub attachment: Option<Attachment>,
}

impl NewPost {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            status: "publish".to_string(),
            categories: Vec::new(),
            tags: Vec::new(),
            attachment: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Outbound payload for comment submission.
#[derive(Clone, Debug)]
pub struct NewComment {
    pub post_id: u64,
    pub name: String,
    pub email: String,
    pub url: Option<String>,
    pub content: String,
}

impl NewComment {
    #[must_use]
    pub fn new(
        post_id: u64,
        name: impl Into<String>,
        email: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            post_id,
            name: name.into(),
            email: email.into(),
            url: None,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_decodes_with_only_an_id() {
        let post: Post = serde_json::from_value(json!({"id": 7})).expect("Failed to deserialize");
        assert_eq!(post.id, 7);
        assert_eq!(post.title, "");
        assert!(post.categories.is_empty());
        assert!(post.author.is_none());
    }

    #[test]
    fn post_requires_an_id() {
        let result: Result<Post, _> = serde_json::from_value(json!({"title": "no id"}));
        assert!(result.is_err());
    }

    #[test]
    fn post_rejects_mistyped_id() {
        let result: Result<Post, _> = serde_json::from_value(json!({"id": "seven"}));
        assert!(result.is_err());
    }

    #[test]
    fn post_maps_the_type_field() {
        let post: Post = serde_json::from_value(json!({"id": 1, "type": "recipe"}))
            .expect("Failed to deserialize");
        assert_eq!(post.post_type, "recipe");
    }

    #[test]
    fn comment_decodes_nested_fields() {
        let comment: Comment = serde_json::from_value(json!({
            "id": 3,
            "name": "reader",
            "content": "nice post",
            "parent": 0
        }))
        .expect("Failed to deserialize");
        assert_eq!(comment.id, 3);
        assert_eq!(comment.name, "reader");
    }

    #[test]
    fn new_post_defaults_to_publish() {
        let post = NewPost::new("title", "body");
        assert_eq!(post.status, "publish");
        assert!(post.attachment.is_none());
    }
}
