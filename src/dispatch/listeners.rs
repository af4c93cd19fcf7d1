//! Listener traits for response delivery, one trait per response family.
//!
//! Every issued request owns the listener it will deliver to, and a
//! dispatch invokes exactly one method on exactly one listener. Failures of
//! any kind (transport, remote rejection, decode) go to
//! [`ConnectionListener`]; the entity listener stays silent for them.

use serde_json::Value;

use crate::dispatch::PageMeta;
use crate::error::Error;
use crate::model::{Category, Comment, CommentAck, CustomField, FieldAck, Post};

pub trait PostsListener: Send + Sync {
    fn on_posts_received(&self, posts: Vec<Post>, page: PageMeta);
}

pub trait PostListener: Send + Sync {
    fn on_post_received(&self, post: Post);
}

pub trait CreatePostListener: Send + Sync {
    fn on_post_created(&self, post: Post);
}

pub trait CommentsListener: Send + Sync {
    /// `page` is present only when the endpoint paginates comments.
    fn on_comments_received(&self, comments: Vec<Comment>, page: Option<PageMeta>);
}

pub trait CommentSubmittedListener: Send + Sync {
    fn on_comment_submitted(&self, ack: CommentAck);
}

pub trait CategoriesListener: Send + Sync {
    fn on_categories_received(&self, categories: Vec<Category>, page: Option<PageMeta>);
}

/// Custom-field reads and writes share one listener; key-only and
/// value-only reads arrive as fields with the other half empty.
pub trait CustomFieldsListener: Send + Sync {
    fn on_custom_fields_received(&self, fields: Vec<CustomField>);
    fn on_custom_field_written(&self, _ack: FieldAck) {}
}

/// Raw pass-through responses for custom controllers.
pub trait ApiListener: Send + Sync {
    fn on_api_response(&self, body: Value);
}

/// The failure channel shared by every operation.
pub trait ConnectionListener: Send + Sync {
    fn on_connection_failure(&self, error: &Error);
}
