pub mod jsonfile;
#[cfg(test)]
pub mod mock;
pub mod structs;

use crate::datastore::structs::{NewPost, Post, PostList};
use crate::twoface::{Cause, Describe, ExternalError, Fallible, TfError};
use anyhow::anyhow;
use async_trait::async_trait;

#[async_trait]
/// The interface for storing post data.
pub trait PostStore: Clone {
    /// The whole collection, in insertion order.
    async fn list_posts(&self) -> Fallible<PostList>;
    /// Store the uploaded image, then append a new post to the collection. Returns the post
    /// as persisted (id and creation date assigned).
    async fn create_post(&self, new_post: NewPost) -> Fallible<Post>;
    /// Remove a post. The uploaded image stays on disk.
    async fn delete_post(&self, post_id: u64) -> Fallible<Post>;
    /// Append a comment to a post.
    async fn add_comment(&self, post_id: u64, comment: String) -> Fallible<()>;
    /// Remove the comment at `index`. The index must be within the post's comment list.
    async fn delete_comment(&self, post_id: u64, index: usize) -> Fallible<()>;
    /// Increment a post's like counter, returning the new count.
    async fn add_like(&self, post_id: u64) -> Fallible<u64>;
    /// Append a rating to a post, returning the recomputed average.
    async fn add_rating(&self, post_id: u64, rating: i64) -> Fallible<f64>;
}

pub(crate) fn post_not_found(post_id: u64) -> TfError {
    anyhow!("no post with id {}", post_id).describe(ExternalError {
        cause: Cause::NotFound,
        text: "post not found",
    })
}

pub(crate) fn invalid_comment_index(index: usize, num_comments: usize) -> TfError {
    anyhow!(
        "comment index {} out of range, post has {} comments",
        index,
        num_comments
    )
    .describe(ExternalError {
        cause: Cause::UserActionInvalid,
        text: "comment index out of range",
    })
}
