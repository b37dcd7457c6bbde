use crate::datastore::{
    invalid_comment_index, post_not_found,
    structs::{NewPost, Post, PostList},
    PostStore,
};
use crate::twoface::Fallible;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A mock implementation of datastore::PostStore, held entirely in memory. Lets handler tests
/// run without touching the filesystem.
#[derive(Clone, Default, Debug)]
pub struct Client {
    posts: Arc<Mutex<PostList>>,
}

impl Client {
    pub fn set_posts(&mut self, posts: Vec<Post>) {
        self.posts = Arc::new(Mutex::new(PostList { posts }));
    }
}

#[async_trait]
impl PostStore for Client {
    async fn list_posts(&self) -> Fallible<PostList> {
        Ok(self.posts.lock().unwrap().clone())
    }

    async fn create_post(&self, new_post: NewPost) -> Fallible<Post> {
        let mut list = self.posts.lock().unwrap();
        let post = new_post.into_post(list.next_id());
        list.posts.push(post.clone());
        Ok(post)
    }

    async fn delete_post(&self, post_id: u64) -> Fallible<Post> {
        let mut list = self.posts.lock().unwrap();
        guard!(let Some(position) = list.posts.iter().position(|p| p.id == post_id) else {
            return Err(post_not_found(post_id));
        });
        Ok(list.posts.remove(position))
    }

    async fn add_comment(&self, post_id: u64, comment: String) -> Fallible<()> {
        let mut list = self.posts.lock().unwrap();
        guard!(let Some(post) = list.find_mut(post_id) else {
            return Err(post_not_found(post_id));
        });
        post.comments.push(comment);
        Ok(())
    }

    async fn delete_comment(&self, post_id: u64, index: usize) -> Fallible<()> {
        let mut list = self.posts.lock().unwrap();
        guard!(let Some(post) = list.find_mut(post_id) else {
            return Err(post_not_found(post_id));
        });
        if index >= post.comments.len() {
            return Err(invalid_comment_index(index, post.comments.len()));
        }
        post.comments.remove(index);
        Ok(())
    }

    async fn add_like(&self, post_id: u64) -> Fallible<u64> {
        let mut list = self.posts.lock().unwrap();
        guard!(let Some(post) = list.find_mut(post_id) else {
            return Err(post_not_found(post_id));
        });
        post.likes += 1;
        Ok(post.likes)
    }

    async fn add_rating(&self, post_id: u64, rating: i64) -> Fallible<f64> {
        let mut list = self.posts.lock().unwrap();
        guard!(let Some(post) = list.find_mut(post_id) else {
            return Err(post_not_found(post_id));
        });
        post.add_rating(rating);
        Ok(post.average_rating)
    }
}
