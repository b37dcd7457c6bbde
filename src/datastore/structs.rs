use bytes::Bytes;
use chrono::offset::Utc;
use serde::{Deserialize, Serialize};

/// A single blog entry. Field order matches the persisted document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Post {
    pub id: u64,
    pub title: String,
    /// Name of the image file in the upload directory.
    pub image: String,
    pub content: String,
    pub comments: Vec<String>,
    /// ISO-8601 creation timestamp. Set once, never mutated. Stored as a string so a document
    /// written by hand (or by an older version) round-trips untouched.
    pub date: String,
    pub likes: u64,
    pub ratings: Vec<i64>,
    pub average_rating: f64,
}

impl Post {
    /// Append a rating and recompute the average, keeping `average_rating` consistent with
    /// `ratings`.
    pub fn add_rating(&mut self, rating: i64) {
        self.ratings.push(rating);
        let sum: i64 = self.ratings.iter().sum();
        self.average_rating = sum as f64 / self.ratings.len() as f64;
    }
}

/// The full ordered set of posts. This is the unit of persistence: every mutation loads the
/// whole list and writes the whole list back.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PostList {
    pub posts: Vec<Post>,
}

impl PostList {
    pub fn find_mut(&mut self, post_id: u64) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == post_id)
    }

    /// The id for the next created post: one past the highest surviving id (1 when empty).
    /// For a collection that has never seen a deletion this equals `len + 1`; after deletions
    /// it never collides with a surviving post, though the id of a deleted post can come back.
    pub fn next_id(&self) -> u64 {
        self.posts.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }
}

/// Everything the client supplies when creating a post. The id and date are assigned by the
/// store.
#[derive(Clone, Debug)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    /// Filename the image will be stored under, as uploaded. A second upload with the same
    /// name overwrites the first.
    pub image_name: String,
    pub image_bytes: Bytes,
}

impl NewPost {
    pub fn into_post(self, id: u64) -> Post {
        Post {
            id,
            title: self.title,
            image: self.image_name,
            content: self.content,
            comments: Vec::new(),
            date: Utc::now().to_rfc3339(),
            likes: 0,
            ratings: Vec::new(),
            average_rating: 0.0,
        }
    }
}

#[cfg(test)]
mod post_tests {
    use super::*;
    use serde_json::json;

    fn new_post() -> NewPost {
        NewPost {
            title: "First post".to_owned(),
            content: "Hello from the blog".to_owned(),
            image_name: "first.png".to_owned(),
            image_bytes: Bytes::from_static(b"png bytes"),
        }
    }

    #[test]
    fn test_fresh_post_shape() {
        let post = new_post().into_post(1);
        assert_eq!(post.id, 1);
        assert_eq!(post.likes, 0);
        assert!(post.comments.is_empty());
        assert!(post.ratings.is_empty());
        assert_eq!(post.average_rating, 0.0);
        assert!(chrono::DateTime::parse_from_rfc3339(&post.date).is_ok());
    }

    #[test]
    fn test_average_tracks_every_rating() {
        let mut post = new_post().into_post(1);
        let ratings = [4_i64, 2, 3, 5];
        let mut sum = 0;
        for (k, &r) in ratings.iter().enumerate() {
            post.add_rating(r);
            sum += r;
            assert_eq!(post.average_rating, sum as f64 / (k + 1) as f64);
        }
        assert_eq!(post.ratings, ratings);
    }

    #[test]
    fn test_next_id_skips_surviving_ids() {
        let mut list = PostList::default();
        assert_eq!(list.next_id(), 1);
        for id in 1..=3 {
            list.posts.push(new_post().into_post(id));
        }
        // Deleting post 2 leaves ids 1 and 3; the next id must not collide with 3.
        list.posts.retain(|p| p.id != 2);
        assert_eq!(list.next_id(), 4);
    }

    #[test]
    fn test_document_layout() {
        let mut post = new_post().into_post(1);
        post.date = "2024-01-02T03:04:05+00:00".to_owned();
        post.comments.push("nice".to_owned());
        post.add_rating(4);
        let doc = serde_json::to_value(&PostList { posts: vec![post] }).unwrap();
        assert_eq!(
            doc,
            json!({
                "posts": [{
                    "id": 1,
                    "title": "First post",
                    "image": "first.png",
                    "content": "Hello from the blog",
                    "comments": ["nice"],
                    "date": "2024-01-02T03:04:05+00:00",
                    "likes": 0,
                    "ratings": [4],
                    "average_rating": 4.0,
                }]
            })
        );
    }
}
