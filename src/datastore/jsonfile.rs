use crate::datastore::{
    invalid_comment_index, post_not_found,
    structs::{NewPost, Post, PostList},
    PostStore,
};
use crate::twoface::{Cause, Describe, DescribeErr, ExternalError, Fallible, TfError};
use actix_web::error::BlockingError;
use actix_web::web::block;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use prometheus::{
    core::{Collector, Desc},
    proto::MetricFamily,
    IntGauge, Opts,
};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// An implementation of datastore::PostStore backed by a single JSON document on local disk.
///
/// Every operation loads the whole document, mutates it in memory, and writes the whole
/// document back. That's O(collection size) per request, which is fine at personal-blog scale
/// and keeps the on-disk format hand-editable.
#[derive(Clone)]
pub struct JsonFileStore {
    data_file: Arc<PathBuf>,
    upload_dir: Arc<PathBuf>,
    /// Serializes every load-mutate-save cycle. Without it, two concurrent mutations would
    /// both load the same document and the slower save would overwrite the faster one.
    write_lock: Arc<Mutex<()>>,
    posts: IntGauge,
}

impl JsonFileStore {
    /// Opens the store, creating the upload directory and an empty document if they don't
    /// exist yet.
    pub fn new(data_file: PathBuf, upload_dir: PathBuf) -> Result<Self, anyhow::Error> {
        fs::create_dir_all(&upload_dir).context("couldn't create the upload directory")?;
        if !data_file.exists() {
            let empty = serde_json::to_string_pretty(&PostList::default())?;
            fs::write(&data_file, empty).context("couldn't seed the post document")?;
        }
        let posts = IntGauge::with_opts(Opts::new(
            "plume_posts",
            "How many posts the store currently holds",
        ))?;
        Ok(Self {
            data_file: Arc::new(data_file),
            upload_dir: Arc::new(upload_dir),
            write_lock: Arc::new(Mutex::new(())),
            posts,
        })
    }

    fn guard(&self) -> Fallible<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| {
            anyhow!("write lock poisoned").describe(ExternalError {
                cause: Cause::StorageWrite,
                text: "post store is unavailable",
            })
        })
    }

    /// Read and validate the whole document. Serde enforces the schema: a missing or
    /// mistyped field is a StorageRead error, not a crash later on.
    fn load_all(&self) -> Fallible<PostList> {
        let contents = fs::read_to_string(self.data_file.as_ref()).describe_err(ExternalError {
            cause: Cause::StorageRead,
            text: "couldn't read post data",
        })?;
        serde_json::from_str(&contents).describe_err(ExternalError {
            cause: Cause::StorageRead,
            text: "post data is malformed",
        })
    }

    /// Overwrite the whole document in place. Writes are pretty-printed so the file stays
    /// hand-editable.
    fn save_all(&self, list: &PostList) -> Fallible<()> {
        let contents = serde_json::to_string_pretty(list).describe_err(ExternalError {
            cause: Cause::StorageWrite,
            text: "couldn't serialize post data",
        })?;
        fs::write(self.data_file.as_ref(), contents).describe_err(ExternalError {
            cause: Cause::StorageWrite,
            text: "couldn't write post data",
        })?;
        self.posts.set(list.posts.len() as i64);
        Ok(())
    }

    /// Run one load-mutate-save cycle on the blocking threadpool, holding the write lock for
    /// the whole cycle. Validation failures inside `op` happen before the save, so the
    /// document on disk is untouched.
    async fn mutate<F, R>(&self, op: F) -> Fallible<R>
    where
        F: FnOnce(&mut PostList) -> Fallible<R> + Send + 'static,
        R: Send + 'static,
    {
        let this = self.clone();
        block(move || {
            let _guard = this.guard()?;
            let mut list = this.load_all()?;
            let out = op(&mut list)?;
            this.save_all(&list)?;
            Ok::<R, TfError>(out)
        })
        .await
        .to_resp()
    }
}

#[async_trait]
impl PostStore for JsonFileStore {
    async fn list_posts(&self) -> Fallible<PostList> {
        let this = self.clone();
        block(move || this.load_all()).await.to_resp()
    }

    async fn create_post(&self, new_post: NewPost) -> Fallible<Post> {
        let this = self.clone();
        block(move || {
            let _guard = this.guard()?;
            let mut list = this.load_all()?;

            // Store the image first. Same-named uploads overwrite each other.
            let image_path = this.upload_dir.join(&new_post.image_name);
            fs::write(&image_path, &new_post.image_bytes).describe_err(ExternalError {
                cause: Cause::StorageWrite,
                text: "couldn't store the uploaded image",
            })?;

            let post = new_post.into_post(list.next_id());
            list.posts.push(post.clone());
            this.save_all(&list)?;
            Ok::<Post, TfError>(post)
        })
        .await
        .to_resp()
    }

    async fn delete_post(&self, post_id: u64) -> Fallible<Post> {
        self.mutate(move |list| {
            guard!(let Some(position) = list.posts.iter().position(|p| p.id == post_id) else {
                return Err(post_not_found(post_id));
            });
            Ok(list.posts.remove(position))
        })
        .await
    }

    async fn add_comment(&self, post_id: u64, comment: String) -> Fallible<()> {
        self.mutate(move |list| {
            guard!(let Some(post) = list.find_mut(post_id) else {
                return Err(post_not_found(post_id));
            });
            post.comments.push(comment);
            Ok(())
        })
        .await
    }

    async fn delete_comment(&self, post_id: u64, index: usize) -> Fallible<()> {
        self.mutate(move |list| {
            guard!(let Some(post) = list.find_mut(post_id) else {
                return Err(post_not_found(post_id));
            });
            if index >= post.comments.len() {
                return Err(invalid_comment_index(index, post.comments.len()));
            }
            post.comments.remove(index);
            Ok(())
        })
        .await
    }

    async fn add_like(&self, post_id: u64) -> Fallible<u64> {
        self.mutate(move |list| {
            guard!(let Some(post) = list.find_mut(post_id) else {
                return Err(post_not_found(post_id));
            });
            post.likes += 1;
            Ok(post.likes)
        })
        .await
    }

    async fn add_rating(&self, post_id: u64, rating: i64) -> Fallible<f64> {
        self.mutate(move |list| {
            guard!(let Some(post) = list.find_mut(post_id) else {
                return Err(post_not_found(post_id));
            });
            post.add_rating(rating);
            Ok(post.average_rating)
        })
        .await
    }
}

impl Collector for JsonFileStore {
    fn desc(&self) -> Vec<&Desc> {
        self.posts.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        // Refresh from disk on scrape; keep the last value if the document is unreadable.
        if let Ok(list) = self.load_all() {
            self.posts.set(list.posts.len() as i64);
        }
        self.posts.collect()
    }
}

/// Convenience extension used to extract errors from `web::block`.
pub trait BlockingResp<T> {
    /// Convert the return from a web::block into a normal `Fallible<T>`.
    fn to_resp(self) -> Fallible<T>;
}

impl<T, I: std::fmt::Debug + Into<TfError>> BlockingResp<T> for Result<T, BlockingError<I>> {
    fn to_resp(self) -> Fallible<T> {
        match self {
            Ok(t) => Ok(t),
            Err(BlockingError::Error(err)) => Err(err.into()),
            Err(BlockingError::Canceled) => Err(TfError {
                internal: anyhow!("store operation cancelled"),
                external: ExternalError::default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("data.json"), dir.path().join("uploads")).unwrap()
    }

    fn new_post(n: u32) -> NewPost {
        NewPost {
            title: format!("Post {}", n),
            content: format!("Contents of post {}", n),
            image_name: format!("img-{}.png", n),
            image_bytes: Bytes::from(format!("bytes of img-{}", n).into_bytes()),
        }
    }

    #[actix_rt::test]
    async fn test_create_assigns_ids_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let first = store.create_post(new_post(1)).await.unwrap();
        let second = store.create_post(new_post(2)).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(first.likes, 0);
        assert_eq!(first.average_rating, 0.0);
        assert!(first.comments.is_empty());
        assert!(first.ratings.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&first.date).is_ok());

        // The image bytes landed in the upload directory under the uploaded name.
        let on_disk = fs::read(dir.path().join("uploads").join(&first.image)).unwrap();
        assert_eq!(on_disk, b"bytes of img-1");
    }

    #[actix_rt::test]
    async fn test_rating_average_after_every_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create_post(new_post(1)).await.unwrap();

        assert_eq!(store.add_rating(1, 4).await.unwrap(), 4.0);
        assert_eq!(store.add_rating(1, 2).await.unwrap(), 3.0);
        assert_eq!(store.add_rating(1, 3).await.unwrap(), 3.0);

        let list = store.list_posts().await.unwrap();
        assert_eq!(list.posts[0].ratings, vec![4, 2, 3]);
        assert_eq!(list.posts[0].average_rating, 3.0);

        let err = store.add_rating(99, 5).await.unwrap_err();
        assert!(matches!(err.external.cause, Cause::NotFound));
    }

    #[actix_rt::test]
    async fn test_comment_append_and_index_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create_post(new_post(1)).await.unwrap();

        store.add_comment(1, "a".to_owned()).await.unwrap();
        store.add_comment(1, "b".to_owned()).await.unwrap();
        let list = store.list_posts().await.unwrap();
        assert_eq!(list.posts[0].comments, vec!["a", "b"]);

        store.delete_comment(1, 0).await.unwrap();
        let list = store.list_posts().await.unwrap();
        assert_eq!(list.posts[0].comments, vec!["b"]);

        // An out-of-range index fails and leaves the document untouched.
        let err = store.delete_comment(1, 5).await.unwrap_err();
        assert!(matches!(err.external.cause, Cause::UserActionInvalid));
        let list = store.list_posts().await.unwrap();
        assert_eq!(list.posts[0].comments, vec!["b"]);

        let err = store.add_comment(99, "c".to_owned()).await.unwrap_err();
        assert!(matches!(err.external.cause, Cause::NotFound));
    }

    #[actix_rt::test]
    async fn test_delete_post_leaves_others_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for n in 1..=3 {
            store.create_post(new_post(n)).await.unwrap();
        }

        let removed = store.delete_post(2).await.unwrap();
        assert_eq!(removed.id, 2);
        let list = store.list_posts().await.unwrap();
        let ids: Vec<u64> = list.posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(list.posts[0].title, "Post 1");
        assert_eq!(list.posts[1].title, "Post 3");

        let err = store.delete_post(2).await.unwrap_err();
        assert!(matches!(err.external.cause, Cause::NotFound));

        // The next post skips past the highest surviving id.
        let next = store.create_post(new_post(4)).await.unwrap();
        assert_eq!(next.id, 4);

        // The deleted post's image is left on disk.
        assert!(dir.path().join("uploads").join("img-2.png").exists());
    }

    #[actix_rt::test]
    async fn test_load_save_round_trip_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create_post(new_post(1)).await.unwrap();
        store.create_post(new_post(2)).await.unwrap();
        store.add_comment(1, "hello".to_owned()).await.unwrap();
        store.add_rating(2, 5).await.unwrap();

        let on_disk: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("data.json")).unwrap())
                .unwrap();
        let loaded = serde_json::to_value(&store.list_posts().await.unwrap()).unwrap();
        assert_eq!(on_disk, loaded);
    }

    #[actix_rt::test]
    async fn test_concurrent_likes_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create_post(new_post(1)).await.unwrap();

        // Both cycles run under the write lock, so neither update is lost.
        let (a, b) = futures::join!(store.add_like(1), store.add_like(1));
        a.unwrap();
        b.unwrap();
        let list = store.list_posts().await.unwrap();
        assert_eq!(list.posts[0].likes, 2);
    }

    #[actix_rt::test]
    async fn test_malformed_document_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(dir.path().join("data.json"), "{\"posts\": [{\"id\": 1}]}").unwrap();
        let err = store.list_posts().await.unwrap_err();
        assert!(matches!(err.external.cause, Cause::StorageRead));

        fs::remove_file(dir.path().join("data.json")).unwrap();
        let err = store.list_posts().await.unwrap_err();
        assert!(matches!(err.external.cause, Cause::StorageRead));
    }
}
