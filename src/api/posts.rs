//! The CRUD surface of the blog: everything under `/posts`.
use crate::api::{observe, sanitize_filename, State};
use crate::datastore::structs::{NewPost, Post, PostList};
use crate::datastore::PostStore;
use crate::twoface::{Cause, Describe, DescribeErr, ExternalError, Fallible};
use actix_multipart::Multipart;
use actix_web::web;
use anyhow::anyhow;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

pub fn configure<DS: PostStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(list_posts::<DS>))
            .route(web::post().to(create_post::<DS>)),
    )
    .service(web::resource("/{post_id}").route(web::delete().to(delete_post::<DS>)))
    .service(web::resource("/{post_id}/comments").route(web::post().to(add_comment::<DS>)))
    .service(
        web::resource("/{post_id}/comments/{index}").route(web::delete().to(delete_comment::<DS>)),
    )
    .service(web::resource("/{post_id}/like").route(web::post().to(like_post::<DS>)))
    .service(web::resource("/{post_id}/rate").route(web::post().to(rate_post::<DS>)));
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: &str) -> web::Json<Self> {
        web::Json(Self {
            message: message.to_owned(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedPost {
    pub message: String,
    pub post: Post,
}

#[derive(Serialize, Deserialize)]
pub struct CommentBody {
    pub comment: String,
}

#[derive(Serialize, Deserialize)]
pub struct RatingBody {
    pub rating: i64,
}

async fn list_posts<DS: PostStore>(state: web::Data<State<DS>>) -> Fallible<web::Json<PostList>> {
    observe("list_posts", || async {
        Ok(web::Json(state.ds.list_posts().await?))
    })
    .await
}

async fn create_post<DS: PostStore>(
    state: web::Data<State<DS>>,
    payload: Multipart,
) -> Fallible<web::Json<CreatedPost>> {
    observe("create_post", || async {
        let new_post = read_post_form(payload).await?;
        let post = state.ds.create_post(new_post).await?;
        Ok(web::Json(CreatedPost {
            message: "Post created".to_owned(),
            post,
        }))
    })
    .await
}

async fn delete_post<DS: PostStore>(
    state: web::Data<State<DS>>,
    post_id: web::Path<u64>,
) -> Fallible<web::Json<Message>> {
    observe("delete_post", || async {
        state.ds.delete_post(*post_id).await?;
        Ok(Message::new("Post deleted"))
    })
    .await
}

async fn add_comment<DS: PostStore>(
    state: web::Data<State<DS>>,
    post_id: web::Path<u64>,
    body: web::Json<CommentBody>,
) -> Fallible<web::Json<Message>> {
    observe("add_comment", || async {
        state.ds.add_comment(*post_id, body.comment.clone()).await?;
        Ok(Message::new("Comment added"))
    })
    .await
}

async fn delete_comment<DS: PostStore>(
    state: web::Data<State<DS>>,
    path: web::Path<(u64, usize)>,
) -> Fallible<web::Json<Message>> {
    observe("delete_comment", || async {
        let (post_id, index) = *path;
        state.ds.delete_comment(post_id, index).await?;
        Ok(Message::new("Comment deleted"))
    })
    .await
}

async fn like_post<DS: PostStore>(
    state: web::Data<State<DS>>,
    post_id: web::Path<u64>,
) -> Fallible<web::Json<Message>> {
    observe("like_post", || async {
        state.ds.add_like(*post_id).await?;
        Ok(Message::new("Like added"))
    })
    .await
}

async fn rate_post<DS: PostStore>(
    state: web::Data<State<DS>>,
    post_id: web::Path<u64>,
    body: web::Json<RatingBody>,
) -> Fallible<web::Json<Message>> {
    observe("rate_post", || async {
        state.ds.add_rating(*post_id, body.rating).await?;
        Ok(Message::new("Post rated"))
    })
    .await
}

fn bad_form(text: &'static str) -> ExternalError {
    ExternalError {
        cause: Cause::UserActionInvalid,
        text,
    }
}

/// Pull `title`, `content` and the uploaded image out of a multipart form.
async fn read_post_form(mut payload: Multipart) -> Fallible<NewPost> {
    let mut title = None;
    let mut content = None;
    let mut image: Option<(String, Bytes)> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| anyhow!("multipart error: {}", e).describe(bad_form("invalid multipart form")))?
    {
        guard!(let Some(disposition) = field.content_disposition() else {
            continue;
        });
        let name = disposition.get_name().map(str::to_owned);
        let filename = disposition.get_filename().map(sanitize_filename);

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| anyhow!("multipart error: {}", e).describe(bad_form("invalid multipart form")))?;
            data.extend_from_slice(&chunk);
        }

        match name.as_deref() {
            Some("title") => title = Some(utf8_field(data)?),
            Some("content") => content = Some(utf8_field(data)?),
            Some("file") => {
                guard!(let Some(filename) = filename else {
                    return Err(anyhow!("file field has no filename")
                        .describe(bad_form("the file field needs a filename")));
                });
                image = Some((filename, data.freeze()));
            }
            _ => {}
        }
    }

    let (title, content, (image_name, image_bytes)) = match (title, content, image) {
        (Some(title), Some(content), Some(image)) => (title, content, image),
        _ => {
            return Err(anyhow!("multipart form is missing a field")
                .describe(bad_form("expected fields: title, content, file")))
        }
    };
    if title.is_empty() || content.is_empty() || image_name.is_empty() {
        return Err(anyhow!("empty title, content or filename")
            .describe(bad_form("title, content and filename must not be empty")));
    }
    Ok(NewPost {
        title,
        content,
        image_name,
        image_bytes,
    })
}

fn utf8_field(data: BytesMut) -> Fallible<String> {
    String::from_utf8(data.to_vec()).describe_err(bad_form("form fields must be UTF-8"))
}
