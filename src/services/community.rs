use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{bool_field, field, i64_field, items, payload, shape_error, str_field};
use crate::error::Error;
use crate::pipeline::{ApiClient, ApiRequest, Transport, member_header};
use crate::types::{CommentId, PostId, UserId};

const PATH: &str = "/community/posts";
const COMMENTS_PATH: &str = "/community/ments";
const ANONYMOUS_NICKNAME: &str = "익명";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Author {
    pub member_id: Option<UserId>,
    pub nick_name: String,
    pub avatar: Option<String>,
}

/// Community post in one consistent shape, whatever the endpoint returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct Post {
    pub post_id: PostId,
    pub category: Option<String>,
    pub title: String,
    pub content: String,
    pub likes: i64,
    pub liked: Option<bool>,
    pub comment_count: i64,
    pub author: Author,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total: u64,
}

/// Comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct Comment {
    pub comment_id: CommentId,
    pub post_id: Option<PostId>,
    pub content: String,
    pub author: Author,
    pub created_at: Option<String>,
}

/// Title, body and category of a post being written or edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_key: Option<String>,
}

impl PostDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category_key: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category_key: impl Into<String>) -> Self {
        self.category_key = Some(category_key.into());
        self
    }
}

/// Result of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub like_count: i64,
    pub liked: Option<bool>,
}

const NICKNAME_KEYS: &[&str] = &["nickName", "nickname", "memberNickname", "writerNickname"];
const MEMBER_KEYS: &[&str] = &["memberNoLogin", "memberId", "userId", "writerId"];
const AVATAR_KEYS: &[&str] = &["memberImg", "pic", "profileImage", "writerPic"];

fn normalize_author(raw: &JsonValue) -> Author {
    // Either nested under `writer` or flattened onto the post.
    let source = field(raw, &["writer", "author"])
        .filter(|w| w.is_object())
        .unwrap_or(raw);
    Author {
        member_id: i64_field(source, MEMBER_KEYS).map(UserId),
        nick_name: str_field(source, NICKNAME_KEYS).unwrap_or_default(),
        avatar: str_field(source, AVATAR_KEYS),
    }
}

/// Normalize one post payload. Posts without an id are skipped.
#[must_use]
pub fn normalize_post(raw: &JsonValue) -> Option<Post> {
    let post_id = i64_field(raw, &["postId", "id"])?;
    let comment_count = i64_field(raw, &["commentCount", "comments"])
        .or_else(|| {
            raw.get("comments")
                .and_then(JsonValue::as_array)
                .map(|c| c.len() as i64)
        })
        .unwrap_or(0);
    Some(Post {
        post_id: PostId(post_id),
        category: str_field(raw, &["category", "categoryKey"]),
        title: str_field(raw, &["title"]).unwrap_or_default(),
        content: str_field(raw, &["content", "body"]).unwrap_or_default(),
        likes: i64_field(raw, &["likes", "like", "likeCount"]).unwrap_or(0),
        liked: bool_field(raw, &["liked", "isLiked"]),
        comment_count,
        author: normalize_author(raw),
        created_at: str_field(raw, &["createdAt", "created_at", "regDate"]),
    })
}

/// Normalize one comment payload. Comments without an id are skipped.
#[must_use]
pub fn normalize_comment(raw: &JsonValue) -> Option<Comment> {
    let comment_id = i64_field(raw, &["commentId", "mentId", "id"])?;
    Some(Comment {
        comment_id: CommentId(comment_id),
        post_id: i64_field(raw, &["postId"]).map(PostId),
        content: str_field(raw, &["content", "ment"]).unwrap_or_default(),
        author: normalize_author(raw),
        created_at: str_field(raw, &["createdAt", "created_at", "regDate"]),
    })
}

/// Normalize a list response: bare array or `{ content, totalElements }`.
#[must_use]
pub fn normalize_page(raw: &JsonValue) -> PostPage {
    let raw = payload(raw);
    let posts: Vec<Post> = items(raw).iter().filter_map(normalize_post).collect();
    let total = raw
        .get("totalElements")
        .and_then(JsonValue::as_u64)
        .unwrap_or(posts.len() as u64);
    PostPage { posts, total }
}

/// One page of posts. `page` is zero-based.
///
/// # Errors
///
/// Pipeline errors.
pub async fn fetch_posts<T: Transport>(
    client: &ApiClient<T>,
    page: u32,
    size: u32,
    category: Option<&str>,
) -> Result<PostPage, Error> {
    let mut request = ApiRequest::get(PATH)
        .with_query("page", page)
        .with_query("size", size);
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        request = request.with_query("categoryKey", category);
    }
    let body: JsonValue = client.send_json(&request).await?;
    Ok(normalize_page(&body))
}

/// # Errors
///
/// Pipeline errors, or [`Error::Decode`] if the payload is not a post.
pub async fn fetch_post<T: Transport>(client: &ApiClient<T>, id: PostId) -> Result<Post, Error> {
    let body: JsonValue = client.send_json(&ApiRequest::get(format!("{PATH}/{id}"))).await?;
    normalize_post(payload(&body)).ok_or_else(|| shape_error("post payload without id"))
}

/// # Errors
///
/// Pipeline errors.
pub async fn delete_post<T: Transport>(client: &ApiClient<T>, id: PostId) -> Result<(), Error> {
    client
        .send(&ApiRequest::delete(format!("{PATH}/{id}")))
        .await
        .map(|_| ())
}

/// Toggle the signed-in user's like on a post.
///
/// # Errors
///
/// Pipeline errors.
pub async fn toggle_like<T: Transport>(
    client: &ApiClient<T>,
    id: PostId,
) -> Result<LikeState, Error> {
    let (name, value) = member_header(client.session().current_user_id());
    let request = ApiRequest::post(format!("{PATH}/{id}/likes/toggle")).with_header(name, value);
    let body = client.send(&request).await?.value()?;
    let body = payload(&body);
    Ok(LikeState {
        like_count: i64_field(body, &["likeCount", "likes"]).unwrap_or(0),
        liked: bool_field(body, &["liked"]),
    })
}

/// Create a post. Identity is injected by the gateway from the credentials.
///
/// Returns the created post when the backend echoes one.
///
/// # Errors
///
/// Pipeline errors.
pub async fn create_post<T: Transport>(
    client: &ApiClient<T>,
    draft: &PostDraft,
) -> Result<Option<Post>, Error> {
    let request = ApiRequest::post(PATH).with_json(draft)?;
    let body = client.send(&request).await?.value()?;
    Ok(normalize_post(payload(&body)))
}

/// Replace the title, body and category of post `id`.
///
/// # Errors
///
/// Pipeline errors.
pub async fn update_post<T: Transport>(
    client: &ApiClient<T>,
    id: PostId,
    draft: &PostDraft,
) -> Result<Option<Post>, Error> {
    let request = ApiRequest::put(format!("{PATH}/{id}")).with_json(draft)?;
    let body = client.send(&request).await?.value()?;
    Ok(normalize_post(payload(&body)))
}

/// Comments on post `id`, in backend order.
///
/// # Errors
///
/// Pipeline errors.
pub async fn fetch_comments<T: Transport>(
    client: &ApiClient<T>,
    id: PostId,
) -> Result<Vec<Comment>, Error> {
    let body: JsonValue = client
        .send_json(&ApiRequest::get(format!("{PATH}/{id}/ments")))
        .await?;
    Ok(items(payload(&body))
        .iter()
        .filter_map(normalize_comment)
        .collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewComment<'a> {
    content: &'a str,
    nick_name: &'a str,
}

/// Comment on post `id` as the signed-in user.
///
/// The nickname travels in the body since header values must be ASCII. Returns
/// the created comment when the backend echoes one.
///
/// # Errors
///
/// Pipeline errors.
pub async fn create_comment<T: Transport>(
    client: &ApiClient<T>,
    id: PostId,
    content: &str,
    nick_name: &str,
) -> Result<Option<Comment>, Error> {
    let (name, value) = member_header(client.session().current_user_id());
    let request = ApiRequest::post(format!("{PATH}/{id}/ments"))
        .with_header(name, value)
        .with_json(&NewComment { content, nick_name })?;
    let body = client.send(&request).await?.value()?;
    Ok(normalize_comment(payload(&body)))
}

/// # Errors
///
/// Pipeline errors.
pub async fn delete_comment<T: Transport>(
    client: &ApiClient<T>,
    id: CommentId,
) -> Result<(), Error> {
    let (name, value) = member_header(client.session().current_user_id());
    let request = ApiRequest::delete(format!("{COMMENTS_PATH}/{id}")).with_header(name, value);
    client.send(&request).await.map(|_| ())
}

/// Cached page of posts, the post currently opened, and comments per post.
#[derive(Debug, Default)]
pub struct CommunityBoard {
    page: PostPage,
    selected: Option<Post>,
    comments: HashMap<PostId, Vec<Comment>>,
}

impl CommunityBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.page.posts
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.page.total
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Post> {
        self.selected.as_ref()
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Post> + 'a {
        self.page
            .posts
            .iter()
            .filter(move |p| p.category.as_deref() == Some(category))
    }

    /// # Errors
    ///
    /// Pipeline errors. The cached page is kept on failure.
    pub async fn load<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        page: u32,
        size: u32,
        category: Option<&str>,
    ) -> Result<(), Error> {
        self.page = fetch_posts(client, page, size, category).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Pipeline errors.
    pub async fn open<T: Transport>(&mut self, client: &ApiClient<T>, id: PostId) -> Result<&Post, Error> {
        let post = fetch_post(client, id).await?;
        Ok(&*self.selected.insert(post))
    }

    /// Delete a post and drop it from the cache once the backend confirms.
    ///
    /// # Errors
    ///
    /// Pipeline errors. The cache is unchanged on failure.
    pub async fn remove<T: Transport>(&mut self, client: &ApiClient<T>, id: PostId) -> Result<(), Error> {
        delete_post(client, id).await?;
        let before = self.page.posts.len();
        self.page.posts.retain(|p| p.post_id != id);
        if self.page.posts.len() < before {
            self.page.total = self.page.total.saturating_sub(1);
        }
        if self.selected.as_ref().is_some_and(|p| p.post_id == id) {
            self.selected = None;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Pipeline errors.
    pub async fn toggle_like<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        id: PostId,
    ) -> Result<LikeState, Error> {
        let state = toggle_like(client, id).await?;
        self.apply_like(id, state);
        Ok(state)
    }

    /// Cached comments on post `id`, newest additions first.
    #[must_use]
    pub fn comments(&self, id: PostId) -> &[Comment] {
        self.comments.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn comment_count(&self, id: PostId) -> usize {
        self.comments(id).len()
    }

    /// Reload the comments on post `id`.
    ///
    /// # Errors
    ///
    /// Pipeline errors. The cached list for the post is emptied on failure.
    pub async fn load_comments<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        id: PostId,
    ) -> Result<&[Comment], Error> {
        let loaded = fetch_comments(client, id).await;
        let list = self.comments.entry(id).or_default();
        match loaded {
            Ok(comments) => {
                *list = comments;
                Ok(list.as_slice())
            }
            Err(e) => {
                list.clear();
                Err(e)
            }
        }
    }

    /// Comment on post `id` and put the new comment first in the cache.
    ///
    /// `nick_name` defaults to the signed-in user's nickname, or `익명` when
    /// anonymous. When the backend does not echo the comment the list is
    /// reloaded instead.
    ///
    /// # Errors
    ///
    /// Pipeline errors. The cache is unchanged if the comment was not created.
    pub async fn add_comment<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        id: PostId,
        content: &str,
        nick_name: Option<&str>,
    ) -> Result<(), Error> {
        let session_nick = client
            .session()
            .snapshot()
            .signed_user
            .map(|u| u.nick_name)
            .filter(|n| !n.is_empty());
        let nick_name = nick_name
            .or(session_nick.as_deref())
            .unwrap_or(ANONYMOUS_NICKNAME);

        match create_comment(client, id, content, nick_name).await? {
            Some(comment) => self.comments.entry(id).or_default().insert(0, comment),
            None => {
                self.load_comments(client, id).await?;
            }
        }
        Ok(())
    }

    /// Delete a comment and drop it from post `id`'s cache once the backend confirms.
    ///
    /// # Errors
    ///
    /// Pipeline errors. The cache is unchanged on failure.
    pub async fn remove_comment<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        id: PostId,
        comment_id: CommentId,
    ) -> Result<(), Error> {
        delete_comment(client, comment_id).await?;
        if let Some(list) = self.comments.get_mut(&id) {
            list.retain(|c| c.comment_id != comment_id);
        }
        Ok(())
    }

    /// Create a post, then reload the first page of the board.
    ///
    /// # Errors
    ///
    /// Pipeline errors.
    pub async fn publish<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        draft: &PostDraft,
        size: u32,
    ) -> Result<Option<Post>, Error> {
        let created = create_post(client, draft).await?;
        self.load(client, 0, size, None).await?;
        Ok(created)
    }

    /// Edit post `id` and refresh its cached copies with the result.
    ///
    /// # Errors
    ///
    /// Pipeline errors.
    pub async fn edit<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        id: PostId,
        draft: &PostDraft,
    ) -> Result<(), Error> {
        let updated = update_post(client, id, draft).await?;
        let cached = self.page.posts.iter_mut().chain(self.selected.as_mut());
        for post in cached.filter(|p| p.post_id == id) {
            match &updated {
                Some(fresh) => *post = fresh.clone(),
                None => {
                    post.title.clone_from(&draft.title);
                    post.content.clone_from(&draft.content);
                    if draft.category_key.is_some() {
                        post.category.clone_from(&draft.category_key);
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply a like result to the cached copies of post `id`.
    pub fn apply_like(&mut self, id: PostId, state: LikeState) {
        let cached = self.page.posts.iter_mut().chain(self.selected.as_mut());
        for post in cached.filter(|p| p.post_id == id) {
            post.likes = state.like_count;
            if state.liked.is_some() {
                post.liked = state.liked;
            }
        }
    }
}
