use crate::{
    country::CountryClient,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        extract::{Json, Query},
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::{num::NonZeroU32, sync::Arc};
use time::Date;
use traveltales_common::model::{
    Id,
    comment::{Comment, CommentMarker, CreateComment},
    post::{CreatePost, EditPost, PostDetail, PostMarker, PostSummary, Reaction},
    query::{Page, PostFilter, PostSort},
    user::Username,
};
use traveltales_db::client::{DbClient, DbError};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(search_posts)
        .typed_get(feed)
        .typed_get(get_post)
        .typed_get(get_post_likes)
        .typed_get(get_post_comments)
        .typed_post(create_post)
        .typed_put(edit_post)
        .typed_delete(delete_post)
        .typed_post(set_reaction)
        .typed_delete(clear_reaction)
        .typed_post(create_comment)
        .typed_delete(delete_comment)
}

fn page_or_default(page: Option<NonZeroU32>, limit: Option<NonZeroU32>) -> Page {
    let default = Page::default();
    Page::new(page.unwrap_or(default.page), limit.unwrap_or(default.limit))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    country: Option<String>,
    username: Option<Username>,
    #[serde(default)]
    sort_by: PostSort,
    page: Option<NonZeroU32>,
    limit: Option<NonZeroU32>,
}

impl SearchParams {
    fn page(&self) -> Page {
        page_or_default(self.page, self.limit)
    }

    // Country and username are mutually exclusive filters; country wins
    // when a request supplies both.
    fn into_filter(self) -> PostFilter {
        match (self.country, self.username) {
            (Some(country), _) => PostFilter::Country(country),
            (None, Some(username)) => PostFilter::Author(username),
            (None, None) => PostFilter::All,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PageParams {
    page: Option<NonZeroU32>,
    limit: Option<NonZeroU32>,
}

impl PageParams {
    fn page(self) -> Page {
        page_or_default(self.page, self.limit)
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs/search", rejection(ServerError))]
struct SearchPath();

async fn search_posts(
    SearchPath(): SearchPath,
    State(db): State<Arc<DbClient>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PostSummary>>> {
    let page = params.page();
    let sort = params.sort_by;
    let posts = db.search_posts(&params.into_filter(), sort, page).await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs/feed", rejection(ServerError))]
struct FeedPath();

async fn feed(
    FeedPath(): FeedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<PostSummary>>> {
    let posts = db.feed_posts(user.user_id(), params.page()).await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<PostDetail>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs/{id}/likes", rejection(ServerError))]
struct GetPostLikesPath {
    id: Id<PostMarker>,
}

async fn get_post_likes(
    GetPostLikesPath { id }: GetPostLikesPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Reaction>>> {
    let reactions = db.fetch_reactions(id).await?;

    Ok(Json(reactions))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs/{id}/comments", rejection(ServerError))]
struct GetPostCommentsPath {
    id: Id<PostMarker>,
}

async fn get_post_comments(
    GetPostCommentsPath { id }: GetPostCommentsPath,
    State(db): State<Arc<DbClient>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<Comment>>> {
    let comments = db.fetch_comments(id, params.page()).await?;

    Ok(Json(comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs", rejection(ServerError))]
struct BlogsPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    title: String,
    content: String,
    country: String,
    date_of_visit: Date,
}

async fn create_post(
    BlogsPath(): BlogsPath,
    State(db): State<Arc<DbClient>>,
    State(country): State<Arc<CountryClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostDetail>)> {
    // Enrichment failure aborts the write; a post never lands with a
    // partial snapshot.
    let data = country.lookup(&request.country).await?;

    let id = db
        .create_post(&CreatePost {
            author: user.user_id(),
            title: request.title,
            content: request.content,
            country: request.country,
            date_of_visit: request.date_of_visit,
            snapshot: data.snapshot(),
        })
        .await?;

    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditPostRequest {
    post_id: Id<PostMarker>,
    title: String,
    content: String,
    country: String,
    date_of_visit: Date,
}

async fn edit_post(
    BlogsPath(): BlogsPath,
    State(db): State<Arc<DbClient>>,
    State(country): State<Arc<CountryClient>>,
    user: AuthenticatedUser,
    Json(request): Json<EditPostRequest>,
) -> Result<Json<PostDetail>> {
    let current = db
        .fetch_post(request.post_id)
        .await?
        .ok_or(ServerError::Unauthorized)?;

    // The stored snapshot stays put unless the country actually changed.
    let snapshot = if current.country == request.country {
        None
    } else {
        Some(country.lookup(&request.country).await?.snapshot())
    };

    let updated = db
        .edit_post(&EditPost {
            post: request.post_id,
            author: user.user_id(),
            title: request.title,
            content: request.content,
            country: request.country,
            date_of_visit: request.date_of_visit,
            snapshot,
        })
        .await?;
    if !updated {
        return Err(ServerError::Unauthorized);
    }

    let post = db
        .fetch_post(request.post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(request.post_id))?;

    Ok(Json(post))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletePostRequest {
    post_id: Id<PostMarker>,
}

async fn delete_post(
    BlogsPath(): BlogsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<DeletePostRequest>,
) -> Result<StatusCode> {
    let deleted = db.delete_post(request.post_id, user.user_id()).await?;
    if !deleted {
        return Err(ServerError::Unauthorized);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs/like", rejection(ServerError))]
struct LikePath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetReactionRequest {
    post_id: Id<PostMarker>,
    is_like: bool,
}

async fn set_reaction(
    LikePath(): LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<SetReactionRequest>,
) -> Result<StatusCode> {
    db.set_reaction(user.user_id(), request.post_id, request.is_like)
        .await
        .map_err(|err| match err {
            DbError::ForeignKeyViolation => ServerError::PostByIdNotFound(request.post_id),
            err => err.into(),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearReactionRequest {
    post_id: Id<PostMarker>,
}

async fn clear_reaction(
    LikePath(): LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<ClearReactionRequest>,
) -> Result<StatusCode> {
    db.clear_reaction(user.user_id(), request.post_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/blogs/comment", rejection(ServerError))]
struct CommentPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    post_id: Id<PostMarker>,
    content: String,
}

async fn create_comment(
    CommentPath(): CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let comment = db
        .create_comment(&CreateComment {
            author: user.user_id(),
            post: request.post_id,
            content: request.content,
        })
        .await
        .map_err(|err| match err {
            DbError::ForeignKeyViolation => ServerError::PostByIdNotFound(request.post_id),
            err => err.into(),
        })?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCommentRequest {
    comment_id: Id<CommentMarker>,
}

async fn delete_comment(
    CommentPath(): CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<DeleteCommentRequest>,
) -> Result<StatusCode> {
    let deleted = db
        .delete_comment(request.comment_id, user.user_id())
        .await?;
    if !deleted {
        return Err(ServerError::CommentNotFoundOrUnauthorized);
    }

    Ok(StatusCode::NO_CONTENT)
}
