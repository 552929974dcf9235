use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use traveltales_common::model::{
    Id,
    auth::{self, AuthToken, PositiveDuration, SESSION_TTL},
    user::{CreateUser, EmailAddress, User, UserMarker, UserRef, Username},
};
use traveltales_db::client::{DbClient, DbError};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(list_users)
        .typed_get(get_user)
        .typed_put(update_profile)
        .typed_post(follow)
        .typed_delete(unfollow)
        .typed_get(get_followers)
        .typed_get(get_following)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct RegisterRequest {
    email: EmailAddress,
    username: Username,
    password: String,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let password_hash = auth::hash_password(&request.password)?;

    let id = db
        .create_user(&CreateUser {
            email: request.email,
            username: request.username,
            password_hash,
        })
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation => ServerError::UserExists,
            err => err.into(),
        })?;

    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct LoginRequest {
    email: EmailAddress,
    password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: User,
}

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    // Unknown email and wrong password answer identically.
    let credentials = db
        .fetch_user_credentials(&request.email)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    if !auth::verify_password(&request.password, &credentials.password_hash)? {
        return Err(ServerError::InvalidCredentials);
    }

    let token = AuthToken::generate_random(credentials.user.id);
    let token_hash = token.hash()?;
    db.create_session(
        credentials.user.id,
        &token_hash,
        Some(PositiveDuration::new_unchecked(SESSION_TTL)),
    )
    .await?;

    Ok(Json(LoginResponse {
        token: token.as_token_str(),
        user: credentials.user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_session(user.token_hash()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct UsersPath();

async fn list_users(
    UsersPath(): UsersPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<UserRef>>> {
    let users = db.fetch_users_except(user.user_id()).await?;

    Ok(Json(users))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/profile", rejection(ServerError))]
struct ProfilePath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct UpdateProfileRequest {
    email: EmailAddress,
    username: Username,
}

async fn update_profile(
    ProfilePath(): ProfilePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let updated = db
        .update_profile(user.user_id(), &request.email, &request.username)
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation => ServerError::ProfileTaken,
            err => err.into(),
        })?;
    if !updated {
        return Err(ServerError::UserByIdNotFound(user.user_id()));
    }

    let profile = db
        .fetch_user(user.user_id())
        .await?
        .ok_or(ServerError::UserByIdNotFound(user.user_id()))?;

    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/follow", rejection(ServerError))]
struct FollowPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowRequest {
    followee_id: Id<UserMarker>,
}

async fn follow(
    FollowPath(): FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<FollowRequest>,
) -> Result<StatusCode> {
    if request.followee_id == user.user_id() {
        return Err(ServerError::SelfFollow);
    }

    db.follow(user.user_id(), request.followee_id)
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation => ServerError::AlreadyFollowing,
            DbError::ForeignKeyViolation => ServerError::UserByIdNotFound(request.followee_id),
            err => err.into(),
        })?;

    Ok(StatusCode::CREATED)
}

async fn unfollow(
    FollowPath(): FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<FollowRequest>,
) -> Result<StatusCode> {
    db.unfollow(user.user_id(), request.followee_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/followers", rejection(ServerError))]
struct GetFollowersPath {
    id: Id<UserMarker>,
}

async fn get_followers(
    GetFollowersPath { id }: GetFollowersPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<UserRef>>> {
    let followers = db.fetch_followers(id).await?;

    Ok(Json(followers))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/following", rejection(ServerError))]
struct GetFollowingPath {
    id: Id<UserMarker>,
}

async fn get_following(
    GetFollowingPath { id }: GetFollowingPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<UserRef>>> {
    let following = db.fetch_following(id).await?;

    Ok(Json(following))
}
