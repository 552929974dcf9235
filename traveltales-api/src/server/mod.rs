use crate::country::{CountryClient, CountryError};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use extract::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use traveltales_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
    post::PostMarker,
    user::UserMarker,
};
use traveltales_db::client::{DbClient, DbError};

mod auth;
mod extract;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub country: Arc<CountryClient>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Password processing failed: {0}")]
    PasswordHash(#[from] PasswordHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Unauthorized access")]
    Unauthorized,
    #[error("User already exists")]
    UserExists,
    #[error("Email or username already in use")]
    ProfileTaken,
    #[error("Users cannot follow themselves")]
    SelfFollow,
    #[error("Already following this user")]
    AlreadyFollowing,
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("Comment not found or unauthorized")]
    CommentNotFoundOrUnauthorized,
    #[error("Country lookup failed: {0}")]
    Country(#[from] CountryError),
    #[error(transparent)]
    Database(#[from] DbError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::CommentNotFoundOrUnauthorized
            | ServerError::Database(DbError::ForeignKeyViolation) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken
            | ServerError::InvalidCredentials
            | ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::UserExists
            | ServerError::ProfileTaken
            | ServerError::AlreadyFollowing
            | ServerError::Database(DbError::UniqueViolation) => StatusCode::CONFLICT,
            ServerError::Country(_) => StatusCode::BAD_GATEWAY,
            ServerError::PathRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::SelfFollow
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client gets to see. Internal failures collapse to a fixed
    /// string; store and upstream error text stays in the logs.
    fn public_message(&self) -> String {
        match self {
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::Database(DbError::Sqlx(_) | DbError::Data(_) | DbError::Migrate(_)) => {
                "Internal server error".to_owned()
            }
            ServerError::Database(DbError::UniqueViolation) => {
                "Resource already exists".to_owned()
            }
            ServerError::Database(DbError::ForeignKeyViolation) => {
                "Referenced resource was not found".to_owned()
            }
            ServerError::Country(_) => "Country lookup failed".to_owned(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}
