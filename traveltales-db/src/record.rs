use sqlx::FromRow;
use time::{Duration, PrimitiveDateTime};
use traveltales_common::model::{
    ModelValidationError,
    auth::Authentication,
    comment::Comment,
    country::CountrySnapshot,
    post::{PostDetail, PostSummary, Reaction},
    user::{EmailAddress, User, UserRef, Username},
};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub email: String,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserCredentialsRecord {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRefRecord {
    pub id: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct PostSummaryRecord {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub title: String,
    pub content: String,
    pub country: String,
    pub date_of_visit: time::Date,
    pub flag: String,
    pub currency: String,
    pub capital: String,
    pub created_at: PrimitiveDateTime,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
}

/// Same column set as [`PostSummaryRecord`]; fetched by the single-post path.
#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct FullPostRecord {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub title: String,
    pub content: String,
    pub country: String,
    pub date_of_visit: time::Date,
    pub flag: String,
    pub currency: String,
    pub capital: String,
    pub created_at: PrimitiveDateTime,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct ReactionRecord {
    pub user_id: i64,
    pub is_like: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

/// Login projection: the profile plus the stored password hash. Never
/// serialized; consumed by the login handler only.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            email: EmailAddress::new(value.email)?,
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<UserCredentialsRecord> for UserCredentials {
    type Error = ModelValidationError;

    fn try_from(value: UserCredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.id.into(),
                email: EmailAddress::new(value.email)?,
                username: Username::new(value.username)?,
            },
            password_hash: value.password_hash,
        })
    }
}

impl TryFrom<UserRefRecord> for UserRef {
    type Error = ModelValidationError;

    fn try_from(value: UserRefRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<PostSummaryRecord> for PostSummary {
    type Error = ModelValidationError;

    fn try_from(value: PostSummaryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            author: UserRef {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
            },
            title: value.title,
            content: value.content,
            country: value.country,
            date_of_visit: value.date_of_visit,
            snapshot: CountrySnapshot {
                flag: value.flag,
                currency: value.currency,
                capital: value.capital,
            },
            created_at: value.created_at.as_utc(),
            like_count: value.like_count,
            dislike_count: value.dislike_count,
            comment_count: value.comment_count,
        })
    }
}

impl TryFrom<FullPostRecord> for PostDetail {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            author: UserRef {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
            },
            title: value.title,
            content: value.content,
            country: value.country,
            date_of_visit: value.date_of_visit,
            snapshot: CountrySnapshot {
                flag: value.flag,
                currency: value.currency,
                capital: value.capital,
            },
            created_at: value.created_at.as_utc(),
            like_count: value.like_count,
            dislike_count: value.dislike_count,
            comment_count: value.comment_count,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            post_id: value.post_id.into(),
            author: UserRef {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
            },
            content: value.content,
            created_at: value.created_at.as_utc(),
        })
    }
}

impl From<ReactionRecord> for Reaction {
    fn from(value: ReactionRecord) -> Self {
        Self {
            user_id: value.user_id.into(),
            is_like: value.is_like,
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
