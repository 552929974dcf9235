use crate::model::{
    Id,
    country::CountrySnapshot,
    user::{UserMarker, UserRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, UtcDateTime};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// One row of a post listing (search, feed, author listing), with the
/// engagement aggregates already joined in.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostSummary {
    pub id: Id<PostMarker>,
    pub author: UserRef,
    pub title: String,
    pub content: String,
    pub country: String,
    pub date_of_visit: Date,
    #[serde(flatten)]
    pub snapshot: CountrySnapshot,
    pub created_at: UtcDateTime,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
}

/// The single-post fetch result. Same columns as a listing row today, but a
/// distinct type so the two read contracts can drift independently.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostDetail {
    pub id: Id<PostMarker>,
    pub author: UserRef,
    pub title: String,
    pub content: String,
    pub country: String,
    pub date_of_visit: Date,
    #[serde(flatten)]
    pub snapshot: CountrySnapshot,
    pub created_at: UtcDateTime,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
}

/// A raw reaction row: the voting user and whether the vote is a like
/// (`true`) or a dislike (`false`). A pair with no row has no reaction.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Reaction {
    pub user_id: Id<UserMarker>,
    pub is_like: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub title: String,
    pub content: String,
    pub country: String,
    pub date_of_visit: Date,
    pub snapshot: CountrySnapshot,
}

/// Owner-guarded update. `snapshot: None` leaves the stored country
/// metadata untouched; `Some` overwrites it (set when the country changed
/// and enrichment ran again).
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct EditPost {
    pub post: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub title: String,
    pub content: String,
    pub country: String,
    pub date_of_visit: Date,
    pub snapshot: Option<CountrySnapshot>,
}
