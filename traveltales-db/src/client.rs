use crate::record::{
    AuthenticationRecord, CommentRecord, FullPostRecord, PostSummaryRecord, ReactionRecord,
    UserCredentials, UserCredentialsRecord, UserRecord, UserRefRecord,
};
use sqlx::{
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use traveltales_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication, PositiveDuration},
    comment::{Comment, CommentMarker, CreateComment},
    post::{CreatePost, EditPost, PostDetail, PostMarker, PostSummary, Reaction},
    query::{Page, PostFilter, PostSort},
    user::{CreateUser, EmailAddress, User, UserMarker, UserRef, Username},
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A uniqueness constraint was violated")]
    UniqueViolation,
    #[error("A referenced row does not exist")]
    ForeignKeyViolation,
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => Self::UniqueViolation,
            Some(db_err) if db_err.is_foreign_key_violation() => Self::ForeignKeyViolation,
            _ => Self::Sqlx(err),
        }
    }
}

/// Explicitly constructed store handle; every component receives one instead
/// of opening its own connection.
#[derive(Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the database at `url` (a `sqlite:` path), creating the file if
    /// needed. Foreign keys stay at sqlx's enforced default.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(DbError::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // --- users ---

    pub async fn create_user(&self, user: &CreateUser) -> Result<Id<UserMarker>> {
        let id = query_scalar::<_, i64>(
            "INSERT INTO users (email, username, password_hash) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(user.email.get())
        .bind(user.username.get())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(id.into())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "SELECT id, email, username FROM users WHERE id = ?",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_credentials(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, UserCredentialsRecord>(
            "SELECT id, email, username, password_hash FROM users WHERE email = ?",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        let credentials = record.map(UserCredentials::try_from).transpose()?;
        Ok(credentials)
    }

    pub async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        email: &EmailAddress,
        username: &Username,
    ) -> Result<bool> {
        let result = query("UPDATE users SET email = ?, username = ? WHERE id = ?")
            .bind(email.get())
            .bind(username.get())
            .bind(user_id.get())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    /// The user directory: everyone except the requester.
    pub async fn fetch_users_except(&self, user_id: Id<UserMarker>) -> Result<Vec<UserRef>> {
        let records = query_as::<_, UserRefRecord>(
            "SELECT id, username FROM users WHERE id <> ? ORDER BY username ASC",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        collect_models(records)
    }

    // --- sessions ---

    pub async fn create_session(
        &self,
        user_id: Id<UserMarker>,
        token_hash: &AuthTokenHash,
        expires_after: Option<PositiveDuration>,
    ) -> Result<()> {
        query(
            "INSERT INTO sessions (token_hash, user_id, expires_after_seconds) VALUES (?, ?, ?)",
        )
        .bind(token_hash.0.as_slice())
        .bind(user_id.get())
        .bind(expires_after.map(|duration| duration.get().whole_seconds()))
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }

    pub async fn fetch_session(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "SELECT user_id, token_hash, created_at, expires_after_seconds \
             FROM sessions WHERE token_hash = ?",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    pub async fn delete_session(&self, token_hash: &AuthTokenHash) -> Result<()> {
        query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    // --- posts ---

    pub async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let id = query_scalar::<_, i64>(
            "INSERT INTO posts (user_id, title, content, country, date_of_visit, flag, currency, capital) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(post.author.get())
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.country)
        .bind(post.date_of_visit)
        .bind(&post.snapshot.flag)
        .bind(&post.snapshot.currency)
        .bind(&post.snapshot.capital)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(id.into())
    }

    /// Owner-guarded update. Returns `false` when no row matched the
    /// (post, author) pair; absent and foreign-owned posts are
    /// indistinguishable on purpose. Snapshot columns are only touched when
    /// the edit carries a fresh snapshot.
    pub async fn edit_post(&self, edit: &EditPost) -> Result<bool> {
        let result = if let Some(snapshot) = &edit.snapshot {
            query(
                "UPDATE posts SET title = ?, content = ?, country = ?, date_of_visit = ?, \
                 flag = ?, currency = ?, capital = ? WHERE id = ? AND user_id = ?",
            )
            .bind(&edit.title)
            .bind(&edit.content)
            .bind(&edit.country)
            .bind(edit.date_of_visit)
            .bind(&snapshot.flag)
            .bind(&snapshot.currency)
            .bind(&snapshot.capital)
            .bind(edit.post.get())
            .bind(edit.author.get())
            .execute(&self.pool)
            .await
        } else {
            query(
                "UPDATE posts SET title = ?, content = ?, country = ?, date_of_visit = ? \
                 WHERE id = ? AND user_id = ?",
            )
            .bind(&edit.title)
            .bind(&edit.content)
            .bind(&edit.country)
            .bind(edit.date_of_visit)
            .bind(edit.post.get())
            .bind(edit.author.get())
            .execute(&self.pool)
            .await
        }
        .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query("DELETE FROM posts WHERE id = ? AND user_id = ?")
            .bind(post_id.get())
            .bind(author.get())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    /// Filtered, sorted, offset-paginated listing. All three sort axes share
    /// one join shape; comment volume comes from a correlated subquery so
    /// the like join cannot multiply it.
    pub async fn search_posts(
        &self,
        filter: &PostFilter,
        sort: PostSort,
        page: Page,
    ) -> Result<Vec<PostSummary>> {
        let where_clause = match filter {
            PostFilter::All => "",
            PostFilter::Country(_) => " WHERE p.country = ?",
            PostFilter::Author(_) => " WHERE u.username = ?",
        };
        let sql = post_select("", where_clause, sort_clause(sort));

        let statement = query_as::<_, PostSummaryRecord>(&sql);
        let statement = match filter {
            PostFilter::All => statement,
            PostFilter::Country(country) => statement.bind(country.as_str()),
            PostFilter::Author(username) => statement.bind(username.get()),
        };
        let records = statement
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        collect_models(records)
    }

    /// The feed: newest posts authored by users the requester follows.
    pub async fn feed_posts(
        &self,
        follower: Id<UserMarker>,
        page: Page,
    ) -> Result<Vec<PostSummary>> {
        let sql = post_select(
            " JOIN follows f ON f.followee_id = p.user_id",
            " WHERE f.follower_id = ?",
            sort_clause(PostSort::Newest),
        );

        let records = query_as::<_, PostSummaryRecord>(&sql)
            .bind(follower.get())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        collect_models(records)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<PostDetail>> {
        let sql = post_select("", " WHERE p.id = ?", "");

        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.get())
            .bind(1i64)
            .bind(0i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;

        let post = record.map(PostDetail::try_from).transpose()?;
        Ok(post)
    }

    // --- engagement ---

    /// Upserts the (user, post) reaction row, so exactly one row exists for
    /// the pair afterward. Re-asserting the current state is a no-op in
    /// effect; asserting the opposite state replaces it.
    pub async fn set_reaction(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
        is_like: bool,
    ) -> Result<()> {
        query(
            "INSERT INTO likes (user_id, post_id, is_like) VALUES (?, ?, ?) \
             ON CONFLICT (user_id, post_id) DO UPDATE SET is_like = excluded.is_like",
        )
        .bind(user_id.get())
        .bind(post_id.get())
        .bind(is_like)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }

    /// Returns the pair to the no-reaction state. Succeeds when no row
    /// exists.
    pub async fn clear_reaction(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id.get())
            .bind(post_id.get())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    pub async fn fetch_reactions(&self, post_id: Id<PostMarker>) -> Result<Vec<Reaction>> {
        let records = query_as::<_, ReactionRecord>(
            "SELECT user_id, is_like FROM likes WHERE post_id = ?",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(records.into_iter().map(Reaction::from).collect())
    }

    // --- comments ---

    pub async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let id = query_scalar::<_, i64>(
            "INSERT INTO comments (user_id, post_id, content) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(comment.author.get())
        .bind(comment.post.get())
        .bind(&comment.content)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        let record = query_as::<_, CommentRecord>(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at \
             FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(record.try_into()?)
    }

    pub async fn fetch_comments(
        &self,
        post_id: Id<PostMarker>,
        page: Page,
    ) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at \
             FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = ? \
             ORDER BY c.created_at DESC, c.id DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(post_id.get())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        collect_models(records)
    }

    /// Deletes the comment only when it belongs to `author`. `false` does
    /// not reveal whether the comment was missing or someone else's.
    pub async fn delete_comment(
        &self,
        comment_id: Id<CommentMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query("DELETE FROM comments WHERE id = ? AND user_id = ?")
            .bind(comment_id.get())
            .bind(author.get())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    // --- follow graph ---

    /// Inserts the directed edge; a duplicate follow surfaces as
    /// [`DbError::UniqueViolation`].
    pub async fn follow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<()> {
        query("INSERT INTO follows (follower_id, followee_id) VALUES (?, ?)")
            .bind(follower.get())
            .bind(followee.get())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    /// Removes the edge; a no-op when it does not exist.
    pub async fn unfollow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<()> {
        query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower.get())
            .bind(followee.get())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    pub async fn fetch_followers(&self, user_id: Id<UserMarker>) -> Result<Vec<UserRef>> {
        let records = query_as::<_, UserRefRecord>(
            "SELECT u.id, u.username FROM users u \
             JOIN follows f ON u.id = f.follower_id WHERE f.followee_id = ?",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        collect_models(records)
    }

    pub async fn fetch_following(&self, user_id: Id<UserMarker>) -> Result<Vec<UserRef>> {
        let records = query_as::<_, UserRefRecord>(
            "SELECT u.id, u.username FROM users u \
             JOIN follows f ON u.id = f.followee_id WHERE f.follower_id = ?",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        collect_models(records)
    }
}

/// The one join shape every post read runs: posts with their author, the
/// like/dislike aggregates zero-defaulted through `COALESCE`, and the
/// comment count. Callers append their own joins, filters, and ordering;
/// `LIMIT ? OFFSET ?` is always the final pair of placeholders.
fn post_select(extra_join: &str, where_clause: &str, order_by: &str) -> String {
    format!(
        "SELECT p.id, p.user_id, u.username, p.title, p.content, p.country, p.date_of_visit, \
         p.flag, p.currency, p.capital, p.created_at, \
         COALESCE(SUM(CASE WHEN l.is_like = 1 THEN 1 ELSE 0 END), 0) AS like_count, \
         COALESCE(SUM(CASE WHEN l.is_like = 0 THEN 1 ELSE 0 END), 0) AS dislike_count, \
         (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count \
         FROM posts p \
         JOIN users u ON u.id = p.user_id{extra_join} \
         LEFT JOIN likes l ON l.post_id = p.id{where_clause} \
         GROUP BY p.id, p.user_id, u.username, p.title, p.content, p.country, \
         p.date_of_visit, p.flag, p.currency, p.capital, p.created_at{order_by} \
         LIMIT ? OFFSET ?"
    )
}

/// Explicit `id DESC` tie-break keeps pagination stable when sort keys tie.
fn sort_clause(sort: PostSort) -> &'static str {
    match sort {
        PostSort::Newest => " ORDER BY p.created_at DESC, p.id DESC",
        PostSort::MostLiked => " ORDER BY like_count DESC, p.id DESC",
        PostSort::MostCommented => " ORDER BY comment_count DESC, p.id DESC",
    }
}

fn collect_models<Record, Model>(records: Vec<Record>) -> Result<Vec<Model>>
where
    Model: TryFrom<Record, Error = ModelValidationError>,
{
    records
        .into_iter()
        .map(|record| Model::try_from(record).map_err(DbError::from))
        .collect()
}
