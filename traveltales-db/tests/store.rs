use sqlx::sqlite::SqlitePoolOptions;
use std::num::NonZeroU32;
use time::{UtcDateTime, macros::date};
use traveltales_common::model::{
    Id,
    auth::{AuthToken, PositiveDuration, SESSION_TTL},
    comment::CreateComment,
    country::CountrySnapshot,
    post::{CreatePost, EditPost, PostMarker},
    query::{Page, PostFilter, PostSort},
    user::{CreateUser, EmailAddress, UserMarker, Username},
};
use traveltales_db::client::{DbClient, DbError};

async fn client() -> DbClient {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let db = DbClient::new(pool);
    db.run_migrations().await.expect("migrations");
    db
}

async fn seed_user(db: &DbClient, name: &str) -> Id<UserMarker> {
    db.create_user(&CreateUser {
        email: EmailAddress::new(format!("{name}@example.com")).unwrap(),
        username: Username::new(name.into()).unwrap(),
        password_hash: "$argon2id$placeholder".into(),
    })
    .await
    .unwrap()
}

fn japan_snapshot() -> CountrySnapshot {
    CountrySnapshot {
        flag: "https://flags.example/jp.png".into(),
        currency: "Japanese yen".into(),
        capital: "Tokyo".into(),
    }
}

async fn seed_post(
    db: &DbClient,
    author: Id<UserMarker>,
    title: &str,
    country: &str,
) -> Id<PostMarker> {
    db.create_post(&CreatePost {
        author,
        title: title.into(),
        content: format!("{title} was lovely"),
        country: country.into(),
        date_of_visit: date!(2024 - 05 - 01),
        snapshot: japan_snapshot(),
    })
    .await
    .unwrap()
}

fn page(number: u32, limit: u32) -> Page {
    Page::new(
        NonZeroU32::new(number).unwrap(),
        NonZeroU32::new(limit).unwrap(),
    )
}

#[tokio::test]
async fn set_then_clear_leaves_zero_weight() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let voter = seed_user(&db, "voter").await;
    let post = seed_post(&db, author, "Trip", "Japan").await;

    db.set_reaction(voter, post, true).await.unwrap();
    db.clear_reaction(voter, post).await.unwrap();

    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(detail.like_count, 0);
    assert_eq!(detail.dislike_count, 0);
    assert!(db.fetch_reactions(post).await.unwrap().is_empty());
}

#[tokio::test]
async fn repeated_set_is_an_idempotent_upsert() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let voter = seed_user(&db, "voter").await;
    let post = seed_post(&db, author, "Trip", "Japan").await;

    db.set_reaction(voter, post, true).await.unwrap();
    db.set_reaction(voter, post, true).await.unwrap();

    let reactions = db.fetch_reactions(post).await.unwrap();
    assert_eq!(reactions.len(), 1);
    assert!(reactions[0].is_like);

    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(detail.like_count, 1);
}

#[tokio::test]
async fn flipping_a_reaction_replaces_the_row() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let voter = seed_user(&db, "voter").await;
    let post = seed_post(&db, author, "Trip", "Japan").await;

    let before = db.fetch_post(post).await.unwrap().unwrap();

    db.set_reaction(voter, post, true).await.unwrap();
    db.set_reaction(voter, post, false).await.unwrap();

    let after = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(after.like_count, before.like_count);
    assert_eq!(after.dislike_count, before.dislike_count + 1);
    assert_eq!(db.fetch_reactions(post).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reaction_against_missing_post_is_rejected() {
    let db = client().await;
    let voter = seed_user(&db, "voter").await;

    let err = db
        .set_reaction(voter, Id::new(999), true)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ForeignKeyViolation));
}

#[tokio::test]
async fn aggregates_default_to_zero_on_every_read_path() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let reader = seed_user(&db, "reader").await;
    let post = seed_post(&db, author, "Quiet", "Iceland").await;
    db.follow(reader, author).await.unwrap();

    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(
        (detail.like_count, detail.dislike_count, detail.comment_count),
        (0, 0, 0)
    );

    let searched = db
        .search_posts(&PostFilter::All, PostSort::Newest, Page::default())
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(
        (
            searched[0].like_count,
            searched[0].dislike_count,
            searched[0].comment_count
        ),
        (0, 0, 0)
    );

    let feed = db.feed_posts(reader, Page::default()).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(
        (feed[0].like_count, feed[0].dislike_count, feed[0].comment_count),
        (0, 0, 0)
    );
}

#[tokio::test]
async fn pagination_pages_are_disjoint_and_cover_the_prefix() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    for n in 1..=5 {
        seed_post(&db, author, &format!("Post {n}"), "Japan").await;
    }

    let full = db
        .search_posts(&PostFilter::All, PostSort::Newest, page(1, 10))
        .await
        .unwrap();
    assert_eq!(full.len(), 5);

    let first = db
        .search_posts(&PostFilter::All, PostSort::Newest, page(1, 2))
        .await
        .unwrap();
    let second = db
        .search_posts(&PostFilter::All, PostSort::Newest, page(2, 2))
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert!(first.iter().all(|post| second.iter().all(|other| other.id != post.id)));

    let paged_ids: Vec<_> = first.iter().chain(&second).map(|post| post.id).collect();
    let full_ids: Vec<_> = full.iter().take(4).map(|post| post.id).collect();
    assert_eq!(paged_ids, full_ids);
}

#[tokio::test]
async fn search_filters_by_country_or_author() {
    let db = client().await;
    let alice = seed_user(&db, "alice").await;
    let bob = seed_user(&db, "bob").await;
    seed_post(&db, alice, "Sakura", "Japan").await;
    seed_post(&db, alice, "Fjords", "Norway").await;
    seed_post(&db, bob, "Onsen", "Japan").await;

    let by_country = db
        .search_posts(
            &PostFilter::Country("Japan".into()),
            PostSort::Newest,
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_country.len(), 2);
    assert!(by_country.iter().all(|post| post.country == "Japan"));

    let by_author = db
        .search_posts(
            &PostFilter::Author(Username::new("alice".into()).unwrap()),
            PostSort::Newest,
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_author.len(), 2);
    assert!(by_author.iter().all(|post| post.author.username.get() == "alice"));
}

#[tokio::test]
async fn most_liked_sort_counts_only_likes_and_breaks_ties_by_id() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let voters = [
        seed_user(&db, "v1").await,
        seed_user(&db, "v2").await,
        seed_user(&db, "v3").await,
    ];
    let first = seed_post(&db, author, "First", "Japan").await;
    let second = seed_post(&db, author, "Second", "Japan").await;
    let third = seed_post(&db, author, "Third", "Japan").await;

    db.set_reaction(voters[0], first, true).await.unwrap();
    db.set_reaction(voters[1], first, true).await.unwrap();
    db.set_reaction(voters[0], second, true).await.unwrap();
    // Dislikes must not add like weight.
    db.set_reaction(voters[2], second, false).await.unwrap();

    let posts = db
        .search_posts(&PostFilter::All, PostSort::MostLiked, Page::default())
        .await
        .unwrap();
    let ids: Vec<_> = posts.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![first, second, third]);
    assert_eq!(posts[0].like_count, 2);
    assert_eq!(posts[1].like_count, 1);
    assert_eq!(posts[1].dislike_count, 1);

    // Zero likes everywhere: newer post wins each tie.
    db.clear_reaction(voters[0], first).await.unwrap();
    db.clear_reaction(voters[1], first).await.unwrap();
    db.clear_reaction(voters[0], second).await.unwrap();
    db.clear_reaction(voters[2], second).await.unwrap();

    let tied = db
        .search_posts(&PostFilter::All, PostSort::MostLiked, Page::default())
        .await
        .unwrap();
    let ids: Vec<_> = tied.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![third, second, first]);
}

#[tokio::test]
async fn most_commented_sort_uses_comment_volume() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let commenter = seed_user(&db, "commenter").await;
    let quiet = seed_post(&db, author, "Quiet", "Japan").await;
    let busy = seed_post(&db, author, "Busy", "Japan").await;

    for n in 0..3 {
        db.create_comment(&CreateComment {
            author: commenter,
            post: busy,
            content: format!("comment {n}"),
        })
        .await
        .unwrap();
    }

    let posts = db
        .search_posts(&PostFilter::All, PostSort::MostCommented, Page::default())
        .await
        .unwrap();
    let ids: Vec<_> = posts.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![busy, quiet]);
    assert_eq!(posts[0].comment_count, 3);
    assert_eq!(posts[1].comment_count, 0);
}

#[tokio::test]
async fn post_mutations_are_owner_guarded() {
    let db = client().await;
    let owner = seed_user(&db, "owner").await;
    let intruder = seed_user(&db, "intruder").await;
    let post = seed_post(&db, owner, "Mine", "Japan").await;

    let edited = db
        .edit_post(&EditPost {
            post,
            author: intruder,
            title: "Stolen".into(),
            content: "rewritten".into(),
            country: "Japan".into(),
            date_of_visit: date!(2024 - 05 - 01),
            snapshot: None,
        })
        .await
        .unwrap();
    assert!(!edited);

    let deleted = db.delete_post(post, intruder).await.unwrap();
    assert!(!deleted);

    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(detail.title, "Mine");

    assert!(db.delete_post(post, owner).await.unwrap());
    assert!(db.fetch_post(post).await.unwrap().is_none());
}

#[tokio::test]
async fn edit_keeps_snapshot_unless_a_new_one_is_supplied() {
    let db = client().await;
    let owner = seed_user(&db, "owner").await;
    let post = seed_post(&db, owner, "Trip", "Japan").await;

    let edited = db
        .edit_post(&EditPost {
            post,
            author: owner,
            title: "Trip, revised".into(),
            content: "better prose".into(),
            country: "Japan".into(),
            date_of_visit: date!(2024 - 05 - 02),
            snapshot: None,
        })
        .await
        .unwrap();
    assert!(edited);

    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(detail.title, "Trip, revised");
    assert_eq!(detail.snapshot, japan_snapshot());

    let norway = CountrySnapshot {
        flag: "https://flags.example/no.png".into(),
        currency: "Norwegian krone".into(),
        capital: "Oslo".into(),
    };
    db.edit_post(&EditPost {
        post,
        author: owner,
        title: "Trip, revised".into(),
        content: "better prose".into(),
        country: "Norway".into(),
        date_of_visit: date!(2024 - 05 - 02),
        snapshot: Some(norway.clone()),
    })
    .await
    .unwrap();

    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(detail.country, "Norway");
    assert_eq!(detail.snapshot, norway);
}

#[tokio::test]
async fn engagement_scenario_from_creation_to_flip() {
    let db = client().await;
    let alice = seed_user(&db, "alice").await;
    let bob = seed_user(&db, "bob").await;

    let post = db
        .create_post(&CreatePost {
            author: alice,
            title: "Trip".into(),
            content: "two weeks in Kansai".into(),
            country: "Japan".into(),
            date_of_visit: date!(2024 - 05 - 01),
            snapshot: japan_snapshot(),
        })
        .await
        .unwrap();

    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!((detail.like_count, detail.dislike_count), (0, 0));

    db.set_reaction(bob, post, true).await.unwrap();
    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!(detail.like_count, 1);

    db.set_reaction(bob, post, false).await.unwrap();
    let detail = db.fetch_post(post).await.unwrap().unwrap();
    assert_eq!((detail.like_count, detail.dislike_count), (0, 1));
}

#[tokio::test]
async fn feed_scopes_to_followed_authors_and_paginates() {
    let db = client().await;
    let alice = seed_user(&db, "alice").await;
    let bob = seed_user(&db, "bob").await;
    let carol = seed_user(&db, "carol").await;

    db.follow(alice, bob).await.unwrap();

    let first = seed_post(&db, bob, "One", "Japan").await;
    let second = seed_post(&db, bob, "Two", "Japan").await;
    let third = seed_post(&db, bob, "Three", "Japan").await;
    seed_post(&db, carol, "Unfollowed", "Japan").await;

    let page_one = db.feed_posts(alice, page(1, 2)).await.unwrap();
    let ids: Vec<_> = page_one.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![third, second]);

    let page_two = db.feed_posts(alice, page(2, 2)).await.unwrap();
    let ids: Vec<_> = page_two.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![first]);
    // Short page: the has-more signal goes off.
    assert!(page_two.len() < 2);
}

#[tokio::test]
async fn duplicate_follow_conflicts_but_unfollow_is_a_noop() {
    let db = client().await;
    let alice = seed_user(&db, "alice").await;
    let bob = seed_user(&db, "bob").await;

    db.follow(alice, bob).await.unwrap();
    let err = db.follow(alice, bob).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation));

    db.unfollow(alice, bob).await.unwrap();
    db.unfollow(alice, bob).await.unwrap();
    assert!(db.fetch_following(alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn follow_reads_project_id_and_username() {
    let db = client().await;
    let alice = seed_user(&db, "alice").await;
    let bob = seed_user(&db, "bob").await;
    let carol = seed_user(&db, "carol").await;

    db.follow(alice, carol).await.unwrap();
    db.follow(bob, carol).await.unwrap();

    let followers = db.fetch_followers(carol).await.unwrap();
    let mut names: Vec<_> = followers
        .iter()
        .map(|user| user.username.get().to_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["alice", "bob"]);

    let following = db.fetch_following(alice).await.unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].id, carol);
    assert_eq!(following[0].username.get(), "carol");
}

#[tokio::test]
async fn comments_paginate_newest_first() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let commenter = seed_user(&db, "commenter").await;
    let post = seed_post(&db, author, "Trip", "Japan").await;

    let mut ids = Vec::new();
    for n in 0..3 {
        let comment = db
            .create_comment(&CreateComment {
                author: commenter,
                post,
                content: format!("comment {n}"),
            })
            .await
            .unwrap();
        assert_eq!(comment.author.username.get(), "commenter");
        ids.push(comment.id);
    }

    let page_one = db.fetch_comments(post, page(1, 2)).await.unwrap();
    let got: Vec<_> = page_one.iter().map(|comment| comment.id).collect();
    assert_eq!(got, vec![ids[2], ids[1]]);

    let page_two = db.fetch_comments(post, page(2, 2)).await.unwrap();
    let got: Vec<_> = page_two.iter().map(|comment| comment.id).collect();
    assert_eq!(got, vec![ids[0]]);
}

#[tokio::test]
async fn comment_deletion_merges_missing_and_foreign() {
    let db = client().await;
    let author = seed_user(&db, "author").await;
    let commenter = seed_user(&db, "commenter").await;
    let other = seed_user(&db, "other").await;
    let post = seed_post(&db, author, "Trip", "Japan").await;

    let comment = db
        .create_comment(&CreateComment {
            author: commenter,
            post,
            content: "nice one".into(),
        })
        .await
        .unwrap();

    assert!(!db.delete_comment(Id::new(999), other).await.unwrap());
    assert!(!db.delete_comment(comment.id, other).await.unwrap());
    assert_eq!(db.fetch_comments(post, Page::default()).await.unwrap().len(), 1);

    assert!(db.delete_comment(comment.id, commenter).await.unwrap());
    assert!(db.fetch_comments(post, Page::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let db = client().await;
    seed_user(&db, "alice").await;

    let same_email = db
        .create_user(&CreateUser {
            email: EmailAddress::new("alice@example.com".into()).unwrap(),
            username: Username::new("alice2".into()).unwrap(),
            password_hash: "$argon2id$placeholder".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(same_email, DbError::UniqueViolation));

    let same_username = db
        .create_user(&CreateUser {
            email: EmailAddress::new("alice2@example.com".into()).unwrap(),
            username: Username::new("alice".into()).unwrap(),
            password_hash: "$argon2id$placeholder".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(same_username, DbError::UniqueViolation));
}

#[tokio::test]
async fn profile_reads_and_updates() {
    let db = client().await;
    let alice = seed_user(&db, "alice").await;
    seed_user(&db, "bob").await;

    let profile = db.fetch_user(alice).await.unwrap().unwrap();
    assert_eq!(profile.username.get(), "alice");
    assert_eq!(profile.email.get(), "alice@example.com");

    let updated = db
        .update_profile(
            alice,
            &EmailAddress::new("alice@travel.example".into()).unwrap(),
            &Username::new("wanderer".into()).unwrap(),
        )
        .await
        .unwrap();
    assert!(updated);
    let profile = db.fetch_user(alice).await.unwrap().unwrap();
    assert_eq!(profile.username.get(), "wanderer");

    let taken = db
        .update_profile(
            alice,
            &EmailAddress::new("bob@example.com".into()).unwrap(),
            &Username::new("wanderer".into()).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(taken, DbError::UniqueViolation));

    let missing = db
        .update_profile(
            Id::new(999),
            &EmailAddress::new("ghost@example.com".into()).unwrap(),
            &Username::new("ghost".into()).unwrap(),
        )
        .await
        .unwrap();
    assert!(!missing);

    let directory = db.fetch_users_except(alice).await.unwrap();
    assert_eq!(directory.len(), 1);
    assert_eq!(directory[0].username.get(), "bob");
}

#[tokio::test]
async fn sessions_round_trip_and_expire() {
    let db = client().await;
    let alice = seed_user(&db, "alice").await;

    let token = AuthToken::generate_random(alice);
    let hash = token.hash().unwrap();
    db.create_session(alice, &hash, Some(PositiveDuration::new_unchecked(SESSION_TTL)))
        .await
        .unwrap();

    let session = db.fetch_session(&hash).await.unwrap().unwrap();
    assert_eq!(session.user, alice);
    assert!(!session.is_expired_at(UtcDateTime::now()));
    assert!(session.is_expired_at(UtcDateTime::now() + SESSION_TTL + SESSION_TTL));

    db.delete_session(&hash).await.unwrap();
    assert!(db.fetch_session(&hash).await.unwrap().is_none());

    let unknown = AuthToken::generate_random(alice).hash().unwrap();
    assert!(db.fetch_session(&unknown).await.unwrap().is_none());
}
