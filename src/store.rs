//! Persistence seams consumed by the social graph and engagement managers.
//!
//! The managers never talk SQL. They go through these three traits, which
//! [`crate::Storage`] implements on top of `SQLite`. Every mutating method is a
//! single atomic statement on the store side; uniqueness of edges is enforced
//! by the store's constraints, not by the caller checking first.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{FollowCounts, FollowEdge, PeerEdge, TweetId, UserId};

/// Result of an insert-if-absent on an edge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// A new row was written.
    Inserted,
    /// The uniqueness constraint rejected the row: the edge was already there.
    AlreadyPresent,
}

/// Lookup of users by handle, plus the credential needed to sign in.
pub trait UserDirectory {
    /// Resolve a handle to its user id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no user has this handle.
    fn resolve(&self, handle: &str) -> Result<UserId>;

    /// Handle of an existing user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is unknown.
    fn handle_of(&self, user: UserId) -> Result<String>;

    /// Stored PHC password hash of an existing user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is unknown.
    fn password_hash(&self, user: UserId) -> Result<String>;
}

/// Tweet existence and ownership.
pub trait PostStore {
    /// Whether the tweet exists right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn tweet_exists(&self, tweet: TweetId) -> Result<bool>;

    /// Author of a tweet.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tweet does not exist.
    fn tweet_author(&self, tweet: TweetId) -> Result<UserId>;

    /// Delete a tweet on behalf of `caller`, cascading to its likes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tweet does not exist and `Forbidden` if it
    /// exists but is authored by someone else.
    fn delete_tweet(&self, tweet: TweetId, caller: UserId) -> Result<()>;
}

/// Follow and like edge tables.
pub trait EdgeStore {
    /// Insert `follower -> following` unless the pair already exists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a self edge, `NotFound` if either user
    /// vanished, `Conflict` if a concurrent writer kept the table locked.
    fn insert_follow(
        &self,
        follower: UserId,
        following: UserId,
        at: DateTime<Utc>,
    ) -> Result<EdgeInsert>;

    /// Delete `follower -> following`; returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_follow(&self, follower: UserId, following: UserId) -> Result<bool>;

    /// The edge `follower -> following`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn follow_edge(&self, follower: UserId, following: UserId) -> Result<Option<FollowEdge>>;

    /// Following and follower counts for `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the count queries fail.
    fn follow_counts(&self, user: UserId) -> Result<FollowCounts>;

    /// Users `user` follows, most recent edge first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_following(&self, user: UserId, limit: Option<usize>) -> Result<Vec<PeerEdge>>;

    /// Users following `user`, most recent edge first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_followers(&self, user: UserId, limit: Option<usize>) -> Result<Vec<PeerEdge>>;

    /// Insert a like unless the pair already exists.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user or tweet vanished, `Conflict` on a
    /// persistent lock.
    fn insert_like(&self, user: UserId, tweet: TweetId, at: DateTime<Utc>) -> Result<EdgeInsert>;

    /// Delete a like; returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_like(&self, user: UserId, tweet: TweetId) -> Result<bool>;

    /// Number of likes on a tweet.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn like_count(&self, tweet: TweetId) -> Result<i64>;

    /// Tweets `user` has liked, most recent like first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn liked_tweets(&self, user: UserId) -> Result<Vec<TweetId>>;
}
