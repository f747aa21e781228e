//! Data models for users, tweets and the edges between them.
//!
//! Users and tweets are referenced by integer row ids wrapped in newtypes so a
//! tweet id can never be passed where a user id is expected.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

row_id!(
    /// Identifier of a registered user.
    UserId
);

row_id!(
    /// Identifier of a tweet.
    TweetId
);

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub handle: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A short text post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: TweetId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Directed follow relationship: `follower_id` follows `following_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub following_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// One row of a following/follower listing: the user on the other end of the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEdge {
    pub peer_id: UserId,
    pub handle: String,
    pub created_at: DateTime<Utc>,
}

/// Edge counts for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    /// Users this user follows.
    pub following: i64,
    /// Users following this user.
    pub followers: i64,
}

/// Outcome of a successful follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowResult {
    pub target_id: UserId,
    pub target_handle: String,
    /// Followers of the target after the edge was created.
    pub follower_count: i64,
    /// Users the caller follows after the edge was created.
    pub following_count: i64,
}

/// Outcome of an unfollow; `removed` is false when there was no edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfollowResult {
    pub target_id: UserId,
    pub target_handle: String,
    pub removed: bool,
    pub follower_count: i64,
    pub following_count: i64,
}

/// Like state of a tweet as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeStatus {
    pub tweet_id: TweetId,
    pub liked_count: i64,
    pub is_liked: bool,
}

pub type LikeResult = LikeStatus;
pub type UnlikeResult = LikeStatus;

/// A tweet decorated for display to a particular caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetView {
    #[serde(flatten)]
    pub tweet: Tweet,
    pub author_handle: String,
    pub liked_count: i64,
    pub is_liked: bool,
}

/// Profile page of one user as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user: User,
    pub tweets: Vec<TweetView>,
    pub is_following: bool,
    pub following_count: i64,
    pub follower_count: i64,
    /// Tweets (by anyone) the caller has liked.
    pub liked: Vec<TweetId>,
}

/// Row counts across the whole network.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub users_count: i64,
    pub tweets_count: i64,
    pub follows_count: i64,
    pub likes_count: i64,
    pub first_tweet_date: Option<DateTime<Utc>>,
    pub last_tweet_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_and_display() {
        let id: TweetId = " 42 ".parse().unwrap();
        assert_eq!(id, TweetId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<UserId>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let status = LikeStatus {
            tweet_id: TweetId(7),
            liked_count: 1,
            is_liked: true,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tweet_id": 7, "liked_count": 1, "is_liked": true})
        );
    }
}
