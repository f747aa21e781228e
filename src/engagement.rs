//! Likes on tweets.
//!
//! Both operations are idempotent: liking a liked tweet and unliking an
//! unliked one succeed and echo the current state. The only failure is a
//! tweet that does not exist.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{ChirpError, Result};
use crate::model::{LikeResult, LikeStatus, TweetId, UnlikeResult, UserId};
use crate::store::{EdgeInsert, EdgeStore, PostStore};

/// Engagement manager over any store that knows tweets and holds edges.
pub struct Engagement<'a, S> {
    store: &'a S,
}

impl<'a, S> Engagement<'a, S>
where
    S: PostStore + EdgeStore,
{
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn require_tweet(&self, tweet: TweetId) -> Result<()> {
        if self.store.tweet_exists(tweet)? {
            Ok(())
        } else {
            Err(ChirpError::not_found("tweet", tweet))
        }
    }

    /// Get-or-create the like of `caller` on `tweet`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tweet does not exist (also when it is deleted between
    /// the existence check and the insert), `Conflict` if the store stayed locked.
    pub fn like(&self, caller: UserId, tweet: TweetId) -> Result<LikeResult> {
        self.require_tweet(tweet)?;

        match self.store.insert_like(caller, tweet, Utc::now())? {
            EdgeInsert::Inserted => info!(user = %caller, tweet = %tweet, "Like created"),
            EdgeInsert::AlreadyPresent => {
                debug!(user = %caller, tweet = %tweet, "Like already present");
            }
        }

        Ok(LikeStatus {
            tweet_id: tweet,
            liked_count: self.store.like_count(tweet)?,
            is_liked: true,
        })
    }

    /// Remove the like of `caller` on `tweet` if there is one.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tweet does not exist.
    pub fn unlike(&self, caller: UserId, tweet: TweetId) -> Result<UnlikeResult> {
        self.require_tweet(tweet)?;

        if self.store.delete_like(caller, tweet)? {
            info!(user = %caller, tweet = %tweet, "Like removed");
        } else {
            debug!(user = %caller, tweet = %tweet, "Unlike without like");
        }

        Ok(LikeStatus {
            tweet_id: tweet,
            liked_count: self.store.like_count(tweet)?,
            is_liked: false,
        })
    }
}
