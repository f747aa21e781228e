//! Read models for profile pages and the home timeline.

use crate::Storage;
use crate::error::{ChirpError, Result};
use crate::graph::SocialGraph;
use crate::model::{Profile, TweetView, UserId};
use crate::store::EdgeStore;

/// Profile of `handle` as seen by the signed-in `viewer`.
///
/// `is_following` and `liked` describe the viewer, not the profile owner.
///
/// # Errors
///
/// `NotFound` for an unknown handle.
pub fn profile(
    storage: &Storage,
    viewer: UserId,
    handle: &str,
    limit: Option<usize>,
) -> Result<Profile> {
    let user = storage
        .get_user_by_handle(handle)?
        .ok_or_else(|| ChirpError::not_found("user", handle.trim()))?;

    let graph = SocialGraph::new(storage);
    let counts = graph.counts(user.id)?;
    let is_following = viewer != user.id && graph.is_following(viewer, user.id)?;
    let liked = storage.liked_tweets(viewer)?;
    let tweets = storage.tweet_views(Some(viewer), Some(user.id), limit)?;

    Ok(Profile {
        user,
        tweets,
        is_following,
        following_count: counts.following,
        follower_count: counts.followers,
        liked,
    })
}

/// Every tweet, newest first, decorated for `viewer`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn home(storage: &Storage, viewer: UserId, limit: Option<usize>) -> Result<Vec<TweetView>> {
    storage.tweet_views(Some(viewer), None, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_reflects_viewer() {
        let storage = Storage::open_memory().unwrap();
        let alice = storage.add_user("alice").unwrap().id;
        let bob = storage.add_user("bob").unwrap().id;
        let carol = storage.add_user("carol").unwrap().id;
        let t1 = storage.create_tweet(bob, "one").unwrap().id;
        storage.create_tweet(bob, "two").unwrap();
        storage.create_tweet(alice, "alice's").unwrap();

        let graph = SocialGraph::new(&storage);
        graph.follow(alice, "bob").unwrap();
        graph.follow(bob, "carol").unwrap();
        crate::engagement::Engagement::new(&storage)
            .like(alice, t1)
            .unwrap();

        let seen_by_alice = profile(&storage, alice, "bob", None).unwrap();
        assert_eq!(seen_by_alice.user.id, bob);
        assert_eq!(seen_by_alice.tweets.len(), 2);
        assert_eq!(seen_by_alice.tweets[0].tweet.content, "two");
        assert!(seen_by_alice.is_following);
        assert_eq!(seen_by_alice.follower_count, 1);
        assert_eq!(seen_by_alice.following_count, 1);
        assert_eq!(seen_by_alice.liked, vec![t1]);
        assert!(seen_by_alice.tweets[1].is_liked);

        let seen_by_carol = profile(&storage, carol, "bob", Some(1)).unwrap();
        assert!(!seen_by_carol.is_following);
        assert_eq!(seen_by_carol.tweets.len(), 1);
        assert!(seen_by_carol.liked.is_empty());
        assert!(!seen_by_carol.tweets[0].is_liked);

        let own = profile(&storage, bob, "bob", None).unwrap();
        assert!(!own.is_following);
        assert!(!own.tweets[1].is_liked);
        assert_eq!(own.tweets[1].liked_count, 1);
    }

    #[test]
    fn unknown_profile_is_not_found() {
        let storage = Storage::open_memory().unwrap();
        let alice = storage.add_user("alice").unwrap().id;
        let err = profile(&storage, alice, "ghost", None).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn home_lists_everyone_newest_first() {
        let storage = Storage::open_memory().unwrap();
        let alice = storage.add_user("alice").unwrap().id;
        let bob = storage.add_user("bob").unwrap().id;
        storage.create_tweet(alice, "first").unwrap();
        storage.create_tweet(bob, "second").unwrap();

        let timeline = home(&storage, alice, None).unwrap();
        let contents: Vec<&str> = timeline.iter().map(|v| v.tweet.content.as_str()).collect();
        assert_eq!(contents, ["second", "first"]);
        assert_eq!(home(&storage, bob, Some(1)).unwrap().len(), 1);
    }
}
