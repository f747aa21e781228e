//! Integration tests for chirp.
//!
//! These tests drive the library the way the binary does, against a real
//! database file:
//! - Follow / unfollow and like / unlike scenarios
//! - Ownership-gated tweet deletion
//! - Cascades when users and tweets are removed
//! - Concurrent requests, each on its own connection

use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

use chirp::handlers;
use chirp::{
    ChirpError, EdgeStore, Engagement, PostStore, Session, SignupForm, SocialGraph, Storage,
    TweetId, UserDirectory, UserId,
};
use tempfile::TempDir;

fn temp_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chirp.db");
    (dir, path)
}

const PASSWORD: &str = "QaZ105edc";

fn seed(path: &Path, handles: &[&str]) -> Vec<UserId> {
    let storage = Storage::open(path).unwrap();
    handles
        .iter()
        .map(|&handle| {
            let email = format!("{handle}@example.com");
            let form = SignupForm {
                handle,
                email: &email,
                password1: PASSWORD,
                password2: PASSWORD,
            };
            storage.create_user(&form).unwrap().id
        })
        .collect()
}

fn sign_in(storage: &Storage, handle: &str) -> Session {
    Session::sign_in(storage, Some(handle), Some(PASSWORD)).unwrap()
}

fn follow_edges(storage: &Storage, follower: UserId, following: UserId) -> i64 {
    storage
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            [follower.0, following.0],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn follow_scenario_alice_bob() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob"]);
    let (alice, bob) = (ids[0], ids[1]);

    let storage = Storage::open(&path).unwrap();
    let graph = SocialGraph::new(&storage);

    let result = graph.follow(alice, "bob").unwrap();
    assert_eq!(result.following_count, 1);
    assert_eq!(result.follower_count, 1);

    let err = graph.follow(alice, "bob").unwrap_err();
    assert!(matches!(err, ChirpError::AlreadyExists { .. }));
    assert_eq!(follow_edges(&storage, alice, bob), 1);

    let result = graph.unfollow(alice, "bob").unwrap();
    assert!(result.removed);
    assert_eq!(graph.counts(alice).unwrap().following, 0);
    assert_eq!(graph.counts(bob).unwrap().followers, 0);
}

#[test]
fn like_scenario_alice_bob() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob"]);
    let (alice, bob) = (ids[0], ids[1]);

    let storage = Storage::open(&path).unwrap();
    let t1 = storage.create_tweet(bob, "t1").unwrap().id;
    let engagement = Engagement::new(&storage);

    let liked = engagement.like(alice, t1).unwrap();
    assert_eq!((liked.liked_count, liked.is_liked), (1, true));
    let liked_again = engagement.like(alice, t1).unwrap();
    assert_eq!((liked_again.liked_count, liked_again.is_liked), (1, true));

    let unliked = engagement.unlike(alice, t1).unwrap();
    assert_eq!((unliked.liked_count, unliked.is_liked), (0, false));
    let unliked_again = engagement.unlike(alice, t1).unwrap();
    assert_eq!((unliked_again.liked_count, unliked_again.is_liked), (0, false));

    let err = engagement.like(alice, TweetId(t1.0 + 100)).unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(storage.stats().unwrap().likes_count, 0);
}

#[test]
fn state_survives_reopening() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob"]);
    {
        let storage = Storage::open(&path).unwrap();
        SocialGraph::new(&storage).follow(ids[0], "bob").unwrap();
    }
    let storage = Storage::open(&path).unwrap();
    assert!(storage.follow_edge(ids[0], ids[1]).unwrap().is_some());
    let err = SocialGraph::new(&storage).follow(ids[0], "bob").unwrap_err();
    assert!(matches!(err, ChirpError::AlreadyExists { .. }));
}

#[test]
fn passwords_survive_reopening() {
    let (_dir, path) = temp_db();
    seed(&path, &["alice"]);

    let storage = Storage::open(&path).unwrap();
    assert_eq!(sign_in(&storage, "alice").caller().unwrap().handle, "alice");
    let err = Session::sign_in(&storage, Some("alice"), Some("QaZ105edd")).unwrap_err();
    assert!(matches!(err, ChirpError::Unauthenticated));

    let stored: String = storage
        .connection()
        .query_row("SELECT password_hash FROM users", [], |row| row.get(0))
        .unwrap();
    assert!(stored.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
}

#[test]
fn non_owner_delete_keeps_tweet_and_likes() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob"]);
    let storage = Storage::open(&path).unwrap();
    let tweet = storage.create_tweet(ids[1], "bob's").unwrap().id;
    Engagement::new(&storage).like(ids[0], tweet).unwrap();

    let alice = sign_in(&storage, "alice");
    let reply = handlers::delete_tweet(&storage, &alice, tweet);
    assert_eq!(reply.status, 403);
    assert!(storage.tweet_exists(tweet).unwrap());
    assert_eq!(storage.like_count(tweet).unwrap(), 1);

    let bob = sign_in(&storage, "bob");
    assert_eq!(handlers::delete_tweet(&storage, &bob, tweet).status, 200);
    assert!(!storage.tweet_exists(tweet).unwrap());
    assert_eq!(storage.stats().unwrap().likes_count, 0);
}

#[test]
fn deleting_user_cascades_every_edge() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob", "carol"]);
    let (alice, bob, carol) = (ids[0], ids[1], ids[2]);
    let storage = Storage::open(&path).unwrap();
    let graph = SocialGraph::new(&storage);
    let engagement = Engagement::new(&storage);

    graph.follow(alice, "bob").unwrap();
    graph.follow(bob, "alice").unwrap();
    graph.follow(carol, "alice").unwrap();
    let alices = storage.create_tweet(alice, "alice").unwrap().id;
    let carols = storage.create_tweet(carol, "carol").unwrap().id;
    engagement.like(bob, alices).unwrap();
    engagement.like(alice, carols).unwrap();
    engagement.like(bob, carols).unwrap();

    assert!(storage.delete_user(alice).unwrap());

    assert!(storage.list_followers(bob, None).unwrap().is_empty());
    assert!(storage.list_following(bob, None).unwrap().is_empty());
    assert!(storage.list_following(carol, None).unwrap().is_empty());
    assert!(!storage.tweet_exists(alices).unwrap());
    assert_eq!(storage.like_count(carols).unwrap(), 1);
    assert_eq!(storage.liked_tweets(bob).unwrap(), vec![carols]);
    assert!(matches!(
        storage.resolve("alice").unwrap_err(),
        ChirpError::NotFound { .. }
    ));

    let checks = storage.database_health_checks();
    assert!(checks.iter().all(|c| c.status.is_ok()), "{checks:?}");
}

#[test]
fn concurrent_follows_create_one_edge() {
    const THREADS: usize = 8;
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob"]);
    let (alice, bob) = (ids[0], ids[1]);

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let storage = Storage::open(&path).unwrap();
                barrier.wait();
                SocialGraph::new(&storage).follow(alice, "bob")
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let created = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 1, "{results:?}");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                ChirpError::AlreadyExists { .. } | ChirpError::Conflict { .. }
            ),
            "unexpected error: {err}"
        );
    }

    let storage = Storage::open(&path).unwrap();
    assert_eq!(follow_edges(&storage, alice, bob), 1);
}

#[test]
fn concurrent_likes_are_idempotent() {
    const THREADS: usize = 8;
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob"]);
    let alice = ids[0];
    let tweet = Storage::open(&path)
        .unwrap()
        .create_tweet(ids[1], "race me")
        .unwrap()
        .id;

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let storage = Storage::open(&path).unwrap();
                barrier.wait();
                Engagement::new(&storage).like(alice, tweet)
            })
        })
        .collect();

    for handle in handles {
        match handle.join().unwrap() {
            Ok(status) => {
                assert!(status.is_liked);
                assert_eq!(status.liked_count, 1);
            }
            Err(err) => assert!(matches!(err, ChirpError::Conflict { .. }), "{err}"),
        }
    }

    let storage = Storage::open(&path).unwrap();
    assert_eq!(storage.like_count(tweet).unwrap(), 1);
}

#[test]
fn follow_and_unfollow_race_settles_on_a_valid_state() {
    const ROUNDS: usize = 20;
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["alice", "bob"]);
    let (alice, bob) = (ids[0], ids[1]);

    let spawn = |follow: bool| {
        let path = path.clone();
        thread::spawn(move || {
            let storage = Storage::open(&path).unwrap();
            let graph = SocialGraph::new(&storage);
            for _ in 0..ROUNDS {
                let outcome = if follow {
                    graph.follow(alice, "bob").map(|_| ())
                } else {
                    graph.unfollow(alice, "bob").map(|_| ())
                };
                if let Err(err) = outcome {
                    assert!(
                        matches!(
                            err,
                            ChirpError::AlreadyExists { .. } | ChirpError::Conflict { .. }
                        ),
                        "{err}"
                    );
                }
            }
        })
    };

    let followers = spawn(true);
    let unfollowers = spawn(false);
    followers.join().unwrap();
    unfollowers.join().unwrap();

    let storage = Storage::open(&path).unwrap();
    assert!(follow_edges(&storage, alice, bob) <= 1);
}
