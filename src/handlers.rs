//! Request handlers.
//!
//! Each handler takes the store, the caller's [`Session`] and the request
//! arguments, and answers with a [`Reply`]: an HTTP-style status plus a JSON
//! body. Errors never escape; they become 4xx/5xx replies whose body is
//! `{"error": "...", "status": N}`.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::Storage;
use crate::engagement::Engagement;
use crate::error::{ChirpError, Result};
use crate::graph::SocialGraph;
use crate::guard::{self, Session, require_authenticated};
use crate::model::TweetId;
use crate::profile;
use crate::store::UserDirectory;
use crate::validate::SignupForm;

pub const OK: u16 = 200;
pub const CREATED: u16 = 201;

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Error reply carrying the message and, if there is one, a hint.
    #[must_use]
    pub fn from_error(err: &ChirpError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            error!(error = %err, "Request failed");
        } else {
            debug!(status, error = %err, "Request rejected");
        }
        let mut body = json!({ "error": err.to_string(), "status": status });
        if let Some(hint) = err.suggestion() {
            body["suggestion"] = Value::from(hint);
        }
        Self { status, body }
    }

    /// Error message of a failed reply.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

fn respond<T: Serialize>(success: u16, result: Result<T>) -> Reply {
    let serialized = result.and_then(|value| {
        serde_json::to_value(value).map_err(|e| ChirpError::with_context("serialize reply", e))
    });
    match serialized {
        Ok(body) => Reply {
            status: success,
            body,
        },
        Err(err) => Reply::from_error(&err),
    }
}

/// Register a new account. Does not need a session.
pub fn signup(storage: &Storage, form: &SignupForm<'_>) -> Reply {
    respond(CREATED, storage.create_user(form))
}

/// Delete the caller's account and everything that references it.
pub fn delete_account(storage: &Storage, session: &Session) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| {
            if !storage.delete_user(caller.id)? {
                return Err(ChirpError::not_found("user", &caller.handle));
            }
            Ok(json!({ "deleted": caller.handle, "user_id": caller.id }))
        }),
    )
}

pub fn post(storage: &Storage, session: &Session, content: &str) -> Reply {
    respond(
        CREATED,
        require_authenticated(session, |caller| storage.create_tweet(caller.id, content)),
    )
}

/// Delete one of the caller's tweets.
pub fn delete_tweet(storage: &Storage, session: &Session, tweet: TweetId) -> Reply {
    respond(
        OK,
        guard::delete_tweet(storage, session, tweet).map(|()| json!({ "deleted": tweet })),
    )
}

/// Tweet detail with like count and whether the caller liked it.
pub fn tweet_detail(storage: &Storage, session: &Session, tweet: TweetId) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| {
            storage
                .tweet_view(tweet, Some(caller.id))?
                .ok_or_else(|| ChirpError::not_found("tweet", tweet))
        }),
    )
}

pub fn follow(storage: &Storage, session: &Session, target_handle: &str) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| {
            SocialGraph::new(storage).follow(caller.id, target_handle)
        }),
    )
}

pub fn unfollow(storage: &Storage, session: &Session, target_handle: &str) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| {
            SocialGraph::new(storage).unfollow(caller.id, target_handle)
        }),
    )
}

/// Users `handle` follows.
pub fn following(
    storage: &Storage,
    session: &Session,
    handle: &str,
    limit: Option<usize>,
) -> Reply {
    respond(
        OK,
        require_authenticated(session, |_| {
            let user = storage.resolve(handle)?;
            SocialGraph::new(storage).list_following(user, limit)
        }),
    )
}

/// Users following `handle`.
pub fn followers(
    storage: &Storage,
    session: &Session,
    handle: &str,
    limit: Option<usize>,
) -> Reply {
    respond(
        OK,
        require_authenticated(session, |_| {
            let user = storage.resolve(handle)?;
            SocialGraph::new(storage).list_followers(user, limit)
        }),
    )
}

pub fn like(storage: &Storage, session: &Session, tweet: TweetId) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| Engagement::new(storage).like(caller.id, tweet)),
    )
}

pub fn unlike(storage: &Storage, session: &Session, tweet: TweetId) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| {
            Engagement::new(storage).unlike(caller.id, tweet)
        }),
    )
}

pub fn profile(storage: &Storage, session: &Session, handle: &str, limit: Option<usize>) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| {
            profile::profile(storage, caller.id, handle, limit)
        }),
    )
}

/// Home timeline: everyone's tweets, newest first.
pub fn home(storage: &Storage, session: &Session, limit: Option<usize>) -> Reply {
    respond(
        OK,
        require_authenticated(session, |caller| profile::home(storage, caller.id, limit)),
    )
}

pub fn stats(storage: &Storage) -> Reply {
    respond(OK, storage.stats())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD: &str = "Qaz105Edc";

    fn form<'a>(handle: &'a str, email: &'a str) -> SignupForm<'a> {
        SignupForm {
            handle,
            email,
            password1: PASSWORD,
            password2: PASSWORD,
        }
    }

    fn signed_in(storage: &Storage, handle: &str) -> Session {
        Session::sign_in(storage, Some(handle), Some(PASSWORD)).unwrap()
    }

    fn setup() -> (Storage, Session, Session) {
        let storage = Storage::open_memory().unwrap();
        assert_eq!(signup(&storage, &form("alice", "alice@example.com")).status, CREATED);
        assert_eq!(signup(&storage, &form("bob", "bob@example.com")).status, CREATED);
        let alice = signed_in(&storage, "alice");
        let bob = signed_in(&storage, "bob");
        (storage, alice, bob)
    }

    #[test]
    fn follow_replies() {
        let (storage, alice, _) = setup();

        let reply = follow(&storage, &alice, "bob");
        assert_eq!(reply.status, OK);
        assert_eq!(reply.body["follower_count"], 1);
        assert_eq!(reply.body["following_count"], 1);

        let reply = follow(&storage, &alice, "bob");
        assert_eq!(reply.status, 400);
        assert_eq!(reply.error_message(), Some("already following bob"));

        assert_eq!(follow(&storage, &alice, "alice").status, 400);
        assert_eq!(follow(&storage, &alice, "nobody").status, 404);
        assert_eq!(follow(&storage, &Session::Anonymous, "bob").status, 401);

        let reply = unfollow(&storage, &alice, "bob");
        assert_eq!(reply.status, OK);
        assert_eq!(reply.body["removed"], true);
        assert_eq!(unfollow(&storage, &alice, "bob").status, OK);
    }

    #[test]
    fn like_replies_match_form_posts() {
        let (storage, alice, bob) = setup();
        let reply = post(&storage, &bob, "hello");
        assert_eq!(reply.status, CREATED);
        let tweet = TweetId(reply.body["id"].as_i64().unwrap());

        let reply = like(&storage, &alice, tweet);
        assert_eq!(reply.status, OK);
        assert_eq!(
            reply.body,
            json!({ "tweet_id": tweet.0, "liked_count": 1, "is_liked": true })
        );

        let reply = unlike(&storage, &alice, tweet);
        assert_eq!(
            reply.body,
            json!({ "tweet_id": tweet.0, "liked_count": 0, "is_liked": false })
        );

        assert_eq!(like(&storage, &alice, TweetId(404)).status, 404);
        assert_eq!(like(&storage, &Session::Anonymous, tweet).status, 401);
    }

    #[test]
    fn delete_tweet_replies() {
        let (storage, alice, bob) = setup();
        let tweet = TweetId(post(&storage, &bob, "bob's").body["id"].as_i64().unwrap());

        let reply = delete_tweet(&storage, &alice, tweet);
        assert_eq!(reply.status, 403);
        assert_eq!(tweet_detail(&storage, &alice, tweet).status, OK);

        assert_eq!(delete_tweet(&storage, &bob, tweet).status, OK);
        assert_eq!(tweet_detail(&storage, &alice, tweet).status, 404);
        assert_eq!(delete_tweet(&storage, &bob, tweet).status, 404);
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let (storage, alice, _) = setup();
        assert_eq!(post(&storage, &alice, "").status, 400);
        assert_eq!(post(&storage, &alice, &"x".repeat(201)).status, 400);
        assert_eq!(signup(&storage, &form("bad handle", "x@example.com")).status, 400);
        assert_eq!(signup(&storage, &form("alice", "x@example.com")).status, 400);
        assert_eq!(signup(&storage, &form("carol", "")).status, 400);
    }

    #[test]
    fn signup_reply_reports_the_failing_field() {
        let storage = Storage::open_memory().unwrap();
        let reply = signup(
            &storage,
            &SignupForm {
                handle: "carol",
                email: "carol@example.com",
                password1: "12481632",
                password2: "12481632",
            },
        );
        assert_eq!(reply.status, 400);
        assert_eq!(
            reply.error_message(),
            Some("Invalid password2: the password is entirely numeric")
        );

        let reply = signup(&storage, &form("carol", "carol@example.com"));
        assert_eq!(reply.status, CREATED);
        assert_eq!(reply.body["handle"], "carol");
        assert_eq!(reply.body["email"], "carol@example.com");
        assert!(reply.body.get("password_hash").is_none());
    }

    #[test]
    fn listings_and_profile() {
        let (storage, alice, bob) = setup();
        follow(&storage, &alice, "bob");

        let reply = followers(&storage, &bob, "bob", None);
        assert_eq!(reply.status, OK);
        assert_eq!(reply.body[0]["handle"], "alice");
        assert_eq!(following(&storage, &alice, "bob", None).body, json!([]));
        assert_eq!(followers(&storage, &alice, "ghost", None).status, 404);

        let reply = profile(&storage, &alice, "bob", None);
        assert_eq!(reply.body["is_following"], true);
        let reply = profile(&storage, &bob, "alice", None);
        assert_eq!(reply.body["is_following"], false);
        assert_eq!(reply.body["following_count"], 1);
    }

    #[test]
    fn reads_require_a_session() {
        let (storage, _, bob) = setup();
        let tweet = TweetId(post(&storage, &bob, "hi").body["id"].as_i64().unwrap());
        let anonymous = Session::Anonymous;

        assert_eq!(tweet_detail(&storage, &anonymous, tweet).status, 401);
        assert_eq!(following(&storage, &anonymous, "bob", None).status, 401);
        assert_eq!(followers(&storage, &anonymous, "bob", None).status, 401);
        assert_eq!(profile(&storage, &anonymous, "bob", None).status, 401);
        assert_eq!(home(&storage, &anonymous, None).status, 401);

        // Signed in, the same reads succeed.
        assert_eq!(tweet_detail(&storage, &bob, tweet).status, OK);
        assert_eq!(home(&storage, &bob, None).status, OK);
    }

    #[test]
    fn delete_account_cascades() {
        let (storage, alice, bob) = setup();
        follow(&storage, &alice, "bob");
        let tweet = TweetId(post(&storage, &bob, "soon gone").body["id"].as_i64().unwrap());
        like(&storage, &alice, tweet);

        assert_eq!(delete_account(&storage, &bob).status, OK);
        let reply = stats(&storage);
        assert_eq!(reply.body["users_count"], 1);
        assert_eq!(reply.body["follows_count"], 0);
        assert_eq!(reply.body["likes_count"], 0);
        assert_eq!(home(&storage, &alice, None).body, json!([]));

        // The session still names bob, but bob is gone.
        assert_eq!(delete_account(&storage, &bob).status, 404);
    }
}
