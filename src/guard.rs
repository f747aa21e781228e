//! Authentication and ownership guards composed in front of handlers.
//!
//! A handler that needs a signed-in user is wrapped in
//! [`require_authenticated`]; a handler that mutates someone's row is further
//! wrapped in [`require_owner`]. The caller is always passed explicitly.

use tracing::{debug, warn};

use crate::error::{ChirpError, Result};
use crate::model::{TweetId, UserId};
use crate::password;
use crate::store::{PostStore, UserDirectory};

/// The authenticated user a request runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub handle: String,
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(Caller),
}

impl Session {
    /// Sign in as `handle` with `password`. No handle gives an anonymous
    /// session.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` if the handle does not belong to any user or the
    /// password is missing or wrong; other store errors are passed through.
    pub fn sign_in<D: UserDirectory>(
        directory: &D,
        handle: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        let Some(handle) = handle.map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(Self::Anonymous);
        };
        let id = match directory.resolve(handle) {
            Ok(id) => id,
            Err(ChirpError::NotFound { .. }) => {
                warn!(handle = %handle, "Sign-in with unknown handle");
                return Err(ChirpError::Unauthenticated);
            }
            Err(e) => return Err(e),
        };

        let Some(password) = password.filter(|p| !p.is_empty()) else {
            warn!(handle = %handle, "Sign-in without a password");
            return Err(ChirpError::Unauthenticated);
        };
        if !password::verify(password, &directory.password_hash(id)?)? {
            warn!(user = %id, "Sign-in with wrong password");
            return Err(ChirpError::Unauthenticated);
        }

        let handle = directory.handle_of(id)?;
        debug!(user = %id, handle = %handle, "Signed in");
        Ok(Self::Authenticated(Caller { id, handle }))
    }

    #[must_use]
    pub const fn caller(&self) -> Option<&Caller> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(caller) => Some(caller),
        }
    }
}

/// Run `handler` with the session's caller, or fail with `Unauthenticated`.
///
/// # Errors
///
/// `Unauthenticated` for an anonymous session, otherwise whatever `handler` returns.
pub fn require_authenticated<T>(
    session: &Session,
    handler: impl FnOnce(&Caller) -> Result<T>,
) -> Result<T> {
    match session.caller() {
        Some(caller) => handler(caller),
        None => Err(ChirpError::Unauthenticated),
    }
}

/// Run `handler` only if `owner_of` names `caller` as the owner.
///
/// `owner_of` reports `NotFound` for a missing row, so a missing row and a
/// row owned by someone else stay distinguishable (404 vs 403).
///
/// # Errors
///
/// Whatever `owner_of` returns, `Forbidden` if the owner differs, otherwise
/// whatever `handler` returns.
pub fn require_owner<T>(
    caller: &Caller,
    owner_of: impl FnOnce() -> Result<UserId>,
    handler: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let owner = owner_of()?;
    if owner != caller.id {
        warn!(caller = %caller.id, owner = %owner, "Ownership check failed");
        return Err(ChirpError::forbidden(format!(
            "{} is not the owner",
            caller.handle
        )));
    }
    handler()
}

/// Delete a tweet through the ownership gate.
///
/// The store repeats the ownership test inside its delete statement, so an
/// ownership change between the check and the delete still cannot remove
/// another user's tweet.
///
/// # Errors
///
/// `Unauthenticated`, `NotFound` for a missing tweet, `Forbidden` when the
/// caller is not the author.
pub fn delete_tweet<S: PostStore>(store: &S, session: &Session, tweet: TweetId) -> Result<()> {
    require_authenticated(session, |caller| {
        require_owner(
            caller,
            || store.tweet_author(tweet),
            || store.delete_tweet(tweet, caller.id),
        )
    })
}
