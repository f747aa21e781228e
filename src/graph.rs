//! Follow relationships between users.
//!
//! [`SocialGraph`] owns the transition rules for follow edges. Per ordered
//! pair (A, B) there are two states, no edge and edge:
//!
//! | Operation | No edge          | Edge                      |
//! |-----------|------------------|---------------------------|
//! | follow    | edge             | `AlreadyExists`, unchanged |
//! | unfollow  | no edge (no-op)  | no edge                   |
//!
//! Self-follow and self-unfollow are refused with `InvalidOperation`.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{ChirpError, Result};
use crate::model::{FollowCounts, FollowResult, PeerEdge, UnfollowResult, UserId};
use crate::store::{EdgeInsert, EdgeStore, UserDirectory};

/// Social graph manager over any store that can resolve handles and hold edges.
pub struct SocialGraph<'a, S> {
    store: &'a S,
}

impl<'a, S> SocialGraph<'a, S>
where
    S: UserDirectory + EdgeStore,
{
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve `target_handle` and refuse the caller's own handle.
    fn resolve_other(&self, caller: UserId, target_handle: &str, verb: &str) -> Result<UserId> {
        let target = self.store.resolve(target_handle)?;
        if target == caller {
            return Err(ChirpError::invalid_operation(format!("cannot {verb} self")));
        }
        Ok(target)
    }

    /// `caller` starts following `target_handle`.
    ///
    /// A repeated follow is reported as `AlreadyExists`. Whether the edge was
    /// already there is decided by the insert itself, so two racing follows
    /// of the same pair produce one edge and one `AlreadyExists`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown handle, `InvalidOperation` for a self-follow,
    /// `AlreadyExists` if the edge exists, `Conflict` if the store stayed locked.
    pub fn follow(&self, caller: UserId, target_handle: &str) -> Result<FollowResult> {
        let target = self.resolve_other(caller, target_handle, "follow")?;

        match self.store.insert_follow(caller, target, Utc::now())? {
            EdgeInsert::Inserted => {
                info!(follower = %caller, following = %target, "Follow edge created");
            }
            EdgeInsert::AlreadyPresent => {
                debug!(follower = %caller, following = %target, "Follow edge already present");
                return Err(ChirpError::already_exists(format!(
                    "already following {}",
                    self.store.handle_of(target)?
                )));
            }
        }

        Ok(FollowResult {
            target_id: target,
            target_handle: self.store.handle_of(target)?,
            follower_count: self.store.follow_counts(target)?.followers,
            following_count: self.store.follow_counts(caller)?.following,
        })
    }

    /// `caller` stops following `target_handle`. Missing edges are a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown handle, `InvalidOperation` for a self-unfollow.
    pub fn unfollow(&self, caller: UserId, target_handle: &str) -> Result<UnfollowResult> {
        let target = self.resolve_other(caller, target_handle, "unfollow")?;

        let removed = self.store.delete_follow(caller, target)?;
        if removed {
            info!(follower = %caller, following = %target, "Follow edge removed");
        } else {
            debug!(follower = %caller, following = %target, "Unfollow without edge");
        }

        Ok(UnfollowResult {
            target_id: target,
            target_handle: self.store.handle_of(target)?,
            removed,
            follower_count: self.store.follow_counts(target)?.followers,
            following_count: self.store.follow_counts(caller)?.following,
        })
    }

    /// Users `user` follows, most recent edge first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn list_following(&self, user: UserId, limit: Option<usize>) -> Result<Vec<PeerEdge>> {
        self.store.list_following(user, limit)
    }

    /// Users following `user`, most recent edge first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn list_followers(&self, user: UserId, limit: Option<usize>) -> Result<Vec<PeerEdge>> {
        self.store.list_followers(user, limit)
    }

    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn counts(&self, user: UserId) -> Result<FollowCounts> {
        self.store.follow_counts(user)
    }

    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn is_following(&self, follower: UserId, following: UserId) -> Result<bool> {
        Ok(self.store.follow_edge(follower, following)?.is_some())
    }
}
