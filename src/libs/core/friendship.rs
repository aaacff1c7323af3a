use crate::libs::core::models::{
    CanonicalPair, FriendAction, FriendStatus, FriendshipStatus, UserId,
};
use crate::libs::storage::database::storage_traits::{FriendshipStore, StoreError, UserStore};
use crate::libs::storage::records::{FriendshipRecord, PendingRequest, UserRecord};
use crate::ChatError;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

fn conflict_for(record: &FriendshipRecord) -> Option<ChatError> {
    match record.status {
        FriendshipStatus::Accepted => Some(ChatError::AlreadyFriends),
        FriendshipStatus::Pending => Some(ChatError::RequestPending),
        FriendshipStatus::Blocked => Some(ChatError::Blocked),
        FriendshipStatus::Rejected => None,
    }
}

fn ensure_target<S>(store: &mut S, actor: UserId, target: UserId) -> Result<(), ChatError>
where
    S: UserStore + ?Sized,
{
    if actor == target || !store.user_exists(target)? {
        return Err(ChatError::InvalidTarget(target));
    }
    if !store.user_exists(actor)? {
        return Err(ChatError::NotFound("user"));
    }
    Ok(())
}

fn reload<S>(store: &mut S, pair: CanonicalPair) -> Result<FriendshipRecord, ChatError>
where
    S: FriendshipStore + ?Sized,
{
    store.load_friendship(pair)?.ok_or_else(|| {
        ChatError::Store(StoreError::Inconsistent(format!(
            "friendship {}-{} vanished inside its transaction",
            pair.low, pair.high
        )))
    })
}

pub fn send_request<S>(
    store: &mut S,
    requester: UserId,
    target: UserId,
    now: DateTime<Utc>,
) -> Result<FriendshipRecord, ChatError>
where
    S: FriendshipStore + UserStore + ?Sized,
{
    ensure_target(store, requester, target)?;
    let pair = CanonicalPair::of(requester, target);

    match store.load_friendship(pair)? {
        Some(existing) => {
            if let Some(conflict) = conflict_for(&existing) {
                return Err(conflict);
            }
            // A rejected row left behind by an older revision is reopened.
            store.update_friendship(
                existing.friendship_id,
                FriendshipStatus::Pending,
                requester,
                now,
            )?;
        }
        None => {
            if !store.insert_friendship(pair, requester, FriendshipStatus::Pending, now)? {
                warn!(
                    requester = %requester,
                    target = %target,
                    "friend request lost a creation race"
                );
                let winner = reload(store, pair)?;
                return Err(conflict_for(&winner).unwrap_or(ChatError::RequestPending));
            }
        }
    }

    info!(requester = %requester, target = %target, "friend request sent");
    reload(store, pair)
}

/// Accepts or rejects the request `other` sent to `responder`.
/// Returns the relationship as seen by the responder afterwards.
pub fn respond<S>(
    store: &mut S,
    responder: UserId,
    other: UserId,
    action: FriendAction,
    now: DateTime<Utc>,
) -> Result<FriendStatus, ChatError>
where
    S: FriendshipStore + ?Sized,
{
    // Nobody can hold a request from themself.
    if responder == other {
        return Err(ChatError::NotFound("friend request"));
    }
    let pair = CanonicalPair::of(responder, other);
    let request = match store.load_friendship(pair)? {
        Some(record) if record.status == FriendshipStatus::Pending => record,
        _ => return Err(ChatError::NotFound("friend request")),
    };
    if request.requested_by == responder {
        return Err(ChatError::Forbidden("cannot respond to your own friend request"));
    }

    match action {
        FriendAction::Accept => {
            store.update_friendship(
                request.friendship_id,
                FriendshipStatus::Accepted,
                request.requested_by,
                now,
            )?;
            info!(responder = %responder, requester = %other, "friend request accepted");
            Ok(FriendStatus::Friend)
        }
        FriendAction::Reject => {
            store.delete_friendship(request.friendship_id)?;
            info!(responder = %responder, requester = %other, "friend request rejected");
            Ok(FriendStatus::None)
        }
    }
}

pub fn remove<S>(store: &mut S, user: UserId, friend: UserId) -> Result<(), ChatError>
where
    S: FriendshipStore + ?Sized,
{
    let pair = CanonicalPair::of(user, friend);
    match store.load_friendship(pair)? {
        Some(record) if record.status == FriendshipStatus::Accepted => {
            store.delete_friendship(record.friendship_id)?;
            info!(user = %user, friend = %friend, "friendship removed");
            Ok(())
        }
        _ => Err(ChatError::NotFound("friendship")),
    }
}

/// Overwrites whatever relationship the pair had with a terminal block.
pub fn block<S>(
    store: &mut S,
    blocker: UserId,
    target: UserId,
    now: DateTime<Utc>,
) -> Result<(), ChatError>
where
    S: FriendshipStore + UserStore + ?Sized,
{
    ensure_target(store, blocker, target)?;
    store.upsert_blocked(CanonicalPair::of(blocker, target), blocker, now)?;
    info!(blocker = %blocker, target = %target, "user blocked");
    Ok(())
}

pub fn status_of<S>(store: &mut S, user: UserId, other: UserId) -> Result<FriendStatus, ChatError>
where
    S: FriendshipStore + ?Sized,
{
    if user == other {
        return Ok(FriendStatus::None);
    }
    let status = match store.load_friendship(CanonicalPair::of(user, other))? {
        None => FriendStatus::None,
        Some(record) => match record.status {
            FriendshipStatus::Pending if record.requested_by == user => FriendStatus::PendingSent,
            FriendshipStatus::Pending => FriendStatus::PendingReceived,
            FriendshipStatus::Accepted => FriendStatus::Friend,
            FriendshipStatus::Blocked => FriendStatus::Blocked,
            FriendshipStatus::Rejected => FriendStatus::None,
        },
    };
    debug!(user = %user, other = %other, status = %status, "friend status resolved");
    Ok(status)
}

pub fn are_friends<S>(store: &mut S, a: UserId, b: UserId) -> Result<bool, ChatError>
where
    S: FriendshipStore + ?Sized,
{
    Ok(status_of(store, a, b)? == FriendStatus::Friend)
}

pub fn list_friends<S>(store: &mut S, user: UserId) -> Result<Vec<UserRecord>, ChatError>
where
    S: FriendshipStore + ?Sized,
{
    Ok(store.list_friends(user)?)
}

/// Requests other users sent to `user`, newest first.
pub fn list_pending_requests<S>(
    store: &mut S,
    user: UserId,
) -> Result<Vec<PendingRequest>, ChatError>
where
    S: FriendshipStore + ?Sized,
{
    Ok(store.list_incoming_requests(user)?)
}

pub fn list_sent_requests<S>(store: &mut S, user: UserId) -> Result<Vec<PendingRequest>, ChatError>
where
    S: FriendshipStore + ?Sized,
{
    Ok(store.list_outgoing_requests(user)?)
}
