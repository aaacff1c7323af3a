use crate::libs::core::{friendship, groups};
use crate::libs::core::models::{
    CanonicalPair, ConversationId, MessageScope, MuteTarget, UserId,
};
use crate::libs::storage::database::storage_traits::{ChatStore, ConversationStore, StoreError};
use crate::libs::storage::records::{ConversationRecord, ConversationSummary, MessageRecord};
use crate::ChatError;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Returns the single conversation for the pair, creating it on first contact.
pub fn resolve<S>(
    store: &mut S,
    a: UserId,
    b: UserId,
    now: DateTime<Utc>,
) -> Result<ConversationRecord, ChatError>
where
    S: ConversationStore + ?Sized,
{
    if a == b {
        return Err(ChatError::InvalidTarget(b));
    }
    let pair = CanonicalPair::of(a, b);
    if let Some(existing) = store.find_conversation(pair)? {
        return Ok(existing);
    }

    if store.insert_conversation_if_absent(pair, now)? {
        info!(user_low = %pair.low, user_high = %pair.high, "conversation created");
    } else {
        warn!(
            user_low = %pair.low,
            user_high = %pair.high,
            "conversation creation raced, reading the existing row"
        );
    }

    store.find_conversation(pair)?.ok_or_else(|| {
        ChatError::Store(StoreError::Inconsistent(format!(
            "conversation {}-{} missing after insert",
            pair.low, pair.high
        )))
    })
}

pub fn touch<S>(
    store: &mut S,
    conversation_id: ConversationId,
    now: DateTime<Utc>,
) -> Result<(), ChatError>
where
    S: ConversationStore + ?Sized,
{
    store.touch_conversation(conversation_id, now)?;
    Ok(())
}

/// Existing conversation between the two users, never creating one.
pub fn conversation_with<S>(
    store: &mut S,
    user: UserId,
    counterpart: UserId,
) -> Result<Option<ConversationRecord>, ChatError>
where
    S: ConversationStore + ?Sized,
{
    if user == counterpart {
        return Err(ChatError::InvalidTarget(counterpart));
    }
    Ok(store.find_conversation(CanonicalPair::of(user, counterpart))?)
}

pub fn list_for<S>(store: &mut S, user: UserId) -> Result<Vec<ConversationSummary>, ChatError>
where
    S: ChatStore + ?Sized,
{
    let conversations = store.list_conversations(user)?;
    let mut summaries = Vec::with_capacity(conversations.len());

    for conversation in conversations {
        let other_id = conversation.pair.other(user).ok_or_else(|| {
            StoreError::Inconsistent(format!(
                "conversation {} listed for non-participant {}",
                conversation.conversation_id, user
            ))
        })?;
        let other_user = store.load_user(other_id)?.ok_or_else(|| {
            StoreError::Inconsistent(format!("participant {other_id} has no profile"))
        })?;
        let scope = MessageScope::Direct(conversation.conversation_id);
        let last_message = store.last_message(scope, user)?;
        let is_muted = store.is_muted(user, MuteTarget::from(scope))?;

        summaries.push(ConversationSummary {
            conversation,
            other_user,
            last_message,
            is_muted,
        });
    }

    debug!(user = %user, count = summaries.len(), "conversations listed");
    Ok(summaries)
}

/// Messages exchanged with a friend, oldest first. Empty before the first message.
pub fn list_messages<S>(
    store: &mut S,
    user: UserId,
    counterpart: UserId,
) -> Result<Vec<MessageRecord>, ChatError>
where
    S: ChatStore + ?Sized,
{
    if !friendship::are_friends(store, user, counterpart)? {
        return Err(ChatError::Forbidden("users are not friends"));
    }
    match conversation_with(store, user, counterpart)? {
        Some(conversation) => Ok(store.list_messages(
            MessageScope::Direct(conversation.conversation_id),
            user,
        )?),
        None => Ok(Vec::new()),
    }
}

/// Mutes or unmutes a conversation or group the user takes part in.
pub fn set_muted<S>(
    store: &mut S,
    user: UserId,
    target: MuteTarget,
    muted: bool,
    now: DateTime<Utc>,
) -> Result<(), ChatError>
where
    S: ChatStore + ?Sized,
{
    match target {
        MuteTarget::Conversation(conversation_id) => {
            let conversation = store
                .load_conversation(conversation_id)?
                .ok_or(ChatError::NotFound("conversation"))?;
            if !conversation.pair.contains(user) {
                return Err(ChatError::NotFound("conversation"));
            }
        }
        MuteTarget::Group(group_id) => {
            groups::ensure_member(store, user, group_id)?;
        }
    }
    store.set_muted(user, target, muted, now)?;
    info!(user = %user, ?target, muted, "mute updated");
    Ok(())
}
