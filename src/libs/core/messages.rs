use crate::libs::config::ChatConfig;
use crate::libs::core::{conversation, friendship};
use crate::libs::core::models::{GroupId, MessageId, MessageScope, StatusTarget, UserId};
use crate::libs::storage::database::storage_traits::{ChatStore, MessageStore, StoreError};
use crate::libs::storage::records::{MessageRecord, NewMessage};
use crate::ChatError;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

/// Time bound and placeholder applied to edits and deletes.
#[derive(Clone, Debug)]
pub struct LifecycleRules {
    pub window: TimeDelta,
    pub deleted_placeholder: String,
}

impl LifecycleRules {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            window: TimeDelta::from_std(config.mutability_window).unwrap_or(TimeDelta::MAX),
            deleted_placeholder: config.deleted_placeholder.clone(),
        }
    }

    /// Measured from creation, so edits never extend it.
    pub fn is_mutable(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - created_at <= self.window
    }
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

fn reload<S>(store: &mut S, message_id: MessageId) -> Result<MessageRecord, ChatError>
where
    S: MessageStore + ?Sized,
{
    store.load_message(message_id)?.ok_or_else(|| {
        ChatError::Store(StoreError::Inconsistent(format!(
            "message {message_id} missing after write"
        )))
    })
}

/// Checks `user` may post into `scope`: a friend of the other participant for
/// direct threads, a member for groups.
pub fn ensure_can_post<S>(store: &mut S, user: UserId, scope: MessageScope) -> Result<(), ChatError>
where
    S: ChatStore + ?Sized,
{
    match scope {
        MessageScope::Direct(conversation_id) => {
            let conversation = store
                .load_conversation(conversation_id)?
                .ok_or(ChatError::NotFound("conversation"))?;
            let other = conversation
                .pair
                .other(user)
                .ok_or(ChatError::Forbidden("not a participant of this conversation"))?;
            if !friendship::are_friends(store, user, other)? {
                return Err(ChatError::Forbidden("users are not friends"));
            }
        }
        MessageScope::Group(group_id) => {
            store
                .load_group(group_id)?
                .ok_or(ChatError::NotFound("group"))?;
            if store.member_role(group_id, user)?.is_none() {
                return Err(ChatError::NotMember(group_id));
            }
        }
    }
    Ok(())
}

pub fn create<S>(
    store: &mut S,
    sender: UserId,
    scope: MessageScope,
    content: &str,
    reply_to: Option<MessageId>,
    now: DateTime<Utc>,
) -> Result<MessageRecord, ChatError>
where
    S: ChatStore + ?Sized,
{
    if content.trim().is_empty() {
        return Err(ChatError::InvalidInput("message content is empty"));
    }
    ensure_can_post(store, sender, scope)?;

    if let Some(reply_id) = reply_to {
        match store.load_message(reply_id)? {
            Some(parent) if parent.scope == scope => {}
            _ => return Err(ChatError::InvalidReply(reply_id)),
        }
    }

    let message_id = store.insert_message(&NewMessage::new(
        scope,
        sender,
        content.to_string(),
        reply_to,
        now,
    ))?;
    match scope {
        MessageScope::Direct(conversation_id) => store.touch_conversation(conversation_id, now)?,
        MessageScope::Group(group_id) => store.touch_group(group_id, now)?,
    }

    info!(message = %message_id, sender = %sender, ?scope, "message created");
    reload(store, message_id)
}

/// Moves the recipient-visible status forward. Ids the actor sent, cannot see,
/// or that are already at or past `target` are skipped.
pub fn advance_status<S>(
    store: &mut S,
    actor: UserId,
    message_ids: &[MessageId],
    target: StatusTarget,
    group: Option<GroupId>,
) -> Result<usize, ChatError>
where
    S: MessageStore + ?Sized,
{
    if message_ids.is_empty() {
        return Err(ChatError::InvalidInput("no message ids given"));
    }
    let updated = store.advance_status(actor, message_ids, target, group)?;
    if updated < message_ids.len() {
        debug!(
            actor = %actor,
            requested = message_ids.len(),
            updated,
            "skipped messages during status update"
        );
    }
    Ok(updated)
}

pub fn mark_conversation_read<S>(
    store: &mut S,
    actor: UserId,
    counterpart: UserId,
) -> Result<usize, ChatError>
where
    S: ChatStore + ?Sized,
{
    let Some(conversation) = conversation::conversation_with(store, actor, counterpart)? else {
        return Ok(0);
    };
    let updated = store.mark_read_from(conversation.conversation_id, counterpart)?;
    debug!(actor = %actor, counterpart = %counterpart, updated, "conversation marked read");
    Ok(updated)
}

fn load_own<S>(store: &mut S, actor: UserId, message_id: MessageId) -> Result<MessageRecord, ChatError>
where
    S: MessageStore + ?Sized,
{
    let message = store
        .load_message(message_id)?
        .ok_or(ChatError::NotFound("message"))?;
    if message.sender_id != actor {
        return Err(ChatError::Forbidden("only the sender can change a message"));
    }
    Ok(message)
}

pub fn edit<S>(
    store: &mut S,
    rules: &LifecycleRules,
    actor: UserId,
    message_id: MessageId,
    content: &str,
    now: DateTime<Utc>,
) -> Result<MessageRecord, ChatError>
where
    S: MessageStore + ?Sized,
{
    if content.trim().is_empty() {
        return Err(ChatError::InvalidInput("message content is empty"));
    }
    let message = load_own(store, actor, message_id)?;
    if message.is_deleted {
        return Err(ChatError::InvalidState(message_id));
    }
    if !rules.is_mutable(message.created_at, now) {
        return Err(ChatError::EditWindowExpired(message_id));
    }

    store.update_content(message_id, content, now)?;
    info!(message = %message_id, sender = %actor, "message edited");
    reload(store, message_id)
}

pub fn delete<S>(
    store: &mut S,
    rules: &LifecycleRules,
    actor: UserId,
    message_id: MessageId,
    for_everyone: bool,
    now: DateTime<Utc>,
) -> Result<MessageRecord, ChatError>
where
    S: MessageStore + ?Sized,
{
    let message = load_own(store, actor, message_id)?;
    if message.deleted_for_everyone || (message.is_deleted && !for_everyone) {
        return Ok(message);
    }
    if for_everyone && !rules.is_mutable(message.created_at, now) {
        return Err(ChatError::DeleteWindowExpired(message_id));
    }

    store.mark_deleted(message_id, for_everyone, &rules.deleted_placeholder)?;
    info!(message = %message_id, sender = %actor, for_everyone, "message deleted");
    reload(store, message_id)
}
