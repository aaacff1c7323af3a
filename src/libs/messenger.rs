use crate::libs::config::ChatConfig;
use crate::libs::core::clock::{Clock, SystemClock};
use crate::libs::core::messages::LifecycleRules;
use crate::libs::core::models::{
    FriendAction, FriendStatus, GroupId, MessageId, MessageScope, MuteTarget, StatusTarget,
    UserId,
};
use crate::libs::core::search::{self, SearchHit};
use crate::libs::core::{conversation, friendship, groups, messages};
use crate::libs::presence::PresenceStore;
use crate::libs::storage::database::database;
use crate::libs::storage::database::storage_sqllite::{SqliteStore, SqliteTransaction};
use crate::libs::storage::database::storage_traits::{Transactional, UserStore};
use crate::libs::storage::records::{
    ConversationSummary, FriendshipRecord, GroupDetails, GroupSummary, MessageRecord, NewGroup,
    PendingRequest, UserRecord,
};
use crate::ChatError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

/// Entry point for every social operation. Each call runs in its own store
/// transaction, committed on success and rolled back on any error.
pub struct Messenger {
    store: SqliteStore,
    presence: PresenceStore,
    clock: Arc<dyn Clock>,
    rules: LifecycleRules,
    config: ChatConfig,
}

impl Messenger {
    pub fn open(config: ChatConfig) -> Result<Self, ChatError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ChatConfig, clock: Arc<dyn Clock>) -> Result<Self, ChatError> {
        let store = SqliteStore::open(&config)?;
        database::migrate(&store)?;

        info!(db_path = %config.db_path.display(), "messenger ready");
        Ok(Self {
            store,
            presence: PresenceStore::new(clock.clone(), config.typing_ttl),
            clock,
            rules: LifecycleRules::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    pub fn schema_version(&self) -> Result<Option<String>, ChatError> {
        Ok(database::schema_version(&self.store)?)
    }

    fn with_transaction<T, F>(&self, operation: &'static str, f: F) -> Result<T, ChatError>
    where
        F: FnOnce(&mut SqliteTransaction<'_>, DateTime<Utc>) -> Result<T, ChatError>,
    {
        self.run_transaction(operation, false, f)
    }

    fn with_read_transaction<T, F>(&self, operation: &'static str, f: F) -> Result<T, ChatError>
    where
        F: FnOnce(&mut SqliteTransaction<'_>, DateTime<Utc>) -> Result<T, ChatError>,
    {
        self.run_transaction(operation, true, f)
    }

    fn run_transaction<T, F>(
        &self,
        operation: &'static str,
        read_only: bool,
        f: F,
    ) -> Result<T, ChatError>
    where
        F: FnOnce(&mut SqliteTransaction<'_>, DateTime<Utc>) -> Result<T, ChatError>,
    {
        let mut connection = self.store.new_connection()?;
        let mut sqlite_transaction = if read_only {
            SqliteTransaction::read_only(&mut connection)?
        } else {
            SqliteTransaction::new(&mut connection)?
        };
        let now = self.clock.now();

        match f(&mut sqlite_transaction, now) {
            Ok(value) => {
                sqlite_transaction.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = sqlite_transaction.rollback() {
                    error!(operation, error = %rollback_err, "rollback failed");
                }
                if let ChatError::Store(store_err) = &err {
                    error!(operation, error = %store_err, "store failure");
                }
                Err(err)
            }
        }
    }

    // Users

    pub fn register_user(
        &self,
        user_id: UserId,
        username: &str,
        display_name: Option<&str>,
    ) -> Result<UserRecord, ChatError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::InvalidInput("username is empty"));
        }
        self.with_transaction("register_user", |tx, now| {
            tx.upsert_user(user_id, username, display_name, now)
                .map_err(|err| {
                    if err.is_constraint_violation() {
                        ChatError::UsernameTaken(username.to_string())
                    } else {
                        ChatError::Store(err)
                    }
                })?;
            tx.load_user(user_id)?.ok_or(ChatError::NotFound("user"))
        })
    }

    pub fn user(&self, user_id: UserId) -> Result<UserRecord, ChatError> {
        self.with_read_transaction("user", |tx, _| {
            tx.load_user(user_id)?.ok_or(ChatError::NotFound("user"))
        })
    }

    // Friendship ledger

    pub fn send_friend_request(
        &self,
        requester: UserId,
        target: UserId,
    ) -> Result<FriendshipRecord, ChatError> {
        self.with_transaction("send_friend_request", |tx, now| {
            friendship::send_request(tx, requester, target, now)
        })
    }

    pub fn respond_friend_request(
        &self,
        responder: UserId,
        other: UserId,
        action: FriendAction,
    ) -> Result<FriendStatus, ChatError> {
        self.with_transaction("respond_friend_request", |tx, now| {
            friendship::respond(tx, responder, other, action, now)
        })
    }

    pub fn remove_friend(&self, user: UserId, friend: UserId) -> Result<(), ChatError> {
        self.with_transaction("remove_friend", |tx, _| friendship::remove(tx, user, friend))
    }

    pub fn block_user(&self, blocker: UserId, target: UserId) -> Result<(), ChatError> {
        self.with_transaction("block_user", |tx, now| {
            friendship::block(tx, blocker, target, now)
        })
    }

    pub fn friend_status(&self, user: UserId, other: UserId) -> Result<FriendStatus, ChatError> {
        self.with_read_transaction("friend_status", |tx, _| friendship::status_of(tx, user, other))
    }

    pub fn are_friends(&self, a: UserId, b: UserId) -> Result<bool, ChatError> {
        self.with_read_transaction("are_friends", |tx, _| friendship::are_friends(tx, a, b))
    }

    pub fn list_friends(&self, user: UserId) -> Result<Vec<UserRecord>, ChatError> {
        self.with_read_transaction("list_friends", |tx, _| friendship::list_friends(tx, user))
    }

    pub fn list_pending_requests(&self, user: UserId) -> Result<Vec<PendingRequest>, ChatError> {
        self.with_read_transaction("list_pending_requests", |tx, _| {
            friendship::list_pending_requests(tx, user)
        })
    }

    pub fn list_sent_requests(&self, user: UserId) -> Result<Vec<PendingRequest>, ChatError> {
        self.with_read_transaction("list_sent_requests", |tx, _| {
            friendship::list_sent_requests(tx, user)
        })
    }

    // Direct messages

    pub fn send_message(
        &self,
        sender: UserId,
        recipient: UserId,
        content: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRecord, ChatError> {
        if sender == recipient {
            return Err(ChatError::InvalidTarget(recipient));
        }
        self.with_transaction("send_message", |tx, now| {
            match friendship::status_of(tx, sender, recipient)? {
                FriendStatus::Friend => {}
                FriendStatus::Blocked => return Err(ChatError::Blocked),
                _ => return Err(ChatError::Forbidden("users are not friends")),
            }
            let conversation = conversation::resolve(tx, sender, recipient, now)?;
            messages::create(
                tx,
                sender,
                MessageScope::Direct(conversation.conversation_id),
                content,
                reply_to,
                now,
            )
        })
    }

    pub fn list_conversations(&self, user: UserId) -> Result<Vec<ConversationSummary>, ChatError> {
        self.with_read_transaction("list_conversations", |tx, _| conversation::list_for(tx, user))
    }

    pub fn list_messages(
        &self,
        user: UserId,
        counterpart: UserId,
    ) -> Result<Vec<MessageRecord>, ChatError> {
        self.with_read_transaction("list_messages", |tx, _| {
            conversation::list_messages(tx, user, counterpart)
        })
    }

    /// Advances direct messages the user received. Returns how many changed.
    pub fn set_status(
        &self,
        user: UserId,
        message_ids: &[MessageId],
        target: StatusTarget,
    ) -> Result<usize, ChatError> {
        self.with_transaction("set_status", |tx, _| {
            messages::advance_status(tx, user, message_ids, target, None)
        })
    }

    pub fn mark_read(&self, user: UserId, counterpart: UserId) -> Result<usize, ChatError> {
        self.with_transaction("mark_read", |tx, _| {
            messages::mark_conversation_read(tx, user, counterpart)
        })
    }

    /// Edits a direct or group message.
    pub fn edit_message(
        &self,
        user: UserId,
        message_id: MessageId,
        content: &str,
    ) -> Result<MessageRecord, ChatError> {
        self.with_transaction("edit_message", |tx, now| {
            messages::edit(tx, &self.rules, user, message_id, content, now)
        })
    }

    pub fn delete_message(
        &self,
        user: UserId,
        message_id: MessageId,
        for_everyone: bool,
    ) -> Result<MessageRecord, ChatError> {
        self.with_transaction("delete_message", |tx, now| {
            messages::delete(tx, &self.rules, user, message_id, for_everyone, now)
        })
    }

    // Presence

    pub fn set_typing(
        &self,
        user: UserId,
        counterpart: UserId,
        is_typing: bool,
    ) -> Result<(), ChatError> {
        if user == counterpart {
            return Err(ChatError::InvalidTarget(counterpart));
        }
        self.presence.set_typing(user, counterpart, is_typing);
        Ok(())
    }

    /// Whether `counterpart` is typing to `user`.
    pub fn is_typing(&self, user: UserId, counterpart: UserId) -> Result<bool, ChatError> {
        if user == counterpart {
            return Err(ChatError::InvalidTarget(counterpart));
        }
        Ok(self.presence.is_typing(user, counterpart))
    }

    // Groups

    pub fn create_group(
        &self,
        creator: UserId,
        group: NewGroup,
        members: &[UserId],
    ) -> Result<GroupDetails, ChatError> {
        self.with_transaction("create_group", |tx, now| {
            groups::create(tx, creator, &group, members, now)
        })
    }

    pub fn add_member(
        &self,
        actor: UserId,
        group_id: GroupId,
        new_user: UserId,
    ) -> Result<(), ChatError> {
        self.with_transaction("add_member", |tx, now| {
            groups::add_member(tx, actor, group_id, new_user, now)
        })
    }

    pub fn remove_member(
        &self,
        actor: UserId,
        group_id: GroupId,
        target: UserId,
    ) -> Result<(), ChatError> {
        self.with_transaction("remove_member", |tx, _| {
            groups::remove_member(tx, actor, group_id, target)
        })
    }

    pub fn leave_group(&self, user: UserId, group_id: GroupId) -> Result<(), ChatError> {
        self.with_transaction("leave_group", |tx, _| groups::leave(tx, user, group_id))
    }

    pub fn group_details(&self, user: UserId, group_id: GroupId) -> Result<GroupDetails, ChatError> {
        self.with_read_transaction("group_details", |tx, _| {
            groups::get_details(tx, group_id, user)
        })
    }

    pub fn list_groups(&self, user: UserId) -> Result<Vec<GroupSummary>, ChatError> {
        self.with_read_transaction("list_groups", |tx, _| groups::list_groups(tx, user))
    }

    pub fn send_group_message(
        &self,
        sender: UserId,
        group_id: GroupId,
        content: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRecord, ChatError> {
        self.with_transaction("send_group_message", |tx, now| {
            messages::create(tx, sender, MessageScope::Group(group_id), content, reply_to, now)
        })
    }

    pub fn list_group_messages(
        &self,
        user: UserId,
        group_id: GroupId,
    ) -> Result<Vec<MessageRecord>, ChatError> {
        self.with_read_transaction("list_group_messages", |tx, _| {
            groups::list_messages(tx, user, group_id)
        })
    }

    pub fn set_group_status(
        &self,
        user: UserId,
        group_id: GroupId,
        message_ids: &[MessageId],
        target: StatusTarget,
    ) -> Result<usize, ChatError> {
        self.with_transaction("set_group_status", |tx, _| {
            groups::ensure_member(tx, user, group_id)?;
            messages::advance_status(tx, user, message_ids, target, Some(group_id))
        })
    }

    // Search and mute

    pub fn search_messages(&self, user: UserId, query: &str) -> Result<Vec<SearchHit>, ChatError> {
        self.with_read_transaction("search_messages", |tx, _| {
            search::search(
                tx,
                user,
                query,
                self.config.min_search_len,
                self.config.search_limit,
            )
        })
    }

    pub fn mute(&self, user: UserId, target: MuteTarget, muted: bool) -> Result<(), ChatError> {
        self.with_transaction("mute", |tx, now| {
            conversation::set_muted(tx, user, target, muted, now)
        })
    }
}
