use crate::libs::core::models::{
    CanonicalPair, ConversationId, FriendshipStatus, GroupId, GroupRole, MatchQuality,
    MessageId, MessageScope, MuteTarget, StatusTarget, UserId,
};
use crate::libs::storage::records::{
    ConversationRecord, FriendshipRecord, GroupMemberRecord, GroupRecord, MessageRecord,
    NewGroup, NewMessage, PendingRequest, UserRecord,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub trait Transactional {
    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

pub trait UserStore {
    fn upsert_user(
        &mut self,
        user_id: UserId,
        username: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    fn load_user(&mut self, user_id: UserId) -> Result<Option<UserRecord>, StoreError>;
    fn user_exists(&mut self, user_id: UserId) -> Result<bool, StoreError>;
}

/// Rows are keyed by the canonical pair, so every lookup is a single match.
pub trait FriendshipStore {
    fn load_friendship(
        &mut self,
        pair: CanonicalPair,
    ) -> Result<Option<FriendshipRecord>, StoreError>;
    /// Returns `false` when a row for the pair already exists.
    fn insert_friendship(
        &mut self,
        pair: CanonicalPair,
        requested_by: UserId,
        status: FriendshipStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    fn update_friendship(
        &mut self,
        friendship_id: i64,
        status: FriendshipStatus,
        requested_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    fn upsert_blocked(
        &mut self,
        pair: CanonicalPair,
        blocked_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    fn delete_friendship(&mut self, friendship_id: i64) -> Result<bool, StoreError>;
    fn list_friends(&mut self, user_id: UserId) -> Result<Vec<UserRecord>, StoreError>;
    fn list_incoming_requests(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<PendingRequest>, StoreError>;
    fn list_outgoing_requests(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<PendingRequest>, StoreError>;
}

pub trait ConversationStore {
    fn find_conversation(
        &mut self,
        pair: CanonicalPair,
    ) -> Result<Option<ConversationRecord>, StoreError>;
    /// Returns `false` when another writer already created the pair's row.
    fn insert_conversation_if_absent(
        &mut self,
        pair: CanonicalPair,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    fn load_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError>;
    fn touch_conversation(
        &mut self,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    fn list_conversations(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<ConversationRecord>, StoreError>;
}

pub trait MessageStore {
    fn insert_message(&mut self, message: &NewMessage) -> Result<MessageId, StoreError>;
    fn load_message(&mut self, message_id: MessageId)
        -> Result<Option<MessageRecord>, StoreError>;
    /// Messages of `scope` in creation order, minus those `viewer` deleted for themself.
    fn list_messages(
        &mut self,
        scope: MessageScope,
        viewer: UserId,
    ) -> Result<Vec<MessageRecord>, StoreError>;
    fn last_message(
        &mut self,
        scope: MessageScope,
        viewer: UserId,
    ) -> Result<Option<MessageRecord>, StoreError>;
    /// Moves each message forward to `target` when `actor` is a recipient.
    /// With `group` set only that group's messages qualify, otherwise only direct ones.
    fn advance_status(
        &mut self,
        actor: UserId,
        message_ids: &[MessageId],
        target: StatusTarget,
        group: Option<GroupId>,
    ) -> Result<usize, StoreError>;
    fn mark_read_from(
        &mut self,
        conversation_id: ConversationId,
        sender: UserId,
    ) -> Result<usize, StoreError>;
    fn update_content(
        &mut self,
        message_id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    fn mark_deleted(
        &mut self,
        message_id: MessageId,
        for_everyone: bool,
        placeholder: &str,
    ) -> Result<(), StoreError>;
    /// Messages containing `query` literally and case-insensitively, from groups
    /// `user` belongs to and conversations with current friends. Best match
    /// first, then newest, at most `limit` rows.
    fn search_messages(
        &mut self,
        user_id: UserId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(MessageRecord, MatchQuality)>, StoreError>;
}

pub trait GroupStore {
    fn insert_group(
        &mut self,
        group: &NewGroup,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<GroupId, StoreError>;
    fn load_group(&mut self, group_id: GroupId) -> Result<Option<GroupRecord>, StoreError>;
    /// Returns `false` when the user is already a member.
    fn insert_member(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        role: GroupRole,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    fn member_role(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<Option<GroupRole>, StoreError>;
    fn remove_member(&mut self, group_id: GroupId, user_id: UserId) -> Result<bool, StoreError>;
    fn list_members(&mut self, group_id: GroupId) -> Result<Vec<GroupMemberRecord>, StoreError>;
    fn list_groups_for(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<(GroupRecord, GroupRole, u32)>, StoreError>;
    fn touch_group(&mut self, group_id: GroupId, now: DateTime<Utc>) -> Result<(), StoreError>;
}

pub trait MuteStore {
    fn set_muted(
        &mut self,
        user_id: UserId,
        target: MuteTarget,
        muted: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    fn is_muted(&mut self, user_id: UserId, target: MuteTarget) -> Result<bool, StoreError>;
}

pub trait ChatStore:
    UserStore + FriendshipStore + ConversationStore + MessageStore + GroupStore + MuteStore
{
}

impl<T> ChatStore for T where
    T: UserStore + FriendshipStore + ConversationStore + MessageStore + GroupStore + MuteStore
{
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sqlite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ConnectionPool Error: {0}")]
    ConnectionPool(#[from] r2d2::Error),
    #[error("Inconsistent Store: {0}")]
    Inconsistent(String),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
