use crate::libs::core::models::{
    CanonicalPair, ConversationId, FriendshipStatus, GroupId, GroupRole, MessageId,
    MessageScope, MessageStatus, UserId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FriendshipRecord {
    pub friendship_id: i64,
    pub pair: CanonicalPair,
    pub status: FriendshipStatus,
    pub requested_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending request together with the profile of the user on the other side.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingRequest {
    pub user: UserRecord,
    pub requested_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationRecord {
    pub conversation_id: ConversationId,
    pub pair: CanonicalPair,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub conversation: ConversationRecord,
    pub other_user: UserRecord,
    pub last_message: Option<MessageRecord>,
    pub is_muted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub scope: MessageScope,
    pub sender_id: UserId,
    pub content: String,
    pub status: MessageStatus,
    pub is_deleted: bool,
    pub deleted_for_everyone: bool,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub reply_to_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

/// A message that has not been written yet.
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub scope: MessageScope,
    pub sender_id: UserId,
    pub content: String,
    pub reply_to_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(
        scope: MessageScope,
        sender_id: UserId,
        content: String,
        reply_to_message_id: Option<MessageId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scope,
            sender_id,
            content,
            reply_to_message_id,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupRecord {
    pub group_id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub picture: Option<String>,
}

impl NewGroup {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupMemberRecord {
    pub user: UserRecord,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: GroupRecord,
    pub role: GroupRole,
    pub member_count: u32,
    pub last_message: Option<MessageRecord>,
    pub is_muted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupDetails {
    pub group: GroupRecord,
    /// Role of the user the details were loaded for.
    pub role: GroupRole,
    pub members: Vec<GroupMemberRecord>,
    pub last_message: Option<MessageRecord>,
}
