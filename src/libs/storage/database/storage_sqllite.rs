use crate::libs::config::ChatConfig;
use crate::libs::core::models::{
    CanonicalPair, ConversationId, FriendshipStatus, GroupId, GroupRole, MatchQuality,
    MessageId, MessageScope, MessageStatus, MuteTarget, StatusTarget, UserId,
};
use crate::libs::storage::database::storage_traits::{
    ConversationStore, FriendshipStore, GroupStore, MessageStore, MuteStore, StoreError,
    Transactional, UserStore,
};
use crate::libs::storage::records::{
    ConversationRecord, FriendshipRecord, GroupMemberRecord, GroupRecord, MessageRecord,
    NewGroup, NewMessage, PendingRequest, UserRecord,
};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Result, Row, Transaction, TransactionBehavior};
use std::time::Duration;

pub struct SqliteTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> SqliteTransaction<'conn> {
    /// Opens an IMMEDIATE transaction so concurrent writers queue on the
    /// database lock instead of failing on a read-to-write upgrade.
    pub fn new(
        conn: &'conn mut PooledConnection<SqliteConnectionManager>,
    ) -> Result<Self, StoreError> {
        let trans = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self { tx: trans })
    }

    /// Opens a DEFERRED transaction for lookups. Under WAL it reads a snapshot
    /// and never waits behind a writer.
    pub fn read_only(
        conn: &'conn mut PooledConnection<SqliteConnectionManager>,
    ) -> Result<Self, StoreError> {
        let trans = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        Ok(Self { tx: trans })
    }

    pub fn inner(&self) -> &Transaction<'conn> {
        &self.tx
    }

    pub fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .tx
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl<'conn> Transactional for SqliteTransaction<'conn> {
    fn commit(self) -> Result<(), StoreError> {
        Ok(self.tx.commit()?)
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(self.tx.rollback()?)
    }
}

pub struct SqliteStore {
    conn_pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn open(config: &ChatConfig) -> Result<Self, StoreError> {
        let busy_timeout = config.busy_timeout;
        let manager = SqliteConnectionManager::file(&config.db_path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .build(manager)?;
        Ok(Self { conn_pool: pool })
    }

    pub fn new_connection(
        &self,
    ) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.conn_pool.get()?)
    }
}

fn configure_connection(conn: &mut rusqlite::Connection, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {ms} out of range").into(),
        )
    })
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn scope_column(scope: MessageScope) -> (&'static str, i64) {
    match scope {
        MessageScope::Direct(id) => ("conversation_id", id.get()),
        MessageScope::Group(id) => ("group_id", id.get()),
    }
}

/// Makes `%`, `_` and the escape character itself literal inside a LIKE pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Makes GLOB metacharacters literal by wrapping each in a one-character class.
fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[') {
            escaped.push('[');
            escaped.push(c);
            escaped.push(']');
        } else {
            escaped.push(c);
        }
    }
    escaped
}

const USER_COLUMNS: &str = "u.user_id, u.username, u.display_name, u.created_at";

fn user_from_row(row: &Row<'_>, offset: usize) -> Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get(offset)?,
        username: row.get(offset + 1)?,
        display_name: row.get(offset + 2)?,
        created_at: timestamp_at(row, offset + 3)?,
    })
}

const FRIENDSHIP_COLUMNS: &str =
    "id, user_low, user_high, status, requested_by, created_at, updated_at";

fn friendship_from_row(row: &Row<'_>) -> Result<FriendshipRecord> {
    Ok(FriendshipRecord {
        friendship_id: row.get(0)?,
        pair: CanonicalPair {
            low: row.get(1)?,
            high: row.get(2)?,
        },
        status: row.get(3)?,
        requested_by: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

const CONVERSATION_COLUMNS: &str = "id, user_low, user_high, created_at, updated_at";

fn conversation_from_row(row: &Row<'_>) -> Result<ConversationRecord> {
    Ok(ConversationRecord {
        conversation_id: row.get(0)?,
        pair: CanonicalPair {
            low: row.get(1)?,
            high: row.get(2)?,
        },
        created_at: timestamp_at(row, 3)?,
        updated_at: timestamp_at(row, 4)?,
    })
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, group_id, sender_id, content, status, \
     is_deleted, deleted_for_everyone, is_edited, edited_at, reply_to_message_id, created_at";

/// Hides rows the viewer (bound as `?2`) deleted for themself.
const VISIBLE_TO_VIEWER: &str =
    "NOT (is_deleted = 1 AND deleted_for_everyone = 0 AND sender_id = ?2)";

fn message_from_row(row: &Row<'_>) -> Result<MessageRecord> {
    let conversation_id: Option<ConversationId> = row.get(1)?;
    let group_id: Option<GroupId> = row.get(2)?;
    let scope = match (conversation_id, group_id) {
        (Some(id), None) => MessageScope::Direct(id),
        (None, Some(id)) => MessageScope::Group(id),
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Null,
                "message must belong to exactly one conversation or group".into(),
            ))
        }
    };

    Ok(MessageRecord {
        message_id: row.get(0)?,
        scope,
        sender_id: row.get(3)?,
        content: row.get(4)?,
        status: row.get(5)?,
        is_deleted: row.get(6)?,
        deleted_for_everyone: row.get(7)?,
        is_edited: row.get(8)?,
        edited_at: optional_timestamp_at(row, 9)?,
        reply_to_message_id: row.get(10)?,
        created_at: timestamp_at(row, 11)?,
    })
}

const GROUP_COLUMNS: &str =
    "g.id, g.name, g.description, g.picture, g.created_by, g.created_at, g.updated_at";

fn group_from_row(row: &Row<'_>) -> Result<GroupRecord> {
    Ok(GroupRecord {
        group_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        picture: row.get(3)?,
        created_by: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

impl<'conn> UserStore for SqliteTransaction<'conn> {
    fn upsert_user(
        &mut self,
        user_id: UserId,
        username: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO users (user_id, username, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                display_name = excluded.display_name",
            params![user_id, username, display_name, millis(now)],
        )?;
        Ok(())
    }

    fn load_user(&mut self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let user = self
            .tx
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
                params![user_id],
                |row| user_from_row(row, 0),
            )
            .optional()?;
        Ok(user)
    }

    fn user_exists(&mut self, user_id: UserId) -> Result<bool, StoreError> {
        let exists: bool = self.tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl<'conn> SqliteTransaction<'conn> {
    fn requests_where(
        &self,
        user_id: UserId,
        condition: &str,
        joined_user: &str,
    ) -> Result<Vec<PendingRequest>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {USER_COLUMNS}, f.created_at
             FROM friendships f
             JOIN users u ON u.user_id = {joined_user}
             WHERE (f.user_low = ?1 OR f.user_high = ?1)
               AND f.status = 'pending'
               AND {condition}
             ORDER BY f.created_at DESC, f.id DESC"
        ))?;
        let requests = stmt
            .query_map(params![user_id], |row| {
                Ok(PendingRequest {
                    user: user_from_row(row, 0)?,
                    requested_at: timestamp_at(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(requests)
    }
}

impl<'conn> FriendshipStore for SqliteTransaction<'conn> {
    fn load_friendship(
        &mut self,
        pair: CanonicalPair,
    ) -> Result<Option<FriendshipRecord>, StoreError> {
        let friendship = self
            .tx
            .query_row(
                &format!(
                    "SELECT {FRIENDSHIP_COLUMNS} FROM friendships
                     WHERE user_low = ?1 AND user_high = ?2"
                ),
                params![pair.low, pair.high],
                friendship_from_row,
            )
            .optional()?;
        Ok(friendship)
    }

    fn insert_friendship(
        &mut self,
        pair: CanonicalPair,
        requested_by: UserId,
        status: FriendshipStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let inserted = self.tx.execute(
            "INSERT INTO friendships
                (user_low, user_high, status, requested_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_low, user_high) DO NOTHING",
            params![pair.low, pair.high, status, requested_by, millis(now)],
        )?;
        Ok(inserted > 0)
    }

    fn update_friendship(
        &mut self,
        friendship_id: i64,
        status: FriendshipStatus,
        requested_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let updated = self.tx.execute(
            "UPDATE friendships SET status = ?2, requested_by = ?3, updated_at = ?4
             WHERE id = ?1",
            params![friendship_id, status, requested_by, millis(now)],
        )?;
        Ok(updated > 0)
    }

    fn upsert_blocked(
        &mut self,
        pair: CanonicalPair,
        blocked_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO friendships
                (user_low, user_high, status, requested_by, created_at, updated_at)
             VALUES (?1, ?2, 'blocked', ?3, ?4, ?4)
             ON CONFLICT(user_low, user_high) DO UPDATE SET
                status = 'blocked',
                requested_by = excluded.requested_by,
                updated_at = excluded.updated_at",
            params![pair.low, pair.high, blocked_by, millis(now)],
        )?;
        Ok(())
    }

    fn delete_friendship(&mut self, friendship_id: i64) -> Result<bool, StoreError> {
        let deleted = self
            .tx
            .execute("DELETE FROM friendships WHERE id = ?1", params![friendship_id])?;
        Ok(deleted > 0)
    }

    fn list_friends(&mut self, user_id: UserId) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {USER_COLUMNS}
             FROM friendships f
             JOIN users u ON u.user_id =
                CASE WHEN f.user_low = ?1 THEN f.user_high ELSE f.user_low END
             WHERE (f.user_low = ?1 OR f.user_high = ?1) AND f.status = 'accepted'
             ORDER BY u.username ASC"
        ))?;
        let friends = stmt
            .query_map(params![user_id], |row| user_from_row(row, 0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(friends)
    }

    fn list_incoming_requests(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<PendingRequest>, StoreError> {
        self.requests_where(user_id, "f.requested_by != ?1", "f.requested_by")
    }

    fn list_outgoing_requests(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<PendingRequest>, StoreError> {
        self.requests_where(
            user_id,
            "f.requested_by = ?1",
            "CASE WHEN f.user_low = ?1 THEN f.user_high ELSE f.user_low END",
        )
    }
}

impl<'conn> ConversationStore for SqliteTransaction<'conn> {
    fn find_conversation(
        &mut self,
        pair: CanonicalPair,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let conversation = self
            .tx
            .query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE user_low = ?1 AND user_high = ?2"
                ),
                params![pair.low, pair.high],
                conversation_from_row,
            )
            .optional()?;
        Ok(conversation)
    }

    fn insert_conversation_if_absent(
        &mut self,
        pair: CanonicalPair,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let inserted = self.tx.execute(
            "INSERT INTO conversations (user_low, user_high, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(user_low, user_high) DO NOTHING",
            params![pair.low, pair.high, millis(now)],
        )?;
        Ok(inserted > 0)
    }

    fn load_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let conversation = self
            .tx
            .query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![conversation_id],
                conversation_from_row,
            )
            .optional()?;
        Ok(conversation)
    }

    fn touch_conversation(
        &mut self,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![conversation_id, millis(now)],
        )?;
        Ok(())
    }

    fn list_conversations(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE user_low = ?1 OR user_high = ?1
             ORDER BY updated_at DESC, id DESC"
        ))?;
        let conversations = stmt
            .query_map(params![user_id], conversation_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(conversations)
    }
}

impl<'conn> MessageStore for SqliteTransaction<'conn> {
    fn insert_message(&mut self, message: &NewMessage) -> Result<MessageId, StoreError> {
        let (conversation_id, group_id) = match message.scope {
            MessageScope::Direct(id) => (Some(id), None),
            MessageScope::Group(id) => (None, Some(id)),
        };
        self.tx.execute(
            "INSERT INTO messages
                (conversation_id, group_id, sender_id, content, status,
                 reply_to_message_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                conversation_id,
                group_id,
                message.sender_id,
                message.content,
                MessageStatus::Sent,
                message.reply_to_message_id,
                millis(message.created_at),
            ],
        )?;
        Ok(MessageId(self.tx.last_insert_rowid()))
    }

    fn load_message(
        &mut self,
        message_id: MessageId,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let message = self
            .tx
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![message_id],
                message_from_row,
            )
            .optional()?;
        Ok(message)
    }

    fn list_messages(
        &mut self,
        scope: MessageScope,
        viewer: UserId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let (column, scope_id) = scope_column(scope);
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE {column} = ?1 AND {VISIBLE_TO_VIEWER}
             ORDER BY created_at ASC, id ASC"
        ))?;
        let messages = stmt
            .query_map(params![scope_id, viewer], message_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(messages)
    }

    fn last_message(
        &mut self,
        scope: MessageScope,
        viewer: UserId,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let (column, scope_id) = scope_column(scope);
        let message = self
            .tx
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE {column} = ?1 AND {VISIBLE_TO_VIEWER}
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1"
                ),
                params![scope_id, viewer],
                message_from_row,
            )
            .optional()?;
        Ok(message)
    }

    fn advance_status(
        &mut self,
        actor: UserId,
        message_ids: &[MessageId],
        target: StatusTarget,
        group: Option<GroupId>,
    ) -> Result<usize, StoreError> {
        let target = MessageStatus::from(target);
        let membership = match group {
            Some(_) => {
                "group_id = ?5 AND EXISTS (
                    SELECT 1 FROM group_members WHERE group_id = ?5 AND user_id = ?3)"
            }
            None => {
                "conversation_id IN (
                    SELECT id FROM conversations WHERE user_low = ?3 OR user_high = ?3)"
            }
        };
        let mut stmt = self.tx.prepare(&format!(
            "UPDATE messages SET status = ?1
             WHERE id = ?2
               AND sender_id != ?3
               AND (CASE status WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END) < ?4
               AND {membership}"
        ))?;

        let mut affected = 0;
        for message_id in message_ids {
            affected += match group {
                Some(group_id) => stmt.execute(params![
                    target,
                    message_id,
                    actor,
                    target.rank(),
                    group_id
                ])?,
                None => stmt.execute(params![target, message_id, actor, target.rank()])?,
            };
        }
        Ok(affected)
    }

    fn mark_read_from(
        &mut self,
        conversation_id: ConversationId,
        sender: UserId,
    ) -> Result<usize, StoreError> {
        let updated = self.tx.execute(
            "UPDATE messages SET status = 'read'
             WHERE conversation_id = ?1 AND sender_id = ?2 AND status != 'read'",
            params![conversation_id, sender],
        )?;
        Ok(updated)
    }

    fn update_content(
        &mut self,
        message_id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE messages SET content = ?2, is_edited = 1, edited_at = ?3 WHERE id = ?1",
            params![message_id, content, millis(edited_at)],
        )?;
        Ok(())
    }

    fn mark_deleted(
        &mut self,
        message_id: MessageId,
        for_everyone: bool,
        placeholder: &str,
    ) -> Result<(), StoreError> {
        if for_everyone {
            self.tx.execute(
                "UPDATE messages
                 SET is_deleted = 1, deleted_for_everyone = 1, content = ?2
                 WHERE id = ?1",
                params![message_id, placeholder],
            )?;
        } else {
            self.tx.execute(
                "UPDATE messages SET is_deleted = 1 WHERE id = ?1",
                params![message_id],
            )?;
        }
        Ok(())
    }

    fn search_messages(
        &mut self,
        user_id: UserId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(MessageRecord, MatchQuality)>, StoreError> {
        // lower() and LIKE both fold ASCII only, so every tier agrees on case.
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS},
                    CASE
                        WHEN lower(content) = lower(?2) THEN 3
                        WHEN lower(content) GLOB lower(?3) THEN 2
                        WHEN lower(content) GLOB lower(?4) THEN 1
                        ELSE 0
                    END AS quality
             FROM messages
             WHERE content LIKE ?5 ESCAPE '\\'
               AND deleted_for_everyone = 0
               AND NOT (is_deleted = 1 AND sender_id = ?1)
               AND (conversation_id IN (
                        SELECT c.id FROM conversations c
                        JOIN friendships f
                          ON f.user_low = c.user_low AND f.user_high = c.user_high
                        WHERE (c.user_low = ?1 OR c.user_high = ?1)
                          AND f.status = 'accepted')
                    OR group_id IN (
                        SELECT group_id FROM group_members WHERE user_id = ?1))
             ORDER BY quality DESC, created_at DESC, id DESC
             LIMIT ?6"
        ))?;

        let literal = escape_glob(query);
        let hits = stmt
            .query_map(
                params![
                    user_id,
                    query,
                    format!("{literal}*"),
                    format!("*[^a-z0-9]{literal}*"),
                    format!("%{}%", escape_like(query)),
                    i64::try_from(limit).unwrap_or(i64::MAX),
                ],
                |row| Ok((message_from_row(row)?, row.get(12)?)),
            )?
            .collect::<Result<Vec<_>>>()?;
        Ok(hits)
    }
}

impl<'conn> GroupStore for SqliteTransaction<'conn> {
    fn insert_group(
        &mut self,
        group: &NewGroup,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<GroupId, StoreError> {
        self.tx.execute(
            "INSERT INTO chat_groups (name, description, picture, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                group.name,
                group.description,
                group.picture,
                created_by,
                millis(now)
            ],
        )?;
        Ok(GroupId(self.tx.last_insert_rowid()))
    }

    fn load_group(&mut self, group_id: GroupId) -> Result<Option<GroupRecord>, StoreError> {
        let group = self
            .tx
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM chat_groups g WHERE g.id = ?1"),
                params![group_id],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    fn insert_member(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        role: GroupRole,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let inserted = self.tx.execute(
            "INSERT INTO group_members (group_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(group_id, user_id) DO NOTHING",
            params![group_id, user_id, role, millis(now)],
        )?;
        Ok(inserted > 0)
    }

    fn member_role(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<Option<GroupRole>, StoreError> {
        let role = self
            .tx
            .query_row(
                "SELECT role FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                params![group_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(role)
    }

    fn remove_member(&mut self, group_id: GroupId, user_id: UserId) -> Result<bool, StoreError> {
        let removed = self.tx.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        Ok(removed > 0)
    }

    fn list_members(&mut self, group_id: GroupId) -> Result<Vec<GroupMemberRecord>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {USER_COLUMNS}, gm.role, gm.joined_at
             FROM group_members gm
             JOIN users u ON u.user_id = gm.user_id
             WHERE gm.group_id = ?1
             ORDER BY gm.joined_at ASC, gm.id ASC"
        ))?;
        let members = stmt
            .query_map(params![group_id], |row| {
                Ok(GroupMemberRecord {
                    user: user_from_row(row, 0)?,
                    role: row.get(4)?,
                    joined_at: timestamp_at(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(members)
    }

    fn list_groups_for(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<(GroupRecord, GroupRole, u32)>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {GROUP_COLUMNS}, gm.role,
                    (SELECT COUNT(*) FROM group_members WHERE group_id = g.id)
             FROM chat_groups g
             JOIN group_members gm ON gm.group_id = g.id
             WHERE gm.user_id = ?1
             ORDER BY g.updated_at DESC, g.id DESC"
        ))?;
        let groups = stmt
            .query_map(params![user_id], |row| {
                Ok((group_from_row(row)?, row.get(7)?, row.get(8)?))
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn touch_group(&mut self, group_id: GroupId, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE chat_groups SET updated_at = ?2 WHERE id = ?1",
            params![group_id, millis(now)],
        )?;
        Ok(())
    }
}

impl<'conn> MuteStore for SqliteTransaction<'conn> {
    fn set_muted(
        &mut self,
        user_id: UserId,
        target: MuteTarget,
        muted: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if muted {
            self.tx.execute(
                "INSERT INTO mutes (user_id, target_kind, target_id, muted_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, target_kind, target_id) DO NOTHING",
                params![user_id, target.kind(), target.raw_id(), millis(now)],
            )?;
        } else {
            self.tx.execute(
                "DELETE FROM mutes WHERE user_id = ?1 AND target_kind = ?2 AND target_id = ?3",
                params![user_id, target.kind(), target.raw_id()],
            )?;
        }
        Ok(())
    }

    fn is_muted(&mut self, user_id: UserId, target: MuteTarget) -> Result<bool, StoreError> {
        let muted: bool = self.tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM mutes WHERE user_id = ?1 AND target_kind = ?2 AND target_id = ?3)",
            params![user_id, target.kind(), target.raw_id()],
            |row| row.get(0),
        )?;
        Ok(muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("why?"), "why[?]");
        assert_eq!(escape_glob("a*[b]"), "a[*][[]b]");
        assert_eq!(escape_glob("snake_case 50%"), "snake_case 50%");
    }
}
