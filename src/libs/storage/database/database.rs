use crate::libs::storage::database::storage_sqllite::{SqliteStore, SqliteTransaction};
use crate::libs::storage::database::storage_traits::{StoreError, Transactional};
use rusqlite::params;
use tracing::info;

pub const SCHEMA_VERSION: &str = "1";

/// Creates every table the engine needs. Safe to run against an existing database.
pub fn migrate(store: &SqliteStore) -> Result<(), StoreError> {
    let mut connection = store.new_connection()?;
    let sqlite_transaction = SqliteTransaction::new(&mut connection)?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT,
            created_at INTEGER NOT NULL
        );",
    )?;

    // One row per unordered pair; direction lives in requested_by.
    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS friendships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_low INTEGER NOT NULL,
            user_high INTEGER NOT NULL,
            status TEXT NOT NULL,
            requested_by INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            FOREIGN KEY (user_low) REFERENCES users(user_id) ON DELETE CASCADE,
            FOREIGN KEY (user_high) REFERENCES users(user_id) ON DELETE CASCADE,

            UNIQUE (user_low, user_high),
            CHECK (user_low < user_high),
            CHECK (requested_by IN (user_low, user_high)),
            CHECK (status IN ('pending', 'accepted', 'rejected', 'blocked'))
        );
        CREATE INDEX IF NOT EXISTS idx_friendships_user_high ON friendships(user_high);
        CREATE INDEX IF NOT EXISTS idx_friendships_status ON friendships(status);",
    )?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_low INTEGER NOT NULL,
            user_high INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            FOREIGN KEY (user_low) REFERENCES users(user_id),
            FOREIGN KEY (user_high) REFERENCES users(user_id),

            UNIQUE (user_low, user_high),
            CHECK (user_low < user_high)
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_user_high ON conversations(user_high);
        CREATE INDEX IF NOT EXISTS idx_conversations_updated_at ON conversations(updated_at);",
    )?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS chat_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            picture TEXT,
            created_by INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            FOREIGN KEY (created_by) REFERENCES users(user_id)
        );

        CREATE TABLE IF NOT EXISTS group_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL DEFAULT 'member',
            joined_at INTEGER NOT NULL,

            FOREIGN KEY (group_id) REFERENCES chat_groups(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE,

            UNIQUE (group_id, user_id),
            CHECK (role IN ('admin', 'member'))
        );
        CREATE INDEX IF NOT EXISTS idx_group_members_user_id ON group_members(user_id);",
    )?;

    // Direct and group messages share one table; exactly one scope column is set.
    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER,
            group_id INTEGER,
            sender_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'sent',
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_for_everyone INTEGER NOT NULL DEFAULT 0,
            is_edited INTEGER NOT NULL DEFAULT 0,
            edited_at INTEGER,
            reply_to_message_id INTEGER,
            created_at INTEGER NOT NULL,

            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
            FOREIGN KEY (group_id) REFERENCES chat_groups(id) ON DELETE CASCADE,
            FOREIGN KEY (sender_id) REFERENCES users(user_id),
            FOREIGN KEY (reply_to_message_id) REFERENCES messages(id) ON DELETE SET NULL,

            CHECK ((conversation_id IS NULL) <> (group_id IS NULL)),
            CHECK (status IN ('sent', 'delivered', 'read')),
            CHECK (is_deleted IN (0, 1)),
            CHECK (deleted_for_everyone IN (0, 1)),
            CHECK (is_edited IN (0, 1))
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation_created_at
            ON messages(conversation_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_group_created_at
            ON messages(group_id, created_at);",
    )?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS mutes (
            user_id INTEGER NOT NULL,
            target_kind TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            muted_at INTEGER NOT NULL,

            PRIMARY KEY (user_id, target_kind, target_id),
            CHECK (target_kind IN ('conversation', 'group'))
        );",
    )?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )?;

    sqlite_transaction.inner().execute(
        "INSERT INTO app_settings (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION],
    )?;

    sqlite_transaction.commit()?;
    info!(version = SCHEMA_VERSION, "database schema ready");
    Ok(())
}

pub fn schema_version(store: &SqliteStore) -> Result<Option<String>, StoreError> {
    let mut connection = store.new_connection()?;
    let sqlite_transaction = SqliteTransaction::read_only(&mut connection)?;
    let version = sqlite_transaction.setting("schema_version")?;
    sqlite_transaction.commit()?;
    Ok(version)
}
