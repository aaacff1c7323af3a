use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_i64().map($name)
            }
        }
    };
}

row_id!(
    /// Opaque identifier issued by the identity subsystem.
    UserId
);
row_id!(ConversationId);
row_id!(GroupId);
row_id!(MessageId);

/// Two users ordered so that `(a, b)` and `(b, a)` produce the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalPair {
    pub low: UserId,
    pub high: UserId,
}

impl CanonicalPair {
    pub fn of(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }

    /// The participant that is not `user`, or `None` when `user` is not in the pair.
    pub fn other(&self, user: UserId) -> Option<UserId> {
        if self.low == user {
            Some(self.high)
        } else if self.high == user {
            Some(self.low)
        } else {
            None
        }
    }
}

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(text: &str) -> Option<Self> {
                match text {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                $name::parse(text).ok_or(FromSqlError::InvalidType)
            }
        }
    };
}

text_enum!(
    /// Stored state of a friendship row.
    FriendshipStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Blocked => "blocked",
    }
);

text_enum!(
    /// Delivery state of a message. Only ever moves forward.
    MessageStatus {
        Sent => "sent",
        Delivered => "delivered",
        Read => "read",
    }
);

text_enum!(GroupRole {
    Admin => "admin",
    Member => "member",
});

text_enum!(
    /// Relationship between two users as seen by the first of them.
    FriendStatus {
        None => "none",
        PendingSent => "pending_sent",
        PendingReceived => "pending_received",
        Friend => "friend",
        Blocked => "blocked",
    }
);

text_enum!(FriendAction {
    Accept => "accept",
    Reject => "reject",
});

text_enum!(
    /// Status a recipient may move a message to.
    StatusTarget {
        Delivered => "delivered",
        Read => "read",
    }
);

impl MessageStatus {
    pub fn rank(self) -> u8 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
        }
    }
}

impl From<StatusTarget> for MessageStatus {
    fn from(target: StatusTarget) -> Self {
        match target {
            StatusTarget::Delivered => MessageStatus::Delivered,
            StatusTarget::Read => MessageStatus::Read,
        }
    }
}

/// How closely a message matched a search, weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    Substring,
    Word,
    Prefix,
    Exact,
}

impl MatchQuality {
    pub fn rank(self) -> u8 {
        match self {
            MatchQuality::Substring => 0,
            MatchQuality::Word => 1,
            MatchQuality::Prefix => 2,
            MatchQuality::Exact => 3,
        }
    }
}

impl FromSql for MatchQuality {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            0 => Ok(MatchQuality::Substring),
            1 => Ok(MatchQuality::Word),
            2 => Ok(MatchQuality::Prefix),
            3 => Ok(MatchQuality::Exact),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

/// The thread a message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MessageScope {
    Direct(ConversationId),
    Group(GroupId),
}

/// Something a user can mute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MuteTarget {
    Conversation(ConversationId),
    Group(GroupId),
}

impl MuteTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            MuteTarget::Conversation(_) => "conversation",
            MuteTarget::Group(_) => "group",
        }
    }

    pub fn raw_id(&self) -> i64 {
        match self {
            MuteTarget::Conversation(id) => id.get(),
            MuteTarget::Group(id) => id.get(),
        }
    }
}

impl From<MessageScope> for MuteTarget {
    fn from(scope: MessageScope) -> Self {
        match scope {
            MessageScope::Direct(id) => MuteTarget::Conversation(id),
            MessageScope::Group(id) => MuteTarget::Group(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_ignores_argument_order() {
        let forward = CanonicalPair::of(UserId(7), UserId(3));
        let backward = CanonicalPair::of(UserId(3), UserId(7));
        assert_eq!(forward, backward);
        assert_eq!(forward.low, UserId(3));
        assert_eq!(forward.high, UserId(7));
        assert_eq!(forward.other(UserId(3)), Some(UserId(7)));
        assert_eq!(forward.other(UserId(9)), None);
    }

    #[test]
    fn text_enums_parse_their_own_text() {
        for status in [
            FriendshipStatus::Pending,
            FriendshipStatus::Accepted,
            FriendshipStatus::Rejected,
            FriendshipStatus::Blocked,
        ] {
            assert_eq!(FriendshipStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MessageStatus::parse("seen"), None);
        assert_eq!(FriendStatus::PendingReceived.as_str(), "pending_received");
    }

    #[test]
    fn status_rank_is_monotonic() {
        assert!(MessageStatus::Sent.rank() < MessageStatus::Delivered.rank());
        assert!(MessageStatus::Delivered.rank() < MessageStatus::Read.rank());
        assert_eq!(MessageStatus::from(StatusTarget::Read), MessageStatus::Read);
    }
}
