pub mod libs;

use crate::libs::core::models::{GroupId, MessageId, UserId};
use crate::libs::storage::database::storage_traits::StoreError;
use serde::Serialize;
use thiserror::Error;

pub use crate::libs::config::ChatConfig;
pub use crate::libs::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::libs::messenger::Messenger;
pub use crate::libs::presence::PresenceStore;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("User {0} cannot be the target of this operation")]
    InvalidTarget(UserId),
    #[error("Users are already friends")]
    AlreadyFriends,
    #[error("A friend request between these users is already pending")]
    RequestPending,
    #[error("Relationship is blocked")]
    Blocked,
    #[error("Not a member of group {0}")]
    NotMember(GroupId),
    #[error("User {0} is already a member")]
    AlreadyMember(UserId),
    #[error("User {0} is not a friend of the acting user")]
    MembersMustBeFriends(UserId),
    #[error("Message {0} cannot be replied to from here")]
    InvalidReply(MessageId),
    #[error("Message {0} has been deleted")]
    InvalidState(MessageId),
    #[error("Edit window for message {0} has expired")]
    EditWindowExpired(MessageId),
    #[error("Delete window for message {0} has expired")]
    DeleteWindowExpired(MessageId),
    #[error("Username {0} is taken")]
    UsernameTaken(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Closed set of failure categories handed to the transport layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidInput,
    Conflict,
    StateExpired,
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StateExpired => "state_expired",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::Forbidden(_) | ChatError::Blocked | ChatError::NotMember(_) => {
                ErrorKind::Forbidden
            }
            ChatError::InvalidInput(_)
            | ChatError::InvalidTarget(_)
            | ChatError::InvalidReply(_)
            | ChatError::InvalidState(_)
            | ChatError::MembersMustBeFriends(_) => ErrorKind::InvalidInput,
            ChatError::AlreadyFriends
            | ChatError::RequestPending
            | ChatError::AlreadyMember(_)
            | ChatError::UsernameTaken(_) => ErrorKind::Conflict,
            ChatError::EditWindowExpired(_) | ChatError::DeleteWindowExpired(_) => {
                ErrorKind::StateExpired
            }
            ChatError::Store(_) => ErrorKind::Unavailable,
        }
    }
}
