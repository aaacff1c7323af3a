pub mod clock;
pub mod conversation;
pub mod friendship;
pub mod groups;
pub mod messages;
pub mod models;
pub mod search;
