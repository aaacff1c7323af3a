#![allow(dead_code)]

use gabber_social_core::libs::core::models::{FriendAction, UserId};
use gabber_social_core::{ChatConfig, ManualClock, Messenger};
use std::sync::Arc;
use tempfile::TempDir;

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const CAROL: UserId = UserId(3);
pub const DAVE: UserId = UserId(4);

/// A messenger over its own database file. The directory lives as long as the harness.
pub struct TestChat {
    pub messenger: Arc<Messenger>,
    pub clock: ManualClock,
    _dir: TempDir,
}

impl TestChat {
    pub fn new() -> Self {
        Self::with_config(ChatConfig::default())
    }

    pub fn with_config(config: ChatConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create test directory");
        let clock = ManualClock::default();
        let config = config.with_db_path(dir.path().join("social.db"));
        let messenger = Messenger::with_clock(config, Arc::new(clock.clone()))
            .expect("Failed to open messenger");

        Self {
            messenger: Arc::new(messenger),
            clock,
            _dir: dir,
        }
    }

    /// Registers ALICE, BOB, CAROL and DAVE.
    pub fn with_users() -> Self {
        let chat = Self::new();
        chat.register_all();
        chat
    }

    pub fn register_all(&self) {
        for (id, name) in [(ALICE, "alice"), (BOB, "bob"), (CAROL, "carol"), (DAVE, "dave")] {
            self.messenger
                .register_user(id, name, None)
                .expect("Failed to register user");
        }
    }

    pub fn befriend(&self, a: UserId, b: UserId) {
        self.messenger
            .send_friend_request(a, b)
            .expect("Failed to send friend request");
        self.messenger
            .respond_friend_request(b, a, FriendAction::Accept)
            .expect("Failed to accept friend request");
    }
}
