mod common;

use crate::common::*;
use chrono::TimeDelta;
use gabber_social_core::{ChatConfig, ChatError};
use std::time::Duration;

#[test]
fn test_typing_round_trip_leaves_no_entry() {
    let chat = TestChat::new();
    chat.messenger.set_typing(ALICE, BOB, true).unwrap();
    assert!(chat.messenger.is_typing(BOB, ALICE).unwrap());
    assert!(!chat.messenger.is_typing(ALICE, BOB).unwrap());

    chat.messenger.set_typing(ALICE, BOB, false).unwrap();
    assert!(!chat.messenger.is_typing(BOB, ALICE).unwrap());
    assert!(!chat.messenger.presence().is_tracked(ALICE, BOB));
}

#[test]
fn test_pairs_are_independent() {
    let chat = TestChat::new();
    chat.messenger.set_typing(ALICE, BOB, true).unwrap();
    chat.messenger.set_typing(CAROL, ALICE, true).unwrap();

    chat.messenger.set_typing(ALICE, BOB, false).unwrap();
    assert!(chat.messenger.is_typing(ALICE, CAROL).unwrap());
    assert!(chat.messenger.presence().is_tracked(ALICE, CAROL));
}

#[test]
fn test_typing_with_yourself_is_invalid() {
    let chat = TestChat::new();
    assert!(matches!(
        chat.messenger.set_typing(ALICE, ALICE, true),
        Err(ChatError::InvalidTarget(_))
    ));
    assert!(matches!(
        chat.messenger.is_typing(ALICE, ALICE),
        Err(ChatError::InvalidTarget(_))
    ));
}

#[test]
fn test_configured_ttl_expires_flags() {
    let chat =
        TestChat::with_config(ChatConfig::default().with_typing_ttl(Some(Duration::from_secs(3))));
    chat.messenger.set_typing(BOB, ALICE, true).unwrap();

    chat.clock.advance(TimeDelta::seconds(2));
    assert!(chat.messenger.is_typing(ALICE, BOB).unwrap());

    chat.clock.advance(TimeDelta::seconds(2));
    assert!(!chat.messenger.is_typing(ALICE, BOB).unwrap());
    assert_eq!(chat.messenger.presence().sweep_expired(), 1);
    assert!(!chat.messenger.presence().is_tracked(ALICE, BOB));
}

#[test]
fn test_clearing_typing_drops_expired_partner_flag() {
    let chat =
        TestChat::with_config(ChatConfig::default().with_typing_ttl(Some(Duration::from_secs(5))));
    chat.messenger.set_typing(ALICE, BOB, true).unwrap();
    chat.clock.advance(TimeDelta::seconds(10));

    chat.messenger.set_typing(BOB, ALICE, true).unwrap();
    assert!(chat.messenger.presence().is_tracked(ALICE, BOB));
    chat.messenger.set_typing(BOB, ALICE, false).unwrap();

    assert!(!chat.messenger.is_typing(BOB, ALICE).unwrap());
    assert!(!chat.messenger.presence().is_tracked(ALICE, BOB));
    assert_eq!(chat.messenger.presence().sweep_expired(), 0);
}

#[test]
fn test_concurrent_typing_updates() {
    let chat = TestChat::new();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let messenger = chat.messenger.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    messenger.set_typing(ALICE, BOB, i % 2 == 0).unwrap();
                    messenger.set_typing(BOB, ALICE, true).unwrap();
                    messenger.set_typing(BOB, ALICE, false).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("typing thread panicked");
    }

    chat.messenger.set_typing(ALICE, BOB, false).unwrap();
    assert!(!chat.messenger.presence().is_tracked(ALICE, BOB));
}
