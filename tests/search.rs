mod common;

use crate::common::*;
use chrono::TimeDelta;
use gabber_social_core::libs::core::search::MatchQuality;
use gabber_social_core::libs::storage::records::NewGroup;
use gabber_social_core::{ChatConfig, ChatError};

#[test]
fn test_search_ranks_and_spans_direct_and_group() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);
    chat.befriend(ALICE, CAROL);
    let group = chat
        .messenger
        .create_group(ALICE, NewGroup::named("food"), &[BOB, CAROL])
        .unwrap()
        .group
        .group_id;

    chat.messenger.send_message(ALICE, BOB, "Lunch", None).unwrap();
    chat.clock.advance(TimeDelta::seconds(1));
    chat.messenger
        .send_group_message(CAROL, group, "lunch tomorrow?", None)
        .unwrap();
    chat.clock.advance(TimeDelta::seconds(1));
    chat.messenger
        .send_message(CAROL, ALICE, "skipped brunch", None)
        .unwrap();
    chat.clock.advance(TimeDelta::seconds(1));
    chat.messenger
        .send_group_message(BOB, group, "after lunch", None)
        .unwrap();

    let hits = chat.messenger.search_messages(ALICE, "lunch").unwrap();
    let ranked: Vec<(&str, MatchQuality)> = hits
        .iter()
        .map(|hit| (hit.message.content.as_str(), hit.quality))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("Lunch", MatchQuality::Exact),
            ("lunch tomorrow?", MatchQuality::Prefix),
            ("after lunch", MatchQuality::Word),
        ]
    );

    let unch = chat.messenger.search_messages(ALICE, "unch").unwrap();
    assert_eq!(unch.len(), 4);
    assert!(unch.iter().all(|hit| hit.quality == MatchQuality::Substring));
    assert_eq!(unch[0].message.content, "after lunch");
}

#[test]
fn test_search_only_sees_own_threads() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);
    chat.befriend(CAROL, DAVE);
    chat.messenger.send_message(CAROL, DAVE, "secret plan", None).unwrap();
    chat.messenger.send_message(ALICE, BOB, "public plan", None).unwrap();

    let hits = chat.messenger.search_messages(BOB, "plan").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message.content, "public plan");
}

#[test]
fn test_search_excludes_deleted_messages() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);
    let gone = chat.messenger.send_message(ALICE, BOB, "party at nine", None).unwrap();
    let mine = chat.messenger.send_message(ALICE, BOB, "party hats", None).unwrap();
    chat.messenger.delete_message(ALICE, gone.message_id, true).unwrap();
    chat.messenger.delete_message(ALICE, mine.message_id, false).unwrap();

    assert!(chat.messenger.search_messages(ALICE, "party").unwrap().is_empty());
    let bob_hits = chat.messenger.search_messages(BOB, "party").unwrap();
    assert_eq!(bob_hits.len(), 1);
    assert_eq!(bob_hits[0].message.message_id, mine.message_id);
}

#[test]
fn test_search_treats_wildcards_literally() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);
    chat.messenger.send_message(ALICE, BOB, "100% sure", None).unwrap();
    chat.messenger.send_message(ALICE, BOB, "1000 sure", None).unwrap();
    chat.messenger.send_message(ALICE, BOB, "snake_case", None).unwrap();
    chat.messenger.send_message(ALICE, BOB, "snakeXcase", None).unwrap();

    let percent = chat.messenger.search_messages(BOB, "0%").unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].message.content, "100% sure");

    let underscore = chat.messenger.search_messages(BOB, "e_c").unwrap();
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].message.content, "snake_case");
}

#[test]
fn test_search_query_length_and_limit() {
    let chat = TestChat::with_config(ChatConfig::default().with_search_limit(2));
    chat.register_all();
    chat.befriend(ALICE, BOB);
    for text in ["note one", "note two", "note three"] {
        chat.messenger.send_message(ALICE, BOB, text, None).unwrap();
        chat.clock.advance(TimeDelta::seconds(1));
    }

    assert!(matches!(
        chat.messenger.search_messages(ALICE, " n "),
        Err(ChatError::InvalidInput(_))
    ));
    let hits = chat.messenger.search_messages(ALICE, "note").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].message.content, "note three");
    assert_eq!(hits[1].message.content, "note two");
}

#[test]
fn test_search_drops_direct_history_after_unfriend() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);
    chat.messenger
        .send_message(ALICE, BOB, "secret plans", None)
        .unwrap();
    assert_eq!(chat.messenger.search_messages(BOB, "secret").unwrap().len(), 1);

    chat.messenger.remove_friend(ALICE, BOB).unwrap();
    assert!(chat.messenger.search_messages(BOB, "secret").unwrap().is_empty());
    assert!(chat.messenger.search_messages(ALICE, "secret").unwrap().is_empty());
    assert!(matches!(
        chat.messenger.list_messages(BOB, ALICE),
        Err(ChatError::Forbidden(_))
    ));

    chat.befriend(ALICE, BOB);
    assert_eq!(chat.messenger.search_messages(BOB, "secret").unwrap().len(), 1);
}

#[test]
fn test_search_drops_direct_history_after_block() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, CAROL);
    chat.messenger
        .send_message(CAROL, ALICE, "secret recipe", None)
        .unwrap();

    chat.messenger.block_user(ALICE, CAROL).unwrap();
    assert!(chat.messenger.search_messages(ALICE, "secret").unwrap().is_empty());
    assert!(chat.messenger.search_messages(CAROL, "secret").unwrap().is_empty());
}

#[test]
fn test_search_limit_keeps_best_matches() {
    let chat = TestChat::with_config(ChatConfig::default().with_search_limit(2));
    chat.register_all();
    chat.befriend(ALICE, BOB);
    chat.messenger.send_message(ALICE, BOB, "Lunch", None).unwrap();
    for text in ["brunch?", "more brunch", "brunch again"] {
        chat.clock.advance(TimeDelta::seconds(1));
        chat.messenger.send_message(BOB, ALICE, text, None).unwrap();
    }

    let hits = chat.messenger.search_messages(ALICE, "unch").unwrap();
    let ranked: Vec<(&str, MatchQuality)> = hits
        .iter()
        .map(|hit| (hit.message.content.as_str(), hit.quality))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("brunch again", MatchQuality::Substring),
            ("more brunch", MatchQuality::Substring),
        ]
    );

    let hits = chat.messenger.search_messages(ALICE, "lunch").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].quality, MatchQuality::Exact);

    // "more brunch" is newer than "brunch?" but only a word match.
    let hits = chat.messenger.search_messages(ALICE, "brunch").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].message.content, "brunch again");
    assert_eq!(hits[0].quality, MatchQuality::Prefix);
    assert_eq!(hits[1].message.content, "brunch?");
    assert_eq!(hits[1].quality, MatchQuality::Prefix);
}

#[test]
fn test_search_treats_glob_characters_literally() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);
    chat.messenger.send_message(ALICE, BOB, "why?", None).unwrap();
    chat.messenger.send_message(ALICE, BOB, "whyz", None).unwrap();
    chat.messenger.send_message(ALICE, BOB, "ok [why?] then", None).unwrap();

    let hits = chat.messenger.search_messages(BOB, "why?").unwrap();
    let ranked: Vec<(&str, MatchQuality)> = hits
        .iter()
        .map(|hit| (hit.message.content.as_str(), hit.quality))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("why?", MatchQuality::Exact),
            ("ok [why?] then", MatchQuality::Word),
        ]
    );
}
