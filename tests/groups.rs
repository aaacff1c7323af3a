mod common;

use crate::common::*;
use chrono::TimeDelta;
use gabber_social_core::libs::core::models::{
    GroupId, GroupRole, MessageScope, MessageStatus, MuteTarget, StatusTarget,
};
use gabber_social_core::libs::storage::records::NewGroup;
use gabber_social_core::{ChatError, ErrorKind};

fn circle() -> TestChat {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);
    chat.befriend(ALICE, CAROL);
    chat
}

fn create_trio(chat: &TestChat) -> GroupId {
    chat.messenger
        .create_group(ALICE, NewGroup::named("weekend"), &[BOB, CAROL])
        .expect("Failed to create group")
        .group
        .group_id
}

#[test]
fn test_create_group_assigns_roles() {
    let chat = circle();
    let details = chat
        .messenger
        .create_group(
            ALICE,
            NewGroup::named("weekend")
                .with_description("plans")
                .with_picture("pictures/weekend.png"),
            &[BOB, CAROL, BOB, ALICE],
        )
        .unwrap();

    assert_eq!(details.group.name, "weekend");
    assert_eq!(details.group.description.as_deref(), Some("plans"));
    assert_eq!(details.group.created_by, ALICE);
    assert_eq!(details.role, GroupRole::Admin);
    assert_eq!(details.members.len(), 3);

    for member in &details.members {
        let expected = if member.user.user_id == ALICE {
            GroupRole::Admin
        } else {
            GroupRole::Member
        };
        assert_eq!(member.role, expected);
    }
}

#[test]
fn test_create_group_with_stranger_writes_nothing() {
    let chat = TestChat::with_users();
    chat.befriend(ALICE, BOB);

    let err = chat
        .messenger
        .create_group(ALICE, NewGroup::named("partial"), &[BOB, CAROL])
        .unwrap_err();
    assert!(matches!(err, ChatError::MembersMustBeFriends(member) if member == CAROL));

    assert!(chat.messenger.list_groups(ALICE).unwrap().is_empty());
    assert!(chat.messenger.list_groups(BOB).unwrap().is_empty());
}

#[test]
fn test_create_group_input_validation() {
    let chat = circle();
    assert_eq!(
        chat.messenger
            .create_group(ALICE, NewGroup::named("  "), &[BOB])
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        chat.messenger
            .create_group(ALICE, NewGroup::named("solo"), &[ALICE])
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidInput
    );
}

#[test]
fn test_add_member_rules() {
    let chat = circle();
    chat.befriend(BOB, DAVE);
    let group = create_trio(&chat);

    assert!(matches!(
        chat.messenger.add_member(ALICE, group, DAVE),
        Err(ChatError::MembersMustBeFriends(_))
    ));
    assert!(matches!(
        chat.messenger.add_member(ALICE, group, BOB),
        Err(ChatError::AlreadyMember(_))
    ));
    assert!(matches!(
        chat.messenger.add_member(DAVE, group, BOB),
        Err(ChatError::NotMember(_))
    ));

    chat.messenger
        .add_member(BOB, group, DAVE)
        .expect("Any member may add their friends");
    let details = chat.messenger.group_details(DAVE, group).unwrap();
    assert_eq!(details.role, GroupRole::Member);
    assert_eq!(details.members.len(), 4);
}

#[test]
fn test_remove_member_requires_admin() {
    let chat = circle();
    let group = create_trio(&chat);

    assert_eq!(
        chat.messenger.remove_member(BOB, group, CAROL).unwrap_err().kind(),
        ErrorKind::Forbidden
    );
    assert_eq!(
        chat.messenger.remove_member(ALICE, group, ALICE).unwrap_err().kind(),
        ErrorKind::Forbidden
    );
    assert_eq!(
        chat.messenger.remove_member(ALICE, group, DAVE).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    chat.messenger.remove_member(ALICE, group, CAROL).unwrap();
    assert_eq!(
        chat.messenger.group_details(CAROL, group).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_leave_group() {
    let chat = circle();
    let group = create_trio(&chat);

    chat.messenger.leave_group(BOB, group).unwrap();
    assert!(matches!(
        chat.messenger.leave_group(BOB, group),
        Err(ChatError::NotFound(_))
    ));
    assert_eq!(chat.messenger.group_details(ALICE, group).unwrap().members.len(), 2);
}

#[test]
fn test_details_hide_group_existence_from_outsiders() {
    let chat = circle();
    let group = create_trio(&chat);

    let outsider = chat.messenger.group_details(DAVE, group).unwrap_err();
    let missing = chat.messenger.group_details(DAVE, GroupId(404)).unwrap_err();
    assert_eq!(outsider.kind(), missing.kind());
    assert_eq!(outsider.to_string(), missing.to_string());
}

#[test]
fn test_group_messages_follow_membership() {
    let chat = circle();
    let group = create_trio(&chat);

    // BOB and CAROL are not friends; membership alone allows posting.
    let hello = chat
        .messenger
        .send_group_message(BOB, group, "hello all", None)
        .unwrap();
    assert_eq!(hello.scope, MessageScope::Group(group));
    chat.messenger
        .send_group_message(CAROL, group, "hi bob", Some(hello.message_id))
        .unwrap();

    assert!(matches!(
        chat.messenger.send_group_message(DAVE, group, "let me in", None),
        Err(ChatError::NotMember(_))
    ));
    assert!(matches!(
        chat.messenger.list_group_messages(DAVE, group),
        Err(ChatError::NotMember(_))
    ));

    let messages = chat.messenger.list_group_messages(ALICE, group).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].reply_to_message_id, Some(hello.message_id));

    let details = chat.messenger.group_details(ALICE, group).unwrap();
    assert_eq!(
        details.last_message.map(|m| m.content),
        Some("hi bob".to_string())
    );
}

#[test]
fn test_group_reply_cannot_cross_threads() {
    let chat = circle();
    let group = create_trio(&chat);
    let direct = chat.messenger.send_message(ALICE, BOB, "private", None).unwrap();

    assert!(matches!(
        chat.messenger
            .send_group_message(BOB, group, "quoting", Some(direct.message_id)),
        Err(ChatError::InvalidReply(_))
    ));
}

#[test]
fn test_group_status_and_edit_rules() {
    let chat = circle();
    let group = create_trio(&chat);
    let message = chat
        .messenger
        .send_group_message(ALICE, group, "agenda", None)
        .unwrap();

    assert_eq!(
        chat.messenger
            .set_group_status(BOB, group, &[message.message_id], StatusTarget::Delivered)
            .unwrap(),
        1
    );
    assert_eq!(
        chat.messenger
            .set_group_status(ALICE, group, &[message.message_id], StatusTarget::Read)
            .unwrap(),
        0
    );
    assert_eq!(
        chat.messenger.list_group_messages(CAROL, group).unwrap()[0].status,
        MessageStatus::Delivered
    );

    chat.clock.advance(TimeDelta::minutes(16));
    assert!(matches!(
        chat.messenger.edit_message(ALICE, message.message_id, "new agenda"),
        Err(ChatError::EditWindowExpired(_))
    ));
}

#[test]
fn test_list_groups_summaries() {
    let chat = circle();
    let first = create_trio(&chat);
    chat.clock.advance(TimeDelta::seconds(1));
    let second = chat
        .messenger
        .create_group(ALICE, NewGroup::named("book club"), &[BOB])
        .unwrap()
        .group
        .group_id;

    chat.clock.advance(TimeDelta::seconds(1));
    chat.messenger
        .send_group_message(CAROL, first, "bump", None)
        .unwrap();
    chat.messenger
        .mute(BOB, MuteTarget::Group(second), true)
        .unwrap();

    let groups = chat.messenger.list_groups(BOB).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].group.group_id, first);
    assert_eq!(groups[0].member_count, 3);
    assert_eq!(groups[0].role, GroupRole::Member);
    assert!(!groups[0].is_muted);
    assert_eq!(groups[1].group.group_id, second);
    assert_eq!(groups[1].member_count, 2);
    assert!(groups[1].is_muted);
    assert!(groups[1].last_message.is_none());

    assert!(matches!(
        chat.messenger.mute(DAVE, MuteTarget::Group(first), true),
        Err(ChatError::NotMember(_))
    ));
}
