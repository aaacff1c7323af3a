use crate::libs::core::friendship;
use crate::libs::core::models::{GroupId, GroupRole, MessageScope, MuteTarget, UserId};
use crate::libs::storage::database::storage_traits::{ChatStore, GroupStore};
use crate::libs::storage::records::{
    GroupDetails, GroupRecord, GroupSummary, MessageRecord, NewGroup,
};
use crate::ChatError;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

fn load_group<S>(store: &mut S, group_id: GroupId) -> Result<GroupRecord, ChatError>
where
    S: GroupStore + ?Sized,
{
    store
        .load_group(group_id)?
        .ok_or(ChatError::NotFound("group"))
}

/// Role of `user` in the group, failing when they are not a member.
pub fn ensure_member<S>(store: &mut S, user: UserId, group_id: GroupId) -> Result<GroupRole, ChatError>
where
    S: GroupStore + ?Sized,
{
    load_group(store, group_id)?;
    store
        .member_role(group_id, user)?
        .ok_or(ChatError::NotMember(group_id))
}

/// Creates the group with `creator` as admin. Every other member must already be
/// a friend of the creator, otherwise nothing is written.
pub fn create<S>(
    store: &mut S,
    creator: UserId,
    group: &NewGroup,
    members: &[UserId],
    now: DateTime<Utc>,
) -> Result<GroupDetails, ChatError>
where
    S: ChatStore + ?Sized,
{
    if group.name.trim().is_empty() {
        return Err(ChatError::InvalidInput("group name is empty"));
    }

    let mut others: Vec<UserId> = Vec::with_capacity(members.len());
    for &member in members {
        if member != creator && !others.contains(&member) {
            others.push(member);
        }
    }
    if others.is_empty() {
        return Err(ChatError::InvalidInput("a group needs at least one other member"));
    }
    for &member in &others {
        if !friendship::are_friends(store, creator, member)? {
            return Err(ChatError::MembersMustBeFriends(member));
        }
    }

    let group_id = store.insert_group(group, creator, now)?;
    store.insert_member(group_id, creator, GroupRole::Admin, now)?;
    for &member in &others {
        store.insert_member(group_id, member, GroupRole::Member, now)?;
    }

    info!(
        group = %group_id,
        creator = %creator,
        members = others.len() + 1,
        "group created"
    );
    get_details(store, group_id, creator)
}

pub fn add_member<S>(
    store: &mut S,
    actor: UserId,
    group_id: GroupId,
    new_user: UserId,
    now: DateTime<Utc>,
) -> Result<(), ChatError>
where
    S: ChatStore + ?Sized,
{
    ensure_member(store, actor, group_id)?;
    if store.member_role(group_id, new_user)?.is_some() {
        return Err(ChatError::AlreadyMember(new_user));
    }
    if !friendship::are_friends(store, actor, new_user)? {
        return Err(ChatError::MembersMustBeFriends(new_user));
    }
    if !store.insert_member(group_id, new_user, GroupRole::Member, now)? {
        return Err(ChatError::AlreadyMember(new_user));
    }

    info!(group = %group_id, actor = %actor, member = %new_user, "group member added");
    Ok(())
}

pub fn remove_member<S>(
    store: &mut S,
    actor: UserId,
    group_id: GroupId,
    target: UserId,
) -> Result<(), ChatError>
where
    S: GroupStore + ?Sized,
{
    if ensure_member(store, actor, group_id)? != GroupRole::Admin {
        return Err(ChatError::Forbidden("only admins can remove members"));
    }
    if target == actor {
        return Err(ChatError::Forbidden("admins leave a group instead of removing themselves"));
    }
    if !store.remove_member(group_id, target)? {
        return Err(ChatError::NotFound("group member"));
    }

    info!(group = %group_id, actor = %actor, member = %target, "group member removed");
    Ok(())
}

pub fn leave<S>(store: &mut S, actor: UserId, group_id: GroupId) -> Result<(), ChatError>
where
    S: GroupStore + ?Sized,
{
    load_group(store, group_id)?;
    if !store.remove_member(group_id, actor)? {
        return Err(ChatError::NotFound("group member"));
    }
    info!(group = %group_id, member = %actor, "left group");
    Ok(())
}

/// Non-members get the same answer as for a missing group.
pub fn get_details<S>(
    store: &mut S,
    group_id: GroupId,
    requester: UserId,
) -> Result<GroupDetails, ChatError>
where
    S: ChatStore + ?Sized,
{
    let group = load_group(store, group_id)?;
    let role = store
        .member_role(group_id, requester)?
        .ok_or(ChatError::NotFound("group"))?;
    let members = store.list_members(group_id)?;
    let last_message = store.last_message(MessageScope::Group(group_id), requester)?;

    Ok(GroupDetails {
        group,
        role,
        members,
        last_message,
    })
}

pub fn list_groups<S>(store: &mut S, user: UserId) -> Result<Vec<GroupSummary>, ChatError>
where
    S: ChatStore + ?Sized,
{
    let groups = store.list_groups_for(user)?;
    let mut summaries = Vec::with_capacity(groups.len());

    for (group, role, member_count) in groups {
        let scope = MessageScope::Group(group.group_id);
        let last_message = store.last_message(scope, user)?;
        let is_muted = store.is_muted(user, MuteTarget::from(scope))?;
        summaries.push(GroupSummary {
            group,
            role,
            member_count,
            last_message,
            is_muted,
        });
    }

    debug!(user = %user, count = summaries.len(), "groups listed");
    Ok(summaries)
}

pub fn list_messages<S>(
    store: &mut S,
    user: UserId,
    group_id: GroupId,
) -> Result<Vec<MessageRecord>, ChatError>
where
    S: ChatStore + ?Sized,
{
    ensure_member(store, user, group_id)?;
    Ok(store.list_messages(MessageScope::Group(group_id), user)?)
}
