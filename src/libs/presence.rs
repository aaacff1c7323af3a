use crate::libs::core::clock::Clock;
use crate::libs::core::models::{CanonicalPair, UserId};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type TypingMap = HashMap<CanonicalPair, HashMap<UserId, DateTime<Utc>>>;

/// Process-local typing indicators keyed by the same canonical pair as conversations.
/// A user appears in a pair's entry only while typing; empty pairs are dropped.
pub struct PresenceStore {
    typing: Mutex<TypingMap>,
    ttl: Option<TimeDelta>,
    clock: Arc<dyn Clock>,
}

impl PresenceStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Option<Duration>) -> Self {
        Self {
            typing: Mutex::new(HashMap::new()),
            ttl: ttl.map(|ttl| TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)),
            clock,
        }
    }

    fn is_fresh(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - since <= ttl,
            None => true,
        }
    }

    pub fn set_typing(&self, user: UserId, counterpart: UserId, is_typing: bool) {
        let pair = CanonicalPair::of(user, counterpart);
        let now = self.clock.now();
        let mut typing = self.typing.lock();

        // Stale flags on the touched pair go first so a clear can empty it.
        if let Some(entry) = typing.get_mut(&pair) {
            entry.retain(|_, since| self.is_fresh(*since, now));
        }
        if is_typing {
            typing.entry(pair).or_default().insert(user, now);
        } else if let Some(entry) = typing.get_mut(&pair) {
            entry.remove(&user);
        }
        if typing.get(&pair).is_some_and(|entry| entry.is_empty()) {
            typing.remove(&pair);
        }
        debug!(user = %user, counterpart = %counterpart, is_typing, "typing flag updated");
    }

    /// Whether `counterpart` is currently typing to `user`.
    pub fn is_typing(&self, user: UserId, counterpart: UserId) -> bool {
        let now = self.clock.now();
        let typing = self.typing.lock();
        typing
            .get(&CanonicalPair::of(user, counterpart))
            .and_then(|entry| entry.get(&counterpart))
            .is_some_and(|since| self.is_fresh(*since, now))
    }

    /// Whether the pair has any entry at all, expired or not.
    pub fn is_tracked(&self, a: UserId, b: UserId) -> bool {
        self.typing.lock().contains_key(&CanonicalPair::of(a, b))
    }

    /// Drops expired flags and the pairs they leave empty. Returns flags removed.
    pub fn sweep_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = self.clock.now();
        let mut typing = self.typing.lock();
        let mut removed = 0;

        typing.retain(|_, entry| {
            let before = entry.len();
            entry.retain(|_, since| self.is_fresh(*since, now));
            removed += before - entry.len();
            !entry.is_empty()
        });
        if removed > 0 {
            debug!(removed, "expired typing flags swept");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::core::clock::ManualClock;

    fn store(ttl: Option<Duration>) -> (PresenceStore, ManualClock) {
        let clock = ManualClock::default();
        (PresenceStore::new(Arc::new(clock.clone()), ttl), clock)
    }

    #[test]
    fn typing_is_seen_by_the_other_side_only() {
        let (presence, _) = store(None);
        presence.set_typing(UserId(1), UserId(2), true);

        assert!(presence.is_typing(UserId(2), UserId(1)));
        assert!(!presence.is_typing(UserId(1), UserId(2)));
    }

    #[test]
    fn clearing_the_last_flag_drops_the_pair() {
        let (presence, _) = store(None);
        presence.set_typing(UserId(1), UserId(2), true);
        presence.set_typing(UserId(2), UserId(1), true);

        presence.set_typing(UserId(1), UserId(2), false);
        assert!(presence.is_tracked(UserId(2), UserId(1)));
        presence.set_typing(UserId(2), UserId(1), false);
        assert!(!presence.is_tracked(UserId(1), UserId(2)));
    }

    #[test]
    fn clearing_collects_the_partners_stale_flag() {
        let (presence, clock) = store(Some(Duration::from_secs(5)));
        presence.set_typing(UserId(1), UserId(2), true);
        clock.advance(TimeDelta::seconds(10));

        presence.set_typing(UserId(2), UserId(1), true);
        presence.set_typing(UserId(2), UserId(1), false);
        assert!(!presence.is_tracked(UserId(1), UserId(2)));
    }

    #[test]
    fn flags_never_expire_without_ttl() {
        let (presence, clock) = store(None);
        presence.set_typing(UserId(1), UserId(2), true);
        clock.advance(TimeDelta::days(1));

        assert!(presence.is_typing(UserId(2), UserId(1)));
        assert_eq!(presence.sweep_expired(), 0);
    }

    #[test]
    fn ttl_hides_and_sweeps_stale_flags() {
        let (presence, clock) = store(Some(Duration::from_secs(5)));
        presence.set_typing(UserId(1), UserId(2), true);
        clock.advance(TimeDelta::seconds(5));
        assert!(presence.is_typing(UserId(2), UserId(1)));

        clock.advance(TimeDelta::seconds(1));
        assert!(!presence.is_typing(UserId(2), UserId(1)));
        assert_eq!(presence.sweep_expired(), 1);
        assert!(!presence.is_tracked(UserId(1), UserId(2)));
    }
}
