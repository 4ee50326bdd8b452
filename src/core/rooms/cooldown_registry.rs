// Per-user guard against duplicate or too-frequent room creation.
//
// Each user owns their own state entry and their own async mutex, so work for
// different users never waits on a shared lock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Transient per-user flags, owned by the registry.
#[derive(Debug, Clone)]
struct UserCreationState {
    creating: bool,
    last_join: Instant,
    creation_started_at: Option<Instant>,
}

pub struct CooldownRegistry {
    cooldown: Duration,
    creation_guard: Duration,
    states: DashMap<u64, UserCreationState>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl CooldownRegistry {
    pub fn new(cooldown: Duration, creation_guard: Duration) -> Self {
        Self {
            cooldown,
            creation_guard,
            states: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Mark `user_id` as creating unless it already is, or its last join was
    /// processed less than `cooldown` ago.
    pub fn try_acquire(&self, user_id: u64, now: Instant) -> bool {
        match self.states.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                if state.creating || now.duration_since(state.last_join) < self.cooldown {
                    return false;
                }
                state.creating = true;
                state.last_join = now;
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(UserCreationState {
                    creating: true,
                    last_join: now,
                    creation_started_at: None,
                });
                true
            }
        }
    }

    /// Clear the creating flag. Safe to call for unknown users.
    pub fn release(&self, user_id: u64) {
        if let Some(mut state) = self.states.get_mut(&user_id) {
            state.creating = false;
        }
    }

    /// Scoped variant of [`try_acquire`](Self::try_acquire): the returned permit
    /// releases the user (and any creation marker) when dropped.
    pub fn acquire(&self, user_id: u64, now: Instant) -> Option<CreationPermit<'_>> {
        self.try_acquire(user_id, now).then(|| CreationPermit {
            registry: self,
            user_id,
        })
    }

    /// Stamp the creation-in-flight marker. Returns false if a creation for
    /// this user started less than `creation_guard` ago.
    pub fn begin_creation(&self, user_id: u64, now: Instant) -> bool {
        let mut state = self.states.entry(user_id).or_insert(UserCreationState {
            creating: false,
            last_join: now,
            creation_started_at: None,
        });

        if let Some(started) = state.creation_started_at {
            if now.duration_since(started) < self.creation_guard {
                return false;
            }
        }
        state.creation_started_at = Some(now);
        true
    }

    pub fn end_creation(&self, user_id: u64) {
        if let Some(mut state) = self.states.get_mut(&user_id) {
            state.creation_started_at = None;
        }
    }

    #[cfg(test)]
    pub fn is_creating(&self, user_id: u64) -> bool {
        self.states
            .get(&user_id)
            .map(|state| state.creating)
            .unwrap_or(false)
    }

    /// The exclusive section for one user. Different users get different mutexes.
    pub fn user_lock(&self, user_id: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop entries whose last activity is older than `stale_after`.
    ///
    /// Stuck `creating` flags are dropped as well once stale. Locks are only
    /// evicted when nobody else holds a handle to them.
    pub fn sweep_expired(&self, now: Instant, stale_after: Duration) -> usize {
        // Counted inside retain: joins keep inserting while the sweep runs.
        let mut removed = 0;
        self.states.retain(|_, state| {
            let last_activity = state
                .creation_started_at
                .map_or(state.last_join, |started| started.max(state.last_join));
            let keep = now.duration_since(last_activity) < stale_after;
            if !keep {
                removed += 1;
            }
            keep
        });

        self.locks
            .retain(|user_id, lock| self.states.contains_key(user_id) || Arc::strong_count(lock) > 1);

        removed
    }

    pub fn tracked_users(&self) -> usize {
        self.states.len()
    }
}

/// Held for the duration of one creation attempt.
pub struct CreationPermit<'a> {
    registry: &'a CooldownRegistry,
    user_id: u64,
}

impl Drop for CreationPermit<'_> {
    fn drop(&mut self) {
        self.registry.end_creation(self.user_id);
        self.registry.release(self.user_id);
    }
}
