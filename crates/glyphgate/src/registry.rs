//! Challenge registry
//!
//! Process-wide store of active challenges keyed by (group, user). Each entry
//! sits behind its own async mutex: operations on one key are linearized by
//! holding that lock for the whole state transition, while different keys
//! proceed independently. The map itself is sharded, so lookups never take a
//! registry-wide lock.
//!
//! In-memory only; an empty registry after restart is a valid state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use glyphgate_common::{ChallengeKey, ChallengeSummary, GateError, GroupId, UserId};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

use crate::captcha::{Challenge, ChallengeParams};
use crate::catalog::GlyphCatalog;

/// Shared, individually locked challenge
pub type ChallengeHandle = Arc<Mutex<Challenge>>;

/// Result of registering a new challenge
pub struct Registered {
    pub handle: ChallengeHandle,
    /// Challenge previously active under the same key, now replaced
    pub displaced: Option<ChallengeHandle>,
}

#[derive(Default)]
pub struct ChallengeRegistry {
    entries: DashMap<ChallengeKey, ChallengeHandle>,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a challenge and register it, replacing any previous one for
    /// the same key
    pub fn create<R: Rng + ?Sized>(
        &self,
        group: GroupId,
        user: UserId,
        params: &ChallengeParams,
        catalog: &GlyphCatalog,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Registered, GateError> {
        let challenge = Challenge::new(user, group, params, catalog, rng, now)?;
        Ok(self.insert(challenge))
    }

    /// Register an existing challenge under its own key
    pub fn insert(&self, challenge: Challenge) -> Registered {
        let key = challenge.key();
        let handle = Arc::new(Mutex::new(challenge));
        let displaced = self.entries.insert(key, handle.clone());

        debug!(
            key = %key,
            replaced = displaced.is_some(),
            active = self.entries.len(),
            "Challenge registered"
        );

        Registered { handle, displaced }
    }

    pub fn get(&self, key: &ChallengeKey) -> Option<ChallengeHandle> {
        // clone out so no shard guard outlives this call
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &ChallengeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether `key` still maps to `handle`
    pub fn is_current(&self, key: &ChallengeKey, handle: &ChallengeHandle) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), handle))
    }

    /// Remove whatever challenge is registered under `key`
    pub fn remove(&self, key: &ChallengeKey) -> Option<ChallengeHandle> {
        let removed = self.entries.remove(key).map(|(_, handle)| handle);
        if removed.is_some() {
            debug!(key = %key, active = self.entries.len(), "Challenge removed");
        }
        removed
    }

    /// Remove `key` only if it still maps to `handle`, so a challenge created
    /// in the meantime under the same key survives
    pub fn remove_if_same(&self, key: &ChallengeKey, handle: &ChallengeHandle) -> bool {
        let removed = self
            .entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, handle))
            .is_some();
        if removed {
            debug!(key = %key, active = self.entries.len(), "Challenge removed");
        }
        removed
    }

    /// Keys and handles present at call time. Entries inserted while the
    /// caller walks the snapshot are picked up by the next one.
    pub fn snapshot(&self) -> Vec<(ChallengeKey, ChallengeHandle)> {
        self.entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summaries of every active challenge
    pub async fn summaries(&self) -> Vec<ChallengeSummary> {
        let mut summaries = Vec::with_capacity(self.len());
        for (_, handle) in self.snapshot() {
            summaries.push(handle.lock().await.summary());
        }
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::test_catalog;
    use glyphgate_common::ChallengeState;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn key(group: i64, user: i64) -> ChallengeKey {
        ChallengeKey::new(GroupId(group), UserId(user))
    }

    fn create(registry: &ChallengeRegistry, group: i64, user: i64) -> Registered {
        let catalog = test_catalog(20);
        let mut rng = StdRng::seed_from_u64(user as u64);
        registry
            .create(
                GroupId(group),
                UserId(user),
                &ChallengeParams::new(2, 6, 1),
                &catalog,
                &mut rng,
                Utc::now(),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let registry = ChallengeRegistry::new();
        let registered = create(&registry, 1, 10);
        assert!(registered.displaced.is_none());
        assert_eq!(registry.len(), 1);

        let handle = registry.get(&key(1, 10)).unwrap();
        assert!(Arc::ptr_eq(&handle, &registered.handle));
        assert_eq!(handle.lock().await.user(), UserId(10));

        assert!(registry.get(&key(1, 11)).is_none());
        assert!(registry.get(&key(2, 10)).is_none());

        assert!(registry.remove(&key(1, 10)).is_some());
        assert!(registry.remove(&key(1, 10)).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_one_challenge_per_key() {
        let registry = ChallengeRegistry::new();
        let first = create(&registry, 1, 10);
        let second = create(&registry, 1, 10);

        assert_eq!(registry.len(), 1);
        let displaced = second.displaced.expect("first challenge displaced");
        assert!(Arc::ptr_eq(&displaced, &first.handle));

        assert!(!registry.is_current(&key(1, 10), &first.handle));
        assert!(registry.is_current(&key(1, 10), &second.handle));

        // stale handle cannot remove its replacement
        assert!(!registry.remove_if_same(&key(1, 10), &first.handle));
        assert!(registry.contains(&key(1, 10)));
        assert!(registry.remove_if_same(&key(1, 10), &second.handle));
        assert!(!registry.contains(&key(1, 10)));
        assert!(!registry.is_current(&key(1, 10), &second.handle));
    }

    #[test]
    fn test_invalid_params_register_nothing() {
        let registry = ChallengeRegistry::new();
        let catalog = test_catalog(20);
        let mut rng = StdRng::seed_from_u64(0);
        let result = registry.create(
            GroupId(1),
            UserId(1),
            &ChallengeParams::new(2, 5, 1),
            &catalog,
            &mut rng,
            Utc::now(),
        );
        assert!(matches!(result, Err(GateError::InvalidConfiguration(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_transitions_are_serialized() {
        let registry = Arc::new(ChallengeRegistry::new());
        let registered = create(&registry, 1, 10);

        let wrong: Vec<String> = {
            let challenge = registered.handle.lock().await;
            challenge
                .buttons()
                .iter()
                .filter(|b| !b.is_correct())
                .map(|b| b.glyph().id().to_string())
                .collect()
        };

        // budget 1: exactly one of the concurrent wrong presses fails the challenge
        let mut tasks = Vec::new();
        for id in wrong {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let handle = registry.get(&key(1, 10)).unwrap();
                let mut challenge = handle.lock().await;
                challenge.select_button(&id, Utc::now())
            }));
        }

        let mut exceeded = 0;
        let mut terminal = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(crate::captcha::SelectOutcome::Exceeded { .. }) => exceeded += 1,
                Err(GateError::AlreadyTerminal(_)) => terminal += 1,
                _ => {}
            }
        }

        assert_eq!(exceeded, 1);
        assert_eq!(terminal, 2);
        assert_eq!(registered.handle.lock().await.state(), ChallengeState::Failed);
        assert_eq!(registered.handle.lock().await.errors_made(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_and_summaries() {
        let registry = ChallengeRegistry::new();
        create(&registry, 1, 10);
        create(&registry, 1, 11);
        create(&registry, 2, 10);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 3);

        // mutations after the snapshot do not affect it
        registry.remove(&key(1, 11));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(registry.len(), 2);

        let summaries = registry.summaries().await;
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.state == ChallengeState::Pending));
    }
}
