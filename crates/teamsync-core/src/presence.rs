//! Presence reconciliation.
//!
//! Maintains the authoritative "who is online" set from two inputs: full
//! snapshots sent on connect, and incremental flips sent as users come
//! and go. Snapshots always win; incremental updates are filtered for
//! duplicates and for rapid flapping.
//!
//! Flap suppression exists because a user with an unstable connection
//! otherwise strobes every roster in the UI. A flip that arrives within
//! the suppression window of the previous accepted flip for the same
//! user is dropped. The next snapshot corrects any state this hides.

use std::{
    collections::{BTreeSet, HashMap},
    time::{Duration, Instant},
};

use teamsync_proto::{PresenceOrigin, PresenceStatus, UserId};

/// Minimum interval between accepted status flips for one user.
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct PresenceRecord<I> {
    status: PresenceStatus,
    /// Signature of the last applied update. Server-side retries replay
    /// the identical (status, timestamp) pair; only applied updates may
    /// block a redelivery, otherwise a flip suppressed inside the window
    /// could never land when redelivered after it.
    last_signature: Option<(PresenceStatus, u64)>,
    /// When the last status change was accepted. `None` for users that
    /// arrived via snapshot and have not flipped since.
    last_flip_at: Option<I>,
}

/// Authoritative online set with flap suppression.
#[derive(Debug, Clone)]
pub struct PresenceReconciler<I = Instant>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    records: HashMap<UserId, PresenceRecord<I>>,
    suppression_window: Duration,
}

impl<I> Default for PresenceReconciler<I>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESSION_WINDOW)
    }
}

impl<I> PresenceReconciler<I>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    /// Create a reconciler with the given suppression window.
    #[must_use]
    pub fn new(suppression_window: Duration) -> Self {
        Self { records: HashMap::new(), suppression_window }
    }

    /// Replace the entire online set from a connect-time snapshot.
    ///
    /// Snapshot wins unconditionally: stale incremental state, including
    /// anything flap suppression hid, is discarded. Suppression history
    /// resets so the first post-snapshot flip is always accepted.
    pub fn apply_snapshot(&mut self, user_ids: &[UserId]) {
        self.records.clear();
        for &user_id in user_ids {
            self.records.insert(
                user_id,
                PresenceRecord {
                    status: PresenceStatus::Online,
                    last_signature: None,
                    last_flip_at: None,
                },
            );
        }
    }

    /// Apply one incremental presence update.
    ///
    /// Returns `true` when the online set changed. Updates are dropped
    /// when they repeat the last applied (status, timestamp) signature,
    /// when they do not change the user's status, or when they arrive
    /// inside the suppression window of the previous accepted flip.
    /// Snapshot-origin updates bypass suppression. A flip that was
    /// suppressed and then redelivered after the window applies.
    pub fn apply_update(
        &mut self,
        user_id: UserId,
        status: PresenceStatus,
        timestamp: u64,
        origin: PresenceOrigin,
        now: I,
    ) -> bool {
        let signature = (status, timestamp);

        if let Some(record) = self.records.get_mut(&user_id) {
            if record.last_signature == Some(signature) {
                return false;
            }

            if record.status == status {
                return false;
            }

            if origin == PresenceOrigin::Incremental
                && let Some(last_flip) = record.last_flip_at
                && now - last_flip < self.suppression_window
            {
                tracing::debug!(user_id = %user_id, ?status, "presence flip suppressed");
                return false;
            }

            record.status = status;
            record.last_signature = Some(signature);
            record.last_flip_at = Some(now);
            return true;
        }

        // Unknown user: an Offline flip for someone already absent from
        // the set changes nothing.
        if status == PresenceStatus::Offline {
            return false;
        }
        self.records.insert(
            user_id,
            PresenceRecord {
                status,
                last_signature: Some(signature),
                last_flip_at: Some(now),
            },
        );
        true
    }

    /// Whether a user is currently online.
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.records
            .get(&user_id)
            .is_some_and(|r| r.status == PresenceStatus::Online)
    }

    /// All online users, ordered for deterministic rendering.
    #[must_use]
    pub fn online_user_ids(&self) -> BTreeSet<UserId> {
        self.records
            .iter()
            .filter(|(_, r)| r.status == PresenceStatus::Online)
            .map(|(&id, _)| id)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::env::{Environment, test_utils::MockEnv};

    use super::*;

    fn reconciler() -> PresenceReconciler {
        PresenceReconciler::default()
    }

    #[test]
    fn snapshot_replaces_online_set() {
        let env = MockEnv::new();
        let mut p = reconciler();
        let _ = p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        );

        p.apply_snapshot(&[UserId(2), UserId(3)]);
        assert!(!p.is_online(UserId(1)));
        assert!(p.is_online(UserId(2)));
        assert!(p.is_online(UserId(3)));
        assert_eq!(p.online_user_ids().len(), 2);
    }

    #[test]
    fn duplicate_signature_is_ignored() {
        let env = MockEnv::new();
        let mut p = reconciler();

        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        ));
        env.advance(Duration::from_secs(10));
        assert!(!p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        ));
    }

    #[test]
    fn rapid_flap_is_suppressed() {
        let env = MockEnv::new();
        let mut p = reconciler();

        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        ));

        env.advance(Duration::from_millis(500));
        assert!(!p.apply_update(
            UserId(1),
            PresenceStatus::Offline,
            101,
            PresenceOrigin::Incremental,
            env.now(),
        ));
        assert!(p.is_online(UserId(1)), "flip inside window is dropped");

        env.advance(Duration::from_secs(2));
        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Offline,
            102,
            PresenceOrigin::Incremental,
            env.now(),
        ));
        assert!(!p.is_online(UserId(1)));
    }

    #[test]
    fn redelivered_suppressed_flip_applies_after_window() {
        let env = MockEnv::new();
        let mut p = reconciler();

        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        ));

        // Flip inside the window is suppressed
        env.advance(Duration::from_millis(500));
        assert!(!p.apply_update(
            UserId(1),
            PresenceStatus::Offline,
            101,
            PresenceOrigin::Incremental,
            env.now(),
        ));

        // The server retries the identical update once the window has
        // passed; it must not be mistaken for a duplicate of an applied
        // one.
        env.advance(Duration::from_secs(5));
        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Offline,
            101,
            PresenceOrigin::Incremental,
            env.now(),
        ));
        assert!(!p.is_online(UserId(1)));
    }

    #[test]
    fn snapshot_origin_bypasses_suppression() {
        let env = MockEnv::new();
        let mut p = reconciler();

        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        ));
        env.advance(Duration::from_millis(100));
        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Offline,
            101,
            PresenceOrigin::Snapshot,
            env.now(),
        ));
        assert!(!p.is_online(UserId(1)));
    }

    #[test]
    fn snapshot_resets_suppression_history() {
        let env = MockEnv::new();
        let mut p = reconciler();

        let _ = p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        );
        p.apply_snapshot(&[UserId(1)]);

        // First post-snapshot flip lands even though the pre-snapshot
        // flip was moments ago.
        assert!(p.apply_update(
            UserId(1),
            PresenceStatus::Offline,
            101,
            PresenceOrigin::Incremental,
            env.now(),
        ));
    }

    #[test]
    fn offline_for_unknown_user_changes_nothing() {
        let env = MockEnv::new();
        let mut p = reconciler();
        assert!(!p.apply_update(
            UserId(9),
            PresenceStatus::Offline,
            100,
            PresenceOrigin::Incremental,
            env.now(),
        ));
        assert!(p.online_user_ids().is_empty());
    }

    #[test]
    fn no_op_status_repeat_is_not_a_change() {
        let env = MockEnv::new();
        let mut p = reconciler();
        p.apply_snapshot(&[UserId(1)]);

        env.advance(Duration::from_secs(5));
        assert!(!p.apply_update(
            UserId(1),
            PresenceStatus::Online,
            200,
            PresenceOrigin::Incremental,
            env.now(),
        ));
    }
}
