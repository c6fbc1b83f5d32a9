//! Expiry sweeper: bans users who let their challenge time out.
//!
//! Runs on a fixed interval. Each pass walks a snapshot of the registry,
//! expires challenges older than the timeout and escalates each expiry
//! exactly once: delete the challenge message, ban the user, optionally tell
//! the group. Escalation failures are logged and the entry is removed anyway;
//! nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use glyphgate_common::{ChallengeKey, GateError, GroupId, MessageRef, UserId};
use serde::Serialize;

use crate::handler::text;
use crate::registry::ChallengeRegistry;
use crate::transport::Boundary;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between passes
    pub interval: Duration,
    /// Age after which a challenge expires
    pub timeout: TimeDelta,
    /// Post a notice in the group after a ban
    pub notify_on_fail: bool,
}

/// Outcome of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    pub escalation_failures: usize,
}

/// What the sweeper needs from an expired challenge after releasing its lock
struct Expired {
    key: ChallengeKey,
    message: Option<MessageRef>,
    created_at: DateTime<Utc>,
    correct_selected: usize,
    correct_count: usize,
}

pub struct Sweeper {
    registry: Arc<ChallengeRegistry>,
    boundary: Boundary,
    config: SweeperConfig,
}

impl Sweeper {
    pub fn new(registry: Arc<ChallengeRegistry>, boundary: Boundary, config: SweeperConfig) -> Self {
        Self {
            registry,
            boundary,
            config,
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Run one pass against `now`
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for (key, handle) in self.registry.snapshot() {
            report.examined += 1;

            let expired = {
                let mut challenge = handle.lock().await;
                match challenge.expire(now, self.config.timeout) {
                    Ok(true) => Expired {
                        key,
                        message: challenge.message(),
                        created_at: challenge.created_at(),
                        correct_selected: challenge.correct_selected_count(),
                        correct_count: challenge.correct_count(),
                    },
                    Ok(false) => continue,
                    Err(GateError::AlreadyTerminal(state)) => {
                        // finished by an event handler that has not removed it yet
                        tracing::debug!(key = %key, state = ?state, "Skipping finished challenge");
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(key = %key, error = %e, "Unexpected error while expiring challenge");
                        continue;
                    }
                }
            };

            tracing::info!(
                group_id = %key.group,
                user_id = %key.user,
                age_secs = (now - expired.created_at).num_seconds(),
                "Challenge expired, escalating"
            );

            report.expired += 1;
            if !self.escalate(&expired).await {
                report.escalation_failures += 1;
            }

            self.registry.remove_if_same(&key, &handle);
        }

        if report.expired > 0 {
            tracing::info!(
                examined = report.examined,
                expired = report.expired,
                escalation_failures = report.escalation_failures,
                "Sweep finished"
            );
        }

        report
    }

    /// Delete, ban, notify. Returns false if any step failed.
    async fn escalate(&self, expired: &Expired) -> bool {
        let ChallengeKey { group, user } = expired.key;
        let mut ok = true;

        if let Some(message) = expired.message {
            ok &= self.boundary.delete_challenge(group, message).await.is_ok();
        }

        let banned = self.boundary.ban_user(group, user).await.is_ok();
        ok &= banned;

        if banned && self.config.notify_on_fail {
            ok &= self.notify(group, user, expired).await;
        }

        ok
    }

    async fn notify(&self, group: GroupId, user: UserId, expired: &Expired) -> bool {
        let notice = text::timeout_notice(
            user,
            self.config.timeout,
            expired.correct_selected,
            expired.correct_count,
        );
        self.boundary.notify_group(group, &notice).await.is_ok()
    }
}

/// Background worker running [`Sweeper::sweep`] until shutdown
pub async fn sweeper_worker(sweeper: Arc<Sweeper>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
    tracing::info!(interval = ?sweeper.interval(), "Expiry sweeper started");

    let mut ticker = tokio::time::interval(sweeper.interval());
    // the first tick completes immediately; start one interval later
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweeper.sweep(Utc::now()).await;
            }
            _ = shutdown.recv() => {
                tracing::info!("Expiry sweeper shutting down");
                break;
            }
        }
    }
}
