//! Ban tracker
//!
//! Tracks per-identity failure records inside a trailing observation window
//! and bans identities that hit the configured threshold. Thread-safe: one
//! exclusive lock guards both the failure records and the active-ban set,
//! and counting plus ban issuance happen inside the same critical section so
//! two racing failures cannot each observe a sub-threshold count. The lock
//! is never held across I/O; audit emission and the firewall call happen
//! after it is released.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::audit::{AuditEvent, AuditSink};
use crate::network::firewall::BlockAction;

/// Why a failure was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    FailedLogin,
    SuspiciousCommand,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::FailedLogin => "failed-login",
            FailureKind::SuspiciousCommand => "suspicious-command",
        }
    }
}

struct TrackerState {
    /// Identity -> timestamps of failures, pruned to the observation window.
    failures: HashMap<IpAddr, Vec<Instant>>,
    /// Identity -> ban issued-at. One active entry per banned identity.
    bans: HashMap<IpAddr, Instant>,
}

/// Concurrent, time-windowed failure and ban bookkeeping.
pub struct BanTracker {
    state: Mutex<TrackerState>,
    threshold: usize,
    window: Duration,
    ban_duration: Duration,
    audit: AuditSink,
    block: Arc<dyn BlockAction>,
}

impl BanTracker {
    pub fn new(
        threshold: usize,
        window: Duration,
        ban_duration: Duration,
        audit: AuditSink,
        block: Arc<dyn BlockAction>,
    ) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                failures: HashMap::new(),
                bans: HashMap::new(),
            }),
            threshold,
            window,
            ban_duration,
            audit,
            block,
        }
    }

    /// Record one failure for `identity`. If the in-window count reaches the
    /// threshold, a ban entry is created (or refreshed - bans slide, they do
    /// not stack). Returns whether this call issued/refreshed a ban.
    pub fn record_failure(&self, identity: IpAddr, kind: FailureKind) -> bool {
        let now = Instant::now();

        let banned = {
            let mut state = self.state.lock().unwrap();
            let count = {
                let records = state.failures.entry(identity).or_default();
                // Events exactly at the window boundary still count.
                records.retain(|t| now.duration_since(*t) <= self.window);
                records.push(now);
                records.len()
            };
            if count >= self.threshold {
                state.bans.insert(identity, now);
                true
            } else {
                false
            }
        };

        tracing::debug!(
            "[tracker] [failure] ip={} kind={} banned={}",
            identity,
            kind.as_str(),
            banned
        );

        if banned {
            // Side effects stay outside the critical section.
            self.audit.emit(identity, AuditEvent::IpBanned, kind.as_str());
            if let Err(e) = self.block.block(identity) {
                tracing::warn!("[tracker] [block_failed] ip={} err={}", identity, e);
            }
        }

        banned
    }

    /// True iff an active ban exists for `identity`. An expired entry found
    /// here is removed on the spot, amortizing against the periodic sweep.
    pub fn is_banned(&self, identity: IpAddr) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();

        match state.bans.get(&identity) {
            Some(issued_at) if now.duration_since(*issued_at) <= self.ban_duration => true,
            Some(_) => {
                state.bans.remove(&identity);
                false
            }
            None => false,
        }
    }

    /// Discard failure records older than the observation window and bans
    /// older than the ban duration. Returns (identities with live failures,
    /// active bans) remaining.
    pub fn sweep(&self) -> (usize, usize) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();

        for records in state.failures.values_mut() {
            records.retain(|t| now.duration_since(*t) <= self.window);
        }
        state.failures.retain(|_, records| !records.is_empty());

        let window = self.ban_duration;
        state.bans.retain(|_, issued_at| now.duration_since(*issued_at) <= window);

        let remaining = (state.failures.len(), state.bans.len());
        drop(state);

        tracing::debug!(
            "[tracker] [sweep] tracked={} banned={}",
            remaining.0,
            remaining.1
        );
        remaining
    }

    /// Run [`BanTracker::sweep`] on a fixed interval for the process
    /// lifetime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval fires immediately; skip the zeroth tick
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tracker.sweep();
            }
        })
    }

    pub fn active_ban_count(&self) -> usize {
        self.state.lock().unwrap().bans.len()
    }

    /// In-window failure count for one identity.
    pub fn failure_count(&self, identity: IpAddr) -> usize {
        let now = Instant::now();
        let state = self.state.lock().unwrap();
        state
            .failures
            .get(&identity)
            .map(|records| {
                records
                    .iter()
                    .filter(|t| now.duration_since(**t) <= self.window)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditRecord;
    use crate::network::firewall::NoopBlock;
    use std::net::Ipv4Addr;
    use tokio::sync::mpsc;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn tracker(
        threshold: usize,
        window: Duration,
        ban_duration: Duration,
    ) -> (Arc<BanTracker>, mpsc::Receiver<AuditRecord>) {
        let (audit, rx) = AuditSink::channel(64);
        let t = BanTracker::new(threshold, window, ban_duration, audit, Arc::new(NoopBlock));
        (Arc::new(t), rx)
    }

    fn count_ban_events(rx: &mut mpsc::Receiver<AuditRecord>) -> usize {
        let mut n = 0;
        while let Ok(rec) = rx.try_recv() {
            if rec.event == AuditEvent::IpBanned {
                n += 1;
            }
        }
        n
    }

    #[test]
    fn test_threshold_boundary() {
        let (t, mut rx) = tracker(3, Duration::from_secs(60), Duration::from_secs(60));

        assert!(!t.record_failure(ip(1), FailureKind::FailedLogin));
        assert!(!t.record_failure(ip(1), FailureKind::FailedLogin));
        assert!(!t.is_banned(ip(1)), "threshold - 1 failures must not ban");

        assert!(t.record_failure(ip(1), FailureKind::FailedLogin));
        assert!(t.is_banned(ip(1)));
        assert_eq!(count_ban_events(&mut rx), 1);
    }

    #[test]
    fn test_identities_are_independent() {
        let (t, _rx) = tracker(2, Duration::from_secs(60), Duration::from_secs(60));

        t.record_failure(ip(1), FailureKind::FailedLogin);
        t.record_failure(ip(2), FailureKind::FailedLogin);
        assert!(!t.is_banned(ip(1)));
        assert!(!t.is_banned(ip(2)));

        t.record_failure(ip(1), FailureKind::SuspiciousCommand);
        assert!(t.is_banned(ip(1)));
        assert!(!t.is_banned(ip(2)));
    }

    #[test]
    fn test_old_failures_age_out_of_window() {
        let (t, _rx) = tracker(3, Duration::from_millis(50), Duration::from_secs(60));

        t.record_failure(ip(1), FailureKind::FailedLogin);
        t.record_failure(ip(1), FailureKind::FailedLogin);
        std::thread::sleep(Duration::from_millis(80));

        // The two old failures fell out of the window; this is a fresh count.
        assert!(!t.record_failure(ip(1), FailureKind::FailedLogin));
        assert!(!t.is_banned(ip(1)));
    }

    #[test]
    fn test_ban_expires_without_sweep() {
        let (t, _rx) = tracker(1, Duration::from_secs(60), Duration::from_millis(50));

        assert!(t.record_failure(ip(1), FailureKind::FailedLogin));
        assert!(t.is_banned(ip(1)));

        std::thread::sleep(Duration::from_millis(80));
        assert!(!t.is_banned(ip(1)));
        // the expired entry was lazily removed
        assert_eq!(t.active_ban_count(), 0);
    }

    #[test]
    fn test_reban_slides_instead_of_stacking() {
        let (t, _rx) = tracker(1, Duration::from_secs(60), Duration::from_millis(120));

        t.record_failure(ip(1), FailureKind::FailedLogin);
        std::thread::sleep(Duration::from_millis(70));

        // Refresh: issued-at moves to now.
        assert!(t.record_failure(ip(1), FailureKind::SuspiciousCommand));
        std::thread::sleep(Duration::from_millis(70));

        // 140ms after the first ban, 70ms after the refresh: still banned.
        assert!(t.is_banned(ip(1)));
    }

    #[test]
    fn test_sweep_prunes_both_collections() {
        let (t, _rx) = tracker(5, Duration::from_millis(40), Duration::from_millis(40));

        t.record_failure(ip(1), FailureKind::FailedLogin);
        t.record_failure(ip(2), FailureKind::FailedLogin);
        assert_eq!(t.sweep(), (2, 0));

        std::thread::sleep(Duration::from_millis(70));
        assert_eq!(t.sweep(), (0, 0));
    }

    #[test]
    fn test_concurrent_crossing_emits_one_ban_event() {
        let threshold = 5;
        let (t, mut rx) = tracker(threshold, Duration::from_secs(60), Duration::from_secs(60));

        let handles: Vec<_> = (0..threshold)
            .map(|_| {
                let t = Arc::clone(&t);
                std::thread::spawn(move || t.record_failure(ip(1), FailureKind::FailedLogin))
            })
            .collect();

        let issued: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(issued, 1, "exactly one call may observe the crossing");
        assert_eq!(count_ban_events(&mut rx), 1);
        assert!(t.is_banned(ip(1)));
    }

    #[test]
    fn test_block_action_receives_banned_identity() {
        struct Recording(Mutex<Vec<IpAddr>>);
        impl BlockAction for Recording {
            fn block(&self, identity: IpAddr) -> anyhow::Result<()> {
                self.0.lock().unwrap().push(identity);
                Ok(())
            }
        }

        let (audit, _rx) = AuditSink::channel(8);
        let block = Arc::new(Recording(Mutex::new(Vec::new())));
        let t = BanTracker::new(
            1,
            Duration::from_secs(60),
            Duration::from_secs(60),
            audit,
            Arc::clone(&block) as Arc<dyn BlockAction>,
        );

        t.record_failure(ip(9), FailureKind::SuspiciousCommand);
        assert_eq!(block.0.lock().unwrap().as_slice(), &[ip(9)]);
    }

    #[test]
    fn test_block_failure_degrades_to_in_process_ban() {
        struct Failing;
        impl BlockAction for Failing {
            fn block(&self, _identity: IpAddr) -> anyhow::Result<()> {
                anyhow::bail!("iptables unavailable")
            }
        }

        let (audit, mut rx) = AuditSink::channel(8);
        let t = BanTracker::new(
            1,
            Duration::from_secs(60),
            Duration::from_secs(60),
            audit,
            Arc::new(Failing),
        );

        assert!(t.record_failure(ip(3), FailureKind::FailedLogin));
        assert!(t.is_banned(ip(3)), "tracker stays authoritative");
        assert_eq!(count_ban_events(&mut rx), 1);
    }
}
