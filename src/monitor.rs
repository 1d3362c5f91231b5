//! Post-shutdown tunnel drain monitor.
//!
//! After a shutdown-class command succeeds with `--block`, the router keeps
//! running until the tunnels it participates in have expired. This module
//! polls the participating-tunnel count and returns once it drops below one.
//!
//! The decision logic lives in [`DrainMonitor`], a pure Idle → Polling →
//! Drained state machine fed one count at a time, so tests can drive it with
//! a scripted sequence. [`run_until_drained`] wraps it in the real poll loop:
//! fetch, log on change only, sleep, repeat.

use std::time::{Duration, Instant};

use tracing::info;

use crate::client::{ClientError, ControlClient, RouterControl};

/// Interval between tunnel-count fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Participating tunnels live at most ten minutes; with clock slack the
/// router quotes eleven as the worst-case graceful drain window.
const DRAIN_BASELINE: Duration = Duration::from_secs(11 * 60);

/// Anything the monitor can poll a participating-tunnel count from.
#[allow(async_fn_in_trait)]
pub trait TunnelSource {
    async fn tunnel_count(&self) -> Result<i64, ClientError>;
}

impl TunnelSource for ControlClient {
    async fn tunnel_count(&self) -> Result<i64, ClientError> {
        self.participating_tunnels().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Polling,
    Drained,
}

/// What one observed count means for the loop.
#[derive(Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The count differs from the previous poll (or is the first one).
    Changed { count: i64 },
    /// Same count as last time; stay quiet.
    Unchanged,
    /// The count dropped below one; the router has quiesced.
    Drained { count: i64 },
}

/// Tracks the last observed count across polls.
pub struct DrainMonitor {
    state: State,
    last_count: i64,
    started_at: Instant,
}

impl DrainMonitor {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            last_count: 0,
            started_at: Instant::now(),
        }
    }

    /// Feed one observed count into the state machine.
    pub fn observe(&mut self, count: i64) -> MonitorEvent {
        if count < 1 {
            self.state = State::Drained;
            self.last_count = count;
            return MonitorEvent::Drained { count };
        }
        let changed = self.state == State::Idle || count != self.last_count;
        self.state = State::Polling;
        self.last_count = count;
        if changed {
            MonitorEvent::Changed { count }
        } else {
            MonitorEvent::Unchanged
        }
    }

    pub fn is_drained(&self) -> bool {
        self.state == State::Drained
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// How much of the worst-case drain window is left.
    pub fn remaining_estimate(&self) -> Duration {
        DRAIN_BASELINE.saturating_sub(self.elapsed())
    }
}

/// Summary of one completed drain, for the caller's final log line and for
/// tests asserting the change-only logging contract.
#[derive(Debug)]
pub struct DrainReport {
    /// Total number of tunnel-count fetches.
    pub polls: u32,
    /// The counts that were logged, in order (changes plus the final drain).
    pub changes: Vec<i64>,
    pub elapsed: Duration,
}

/// Poll `source` every `interval` until the participating-tunnel count drops
/// below one. Any poll error aborts the loop and propagates to the caller.
pub async fn run_until_drained<S: TunnelSource>(
    source: &S,
    interval: Duration,
) -> Result<DrainReport, ClientError> {
    let mut monitor = DrainMonitor::new();
    let mut polls = 0u32;
    let mut changes = Vec::new();

    loop {
        let count = source.tunnel_count().await?;
        polls += 1;
        match monitor.observe(count) {
            MonitorEvent::Changed { count } => {
                changes.push(count);
                info!(
                    "Waiting for expiration of {} participating tunnels ({}s elapsed, up to {}s left)",
                    count,
                    monitor.elapsed().as_secs(),
                    monitor.remaining_estimate().as_secs()
                );
            }
            MonitorEvent::Unchanged => {}
            MonitorEvent::Drained { count } => {
                changes.push(count);
                info!(
                    "Participating tunnels expired after {}s",
                    monitor.elapsed().as_secs()
                );
            }
        }
        if monitor.is_drained() {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    Ok(DrainReport {
        polls,
        changes,
        elapsed: monitor.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedSource {
        counts: RefCell<VecDeque<Result<i64, ClientError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<i64, ClientError>>) -> Self {
            Self {
                counts: RefCell::new(script.into()),
            }
        }
    }

    impl TunnelSource for ScriptedSource {
        async fn tunnel_count(&self) -> Result<i64, ClientError> {
            self.counts
                .borrow_mut()
                .pop_front()
                .expect("script exhausted before the monitor drained")
        }
    }

    #[test]
    fn first_count_is_a_change() {
        let mut monitor = DrainMonitor::new();
        assert_eq!(monitor.observe(5), MonitorEvent::Changed { count: 5 });
        assert!(!monitor.is_drained());
    }

    #[test]
    fn repeated_count_is_quiet() {
        let mut monitor = DrainMonitor::new();
        monitor.observe(5);
        assert_eq!(monitor.observe(5), MonitorEvent::Unchanged);
        assert_eq!(monitor.observe(3), MonitorEvent::Changed { count: 3 });
    }

    #[test]
    fn zero_drains_immediately() {
        let mut monitor = DrainMonitor::new();
        assert_eq!(monitor.observe(0), MonitorEvent::Drained { count: 0 });
        assert!(monitor.is_drained());
    }

    #[test]
    fn drain_beats_change_detection() {
        let mut monitor = DrainMonitor::new();
        monitor.observe(5);
        monitor.observe(5);
        assert_eq!(monitor.observe(0), MonitorEvent::Drained { count: 0 });
    }

    #[tokio::test]
    async fn logs_only_changes_and_exits_on_drain() {
        let source =
            ScriptedSource::new(vec![Ok(5), Ok(5), Ok(3), Ok(3), Ok(0)]);
        let report = run_until_drained(&source, Duration::ZERO).await.unwrap();
        assert_eq!(report.polls, 5);
        assert_eq!(report.changes, vec![5, 3, 0]);
    }

    #[tokio::test]
    async fn already_drained_router_exits_on_entry() {
        let source = ScriptedSource::new(vec![Ok(0)]);
        let report = run_until_drained(&source, Duration::ZERO).await.unwrap();
        assert_eq!(report.polls, 1);
        assert_eq!(report.changes, vec![0]);
    }

    #[tokio::test]
    async fn poll_errors_abort_the_loop() {
        let source = ScriptedSource::new(vec![
            Ok(5),
            Err(ClientError::Protocol("connection lost".into())),
        ]);
        let err = run_until_drained(&source, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }
}
