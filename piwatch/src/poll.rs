//! Poll
//!
//! Periodic tick sources for the two poll kinds. Each task runs in a
//! dedicated thread and forwards ticks over a channel; stopping a task
//! only prevents future firings. Work already dispatched from an earlier
//! tick is unaffected, so overlapping in-flight fetches remain possible
//! and downstream consumers handle them as independent results.

use crossbeam::channel::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Summary,
    Feed,
}

/// Floor on the feed poll interval. The feed never polls faster than once
/// per second regardless of the configured refresh interval.
pub const FEED_INTERVAL_FLOOR_MS: u64 = 1000;

struct PeriodicTask {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl PeriodicTask {
    fn spawn(kind: PollKind, interval: Duration, tick_tx: Sender<PollKind>) -> PeriodicTask {
        let (stop_tx, stop_rx) = channel::bounded(1);
        let handle = thread::spawn(move || {
            let tick = channel::tick(interval);
            loop {
                crossbeam::select! {
                    recv(stop_rx) -> _ => break,
                    recv(tick) -> _ => {
                        if tick_tx.send(kind).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        PeriodicTask { stop_tx, handle }
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}

/// Owns the summary and feed tick sources. Starting a kind that is already
/// running is a no-op, so pause/resume cycles never stack timers.
pub struct Scheduler {
    summary_interval: Duration,
    feed_interval: Option<Duration>,
    tick_tx: Sender<PollKind>,
    summary_task: Option<PeriodicTask>,
    feed_task: Option<PeriodicTask>,
}

impl Scheduler {
    /// `feed` enables the feed tick source; its interval is the refresh
    /// interval clamped to at least [`FEED_INTERVAL_FLOOR_MS`].
    pub fn new(refresh_interval_ms: u64, feed: bool) -> (Scheduler, Receiver<PollKind>) {
        let (tick_tx, tick_rx) = channel::unbounded();
        let scheduler = Scheduler {
            summary_interval: Duration::from_millis(refresh_interval_ms.max(1)),
            feed_interval: feed
                .then(|| Duration::from_millis(refresh_interval_ms.max(FEED_INTERVAL_FLOOR_MS))),
            tick_tx,
            summary_task: None,
            feed_task: None,
        };
        (scheduler, tick_rx)
    }

    pub fn summary_interval(&self) -> Duration {
        self.summary_interval
    }

    pub fn feed_interval(&self) -> Option<Duration> {
        self.feed_interval
    }

    pub fn start(&mut self) {
        self.start_summary();
        self.start_feed();
    }

    pub fn start_summary(&mut self) {
        if self.summary_task.is_none() {
            self.summary_task = Some(PeriodicTask::spawn(
                PollKind::Summary,
                self.summary_interval,
                self.tick_tx.clone(),
            ));
        }
    }

    pub fn start_feed(&mut self) {
        if self.feed_task.is_some() {
            return;
        }
        if let Some(interval) = self.feed_interval {
            self.feed_task = Some(PeriodicTask::spawn(
                PollKind::Feed,
                interval,
                self.tick_tx.clone(),
            ));
        }
    }

    /// Stops future firings of both kinds.
    pub fn pause(&mut self) {
        if let Some(task) = self.summary_task.take() {
            task.stop();
        }
        if let Some(task) = self.feed_task.take() {
            task.stop();
        }
    }

    pub fn resume(&mut self) {
        self.start();
    }

    pub fn is_running(&self, kind: PollKind) -> bool {
        match kind {
            PollKind::Summary => self.summary_task.is_some(),
            PollKind::Feed => self.feed_task.is_some(),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn feed_interval_never_drops_below_the_floor() {
        let (scheduler, _rx) = Scheduler::new(200, true);
        assert_eq!(scheduler.summary_interval(), Duration::from_millis(200));
        assert_eq!(scheduler.feed_interval(), Some(Duration::from_millis(1000)));

        let (scheduler, _rx) = Scheduler::new(5000, true);
        assert_eq!(scheduler.feed_interval(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn feed_task_absent_when_feature_disabled() {
        let (mut scheduler, _rx) = Scheduler::new(1000, false);
        scheduler.start();
        assert!(scheduler.is_running(PollKind::Summary));
        assert!(!scheduler.is_running(PollKind::Feed));
    }

    #[test]
    fn double_start_is_a_noop() {
        let (mut scheduler, rx) = Scheduler::new(20, false);
        scheduler.start();
        scheduler.start();
        scheduler.start_summary();
        assert!(scheduler.is_running(PollKind::Summary));

        // A stacked timer would roughly double the tick rate; leave wide
        // margins so scheduling noise cannot flake this.
        std::thread::sleep(Duration::from_millis(300));
        scheduler.pause();
        let ticks = rx.try_iter().count();
        assert!(ticks >= 3, "expected some ticks, got {}", ticks);
        assert!(ticks <= 22, "tick rate suggests duplicate timers: {}", ticks);
    }

    #[test]
    fn pause_stops_future_ticks_and_resume_restarts() {
        let (mut scheduler, rx) = Scheduler::new(15, false);
        scheduler.start();
        std::thread::sleep(Duration::from_millis(80));
        scheduler.pause();
        assert!(!scheduler.is_running(PollKind::Summary));

        // Drain whatever was queued before the stop completed.
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(80));
        assert!(rx.try_recv().is_err());

        scheduler.resume();
        let deadline = Instant::now() + Duration::from_secs(2);
        assert!(rx.recv_deadline(deadline).is_ok());
    }

    #[test]
    fn rapid_visibility_toggles_leave_one_task_per_kind() {
        let (mut scheduler, rx) = Scheduler::new(20, true);
        for _ in 0..5 {
            scheduler.resume();
            scheduler.pause();
        }
        scheduler.resume();
        assert!(scheduler.is_running(PollKind::Summary));
        assert!(scheduler.is_running(PollKind::Feed));

        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(300));
        scheduler.pause();
        // One 20ms summary timer plus one 1s feed timer; a stacked summary
        // timer would blow well past this bound.
        let ticks = rx.try_iter().count();
        assert!(ticks <= 24, "tick rate suggests duplicate timers: {}", ticks);
    }
}
