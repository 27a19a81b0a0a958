//! Elapsed-time tracking for the entry currently being worked on.
//!
//! Time is banked from absolute instants: every Running segment adds `end - start` to the
//! accumulated total when it ends. Ticks only refresh the displayed value.

pub mod session;
pub mod ticker;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use ticker::Ticker;
use tokio::{sync::watch, time::Instant};
use tracing::{debug, info, warn};

use crate::utils::clock::Clock;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Attributes of the entry being tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveEntry {
    pub project_id: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub project_id: Option<Option<String>>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// What a finished timer run hands back for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopResult {
    /// Whole seconds spent Running.
    pub duration: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub project_id: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
}

pub struct TimerEngine {
    clock: Arc<dyn Clock>,
    status: TimerStatus,
    accumulated: Duration,
    run_started: Option<Instant>,
    entry: ActiveEntry,
    tick_interval: Option<Duration>,
    ticker: Option<Ticker>,
    status_sender: watch::Sender<TimerStatus>,
    elapsed_sender: Arc<watch::Sender<u64>>,
}

impl TimerEngine {
    /// Engine without a ticker. Elapsed values are still correct when read through
    /// [TimerEngine::elapsed_seconds].
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (status_sender, _) = watch::channel(TimerStatus::Idle);
        let (elapsed_sender, _) = watch::channel(0);
        Self {
            clock,
            status: TimerStatus::Idle,
            accumulated: Duration::ZERO,
            run_started: None,
            entry: ActiveEntry::default(),
            tick_interval: None,
            ticker: None,
            status_sender,
            elapsed_sender: Arc::new(elapsed_sender),
        }
    }

    /// Publishes elapsed seconds every `interval` while running. Needs a tokio runtime.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn active_entry(&self) -> &ActiveEntry {
        &self.entry
    }

    pub fn subscribe_status(&self) -> watch::Receiver<TimerStatus> {
        self.status_sender.subscribe()
    }

    pub fn subscribe_elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed_sender.subscribe()
    }

    /// Total tracked time, truncated to whole seconds.
    pub fn elapsed_seconds(&self) -> u64 {
        self.total().as_secs()
    }

    fn total(&self) -> Duration {
        match (self.status, self.run_started) {
            (TimerStatus::Running, Some(started)) => {
                self.accumulated + self.clock.instant().saturating_duration_since(started)
            }
            _ => self.accumulated,
        }
    }

    pub fn start(&mut self, project_id: Option<String>, description: String, tags: Vec<String>) {
        if self.status != TimerStatus::Idle {
            warn!("Ignoring start while {:?}", self.status);
            return;
        }
        let now = self.clock.time();
        self.accumulated = Duration::ZERO;
        self.run_started = Some(self.clock.instant());
        self.entry = ActiveEntry {
            project_id,
            description,
            tags,
            start_time: Some(now),
        };
        info!("Timer started at {now}");
        self.publish_elapsed(0);
        self.set_status(TimerStatus::Running);
        self.start_ticking();
    }

    pub fn pause(&mut self) {
        if self.status != TimerStatus::Running {
            debug!("Ignoring pause while {:?}", self.status);
            return;
        }
        self.accumulated = self.total();
        self.run_started = None;
        self.stop_ticking();
        self.publish_elapsed(self.accumulated.as_secs());
        self.set_status(TimerStatus::Paused);
    }

    pub fn resume(&mut self) {
        if self.status != TimerStatus::Paused {
            debug!("Ignoring resume while {:?}", self.status);
            return;
        }
        self.run_started = Some(self.clock.instant());
        self.set_status(TimerStatus::Running);
        self.start_ticking();
    }

    /// Idle starts with the current metadata, Running pauses, Paused resumes.
    pub fn toggle(&mut self) {
        match self.status {
            TimerStatus::Idle => {
                let ActiveEntry {
                    project_id,
                    description,
                    tags,
                    ..
                } = self.entry.clone();
                self.start(project_id, description, tags)
            }
            TimerStatus::Running => self.pause(),
            TimerStatus::Paused => self.resume(),
        }
    }

    /// Finishes the run and returns it. Stopping an idle timer yields a zero-length result.
    pub fn stop(&mut self) -> StopResult {
        let total = self.total();
        let end_time = self.clock.time();
        self.stop_ticking();

        let entry = std::mem::take(&mut self.entry);
        let result = StopResult {
            duration: total.as_secs(),
            start_time: entry.start_time.unwrap_or(end_time),
            end_time,
            project_id: entry.project_id,
            description: entry.description,
            tags: entry.tags,
        };
        info!("Timer stopped after {}s", result.duration);

        self.clear();
        result
    }

    /// Drops the current run without producing anything.
    pub fn reset(&mut self) {
        self.stop_ticking();
        self.entry = ActiveEntry::default();
        self.clear();
    }

    pub fn set_metadata(&mut self, patch: MetadataPatch) {
        if let Some(v) = patch.project_id {
            self.entry.project_id = v;
        }
        if let Some(v) = patch.description {
            self.entry.description = v;
        }
        if let Some(v) = patch.tags {
            self.entry.tags = v;
        }
    }

    fn clear(&mut self) {
        self.accumulated = Duration::ZERO;
        self.run_started = None;
        self.publish_elapsed(0);
        self.set_status(TimerStatus::Idle);
    }

    fn set_status(&mut self, status: TimerStatus) {
        self.status = status;
        self.status_sender.send_replace(status);
    }

    fn publish_elapsed(&self, seconds: u64) {
        self.elapsed_sender.send_replace(seconds);
    }

    fn start_ticking(&mut self) {
        self.stop_ticking();
        if let (Some(interval), Some(run_started)) = (self.tick_interval, self.run_started) {
            self.ticker = Some(Ticker::spawn(
                self.clock.clone(),
                self.accumulated,
                run_started,
                interval,
                self.elapsed_sender.clone(),
            ));
        }
    }

    fn stop_ticking(&mut self) {
        self.ticker = None;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::utils::clock::testing::ManualClock;

    fn engine() -> (TimerEngine, ManualClock) {
        let clock = ManualClock::new();
        (TimerEngine::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn stop_reports_wall_clock_of_running_time() {
        let (mut timer, clock) = engine();
        let t0 = clock.time();

        timer.start(Some("P1".into()), "write docs".into(), vec![]);
        clock.advance(Duration::from_secs(65));
        let result = timer.stop();

        assert_eq!(
            result,
            StopResult {
                duration: 65,
                start_time: t0,
                end_time: t0 + Duration::from_secs(65),
                project_id: Some("P1".into()),
                description: "write docs".into(),
                tags: vec![],
            }
        );
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.active_entry(), &ActiveEntry::default());
    }

    #[test]
    fn paused_time_is_not_counted() {
        let (mut timer, clock) = engine();

        timer.start(None, String::new(), vec![]);
        clock.advance(Duration::from_millis(1500));
        timer.pause();
        clock.advance(Duration::from_secs(100));
        timer.resume();
        clock.advance(Duration::from_millis(2700));
        timer.pause();
        clock.advance(Duration::from_secs(50));
        timer.resume();
        clock.advance(Duration::from_millis(800));

        // 1.5 + 2.7 + 0.8 = 5.0
        assert_eq!(timer.stop().duration, 5);
    }

    #[test]
    fn stopping_while_paused_folds_nothing_extra() {
        let (mut timer, clock) = engine();
        timer.start(None, String::new(), vec![]);
        clock.advance(Duration::from_secs(30));
        timer.pause();
        clock.advance(Duration::from_secs(30));

        let result = timer.stop();

        assert_eq!(result.duration, 30);
        assert_eq!(result.end_time - result.start_time, chrono::Duration::seconds(60));
    }

    #[test]
    fn stop_from_idle_is_zero() {
        let (mut timer, clock) = engine();
        let result = timer.stop();
        assert_eq!(result.duration, 0);
        assert_eq!(result.start_time, clock.time());
        assert_eq!(result.end_time, clock.time());
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let (mut timer, clock) = engine();

        timer.pause();
        timer.resume();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.elapsed_seconds(), 0);

        timer.start(None, String::new(), vec![]);
        clock.advance(Duration::from_secs(10));
        timer.resume();
        assert_eq!(timer.status(), TimerStatus::Running);
        assert_eq!(timer.elapsed_seconds(), 10);

        timer.pause();
        clock.advance(Duration::from_secs(10));
        timer.pause();
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(timer.elapsed_seconds(), 10);

        timer.start(Some("other".into()), "other".into(), vec![]);
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(timer.active_entry().project_id, None);
    }

    #[test]
    fn elapsed_is_truncated() {
        let (mut timer, clock) = engine();
        timer.start(None, String::new(), vec![]);
        clock.advance(Duration::from_millis(2999));
        assert_eq!(timer.elapsed_seconds(), 2);
        clock.advance(Duration::from_millis(1));
        assert_eq!(timer.elapsed_seconds(), 3);
    }

    #[test]
    fn reset_discards_the_run() {
        let (mut timer, clock) = engine();
        timer.start(Some("P1".into()), "x".into(), vec!["t".into()]);
        clock.advance(Duration::from_secs(42));

        timer.reset();

        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.elapsed_seconds(), 0);
        assert_eq!(timer.active_entry(), &ActiveEntry::default());
        assert_eq!(timer.stop().duration, 0);
    }

    #[test]
    fn metadata_changes_do_not_touch_timing() {
        let (mut timer, clock) = engine();
        timer.start(Some("P1".into()), "draft".into(), vec![]);
        clock.advance(Duration::from_secs(20));

        timer.set_metadata(MetadataPatch {
            project_id: Some(None),
            description: Some("final".into()),
            tags: Some(vec!["review".into()]),
        });
        clock.advance(Duration::from_secs(5));
        let result = timer.stop();

        assert_eq!(result.duration, 25);
        assert_eq!(result.project_id, None);
        assert_eq!(result.description, "final");
        assert_eq!(result.tags, vec!["review".to_string()]);
    }

    #[test]
    fn metadata_set_while_idle_is_used_by_toggle() {
        let (mut timer, clock) = engine();
        timer.set_metadata(MetadataPatch {
            project_id: Some(Some("P2".into())),
            ..Default::default()
        });

        timer.toggle();
        assert_eq!(timer.status(), TimerStatus::Running);
        clock.advance(Duration::from_secs(3));
        timer.toggle();
        assert_eq!(timer.status(), TimerStatus::Paused);
        timer.toggle();
        assert_eq!(timer.status(), TimerStatus::Running);

        let result = timer.stop();
        assert_eq!(result.project_id.as_deref(), Some("P2"));
        assert_eq!(result.duration, 3);
    }

    #[test]
    fn status_changes_are_published() {
        let (mut timer, _clock) = engine();
        let status = timer.subscribe_status();

        timer.start(None, String::new(), vec![]);
        assert_eq!(*status.borrow(), TimerStatus::Running);
        timer.pause();
        assert_eq!(*status.borrow(), TimerStatus::Paused);
        timer.stop();
        assert_eq!(*status.borrow(), TimerStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_refreshes_elapsed_while_running() {
        let clock = ManualClock::new();
        let mut timer =
            TimerEngine::new(Arc::new(clock.clone())).with_tick_interval(DEFAULT_TICK_INTERVAL);
        let elapsed = timer.subscribe_elapsed();

        timer.start(None, String::new(), vec![]);
        clock.advance(Duration::from_secs(3));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*elapsed.borrow(), 3);

        timer.pause();
        clock.advance(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*elapsed.borrow(), 3);

        timer.resume();
        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*elapsed.borrow(), 5);

        timer.stop();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*elapsed.borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_do_not_affect_stored_duration() {
        let clock = ManualClock::new();
        let mut timer = TimerEngine::new(Arc::new(clock.clone()))
            .with_tick_interval(Duration::from_secs(3600));

        timer.start(None, String::new(), vec![]);
        clock.advance(Duration::from_millis(65_400));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(timer.stop().duration, 65);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_only_exists_while_running() {
        let clock = ManualClock::new();
        let mut timer =
            TimerEngine::new(Arc::new(clock.clone())).with_tick_interval(DEFAULT_TICK_INTERVAL);
        assert!(timer.ticker.is_none());

        timer.start(None, String::new(), vec![]);
        assert!(timer.ticker.is_some());
        timer.pause();
        assert!(timer.ticker.is_none());
        timer.resume();
        assert!(timer.ticker.is_some());
        timer.reset();
        assert!(timer.ticker.is_none());
    }
}
