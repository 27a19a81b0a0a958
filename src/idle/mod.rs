//! Reminds the user to start the timer when they have been working for a while without it.

pub mod probe;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use probe::IdleProbe;
use tokio::{sync::watch, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    notify::NotificationSink, store::entities::AppSettings, timer::TimerStatus,
    utils::clock::Clock,
};

pub const REMINDER_TITLE: &str = "Are you working?";
pub const REMINDER_BODY: &str =
    "It looks like you have been active for a while. Don't forget to track your time!";

/// How long the user must stay active before being reminded. `None` switches reminders off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleReminderConfig {
    pub threshold: Option<Duration>,
}

impl IdleReminderConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        let threshold = (settings.idle_reminder_enabled && settings.idle_reminder_minutes > 0)
            .then(|| Duration::from_secs(u64::from(settings.idle_reminder_minutes) * 60));
        Self { threshold }
    }
}

/// Decides whether a probe reading means the user stepped away.
pub struct ActivityEvaluator {
    cutoff_ms: u32,
}

impl ActivityEvaluator {
    pub fn from_duration(cutoff: Duration) -> Self {
        Self {
            cutoff_ms: u32::try_from(cutoff.as_millis()).unwrap_or(u32::MAX),
        }
    }

    pub fn is_idle(&self, idle_time: u32) -> bool {
        idle_time >= self.cutoff_ms
    }
}

/// Follows active streaks and allows one reminder per streak.
pub struct ActivityTracker {
    evaluator: ActivityEvaluator,
    active_since: Option<Instant>,
    reminder_sent: bool,
}

impl ActivityTracker {
    pub fn new(evaluator: ActivityEvaluator) -> Self {
        Self {
            evaluator,
            active_since: None,
            reminder_sent: false,
        }
    }

    /// Feeds one probe reading. Returns `true` when a reminder should go out now.
    pub fn observe(
        &mut self,
        idle_ms: u32,
        now: Instant,
        timer: TimerStatus,
        config: IdleReminderConfig,
    ) -> bool {
        let Some(threshold) = config.threshold else {
            self.active_since = None;
            return false;
        };

        if self.evaluator.is_idle(idle_ms) {
            if self.active_since.take().is_some() {
                debug!("User went idle after {idle_ms}ms without input");
            }
            self.reminder_sent = false;
            return false;
        }

        let Some(active_since) = self.active_since else {
            self.active_since = Some(now);
            return false;
        };

        if timer != TimerStatus::Idle || self.reminder_sent {
            return false;
        }

        if now.saturating_duration_since(active_since) >= threshold {
            self.reminder_sent = true;
            return true;
        }
        false
    }

    pub fn is_active(&self) -> bool {
        self.active_since.is_some()
    }
}

pub struct IdleMonitor {
    probe: Box<dyn IdleProbe>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    timer_status: watch::Receiver<TimerStatus>,
    settings: watch::Receiver<AppSettings>,
    tracker: ActivityTracker,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl IdleMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        probe: Box<dyn IdleProbe>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        timer_status: watch::Receiver<TimerStatus>,
        settings: watch::Receiver<AppSettings>,
        evaluator: ActivityEvaluator,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            probe,
            notifier,
            clock,
            timer_status,
            settings,
            tracker: ActivityTracker::new(evaluator),
            poll_interval,
            shutdown,
        }
    }

    /// Takes one reading and sends the reminder if it is due. Returns whether it was sent.
    pub async fn poll_once(&mut self) -> bool {
        let config = IdleReminderConfig::from_settings(&self.settings.borrow());
        if config.threshold.is_none() {
            self.tracker.observe(0, self.clock.instant(), TimerStatus::Idle, config);
            return false;
        }

        let idle_ms = match self.probe.idle_time() {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to get system idle time {e:?}");
                return false;
            }
        };

        let status = *self.timer_status.borrow();
        if !self
            .tracker
            .observe(idle_ms, self.clock.instant(), status, config)
        {
            return false;
        }

        info!("User has been active without a running timer, sending reminder");
        if let Err(e) = self.notifier.notify(REMINDER_TITLE, REMINDER_BODY).await {
            error!("Failed to deliver idle reminder {e:?}");
        }
        true
    }

    /// Polls until the shutdown token is cancelled.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_interval;

            self.poll_once().await;

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Idle monitor stopped");
                    return Ok(())
                }
                _ = self.clock.sleep_until(poll_point) => ()
            }
        }
    }
}
