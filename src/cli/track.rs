//! Live tracking session: the timer runs in the foreground and stdin drives it. The idle reminder
//! runs separately in `idle-watch`, which sees live sessions through the session lock.

use std::{io::Write, sync::Arc};

use ansi_term::Colour;
use anyhow::Result;
use clap::Parser;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{shutdown::detect_shutdown, validation_error, AppContext};
use crate::{
    config::Config,
    idle::{probe::detect_probe, ActivityEvaluator, IdleMonitor},
    notify::{ConsoleNotifier, DesktopNotifier, FallbackNotifier, NotificationSink},
    store::{entities::AppSettings, DataStore},
    timer::{
        session::{watch_sessions, SessionLock},
        StopResult, TimerEngine, TimerStatus,
    },
    utils::{clock::Clock, time::timer_parts},
};

const HELP: &str = "Commands: p pause, r resume, t toggle, s stop and save, x discard";

#[derive(Debug, Parser)]
pub struct TrackCommand {
    #[arg(long, short, help = "Project id to track time for")]
    pub project: Option<String>,
    #[arg(long, short, help = "What you are working on")]
    pub description: Option<String>,
    #[arg(long = "tag", short, help = "Tag id. Can be given several times")]
    pub tags: Vec<String>,
    #[arg(
        long = "continue",
        help = "Copy project, description and tags from a recorded entry",
        conflicts_with_all = ["project", "description", "tags"]
    )]
    pub continue_entry: Option<String>,
}

/// A line typed while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Pause,
    Resume,
    Toggle,
    Stop,
    Discard,
}

impl SessionCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Self::Pause),
            "r" | "resume" => Some(Self::Resume),
            "t" | "toggle" | "" => Some(Self::Toggle),
            "s" | "stop" => Some(Self::Stop),
            "x" | "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Stopped(StopResult),
    Discarded,
}

/// Feeds `input` commands to the timer until the run is stopped, discarded or `shutdown` fires.
/// Interruption stops the run so that the time is kept. Closed input leaves the timer running.
pub async fn run_session<R>(
    timer: &mut TimerEngine,
    input: R,
    shutdown: &CancellationToken,
    mut render: impl FnMut(TimerStatus, u64),
) -> SessionEnd
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut input_open = true;
    let mut elapsed = timer.subscribe_elapsed();
    let mut status = timer.subscribe_status();

    render(timer.status(), timer.elapsed_seconds());
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Session interrupted, keeping tracked time");
                return SessionEnd::Stopped(timer.stop());
            }
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => match SessionCommand::parse(&line) {
                    Some(SessionCommand::Stop) => return SessionEnd::Stopped(timer.stop()),
                    Some(SessionCommand::Discard) => {
                        timer.reset();
                        return SessionEnd::Discarded;
                    }
                    Some(SessionCommand::Pause) => timer.pause(),
                    Some(SessionCommand::Resume) => timer.resume(),
                    Some(SessionCommand::Toggle) => timer.toggle(),
                    None => {
                        debug!("Unknown session command {line:?}");
                        eprintln!("{HELP}");
                    }
                },
                Ok(None) => {
                    debug!("Input closed, waiting for interruption");
                    input_open = false;
                }
                Err(e) => {
                    error!("Failed to read input {e:?}");
                    input_open = false;
                }
            },
            Ok(()) = elapsed.changed() => {
                let seconds = *elapsed.borrow_and_update();
                render(*status.borrow(), seconds);
            }
            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                render(current, timer.elapsed_seconds());
            }
        }
    }
}

/// Runs a session against the terminal and stores the result.
pub async fn process_track_command(context: &AppContext, command: TrackCommand) -> Result<()> {
    let store = context.open_store().await;

    let TrackCommand {
        project,
        description,
        tags,
        continue_entry,
    } = command;
    let (project, description, tags) = match continue_entry {
        Some(id) => {
            let Some(entry) = store.time_entry(&id) else {
                store.close().await?;
                return Err(validation_error(format!("No time entry with id {id}")));
            };
            (
                entry.project_id.clone(),
                entry.description.clone(),
                entry.tags.clone(),
            )
        }
        None => (project, description, tags),
    };
    if let Some(id) = project.as_deref() {
        if store.project(id).is_none() {
            store.close().await?;
            return Err(validation_error(format!("No project with id {id}")));
        }
    }

    let lock = match SessionLock::acquire(&context.config.data_dir).await {
        Ok(Some(lock)) => Some(lock),
        Ok(None) => {
            store.close().await?;
            return Err(validation_error("Another tracking session is already running"));
        }
        Err(e) => {
            warn!("Session lock unavailable, idle-watch won't see this session {e:?}");
            None
        }
    };

    let shutdown = CancellationToken::new();
    let mut timer =
        TimerEngine::new(context.clock.clone()).with_tick_interval(context.config.tick_interval());
    timer.start(project, description.unwrap_or_default(), tags);

    println!(
        "Tracking {}. {HELP}",
        Colour::Cyan.paint(store.project_name(timer.active_entry().project_id.as_deref()))
    );
    store.close().await?;

    let session = async {
        let end = run_session(
            &mut timer,
            BufReader::new(tokio::io::stdin()),
            &shutdown,
            render_timer,
        )
        .await;
        shutdown.cancel();
        end
    };
    let (_, end) = tokio::join!(detect_shutdown(shutdown.clone()), session);
    println!();

    let result = record_session(context, end).await;
    if let Some(lock) = lock {
        if let Err(e) = lock.release().await {
            error!("Failed to release session lock {e:?}");
        }
    }
    result
}

/// Saves into a freshly loaded document so changes made by other commands during the session
/// are kept.
async fn record_session(context: &AppContext, end: SessionEnd) -> Result<()> {
    let mut store = context.open_store().await;
    save_session(&mut store, end);
    store.close().await
}

fn save_session(store: &mut DataStore, end: SessionEnd) {
    match end {
        SessionEnd::Stopped(result) if result.duration > 0 => {
            let entry = store.add_time_entry(result.into());
            info!("Saved entry {}", entry.id);
            println!(
                "Saved {} for {}",
                Colour::Green.paint(crate::utils::time::format_duration(entry.duration)),
                store.project_name(entry.project_id.as_deref())
            );
        }
        SessionEnd::Stopped(_) => println!("Nothing tracked, no entry saved"),
        SessionEnd::Discarded => println!("Discarded"),
    }
}

fn render_timer(status: TimerStatus, seconds: u64) {
    let (hours, minutes, seconds) = timer_parts(seconds);
    let label = match status {
        TimerStatus::Running => Colour::Green.paint("running"),
        TimerStatus::Paused => Colour::Yellow.paint("paused "),
        TimerStatus::Idle => Colour::White.dimmed().paint("idle   "),
    };
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r{hours}:{minutes}:{seconds} {label}");
    let _ = stdout.flush();
}

/// Only the reminder. A `track` session running in any terminal counts as a busy timer.
pub async fn process_idle_watch_command(context: &AppContext) -> Result<()> {
    let store = context.open_store().await;
    let shutdown = CancellationToken::new();
    let (status_sender, status) = watch::channel(TimerStatus::Idle);

    let Some(monitor) = create_monitor(
        &context.config,
        context.clock.clone(),
        status,
        store.subscribe_settings(),
        shutdown.clone(),
    ) else {
        store.close().await?;
        return Err(validation_error("Idle time can't be read on this system"));
    };

    println!("Watching for activity, press Ctrl-C to stop");
    let (_, result, _) = tokio::join!(
        detect_shutdown(shutdown.clone()),
        monitor.run(),
        watch_sessions(
            context.config.data_dir.clone(),
            context.config.idle_poll_interval(),
            status_sender,
            shutdown.clone(),
        )
    );
    if let Err(e) = result {
        error!("Idle monitor got an error {e:?}");
    }
    store.close().await
}

/// No monitor when idle time can't be read on this system.
fn create_monitor(
    config: &Config,
    clock: Arc<dyn Clock>,
    status: watch::Receiver<TimerStatus>,
    settings: watch::Receiver<AppSettings>,
    shutdown: CancellationToken,
) -> Option<IdleMonitor> {
    let Some(probe) = detect_probe() else {
        warn!("No idle time source available, idle reminders are off");
        return None;
    };
    Some(IdleMonitor::new(
        probe,
        create_notifier(config),
        clock,
        status,
        settings,
        ActivityEvaluator::from_duration(config.idle_cutoff()),
        config.idle_poll_interval(),
        shutdown,
    ))
}

fn create_notifier(config: &Config) -> Arc<dyn NotificationSink> {
    if config.desktop_notifications {
        Arc::new(FallbackNotifier::new(DesktopNotifier, ConsoleNotifier))
    } else {
        Arc::new(ConsoleNotifier)
    }
}
