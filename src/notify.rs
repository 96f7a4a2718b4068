//! Scheduled deadline reminders.
//!
//! A single recurring loop re-evaluates task deadlines every poll interval
//! (first firing immediate) and forwards notices to a [`NotificationSink`].
//! A fixed-period poll trades timing precision for bounded resource use:
//! reminders are informational, so lagging up to one period is acceptable.

use crate::board::TaskBoard;
use crate::config::ReminderConfig;
use crate::settings::SettingsStore;
use chrono::{Duration, Local, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Desktop notification surface. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    /// Show a notification with a title and body.
    fn show(&self, title: &str, body: &str);
}

/// Sink that only logs. Used when no desktop shell is attached.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn show(&self, title: &str, body: &str) {
        info!(title, body, "notification");
    }
}

/// Periodic driver for deadline scans and the one-shot startup summary.
pub struct ReminderEngine {
    board: Arc<AsyncMutex<TaskBoard>>,
    settings: Arc<SettingsStore>,
    sink: Arc<dyn NotificationSink>,
    config: ReminderConfig,
    cancel: Mutex<Option<CancellationToken>>,
    summary_sent: AtomicBool,
}

impl ReminderEngine {
    /// Create an engine over a shared board.
    #[must_use]
    pub fn new(
        board: Arc<AsyncMutex<TaskBoard>>,
        settings: Arc<SettingsStore>,
        sink: Arc<dyn NotificationSink>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            board,
            settings,
            sink,
            config,
            cancel: Mutex::new(None),
            summary_sent: AtomicBool::new(false),
        }
    }

    /// Start the recurring scan loop.
    ///
    /// The first firing is immediate, then every `poll_interval_secs`.
    /// Overlapping fires are dropped (the board lock serializes scans, and
    /// missed ticks are skipped rather than queued). Only one loop may run
    /// per engine: returns `false` if already started.
    pub fn start(&self) -> bool {
        let mut guard = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            warn!("reminder engine already running");
            return false;
        }

        let token = CancellationToken::new();
        *guard = Some(token.clone());

        let board = Arc::clone(&self.board);
        let settings = Arc::clone(&self.settings);
        let sink = Arc::clone(&self.sink);
        let config = self.config.clone();

        tokio::spawn(async move {
            info!(
                poll_interval_secs = config.poll_interval_secs,
                "reminder engine started"
            );
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(config.poll_interval_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        info!("reminder engine stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        run_tick(&board, &settings, sink.as_ref(), &config).await;
                    }
                }
            }
        });

        true
    }

    /// Stop the scan loop. Safe to call when never started; idempotent.
    pub fn stop(&self) {
        let mut guard = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = guard.take() {
            token.cancel();
        }
    }

    /// Emit the one-shot startup summary: at most one combined notice
    /// listing up to `summary_max_items` due-today tasks.
    ///
    /// Runs once per process; later calls are no-ops. Called after the
    /// initial board load, never from the recurring loop.
    pub async fn startup_summary(&self) {
        if self.summary_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.settings.snapshot().are_notifications_enabled {
            return;
        }

        let today = Local::now().date_naive();
        let due_today = self.board.lock().await.scan_due_today(today);
        if due_today.is_empty() {
            return;
        }

        let mut body = format!("{} task(s) due today.\n", due_today.len());
        for task in due_today.iter().take(self.config.summary_max_items) {
            body.push_str(&format!("- {}\n", task.title));
        }
        if due_today.len() > self.config.summary_max_items {
            body.push_str("…\n");
        }

        self.sink.show("Today's tasks", body.trim_end());
    }
}

/// One scan: auto-progress overdue starts, then report imminent deadlines.
///
/// Failures inside a tick are logged and dropped; the scan is stateless and
/// re-evaluates from scratch next period.
async fn run_tick(
    board: &AsyncMutex<TaskBoard>,
    settings: &SettingsStore,
    sink: &dyn NotificationSink,
    config: &ReminderConfig,
) {
    let mut board = board.lock().await;

    let now = Utc::now();
    if let Err(e) = board.auto_progress(now).await {
        warn!("auto-progression failed this tick: {e}");
    }

    if !settings.snapshot().are_notifications_enabled {
        return;
    }

    let window = Duration::seconds(i64::try_from(config.imminent_window_secs).unwrap_or(3600));
    let imminent = board.scan_imminent(now, window);
    debug!(count = imminent.len(), "imminent deadline scan");

    for task in imminent {
        sink.show(
            "Deadline imminent!",
            &format!("'{}' is due within the hour.", task.title),
        );
    }
}
