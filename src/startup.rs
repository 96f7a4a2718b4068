//! Host assembly.
//!
//! [`initialize`] builds the whole tracker core from configuration: settings,
//! item store, Kakao client, board, and reminder engine, then runs the boot
//! sequence (refresh the stored Kakao session once, load the board, emit the
//! startup summary, start the reminder loop).

use crate::board::{BoardEvent, TaskBoard};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::kakao::KakaoClient;
use crate::notify::{NotificationSink, ReminderEngine};
use crate::settings::SettingsStore;
use crate::store::{ItemStore, JsonItemStore};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{info, warn};

/// The assembled tracker core.
pub struct TrackerHost {
    /// Shared user settings, including the stored Kakao session.
    pub settings: Arc<SettingsStore>,
    /// Kakao messaging client.
    pub kakao: Arc<KakaoClient>,
    /// Shared task board.
    pub board: Arc<AsyncMutex<TaskBoard>>,
    /// Reminder engine driving scans over the board.
    pub engine: Arc<ReminderEngine>,
    /// Board change notifications, for a UI shell to drain.
    pub events: mpsc::UnboundedReceiver<BoardEvent>,
}

impl TrackerHost {
    /// Run the boot sequence on an assembled host.
    ///
    /// Refreshes the stored Kakao session once so it survives restarts,
    /// loads the board from the store, emits the one-shot startup summary,
    /// and starts the reminder loop.
    pub async fn boot(&self) {
        if self.settings.snapshot().kakao_refresh_token.is_some() {
            if self.kakao.try_refresh().await {
                info!("Kakao session refreshed at startup");
            } else {
                warn!("stored Kakao session could not be refreshed");
            }
        }

        self.board.lock().await.load();
        self.engine.startup_summary().await;
        if !self.engine.start() {
            warn!("reminder engine was already running at boot");
        }
    }
}

/// Wire a host from its parts. Nothing is loaded or started yet; call
/// [`TrackerHost::boot`] for that.
#[must_use]
pub fn assemble(
    config: &TrackerConfig,
    settings: Arc<SettingsStore>,
    store: Arc<dyn ItemStore>,
    sink: Arc<dyn NotificationSink>,
) -> TrackerHost {
    let kakao = Arc::new(KakaoClient::new(config.kakao.clone(), Arc::clone(&settings)));
    let (events_tx, events) = mpsc::unbounded_channel();
    let board = Arc::new(AsyncMutex::new(TaskBoard::new(
        store,
        Arc::clone(&kakao),
        events_tx,
    )));
    let engine = Arc::new(ReminderEngine::new(
        Arc::clone(&board),
        Arc::clone(&settings),
        sink,
        config.reminders.clone(),
    ));

    TrackerHost {
        settings,
        kakao,
        board,
        engine,
        events,
    }
}

/// Build and boot a host against the default on-disk settings and store.
pub async fn initialize(
    config: &TrackerConfig,
    sink: Arc<dyn NotificationSink>,
) -> Result<TrackerHost> {
    let settings = Arc::new(SettingsStore::open_default());
    let store =
        Arc::new(JsonItemStore::open(JsonItemStore::default_path())?) as Arc<dyn ItemStore>;

    let host = assemble(config, settings, store, sink);
    host.boot().await;
    Ok(host)
}
