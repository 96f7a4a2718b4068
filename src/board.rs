//! The task board: authoritative in-memory view of tasks bucketed by status.
//!
//! The board is a cache over the [`ItemStore`](crate::store::ItemStore):
//! every mutation is persisted before the buckets change, and the buckets are
//! rebuilt from the store on [`TaskBoard::load`]. Consumers observe the board
//! through [`BoardEvent`]s published after each bucket mutation rather than
//! by polling.

use crate::kakao::KakaoClient;
use crate::model::{Platform, TaskItem, WorkStatus};
use crate::store::ItemStore;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sort key for the active buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Sort by due timestamp, unset last.
    DueDate,
    /// Sort by start timestamp, unset last.
    StartDate,
}

/// Published after every bucket mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Buckets were rebuilt from the store.
    Loaded,
    /// The platform list was reloaded.
    PlatformsReloaded,
    /// A task was added.
    TaskAdded(i64),
    /// A task changed status or contents.
    TaskUpdated(i64),
    /// A task was deleted.
    TaskDeleted(i64),
}

/// In-memory task view partitioned by [`WorkStatus`].
pub struct TaskBoard {
    store: Arc<dyn ItemStore>,
    kakao: Arc<KakaoClient>,
    events: mpsc::UnboundedSender<BoardEvent>,
    platforms: Vec<Platform>,
    not_started: Vec<TaskItem>,
    in_progress: Vec<TaskItem>,
    completed: Vec<TaskItem>,
}

impl TaskBoard {
    /// Create an empty board over the given store.
    ///
    /// Events are published on `events`; a receiver with no consumer is fine.
    #[must_use]
    pub fn new(
        store: Arc<dyn ItemStore>,
        kakao: Arc<KakaoClient>,
        events: mpsc::UnboundedSender<BoardEvent>,
    ) -> Self {
        Self {
            store,
            kakao,
            events,
            platforms: Vec::new(),
            not_started: Vec::new(),
            in_progress: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Tasks not yet started.
    #[must_use]
    pub fn not_started(&self) -> &[TaskItem] {
        &self.not_started
    }

    /// Tasks in progress.
    #[must_use]
    pub fn in_progress(&self) -> &[TaskItem] {
        &self.in_progress
    }

    /// Completed tasks.
    #[must_use]
    pub fn completed(&self) -> &[TaskItem] {
        &self.completed
    }

    /// Known platforms, sorted by name.
    #[must_use]
    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Rebuild the buckets and platform list from the store.
    ///
    /// A store read failure degrades to an empty result (logged); the board
    /// simply shows nothing rather than stale or partial state.
    pub fn load(&mut self) {
        self.platforms = self.store.list_platforms().unwrap_or_else(|e| {
            warn!("cannot load platforms: {e}");
            Vec::new()
        });

        let tasks = self.store.list_tasks().unwrap_or_else(|e| {
            warn!("cannot load tasks: {e}");
            Vec::new()
        });

        self.not_started.clear();
        self.in_progress.clear();
        self.completed.clear();
        for task in tasks {
            self.distribute(task);
        }

        self.sort(SortKey::DueDate);
        debug!(
            not_started = self.not_started.len(),
            in_progress = self.in_progress.len(),
            completed = self.completed.len(),
            "task board loaded"
        );
        let _ = self.events.send(BoardEvent::Loaded);
    }

    /// Reload only the platform list (after the management dialog closes).
    pub fn reload_platforms(&mut self) {
        self.platforms = self.store.list_platforms().unwrap_or_else(|e| {
            warn!("cannot reload platforms: {e}");
            Vec::new()
        });
        let _ = self.events.send(BoardEvent::PlatformsReloaded);
    }

    /// Add a new task.
    ///
    /// A title blank after trimming is rejected as a no-op (`Ok(None)`).
    /// The "task added" message is a best-effort side channel, not required
    /// for correctness.
    pub async fn add(
        &mut self,
        title: &str,
        platform_id: Option<i64>,
        start_at: Option<DateTime<Utc>>,
        due_at: Option<DateTime<Utc>>,
    ) -> crate::Result<Option<TaskItem>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }

        let task = self
            .store
            .add_task(TaskItem::new(title, platform_id, start_at, due_at))?;
        self.not_started.push(task.clone());
        let _ = self.events.send(BoardEvent::TaskAdded(task.id));

        self.kakao
            .send_message(&format!("[task added] {}", task.title))
            .await;

        Ok(Some(task))
    }

    /// Persist a changed task and move it to the bucket its status demands.
    ///
    /// Sets the completion timestamp iff the new status is `Completed`,
    /// keeping the completion invariant. Removal searches all three buckets;
    /// a task can only be in one, but the previous status is not trusted.
    pub fn update(&mut self, mut task: TaskItem) -> crate::Result<()> {
        if task.status == WorkStatus::Completed {
            task.completed_at = Some(Utc::now());
        } else {
            task.completed_at = None;
        }

        self.store.update_task(&task)?;

        self.remove_from_all_buckets(task.id);
        let id = task.id;
        self.distribute(task);
        let _ = self.events.send(BoardEvent::TaskUpdated(id));
        Ok(())
    }

    /// Delete a task by id.
    pub fn delete(&mut self, id: i64) -> crate::Result<()> {
        self.store.delete_task(id)?;
        self.remove_from_all_buckets(id);
        let _ = self.events.send(BoardEvent::TaskDeleted(id));
        Ok(())
    }

    /// Re-sort the NotStarted and InProgress buckets in place.
    ///
    /// The Completed bucket keeps its order; completed items are not
    /// tracked by deadline. Sorting is stable, so insertion order breaks
    /// ties deterministically.
    pub fn sort(&mut self, key: SortKey) {
        self.not_started.sort_by_key(|t| sort_value(t, key));
        self.in_progress.sort_by_key(|t| sort_value(t, key));
    }

    /// Active tasks whose due timestamp lies strictly inside
    /// `(now, now + window)`.
    ///
    /// Recomputed fresh on every call with no memory of earlier scans, so a
    /// task inside the window is reported again on every tick until it
    /// leaves the window or changes status.
    #[must_use]
    pub fn scan_imminent(&self, now: DateTime<Utc>, window: Duration) -> Vec<TaskItem> {
        self.active_tasks()
            .filter(|t| {
                t.due_at
                    .is_some_and(|due| due > now && due - now < window)
            })
            .cloned()
            .collect()
    }

    /// Active tasks whose due timestamp falls on the local calendar date
    /// `today`.
    #[must_use]
    pub fn scan_due_today(&self, today: NaiveDate) -> Vec<TaskItem> {
        self.active_tasks()
            .filter(|t| {
                t.due_at
                    .is_some_and(|due| due.with_timezone(&Local).date_naive() == today)
            })
            .cloned()
            .collect()
    }

    /// Move every NotStarted task whose start time has passed to InProgress.
    ///
    /// Returns the transitioned tasks. Idempotent per call boundary: after
    /// one call, no eligible task remains NotStarted. Each transition sends
    /// one "task started" message.
    pub async fn auto_progress(&mut self, now: DateTime<Utc>) -> crate::Result<Vec<TaskItem>> {
        let candidates: Vec<TaskItem> = self
            .not_started
            .iter()
            .filter(|t| t.start_at.is_some_and(|start| start <= now))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut started = Vec::with_capacity(candidates.len());
        for mut task in candidates {
            task.status = WorkStatus::InProgress;
            self.update(task.clone())?;
            self.kakao
                .send_message(&format!("[task started] '{}' has started", task.title))
                .await;
            started.push(task);
        }

        Ok(started)
    }

    fn active_tasks(&self) -> impl Iterator<Item = &TaskItem> {
        self.not_started.iter().chain(self.in_progress.iter())
    }

    fn distribute(&mut self, task: TaskItem) {
        match task.status {
            WorkStatus::NotStarted => self.not_started.push(task),
            WorkStatus::InProgress => self.in_progress.push(task),
            WorkStatus::Completed => self.completed.push(task),
        }
    }

    fn remove_from_all_buckets(&mut self, id: i64) {
        self.not_started.retain(|t| t.id != id);
        self.in_progress.retain(|t| t.id != id);
        self.completed.retain(|t| t.id != id);
    }
}

fn sort_value(task: &TaskItem, key: SortKey) -> DateTime<Utc> {
    let value = match key {
        SortKey::DueDate => task.due_at,
        SortKey::StartDate => task.start_at,
    };
    value.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::KakaoConfig;
    use crate::settings::SettingsStore;
    use crate::store::MemoryItemStore;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_kakao() -> Arc<KakaoClient> {
        // No stored token: send_message returns before touching the network.
        Arc::new(KakaoClient::new(
            KakaoConfig::default(),
            Arc::new(SettingsStore::ephemeral()),
        ))
    }

    fn make_board() -> (
        TaskBoard,
        Arc<MemoryItemStore>,
        mpsc::UnboundedReceiver<BoardEvent>,
    ) {
        let store = Arc::new(MemoryItemStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let board = TaskBoard::new(Arc::clone(&store) as Arc<dyn ItemStore>, offline_kakao(), tx);
        (board, store, rx)
    }

    #[tokio::test]
    async fn blank_title_is_rejected_without_side_effects() {
        let (mut board, store, mut rx) = make_board();
        let added = board.add("   ", None, None, None).await.unwrap();
        assert!(added.is_none());
        assert!(board.not_started().is_empty());
        assert!(store.list_tasks().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn add_inserts_into_not_started_and_publishes() {
        let (mut board, store, mut rx) = make_board();
        let task = board
            .add("write report", None, None, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(task.status, WorkStatus::NotStarted);
        assert_eq!(board.not_started().len(), 1);
        assert_eq!(store.list_tasks().unwrap().len(), 1);
        assert_eq!(rx.try_recv().unwrap(), BoardEvent::TaskAdded(task.id));
    }

    #[tokio::test]
    async fn completion_timestamp_tracks_status() {
        let (mut board, _store, _rx) = make_board();
        let mut task = board.add("t", None, None, None).await.unwrap().unwrap();

        task.status = WorkStatus::Completed;
        board.update(task.clone()).unwrap();
        let completed = &board.completed()[0];
        assert!(completed.completed_at.is_some());

        let mut reopened = completed.clone();
        reopened.status = WorkStatus::InProgress;
        board.update(reopened).unwrap();
        assert!(board.completed().is_empty());
        assert!(board.in_progress()[0].completed_at.is_none());
    }

    #[tokio::test]
    async fn update_moves_task_between_buckets_exactly_once() {
        let (mut board, _store, _rx) = make_board();
        let mut task = board.add("t", None, None, None).await.unwrap().unwrap();

        task.status = WorkStatus::InProgress;
        board.update(task.clone()).unwrap();

        let occurrences = board.not_started().iter().chain(board.in_progress())
            .chain(board.completed())
            .filter(|t| t.id == task.id)
            .count();
        assert_eq!(occurrences, 1);
        assert_eq!(board.in_progress().len(), 1);
        assert!(board.not_started().is_empty());
    }

    #[tokio::test]
    async fn delete_then_load_never_returns_the_task() {
        let (mut board, _store, _rx) = make_board();
        let task = board.add("gone", None, None, None).await.unwrap().unwrap();

        board.delete(task.id).unwrap();
        board.load();

        assert!(board.not_started().is_empty());
        assert!(board.in_progress().is_empty());
        assert!(board.completed().is_empty());
    }

    #[tokio::test]
    async fn load_degrades_to_empty_on_read_failure() {
        let (mut board, store, _rx) = make_board();
        board.add("t", None, None, None).await.unwrap();

        store.fail_reads.store(true, Ordering::SeqCst);
        board.load();
        assert!(board.not_started().is_empty());
    }

    #[tokio::test]
    async fn add_surfaces_store_write_failure() {
        let (mut board, store, _rx) = make_board();
        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(board.add("t", None, None, None).await.is_err());
        assert!(board.not_started().is_empty());
    }

    #[tokio::test]
    async fn sort_puts_unset_due_dates_last_and_is_stable() {
        let (mut board, _store, _rx) = make_board();
        let now = Utc::now();
        board.add("no-due-first", None, None, None).await.unwrap();
        board
            .add("later", None, None, Some(now + Duration::hours(5)))
            .await
            .unwrap();
        board
            .add("sooner", None, None, Some(now + Duration::hours(1)))
            .await
            .unwrap();
        board.add("no-due-second", None, None, None).await.unwrap();

        board.sort(SortKey::DueDate);

        let titles: Vec<&str> = board.not_started().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["sooner", "later", "no-due-first", "no-due-second"]);
    }

    #[tokio::test]
    async fn sort_by_start_date_uses_start_timestamps() {
        let (mut board, _store, _rx) = make_board();
        let now = Utc::now();
        board
            .add("b", None, Some(now + Duration::hours(2)), None)
            .await
            .unwrap();
        board
            .add("a", None, Some(now + Duration::hours(1)), None)
            .await
            .unwrap();

        board.sort(SortKey::StartDate);
        assert_eq!(board.not_started()[0].title, "a");
    }

    #[tokio::test]
    async fn imminent_scan_uses_a_strict_one_hour_window() {
        let (mut board, _store, _rx) = make_board();
        let now = Utc::now();
        board
            .add("inside", None, None, Some(now + Duration::minutes(30)))
            .await
            .unwrap();
        board
            .add("too-far", None, None, Some(now + Duration::hours(2)))
            .await
            .unwrap();
        board
            .add("past", None, None, Some(now - Duration::minutes(5)))
            .await
            .unwrap();
        board.add("dateless", None, None, None).await.unwrap();

        let hits = board.scan_imminent(now, Duration::hours(1));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "inside");
    }

    #[tokio::test]
    async fn imminent_scan_has_no_memory_between_calls() {
        let (mut board, _store, _rx) = make_board();
        let now = Utc::now();
        board
            .add("sticky", None, None, Some(now + Duration::minutes(30)))
            .await
            .unwrap();

        assert_eq!(board.scan_imminent(now, Duration::hours(1)).len(), 1);
        assert_eq!(board.scan_imminent(now, Duration::hours(1)).len(), 1);
    }

    #[tokio::test]
    async fn completed_tasks_never_appear_in_scans() {
        let (mut board, _store, _rx) = make_board();
        let now = Utc::now();
        let mut task = board
            .add("done", None, None, Some(now + Duration::minutes(30)))
            .await
            .unwrap()
            .unwrap();
        task.status = WorkStatus::Completed;
        board.update(task).unwrap();

        assert!(board.scan_imminent(now, Duration::hours(1)).is_empty());
        assert!(board
            .scan_due_today(Local::now().date_naive())
            .is_empty());
    }

    #[tokio::test]
    async fn due_today_scan_compares_local_dates() {
        let (mut board, _store, _rx) = make_board();
        let now = Utc::now();
        board
            .add("today", None, None, Some(now))
            .await
            .unwrap();
        board
            .add("next-week", None, None, Some(now + Duration::days(7)))
            .await
            .unwrap();

        let today = Local::now().date_naive();
        let hits = board.scan_due_today(today);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "today");
    }

    #[tokio::test]
    async fn auto_progress_is_idempotent_per_call_boundary() {
        let (mut board, _store, _rx) = make_board();
        let now = Utc::now();
        board
            .add("due-to-start", None, Some(now - Duration::minutes(1)), None)
            .await
            .unwrap();
        board
            .add("not-yet", None, Some(now + Duration::hours(1)), None)
            .await
            .unwrap();
        board.add("no-start", None, None, None).await.unwrap();

        let started = board.auto_progress(now).await.unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].title, "due-to-start");
        assert_eq!(board.in_progress().len(), 1);
        assert!(board.in_progress()[0].completed_at.is_none());

        let second = board.auto_progress(now).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn auto_progress_sends_one_started_notice_per_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/api/talk/memo/default/send"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let settings = Arc::new(SettingsStore::ephemeral());
        settings.update(|s| {
            s.kakao_access_token = Some("acc".to_owned());
            s.kakao_refresh_token = Some("ref".to_owned());
            s.kakao_token_expires_at = Some(Utc::now() + Duration::hours(1));
        });
        let kakao = Arc::new(KakaoClient::new(
            KakaoConfig {
                api_base_url: server.uri(),
                auth_base_url: server.uri(),
                ..KakaoConfig::default()
            },
            settings,
        ));

        let store = Arc::new(MemoryItemStore::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut board = TaskBoard::new(store, kakao, tx);

        let now = Utc::now();
        board
            .add_without_notice("starts-now", Some(now - Duration::minutes(1)))
            .await;

        let started = board.auto_progress(now).await.unwrap();
        assert_eq!(started.len(), 1);
        assert!(board.auto_progress(now).await.unwrap().is_empty());
    }

    impl TaskBoard {
        /// Seed a task directly through the store, skipping the add notice.
        async fn add_without_notice(&mut self, title: &str, start_at: Option<DateTime<Utc>>) {
            let task = self
                .store
                .add_task(TaskItem::new(title, None, start_at, None))
                .unwrap();
            self.not_started.push(task);
        }
    }
}
