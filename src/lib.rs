//! Taskdeck: a single-instance desktop task tracker core.
//!
//! The crate wires four pieces around a shared [`board::TaskBoard`]:
//! - **Singleton**: one tracker per user session, with a wake channel for
//!   later launches ([`singleton`])
//! - **Reminders**: a recurring deadline scan plus a one-shot startup
//!   summary ([`notify`])
//! - **State machine**: not-started / in-progress / completed buckets with
//!   time-based auto-progression ([`board`], [`model`])
//! - **Kakao session**: token lifecycle and self-memo notices ([`kakao`])
//!
//! [`startup::initialize`] assembles and boots the whole thing; the
//! `taskdeck-host` binary puts the singleton gate in front of it.

pub mod app_dirs;
pub mod board;
pub mod config;
pub mod error;
pub mod kakao;
pub mod model;
pub mod notify;
pub mod settings;
pub mod singleton;
pub mod startup;
pub mod store;

pub use board::{BoardEvent, SortKey, TaskBoard};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use model::{Platform, TaskItem, WorkStatus};
pub use notify::{NotificationSink, ReminderEngine, TracingSink};
pub use settings::{AppSettings, SettingsStore};
pub use singleton::{ActivationSignal, SingletonCoordinator};
pub use startup::TrackerHost;
pub use store::{ItemStore, JsonItemStore};
