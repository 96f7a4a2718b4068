//! Single-instance coordination.
//!
//! At most one tracker host may run per user session. Ownership is claimed
//! through an exclusively-created lock file holding an instance record, and
//! a Unix domain socket doubles as both liveness probe and wake channel:
//! a live primary always has the socket bound, so a connect that fails
//! proves the lock is stale. Secondaries write one wake byte to ask the
//! primary to surface itself, then exit; a connection that closes without
//! writing is a probe and wakes nothing.

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait before the second liveness probe when a lock exists but its socket
/// is dead. A starting holder writes the lock before binding the socket, so
/// a single probe could misread a healthy instance mid-claim as crashed.
const STALE_PROBE_GRACE: Duration = Duration::from_millis(100);

/// One wake request from another instance. Carries no payload; every wake
/// byte received maps to exactly one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationSignal;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceRecord {
    instance_id: String,
    pid: u32,
    started_at_ms: u64,
}

/// Claims and holds the per-session single-instance role.
pub struct SingletonCoordinator {
    lock_path: PathBuf,
    socket_path: PathBuf,
    instance_id: String,
    listener: Mutex<Option<std::os::unix::net::UnixListener>>,
    cancel: CancellationToken,
    primary: AtomicBool,
}

impl SingletonCoordinator {
    /// Coordinator rooted at the default runtime directory.
    #[must_use]
    pub fn open_default() -> Self {
        Self::new(crate::app_dirs::runtime_dir())
    }

    /// Coordinator whose lock file and socket live under `dir`.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        let instance_id = format!("{}-{}", std::process::id(), now_epoch_millis());
        Self {
            lock_path: dir.join("taskdeck.lock"),
            socket_path: dir.join("taskdeck.sock"),
            instance_id,
            listener: Mutex::new(None),
            cancel: CancellationToken::new(),
            primary: AtomicBool::new(false),
        }
    }

    /// Try to claim the primary role.
    ///
    /// Returns `Ok(true)` when this process is now the primary (the wake
    /// socket is bound before returning, so probes from later instances
    /// cannot mistake us for dead). Returns `Ok(false)` when a live primary
    /// already holds the lock. A lock left behind by a crashed process is
    /// detected by probing the socket twice across a grace period and
    /// evicted, then the claim is retried once.
    pub fn try_become_primary(&self) -> Result<bool> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Singleton(format!("cannot create runtime directory: {e}"))
            })?;
        }

        for attempt in 0..2 {
            match self.write_lock_record() {
                Ok(()) => {
                    self.bind_wake_socket()?;
                    self.primary.store(true, Ordering::SeqCst);
                    info!(instance_id = %self.instance_id, "claimed primary instance");
                    return Ok(true);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if self.socket_alive() {
                        return Ok(false);
                    }
                    // the holder may still be between lock write and socket
                    // bind; declare it dead only if a second probe agrees
                    std::thread::sleep(STALE_PROBE_GRACE);
                    if self.socket_alive() {
                        return Ok(false);
                    }
                    if attempt > 0 {
                        // lost the re-claim race to another starting instance
                        return Ok(false);
                    }
                    warn!(
                        "evicting stale instance lock at {}",
                        self.lock_path.display()
                    );
                    let _ = std::fs::remove_file(&self.lock_path);
                    let _ = std::fs::remove_file(&self.socket_path);
                }
                Err(e) => {
                    return Err(TrackerError::Singleton(format!(
                        "cannot create instance lock {}: {e}",
                        self.lock_path.display()
                    )));
                }
            }
        }

        Ok(false)
    }

    fn write_lock_record(&self) -> std::io::Result<()> {
        let record = InstanceRecord {
            instance_id: self.instance_id.clone(),
            pid: std::process::id(),
            started_at_ms: now_epoch_millis(),
        };
        let json = serde_json::to_vec(&record).map_err(std::io::Error::other)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        file.write_all(&json)
    }

    fn bind_wake_socket(&self) -> Result<()> {
        // any leftover socket file is stale: a live owner would have
        // answered the probe that got us here
        let _ = std::fs::remove_file(&self.socket_path);
        let listener = std::os::unix::net::UnixListener::bind(&self.socket_path).map_err(|e| {
            TrackerError::Singleton(format!(
                "cannot bind wake socket {}: {e}",
                self.socket_path.display()
            ))
        })?;
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
        Ok(())
    }

    fn socket_alive(&self) -> bool {
        std::os::unix::net::UnixStream::connect(&self.socket_path).is_ok()
    }

    /// Ask the running primary to surface itself. Called by an instance
    /// that lost the claim, right before it exits.
    ///
    /// The wake byte is what distinguishes a raise from a liveness probe,
    /// so a raise only succeeds once the byte is written.
    pub fn raise_activation(&self) -> Result<()> {
        let mut stream = std::os::unix::net::UnixStream::connect(&self.socket_path)
            .map_err(|e| TrackerError::Singleton(format!("cannot reach primary instance: {e}")))?;
        stream
            .write_all(&[1])
            .map_err(|e| TrackerError::Singleton(format!("cannot send wake request: {e}")))?;
        Ok(())
    }

    /// Start forwarding wake requests to `tx`, one signal per wake byte.
    ///
    /// Liveness probes connect and close without writing; those connections
    /// deliver nothing. Only the primary may call this, and only once; the
    /// listener bound in [`Self::try_become_primary`] is consumed here.
    /// Accept errors are logged and the loop keeps serving.
    pub fn spawn_listener(&self, tx: mpsc::UnboundedSender<ActivationSignal>) -> Result<()> {
        let Some(listener) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Err(TrackerError::Singleton(
                "wake listener unavailable: not primary, or already running".to_owned(),
            ));
        };

        listener.set_nonblocking(true).map_err(|e| {
            TrackerError::Singleton(format!("cannot prepare wake socket: {e}"))
        })?;
        let listener = tokio::net::UnixListener::from_std(listener).map_err(|e| {
            TrackerError::Singleton(format!("cannot register wake socket: {e}"))
        })?;

        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((mut stream, _addr)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                // probes close without writing; only a wake
                                // byte counts as a raise
                                let mut buf = [0u8; 1];
                                if matches!(stream.read(&mut buf).await, Ok(1)) {
                                    let _ = tx.send(ActivationSignal);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("wake socket accept failed: {e}");
                        }
                    },
                }
            }
        });

        Ok(())
    }

    /// Give up the primary role and remove the lock and socket files.
    /// Safe to call repeatedly or when the role was never held.
    pub fn release(&self) {
        self.cancel.cancel();
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if self.primary.swap(false, Ordering::SeqCst) {
            let _ = std::fs::remove_file(&self.socket_path);
            let _ = std::fs::remove_file(&self.lock_path);
            info!("released primary instance");
        }
    }
}

impl Drop for SingletonCoordinator {
    fn drop(&mut self) {
        self.release();
    }
}

fn now_epoch_millis() -> u64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
