//! Notification polling.
//!
//! The poller asks for everything after the last id it saw, or for the
//! recent window when it has none yet. Ids already delivered are skipped,
//! and so are events this copayer caused unless the caller opted in.
//!
//! A running loop belongs to one *epoch*. Starting again or stopping bumps
//! the epoch, so a loop that wakes up from a timer scheduled before that is
//! a no-op and exits.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::RemoteClient;
use super::wire::Notification;
use super::SyncError;
use crate::config::NOTIFICATION_DEDUP_CAPACITY;

#[derive(Default)]
struct PollState {
    last_id: Option<String>,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl PollState {
    /// Record `id`; false if it was already delivered.
    fn remember(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > NOTIFICATION_DEDUP_CAPACITY {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}

pub struct NotificationPoller {
    client: Arc<RemoteClient>,
    own_id: String,
    include_own: bool,
    interval: Duration,
    window: Duration,
    state: Mutex<PollState>,
    in_flight: AtomicBool,
    epoch: AtomicU64,
}

/// Clears the in-flight flag when a poll ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl NotificationPoller {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        let config = client.config();
        Self {
            own_id: client.identity().to_string(),
            include_own: config.include_own_notifications,
            interval: config.notification_poll_interval(),
            window: config.notification_window(),
            client,
            state: Mutex::new(PollState::default()),
            in_flight: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn include_own(mut self, include: bool) -> Self {
        self.include_own = include;
        self
    }

    pub fn last_id(&self) -> Option<String> {
        self.state.lock().last_id.clone()
    }

    /// One fetch. Returns nothing, without a request, while another poll
    /// is still running.
    pub async fn poll_once(&self) -> Result<Vec<Notification>, SyncError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("previous notification poll still running, skipping");
            return Ok(Vec::new());
        }
        let _flight = InFlight(&self.in_flight);

        let after = self.last_id();
        let fetched = self
            .client
            .notifications(after.as_deref(), self.window.as_secs())
            .await?;

        let mut state = self.state.lock();
        let mut delivered = Vec::new();
        for notification in fetched {
            if !state.remember(&notification.id) {
                continue;
            }
            state.last_id = Some(notification.id.clone());
            let own = notification.creator_id.as_deref() == Some(self.own_id.as_str());
            if own && !self.include_own {
                continue;
            }
            delivered.push(notification);
        }
        Ok(delivered)
    }

    /// Poll every interval and push new notifications into `sink` until
    /// stopped, restarted, or the receiver goes away.
    pub fn start(self: Arc<Self>, sink: mpsc::Sender<Notification>) -> PollerHandle {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let poller = self.clone();

        let task = tokio::spawn(async move {
            info!(epoch, "notification poller starting");
            loop {
                if *shutdown.borrow() || poller.epoch.load(Ordering::SeqCst) != epoch {
                    debug!(epoch, "notification poller superseded");
                    return;
                }

                match poller.poll_once().await {
                    Ok(batch) => {
                        for notification in batch {
                            if sink.send(notification).await.is_err() {
                                debug!("notification receiver dropped, stopping");
                                return;
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "notification poll failed"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(poller.interval) => {}
                    _ = shutdown.changed() => {
                        info!(epoch, "notification poller stopped");
                        return;
                    }
                }
            }
        });

        PollerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Invalidate any running loop; it exits at its next wake-up.
    pub fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the loop to exit without waiting for it.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal the loop and wait until it has exited.
    pub async fn stop(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "notification poller task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
