//! Session token shared by every request of one wallet instance.
//!
//! Each stored token gets a generation number. A request remembers the
//! generation it used; when that token is rejected the request asks for a
//! refresh *of that generation*. Only the first such caller logs in, the
//! others wait on the refresh lock and then find a newer generation
//! already in place.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub generation: u64,
}

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    generation: u64,
}

#[derive(Default)]
pub struct SessionCell {
    state: Mutex<SessionState>,
    refresh: tokio::sync::Mutex<()>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Session> {
        let state = self.state.lock();
        state.token.as_ref().map(|token| Session {
            token: token.clone(),
            generation: state.generation,
        })
    }

    /// Generation of the current token, or of the last cleared one.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Drop the token if it is still generation `generation`.
    pub fn invalidate(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.token = None;
        }
    }

    /// Log in unless someone already replaced generation `stale`.
    ///
    /// `login` runs under `timeout`; the refresh lock is released whether
    /// it finishes, fails or times out.
    pub async fn refresh<F, Fut>(&self, stale: u64, timeout: Duration, login: F) -> Result<Session, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, SyncError>>,
    {
        let _guard = self.refresh.lock().await;
        if let Some(session) = self.current() {
            if session.generation != stale {
                debug!(generation = session.generation, "reusing refreshed session");
                return Ok(session);
            }
        }

        let token = tokio::time::timeout(timeout, login())
            .await
            .map_err(|_| SyncError::Timeout)??;

        let mut state = self.state.lock();
        state.generation += 1;
        state.token = Some(token.clone());
        debug!(generation = state.generation, "session refreshed");
        Ok(Session {
            token,
            generation: state.generation,
        })
    }
}
