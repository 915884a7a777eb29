use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::clock::{Clock, SystemClock};

/// How long a consent-screen round trip may take.
pub const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

const STATE_BYTES: usize = 32;

/// OAuth `state` values handed out by the connect route, each bound to the
/// user that asked for it. A state is good for one callback only.
#[derive(Clone)]
pub struct PendingAuthorizations {
    inner: Arc<PendingInner>,
}

struct PendingInner {
    entries: RwLock<HashMap<String, PendingEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    user_id: i64,
    created_at: u64,
}

impl PendingAuthorizations {
    pub fn new() -> Self {
        Self::with_clock(PENDING_TTL, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(PendingInner {
                entries: RwLock::new(HashMap::new()),
                ttl,
                clock,
            }),
        }
    }

    fn is_live(&self, entry: &PendingEntry, now: u64) -> bool {
        now.saturating_sub(entry.created_at) < self.inner.ttl.as_secs()
    }

    /// Mint a fresh state for `user_id`. Expired entries are dropped on the
    /// way in.
    pub async fn issue(&self, user_id: i64) -> String {
        let mut bytes = [0u8; STATE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let state = URL_SAFE_NO_PAD.encode(bytes);

        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.write().await;
        entries.retain(|_, entry| self.is_live(entry, now));
        entries.insert(
            state.clone(),
            PendingEntry {
                user_id,
                created_at: now,
            },
        );
        debug!("Issued OAuth state for user {} ({} pending)", user_id, entries.len());
        state
    }

    /// Consume `state`, returning the user it was issued to. Unknown, reused
    /// and expired states all yield `None`.
    pub async fn take(&self, state: &str) -> Option<i64> {
        let now = self.inner.clock.now();
        let entry = self.inner.entries.write().await.remove(state)?;
        self.is_live(&entry, now).then_some(entry.user_id)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }
}

impl Default for PendingAuthorizations {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PendingAuthorizations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorizations")
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}
