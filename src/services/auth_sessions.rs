// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pending Google sign-in sessions for the browser redirect flow.
//!
//! The desktop app starts a session, opens the returned URL in a browser and
//! polls until the callback has completed or failed. Sessions are single-use
//! and expire after [`SESSION_TTL`]; expired entries are unreachable even
//! before they are pruned.

use crate::models::AuthTokens;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a session stays reachable after creation.
pub const SESSION_TTL: Duration = Duration::from_secs(300);

/// Random bytes in a session ID.
const SESSION_ID_BYTES: usize = 32;

/// Time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// State of a sign-in session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Pending,
    Complete(Box<AuthTokens>),
    Failed(String),
}

#[derive(Debug, Clone)]
struct SessionEntry {
    created_at: Instant,
    status: SessionStatus,
}

/// Errors from session creation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to generate session id")]
    Random,
}

/// Concurrent map of pending sign-in sessions.
#[derive(Clone)]
pub struct AuthSessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    rng: SystemRandom,
}

impl AuthSessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, SESSION_TTL)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            clock,
            ttl,
            rng: SystemRandom::new(),
        }
    }

    fn is_live(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) <= self.ttl
    }

    /// Start a new pending session and return its ID.
    pub fn create(&self) -> Result<String, SessionError> {
        self.prune_expired();

        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng.fill(&mut bytes).map_err(|_| SessionError::Random)?;
        let session_id = URL_SAFE_NO_PAD.encode(bytes);

        self.sessions.insert(
            session_id.clone(),
            SessionEntry {
                created_at: self.clock.now(),
                status: SessionStatus::Pending,
            },
        );

        Ok(session_id)
    }

    /// Current status, or `None` if unknown or expired.
    pub fn get(&self, session_id: &str) -> Option<SessionStatus> {
        let now = self.clock.now();
        self.sessions
            .get(session_id)
            .filter(|entry| self.is_live(entry.value(), now))
            .map(|entry| entry.value().status.clone())
    }

    fn set_status(&self, session_id: &str, status: SessionStatus) -> bool {
        let now = self.clock.now();
        match self.sessions.get_mut(session_id) {
            Some(mut entry) if self.is_live(entry.value(), now) => {
                entry.status = status;
                true
            }
            _ => false,
        }
    }

    /// Record successful sign-in. Returns false for unknown or expired sessions.
    pub fn complete(&self, session_id: &str, tokens: AuthTokens) -> bool {
        self.set_status(session_id, SessionStatus::Complete(Box::new(tokens)))
    }

    /// Record a failed sign-in. Returns false for unknown or expired sessions.
    pub fn fail(&self, session_id: &str, detail: impl Into<String>) -> bool {
        self.set_status(session_id, SessionStatus::Failed(detail.into()))
    }

    /// Poll a session.
    ///
    /// Pending sessions stay in place. Finished sessions are removed and
    /// returned, so a result can be read only once.
    pub fn take_finished(&self, session_id: &str) -> Option<SessionStatus> {
        match self.get(session_id)? {
            SessionStatus::Pending => Some(SessionStatus::Pending),
            _ => self
                .sessions
                .remove(session_id)
                .map(|(_, entry)| entry.status),
        }
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| self.is_live(entry, now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Background task that prunes expired sessions periodically.
pub async fn run_session_cleanup(store: AuthSessionStore, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        let removed = store.prune_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "Pruned expired sign-in sessions");
        }
    }
}
