// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-context http sessions keyed by cookie.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

use super::EventListener;

/// A server side session.
#[derive(Debug)]
pub struct HttpSession {
    id: String,
    created: DateTime<Utc>,
    last_accessed: Mutex<DateTime<Utc>>,
    max_inactive: Option<Duration>,
    attributes: RwLock<HashMap<String, Value>>,
    valid: AtomicBool,
}

impl HttpSession {
    fn new(timeout_minutes: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            created: now,
            last_accessed: Mutex::new(now),
            max_inactive: timeout_minutes
                .filter(|m| *m > 0)
                .map(|m| Duration::minutes(i64::from(m))),
            attributes: RwLock::new(HashMap::new()),
            valid: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn last_accessed_time(&self) -> DateTime<Utc> {
        *self.last_accessed.lock()
    }

    /// Inactivity period after which the session expires; `None` never expires.
    pub fn max_inactive_interval(&self) -> Option<Duration> {
        self.max_inactive
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.read().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: Value) {
        self.attributes.write().insert(name.to_string(), value);
    }

    pub fn remove_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.write().remove(name)
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Mark the session invalid; it is dropped on its next lookup or sweep.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.max_inactive {
            Some(max) => now - *self.last_accessed.lock() > max,
            None => false,
        }
    }

    fn touch(&self, now: DateTime<Utc>) {
        *self.last_accessed.lock() = now;
    }
}

const SWEEP_INTERVAL_SECONDS: i64 = 60;

/// Sessions of one context path.
///
/// Expired and invalidated sessions are dropped when looked up, and in a
/// sweep that runs on `create` at most once per sweep interval.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<HttpSession>>>,
    timeout_minutes: Option<u32>,
    cookie_name: String,
    sweep_interval: Duration,
    next_sweep: Mutex<DateTime<Utc>>,
}

impl SessionStore {
    pub fn new(timeout_minutes: Option<u32>, cookie_name: &str) -> Self {
        let sweep_interval = Duration::seconds(SWEEP_INTERVAL_SECONDS);
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout_minutes,
            cookie_name: cookie_name.to_string(),
            sweep_interval,
            next_sweep: Mutex::new(Utc::now() + sweep_interval),
        }
    }

    pub(crate) fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        *self.next_sweep.get_mut() = Utc::now() + interval;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn timeout_minutes(&self) -> Option<u32> {
        self.timeout_minutes
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create(&self, listeners: &[Arc<dyn EventListener>]) -> Arc<HttpSession> {
        let now = Utc::now();
        let sweep_due = {
            let mut next_sweep = self.next_sweep.lock();
            let due = now >= *next_sweep;
            if due {
                *next_sweep = now + self.sweep_interval;
            }
            due
        };
        if sweep_due {
            self.sweep_at(now, listeners);
        }

        let session = Arc::new(HttpSession::new(self.timeout_minutes));
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        debug!("Created session {}", session.id);
        for listener in listeners {
            listener.session_created(&session);
        }
        session
    }

    /// Look up a live session, dropping it when it expired or was invalidated.
    pub fn find(&self, id: &str, listeners: &[Arc<dyn EventListener>]) -> Option<Arc<HttpSession>> {
        let now = Utc::now();
        let session = {
            let mut sessions = self.sessions.lock();
            let session = sessions.get(id)?.clone();
            if session.is_valid() && !session.is_expired(now) {
                session.touch(now);
                return Some(session);
            }
            sessions.remove(id);
            session
        };
        debug!("Session {} expired", session.id);
        session.invalidate();
        for listener in listeners {
            listener.session_destroyed(&session);
        }
        None
    }

    /// Drop every expired or invalidated session; returns how many were dropped.
    pub fn sweep(&self, listeners: &[Arc<dyn EventListener>]) -> usize {
        self.sweep_at(Utc::now(), listeners)
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>, listeners: &[Arc<dyn EventListener>]) -> usize {
        let dropped: Vec<Arc<HttpSession>> = {
            let mut sessions = self.sessions.lock();
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| !s.is_valid() || s.is_expired(now))
                .map(|(id, _)| id.clone())
                .collect();
            stale.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        if !dropped.is_empty() {
            debug!("Swept {} stale session(s)", dropped.len());
        }
        for session in &dropped {
            session.invalidate();
            for listener in listeners {
                listener.session_destroyed(session);
            }
        }
        dropped.len()
    }

    /// Drop every session, e.g. when the context goes away.
    pub fn clear(&self, listeners: &[Arc<dyn EventListener>]) {
        let drained: Vec<Arc<HttpSession>> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in drained {
            session.invalidate();
            for listener in listeners {
                listener.session_destroyed(&session);
            }
        }
    }
}
