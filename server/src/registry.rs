//! Process-wide table of live sessions
//!
//! This module tracks which sessions exist and what they last reported:
//! - Registration on connect and automatic removal when the session ends
//! - Activity timestamps touched by both of a session's tasks
//! - Latency and client frame rate published by the tick task
//! - Point-in-time snapshots for the `/sessions` report
//!
//! The registry is created once at startup and lives until process exit.
//! It never holds game state, so a misbehaving session cannot affect others.

use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use log::info;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fields written after creation, guarded by one short-lived lock.
#[derive(Debug, Clone, Copy)]
struct Activity {
    last_active: DateTime<Utc>,
    client_fps: f32,
    latency_ms: f32,
}

/// Shared view of one live session
///
/// Held by the registry and by the session's own tasks. Only the
/// activity fields change after creation.
#[derive(Debug)]
pub struct SessionHandle {
    /// Unique session identifier
    pub id: String,
    /// When the connection was accepted
    pub created: DateTime<Utc>,
    activity: Mutex<Activity>,
}

impl SessionHandle {
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created: now,
            activity: Mutex::new(Activity {
                last_active: now,
                client_fps: 0.0,
                latency_ms: 0.0,
            }),
        }
    }

    fn activity(&self) -> MutexGuard<'_, Activity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the session as active right now
    pub fn touch(&self) {
        self.activity().last_active = Utc::now();
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.activity().last_active
    }

    /// Publishes the latest telemetry computed by the tick task
    pub fn publish_telemetry(&self, client_fps: f32, latency_ms: f32) {
        let mut activity = self.activity();
        activity.client_fps = client_fps;
        activity.latency_ms = latency_ms;
    }

    /// Builds the reporting row for this session
    pub fn summary(&self) -> SessionSummary {
        let activity = *self.activity();
        SessionSummary {
            id: self.id.clone(),
            created: self.created.to_rfc3339_opts(SecondsFormat::Secs, true),
            last_active: activity
                .last_active
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            client_fps: activity.client_fps,
            latency: activity.latency_ms,
        }
    }
}

/// One row of the `/sessions` report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub created: String,
    #[serde(rename = "lastActive")]
    pub last_active: String,
    #[serde(rename = "clientFPS")]
    pub client_fps: f32,
    pub latency: f32,
}

/// Concurrent map of live sessions indexed by id
///
/// Backed by a sharded map so inserts and removals from different
/// sessions only contend when they land on the same shard.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session and returns a guard that removes it again on drop
    ///
    /// Tying removal to the guard means every exit path of a session,
    /// including errors and task cancellation, cleans up its entry.
    pub fn register(self: &Arc<Self>, handle: Arc<SessionHandle>) -> Registration {
        let id = handle.id.clone();
        self.sessions.insert(id.clone(), handle);
        info!("Session {} registered ({} active)", id, self.len());

        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Removes a session. Returns false if it was already gone.
    pub fn remove(&self, id: &str) -> bool {
        if self.sessions.remove(id).is_some() {
            info!("Session {} removed ({} active)", id, self.len());
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Point-in-time summaries of every live session, oldest first
    ///
    /// Each shard is read-locked only while its entries are copied out.
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let mut handles: Vec<Arc<SessionHandle>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        handles.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        handles.iter().map(|handle| handle.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Keeps a session registered for as long as it is alive
#[derive(Debug)]
pub struct Registration {
    registry: Arc<SessionRegistry>,
    id: String,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
