//! Named registry of long-running tasks.
//!
//! The render loop and every animation runner register here. Callers that
//! need a task gone use `join` with a bound; a task that refuses to exit
//! is marked lost rather than awaited forever, so stopping paths never
//! deadlock. `shutdown` joins what it can and aborts the rest.
//!
//! The inner map uses a std mutex; it is never held across an await.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug)]
struct TaskEntry {
    handle: Option<JoinHandle<()>>,
    lost: bool,
}

/// Observability snapshot of one registered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    pub lost: bool,
    pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The task exited within the bound.
    Joined,
    /// The bound elapsed; the task is marked lost and left running.
    TimedOut,
    /// No task registered under that name (or its handle is already taken).
    Unknown,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spawned task under `name`. Re-registering a name replaces
    /// the previous entry; the old handle (if any) is detached.
    pub fn register(&self, name: impl Into<String>, handle: JoinHandle<()>) {
        let name = name.into();
        debug!(target: "runtime.tasks", task = name.as_str(), "task_registered");
        let mut tasks = self.lock();
        tasks.insert(
            name,
            TaskEntry {
                handle: Some(handle),
                lost: false,
            },
        );
    }

    /// Await the named task for at most `timeout`.
    ///
    /// On timeout the handle is parked back in the entry and the task is
    /// marked lost; the caller returns promptly either way.
    pub async fn join(&self, name: &str, timeout: Duration) -> JoinOutcome {
        let Some(mut handle) = self.take_handle(name) else {
            return JoinOutcome::Unknown;
        };
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(result) => {
                if let Err(e) = result {
                    if e.is_panic() {
                        warn!(target: "runtime.tasks", task = name, "task_panicked");
                    }
                }
                self.lock().remove(name);
                JoinOutcome::Joined
            }
            Err(_) => {
                warn!(target: "runtime.tasks", task = name, timeout_ms = timeout.as_millis() as u64, "task_join_timeout");
                let mut tasks = self.lock();
                if let Some(entry) = tasks.get_mut(name) {
                    entry.handle = Some(handle);
                    entry.lost = true;
                }
                JoinOutcome::TimedOut
            }
        }
    }

    /// Flag a task as lost without touching its handle.
    pub fn mark_lost(&self, name: &str) {
        if let Some(entry) = self.lock().get_mut(name) {
            entry.lost = true;
        }
    }

    pub fn snapshot(&self) -> Vec<TaskInfo> {
        let tasks = self.lock();
        let mut out: Vec<TaskInfo> = tasks
            .iter()
            .map(|(name, entry)| TaskInfo {
                name: name.clone(),
                lost: entry.lost,
                finished: entry
                    .handle
                    .as_ref()
                    .map(|h| h.is_finished())
                    .unwrap_or(true),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Join every registered task within `timeout` each; abort whatever is
    /// left. Used once at process teardown.
    pub async fn shutdown(&self, timeout: Duration) {
        let names: Vec<String> = self.lock().keys().cloned().collect();
        for name in names {
            match self.join(&name, timeout).await {
                JoinOutcome::Joined | JoinOutcome::Unknown => {}
                JoinOutcome::TimedOut => {
                    if let Some(handle) = self.take_handle(&name) {
                        warn!(target: "runtime.tasks", task = name.as_str(), "task_aborted");
                        handle.abort();
                    }
                    self.lock().remove(&name);
                }
            }
        }
    }

    fn take_handle(&self, name: &str) -> Option<JoinHandle<()>> {
        self.lock().get_mut(name).and_then(|e| e.handle.take())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
