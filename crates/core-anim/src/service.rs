//! Animation runner service.
//!
//! One slot per zone. The slot's mutex serializes start/stop transitions
//! for that zone while distinct zones proceed concurrently. The runner
//! task never locks its slot on the stop path; a self-terminating runner
//! uses `try_lock` for cleanup, so it cannot deadlock against a caller
//! holding the slot while joining it.
//!
//! Exactly one stopped event is published per runner: whoever flips the
//! shared `published` flag first (the runner on self-termination, the
//! stopping caller otherwise) emits it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use core_events::{Event, EventBus, JoinOutcome, StopReason, TaskRegistry};
use core_frame::{Frame, FramePriority, FrameSource};
use core_render::FrameManager;
use core_zone::ZoneId;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{Animation, Step};

/// Reported lifecycle state of a zone's runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug)]
struct RunnerRef {
    task_name: String,
    shutdown: Arc<Notify>,
    finished: Arc<AtomicBool>,
    published: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct ZoneSlot {
    starting: AtomicBool,
    stopping: AtomicBool,
    current: tokio::sync::Mutex<Option<RunnerRef>>,
}

struct ServiceInner {
    manager: FrameManager,
    bus: EventBus,
    registry: Arc<TaskRegistry>,
    slots: [Arc<ZoneSlot>; ZoneId::COUNT],
    seq: AtomicU64,
    tick: Duration,
    frame_ttl: Duration,
    stop_timeout: Duration,
}

/// Starts and stops animation runners, one per zone at most.
#[derive(Clone)]
pub struct AnimationService {
    inner: Arc<ServiceInner>,
}

impl AnimationService {
    /// Cadence, frame TTL (two ticks) and the stop bound all derive from
    /// the manager's render settings.
    pub fn new(manager: FrameManager, bus: EventBus, registry: Arc<TaskRegistry>) -> Self {
        let tick = manager.settings().tick();
        let stop_timeout = manager.settings().stop_timeout;
        Self {
            inner: Arc::new(ServiceInner {
                manager,
                bus,
                registry,
                slots: std::array::from_fn(|_| Arc::new(ZoneSlot::default())),
                seq: AtomicU64::new(0),
                tick,
                frame_ttl: tick * 2,
                stop_timeout,
            }),
        }
    }

    /// Start `animation` on `zone`. A runner already live on the zone is
    /// stopped first; transitions on one zone are serialized.
    pub async fn start(&self, zone: ZoneId, animation: Box<dyn Animation>) {
        let slot = self.inner.slots[zone.index()].clone();
        let mut current = slot.current.lock().await;
        slot.starting.store(true, Ordering::SeqCst);
        if let Some(previous) = current.take() {
            self.stop_runner(zone, previous).await;
        }
        let task_name = format!(
            "anim-{}-{}",
            zone,
            self.inner.seq.fetch_add(1, Ordering::SeqCst)
        );
        let shutdown = Arc::new(Notify::new());
        let finished = Arc::new(AtomicBool::new(false));
        let published = Arc::new(AtomicBool::new(false));
        let runner = RunnerTask {
            manager: self.inner.manager.clone(),
            bus: self.inner.bus.clone(),
            zone,
            name: animation.name(),
            priority: animation.priority(),
            source: animation.source(),
            animation,
            tick: self.inner.tick,
            frame_ttl: self.inner.frame_ttl,
            task_name: task_name.clone(),
            slot: slot.clone(),
            shutdown: shutdown.clone(),
            finished: finished.clone(),
            published: published.clone(),
        };
        let handle = tokio::spawn(runner.run());
        self.inner.registry.register(task_name.clone(), handle);
        *current = Some(RunnerRef {
            task_name,
            shutdown,
            finished,
            published,
        });
        slot.starting.store(false, Ordering::SeqCst);
        self.inner.bus.publish(Event::AnimationStarted { zone });
        info!(target: "anim.service", zone = %zone, "animation_started");
    }

    /// Stop the zone's runner, if any. Returns once the runner exited or
    /// the stop bound elapsed (the runner is then detached and marked lost
    /// in the task registry).
    pub async fn stop(&self, zone: ZoneId) {
        let slot = self.inner.slots[zone.index()].clone();
        slot.stopping.store(true, Ordering::SeqCst);
        let mut current = slot.current.lock().await;
        if let Some(runner) = current.take() {
            self.stop_runner(zone, runner).await;
        }
        slot.stopping.store(false, Ordering::SeqCst);
    }

    /// Stop every zone's runner. Used at shutdown.
    pub async fn stop_all(&self) {
        for zone in ZoneId::ALL {
            self.stop(zone).await;
        }
    }

    /// Lifecycle state of `zone` for diagnostics.
    pub async fn state(&self, zone: ZoneId) -> RunState {
        let slot = &self.inner.slots[zone.index()];
        if slot.stopping.load(Ordering::SeqCst) {
            return RunState::Stopping;
        }
        if slot.starting.load(Ordering::SeqCst) {
            return RunState::Starting;
        }
        let current = slot.current.lock().await;
        match current.as_ref() {
            None => RunState::Idle,
            Some(runner) if runner.finished.load(Ordering::SeqCst) => RunState::Idle,
            Some(_) => RunState::Running,
        }
    }

    async fn stop_runner(&self, zone: ZoneId, runner: RunnerRef) {
        runner.shutdown.notify_one();
        match self
            .inner
            .registry
            .join(&runner.task_name, self.inner.stop_timeout)
            .await
        {
            JoinOutcome::Joined | JoinOutcome::Unknown => {}
            JoinOutcome::TimedOut => {
                warn!(
                    target: "anim.service",
                    zone = %zone,
                    task = runner.task_name.as_str(),
                    "runner_stop_timeout_detached"
                );
            }
        }
        if !runner.published.swap(true, Ordering::SeqCst) {
            self.inner.bus.publish(Event::AnimationStopped {
                zone,
                reason: StopReason::Requested,
            });
        }
    }
}

struct RunnerTask {
    manager: FrameManager,
    bus: EventBus,
    zone: ZoneId,
    name: &'static str,
    priority: FramePriority,
    source: FrameSource,
    animation: Box<dyn Animation>,
    tick: Duration,
    frame_ttl: Duration,
    task_name: String,
    slot: Arc<ZoneSlot>,
    shutdown: Arc<Notify>,
    finished: Arc<AtomicBool>,
    published: Arc<AtomicBool>,
}

impl RunnerTask {
    async fn run(mut self) {
        info!(
            target: "anim.runner",
            zone = %self.zone,
            animation = self.name,
            "runner_started"
        );
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let reason = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => break StopReason::Requested,
                _ = interval.tick() => {}
            }
            match self.animation.step() {
                Ok(Step::Emit(updates)) => {
                    let frame =
                        match Frame::new(self.priority, self.source, self.frame_ttl, updates) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(
                                    target: "anim.runner",
                                    animation = self.name,
                                    error = %e,
                                    "emitted_invalid_frame"
                                );
                                break StopReason::Faulted;
                            }
                        };
                    if let Err(e) = self.manager.submit(frame).await {
                        warn!(
                            target: "anim.runner",
                            animation = self.name,
                            error = %e,
                            "submit_rejected"
                        );
                        break StopReason::Faulted;
                    }
                }
                Ok(Step::Idle) => {}
                Ok(Step::Done) => break StopReason::Completed,
                Err(e) => {
                    warn!(
                        target: "anim.runner",
                        animation = self.name,
                        error = %e,
                        "step_fault"
                    );
                    break StopReason::Faulted;
                }
            }
        };
        self.finished.store(true, Ordering::SeqCst);
        if reason != StopReason::Requested {
            // Self-terminated: publish (unless a concurrent stop() already
            // did) and clear the slot if nobody is holding it.
            if !self.published.swap(true, Ordering::SeqCst) {
                self.bus.publish(Event::AnimationStopped {
                    zone: self.zone,
                    reason,
                });
            }
            if let Ok(mut current) = self.slot.current.try_lock() {
                let ours = current
                    .as_ref()
                    .map(|r| r.task_name == self.task_name)
                    .unwrap_or(false);
                if ours {
                    *current = None;
                }
            }
        }
        debug!(
            target: "anim.runner",
            zone = %self.zone,
            animation = self.name,
            reason = reason.as_str(),
            "runner_stopped"
        );
    }
}
