//! The frame manager: single render authority over one or more strips.
//!
//! Locking model:
//! * One `tokio::sync::Mutex` per strip (the drain lock) guards that
//!   strip's queues, its zone render state and the port. Submitters hold
//!   it for the queue append only; the render loop holds it across drain,
//!   merge, commit and state update. Its RAII guard makes `submit`
//!   cancellation-safe: an aborted submitter can never leave the lock
//!   held.
//! * Strip registration lives in one `std::sync::RwLock`, read-mostly and
//!   never held across an await.
//!
//! Frame validation runs entirely before the drain lock is taken, so the
//! critical section on the submit path is strictly the bounded append.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use core_events::{JoinOutcome, TaskRegistry};
use core_frame::{Frame, FrameSource, InvalidFrame};
use core_pixel::Color;
use core_strip::ZoneStrip;
use core_zone::{StripId, ZoneId, ZoneMap, ZoneUpdate};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::loop_task::{RenderLoopTask, shutdown_pair};
use crate::merge::select_and_merge;
use crate::queues::{PriorityQueues, QueueDepths};
use crate::state::ZoneRenderState;
use crate::{MetricsSnapshot, RenderMetrics, RenderSettings, RenderShutdown};

/// Registry name of the render loop task.
pub const RENDER_LOOP_TASK: &str = "render-loop";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("zone {zone} is already mapped on strip {strip}")]
    ZoneTaken { zone: ZoneId, strip: StripId },
}

/// Diagnostic copy of one zone's render state.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStateSnapshot {
    pub pixels: Vec<Color>,
    pub last_source: Option<FrameSource>,
    pub last_update: Option<Instant>,
    pub dirty: bool,
}

struct StripState {
    strip: ZoneStrip,
    queues: PriorityQueues,
    zones: HashMap<ZoneId, ZoneRenderState>,
    /// Selection committed by the most recent successful commit; the
    /// identity-skip comparison runs against this.
    last_committed: Vec<Arc<Frame>>,
}

struct StripEntry {
    id: StripId,
    /// Immutable copy for validation outside the drain lock.
    map: ZoneMap,
    /// Queue depths, readable when the drain lock is not.
    depths: Arc<QueueDepths>,
    state: tokio::sync::Mutex<StripState>,
}

#[derive(Default)]
struct Registrations {
    strips: HashMap<StripId, Arc<StripEntry>>,
    routes: HashMap<ZoneId, StripId>,
}

struct ManagerInner {
    settings: RenderSettings,
    registry: Arc<TaskRegistry>,
    metrics: RenderMetrics,
    registrations: RwLock<Registrations>,
    loop_ctl: StdMutex<Option<RenderShutdown>>,
    running: AtomicBool,
}

/// Cheap-to-clone handle on the render core.
#[derive(Clone)]
pub struct FrameManager {
    inner: Arc<ManagerInner>,
}

impl FrameManager {
    pub fn new(settings: RenderSettings, registry: Arc<TaskRegistry>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                settings,
                registry,
                metrics: RenderMetrics::default(),
                registrations: RwLock::new(Registrations::default()),
                loop_ctl: StdMutex::new(None),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.inner.settings
    }

    /// Add a strip and initialize its zones to all-black. Idempotent by
    /// strip identity; re-registering an id is a no-op.
    pub fn register_strip(&self, strip: ZoneStrip) -> Result<(), RegisterError> {
        let id = strip.id();
        let mut reg = self.reg_write();
        if reg.strips.contains_key(&id) {
            debug!(target: "render", strip = %id, "strip_already_registered");
            return Ok(());
        }
        for (zone, _) in strip.map().zones() {
            if let Some(other) = reg.routes.get(&zone) {
                return Err(RegisterError::ZoneTaken {
                    zone,
                    strip: *other,
                });
            }
        }
        let map = strip.map().clone();
        let mut zones = HashMap::new();
        for (zone, span) in map.zones() {
            zones.insert(zone, ZoneRenderState::new(span.len));
            reg.routes.insert(zone, id);
        }
        let queues = PriorityQueues::new();
        let depths = queues.depths();
        reg.strips.insert(
            id,
            Arc::new(StripEntry {
                id,
                map,
                depths,
                state: tokio::sync::Mutex::new(StripState {
                    strip,
                    queues,
                    zones,
                    last_committed: Vec::new(),
                }),
            }),
        );
        info!(target: "render", strip = %id, "strip_registered");
        Ok(())
    }

    /// Enqueue a frame for its strip.
    ///
    /// Validation (zone routing, per-pixel lengths) happens before the
    /// drain lock; the critical section is the append alone. Cancelling
    /// the call at the lock acquisition point enqueues nothing and leaves
    /// no lock held.
    pub async fn submit(&self, frame: Frame) -> Result<(), InvalidFrame> {
        let entry = self.route(&frame)?;
        for (zone, update) in frame.updates() {
            if let Some(got) = update.pixel_len() {
                // Routing already proved the span exists on this strip.
                let want = entry.map.span(*zone).map(|s| s.len).unwrap_or(0);
                if got != want {
                    return Err(InvalidFrame::PerPixelLength {
                        zone: *zone,
                        want,
                        got,
                    });
                }
            }
        }
        let priority = frame.priority();
        let source = frame.source();
        let frame = Arc::new(frame);
        {
            let mut st = entry.state.lock().await;
            if let Some(evicted) = st.queues.push(frame) {
                self.inner.metrics.record_overflow();
                trace!(
                    target: "render.submit",
                    strip = %entry.id,
                    priority = %evicted.priority(),
                    "queue_overflow_evicted"
                );
            }
        }
        self.inner.metrics.record_submit(priority, source);
        trace!(
            target: "render.submit",
            strip = %entry.id,
            priority = %priority,
            source = %source,
            "frame_submitted"
        );
        Ok(())
    }

    /// Spawn the render loop. Safe to call more than once; only the first
    /// call while stopped has an effect.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let (shutdown, listener) = shutdown_pair();
        let handle = tokio::spawn(RenderLoopTask::new(self.clone(), listener).run());
        self.inner.registry.register(RENDER_LOOP_TASK, handle);
        *self.lock_ctl() = Some(shutdown);
    }

    /// Signal the loop, join it within the stop timeout, then optionally
    /// flush one all-black frame per strip. Idempotent.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(shutdown) = self.lock_ctl().take() {
            shutdown.signal();
        }
        match self
            .inner
            .registry
            .join(RENDER_LOOP_TASK, self.inner.settings.stop_timeout)
            .await
        {
            JoinOutcome::Joined | JoinOutcome::Unknown => {}
            JoinOutcome::TimedOut => {
                warn!(target: "render.loop", "render_loop_join_timeout");
            }
        }
        if self.inner.settings.blackout_on_stop {
            self.blackout().await;
        }
        info!(target: "render", "manager_stopped");
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Diagnostic snapshot of one zone's render state, taken under the
    /// strip's drain lock. Not for the hot path.
    pub async fn zone_state(&self, zone: ZoneId) -> Option<ZoneStateSnapshot> {
        let entry = self.entry_for_zone(zone)?;
        let st = entry.state.lock().await;
        st.zones.get(&zone).map(|z| ZoneStateSnapshot {
            pixels: z.pixels().to_vec(),
            last_source: z.last_source(),
            last_update: z.last_update(),
            dirty: z.dirty(),
        })
    }

    /// One selection/merge/commit pass over every registered strip.
    /// Invoked by the render loop each tick; public so harnesses can drive
    /// ticks manually.
    pub async fn render_pass(&self) {
        self.inner.metrics.record_tick();
        let entries: Vec<Arc<StripEntry>> =
            self.reg_read().strips.values().cloned().collect();
        for entry in entries {
            self.render_strip(&entry).await;
        }
    }

    async fn render_strip(&self, entry: &StripEntry) {
        let drain_timeout = self.inner.settings.drain_timeout;
        let mut st = match tokio::time::timeout(drain_timeout, entry.state.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                self.inner.metrics.record_drain_timeout();
                error!(
                    target: "render.loop",
                    strip = %entry.id,
                    queue_depths = ?entry.depths.snapshot(),
                    "drain_lock_timeout"
                );
                return;
            }
        };
        let now = Instant::now();
        let outcome = match catch_unwind(AssertUnwindSafe(|| {
            select_and_merge(&mut st.queues, now)
        })) {
            Ok(outcome) => outcome,
            Err(_) => {
                self.inner.metrics.record_render_error();
                error!(target: "render.loop", strip = %entry.id, "merge_fault");
                return;
            }
        };
        self.inner.metrics.record_expired(outcome.expired as u64);
        if outcome.is_empty() {
            return;
        }
        if same_selection(&outcome.selected, &st.last_committed) {
            self.inner.metrics.record_commit_skipped();
            trace!(target: "render.loop", strip = %entry.id, "commit_skipped_identity");
            return;
        }
        if let Err(e) = st.strip.build_and_commit(&outcome.updates) {
            self.inner.metrics.record_hw_failure();
            warn!(target: "render.loop", strip = %entry.id, error = %e, "hw_commit_failed");
            return;
        }
        for (zone, source) in &outcome.sources {
            let pixels = st.strip.zone_pixels(*zone);
            if let Some(zs) = st.zones.get_mut(zone) {
                zs.record(pixels, Some(*source), now);
            }
        }
        st.last_committed = outcome.selected;
        self.inner.metrics.record_rendered();
        debug!(
            target: "render.loop",
            strip = %entry.id,
            zones = outcome.updates.len(),
            "frame_committed"
        );
    }

    async fn blackout(&self) {
        let entries: Vec<Arc<StripEntry>> =
            self.reg_read().strips.values().cloned().collect();
        for entry in entries {
            let mut st = entry.state.lock().await;
            let zones: Vec<ZoneId> = st.strip.map().zones().map(|(zone, _)| zone).collect();
            let updates: HashMap<ZoneId, ZoneUpdate> = zones
                .iter()
                .map(|zone| (*zone, ZoneUpdate::Solid(Color::BLACK)))
                .collect();
            match st.strip.build_and_commit(&updates) {
                Ok(()) => {
                    let now = Instant::now();
                    for zone in zones {
                        let pixels = st.strip.zone_pixels(zone);
                        if let Some(zs) = st.zones.get_mut(&zone) {
                            zs.record(pixels, None, now);
                        }
                    }
                    st.last_committed.clear();
                    info!(target: "render", strip = %entry.id, "blackout_flushed");
                }
                Err(e) => {
                    self.inner.metrics.record_hw_failure();
                    warn!(target: "render", strip = %entry.id, error = %e, "blackout_failed");
                }
            }
        }
    }

    fn route(&self, frame: &Frame) -> Result<Arc<StripEntry>, InvalidFrame> {
        let reg = self.reg_read();
        let mut target: Option<StripId> = None;
        for zone in frame.updates().keys() {
            match reg.routes.get(zone) {
                None => return Err(InvalidFrame::UnknownZone { zone: *zone }),
                Some(strip) => match target {
                    None => target = Some(*strip),
                    Some(first) if first != *strip => {
                        return Err(InvalidFrame::CrossStrip {
                            first,
                            second: *strip,
                        });
                    }
                    Some(_) => {}
                },
            }
        }
        // `updates` is non-empty by construction, so target is set.
        let id = target.ok_or(InvalidFrame::EmptyUpdates)?;
        Ok(reg.strips[&id].clone())
    }

    fn entry_for_zone(&self, zone: ZoneId) -> Option<Arc<StripEntry>> {
        let reg = self.reg_read();
        let id = reg.routes.get(&zone)?;
        reg.strips.get(id).cloned()
    }

    fn reg_read(&self) -> std::sync::RwLockReadGuard<'_, Registrations> {
        self.inner
            .registrations
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn reg_write(&self) -> std::sync::RwLockWriteGuard<'_, Registrations> {
        self.inner
            .registrations
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn lock_ctl(&self) -> std::sync::MutexGuard<'_, Option<RenderShutdown>> {
        self.inner.loop_ctl.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn same_selection(a: &[Arc<Frame>], b: &[Arc<Frame>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_frame::FramePriority;
    use core_strip::MemoryPort;
    use core_zone::ZoneSpan;
    use std::time::Duration;

    fn manager(settings: RenderSettings) -> FrameManager {
        FrameManager::new(settings, Arc::new(TaskRegistry::new()))
    }

    fn main_strip() -> ZoneStrip {
        let map = ZoneMap::new(
            20,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 15)),
                (ZoneId::Lamp, ZoneSpan::new(15, 5)),
            ],
        )
        .expect("valid map");
        ZoneStrip::new(StripId::Main, map, Box::new(MemoryPort::new(20))).expect("lengths agree")
    }

    fn preview_strip() -> ZoneStrip {
        let map = ZoneMap::new(10, [(ZoneId::Preview, ZoneSpan::new(0, 10))]).expect("valid map");
        ZoneStrip::new(StripId::Preview, map, Box::new(MemoryPort::new(10)))
            .expect("lengths agree")
    }

    #[tokio::test]
    async fn register_is_idempotent_by_strip_id() {
        let m = manager(RenderSettings::default());
        m.register_strip(main_strip()).expect("first registration");
        m.register_strip(main_strip()).expect("second is a no-op");
        assert!(m.zone_state(ZoneId::Floor).await.is_some());
    }

    #[tokio::test]
    async fn register_rejects_zone_taken_by_other_strip() {
        let m = manager(RenderSettings::default());
        m.register_strip(main_strip()).expect("register main");
        let stolen = ZoneMap::new(5, [(ZoneId::Floor, ZoneSpan::new(0, 5))]).expect("valid map");
        let strip = ZoneStrip::new(StripId::Preview, stolen, Box::new(MemoryPort::new(5)))
            .expect("lengths agree");
        let err = m.register_strip(strip).unwrap_err();
        assert_eq!(
            err,
            RegisterError::ZoneTaken {
                zone: ZoneId::Floor,
                strip: StripId::Main
            }
        );
    }

    #[tokio::test]
    async fn submit_rejects_unknown_zone_when_nothing_registered() {
        let m = manager(RenderSettings::default());
        let frame = Frame::solid(
            ZoneId::Floor,
            Color::RED,
            FramePriority::Manual,
            FrameSource::Manual,
            Duration::from_secs(1),
        )
        .expect("valid frame");
        assert_eq!(
            m.submit(frame).await.unwrap_err(),
            InvalidFrame::UnknownZone {
                zone: ZoneId::Floor
            }
        );
    }

    #[tokio::test]
    async fn submit_rejects_cross_strip_updates() {
        let m = manager(RenderSettings::default());
        m.register_strip(main_strip()).expect("register main");
        m.register_strip(preview_strip()).expect("register preview");
        let frame = Frame::multi(
            [
                (ZoneId::Floor, Color::RED),
                (ZoneId::Preview, Color::GREEN),
            ],
            FramePriority::Manual,
            FrameSource::Manual,
            Duration::from_secs(1),
        )
        .expect("valid frame");
        assert!(matches!(
            m.submit(frame).await.unwrap_err(),
            InvalidFrame::CrossStrip { .. }
        ));
    }

    #[tokio::test]
    async fn submit_rejects_per_pixel_length_mismatch() {
        let m = manager(RenderSettings::default());
        m.register_strip(main_strip()).expect("register main");
        let frame = Frame::per_pixel(
            ZoneId::Lamp,
            vec![Color::GREEN; 4],
            FramePriority::Animation,
            FrameSource::Animation,
            Duration::from_secs(1),
        )
        .expect("valid frame");
        assert_eq!(
            m.submit(frame).await.unwrap_err(),
            InvalidFrame::PerPixelLength {
                zone: ZoneId::Lamp,
                want: 5,
                got: 4
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drain_lock_timeout_skips_tick() {
        let settings = RenderSettings {
            drain_timeout: Duration::from_millis(50),
            ..RenderSettings::default()
        };
        let m = manager(settings);
        m.register_strip(main_strip()).expect("register main");
        let entry = m.entry_for_zone(ZoneId::Floor).expect("entry");
        let guard = entry.state.lock().await;
        m.render_pass().await;
        drop(guard);
        let snap = m.metrics();
        assert_eq!(snap.drain_timeouts, 1);
        assert_eq!(snap.rendered, 0);
        // With the lock free again the next pass proceeds.
        m.submit(
            Frame::solid(
                ZoneId::Floor,
                Color::RED,
                FramePriority::Manual,
                FrameSource::Manual,
                Duration::from_secs(1),
            )
            .expect("valid frame"),
        )
        .await
        .expect("submit");
        m.render_pass().await;
        assert_eq!(m.metrics().rendered, 1);
    }
}
