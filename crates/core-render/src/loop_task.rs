//! The render loop task.
//!
//! One dedicated tokio task per manager. It owns nothing but the cadence;
//! all shared state is reached through the manager's drain locks. Shutdown
//! is a Notify pair: the manager keeps the signalling half, the task waits
//! on the listening half inside a biased `select!` so a stop request wins
//! over the next timer tick.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::manager::FrameManager;

/// Signalling half of the render loop's shutdown pair.
#[derive(Clone, Debug)]
pub struct RenderShutdown {
    notify: Arc<Notify>,
}

impl RenderShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }
}

pub(crate) fn shutdown_pair() -> (RenderShutdown, ShutdownListener) {
    let notify = Arc::new(Notify::new());
    (
        RenderShutdown {
            notify: notify.clone(),
        },
        ShutdownListener { notify },
    )
}

pub(crate) struct RenderLoopTask {
    manager: FrameManager,
    shutdown: ShutdownListener,
}

impl RenderLoopTask {
    pub(crate) fn new(manager: FrameManager, shutdown: ShutdownListener) -> Self {
        Self { manager, shutdown }
    }

    pub(crate) async fn run(self) {
        let tick = self.manager.settings().tick();
        info!(
            target: "render.loop",
            fps = self.manager.settings().fps,
            tick_ms = tick.as_millis() as u64,
            "render_loop_started"
        );
        let mut interval = tokio::time::interval(tick);
        // A late tick must not fire a second tick back-to-back; drift is
        // dropped, not accumulated.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                _ = interval.tick() => {
                    self.manager.render_pass().await;
                }
            }
        }
        info!(target: "render.loop", "render_loop_stopped");
    }
}
