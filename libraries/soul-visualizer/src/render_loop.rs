//! Frame loop driving the renderer
//!
//! The host owns the real frame callback (display link, `requestAnimationFrame`,
//! a game loop). The loop asks it for one frame at a time through
//! [`FrameScheduler`] and stops asking while there is nothing to draw.

use crate::canvas::Canvas;
use crate::renderer::{FrameOutcome, VisualizerRenderer};
use soul_playback::SharedAnalyser;
use std::time::Duration;
use tracing::{debug, trace};

/// Handle to a requested frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host frame callback
pub trait FrameScheduler {
    /// Ask for one frame callback
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraw a requested frame
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Mount-scoped render loop
#[derive(Debug)]
pub struct RenderLoop<S: FrameScheduler> {
    renderer: VisualizerRenderer,
    scheduler: S,
    pending: Option<FrameHandle>,
    mounted: bool,
}

impl<S: FrameScheduler> RenderLoop<S> {
    /// Wrap a renderer; nothing is requested until mounted
    pub fn new(renderer: VisualizerRenderer, scheduler: S) -> Self {
        Self {
            renderer,
            scheduler,
            pending: None,
            mounted: false,
        }
    }

    /// Start rendering onto a surface of the given size
    ///
    /// No frame is requested until an analyser is attached.
    pub fn mount(&mut self, width: f32, height: f32) {
        self.mounted = true;
        self.renderer.resize(width, height);
        self.request_if_ready();
    }

    /// Stop rendering and cancel every pending callback
    pub fn unmount(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
        self.renderer.cancel_timers();
        self.mounted = false;
        debug!("Visualizer unmounted");
    }

    /// Surface size changed
    pub fn resize(&mut self, width: f32, height: f32) {
        if self.mounted {
            self.renderer.resize(width, height);
        }
    }

    /// Attach the analyser once the audio graph exists, or detach it
    pub fn set_analyser(&mut self, analyser: Option<SharedAnalyser>) {
        self.renderer.set_analyser(analyser);
        self.request_if_ready();
    }

    /// Frame callback from the host
    ///
    /// Callbacks for a handle that is no longer pending are ignored.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        now: Duration,
        canvas: &mut dyn Canvas,
    ) -> FrameOutcome {
        if self.pending != Some(handle) || !self.mounted {
            trace!(?handle, "Ignoring stale frame");
            return FrameOutcome::Idle;
        }
        self.pending = None;

        let outcome = self.renderer.render(now, canvas);
        if outcome == FrameOutcome::Drawn {
            self.pending = Some(self.scheduler.request_frame());
        } else {
            debug!("No analyser, render loop parked");
        }
        outcome
    }

    /// Whether the loop is mounted
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether a frame callback is outstanding
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Renderer being driven
    pub fn renderer(&self) -> &VisualizerRenderer {
        &self.renderer
    }

    /// Host frame scheduler
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    fn request_if_ready(&mut self) {
        if self.mounted && self.pending.is_none() && self.renderer.has_analyser() {
            self.pending = Some(self.scheduler.request_frame());
        }
    }
}

impl<S: FrameScheduler> Drop for RenderLoop<S> {
    fn drop(&mut self) {
        if self.mounted {
            self.unmount();
        }
    }
}
