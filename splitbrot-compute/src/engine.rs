//! The coordinator the view layer talks to.
//!
//! Owns the image, the current view and cap, and the scheduler. Every
//! change to shared state first cancels a running generation, so the
//! workers never see the image change under them.

use crate::error::EngineError;
use crate::generation::{Generation, SplitLimits};
use crate::image::Image;
use crate::job::Presented;
use crate::mapping::PointMapping;
use crate::scheduler::Scheduler;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use splitbrot_core::{EngineConfig, PixelRect, RecalcPolicy, ViewParams, ENGINE_DEFAULTS};
use std::sync::Arc;

/// What changed on screen since the last call to
/// [`Engine::take_updates`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rects")]
pub enum Updates {
    Nothing,
    /// Too much changed to track; redraw everything.
    FullFrame,
    Rects(Vec<PixelRect>),
}

pub struct Engine {
    config: EngineConfig,
    scheduler: Scheduler,
    image: Arc<Image>,
    view: ViewParams,
    max_iter: u32,
    /// Cap the stored counts were computed with, when a raised cap still
    /// has to be applied; 0 otherwise.
    recalc_limit: u32,
    priority: (i32, i32),
    generation: Option<Arc<Generation>>,
    expected: u64,
    /// Pixels changed outside any job, so the next update is a full frame.
    full_frame: bool,
}

impl Engine {
    /// An engine showing the default view on a `width × height` image.
    pub fn new(config: EngineConfig, width: u32, height: u32) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::EmptyImage(width, height));
        }
        let view = ENGINE_DEFAULTS.default_view(width, height)?;
        let scheduler = Scheduler::new(config.worker_threads)?;
        Ok(Self {
            config,
            scheduler,
            image: Arc::new(Image::new(width, height)),
            view,
            max_iter: ENGINE_DEFAULTS.default_max_iter,
            recalc_limit: 0,
            priority: ((width / 2) as i32, (height / 2) as i32),
            generation: None,
            expected: 0,
            full_frame: true,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn view(&self) -> &ViewParams {
        &self.view
    }

    pub fn max_iter(&self) -> u32 {
        self.max_iter
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// The generation started last, kept after it ends.
    pub fn generation(&self) -> Option<&Arc<Generation>> {
        self.generation.as_ref()
    }

    /// A fresh, entirely dirty image of the new size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::EmptyImage(width, height));
        }
        self.cancel_execution();
        self.image = Arc::new(Image::new(width, height));
        self.recalc_limit = 0;
        self.drain_presented();
        self.full_frame = true;
        info!("resized to {width}x{height}");
        Ok(())
    }

    /// Moves to a new view. The old image, reprojected, stays visible as
    /// a stale preview until the pixels are recomputed.
    pub fn set_view(&mut self, view: ViewParams) {
        self.cancel_execution();
        if view.precision != self.view.precision {
            debug!("precision {:?} -> {:?}", self.view.precision, view.precision);
        }
        self.image = Arc::new(self.image.rescaled_preview(&self.view, &view));
        self.view = view;
        self.recalc_limit = 0;
        self.full_frame = true;
    }

    /// Forces every pixel to be recomputed, keeping the current counts
    /// visible as a stale preview.
    pub fn invalidate(&mut self) {
        self.cancel_execution();
        self.image.invalidate_all();
        self.recalc_limit = 0;
        self.full_frame = true;
    }

    /// Changes the cap, brought into the supported range. Raising it
    /// recomputes only the pixels that sat at the old cap; lowering it
    /// needs no computation at all.
    pub fn set_max_iter(&mut self, requested: u32) {
        let max_iter = ENGINE_DEFAULTS.clamp_max_iter(requested);
        if max_iter == self.max_iter {
            return;
        }
        self.cancel_execution();
        if max_iter > self.max_iter {
            self.recalc_limit = match self.recalc_limit {
                0 => self.max_iter,
                limit => limit.min(self.max_iter),
            };
        } else {
            self.image.clamp_to_cap(max_iter);
            if self.recalc_limit >= max_iter {
                self.recalc_limit = 0;
            }
            self.full_frame = true;
        }
        debug!("max_iter {} -> {max_iter}", self.max_iter);
        self.max_iter = max_iter;
    }

    /// Points the remaining work at `(x, y)` on screen.
    pub fn set_priority_point(&mut self, x: i32, y: i32) {
        self.priority = (x, y);
        if let Some(generation) = &self.generation {
            if !self.scheduler.is_finished() {
                generation.set_priority_point(x, y);
                self.scheduler.sort_ready_queue((x, y));
            }
        }
    }

    pub fn start_execution(&mut self) -> Result<(), EngineError> {
        if !self.scheduler.is_finished() {
            return Err(EngineError::AlreadyRunning);
        }
        let (width, height) = (self.width(), self.height());
        let mapping = PointMapping::new(&self.view, width, height)?;
        // records left over from an earlier run collapse into one full frame
        let stale = self.scheduler.discard_presented();
        if stale > 0 {
            debug!("discarded {stale} uncollected presentations");
            self.full_frame = true;
        }
        let policy = RecalcPolicy::new(self.max_iter, self.recalc_limit);
        self.image.reset_counters();
        self.expected = self.image.count_needing_recalc(&policy);
        let generation = Arc::new(Generation::new(
            Arc::clone(&self.image),
            mapping,
            policy,
            SplitLimits::from(&self.config),
            self.priority,
        ));
        self.scheduler.start_execution(Arc::clone(&generation))?;
        self.generation = Some(generation);
        // cancelled work is marked dirty, so later runs only need the bit
        self.recalc_limit = 0;
        info!(
            "generation started: {width}x{height}, max_iter {}, recalc_limit {}, {:?}",
            policy.max_iter, policy.recalc_limit, self.view.precision
        );
        Ok(())
    }

    /// Stops the running generation, if any, and waits for its job tree
    /// to drain. Unfinished pixels are left dirty.
    pub fn cancel_execution(&mut self) {
        self.scheduler.cancel_execution();
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    pub fn wait_until_finished(&self) {
        self.scheduler.wait_until_finished();
        info!(
            "generation finished: {} pixels computed, {} iterated",
            self.image.pixels_computed(),
            self.image.pixels_iterated()
        );
    }

    /// Row-major pixel words; complete once the generation finished.
    pub fn pixels(&self) -> Vec<u32> {
        self.image.snapshot()
    }

    /// Fraction of this generation's pixels already written.
    pub fn progress(&self) -> f64 {
        if self.expected == 0 {
            return 1.0;
        }
        (self.image.pixels_computed() as f64 / self.expected as f64).min(1.0)
    }

    /// Every rectangle jobs presented since the last drain.
    pub fn drain_presented(&mut self) -> Vec<Presented> {
        std::iter::from_fn(|| self.scheduler.pop_presented()).collect()
    }

    pub fn take_updates(&mut self) -> Updates {
        let presented = self.drain_presented();
        if std::mem::take(&mut self.full_frame) {
            Updates::FullFrame
        } else if presented.is_empty() {
            Updates::Nothing
        } else if presented.len() > self.config.full_frame_update_count
            || self.max_iter < self.config.full_frame_below_iter
        {
            Updates::FullFrame
        } else {
            Updates::Rects(presented.into_iter().map(|p| p.rect).collect())
        }
    }

    pub fn live_jobs(&self) -> usize {
        self.scheduler.live_jobs()
    }
}
