//! Job records and what each kind of job does.
//!
//! A job's record stays in the scheduler's pool until the job and all of
//! its descendants are done. `pending` counts the job's own hold plus one
//! per live child; whoever drops it to zero completes the job and then
//! releases the parent. Stages are records that never run: they only
//! gather the line jobs of a split and act once those are all done.

use crate::decompose::{self, Decision};
use crate::generation::Generation;
use crate::kernel::PixelKernel;
use crate::scheduler::JobContext;
use serde::{Deserialize, Serialize};
use splitbrot_core::PixelRect;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

pub type JobId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Root of a generation: computes the image border.
    Main,
    Stage(Stage),
    Row(PixelRect),
    Column(PixelRect),
    Fill { rect: PixelRect, value: u32 },
    /// Computes every pixel of the rectangle, one row job per line.
    FullRect(PixelRect),
    /// Decomposes a rectangle whose border is known.
    RectContents(PixelRect),
}

/// Deferred continuations, run when every child has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// The image border is done; decompose the whole image.
    Border(PixelRect),
    /// The split line is done; decompose both halves.
    Split { near: PixelRect, far: PixelRect },
}

impl JobKind {
    /// A row or column job for a one-pixel-thick line.
    pub fn line(rect: PixelRect) -> Self {
        if rect.height == 1 {
            JobKind::Row(rect)
        } else {
            JobKind::Column(rect)
        }
    }

    /// The pixels this job writes, used to order the ready queue.
    pub fn rect(&self) -> Option<PixelRect> {
        match *self {
            JobKind::Main | JobKind::Stage(_) => None,
            JobKind::Row(rect)
            | JobKind::Column(rect)
            | JobKind::Fill { rect, .. }
            | JobKind::FullRect(rect)
            | JobKind::RectContents(rect) => Some(rect),
        }
    }
}

pub struct JobRecord {
    pub(crate) parent: Option<JobId>,
    pub(crate) pending: AtomicU32,
    pub(crate) generation: Arc<Generation>,
    pub(crate) kind: JobKind,
}

impl JobRecord {
    pub fn new(parent: Option<JobId>, generation: Arc<Generation>, kind: JobKind) -> Self {
        Self {
            parent,
            pending: AtomicU32::new(1),
            generation,
            kind,
        }
    }
}

/// How the pixels of a presented rectangle were produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentSource {
    Line,
    Fill(u32),
}

/// A rectangle whose pixels changed and should be redrawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presented {
    pub rect: PixelRect,
    pub source: PresentSource,
}

pub(crate) fn execute(ctx: &mut JobContext<'_>, kind: &JobKind) -> Option<Presented> {
    match *kind {
        JobKind::Main => {
            main(ctx);
            None
        }
        // stages are never queued
        JobKind::Stage(_) => None,
        JobKind::Row(rect) | JobKind::Column(rect) => line(ctx, rect),
        JobKind::Fill { rect, value } => fill(ctx, rect, value),
        JobKind::FullRect(rect) => {
            full_rect(ctx, rect);
            None
        }
        JobKind::RectContents(rect) => {
            rect_contents(ctx, rect);
            None
        }
    }
}

/// Runs when the last child of a stage is released. New jobs become
/// children of the stage's parent.
pub(crate) fn complete_stage(ctx: &mut JobContext<'_>, stage: &Stage) {
    let generation = ctx.generation();
    let policy = generation.policy();
    match *stage {
        Stage::Border(rect) => {
            if generation.is_terminating() {
                generation.image().mark_stale(rect.interior(), &policy);
            } else {
                ctx.spawn(JobKind::RectContents(rect));
            }
        }
        Stage::Split { near, far } => {
            if generation.is_terminating() {
                generation.image().mark_stale(near.interior(), &policy);
                generation.image().mark_stale(far.interior(), &policy);
            } else {
                // LIFO: the near half runs first
                ctx.spawn(JobKind::RectContents(far));
                ctx.spawn(JobKind::RectContents(near));
            }
        }
    }
}

fn main(ctx: &mut JobContext<'_>) {
    let generation = ctx.generation();
    let rect = generation.image().rect();
    if generation.is_terminating() {
        generation.image().mark_stale(rect, &generation.policy());
        return;
    }
    let stage = ctx.open_stage(Stage::Border(rect));
    for border in decompose::border_lines(rect) {
        ctx.spawn_into(stage, JobKind::line(border));
    }
}

fn rect_contents(ctx: &mut JobContext<'_>, rect: PixelRect) {
    let generation = ctx.generation();
    if generation.is_terminating() {
        generation.image().mark_stale(rect.interior(), &generation.policy());
        return;
    }
    let decision = decompose::decide(
        generation.image(),
        rect,
        generation.max_iter(),
        generation.limits(),
        generation.priority_point(),
    );
    log::trace!("{:?}: {:?}", rect, decision);
    match decision {
        Decision::Empty => {}
        Decision::Fill(value) => ctx.spawn(JobKind::Fill {
            rect: rect.interior(),
            value,
        }),
        Decision::FullCompute => ctx.spawn(JobKind::FullRect(rect.interior())),
        Decision::Bisect { line, near, far } => {
            let stage = ctx.open_stage(Stage::Split { near, far });
            ctx.spawn_into(stage, JobKind::line(line));
        }
    }
}

fn full_rect(ctx: &mut JobContext<'_>, rect: PixelRect) {
    let generation = ctx.generation();
    for y in rect.y..rect.bottom() {
        if generation.is_terminating() {
            let rest = PixelRect::new(rect.x, y, rect.width, rect.bottom() - y);
            generation.image().mark_stale(rest, &generation.policy());
            return;
        }
        ctx.spawn(JobKind::Row(PixelRect::row(rect.x, y, rect.width)));
    }
}

fn fill(ctx: &mut JobContext<'_>, rect: PixelRect, value: u32) -> Option<Presented> {
    let generation = ctx.generation();
    let image = generation.image();
    let policy = generation.policy();
    if generation.is_terminating() {
        image.mark_stale(rect, &policy);
        return None;
    }
    let mut filled = 0;
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            if policy.needs_recalc(image.get(x, y)) {
                image.set(x, y, value);
                filled += 1;
            }
        }
    }
    image.add_computed(filled);
    (filled > 0).then_some(Presented {
        rect,
        source: PresentSource::Fill(value),
    })
}

/// One pixel-thick span being walked from `next` to `end`.
struct Span {
    rect: PixelRect,
    horizontal: bool,
}

impl Span {
    fn new(rect: PixelRect) -> Self {
        Self {
            rect,
            horizontal: rect.height == 1,
        }
    }

    fn start(&self) -> u32 {
        if self.horizontal {
            self.rect.x
        } else {
            self.rect.y
        }
    }

    fn pixel(&self, position: u32) -> (u32, u32) {
        if self.horizontal {
            (position, self.rect.y)
        } else {
            (self.rect.x, position)
        }
    }

    fn segment(&self, from: u32, to: u32) -> PixelRect {
        if self.horizontal {
            PixelRect::row(from, self.rect.y, to - from)
        } else {
            PixelRect::column(self.rect.x, from, to - from)
        }
    }
}

/// Computes the pixels of a row or column that need it, a kernel batch
/// at a time. While other workers sit idle the back half of what is
/// left is handed to them as a sibling job.
fn line(ctx: &mut JobContext<'_>, rect: PixelRect) -> Option<Presented> {
    let generation = ctx.generation();
    let image = generation.image();
    let policy = generation.policy();
    let span = Span::new(rect);
    let mut kernel = PixelKernel::new(generation.mapping(), policy.max_iter);
    let batch = kernel.batch_size() as u32;

    let start = span.start();
    let mut next = start;
    let mut end = start + if span.horizontal { rect.width } else { rect.height };
    let mut pixels = Vec::with_capacity(batch as usize);
    let mut counts = vec![0; batch as usize];
    let mut computed = 0;

    while next < end {
        if generation.is_terminating() {
            image.mark_stale(span.segment(next, end), &policy);
            break;
        }
        let remaining = end - next;
        if remaining > 2 * batch && ctx.workers_idle() {
            let keep = (remaining / 2).div_ceil(batch) * batch;
            if ctx.spawn_sibling(JobKind::line(span.segment(next + keep, end))) {
                end = next + keep;
            }
        }

        let batch_start = next;
        pixels.clear();
        while pixels.len() < batch as usize && next < end {
            let (x, y) = span.pixel(next);
            if policy.needs_recalc(image.get(x, y)) {
                pixels.push((x, y));
            }
            next += 1;
        }
        if pixels.is_empty() {
            continue;
        }
        if !kernel.evaluate(&pixels, &mut counts, generation.terminate_flag()) {
            image.mark_stale(span.segment(batch_start, end), &policy);
            break;
        }
        for (&(x, y), &count) in pixels.iter().zip(&counts) {
            image.set(x, y, count);
        }
        computed += pixels.len() as u64;
    }

    image.add_computed(computed);
    image.add_iterated(computed);
    (computed > 0).then(|| Presented {
        rect: span.segment(start, end),
        source: PresentSource::Line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_kind_follows_orientation() {
        assert_eq!(
            JobKind::line(PixelRect::row(0, 3, 10)),
            JobKind::Row(PixelRect::row(0, 3, 10))
        );
        assert_eq!(
            JobKind::line(PixelRect::column(4, 0, 10)),
            JobKind::Column(PixelRect::column(4, 0, 10))
        );
    }

    #[test]
    fn only_pixel_jobs_have_a_rect() {
        assert_eq!(JobKind::Main.rect(), None);
        let stage = Stage::Border(PixelRect::new(0, 0, 4, 4));
        assert_eq!(JobKind::Stage(stage).rect(), None);
        let rect = PixelRect::new(1, 2, 3, 4);
        assert_eq!(JobKind::FullRect(rect).rect(), Some(rect));
        assert_eq!(JobKind::Fill { rect, value: 9 }.rect(), Some(rect));
    }

    #[test]
    fn span_segments_follow_the_axis() {
        let column = Span::new(PixelRect::column(7, 2, 10));
        assert_eq!(column.start(), 2);
        assert_eq!(column.pixel(5), (7, 5));
        assert_eq!(column.segment(4, 9), PixelRect::column(7, 4, 5));
    }
}
