//! Border-driven rectangle decomposition.
//!
//! A rectangle handed to [`decide`] includes its one-pixel border, and
//! every border pixel is already computed. The border decides whether
//! the interior is filled, computed pixel by pixel or bisected by a new
//! line that becomes the shared border of two halves.

use crate::generation::SplitLimits;
use crate::image::Image;
use splitbrot_core::pixel::count;
use splitbrot_core::PixelRect;

/// What the border of a rectangle says about its interior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Border {
    /// Every border pixel escaped after the same number of iterations.
    Uniform(u32),
    /// Every border pixel reached the cap.
    AllCapped,
    Mixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The interior has no pixels.
    Empty,
    Fill(u32),
    FullCompute,
    Bisect {
        line: PixelRect,
        near: PixelRect,
        far: PixelRect,
    },
}

pub fn classify_border(image: &Image, rect: PixelRect, max_iter: u32) -> Border {
    let mut first = None;
    let mut uniform = true;
    rect.for_each_border_pixel(|x, y| {
        let value = count(image.get(x, y));
        match first {
            None => first = Some(value),
            Some(v) if v != value => uniform = false,
            Some(_) => {}
        }
    });
    match first {
        Some(v) if uniform && v >= max_iter => Border::AllCapped,
        Some(v) if uniform => Border::Uniform(v),
        _ => Border::Mixed,
    }
}

pub fn decide(
    image: &Image,
    rect: PixelRect,
    max_iter: u32,
    limits: SplitLimits,
    priority: (i32, i32),
) -> Decision {
    if rect.interior().is_empty() {
        return Decision::Empty;
    }
    match classify_border(image, rect, max_iter) {
        Border::Uniform(v) => return Decision::Fill(v),
        Border::AllCapped
            if rect.width < limits.full_compute_below && rect.height < limits.full_compute_below =>
        {
            return Decision::FullCompute
        }
        _ => {}
    }
    if rect.width < limits.min_bisect_size || rect.height < limits.min_bisect_size {
        return Decision::FullCompute;
    }
    bisect(rect, priority)
}

/// Splits across the longer axis. The split line sits halfway between
/// the middle and the priority point, and each half keeps at least one
/// interior pixel.
fn bisect(rect: PixelRect, (px, py): (i32, i32)) -> Decision {
    let (first, second, line) = if rect.width > rect.height {
        let sx = split_position(rect.x, rect.width, px);
        (
            PixelRect::new(rect.x, rect.y, sx - rect.x + 1, rect.height),
            PixelRect::new(sx, rect.y, rect.right() - sx, rect.height),
            PixelRect::column(sx, rect.y + 1, rect.height - 2),
        )
    } else {
        let sy = split_position(rect.y, rect.height, py);
        (
            PixelRect::new(rect.x, rect.y, rect.width, sy - rect.y + 1),
            PixelRect::new(rect.x, sy, rect.width, rect.bottom() - sy),
            PixelRect::row(rect.x + 1, sy, rect.width - 2),
        )
    };
    let (px, py) = (px as i64, py as i64);
    let (near, far) = if second.distance_sq_to(px, py) < first.distance_sq_to(px, py) {
        (second, first)
    } else {
        (first, second)
    };
    Decision::Bisect { line, near, far }
}

fn split_position(start: u32, len: u32, priority: i32) -> u32 {
    let lo = start as i64 + 2;
    let hi = (start + len) as i64 - 3;
    let middle = (start + len / 2) as i64;
    let target = (priority as i64).clamp(lo, hi);
    ((middle + target) / 2) as u32
}

/// The lines that cover the border of `rect` without overlap: full top
/// and bottom rows, then the side columns between them.
pub fn border_lines(rect: PixelRect) -> Vec<PixelRect> {
    let mut lines = Vec::with_capacity(4);
    if rect.is_empty() {
        return lines;
    }
    lines.push(PixelRect::row(rect.x, rect.y, rect.width));
    if rect.height > 1 {
        lines.push(PixelRect::row(rect.x, rect.bottom() - 1, rect.width));
    }
    if rect.height > 2 {
        lines.push(PixelRect::column(rect.x, rect.y + 1, rect.height - 2));
        if rect.width > 1 {
            lines.push(PixelRect::column(rect.right() - 1, rect.y + 1, rect.height - 2));
        }
    }
    lines
}
