use serde::{Deserialize, Serialize};

/// Rectangle in pixel space (always u32 coordinates)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Create new pixel rectangle
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A single row segment starting at `(x, y)`.
    pub fn row(x: u32, y: u32, width: u32) -> Self {
        Self::new(x, y, width, 1)
    }

    /// A single column segment starting at `(x, y)`.
    pub fn column(x: u32, y: u32, height: u32) -> Self {
        Self::new(x, y, 1, height)
    }

    /// Calculate area in pixels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Check if point is inside rectangle
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// The rectangle without its one-pixel border, empty when nothing
    /// remains inside.
    pub fn interior(&self) -> PixelRect {
        if self.width < 3 || self.height < 3 {
            return PixelRect::new(self.x + 1, self.y + 1, 0, 0);
        }
        PixelRect::new(self.x + 1, self.y + 1, self.width - 2, self.height - 2)
    }

    /// Squared distance from a point to the closest pixel of the rectangle,
    /// zero when the point lies inside.
    pub fn distance_sq_to(&self, px: i64, py: i64) -> u64 {
        let dx = axis_distance(px, self.x as i64, self.right() as i64);
        let dy = axis_distance(py, self.y as i64, self.bottom() as i64);
        (dx * dx + dy * dy) as u64
    }

    /// Calls `f(x, y)` for every pixel on the one-pixel border.
    pub fn for_each_border_pixel(&self, mut f: impl FnMut(u32, u32)) {
        if self.is_empty() {
            return;
        }
        for x in self.x..self.right() {
            f(x, self.y);
        }
        if self.height > 1 {
            for x in self.x..self.right() {
                f(x, self.bottom() - 1);
            }
        }
        for y in (self.y + 1)..self.bottom().saturating_sub(1) {
            f(self.x, y);
            if self.width > 1 {
                f(self.right() - 1, y);
            }
        }
    }
}

fn axis_distance(p: i64, start: i64, end: i64) -> i64 {
    if p < start {
        start - p
    } else if p >= end {
        p - end + 1
    } else {
        0
    }
}
