// THEORY:
// A `Region` is one connected island of in-range pixels found in a single mask.
// Like the other data containers in `core_modules`, it is "dumb": it summarizes
// a component (its outline, its bounding rectangle, its area) and knows nothing
// about other frames. Regions are rebuilt from scratch on every frame.

/// A pixel coordinate, x to the right and y downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle given by its top-left corner and size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The smallest rectangle holding both inclusive corners.
    pub fn from_corners(top_left: Point, bottom_right: Point) -> Self {
        Self {
            x: top_left.x,
            y: top_left.y,
            width: bottom_right.x - top_left.x + 1,
            height: bottom_right.y - top_left.y + 1,
        }
    }

    /// Inclusive right-most column. Only meaningful for non-empty rectangles.
    pub fn right(&self) -> u32 {
        self.x + self.width.saturating_sub(1)
    }

    /// Inclusive bottom-most row. Only meaningful for non-empty rectangles.
    pub fn bottom(&self) -> u32 {
        self.y + self.height.saturating_sub(1)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The part of this rectangle lying inside a `width` x `height` image.
    pub fn clipped(&self, width: u32, height: u32) -> BoundingRect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = self.x.saturating_add(self.width).min(width);
        let bottom = self.y.saturating_add(self.height).min(height);
        BoundingRect::new(x, y, right - x, bottom - y)
    }
}

/// A single connected foreground component of a mask.
#[derive(Debug, Clone)]
pub struct Region {
    /// Position of this region in the extraction order of its mask. Not persistent.
    pub id: usize,
    /// Outer boundary, traced clockwise from the component's first pixel in raster order.
    pub boundary: Vec<Point>,
    /// Minimal rectangle covering every pixel of the component.
    pub bounds: BoundingRect,
    /// Number of foreground pixels in the component.
    pub pixel_count: usize,
}
