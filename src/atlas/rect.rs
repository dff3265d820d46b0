use glam::{UVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in atlas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn origin(&self) -> UVec2 {
        UVec2::new(self.x, self.y)
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the two rectangles share a non-zero area.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return Rect::new(x0, y0, 0, 0);
        }
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// The sub-rectangle of the atlas granted to one sprite by a repack.
///
/// A rotated region stores the sprite turned 90 degrees clockwise, so its
/// `rect` has the requested width and height swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Region {
    pub rect: Rect,
    pub rotated: bool,
}

impl Region {
    pub const fn new(rect: Rect, rotated: bool) -> Self {
        Self { rect, rotated }
    }

    /// Size of the content stored in this region, before rotation.
    pub fn content_size(&self) -> UVec2 {
        if self.rotated {
            UVec2::new(self.rect.height, self.rect.width)
        } else {
            self.rect.size()
        }
    }

    /// Normalized texture coordinates of the region inside an atlas of `atlas_size`.
    pub fn uv_bounds(&self, atlas_size: UVec2) -> (Vec2, Vec2) {
        if atlas_size.x == 0 || atlas_size.y == 0 {
            return (Vec2::ZERO, Vec2::ZERO);
        }
        let inv = Vec2::ONE / atlas_size.as_vec2();
        let min = self.rect.origin().as_vec2() * inv;
        let max = (self.rect.origin() + self.rect.size()).as_vec2() * inv;
        (min, max)
    }
}
