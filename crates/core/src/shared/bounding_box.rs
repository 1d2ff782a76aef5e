use serde::{Deserialize, Serialize};

/// Integer pixel rectangle in a photo's coordinate space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    /// Multiplies every coordinate by `factor`, truncating toward zero.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: (self.x as f64 * factor) as i32,
            y: (self.y as f64 * factor) as i32,
            width: (self.width as f64 * factor) as i32,
            height: (self.height as f64 * factor) as i32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection with a `width x height` canvas anchored at the origin.
    pub fn clamped_to(&self, width: u32, height: u32) -> Self {
        let x1 = self.x.clamp(0, width as i32);
        let y1 = self.y.clamp(0, height as i32);
        let x2 = self.x.saturating_add(self.width).clamp(0, width as i32);
        let y2 = self.y.saturating_add(self.height).clamp(0, height as i32);
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// Sub-pixel point, used for eye landmarks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            (self.x as f64 * factor) as f32,
            (self.y as f64 * factor) as f32,
        )
    }
}
