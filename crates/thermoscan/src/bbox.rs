//! Axis-aligned pixel boxes in `[x, y, w, h]` form.

use serde_json::Value;

use crate::error::ValidationError;

/// Axis-aligned bounding box in image pixels.
///
/// `x`/`y` are the top-left corner; the box covers columns `x..x + w` and
/// rows `y..y + h`. Serialized as the JSON array `[x, y, w, h]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Value", into = "[u32; 4]")]
pub struct BBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BBox {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Exclusive right edge.
    pub fn x2(&self) -> u32 {
        self.x + self.w
    }

    /// Exclusive bottom edge.
    pub fn y2(&self) -> u32 {
        self.y + self.h
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn diagonal(&self) -> f64 {
        (self.w as f64).hypot(self.h as f64)
    }

    /// Integer box center, `(x + w/2, y + h/2)`.
    pub fn centroid(&self) -> [u32; 2] {
        [self.x + self.w / 2, self.y + self.h / 2]
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x2() && y >= self.y && y < self.y2()
    }

    /// Minimal box enclosing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BBox {
            x,
            y,
            w: self.x2().max(other.x2()) - x,
            h: self.y2().max(other.y2()) - y,
        }
    }

    /// Intersection-over-union of the two boxes.
    pub fn iou(&self, other: &BBox) -> f64 {
        let iw = self.x2().min(other.x2()).saturating_sub(self.x.max(other.x)) as f64;
        let ih = self.y2().min(other.y2()).saturating_sub(self.y.max(other.y)) as f64;
        let inter = iw * ih;
        let union = self.area() as f64 + other.area() as f64 - inter;
        inter / (union + 1e-6)
    }

    /// Edge-to-edge separation in pixels.
    ///
    /// Each axis contributes the distance between the facing edges, or 0 when
    /// the boxes overlap on that axis; the larger of the two is returned, so
    /// the result is 0 only for touching or overlapping boxes.
    pub fn gap(&self, other: &BBox) -> u32 {
        let dx = other
            .x
            .saturating_sub(self.x2())
            .max(self.x.saturating_sub(other.x2()));
        let dy = other
            .y
            .saturating_sub(self.y2())
            .max(self.y.saturating_sub(other.y2()));
        dx.max(dy)
    }

    /// Clamp into a `width × height` image, keeping at least one pixel.
    ///
    /// The origin is pulled inside the image and the extent shrunk so the box
    /// ends at the image border.
    pub fn clamped_to(&self, width: u32, height: u32) -> BBox {
        let x = self.x.min(width.saturating_sub(1));
        let y = self.y.min(height.saturating_sub(1));
        BBox {
            x,
            y,
            w: self.w.min(width.saturating_sub(x)).max(1),
            h: self.h.min(height.saturating_sub(y)).max(1),
        }
    }
}

impl From<BBox> for [u32; 4] {
    fn from(b: BBox) -> Self {
        [b.x, b.y, b.w, b.h]
    }
}

impl TryFrom<[u32; 4]> for BBox {
    type Error = ValidationError;

    fn try_from([x, y, w, h]: [u32; 4]) -> Result<Self, Self::Error> {
        if w == 0 || h == 0 {
            return Err(ValidationError::new(format!(
                "bbox [{x}, {y}, {w}, {h}] has zero width or height"
            )));
        }
        Ok(BBox { x, y, w, h })
    }
}

impl TryFrom<Value> for BBox {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Array(items) = value else {
            return Err(ValidationError::new(format!(
                "bbox must be an array [x, y, w, h], got {value}"
            )));
        };
        if items.len() != 4 {
            return Err(ValidationError::new(format!(
                "bbox must have 4 elements, got {}",
                items.len()
            )));
        }
        let mut out = [0u32; 4];
        for (slot, item) in out.iter_mut().zip(&items) {
            *slot = pixel_coordinate(item)?;
        }
        BBox::try_from(out)
    }
}

fn pixel_coordinate(v: &Value) -> Result<u32, ValidationError> {
    let n = v
        .as_f64()
        .ok_or_else(|| ValidationError::new(format!("bbox element {v} is not numeric")))?;
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(ValidationError::new(format!(
            "bbox element {v} is not a non-negative integer pixel coordinate"
        )));
    }
    Ok(n as u32)
}
