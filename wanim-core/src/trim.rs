//! Bounding boxes of visible raster content

/// Checks if every pixel of an RGBA8 buffer has zero alpha
pub fn is_fully_transparent(rgba: &[u8]) -> bool {
    rgba.chunks_exact(4).all(|pixel| pixel[3] == 0)
}

/// Tightest rectangle containing all non-transparent pixels.
///
/// An empty rectangle (nothing visible) has `NaN` offsets and zero size.
#[derive(Debug, Clone, Copy)]
pub struct TrimmingRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl TrimmingRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle of fully transparent content
    pub fn empty() -> Self {
        Self::new(f64::NAN, f64::NAN, 0.0, 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }

    /// Smallest rectangle containing both rectangles
    pub fn merge(&self, other: &TrimmingRect) -> TrimmingRect {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => TrimmingRect::empty(),
            (true, false) => *other,
            (false, true) => *self,
            (false, false) => {
                let x = self.x.min(other.x);
                let y = self.y.min(other.y);
                let right = (self.x + self.width).max(other.x + other.width);
                let bottom = (self.y + self.height).max(other.y + other.height);
                TrimmingRect::new(x, y, right - x, bottom - y)
            }
        }
    }

    /// Measures the visible content of a `width`-pixel-wide RGBA8 buffer
    pub fn of_rgba(width: u32, rgba: &[u8]) -> TrimmingRect {
        if width == 0 {
            return TrimmingRect::empty();
        }

        let width = width as usize;
        let mut bounds: Option<(usize, usize, usize, usize)> = None;

        for (i, pixel) in rgba.chunks_exact(4).enumerate() {
            if pixel[3] == 0 {
                continue;
            }
            let (x, y) = (i % width, i / width);
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((left, top, right, bottom)) => {
                    (left.min(x), top.min(y), right.max(x), bottom.max(y))
                }
            });
        }

        match bounds {
            None => TrimmingRect::empty(),
            Some((left, top, right, bottom)) => TrimmingRect::new(
                left as f64,
                top as f64,
                (right - left + 1) as f64,
                (bottom - top + 1) as f64,
            ),
        }
    }
}

impl Default for TrimmingRect {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for TrimmingRect {
    fn eq(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() && other.is_empty();
        }
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
    }
}
