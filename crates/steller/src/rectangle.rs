/// Axis-aligned box given by its extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Rectangle {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// A box centred on `(cx, cy)`.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let (w2, h2) = (width / 2.0, height / 2.0);
        Self::new(cx - w2, cx + w2, cy - h2, cy + h2)
    }

    /// The identity for [`Rectangle::union`].
    pub fn empty() -> Self {
        Self::new(f64::MAX, -f64::MAX, f64::MAX, -f64::MAX)
    }

    /// True for [`Rectangle::empty`] and anything else with inverted extents.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn cx(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    pub fn cy(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Horizontal overlap with `r`, measured from whichever box is further left; 0 if disjoint.
    pub fn overlap_x(&self, r: &Rectangle) -> f64 {
        let ux = self.cx();
        let vx = r.cx();
        if ux <= vx && r.min_x < self.max_x {
            return self.max_x - r.min_x;
        }
        if vx <= ux && self.min_x < r.max_x {
            return r.max_x - self.min_x;
        }
        0.0
    }

    pub fn overlap_y(&self, r: &Rectangle) -> f64 {
        let uy = self.cy();
        let vy = r.cy();
        if uy <= vy && r.min_y < self.max_y {
            return self.max_y - r.min_y;
        }
        if vy <= uy && self.min_y < r.max_y {
            return r.max_y - self.min_y;
        }
        0.0
    }

    pub fn set_x_centre(&mut self, cx: f64) {
        let dx = cx - self.cx();
        self.min_x += dx;
        self.max_x += dx;
    }

    pub fn set_y_centre(&mut self, cy: f64) {
        let dy = cy - self.cy();
        self.min_y += dy;
        self.max_y += dy;
    }

    pub fn union(&self, r: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.min_x.min(r.min_x),
            self.max_x.max(r.max_x),
            self.min_y.min(r.min_y),
            self.max_y.max(r.max_y),
        )
    }

    pub fn inflate(&self, pad: f64) -> Rectangle {
        Rectangle::new(
            self.min_x - pad,
            self.max_x + pad,
            self.min_y - pad,
            self.max_y + pad,
        )
    }
}
