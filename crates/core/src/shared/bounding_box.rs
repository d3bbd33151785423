/// Axis-aligned face box in frame pixel coordinates, stored as corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Divides every coordinate by `factor`; used to undo a detector resize.
    pub fn unscale(&self, factor: f32) -> Self {
        Self::new(
            self.x1 / factor,
            self.y1 / factor,
            self.x2 / factor,
            self.y2 / factor,
        )
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_dimensions() {
        let b = BoundingBox::new(10.0, 20.0, 50.0, 80.0);
        assert_relative_eq!(b.width(), 40.0);
        assert_relative_eq!(b.height(), 60.0);
        assert_relative_eq!(b.area(), 2400.0);
    }

    #[test]
    fn test_inverted_box_has_zero_area() {
        let b = BoundingBox::new(50.0, 50.0, 10.0, 10.0);
        assert_relative_eq!(b.area(), 0.0);
    }

    #[test]
    fn test_unscale() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 40.0).unscale(2.0);
        assert_eq!(b, BoundingBox::new(5.0, 10.0, 15.0, 20.0));
    }

    #[rstest]
    #[case::identical(BoundingBox::new(0.0, 0.0, 10.0, 10.0), BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1.0)]
    #[case::disjoint(BoundingBox::new(0.0, 0.0, 10.0, 10.0), BoundingBox::new(20.0, 20.0, 30.0, 30.0), 0.0)]
    #[case::half_overlap(BoundingBox::new(0.0, 0.0, 10.0, 10.0), BoundingBox::new(5.0, 0.0, 15.0, 10.0), 50.0 / 150.0)]
    #[case::degenerate(BoundingBox::new(0.0, 0.0, 0.0, 10.0), BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.0)]
    fn test_iou(#[case] a: BoundingBox, #[case] b: BoundingBox, #[case] expected: f32) {
        assert_relative_eq!(a.iou(&b), expected, epsilon = 1e-6);
    }
}
