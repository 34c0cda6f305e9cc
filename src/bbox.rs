use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> From<BBox<F>> for [f32; 4] {
    fn from(bbox: BBox<F>) -> Self {
        bbox.0
    }
}

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn area(&self) -> f32 {
        (self.right() - self.left()).max(0.0) * (self.bottom() - self.top()).max(0.0)
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    /// Corners truncated toward zero to whole pixels.
    #[inline]
    pub fn pixel_corners(&self) -> (i32, i32, i32, i32) {
        (
            self.0[0] as i32,
            self.0[1] as i32,
            self.0[2] as i32,
            self.0[3] as i32,
        )
    }

    /// Integer centroid computed from the truncated corners, halves rounded
    /// toward zero.
    #[inline]
    pub fn pixel_centroid(&self) -> (i32, i32) {
        let (x1, y1, x2, y2) = self.pixel_corners();

        (
            ((x1 as i64 + x2 as i64) / 2) as i32,
            ((y1 as i64 + y2 as i64) / 2) as i32,
        )
    }

    /// Same as `pixel_centroid` but with halves rounded down.
    #[inline]
    pub fn pixel_centroid_floor(&self) -> (i32, i32) {
        let (x1, y1, x2, y2) = self.pixel_corners();

        (
            (x1 as i64 + x2 as i64).div_euclid(2) as i32,
            (y1 as i64 + y2 as i64).div_euclid(2) as i32,
        )
    }

    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let i_left = self.left().max(other.left());
        let i_top = self.top().max(other.top());
        let i_right = self.right().min(other.right());
        let i_bottom = self.bottom().min(other.bottom());
        let i_area = (i_right - i_left).max(0.) * (i_bottom - i_top).max(0.);

        let union = self.area() + other.area() - i_area;
        if union <= 0.0 {
            0.0
        } else {
            i_area / union
        }
    }

    /// Whole-pixel region of this box inside a `width`x`height` frame.
    /// `None` when nothing of the box remains after clipping.
    pub fn clip(&self, width: i32, height: i32) -> Option<BBox<Ltwh>> {
        let (x1, y1, x2, y2) = self.pixel_corners();
        let (x1, x2) = (x1.clamp(0, width), x2.clamp(0, width));
        let (y1, y2) = (y1.clamp(0, height), y2.clamp(0, height));

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(BBox::ltwh(
            x1 as f32,
            y1 as f32,
            (x2 - x1) as f32,
            (y2 - y1) as f32,
        ))
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] + v.0[0], v.0[3] + v.0[1]],
            Default::default(),
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]],
            Default::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pixel_centroid_truncates_like_integer_division() {
        let bbox = BBox::ltrb(10.9, 20.2, 31.7, 41.0);
        assert_eq!(bbox.pixel_corners(), (10, 20, 31, 41));
        assert_eq!(bbox.pixel_centroid(), (20, 30));
        assert_eq!(bbox.pixel_centroid_floor(), (20, 30));
    }

    #[test]
    fn centroid_rounding_of_negative_halves() {
        let bbox = BBox::ltrb(-7.0, -3.0, 0.0, 0.0);
        assert_eq!(bbox.pixel_centroid(), (-3, -1));
        assert_eq!(bbox.pixel_centroid_floor(), (-4, -2));
    }

    #[test]
    fn centroid_of_huge_coordinates_does_not_overflow() {
        let bbox = BBox::ltrb(0.0, 3.0e9, 10.0, 3.0e9);
        assert_eq!(bbox.pixel_centroid(), (5, i32::MAX));
        assert_eq!(bbox.pixel_centroid_floor(), (5, i32::MAX));

        let bbox = BBox::ltrb(-3.0e9, -3.0e9, -3.0e9, 0.0);
        assert_eq!(bbox.pixel_centroid(), (i32::MIN, i32::MIN / 2));
    }

    #[test]
    fn conversions_are_consistent() {
        let ltrb = BBox::ltrb(5.0, 10.0, 25.0, 50.0);
        let ltwh = ltrb.as_ltwh();
        assert_eq!(ltwh.as_slice(), &[5.0, 10.0, 20.0, 40.0]);
        assert_eq!(ltwh.as_ltrb(), ltrb);
        assert_abs_diff_eq!(ltwh.area(), ltrb.area());
    }

    #[test]
    fn iou_of_overlapping_boxes() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(5.0, 5.0, 15.0, 15.0);
        assert_abs_diff_eq!(a.iou(&b), 25.0 / 175.0, epsilon = 0.001);
        assert_abs_diff_eq!(a.iou(&a), 1.0);
        assert_abs_diff_eq!(a.iou(&BBox::ltrb(20.0, 20.0, 30.0, 30.0)), 0.0);
    }

    #[test]
    fn clip_to_frame() {
        let inside = BBox::ltrb(-5.0, 10.0, 50.0, 200.0).clip(40, 100).unwrap();
        assert_eq!(inside.as_slice(), &[0.0, 10.0, 40.0, 90.0]);

        assert!(BBox::ltrb(50.0, 50.0, 80.0, 80.0).clip(40, 40).is_none());
        assert!(BBox::ltrb(10.0, 10.0, 10.0, 30.0).clip(40, 40).is_none());
        assert!(BBox::ltrb(20.0, 20.0, 10.0, 10.0).clip(40, 40).is_none());
    }
}
