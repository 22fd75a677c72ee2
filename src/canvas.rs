// ============================================================================
// CANVAS GEOMETRY - source image + display viewport fit transform
// ============================================================================
//
// The source image is fitted ("contain") into a fixed-size viewport and
// centred. Pointer input arrives in viewport pixels (display space) and must be
// mapped back into the image's native pixel grid (image space) before it can be
// rasterized into a mask.

use image::RgbaImage;

use crate::error::InpaintError;

/// Default on-screen viewport the image is fitted into.
pub const DEFAULT_VIEWPORT_W: u32 = 800;
pub const DEFAULT_VIEWPORT_H: u32 = 600;

/// A 2D point. Used for both display-space and image-space coordinates; which
/// one is meant is always stated by the function that produces it.
#[derive(Clone, Copy, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<[f32; 2]> for Point {
    fn from(p: [f32; 2]) -> Self {
        Point::new(p[0], p[1])
    }
}

/// Fixed-size display viewport dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse a `WxH` string such as `800x600`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        let width = w.trim().parse::<u32>().ok()?;
        let height = h.trim().parse::<u32>().ok()?;
        Some(Self { width, height })
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_W, DEFAULT_VIEWPORT_H)
    }
}

/// Decoded upload. Immutable once loaded; replaced wholesale on re-upload.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    /// Wrap decoded pixels. Zero-sized images have no valid fit transform and
    /// are rejected here rather than at first use.
    pub fn new(pixels: RgbaImage) -> Result<Self, InpaintError> {
        let (w, h) = pixels.dimensions();
        if w == 0 || h == 0 {
            return Err(InpaintError::Geometry(format!(
                "image has zero dimension ({}x{})",
                w, h
            )));
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Uniform fit-and-centre transform between display space and image space.
///
/// Derived solely from the image and viewport dimensions. Never cache one
/// across an image or viewport change: build a fresh one with [`Transform::fit`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    image_w: u32,
    image_h: u32,
}

impl Transform {
    /// `scale = min(vw/iw, vh/ih)`, image centred on both axes.
    pub fn fit(viewport: Viewport, image_w: u32, image_h: u32) -> Result<Self, InpaintError> {
        if image_w == 0 || image_h == 0 {
            return Err(InpaintError::Geometry(format!(
                "cannot fit a {}x{} image",
                image_w, image_h
            )));
        }
        if viewport.width == 0 || viewport.height == 0 {
            return Err(InpaintError::Geometry(format!(
                "viewport has zero dimension ({}x{})",
                viewport.width, viewport.height
            )));
        }

        let vw = viewport.width as f32;
        let vh = viewport.height as f32;
        let iw = image_w as f32;
        let ih = image_h as f32;
        let scale = (vw / iw).min(vh / ih);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(InpaintError::Geometry(format!(
                "undefined fit scale for {}x{} in {}x{}",
                image_w, image_h, viewport.width, viewport.height
            )));
        }

        Ok(Self {
            scale,
            offset_x: (vw - iw * scale) / 2.0,
            offset_y: (vh - ih * scale) / 2.0,
            image_w,
            image_h,
        })
    }

    /// Display-space → image-space.
    #[inline]
    pub fn to_image_space(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.offset_x) / self.scale,
            (p.y - self.offset_y) / self.scale,
        )
    }

    /// Image-space → display-space.
    #[inline]
    pub fn to_display_space(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.offset_x,
            p.y * self.scale + self.offset_y,
        )
    }

    /// Convert a display-space length (e.g. brush width) to image pixels.
    #[inline]
    pub fn length_to_image_space(&self, len: f32) -> f32 {
        len / self.scale
    }

    /// The fitted image rectangle in display space as `(min, max)`.
    pub fn fitted_rect(&self) -> (Point, Point) {
        let min = Point::new(self.offset_x, self.offset_y);
        let max = Point::new(
            self.offset_x + self.image_w as f32 * self.scale,
            self.offset_y + self.image_h as f32 * self.scale,
        );
        (min, max)
    }

    /// True when the display point lies over the fitted image (half-open).
    pub fn contains_display(&self, p: Point) -> bool {
        let (min, max) = self.fitted_rect();
        p.x >= min.x && p.x < max.x && p.y >= min.y && p.y < max.y
    }

    pub fn image_dimensions(&self) -> (u32, u32) {
        (self.image_w, self.image_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_exact_double() {
        let t = Transform::fit(Viewport::new(800, 600), 400, 300).unwrap();
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.offset_x, 0.0);
        assert_eq!(t.offset_y, 0.0);
    }

    #[test]
    fn fit_letterboxes_wide_image() {
        // 1000x250 into 800x600: scale 0.8, height 200 → 200px bars top and bottom
        let t = Transform::fit(Viewport::new(800, 600), 1000, 250).unwrap();
        assert!((t.scale - 0.8).abs() < 1e-6);
        assert!(t.offset_x.abs() < 1e-4);
        assert!((t.offset_y - 200.0).abs() < 1e-4);
    }

    #[test]
    fn zero_dimensions_are_geometry_errors() {
        assert!(matches!(
            Transform::fit(Viewport::new(800, 600), 0, 300),
            Err(InpaintError::Geometry(_))
        ));
        assert!(matches!(
            Transform::fit(Viewport::new(0, 600), 400, 300),
            Err(InpaintError::Geometry(_))
        ));
        assert!(matches!(
            SourceImage::new(RgbaImage::new(0, 5)),
            Err(InpaintError::Geometry(_))
        ));
    }

    #[test]
    fn image_and_display_space_are_inverse() {
        let t = Transform::fit(Viewport::new(640, 480), 1920, 1080).unwrap();
        let p = Point::new(123.5, 77.25);
        let back = t.to_display_space(t.to_image_space(p));
        assert!((back.x - p.x).abs() < 1e-3);
        assert!((back.y - p.y).abs() < 1e-3);
    }

    #[test]
    fn interior_display_points_land_inside_image() {
        let t = Transform::fit(Viewport::new(800, 600), 333, 777).unwrap();
        let (min, max) = t.fitted_rect();
        for i in 0..50 {
            for j in 0..50 {
                let p = Point::new(
                    min.x + (max.x - min.x) * (i as f32 + 0.5) / 50.0,
                    min.y + (max.y - min.y) * (j as f32 + 0.5) / 50.0,
                );
                assert!(t.contains_display(p));
                let q = t.to_image_space(p);
                assert!(q.x >= 0.0 && q.x < 333.0, "x out of range: {}", q.x);
                assert!(q.y >= 0.0 && q.y < 777.0, "y out of range: {}", q.y);
            }
        }
    }

    #[test]
    fn viewport_parse() {
        assert_eq!(Viewport::parse("800x600"), Some(Viewport::new(800, 600)));
        assert_eq!(Viewport::parse(" 10 X 20 "), Some(Viewport::new(10, 20)));
        assert_eq!(Viewport::parse("800"), None);
    }
}
