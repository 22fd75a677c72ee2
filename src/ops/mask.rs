// ============================================================================
// MASK RASTERIZER - display-space strokes → image-resolution inpaint mask
// ============================================================================
//
// Mask format (fixed):
//   8-bit RGBA PNG, exactly source width × source height.
//   Marked   (may be regenerated) = opaque white        (255,255,255,255)
//   Unmarked (keep)               = transparent black   (0,0,0,0)
//   Decoders treat alpha >= 128 as marked.
//
// Coverage is binary: a pixel is marked iff its centre lies within the
// image-space brush radius of the smoothed stroke path. Round caps come from
// the capsule distance test.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::Point;
use crate::components::strokes::Stroke;
use crate::error::InpaintError;

/// Marked value in the internal single-channel buffer.
const MARKED: u8 = 255;

/// Cardinal spline tension used to round off polyline corners.
pub const STROKE_TENSION: f32 = 0.5;

/// Smallest brush radius in image pixels. Above half a pixel diagonal
/// (`FRAC_1_SQRT_2`), so every path point marks at least the pixel it lies in.
const MIN_RADIUS: f32 = 0.75;

/// A stroke already mapped and smoothed into image space.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskPath {
    pub points: Vec<Point>,
    pub radius: f32,
}

impl MaskPath {
    /// Map a recorded stroke through its transform and smooth it.
    pub fn from_stroke(stroke: &Stroke) -> Self {
        let radius = stroke.image_radius().max(MIN_RADIUS);
        let pts = stroke.image_points();
        let points = smooth_polyline(&pts, STROKE_TENSION, radius);
        Self { points, radius }
    }

    /// Consecutive point pairs. A single-point path yields one degenerate
    /// segment so it still paints a round dot.
    fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let single = (self.points.len() == 1).then(|| (self.points[0], self.points[0]));
        single
            .into_iter()
            .chain(self.points.windows(2).map(|w| (w[0], w[1])))
    }
}

// -- Renderer capability --------------------------------------------------

/// Turns image-space paths into a single-channel coverage buffer.
///
/// Implementations must be pure: same paths and size → same buffer.
pub trait MaskRenderer {
    fn render(&self, paths: &[MaskPath], width: u32, height: u32) -> GrayImage;
}

/// Built-in renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Renderer {
    /// Single-threaded, segment-by-segment.
    #[default]
    Software,
    /// Row-parallel (rayon). Output is identical to `Software`.
    Parallel,
}

impl Renderer {
    pub fn label(&self) -> &'static str {
        match self {
            Renderer::Software => "software",
            Renderer::Parallel => "parallel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "software" | "cpu" => Some(Renderer::Software),
            "parallel" | "rayon" => Some(Renderer::Parallel),
            _ => None,
        }
    }
}

impl MaskRenderer for Renderer {
    fn render(&self, paths: &[MaskPath], width: u32, height: u32) -> GrayImage {
        match self {
            Renderer::Software => render_serial(paths, width, height),
            Renderer::Parallel => render_rows_parallel(paths, width, height),
        }
    }
}

/// Pixel-index bounding box that can contain covered pixel centres for one
/// segment, clipped to the image. `None` when fully outside.
#[inline]
fn segment_bounds(a: Point, b: Point, r: f32, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
    let min_x = (a.x.min(b.x) - r - 0.5).floor();
    let max_x = (a.x.max(b.x) + r - 0.5).ceil();
    let min_y = (a.y.min(b.y) - r - 0.5).floor();
    let max_y = (a.y.max(b.y) + r - 0.5).ceil();
    if max_x < 0.0 || max_y < 0.0 || min_x >= w as f32 || min_y >= h as f32 {
        return None;
    }
    let x0 = min_x.max(0.0) as u32;
    let y0 = min_y.max(0.0) as u32;
    let x1 = (max_x as u32).min(w - 1);
    let y1 = (max_y as u32).min(h - 1);
    Some((x0, y0, x1, y1))
}

/// Squared distance from `p` to segment `ab`.
#[inline]
fn dist_sq_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq < 1e-12 {
        return p.distance_sq(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance_sq(Point::new(a.x + abx * t, a.y + aby * t))
}

#[inline]
fn covers(x: u32, y: u32, a: Point, b: Point, r: f32) -> bool {
    let c = Point::new(x as f32 + 0.5, y as f32 + 0.5);
    dist_sq_to_segment(c, a, b) <= r * r
}

fn render_serial(paths: &[MaskPath], width: u32, height: u32) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    for path in paths {
        let r = path.radius;
        for (a, b) in path.segments() {
            let Some((x0, y0, x1, y1)) = segment_bounds(a, b, r, width, height) else {
                continue;
            };
            for y in y0..=y1 {
                for x in x0..=x1 {
                    if covers(x, y, a, b, r) {
                        out.put_pixel(x, y, Luma([MARKED]));
                    }
                }
            }
        }
    }
    out
}

fn render_rows_parallel(paths: &[MaskPath], width: u32, height: u32) -> GrayImage {
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    // Pre-compute per-segment bounds once; each row then filters by y.
    let segments: Vec<(Point, Point, f32, (u32, u32, u32, u32))> = paths
        .iter()
        .flat_map(|path| {
            let r = path.radius;
            path.segments()
                .filter_map(move |(a, b)| {
                    segment_bounds(a, b, r, width, height).map(|bb| (a, b, r, bb))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut buf = vec![0u8; width as usize * height as usize];
    buf.par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            for &(a, b, r, (x0, y0, x1, y1)) in &segments {
                if y < y0 || y > y1 {
                    continue;
                }
                for x in x0..=x1 {
                    if row[x as usize] != MARKED && covers(x, y, a, b, r) {
                        row[x as usize] = MARKED;
                    }
                }
            }
        });

    // Length always matches width*height, so from_raw cannot fail here.
    GrayImage::from_raw(width, height, buf).unwrap_or_else(|| GrayImage::new(width, height))
}

// -- Smoothing ------------------------------------------------------------

/// Densify a polyline along a cardinal spline through its points.
///
/// Sub-division step is tied to the brush radius so segments stay short
/// relative to the stroke and corners do not facet. Endpoints are preserved.
pub fn smooth_polyline(points: &[Point], tension: f32, radius: f32) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let step = (radius * 0.5).max(1.0);
    let n = points.len();
    let mut out = Vec::with_capacity(n * 4);
    out.push(points[0]);

    for i in 0..n - 1 {
        let p0 = points[i.saturating_sub(1)];
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = points[(i + 2).min(n - 1)];

        // Hermite tangents of a cardinal spline
        let m1 = Point::new((p2.x - p0.x) * tension, (p2.y - p0.y) * tension);
        let m2 = Point::new((p3.x - p1.x) * tension, (p3.y - p1.y) * tension);

        let len = p1.distance_sq(p2).sqrt();
        let subdiv = ((len / step).ceil() as usize).clamp(1, 64);
        for s in 1..=subdiv {
            let t = s as f32 / subdiv as f32;
            let t2 = t * t;
            let t3 = t2 * t;
            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;
            out.push(Point::new(
                h00 * p1.x + h10 * m1.x + h01 * p2.x + h11 * m2.x,
                h00 * p1.y + h10 * m1.y + h01 * p2.y + h11 * m2.y,
            ));
        }
    }
    out
}

// -- Mask image -----------------------------------------------------------

/// Image-resolution mask. Exists for the duration of one request.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskImage {
    coverage: GrayImage,
}

impl MaskImage {
    /// A fully unmarked mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            coverage: GrayImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.coverage.width()
    }

    pub fn height(&self) -> u32 {
        self.coverage.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.coverage.dimensions()
    }

    pub fn is_marked(&self, x: u32, y: u32) -> bool {
        self.coverage
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == MARKED)
    }

    pub fn marked_count(&self) -> usize {
        self.coverage.as_raw().iter().filter(|&&v| v == MARKED).count()
    }

    pub fn is_blank(&self) -> bool {
        self.coverage.as_raw().iter().all(|&v| v != MARKED)
    }

    /// Single-channel view (255 = marked, 0 = unmarked).
    pub fn as_gray(&self) -> &GrayImage {
        &self.coverage
    }

    /// Expand to the documented RGBA polarity.
    pub fn to_rgba(&self) -> RgbaImage {
        let (w, h) = self.coverage.dimensions();
        RgbaImage::from_fn(w, h, |x, y| {
            if self.coverage.get_pixel(x, y).0[0] == MARKED {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, InpaintError> {
        crate::io::encode_png(&self.to_rgba())
    }

    /// Decode a mask PNG written by [`MaskImage::encode_png`] (or any RGBA/LA
    /// image following the same polarity).
    pub fn decode_png(bytes: &[u8]) -> Result<Self, InpaintError> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|e| InpaintError::InvalidFile(format!("mask: {}", e)))?
            .to_rgba8();
        let (w, h) = rgba.dimensions();
        let coverage = GrayImage::from_fn(w, h, |x, y| {
            if rgba.get_pixel(x, y).0[3] >= 128 {
                Luma([MARKED])
            } else {
                Luma([0])
            }
        });
        Ok(Self { coverage })
    }
}

/// Rasterize every stroke onto a blank `width × height` mask.
///
/// The output size is taken from the source image only; stroke transforms
/// affect where marks land, never the mask dimensions.
pub fn rasterize(
    strokes: &[Stroke],
    width: u32,
    height: u32,
    renderer: &dyn MaskRenderer,
) -> MaskImage {
    if strokes.is_empty() {
        return MaskImage::empty(width, height);
    }
    let paths: Vec<MaskPath> = strokes.iter().map(MaskPath::from_stroke).collect();
    let coverage = renderer.render(&paths, width, height);
    debug_assert_eq!(coverage.dimensions(), (width, height));
    MaskImage { coverage }
}
