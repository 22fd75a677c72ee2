// ============================================================================
// STROKE RECORDER - pointer-event stream → display-space polylines
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::canvas::{Point, Transform};

/// Brush diameter in display pixels.
pub const DEFAULT_STROKE_WIDTH: f32 = 20.0;

/// One pointer event, framework-agnostic. Coordinates are display space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEvent {
    Down([f32; 2]),
    Move([f32; 2]),
    Up,
    Clear,
}

/// A single freehand drag, in display space.
#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
    /// Diameter in display pixels.
    pub width: f32,
    /// Viewport transform in effect when the stroke began.
    pub transform: Transform,
}

impl Stroke {
    fn begin(at: Point, width: f32, transform: Transform) -> Self {
        Self {
            points: vec![at],
            width,
            transform,
        }
    }

    /// Points mapped into image space through the stroke's own transform.
    pub fn image_points(&self) -> Vec<Point> {
        self.points
            .iter()
            .map(|p| self.transform.to_image_space(*p))
            .collect()
    }

    /// Brush radius in image pixels.
    pub fn image_radius(&self) -> f32 {
        self.transform.length_to_image_space(self.width) * 0.5
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Drawing,
}

/// `Idle → Drawing → Idle` state machine accumulating strokes.
///
/// Strokes are only ever removed all at once by [`StrokeRecorder::clear`].
#[derive(Clone, Debug)]
pub struct StrokeRecorder {
    strokes: Vec<Stroke>,
    state: RecorderState,
    stroke_width: f32,
}

impl StrokeRecorder {
    pub fn new(stroke_width: f32) -> Self {
        Self {
            strokes: Vec::new(),
            state: RecorderState::Idle,
            stroke_width: if stroke_width.is_finite() && stroke_width > 0.0 {
                stroke_width
            } else {
                DEFAULT_STROKE_WIDTH
            },
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    /// Feed one event. `transform` is the current viewport mapping; it is only
    /// captured when a new stroke begins.
    pub fn handle(&mut self, event: PointerEvent, transform: Transform) {
        match event {
            PointerEvent::Down(p) => self.pointer_down(Point::from(p), transform),
            PointerEvent::Move(p) => self.pointer_move(Point::from(p)),
            PointerEvent::Up => self.pointer_up(),
            PointerEvent::Clear => self.clear(),
        }
    }

    pub fn pointer_down(&mut self, at: Point, transform: Transform) {
        // A second press without a release (lost pointer-up) starts a fresh stroke.
        self.strokes
            .push(Stroke::begin(at, self.stroke_width, transform));
        self.state = RecorderState::Drawing;
    }

    pub fn pointer_move(&mut self, at: Point) {
        if self.state != RecorderState::Drawing {
            return;
        }
        if let Some(active) = self.strokes.last_mut() {
            active.points.push(at);
        }
    }

    pub fn pointer_up(&mut self) {
        self.state = RecorderState::Idle;
    }

    /// Drop every stroke and return to idle, even mid-stroke.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.state = RecorderState::Idle;
    }
}

impl Default for StrokeRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_STROKE_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Viewport;

    fn t() -> Transform {
        Transform::fit(Viewport::new(800, 600), 400, 300).unwrap()
    }

    #[test]
    fn drag_records_one_stroke() {
        let mut rec = StrokeRecorder::default();
        rec.handle(PointerEvent::Down([10.0, 10.0]), t());
        assert_eq!(rec.state(), RecorderState::Drawing);
        rec.handle(PointerEvent::Move([20.0, 10.0]), t());
        rec.handle(PointerEvent::Move([20.0, 10.0]), t());
        rec.handle(PointerEvent::Up, t());
        assert_eq!(rec.state(), RecorderState::Idle);
        assert_eq!(rec.strokes().len(), 1);
        // duplicates are kept
        assert_eq!(rec.strokes()[0].points.len(), 3);
    }

    #[test]
    fn moves_while_idle_are_ignored() {
        let mut rec = StrokeRecorder::default();
        rec.handle(PointerEvent::Move([5.0, 5.0]), t());
        assert!(rec.is_empty());
        rec.handle(PointerEvent::Down([1.0, 1.0]), t());
        rec.handle(PointerEvent::Up, t());
        rec.handle(PointerEvent::Move([9.0, 9.0]), t());
        assert_eq!(rec.strokes()[0].points.len(), 1);
    }

    #[test]
    fn clear_mid_stroke_resets_everything() {
        let mut rec = StrokeRecorder::default();
        rec.handle(PointerEvent::Down([1.0, 1.0]), t());
        rec.handle(PointerEvent::Up, t());
        rec.handle(PointerEvent::Down([2.0, 2.0]), t());
        rec.handle(PointerEvent::Move([3.0, 3.0]), t());
        rec.handle(PointerEvent::Clear, t());
        assert!(rec.is_empty());
        assert_eq!(rec.state(), RecorderState::Idle);
        rec.handle(PointerEvent::Move([4.0, 4.0]), t());
        assert!(rec.is_empty());
    }

    #[test]
    fn image_radius_scales_with_fit() {
        let mut rec = StrokeRecorder::new(20.0);
        rec.pointer_down(Point::new(0.0, 0.0), t());
        // scale 2 → 20 display px = 10 image px diameter
        assert!((rec.strokes()[0].image_radius() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn events_deserialize_from_json() {
        let json = r#"[{"down":[1,2]},{"move":[3.5,4]},"up","clear"]"#;
        let events: Vec<PointerEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(
            events,
            vec![
                PointerEvent::Down([1.0, 2.0]),
                PointerEvent::Move([3.5, 4.0]),
                PointerEvent::Up,
                PointerEvent::Clear,
            ]
        );
    }
}
