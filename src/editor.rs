use uuid::Uuid;

use crate::canvas::{Point, SourceImage, Transform, Viewport};
use crate::components::params::{AspectRatio, GenerationParams, ParamKind, RequestMode};
use crate::components::strokes::{PointerEvent, RecorderState, Stroke, StrokeRecorder};
use crate::error::InpaintError;
use crate::ops::mask::{self, MaskImage, MaskRenderer, Renderer};
use crate::ops::request::{GenerationRequest, GenerationResult, InferenceClient};

/// Editor-level lifecycle. `Drawing` vs idle is tracked by the recorder and
/// can happen in any phase after an image is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorPhase {
    Empty,
    ImageLoaded,
    Submitting,
    ResultReady,
    Failed,
}

/// Identifies one submission. A response is only applied when its ticket
/// still matches the live session and the outstanding request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitTicket {
    session: Uuid,
    seq: u64,
}

/// What happened to a completed response.
#[derive(Debug)]
pub enum Completion {
    /// Result slot overwritten with this many images.
    Ready(usize),
    /// Request failed; previous result is untouched.
    Failed(InpaintError),
    /// Session was cleared or replaced while in flight; response dropped.
    Stale,
}

impl Completion {
    /// Number of images stored, or why nothing was stored.
    pub fn into_result(self) -> Result<usize, InpaintError> {
        match self {
            Completion::Ready(n) => Ok(n),
            Completion::Failed(e) => Err(e),
            Completion::Stale => Err(InpaintError::Discarded),
        }
    }
}

/// Framework-agnostic editing session: one image, its strokes, the knobs,
/// and the single "current result" slot.
pub struct EditorState {
    session_id: Uuid,
    phase: EditorPhase,
    source: Option<SourceImage>,
    viewport: Viewport,
    recorder: StrokeRecorder,
    params: GenerationParams,
    prompt: String,
    renderer: Box<dyn MaskRenderer + Send + Sync>,
    in_flight: Option<SubmitTicket>,
    next_seq: u64,
    result: Option<GenerationResult>,
    last_error: Option<String>,
}

impl EditorState {
    pub fn new(viewport: Viewport, stroke_width: f32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            phase: EditorPhase::Empty,
            source: None,
            viewport,
            recorder: StrokeRecorder::new(stroke_width),
            params: GenerationParams::new(RequestMode::Inpaint),
            prompt: String::new(),
            renderer: Box::new(Renderer::default()),
            in_flight: None,
            next_seq: 0,
            result: None,
            last_error: None,
        }
    }

    /// Swap the rasterization backend. Only used at submit time.
    pub fn with_renderer(mut self, renderer: impl MaskRenderer + Send + Sync + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    // -- Accessors ---------------------------------------------------------

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn strokes(&self) -> &[Stroke] {
        self.recorder.strokes()
    }

    pub fn is_drawing(&self) -> bool {
        self.recorder.state() == RecorderState::Drawing
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fit transform for the current image and viewport, computed fresh.
    pub fn transform(&self) -> Result<Transform, InpaintError> {
        let source = self.source.as_ref().ok_or(InpaintError::NoImage)?;
        Transform::fit(self.viewport, source.width(), source.height())
    }

    // -- Image lifecycle ---------------------------------------------------

    /// Decode and load an upload. Undecodable bytes leave the editor as it
    /// was; a zero-sized image resets it to `Empty`.
    pub fn load_image_bytes(&mut self, bytes: &[u8]) -> Result<(), InpaintError> {
        match crate::io::decode_source(bytes) {
            Ok(source) => self.load_image(source),
            Err(e @ InpaintError::Geometry(_)) => {
                crate::log_warn!("Editor: rejected upload: {}", e);
                self.clear();
                Err(e)
            }
            Err(e) => {
                crate::log_warn!("Editor: rejected upload: {}", e);
                Err(e)
            }
        }
    }

    /// Load (or replace) the source image. Starts a new session: strokes and
    /// results are dropped and any in-flight response will be discarded.
    pub fn load_image(&mut self, source: SourceImage) -> Result<(), InpaintError> {
        if let Err(e) = Transform::fit(self.viewport, source.width(), source.height()) {
            self.clear();
            return Err(e);
        }
        self.clear();
        crate::log_info!(
            "Editor: loaded {}x{} image (session {})",
            source.width(),
            source.height(),
            self.session_id
        );
        self.source = Some(source);
        self.phase = EditorPhase::ImageLoaded;
        Ok(())
    }

    /// Responsive resize. Ends any active stroke; recorded strokes keep the
    /// transform they were drawn under.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), InpaintError> {
        self.recorder.pointer_up();
        self.viewport = viewport;
        if self.source.is_some()
            && let Err(e) = self.transform()
        {
            crate::log_err!("Editor: viewport {}x{} invalid: {}", viewport.width, viewport.height, e);
            self.clear();
            return Err(e);
        }
        Ok(())
    }

    /// Reset to `Empty` unconditionally.
    pub fn clear(&mut self) {
        if self.in_flight.is_some() {
            crate::log_info!("Editor: session {} cleared with a request in flight", self.session_id);
        }
        self.session_id = Uuid::new_v4();
        self.phase = EditorPhase::Empty;
        self.source = None;
        self.recorder.clear();
        self.in_flight = None;
        self.result = None;
        self.last_error = None;
    }

    // -- Input -------------------------------------------------------------

    /// Feed one pointer event. `PointerEvent::Clear` clears strokes only.
    pub fn pointer(&mut self, event: PointerEvent) -> Result<(), InpaintError> {
        let transform = self.transform()?;
        self.leave_terminal_phase();
        self.recorder.handle(event, transform);
        Ok(())
    }

    pub fn pointer_down(&mut self, at: Point) -> Result<(), InpaintError> {
        self.pointer(PointerEvent::Down([at.x, at.y]))
    }

    pub fn pointer_move(&mut self, at: Point) -> Result<(), InpaintError> {
        self.pointer(PointerEvent::Move([at.x, at.y]))
    }

    pub fn pointer_up(&mut self) -> Result<(), InpaintError> {
        self.pointer(PointerEvent::Up)
    }

    pub fn clear_strokes(&mut self) -> Result<(), InpaintError> {
        self.pointer(PointerEvent::Clear)
    }

    pub fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
    }

    /// Validate and store raw knob input; returns the value now in effect.
    pub fn set_param(&mut self, kind: ParamKind, raw: &str) -> f32 {
        self.params.set_raw(kind, raw)
    }

    pub fn set_param_value(&mut self, kind: ParamKind, value: f32) -> f32 {
        self.params.set(kind, value)
    }

    pub fn unset_param(&mut self, kind: ParamKind) {
        self.params.unset(kind);
    }

    pub fn set_negative_prompt(&mut self, negative: &str) {
        self.params.negative_prompt = negative.to_string();
    }

    pub fn set_allow_sensitive(&mut self, allow: bool) {
        self.params.allow_sensitive = allow;
    }

    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.params.aspect_ratio = ratio;
    }

    /// `ResultReady`/`Failed` → `ImageLoaded`.
    pub fn acknowledge(&mut self) {
        self.leave_terminal_phase();
    }

    fn leave_terminal_phase(&mut self) {
        if matches!(self.phase, EditorPhase::ResultReady | EditorPhase::Failed) {
            self.phase = EditorPhase::ImageLoaded;
        }
    }

    // -- Submission --------------------------------------------------------

    /// Render the current strokes at the source image's resolution.
    pub fn rasterize_mask(&self) -> Result<MaskImage, InpaintError> {
        let source = self.source.as_ref().ok_or(InpaintError::NoImage)?;
        let (w, h) = source.dimensions();
        Ok(mask::rasterize(
            self.recorder.strokes(),
            w,
            h,
            self.renderer.as_ref(),
        ))
    }

    /// Snapshot the request for one network call and enter `Submitting`.
    /// Refused with `Busy` while a previous call is outstanding.
    pub fn begin_submit(&mut self) -> Result<(SubmitTicket, GenerationRequest), InpaintError> {
        if self.in_flight.is_some() {
            return Err(InpaintError::Busy);
        }
        let source = self.source.as_ref().ok_or(InpaintError::NoImage)?;
        let mask = self.rasterize_mask()?;
        let request = GenerationRequest::inpaint(source, &mask, &self.prompt, &self.params)?;

        self.next_seq += 1;
        let ticket = SubmitTicket {
            session: self.session_id,
            seq: self.next_seq,
        };
        self.in_flight = Some(ticket);
        self.phase = EditorPhase::Submitting;
        crate::log_info!(
            "Editor: submit #{} ({} strokes, {} marked px)",
            ticket.seq,
            self.recorder.strokes().len(),
            mask.marked_count()
        );
        Ok((ticket, request))
    }

    /// Apply the outcome of the request identified by `ticket`.
    pub fn complete(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<GenerationResult, InpaintError>,
    ) -> Completion {
        if self.in_flight != Some(ticket) {
            crate::log_info!("Editor: discarded stale response #{}", ticket.seq);
            return Completion::Stale;
        }
        self.in_flight = None;
        match outcome {
            Ok(result) => {
                let n = result.len();
                self.result = Some(result);
                self.last_error = None;
                self.phase = EditorPhase::ResultReady;
                Completion::Ready(n)
            }
            Err(e) => {
                crate::log_err!("Editor: request #{} failed: {}", ticket.seq, e);
                self.last_error = Some(e.to_string());
                self.phase = EditorPhase::Failed;
                Completion::Failed(e)
            }
        }
    }

    /// Begin, send through `client`, and complete in one go.
    ///
    /// The editor stays borrowed across the await, so nothing can clear it
    /// mid-request here. Callers that need cancellation use
    /// [`begin_submit`](Self::begin_submit) and [`complete`](Self::complete).
    pub async fn submit(&mut self, client: &InferenceClient) -> Result<usize, InpaintError> {
        let (ticket, request) = self.begin_submit()?;
        let outcome = client.send(&request).await;
        self.complete(ticket, outcome).into_result()
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(
            Viewport::default(),
            crate::components::strokes::DEFAULT_STROKE_WIDTH,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn loaded(w: u32, h: u32) -> EditorState {
        let mut ed = EditorState::default();
        ed.load_image(SourceImage::new(RgbaImage::new(w, h)).unwrap())
            .unwrap();
        ed
    }

    #[test]
    fn input_before_load_is_rejected() {
        let mut ed = EditorState::default();
        assert!(matches!(
            ed.pointer_down(Point::new(1.0, 1.0)),
            Err(InpaintError::NoImage)
        ));
        assert!(matches!(ed.begin_submit(), Err(InpaintError::NoImage)));
        assert_eq!(ed.phase(), EditorPhase::Empty);
    }

    #[test]
    fn invalid_upload_keeps_state() {
        let mut ed = loaded(10, 10);
        ed.pointer_down(Point::new(400.0, 300.0)).unwrap();
        ed.pointer_up().unwrap();
        assert!(matches!(
            ed.load_image_bytes(b"nope"),
            Err(InpaintError::InvalidFile(_))
        ));
        assert_eq!(ed.phase(), EditorPhase::ImageLoaded);
        assert_eq!(ed.strokes().len(), 1);
    }

    #[test]
    fn double_submit_keeps_one_request_outstanding() {
        let mut ed = loaded(40, 30);
        let (ticket, _req) = ed.begin_submit().unwrap();
        assert!(matches!(ed.begin_submit(), Err(InpaintError::Busy)));
        assert_eq!(ed.phase(), EditorPhase::Submitting);
        assert!(matches!(
            ed.complete(ticket, Ok(GenerationResult::default())),
            Completion::Ready(0)
        ));
        assert_eq!(ed.phase(), EditorPhase::ResultReady);
        assert!(ed.begin_submit().is_ok());
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut ed = loaded(8, 8);
        let (t1, _) = ed.begin_submit().unwrap();
        let first = GenerationResult {
            images: vec![RgbaImage::new(8, 8)],
        };
        ed.complete(t1, Ok(first.clone()));
        let (t2, _) = ed.begin_submit().unwrap();
        let c = ed.complete(t2, Err(InpaintError::Network("503".into())));
        assert!(matches!(c, Completion::Failed(InpaintError::Network(_))));
        assert_eq!(ed.phase(), EditorPhase::Failed);
        assert_eq!(ed.result(), Some(&first));
        // retry without redrawing
        ed.acknowledge();
        assert_eq!(ed.phase(), EditorPhase::ImageLoaded);
        assert!(ed.begin_submit().is_ok());
    }

    #[test]
    fn clear_mid_request_discards_response() {
        let mut ed = loaded(8, 8);
        let (ticket, _) = ed.begin_submit().unwrap();
        ed.clear();
        assert_eq!(ed.phase(), EditorPhase::Empty);
        let c = ed.complete(
            ticket,
            Ok(GenerationResult {
                images: vec![RgbaImage::new(1, 1)],
            }),
        );
        assert!(matches!(c, Completion::Stale));
        assert!(ed.result().is_none());
    }

    #[test]
    fn stale_completion_is_not_an_empty_result() {
        assert!(matches!(
            Completion::Stale.into_result(),
            Err(InpaintError::Discarded)
        ));
        assert_eq!(Completion::Ready(0).into_result().unwrap(), 0);
        assert!(!InpaintError::Discarded.is_recoverable());
    }

    #[test]
    fn reupload_discards_in_flight_response() {
        let mut ed = loaded(8, 8);
        let (ticket, _) = ed.begin_submit().unwrap();
        ed.load_image(SourceImage::new(RgbaImage::new(16, 16)).unwrap())
            .unwrap();
        assert!(matches!(
            ed.complete(ticket, Ok(GenerationResult::default())),
            Completion::Stale
        ));
        assert_eq!(ed.phase(), EditorPhase::ImageLoaded);
    }

    #[test]
    fn mask_size_survives_viewport_resize() {
        let mut ed = loaded(400, 300);
        ed.pointer_down(Point::new(100.0, 100.0)).unwrap();
        ed.pointer_move(Point::new(300.0, 250.0)).unwrap();
        ed.set_viewport(Viewport::new(1280, 400)).unwrap();
        assert!(!ed.is_drawing());
        ed.pointer_down(Point::new(50.0, 50.0)).unwrap();
        let mask = ed.rasterize_mask().unwrap();
        assert_eq!(mask.dimensions(), (400, 300));
        // the first stroke still lands where it was drawn: display (100,100)
        // in 800x600 at scale 2 → image (50,50)
        assert!(mask.is_marked(50, 50));
    }

    #[test]
    fn zero_viewport_forces_reupload() {
        let mut ed = loaded(4, 4);
        assert!(matches!(
            ed.set_viewport(Viewport::new(0, 600)),
            Err(InpaintError::Geometry(_))
        ));
        assert_eq!(ed.phase(), EditorPhase::Empty);
        assert!(ed.source().is_none());
    }

    #[test]
    fn params_revalidate_on_every_change() {
        let mut ed = loaded(4, 4);
        assert_eq!(ed.set_param(ParamKind::GuidanceScale, "999"), 20.0);
        assert_eq!(ed.set_param(ParamKind::GuidanceScale, ""), 7.5);
        assert_eq!(ed.params().guidance_scale, Some(7.5));
    }
}
