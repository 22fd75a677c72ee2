//! InpaintFE: paint a mask over an image and submit it for inpainting.
//!
//! Pointer input is recorded in display (viewport) space, rasterized at the
//! source image's native resolution on submit, and sent together with the
//! unmodified image, a prompt and validated knobs in one multipart request.

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod settings;

pub use canvas::{Point, SourceImage, Transform, Viewport};
pub use components::params::{AspectRatio, GenerationParams, ParamKind, RequestMode};
pub use components::strokes::{PointerEvent, Stroke, StrokeRecorder};
pub use editor::{Completion, EditorPhase, EditorState, SubmitTicket};
pub use error::InpaintError;
pub use ops::mask::{MaskImage, MaskRenderer, Renderer};
pub use ops::request::{GenerationRequest, GenerationResult, InferenceClient};
