// ============================================================================
// GENERATION PARAMETERS - range clamping and defaults for every numeric knob
// ============================================================================

/// Which endpoint the parameters are headed for. Only the image-count ceiling
/// differs between the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMode {
    /// Prompt-only text-to-image.
    Generate,
    /// Image + mask + prompt.
    Inpaint,
}

/// The numeric knobs exposed to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    GuidanceScale,
    InferenceSteps,
    Strength,
    ImageCount,
}

impl ParamKind {
    pub fn all() -> &'static [ParamKind] {
        &[
            ParamKind::GuidanceScale,
            ParamKind::InferenceSteps,
            ParamKind::Strength,
            ParamKind::ImageCount,
        ]
    }

    /// Multipart field name.
    pub fn field_name(&self) -> &'static str {
        match self {
            ParamKind::GuidanceScale => "guidance_scale",
            ParamKind::InferenceSteps => "num_inference_steps",
            ParamKind::Strength => "strength",
            ParamKind::ImageCount => "image_count",
        }
    }

    /// Parse a CLI/user spelling (`guidance`, `guidance_scale`, `steps`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "guidance" | "guidance_scale" => Some(ParamKind::GuidanceScale),
            "steps" | "num_inference_steps" | "inference_steps" => {
                Some(ParamKind::InferenceSteps)
            }
            "strength" => Some(ParamKind::Strength),
            "count" | "image_count" | "images" => Some(ParamKind::ImageCount),
            _ => None,
        }
    }

    /// Closed valid range `(min, max)`.
    pub fn range(&self, mode: RequestMode) -> (f32, f32) {
        match self {
            ParamKind::GuidanceScale => (1.0, 20.0),
            ParamKind::InferenceSteps => (20.0, 50.0),
            ParamKind::Strength => (0.0, 1.0),
            ParamKind::ImageCount => match mode {
                RequestMode::Generate => (1.0, 5.0),
                RequestMode::Inpaint => (1.0, 4.0),
            },
        }
    }

    /// Whether the knob is sent for `mode`. Strength needs a source image.
    pub fn applies_to(&self, mode: RequestMode) -> bool {
        !matches!((self, mode), (ParamKind::Strength, RequestMode::Generate))
    }

    pub fn default_value(&self) -> f32 {
        match self {
            ParamKind::GuidanceScale => 7.5,
            ParamKind::InferenceSteps => 30.0,
            ParamKind::Strength => 0.8,
            ParamKind::ImageCount => 1.0,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ParamKind::InferenceSteps | ParamKind::ImageCount)
    }

    /// Clamp an already-numeric value into range. Idempotent.
    pub fn clamp(&self, value: f32, mode: RequestMode) -> f32 {
        if !value.is_finite() {
            return self.default_value();
        }
        let (lo, hi) = self.range(mode);
        let v = if self.is_integer() { value.round() } else { value };
        v.clamp(lo, hi)
    }

    /// Validate raw text input: empty or non-numeric → default, otherwise clamp.
    pub fn validate(&self, raw: &str, mode: RequestMode) -> f32 {
        match raw.trim().parse::<f32>() {
            Ok(v) if v.is_finite() => self.clamp(v, mode),
            _ => self.default_value(),
        }
    }
}

/// Aspect ratio choices for text-to-image generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape16x9,
    Portrait9x16,
    Landscape3x2,
    Portrait2x3,
}

impl AspectRatio {
    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait2x3 => "2:3",
        }
    }

    pub fn all() -> &'static [AspectRatio] {
        &[
            AspectRatio::Square,
            AspectRatio::Landscape16x9,
            AspectRatio::Portrait9x16,
            AspectRatio::Landscape3x2,
            AspectRatio::Portrait2x3,
        ]
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::all().iter().copied().find(|a| a.label() == s)
    }
}

/// Prefix applied to the negative prompt unless sensitive content is allowed.
pub const SAFETY_NEGATIVE_PREFIX: &str = "NSFW, adult content, sensitive content";

/// Validated knob values. `None` is the "unset" sentinel: the field is left
/// out of the outbound request entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub mode: RequestMode,
    pub guidance_scale: Option<f32>,
    pub inference_steps: Option<u32>,
    pub strength: Option<f32>,
    pub image_count: Option<u32>,
    pub negative_prompt: String,
    pub allow_sensitive: bool,
    pub aspect_ratio: AspectRatio,
}

impl GenerationParams {
    /// Every knob set to its default.
    pub fn new(mode: RequestMode) -> Self {
        Self {
            mode,
            guidance_scale: Some(ParamKind::GuidanceScale.default_value()),
            inference_steps: Some(ParamKind::InferenceSteps.default_value() as u32),
            strength: Some(ParamKind::Strength.default_value()),
            image_count: Some(ParamKind::ImageCount.default_value() as u32),
            negative_prompt: String::new(),
            allow_sensitive: false,
            aspect_ratio: AspectRatio::default(),
        }
    }

    /// Apply one change event from raw user text. Returns the stored value.
    pub fn set_raw(&mut self, kind: ParamKind, raw: &str) -> f32 {
        let v = kind.validate(raw, self.mode);
        self.store(kind, v);
        v
    }

    /// Apply one numeric change event. Returns the stored value.
    pub fn set(&mut self, kind: ParamKind, value: f32) -> f32 {
        let v = kind.clamp(value, self.mode);
        self.store(kind, v);
        v
    }

    /// Mark a knob as unset so it is omitted from the request.
    pub fn unset(&mut self, kind: ParamKind) {
        match kind {
            ParamKind::GuidanceScale => self.guidance_scale = None,
            ParamKind::InferenceSteps => self.inference_steps = None,
            ParamKind::Strength => self.strength = None,
            ParamKind::ImageCount => self.image_count = None,
        }
    }

    pub fn get(&self, kind: ParamKind) -> Option<f32> {
        match kind {
            ParamKind::GuidanceScale => self.guidance_scale,
            ParamKind::InferenceSteps => self.inference_steps.map(|v| v as f32),
            ParamKind::Strength => self.strength,
            ParamKind::ImageCount => self.image_count.map(|v| v as f32),
        }
    }

    /// Switch endpoint; stored values are re-clamped to the new ranges.
    pub fn set_mode(&mut self, mode: RequestMode) {
        self.mode = mode;
        for &kind in ParamKind::all() {
            if let Some(v) = self.get(kind) {
                self.set(kind, v);
            }
        }
    }

    /// Negative prompt as it goes on the wire, or `None` when empty.
    pub fn effective_negative_prompt(&self) -> Option<String> {
        let neg = self.negative_prompt.trim();
        if neg.is_empty() {
            return None;
        }
        if self.allow_sensitive {
            Some(neg.to_string())
        } else {
            Some(format!("{} {}", SAFETY_NEGATIVE_PREFIX, neg))
        }
    }

    /// Set numeric fields that apply to the current mode, as
    /// `(name, stringified value)` pairs.
    pub fn numeric_fields(&self) -> Vec<(&'static str, String)> {
        ParamKind::all()
            .iter()
            .filter(|kind| kind.applies_to(self.mode))
            .filter_map(|kind| {
                let v = self.get(*kind)?;
                let text = if kind.is_integer() {
                    format!("{}", v as u32)
                } else {
                    format!("{}", v)
                };
                Some((kind.field_name(), text))
            })
            .collect()
    }

    fn store(&mut self, kind: ParamKind, v: f32) {
        match kind {
            ParamKind::GuidanceScale => self.guidance_scale = Some(v),
            ParamKind::InferenceSteps => self.inference_steps = Some(v as u32),
            ParamKind::Strength => self.strength = Some(v),
            ParamKind::ImageCount => self.image_count = Some(v as u32),
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::new(RequestMode::Inpaint)
    }
}
