// ============================================================================
// InpaintFE CLI - headless mask authoring + inference submission
// ============================================================================
//
// Usage examples:
//   InpaintFE -i photo.png -s strokes.json -p "a red door" --output-dir out/
//   InpaintFE -i photo.png -s strokes.json --mask-out mask.png --mask-only
//   InpaintFE -i photo.png -s strokes.json -p "sky" --steps 45 --unset strength
//   InpaintFE --generate -p "a lighthouse at dusk" --aspect 16:9 --image-count 3
//
// The stroke file is a recorded pointer session in viewport pixels (see
// `io::StrokeScript`). Everything runs on one thread; the network call is the
// only await point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::canvas::Viewport;
use crate::components::params::{AspectRatio, GenerationParams, ParamKind, RequestMode};
use crate::editor::EditorState;
use crate::error::InpaintError;
use crate::io::{StrokeScript, load_source, save_results, write_png};
use crate::ops::mask::Renderer;
use crate::ops::request::{GenerationRequest, InferenceClient};
use crate::settings::Settings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// InpaintFE headless inpainting client.
///
/// Replays a recorded brush session over an image, rasterizes the mask at the
/// image's native resolution, and submits image + mask + prompt for inpainting.
#[derive(Parser, Debug)]
#[command(
    name = "InpaintFE",
    about = "Paint an inpainting mask and submit it to an inference service",
    long_about = "Replay a recorded pointer session (JSON) over an image, rasterize the\n\
                  mask at the image's native resolution, and send image + mask + prompt\n\
                  to an inpainting endpoint. Results are written as result_<n>.png.\n\n\
                  Example:\n  \
                  InpaintFE -i photo.png -s strokes.json -p \"a red door\" --output-dir out/"
)]
pub struct CliArgs {
    /// Source image (PNG, JPEG, WEBP, BMP). Required unless --generate.
    #[arg(short, long, value_name = "FILE", required_unless_present = "generate")]
    pub image: Option<PathBuf>,

    /// Recorded pointer events in viewport coordinates. Omit for an empty mask.
    #[arg(short, long, value_name = "STROKES.json")]
    pub strokes: Option<PathBuf>,

    /// Text prompt.
    #[arg(short, long, default_value = "")]
    pub prompt: String,

    /// Negative prompt. Prefixed with a content filter unless --allow-sensitive.
    #[arg(long, value_name = "TEXT")]
    pub negative_prompt: Option<String>,

    /// Send the negative prompt without the content-filter prefix.
    #[arg(long)]
    pub allow_sensitive: bool,

    /// Guidance scale, 1–20 (default 7.5). Out-of-range values are clamped.
    #[arg(long, value_name = "1-20")]
    pub guidance_scale: Option<String>,

    /// Inference steps, 20–50 (default 30).
    #[arg(long, value_name = "20-50")]
    pub steps: Option<String>,

    /// Strength, 0–1 (default 0.8).
    #[arg(long, value_name = "0-1")]
    pub strength: Option<String>,

    /// Images to request: 1–4 for inpainting, 1–5 for --generate (default 1).
    #[arg(long, value_name = "N")]
    pub image_count: Option<String>,

    /// Leave a knob out of the request entirely: guidance, steps, strength, count.
    #[arg(long, value_name = "KNOB", num_args = 1..)]
    pub unset: Vec<String>,

    /// Viewport the strokes were recorded in, e.g. 800x600.
    /// Overrides the stroke file and settings.
    #[arg(long, value_name = "WxH")]
    pub viewport: Option<String>,

    /// Brush diameter in viewport pixels.
    #[arg(long, value_name = "PX")]
    pub stroke_width: Option<f32>,

    /// Inference service base URL.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Mask renderer: software, parallel.
    #[arg(long, value_name = "NAME")]
    pub renderer: Option<String>,

    /// Also write the rasterized mask PNG here.
    #[arg(long, value_name = "FILE")]
    pub mask_out: Option<PathBuf>,

    /// Stop after writing the mask; no network call.
    #[arg(long, requires = "mask_out")]
    pub mask_only: bool,

    /// Directory for result_<n>.png files.
    #[arg(short, long, default_value = "results", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Prompt-only text-to-image generation (no image, no mask).
    #[arg(long)]
    pub generate: bool,

    /// Aspect ratio for --generate: 1:1, 16:9, 9:16, 3:2, 2:3.
    #[arg(long, default_value = "1:1", value_name = "RATIO")]
    pub aspect: String,

    /// Persist the effective endpoint/viewport/brush/timeout/renderer settings.
    #[arg(long)]
    pub save_settings: bool,

    /// Session log location (default: per-user data directory).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Echo log lines and timing to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    match args.log_file.as_deref() {
        Some(path) => crate::logger::init_at(path),
        None => crate::logger::init(),
    }
    crate::logger::set_echo(args.verbose);

    let settings = match effective_settings(&args, Settings::load()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.save_settings {
        match settings.save() {
            Ok(path) => println!("Settings saved to {}", path.display()),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: could not start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    let outcome = if args.generate {
        runtime.block_on(run_generate(&args, &settings))
    } else {
        runtime.block_on(run_inpaint(&args, &settings))
    };

    match outcome {
        Ok(written) => {
            for path in &written {
                println!("  → {}", path.display());
            }
            if args.verbose {
                println!("done in {:.0}ms", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            crate::log_err!("CLI: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Layer CLI overrides on top of persisted settings.
pub fn effective_settings(args: &CliArgs, mut settings: Settings) -> Result<Settings, InpaintError> {
    if let Some(endpoint) = &args.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(vp) = &args.viewport {
        settings.viewport = Viewport::parse(vp)
            .ok_or_else(|| InpaintError::Geometry(format!("bad --viewport '{}', expected WxH", vp)))?;
    }
    if let Some(w) = args.stroke_width
        && w.is_finite()
        && w > 0.0
    {
        settings.stroke_width = w;
    }
    if let Some(t) = args.timeout
        && t > 0
    {
        settings.request_timeout_secs = t;
    }
    if let Some(name) = &args.renderer {
        settings.renderer = Renderer::parse(name).unwrap_or_else(|| {
            crate::log_warn!("CLI: unknown renderer '{}', using {}", name, settings.renderer.label());
            settings.renderer
        });
    }
    if args.allow_sensitive {
        settings.allow_sensitive = true;
    }
    Ok(settings)
}

/// Apply every knob flag to `params` through the validator.
pub fn apply_params(args: &CliArgs, params: &mut GenerationParams, allow_sensitive: bool) {
    let knobs = [
        (ParamKind::GuidanceScale, &args.guidance_scale),
        (ParamKind::InferenceSteps, &args.steps),
        (ParamKind::Strength, &args.strength),
        (ParamKind::ImageCount, &args.image_count),
    ];
    for (kind, raw) in knobs {
        if let Some(raw) = raw {
            let v = params.set_raw(kind, raw);
            if raw.trim().parse::<f32>().ok() != Some(v) {
                crate::log_info!("CLI: {} '{}' → {}", kind.field_name(), raw, v);
            }
        }
    }
    for name in &args.unset {
        match ParamKind::parse(name) {
            Some(kind) => params.unset(kind),
            None => {
                crate::log_warn!("CLI: ignoring unknown --unset '{}'", name);
            }
        }
    }
    if let Some(neg) = &args.negative_prompt {
        params.negative_prompt = neg.clone();
    }
    params.allow_sensitive = allow_sensitive;
}

// ============================================================================
// Pipelines
// ============================================================================

async fn run_inpaint(args: &CliArgs, settings: &Settings) -> Result<Vec<PathBuf>, InpaintError> {
    let image_path = args
        .image
        .as_deref()
        .ok_or_else(|| InpaintError::Io("--image is required".to_string()))?;

    let script = match &args.strokes {
        Some(path) => StrokeScript::load(path)?,
        None => StrokeScript::default(),
    };

    // --viewport wins over the recorded viewport, which wins over settings.
    let viewport = if args.viewport.is_some() {
        settings.viewport
    } else {
        script.viewport().unwrap_or(settings.viewport)
    };

    let mut editor =
        EditorState::new(viewport, settings.stroke_width).with_renderer(settings.renderer);
    editor.load_image(load_source(image_path)?)?;
    for event in &script.events {
        editor.pointer(*event)?;
    }
    // A script that ends mid-drag still counts the stroke.
    editor.pointer_up()?;

    editor.set_prompt(&args.prompt);
    let mut params = editor.params().clone();
    apply_params(args, &mut params, settings.allow_sensitive);
    apply_to_editor(&mut editor, &params);

    let mut written = Vec::new();
    if let Some(mask_path) = &args.mask_out {
        let mask = editor.rasterize_mask()?;
        write_png(mask_path, &mask.encode_png()?)?;
        crate::log_info!(
            "CLI: mask {}x{} ({} marked px) → {}",
            mask.width(),
            mask.height(),
            mask.marked_count(),
            mask_path.display()
        );
        written.push(mask_path.clone());
        if args.mask_only {
            return Ok(written);
        }
    }

    let client = InferenceClient::new(
        &settings.endpoint,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    let n = editor.submit(&client).await?;
    if n == 0 {
        println!("Service returned no images.");
    }
    let images = editor
        .result()
        .map(|r| r.images.as_slice())
        .unwrap_or_default();
    written.extend(save_results(&args.output_dir, images)?);
    Ok(written)
}

async fn run_generate(args: &CliArgs, settings: &Settings) -> Result<Vec<PathBuf>, InpaintError> {
    let mut params = GenerationParams::new(RequestMode::Generate);
    apply_params(args, &mut params, settings.allow_sensitive);
    params.aspect_ratio = AspectRatio::parse(&args.aspect).unwrap_or_else(|| {
        crate::log_warn!("CLI: unknown aspect '{}', using 1:1", args.aspect);
        AspectRatio::default()
    });

    let request = GenerationRequest::generate(&args.prompt, &params);
    let client = InferenceClient::new(
        &settings.endpoint,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    let result = client.send(&request).await?;
    if result.is_empty() {
        println!("Service returned no images.");
    }
    save_results(&args.output_dir, &result.images)
}

/// Push validated params into the editor one change event at a time.
fn apply_to_editor(editor: &mut EditorState, params: &GenerationParams) {
    for &kind in ParamKind::all() {
        match params.get(kind) {
            Some(v) => {
                editor.set_param_value(kind, v);
            }
            None => editor.unset_param(kind),
        }
    }
    editor.set_negative_prompt(&params.negative_prompt);
    editor.set_allow_sensitive(params.allow_sensitive);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("InpaintFE").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn image_required_unless_generate() {
        assert!(CliArgs::try_parse_from(["InpaintFE", "-p", "x"]).is_err());
        let a = parse(&["--generate", "-p", "a cat"]);
        assert!(a.generate && a.image.is_none());
    }

    #[test]
    fn mask_only_requires_mask_out() {
        assert!(CliArgs::try_parse_from(["InpaintFE", "-i", "a.png", "--mask-only"]).is_err());
    }

    #[test]
    fn overrides_layer_on_settings() {
        let a = parse(&[
            "-i", "a.png", "--viewport", "1024x768", "--endpoint", "http://x", "--renderer",
            "parallel", "--stroke-width", "0",
        ]);
        let s = effective_settings(&a, Settings::default()).unwrap();
        assert_eq!(s.viewport, Viewport::new(1024, 768));
        assert_eq!(s.endpoint, "http://x");
        assert_eq!(s.renderer, Renderer::Parallel);
        assert_eq!(s.stroke_width, Settings::default().stroke_width);

        let bad = parse(&["-i", "a.png", "--viewport", "huge"]);
        assert!(matches!(
            effective_settings(&bad, Settings::default()),
            Err(InpaintError::Geometry(_))
        ));
    }

    #[test]
    fn knob_flags_go_through_validator() {
        let a = parse(&[
            "-i", "a.png", "--guidance-scale", "999", "--steps", "5", "--strength", "",
            "--unset", "count",
        ]);
        let mut p = GenerationParams::default();
        apply_params(&a, &mut p, false);
        assert_eq!(p.guidance_scale, Some(20.0));
        assert_eq!(p.inference_steps, Some(20));
        assert_eq!(p.strength, Some(0.8));
        assert_eq!(p.image_count, None);
    }

    #[test]
    fn unknown_unset_name_is_ignored() {
        let a = parse(&["-i", "a.png", "--unset", "bogus", "steps"]);
        let mut p = GenerationParams::default();
        apply_params(&a, &mut p, false);
        assert_eq!(p.inference_steps, None);
        assert_eq!(p.guidance_scale, Some(7.5));
        assert_eq!(p.strength, Some(0.8));
        assert_eq!(p.image_count, Some(1));
    }

    #[test]
    fn mask_only_writes_mask_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let img_path = dir.path().join("src.png");
        let img = image::RgbaImage::from_pixel(200, 100, image::Rgba([10, 20, 30, 255]));
        write_png(&img_path, &crate::io::encode_png(&img).unwrap()).unwrap();
        let strokes = dir.path().join("s.json");
        std::fs::write(
            &strokes,
            r#"{"viewport":[400,200],"events":[{"down":[100,100]},{"move":[300,100]},"up"]}"#,
        )
        .unwrap();
        let mask_path = dir.path().join("out").join("mask.png");

        let a = parse(&[
            "-i",
            img_path.to_str().unwrap(),
            "-s",
            strokes.to_str().unwrap(),
            "--mask-out",
            mask_path.to_str().unwrap(),
            "--mask-only",
        ]);
        let settings = effective_settings(&a, Settings::default()).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let written = rt.block_on(run_inpaint(&a, &settings)).unwrap();
        assert_eq!(written, vec![mask_path.clone()]);

        let mask = crate::ops::mask::MaskImage::decode_png(&std::fs::read(&mask_path).unwrap())
            .unwrap();
        assert_eq!(mask.dimensions(), (200, 100));
        // viewport 400x200, image 200x100 → scale 2; line y=50 from x=50..150
        assert!(mask.is_marked(100, 50));
        assert!(!mask.is_marked(100, 5));
    }
}
