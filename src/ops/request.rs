// ============================================================================
// REQUEST ASSEMBLY + INFERENCE CLIENT
// ============================================================================
//
// Wire contract (one mode only):
//   POST {endpoint}/inpaint   multipart: image, mask, prompt, [negative_prompt],
//                             [guidance_scale], [num_inference_steps],
//                             [strength], [image_count]
//   POST {endpoint}/generate  multipart: prompt, [negative_prompt],
//                             [guidance_scale], [num_inference_steps],
//                             [image_count], image_dimension (no strength)
//   200 → JSON { "images_base64": ["<base64 png>", ...] }
//
// Raw-binary image responses are not accepted.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::RgbaImage;
use reqwest::multipart::{Form, Part};

use crate::canvas::SourceImage;
use crate::components::params::{GenerationParams, RequestMode};
use crate::error::InpaintError;
use crate::ops::mask::MaskImage;

/// JSON key holding the result images.
pub const RESPONSE_IMAGES_KEY: &str = "images_base64";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A multipart field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    Text(String),
    Png { file_name: &'static str, bytes: Vec<u8> },
}

/// Everything needed for one outbound call, already validated and encoded.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub mode: RequestMode,
    pub image_png: Option<Vec<u8>>,
    pub mask_png: Option<Vec<u8>>,
    pub prompt: String,
    pub params: GenerationParams,
}

impl GenerationRequest {
    /// Inpainting request. The mask must match the source pixel-for-pixel in
    /// size; a mismatch would silently misalign the edit region.
    pub fn inpaint(
        source: &SourceImage,
        mask: &MaskImage,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Self, InpaintError> {
        if mask.dimensions() != source.dimensions() {
            return Err(InpaintError::Geometry(format!(
                "mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                source.width(),
                source.height()
            )));
        }
        let mut params = params.clone();
        params.set_mode(RequestMode::Inpaint);
        Ok(Self {
            mode: RequestMode::Inpaint,
            image_png: Some(crate::io::encode_png(source.pixels())?),
            mask_png: Some(mask.encode_png()?),
            prompt: prompt.to_string(),
            params,
        })
    }

    /// Prompt-only text-to-image request.
    pub fn generate(prompt: &str, params: &GenerationParams) -> Self {
        let mut params = params.clone();
        params.set_mode(RequestMode::Generate);
        Self {
            mode: RequestMode::Generate,
            image_png: None,
            mask_png: None,
            prompt: prompt.to_string(),
            params,
        }
    }

    pub fn endpoint_path(&self) -> &'static str {
        match self.mode {
            RequestMode::Inpaint => "/inpaint",
            RequestMode::Generate => "/generate",
        }
    }

    /// Ordered multipart fields as they go on the wire.
    pub fn fields(&self) -> Vec<(&'static str, FormValue)> {
        let mut out = Vec::new();
        if let Some(bytes) = &self.image_png {
            out.push((
                "image",
                FormValue::Png {
                    file_name: "image.png",
                    bytes: bytes.clone(),
                },
            ));
        }
        if let Some(bytes) = &self.mask_png {
            out.push((
                "mask",
                FormValue::Png {
                    file_name: "mask.png",
                    bytes: bytes.clone(),
                },
            ));
        }
        out.push(("prompt", FormValue::Text(self.prompt.clone())));
        if let Some(neg) = self.params.effective_negative_prompt() {
            out.push(("negative_prompt", FormValue::Text(neg)));
        }
        for (name, value) in self.params.numeric_fields() {
            out.push((name, FormValue::Text(value)));
        }
        if self.mode == RequestMode::Generate {
            out.push((
                "image_dimension",
                FormValue::Text(self.params.aspect_ratio.label().to_string()),
            ));
        }
        out
    }

    /// Build the reqwest multipart body.
    pub fn to_form(&self) -> Result<Form, InpaintError> {
        let mut form = Form::new();
        for (name, value) in self.fields() {
            form = match value {
                FormValue::Text(text) => form.text(name, text),
                FormValue::Png { file_name, bytes } => {
                    let part = Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str("image/png")
                        .map_err(|e| InpaintError::Encode(format!("{} part: {}", name, e)))?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// Decoded images from one successful response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationResult {
    pub images: Vec<RgbaImage>,
}

impl GenerationResult {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Decode a `{ "images_base64": [...] }` body.
///
/// A body that is not JSON, or an entry that is not a base64 PNG, is
/// `MalformedResponse`. A missing or non-array `images_base64` yields an empty
/// result.
pub fn decode_response(body: &[u8]) -> Result<GenerationResult, InpaintError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| InpaintError::MalformedResponse(format!("body is not JSON: {}", e)))?;

    let Some(entries) = value.get(RESPONSE_IMAGES_KEY).and_then(|v| v.as_array()) else {
        crate::log_warn!("Inference: response has no '{}' array", RESPONSE_IMAGES_KEY);
        return Ok(GenerationResult::default());
    };

    let mut images = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let b64 = entry.as_str().ok_or_else(|| {
            InpaintError::MalformedResponse(format!("{}[{}] is not a string", RESPONSE_IMAGES_KEY, i))
        })?;
        let bytes = BASE64.decode(b64.trim()).map_err(|e| {
            InpaintError::MalformedResponse(format!("{}[{}] base64: {}", RESPONSE_IMAGES_KEY, i, e))
        })?;
        let img = image::load_from_memory(&bytes).map_err(|e| {
            InpaintError::MalformedResponse(format!("{}[{}] image: {}", RESPONSE_IMAGES_KEY, i, e))
        })?;
        images.push(img.to_rgba8());
    }
    Ok(GenerationResult { images })
}

/// Async HTTP transport for [`GenerationRequest`]s.
#[derive(Clone, Debug)]
pub struct InferenceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl InferenceClient {
    /// `endpoint` is the service base URL; `/inpaint` or `/generate` is appended.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, InpaintError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InpaintError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn url_for(&self, request: &GenerationRequest) -> String {
        format!("{}{}", self.endpoint, request.endpoint_path())
    }

    /// Perform exactly one POST and decode the reply.
    pub async fn send(&self, request: &GenerationRequest) -> Result<GenerationResult, InpaintError> {
        let url = self.url_for(request);
        let form = request.to_form()?;
        crate::log_info!(
            "Inference: POST {} (prompt {} chars, mask {} bytes)",
            url,
            request.prompt.chars().count(),
            request.mask_png.as_ref().map_or(0, |m| m.len())
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| InpaintError::Network(format!("POST {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            crate::log_err!("Inference: {} returned {}", url, status);
            return Err(InpaintError::Network(format!("{}: {}", status, body.trim())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| InpaintError::Network(format!("reading body from {}: {}", url, e)))?;
        let result = decode_response(&body)?;
        crate::log_info!("Inference: received {} image(s)", result.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::params::ParamKind;
    use image::Rgba;

    fn png_b64(w: u32, h: u32) -> String {
        let img = RgbaImage::from_pixel(w, h, Rgba([9, 8, 7, 255]));
        BASE64.encode(crate::io::encode_png(&img).unwrap())
    }

    #[test]
    fn decodes_image_array() {
        let body = format!(r#"{{"images_base64":["{}","{}"]}}"#, png_b64(3, 2), png_b64(1, 1));
        let res = decode_response(body.as_bytes()).unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res.images[0].dimensions(), (3, 2));
    }

    #[test]
    fn missing_field_is_empty_result() {
        assert!(decode_response(br#"{"other":1}"#).unwrap().is_empty());
        assert!(decode_response(br#"{"images_base64":null}"#).unwrap().is_empty());
    }

    #[test]
    fn bad_payloads_are_malformed() {
        let bodies: [&[u8]; 4] = [
            b"<html>oops</html>",
            br#"{"images_base64":[42]}"#,
            br#"{"images_base64":["!!!not base64!!!"]}"#,
            br#"{"images_base64":["aGVsbG8="]}"#,
        ];
        for body in bodies {
            assert!(matches!(
                decode_response(body),
                Err(InpaintError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn inpaint_fields_in_wire_order() {
        let src = SourceImage::new(RgbaImage::new(4, 3)).unwrap();
        let mask = MaskImage::empty(4, 3);
        let mut params = GenerationParams::default();
        params.unset(ParamKind::Strength);
        params.negative_prompt = "text".into();
        let req = GenerationRequest::inpaint(&src, &mask, "a red door", &params).unwrap();
        let names: Vec<&str> = req.fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "image",
                "mask",
                "prompt",
                "negative_prompt",
                "guidance_scale",
                "num_inference_steps",
                "image_count"
            ]
        );
        assert_eq!(req.endpoint_path(), "/inpaint");
    }

    #[test]
    fn mismatched_mask_is_geometry_error() {
        let src = SourceImage::new(RgbaImage::new(4, 3)).unwrap();
        let mask = MaskImage::empty(8, 6);
        let err = GenerationRequest::inpaint(&src, &mask, "", &GenerationParams::default());
        assert!(matches!(err, Err(InpaintError::Geometry(_))));
    }

    #[test]
    fn generate_has_no_image_and_sends_dimension() {
        let mut params = GenerationParams::new(RequestMode::Generate);
        params.set(ParamKind::ImageCount, 5.0);
        let req = GenerationRequest::generate("a cat", &params);
        let fields = req.fields();
        assert!(fields.iter().all(|(n, _)| *n != "image" && *n != "mask"));
        assert!(fields.contains(&("image_dimension", FormValue::Text("1:1".into()))));
        assert!(fields.contains(&("image_count", FormValue::Text("5".into()))));
        assert!(fields.iter().all(|(n, _)| *n != "strength"));
        assert_eq!(req.endpoint_path(), "/generate");
    }

    #[test]
    fn inpaint_reclamps_count_to_four() {
        let src = SourceImage::new(RgbaImage::new(2, 2)).unwrap();
        let mut params = GenerationParams::new(RequestMode::Generate);
        params.set(ParamKind::ImageCount, 5.0);
        let req = GenerationRequest::inpaint(&src, &MaskImage::empty(2, 2), "x", &params).unwrap();
        assert_eq!(req.params.image_count, Some(4));
    }
}
