// ============================================================================
// OPS - submit-time work
// ============================================================================
//
//   mask.rs    - stroke rasterization into an image-resolution mask
//   request.rs - multipart assembly, HTTP transport, response decoding
// ============================================================================

pub mod mask;
pub mod request;
