// ============================================================================
// COMPONENTS - editor-side input state
// ============================================================================
//
//   strokes.rs - pointer-event stream → display-space stroke set
//   params.rs  - generation knobs: ranges, defaults, wire names
// ============================================================================

pub mod params;
pub mod strokes;
