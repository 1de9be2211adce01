//! Rendering backends and rasterization.
//!
//! Provides rasterization algorithms for geometric primitives and bitmap text.
//!
//! # Algorithms
//!
//! - **Bresenham's Line**: Fast non-antialiased line drawing (solid, thick, dashed)
//! - **Midpoint Circle**: Filled circle rendering for markers
//!
//! # References
//!
//! - Bresenham, J. E. (1965). "Algorithm for computer control of a digital plotter."

mod glyphs;
mod primitives;

pub use glyphs::{draw_text, scale_for_cap_height, text_height, text_width, GLYPH_HEIGHT, GLYPH_WIDTH};
pub use primitives::{
    draw_circle, draw_dashed_line, draw_line, draw_line_thick, draw_point, draw_rect,
    draw_rect_outline,
};
