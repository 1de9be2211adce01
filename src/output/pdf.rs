//! PDF output via `usvg` + `svg2pdf`.
//!
//! The canvas is wrapped in a pixel-unit SVG and converted with the page DPI
//! set to the canvas DPI, so the page measures `px * 72 / dpi` points and the
//! raster is embedded at full resolution.

use super::svg::{SvgEncoder, SvgUnits};
use crate::color::Rgba;
use crate::error::ExportError;
use crate::framebuffer::Framebuffer;

fn pdf_err(message: String) -> ExportError {
    ExportError::Encode {
        format: "pdf".to_string(),
        message,
    }
}

/// Page size in PostScript points for a canvas at `dpi`.
#[must_use]
pub fn page_size_pt(width_px: u32, height_px: u32, dpi: u32) -> (f64, f64) {
    let to_pt = |px: u32| f64::from(px) * 72.0 / f64::from(dpi.max(1));
    (to_pt(width_px), to_pt(height_px))
}

/// Encode `fb` as a single-page PDF.
pub fn encode_pdf(fb: &Framebuffer, dpi: u32, background: Option<Rgba>) -> Result<Vec<u8>, ExportError> {
    let svg = SvgEncoder::new(fb.width(), fb.height(), dpi)
        .units(SvgUnits::Pixels)
        .background(background)
        .render(fb)
        .map_err(|e| pdf_err(e.to_string()))?;

    let tree = usvg::Tree::from_str(&svg, &usvg::Options::default()).map_err(|e| pdf_err(e.to_string()))?;
    let page = svg2pdf::PageOptions { dpi: dpi.max(1) as f32 };
    svg2pdf::to_pdf(&tree, svg2pdf::ConversionOptions::default(), page).map_err(|e| pdf_err(e.to_string()))
}
