//! SVG output encoder.
//!
//! The composed canvas is embedded as a base64 PNG inside an SVG whose
//! `width`/`height` carry the physical size, so vector tools place the figure
//! at print size. The same document, in pixel units, feeds the PDF encoder.

use crate::color::Rgba;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt::Write as FmtWrite;

use super::png_encoder::PngEncoder;

/// Unit written on the root `width`/`height` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvgUnits {
    /// Inches derived from pixels and DPI.
    Physical,
    /// Plain user units equal to canvas pixels.
    Pixels,
}

/// SVG encoder wrapping a raster canvas.
#[derive(Debug, Clone)]
pub struct SvgEncoder {
    width: u32,
    height: u32,
    dpi: u32,
    units: SvgUnits,
    /// Background rectangle (None for transparent)
    background: Option<Rgba>,
    title: Option<String>,
}

impl SvgEncoder {
    /// Encoder for a `width` x `height` px canvas at `dpi`.
    #[must_use]
    pub fn new(width: u32, height: u32, dpi: u32) -> Self {
        Self {
            width,
            height,
            dpi: dpi.max(1),
            units: SvgUnits::Physical,
            background: None,
            title: None,
        }
    }

    /// Choose the root size unit.
    #[must_use]
    pub fn units(mut self, units: SvgUnits) -> Self {
        self.units = units;
        self
    }

    /// Set background color (None for transparent).
    #[must_use]
    pub fn background(mut self, color: Option<Rgba>) -> Self {
        self.background = color.filter(|c| c.a > 0);
        self
    }

    /// Set the document `<title>`.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn size_attr(&self, px: u32) -> String {
        match self.units {
            SvgUnits::Physical => format!("{:.4}in", f64::from(px) / f64::from(self.dpi)),
            SvgUnits::Pixels => px.to_string(),
        }
    }

    /// Render the document with `fb` embedded as a PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn render(&self, fb: &Framebuffer) -> Result<String> {
        let png_bytes = PngEncoder::new().dpi(self.dpi).encode(fb)?;
        let data = STANDARD.encode(&png_bytes);

        let mut svg = String::with_capacity(data.len() + 512);
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}" viewBox="0 0 {} {}">"#,
            self.size_attr(self.width),
            self.size_attr(self.height),
            self.width,
            self.height
        );
        if let Some(title) = &self.title {
            let _ = writeln!(svg, "  <title>{}</title>", escape_xml(title));
        }
        if let Some(bg) = self.background {
            let _ = writeln!(
                svg,
                r#"  <rect width="{}" height="{}" fill="{}"/>"#,
                self.width,
                self.height,
                rgba_to_css(&bg)
            );
        }
        let _ = writeln!(
            svg,
            r#"  <image x="0" y="0" width="{}" height="{}" preserveAspectRatio="none" xlink:href="data:image/png;base64,{data}"/>"#,
            self.width, self.height
        );
        svg.push_str("</svg>\n");
        Ok(svg)
    }
}

/// Convert RGBA to CSS color string.
fn rgba_to_css(color: &Rgba) -> String {
    if color.a == 255 {
        format!("rgb({},{},{})", color.r, color.g, color.b)
    } else {
        format!(
            "rgba({},{},{},{:.3})",
            color.r,
            color.g,
            color.b,
            f32::from(color.a) / 255.0
        )
    }
}

/// Escape XML special characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
