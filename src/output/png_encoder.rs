//! PNG output encoder.
//!
//! Pure Rust PNG encoding using the `png` crate. Resolution goes into the
//! `pHYs` chunk (pixels per metre) and provenance into `tEXt` chunks.

use crate::error::{ExportError, Result};
use crate::framebuffer::Framebuffer;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Metres per inch.
const METRES_PER_INCH: f64 = 0.0254;

/// PNG encoder for framebuffer output.
#[derive(Debug, Clone, Default)]
pub struct PngEncoder {
    dpi: Option<u32>,
    text: Vec<(String, String)>,
}

impl PngEncoder {
    /// Encoder without resolution or text metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `dpi` in the `pHYs` chunk.
    #[must_use]
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    /// Add a `tEXt` keyword/value pair.
    #[must_use]
    pub fn text(mut self, keyword: impl Into<String>, value: impl Into<String>) -> Self {
        self.text.push((keyword.into(), value.into()));
        self
    }

    /// Encode a framebuffer to PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn encode(&self, fb: &Framebuffer) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buffer, fb.width(), fb.height());
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            if let Some(dpi) = self.dpi {
                let ppm = dpi_to_ppm(dpi);
                encoder.set_pixel_dims(Some(png::PixelDimensions {
                    xppu: ppm,
                    yppu: ppm,
                    unit: png::Unit::Meter,
                }));
            }
            for (keyword, value) in &self.text {
                encoder.add_text_chunk(keyword.clone(), value.clone())?;
            }

            let mut writer = encoder.write_header()?;
            // Use compact pixels to handle stride padding
            writer.write_image_data(&fb.to_compact_pixels())?;
        }
        Ok(buffer)
    }
}

/// Pixels per metre for a DPI value, rounded.
#[must_use]
pub fn dpi_to_ppm(dpi: u32) -> u32 {
    (f64::from(dpi) / METRES_PER_INCH).round() as u32
}

/// DPI for a pixels-per-metre value, rounded.
#[must_use]
pub fn ppm_to_dpi(ppm: u32) -> u32 {
    (f64::from(ppm) * METRES_PER_INCH).round() as u32
}

/// Read the resolution recorded in a PNG file's `pHYs` chunk.
///
/// Returns `Ok(None)` when the file has no `pHYs` chunk or records only an
/// aspect ratio.
pub fn inspect_png_dpi(path: &Path) -> std::result::Result<Option<(u32, u32)>, ExportError> {
    let io_err = |message: String| ExportError::Io {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|e| io_err(e.to_string()))?;
    let reader = png::Decoder::new(BufReader::new(file))
        .read_info()
        .map_err(|e| ExportError::Encode {
            format: "png".to_string(),
            message: e.to_string(),
        })?;
    Ok(reader.info().pixel_dims.and_then(|dims| match dims.unit {
        png::Unit::Meter => Some((ppm_to_dpi(dims.xppu), ppm_to_dpi(dims.yppu))),
        png::Unit::Unspecified => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    #[test]
    fn test_png_to_bytes() {
        let mut fb = Framebuffer::new(10, 10).unwrap();
        fb.clear(Rgba::BLACK);

        let bytes = PngEncoder::new().encode(&fb).unwrap();
        // PNG magic bytes
        assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_ppm_round_trip() {
        for dpi in [72, 150, 300, 600, 1200] {
            assert_eq!(ppm_to_dpi(dpi_to_ppm(dpi)), dpi);
        }
        assert_eq!(dpi_to_ppm(600), 23622);
    }

    #[test]
    fn test_dpi_and_text_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        let fb = Framebuffer::new(4, 3).unwrap();
        let bytes = PngEncoder::new().dpi(600).text("Software", "trueno-fig").encode(&fb).unwrap();
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(inspect_png_dpi(&path).unwrap(), Some((600, 600)));
        let reader = png::Decoder::new(File::open(&path).unwrap()).read_info().unwrap();
        let text = &reader.info().uncompressed_latin1_text;
        assert_eq!(text[0].keyword, "Software");
        assert_eq!(text[0].text, "trueno-fig");
    }

    #[test]
    fn test_no_phys_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.png");
        std::fs::write(&path, PngEncoder::new().encode(&Framebuffer::new(2, 2).unwrap()).unwrap()).unwrap();
        assert_eq!(inspect_png_dpi(&path).unwrap(), None);
    }
}
