//! TIFF and JPEG encoders.
//!
//! TIFF keeps the alpha channel and records resolution in inches. JPEG has
//! no alpha, so the canvas is flattened on white first; resolution goes into
//! the JFIF density fields.

use crate::color::Rgba;
use crate::error::ExportError;
use crate::framebuffer::Framebuffer;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::ExtendedColorType;
use std::io::Cursor;
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::ResolutionUnit;

/// Default JPEG quality when no configuration overrides it.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

fn encode_err(format: &str) -> impl Fn(String) -> ExportError + '_ {
    move |message| ExportError::Encode {
        format: format.to_string(),
        message,
    }
}

/// Encode RGBA TIFF bytes with `XResolution`/`YResolution` set to `dpi`.
pub fn encode_tiff(fb: &Framebuffer, dpi: u32) -> Result<Vec<u8>, ExportError> {
    let err = encode_err("tiff");
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).map_err(|e| err(e.to_string()))?;
        let mut image = encoder
            .new_image::<colortype::RGBA8>(fb.width(), fb.height())
            .map_err(|e| err(e.to_string()))?;
        image.resolution(ResolutionUnit::Inch, Rational { n: dpi, d: 1 });
        image
            .write_data(&fb.to_compact_pixels())
            .map_err(|e| err(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Encode JPEG bytes at `quality` (1..=100) with JFIF density `dpi`.
pub fn encode_jpeg(fb: &Framebuffer, dpi: u32, quality: u8) -> Result<Vec<u8>, ExportError> {
    let err = encode_err("jpeg");
    let rgb = fb.to_rgb_over(Rgba::WHITE);
    let density = u16::try_from(dpi).map_err(|_| err(format!("{dpi} DPI exceeds the JFIF density range")))?;

    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder.set_pixel_density(PixelDensity::dpi(density));
    encoder
        .encode(&rgb, fb.width(), fb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| err(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::decoder::Decoder;
    use tiff::decoder::ifd::Value;
    use tiff::tags::Tag;

    fn canvas() -> Framebuffer {
        let mut fb = Framebuffer::new(32, 16).unwrap();
        fb.fill_rect(0, 0, 8, 16, Rgba::rgb(200, 0, 0));
        fb
    }

    #[test]
    fn test_tiff_resolution_tags() {
        let bytes = encode_tiff(&canvas(), 600).unwrap();
        let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (32, 16));
        let x = decoder.get_tag(Tag::XResolution).unwrap();
        assert!(matches!(x, Value::Rational(600, 1)), "{x:?}");
        assert_eq!(decoder.get_tag_u32(Tag::ResolutionUnit).unwrap(), 2);
    }

    #[test]
    fn test_jpeg_density_and_flatten() {
        let bytes = encode_jpeg(&canvas(), 300, 90).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
        // JFIF APP0: units byte then big-endian X and Y density
        let jfif = bytes.windows(5).position(|w| w == b"JFIF\0").unwrap();
        assert_eq!(bytes[jfif + 7], 1);
        assert_eq!(u16::from_be_bytes([bytes[jfif + 8], bytes[jfif + 9]]), 300);

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        // transparent half flattened on white
        assert!(decoded.get_pixel(28, 8).0.iter().all(|&c| c > 240));
    }

    #[test]
    fn test_jpeg_rejects_huge_dpi() {
        assert!(matches!(
            encode_jpeg(&canvas(), 70_000, 90),
            Err(ExportError::Encode { .. })
        ));
    }
}
