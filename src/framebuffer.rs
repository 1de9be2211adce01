//! Core framebuffer for pixel rendering.
//!
//! Provides a SIMD-aligned RGBA pixel buffer. Panels render into their own
//! framebuffer and are then blitted onto the figure canvas. Uses trueno for
//! SIMD-accelerated vector operations where applicable.

use crate::color::Rgba;
use crate::error::{Error, Result};
use trueno::Vector;

/// Alignment for SIMD operations (64 bytes for AVX-512).
const SIMD_ALIGNMENT: usize = 64;

/// SIMD-aligned framebuffer for efficient pixel operations.
///
/// Rows are padded to a 64-byte stride; use [`Framebuffer::to_compact_pixels`]
/// when an encoder needs tightly packed data.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    /// Width in pixels.
    width: u32,
    /// Height in pixels.
    height: u32,
    /// RGBA pixels in row-major order, `stride` bytes per row.
    pixels: Vec<u8>,
    /// Stride in bytes (may include padding for alignment).
    stride: usize,
}

impl Framebuffer {
    /// Create a new, fully transparent framebuffer.
    ///
    /// # Errors
    ///
    /// Returns an error if width or height is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use trueno_fig::framebuffer::Framebuffer;
    ///
    /// let fb = Framebuffer::new(800, 600).unwrap();
    /// assert_eq!(fb.width(), 800);
    /// assert_eq!(fb.height(), 600);
    /// ```
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }

        let row_bytes = (width as usize) * 4;
        let stride = (row_bytes + SIMD_ALIGNMENT - 1) & !(SIMD_ALIGNMENT - 1);
        let size = stride * (height as usize);

        let mut pixels = Vec::with_capacity(size + SIMD_ALIGNMENT);
        pixels.resize(size, 0);

        Ok(Self {
            width,
            height,
            pixels,
            stride,
        })
    }

    /// Build a framebuffer from tightly packed RGBA8 data.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or `data` has the wrong length.
    pub fn from_rgba(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        let mut fb = Self::new(width, height)?;
        let row_bytes = (width as usize) * 4;
        if data.len() != row_bytes * height as usize {
            return Err(Error::InvalidDimensions { width, height });
        }
        for (y, src) in data.chunks_exact(row_bytes).enumerate() {
            let start = y * fb.stride;
            fb.pixels[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(fb)
    }

    /// Get the width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Get the height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Get the total number of pixels.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Get a row of pixels as a slice.
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = (y as usize) * self.stride;
        let end = start + (self.width as usize) * 4;
        Some(&self.pixels[start..end])
    }

    /// Clear the framebuffer to a solid color.
    pub fn clear(&mut self, color: Rgba) {
        let [r, g, b, a] = color.to_array();

        // 64-byte pattern (16 pixels) for SIMD-friendly memset
        let pattern: [u8; 64] = {
            let mut p = [0u8; 64];
            for i in 0..16 {
                p[i * 4] = r;
                p[i * 4 + 1] = g;
                p[i * 4 + 2] = b;
                p[i * 4 + 3] = a;
            }
            p
        };

        for y in 0..self.height {
            let row_start = (y as usize) * self.stride;
            let row_end = row_start + (self.width as usize) * 4;
            let row = &mut self.pixels[row_start..row_end];

            let mut offset = 0;
            while offset + 64 <= row.len() {
                row[offset..offset + 64].copy_from_slice(&pattern);
                offset += 64;
            }

            for chunk in row[offset..].chunks_exact_mut(4) {
                chunk.copy_from_slice(&[r, g, b, a]);
            }
        }
    }

    /// Fill a rectangular region with a solid color.
    ///
    /// Coordinates are clamped to framebuffer bounds.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgba) {
        let x1 = x.min(self.width);
        let y1 = y.min(self.height);
        let x2 = x.saturating_add(w).min(self.width);
        let y2 = y.saturating_add(h).min(self.height);

        if x1 >= x2 || y1 >= y2 {
            return;
        }

        let rgba = color.to_array();
        let rect_width = (x2 - x1) as usize;

        for row_y in y1..y2 {
            let row_start = (row_y as usize) * self.stride + (x1 as usize) * 4;
            let row = &mut self.pixels[row_start..row_start + rect_width * 4];
            for chunk in row.chunks_exact_mut(4) {
                chunk.copy_from_slice(&rgba);
            }
        }
    }

    /// Get the color at a specific pixel coordinate.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    #[must_use]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let idx = self.pixel_index(x, y);
        Some(Rgba::from_array([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]))
    }

    /// Set the color at a specific pixel coordinate.
    ///
    /// Does nothing if the coordinates are out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }

        let idx = self.pixel_index(x, y);
        self.pixels[idx..idx + 4].copy_from_slice(&color.to_array());
    }

    /// Blend a color at a specific pixel coordinate using alpha blending.
    ///
    /// Uses the standard "over" compositing operation:
    /// `out = src * src_alpha + dst * dst_alpha * (1 - src_alpha)`
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }

        let idx = self.pixel_index(x, y);
        blend_into(&mut self.pixels[idx..idx + 4], color);
    }

    /// Composite `src` with its top-left corner at (`x`, `y`).
    ///
    /// Opaque source pixels are copied, translucent ones blended; anything
    /// falling outside this framebuffer is clipped.
    pub fn blit(&mut self, src: &Framebuffer, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let copy_w = src.width.min(self.width - x) as usize;
        let copy_h = src.height.min(self.height - y);

        for sy in 0..copy_h {
            let src_start = (sy as usize) * src.stride;
            let src_row = &src.pixels[src_start..src_start + copy_w * 4];
            let dst_start = ((y + sy) as usize) * self.stride + (x as usize) * 4;
            let dst_row = &mut self.pixels[dst_start..dst_start + copy_w * 4];

            if src_row.chunks_exact(4).all(|p| p[3] == 255) {
                dst_row.copy_from_slice(src_row);
                continue;
            }
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                match s[3] {
                    0 => {}
                    255 => d.copy_from_slice(s),
                    _ => blend_into(d, Rgba::new(s[0], s[1], s[2], s[3])),
                }
            }
        }
    }

    /// Flatten onto an opaque background and return packed RGB8 data.
    ///
    /// Used by encoders without alpha support (JPEG). The per-row blend
    /// `out = src * a + bg * (1 - a)` runs on trueno vectors.
    #[must_use]
    pub fn to_rgb_over(&self, background: Rgba) -> Vec<u8> {
        let w = self.width as usize;
        let bg = [
            f32::from(background.r),
            f32::from(background.g),
            f32::from(background.b),
        ];
        let mut out = Vec::with_capacity(w * 3 * self.height as usize);

        for y in 0..self.height {
            let Some(row) = self.row(y) else { continue };

            let mut src = Vec::with_capacity(w * 3);
            let mut alpha = Vec::with_capacity(w * 3);
            let mut base = Vec::with_capacity(w * 3);
            for px in row.chunks_exact(4) {
                let a = f32::from(px[3]) / 255.0;
                for c in 0..3 {
                    src.push(f32::from(px[c]));
                    alpha.push(a);
                    base.push(bg[c] * (1.0 - a));
                }
            }

            let blended = Vector::from_vec(src.clone())
                .mul(&Vector::from_vec(alpha.clone()))
                .and_then(|fg| fg.add(&Vector::from_vec(base.clone())));
            match blended {
                Ok(v) => out.extend(v.as_slice().iter().map(|&c| c.round().clamp(0.0, 255.0) as u8)),
                Err(_) => out.extend(
                    src.iter()
                        .zip(&alpha)
                        .zip(&base)
                        .map(|((s, a), b)| (s * a + b).round().clamp(0.0, 255.0) as u8),
                ),
            }
        }
        out
    }

    /// Get statistics about the framebuffer using SIMD-accelerated reduction.
    ///
    /// Returns (min_luminance, max_luminance, avg_luminance).
    #[must_use]
    pub fn luminance_stats(&self) -> (f32, f32, f32) {
        let mut luminances = Vec::with_capacity(self.pixel_count());

        for y in 0..self.height {
            if let Some(row) = self.row(y) {
                for chunk in row.chunks_exact(4) {
                    // ITU-R BT.709 luminance formula
                    let lum = 0.2126 * f32::from(chunk[0])
                        + 0.7152 * f32::from(chunk[1])
                        + 0.0722 * f32::from(chunk[2]);
                    luminances.push(lum);
                }
            }
        }

        let vec = Vector::from_vec(luminances);

        let min = vec.min().unwrap_or(0.0);
        let max = vec.max().unwrap_or(255.0);
        let mean = vec.mean().unwrap_or(127.5);

        (min, max, mean)
    }

    /// Calculate the byte index for a pixel coordinate.
    #[inline]
    fn pixel_index(&self, x: u32, y: u32) -> usize {
        (y as usize) * self.stride + (x as usize) * 4
    }

    /// Get pixel data as a compact buffer without stride padding.
    ///
    /// This is useful for encoding to formats like PNG that expect
    /// tightly-packed pixel data.
    #[must_use]
    pub fn to_compact_pixels(&self) -> Vec<u8> {
        let row_bytes = (self.width as usize) * 4;

        if self.stride == row_bytes {
            return self.pixels[..row_bytes * (self.height as usize)].to_vec();
        }

        let mut compact = Vec::with_capacity(row_bytes * (self.height as usize));
        for y in 0..self.height {
            let start = (y as usize) * self.stride;
            compact.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        compact
    }
}

#[inline]
fn blend_into(dst: &mut [u8], color: Rgba) {
    let src_a = f32::from(color.a) / 255.0;
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    if out_a > 0.0 {
        let blend = |src: u8, dst: u8| -> u8 {
            let src_f = f32::from(src) / 255.0;
            let dst_f = f32::from(dst) / 255.0;
            let out = (src_f * src_a + dst_f * dst_a * (1.0 - src_a)) / out_a;
            (out * 255.0).round() as u8
        };

        dst[0] = blend(color.r, dst[0]);
        dst[1] = blend(color.g, dst[1]);
        dst[2] = blend(color.b, dst[2]);
        dst[3] = (out_a * 255.0).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_framebuffer() {
        let fb = Framebuffer::new(100, 50).unwrap();
        assert_eq!(fb.width(), 100);
        assert_eq!(fb.height(), 50);
        assert_eq!(fb.pixel_count(), 5000);
        assert_eq!(fb.get_pixel(0, 0), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(Framebuffer::new(0, 100).is_err());
        assert!(Framebuffer::new(100, 0).is_err());
    }

    #[test]
    fn test_clear_large() {
        let mut fb = Framebuffer::new(1920, 1080).unwrap();
        fb.clear(Rgba::WHITE);

        assert_eq!(fb.get_pixel(0, 0), Some(Rgba::WHITE));
        assert_eq!(fb.get_pixel(1919, 1079), Some(Rgba::WHITE));
    }

    #[test]
    fn test_fill_rect_clamped() {
        let mut fb = Framebuffer::new(100, 100).unwrap();
        fb.clear(Rgba::WHITE);
        fb.fill_rect(90, 90, u32::MAX, 20, Rgba::BLACK);

        assert_eq!(fb.get_pixel(95, 95), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(85, 85), Some(Rgba::WHITE));
    }

    #[test]
    fn test_blend_pixel() {
        let mut fb = Framebuffer::new(10, 10).unwrap();
        fb.clear(Rgba::WHITE);
        fb.blend_pixel(5, 5, Rgba::new(255, 0, 0, 128));

        let result = fb.get_pixel(5, 5).unwrap();
        assert_eq!(result.r, 255);
        assert!(result.g > 100 && result.g < 150);
        assert_eq!(result.a, 255);
    }

    #[test]
    fn test_from_rgba_round_trip() {
        let data: Vec<u8> = (0..3 * 2 * 4).map(|i| i as u8).collect();
        let fb = Framebuffer::from_rgba(3, 2, &data).unwrap();
        assert_eq!(fb.to_compact_pixels(), data);
        assert!(Framebuffer::from_rgba(3, 2, &data[..4]).is_err());
    }

    #[test]
    fn test_blit_clips_and_skips_transparent() {
        let mut canvas = Framebuffer::new(20, 20).unwrap();
        canvas.clear(Rgba::WHITE);

        let mut panel = Framebuffer::new(10, 10).unwrap();
        panel.fill_rect(0, 0, 5, 10, Rgba::BLACK);
        canvas.blit(&panel, 15, 15);

        assert_eq!(canvas.get_pixel(15, 15), Some(Rgba::BLACK));
        assert_eq!(canvas.get_pixel(19, 19), Some(Rgba::BLACK));
        // transparent half of the panel leaves the canvas untouched
        let mut wide = Framebuffer::new(10, 10).unwrap();
        wide.fill_rect(0, 0, 5, 10, Rgba::BLACK);
        canvas.blit(&wide, 0, 0);
        assert_eq!(canvas.get_pixel(7, 2), Some(Rgba::WHITE));
    }

    #[test]
    fn test_to_rgb_over_flattens_alpha() {
        let mut fb = Framebuffer::new(4, 1).unwrap();
        fb.set_pixel(0, 0, Rgba::BLACK);
        fb.set_pixel(1, 0, Rgba::new(0, 0, 0, 128));

        let rgb = fb.to_rgb_over(Rgba::WHITE);
        assert_eq!(rgb.len(), 12);
        assert_eq!(&rgb[0..3], &[0, 0, 0]);
        assert!(rgb[3] > 120 && rgb[3] < 135);
        assert_eq!(&rgb[6..9], &[255, 255, 255]);
    }

    #[test]
    fn test_luminance_stats() {
        let mut fb = Framebuffer::new(10, 10).unwrap();
        fb.clear(Rgba::rgb(128, 128, 128));

        let (min, max, mean) = fb.luminance_stats();
        assert!((min - max).abs() < 1.0);
        assert!((mean - min).abs() < 1.0);
    }
}
