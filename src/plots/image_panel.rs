//! Raster image panels (`image_panel`).
//!
//! The image is decoded with the `image` crate, scaled with Lanczos3 to fit
//! the panel while keeping its aspect ratio, and centered. `fit: contain`
//! (default) letterboxes; `fit: cover` fills the panel and crops the excess.
//! Annotations are given in original-image pixels and pass through the same
//! transform as the image.

use super::axes::text_scale;
use super::{panel_framebuffer, InputKind, PanelInput, PanelParams, PlotRenderer, RenderResult};
use crate::error::RenderError;
use crate::framebuffer::Framebuffer;
use crate::layout::LayoutGeometry;
use crate::render::{draw_rect_outline, draw_text, text_height, text_width};
use crate::style::StyleBundle;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use std::path::Path;

const KIND: &str = "image_panel";
const PARAMS: &[&str] = &["fit", "border"];

/// How an image is fitted into its panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Whole image visible, padded on one axis.
    #[default]
    Contain,
    /// Panel filled, image cropped on one axis.
    Cover,
}

impl FitMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "contain" => Some(Self::Contain),
            "cover" => Some(Self::Cover),
            _ => None,
        }
    }
}

/// Transform from original-image pixels to panel pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageFit {
    /// Panel pixels per image pixel.
    pub scale: f64,
    /// Panel x of image x = 0 (negative when cropped).
    pub offset_x: f64,
    /// Panel y of image y = 0 (negative when cropped).
    pub offset_y: f64,
    /// Width of the whole scaled image.
    pub drawn_width: u32,
    /// Height of the whole scaled image.
    pub drawn_height: u32,
    /// Letterbox padding on each side, horizontally.
    pub pad_x: u32,
    /// Letterbox padding on each side, vertically.
    pub pad_y: u32,
    /// Whether part of the image falls outside the panel.
    pub clipped: bool,
}

impl ImageFit {
    /// Fit an `image_w` x `image_h` image into a `box_w` x `box_h` area whose
    /// top edge sits at `top` in panel coordinates.
    #[must_use]
    pub fn compute(image_w: u32, image_h: u32, box_w: u32, box_h: u32, top: u32, mode: FitMode) -> Self {
        let sx = f64::from(box_w) / f64::from(image_w.max(1));
        let sy = f64::from(box_h) / f64::from(image_h.max(1));
        let scale = match mode {
            FitMode::Contain => sx.min(sy),
            FitMode::Cover => sx.max(sy),
        };
        let drawn_width = ((f64::from(image_w) * scale).round() as u32).max(1);
        let drawn_height = ((f64::from(image_h) * scale).round() as u32).max(1);
        let offset_x = (f64::from(box_w) - f64::from(drawn_width)) / 2.0;
        let offset_y = (f64::from(box_h) - f64::from(drawn_height)) / 2.0;
        Self {
            scale,
            offset_x: offset_x.floor(),
            offset_y: offset_y.floor() + f64::from(top),
            drawn_width,
            drawn_height,
            pad_x: offset_x.max(0.0) as u32,
            pad_y: offset_y.max(0.0) as u32,
            clipped: drawn_width > box_w || drawn_height > box_h,
        }
    }

    /// Map an original-image coordinate into panel pixels.
    #[must_use]
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (self.offset_x + x * self.scale, self.offset_y + y * self.scale)
    }
}

fn decode(path: &Path) -> Result<image::RgbaImage, RenderError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| RenderError::ImageDecode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// `image_panel` renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePanelRenderer;

impl PlotRenderer for ImagePanelRenderer {
    fn kind(&self) -> &str {
        KIND
    }

    fn input(&self) -> InputKind {
        InputKind::Image
    }

    fn describe(&self) -> &str {
        "Raster image (microscopy, blots, photos) fitted to the panel"
    }

    fn parameters(&self) -> &[&str] {
        PARAMS
    }

    fn render(
        &self,
        input: PanelInput<'_>,
        geometry: &LayoutGeometry,
        style: &StyleBundle,
        params: &PanelParams<'_>,
    ) -> Result<RenderResult, RenderError> {
        params.check_known(KIND, PARAMS)?;
        let path = input.image(KIND)?;
        let mode = match params.str(KIND, "fit")? {
            None => FitMode::default(),
            Some(s) => FitMode::parse(s).ok_or_else(|| RenderError::InvalidParameter {
                kind: KIND.to_string(),
                param: "fit".to_string(),
                message: format!("expected contain or cover, got {s}"),
            })?,
        };

        let mut fb = panel_framebuffer(geometry)?;
        let (w, h) = (fb.width(), fb.height());
        let gap = style.px(2.0, params.dpi);
        let title_scale = text_scale(style.title_size_pt, params.dpi);
        let top = match params.title() {
            Some(_) => text_height(title_scale) + 2 * gap,
            None => 0,
        };
        let box_h = h.saturating_sub(top);
        if box_h == 0 {
            return Err(RenderError::InvalidRange {
                kind: KIND.to_string(),
                message: format!("panel {w}x{h} px has no room below the title"),
            });
        }

        let source = decode(path)?;
        let fit = ImageFit::compute(source.width(), source.height(), w, box_h, top, mode);
        let resized = imageops::resize(&source, fit.drawn_width, fit.drawn_height, FilterType::Lanczos3);

        let (x, y, visible) = if fit.clipped {
            let cx = (-fit.offset_x).max(0.0) as u32;
            let cy = (f64::from(top) - fit.offset_y).max(0.0) as u32;
            let crop = imageops::crop_imm(&resized, cx, cy, w.min(fit.drawn_width), box_h.min(fit.drawn_height)).to_image();
            (fit.offset_x.max(0.0) as u32, fit.offset_y.max(f64::from(top)) as u32, crop)
        } else {
            (fit.offset_x as u32, fit.offset_y as u32, resized)
        };
        let (vw, vh) = visible.dimensions();
        let raster = Framebuffer::from_rgba(vw, vh, visible.as_raw())?;
        fb.blit(&raster, x, y);

        if params.bool(KIND, "border")?.unwrap_or(false) {
            let lw = style.px(style.axis_width_pt, params.dpi);
            draw_rect_outline(&mut fb, x as i32, y as i32, vw, vh, style.foreground, lw);
        }

        for note in params.annotations() {
            let (ax, ay) = fit.map(note.x, note.y);
            let scale = text_scale(note.font_size_pt.unwrap_or(style.font_size_pt), params.dpi);
            draw_text(&mut fb, ax.round() as i32, ay.round() as i32, &note.text, scale, style.foreground);
        }

        if let Some(title) = params.title() {
            let tw = text_width(title, title_scale) as i32;
            draw_text(&mut fb, (w as i32 - tw) / 2, gap as i32, title, title_scale, style.foreground);
        }

        tracing::debug!(
            path = %path.display(),
            scale = fit.scale,
            clipped = fit.clipped,
            "image panel fitted"
        );
        let note = format!("{}x{} px image at scale {:.3}", source.width(), source.height(), fit.scale);
        let mut result = RenderResult::new(geometry, fb).with_note(note);
        result.fit = Some(fit);
        Ok(result)
    }
}
