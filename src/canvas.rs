//! Figure composition: panel rasters onto one canvas, then panel labels.
//!
//! Composition runs after every panel render has finished. Labels sit in a
//! small boxed badge at the top-left corner of their panel, inset by a
//! fraction of the style padding.

use crate::color::Rgba;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::geometry::PixelRect;
use crate::layout::{CanvasSize, GridLayout};
use crate::plots::RenderResult;
use crate::render::{draw_rect, draw_rect_outline, draw_text, scale_for_cap_height, text_height, text_width};
use crate::style::{pt_to_px, StyleBundle};
use serde::Serialize;

/// A drawn panel label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedLabel {
    /// Panel the label belongs to.
    pub panel_index: usize,
    /// Label text.
    pub text: String,
    /// Badge rectangle on the canvas.
    pub rect: PixelRect,
}

/// The assembled figure handed to export.
#[derive(Debug, Clone)]
pub struct ComposedFigure {
    /// Canvas pixels.
    pub framebuffer: Framebuffer,
    /// Pixel and physical size.
    pub canvas: CanvasSize,
    /// Background the canvas was cleared to.
    pub background: Rgba,
    /// Labels in panel order.
    pub labels: Vec<PlacedLabel>,
}

impl ComposedFigure {
    /// Whether the background lets the canvas show through.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.background.a < 255
    }
}

/// Blit every rendered panel at its placement and draw its label.
///
/// # Errors
///
/// Returns an error if the canvas dimensions are zero.
pub fn compose(layout: &GridLayout, results: &[RenderResult], style: &StyleBundle) -> Result<ComposedFigure> {
    let canvas = layout.canvas;
    let mut fb = Framebuffer::new(canvas.width_px, canvas.height_px)?;
    fb.clear(style.background);

    let mut ordered: Vec<&RenderResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.panel_index);

    for result in &ordered {
        fb.blit(&result.raster, result.placement.x, result.placement.y);
    }

    let mut labels = Vec::new();
    for result in &ordered {
        if let Some(text) = &result.label {
            let rect = draw_label(&mut fb, result.placement, text, style, canvas.dpi);
            labels.push(PlacedLabel {
                panel_index: result.panel_index,
                text: text.clone(),
                rect,
            });
        }
    }

    tracing::debug!(
        width = canvas.width_px,
        height = canvas.height_px,
        panels = ordered.len(),
        labels = labels.len(),
        "figure composed"
    );
    Ok(ComposedFigure {
        framebuffer: fb,
        canvas,
        background: style.background,
        labels,
    })
}

/// Draw a boxed label at the top-left of `panel`; returns the badge rectangle.
fn draw_label(fb: &mut Framebuffer, panel: PixelRect, text: &str, style: &StyleBundle, dpi: u32) -> PixelRect {
    let padding = pt_to_px(style.padding_pt, dpi);
    let inset = (padding * 0.3).round() as u32;
    let pad = ((padding * 0.1).round() as u32).max(1);
    let scale = scale_for_cap_height((pt_to_px(style.label_size_pt, dpi) * 0.7) as f32);

    let bold = u32::from(style.label_bold);
    let w = text_width(text, scale) + bold;
    let h = text_height(scale);
    let rect = PixelRect::new(panel.x + inset, panel.y + inset, w + 2 * pad, h + 2 * pad);

    let (x, y) = (rect.x as i32, rect.y as i32);
    let fill = if style.background.a == 0 { Rgba::WHITE } else { style.background };
    draw_rect(fb, x, y, rect.width, rect.height, fill);
    draw_rect_outline(fb, x, y, rect.width, rect.height, style.foreground, 1);
    let (tx, ty) = (x + pad as i32, y + pad as i32);
    draw_text(fb, tx, ty, text, scale, style.foreground);
    if style.label_bold {
        draw_text(fb, tx + 1, ty, text, scale, style.foreground);
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{GridCell, LayoutGeometry};

    fn layout() -> GridLayout {
        let canvas = CanvasSize { width_px: 200, height_px: 100, dpi: 150 };
        let geometry = |i: usize, x: u32, label: &str| LayoutGeometry {
            panel_index: i,
            rect: PixelRect::new(x, 10, 80, 80),
            cell: GridCell { row: 0, col: i, row_span: 1, col_span: 1 },
            label: Some(label.into()),
        };
        GridLayout {
            rows: 1,
            cols: 2,
            canvas,
            panels: vec![geometry(0, 10, "A"), geometry(1, 110, "B")],
        }
    }

    fn solid(geometry: &LayoutGeometry, color: Rgba) -> RenderResult {
        let mut fb = Framebuffer::new(geometry.rect.width, geometry.rect.height).unwrap();
        fb.clear(color);
        RenderResult::new(geometry, fb)
    }

    #[test]
    fn test_compose_places_panels_and_labels() {
        let layout = layout();
        let red = Rgba::rgb(255, 0, 0);
        let results: Vec<RenderResult> = layout.panels.iter().map(|g| solid(g, red)).rev().collect();
        let style = StyleBundle::default_style();
        let figure = compose(&layout, &results, &style).unwrap();

        assert_eq!(figure.framebuffer.width(), 200);
        assert_eq!(figure.framebuffer.get_pixel(5, 5), Some(style.background));
        assert_eq!(figure.framebuffer.get_pixel(85, 85), Some(red));
        assert_eq!(figure.framebuffer.get_pixel(150, 85), Some(red));
        let texts: Vec<&str> = figure.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
        assert!(figure.labels[1].rect.x >= 110);
    }

    #[test]
    fn test_failed_panel_leaves_background() {
        let layout = layout();
        let style = StyleBundle::default_style();
        let results = vec![solid(&layout.panels[0], Rgba::BLACK)];
        let figure = compose(&layout, &results, &style).unwrap();
        assert_eq!(figure.framebuffer.get_pixel(150, 85), Some(style.background));
        assert_eq!(figure.labels.len(), 1);
    }

    #[test]
    fn test_transparent_background() {
        let mut style = StyleBundle::default_style();
        style.background = Rgba::TRANSPARENT;
        let figure = compose(&layout(), &[], &style).unwrap();
        assert!(figure.is_transparent());
        assert_eq!(figure.framebuffer.get_pixel(0, 0), Some(Rgba::TRANSPARENT));
    }
}
