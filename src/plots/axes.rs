//! Shared chart frame: plot area, axes, ticks and titles.

use crate::color::Rgba;
use crate::error::RenderError;
use crate::framebuffer::Framebuffer;
use crate::geometry::PixelRect;
use crate::render::{draw_line_thick, draw_text, scale_for_cap_height, text_height, text_width};
use crate::scale::{LinearScale, Scale};
use crate::style::{pt_to_px, StyleBundle};

/// Cap height as a fraction of the nominal font size.
const CAP_RATIO: f64 = 0.7;

/// Glyph scale for text of `size_pt` at `dpi`.
pub(crate) fn text_scale(size_pt: f64, dpi: u32) -> u32 {
    scale_for_cap_height((pt_to_px(size_pt, dpi) * CAP_RATIO) as f32)
}

/// "Nice" tick positions covering `[min, max]`, about `target` of them.
pub(crate) fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || max <= min || target == 0 {
        return Vec::new();
    }
    let raw = (max - min) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (min / step).ceil() * step;
    let mut ticks = Vec::new();
    let mut v = first;
    while v <= max + step * 1e-9 {
        // Snap -0.0 and float noise.
        let snapped = (v / step).round() * step;
        ticks.push(if snapped == 0.0 { 0.0 } else { snapped });
        v += step;
    }
    ticks
}

/// Tick label with just enough decimals for `step`.
pub(crate) fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 || step <= 0.0 {
        0
    } else {
        (-step.log10().floor()) as usize
    };
    format!("{value:.decimals$}")
}

/// `[lo, hi]` widened by `pad` of its span on both sides; a constant
/// range becomes one unit wide.
pub(crate) fn padded_domain(lo: f64, hi: f64, pad: f64) -> (f64, f64) {
    let margin = (hi - lo) * pad;
    if margin < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo - margin, hi + margin)
    }
}

/// Widest tick label over `[lo, hi]`, in characters.
pub(crate) fn tick_label_chars(lo: f64, hi: f64) -> usize {
    let ticks = nice_ticks(lo, hi, 5);
    let step = tick_step(&ticks);
    ticks.iter().map(|t| format_tick(*t, step).len()).max().unwrap_or(3)
}

/// Spacing of an evenly spaced tick list.
pub(crate) fn tick_step(ticks: &[f64]) -> f64 {
    match ticks {
        [a, b, ..] => b - a,
        _ => 1.0,
    }
}

/// Pixel layout of a chart inside a panel framebuffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    /// Data area, in panel pixels.
    pub plot: PixelRect,
    /// Glyph scale for tick labels.
    pub tick_scale: u32,
    /// Glyph scale for the title and axis titles.
    pub title_scale: u32,
    /// Axis stroke in pixels.
    pub axis_px: u32,
    /// Data stroke in pixels.
    pub line_px: u32,
    /// Tick length in pixels.
    pub tick_len: u32,
    /// Gap between text and lines.
    pub gap: u32,
}

impl Frame {
    /// Reserve room for a title, tick labels (`y_label_chars` wide) and
    /// axis titles inside a `width` x `height` panel.
    pub(crate) fn new(
        kind: &str,
        width: u32,
        height: u32,
        style: &StyleBundle,
        dpi: u32,
        title: bool,
        y_label_chars: usize,
    ) -> Result<Self, RenderError> {
        let tick_scale = text_scale(style.tick_size_pt, dpi);
        let title_scale = text_scale(style.title_size_pt, dpi);
        let axis_px = style.px(style.axis_width_pt, dpi);
        let line_px = style.px(style.line_width_pt, dpi);
        let tick_len = style.px(3.0, dpi);
        let gap = style.px(2.0, dpi);

        let tick_text_h = text_height(tick_scale);
        let title_h = text_height(title_scale);
        let y_label_w = text_width(&"0".repeat(y_label_chars.max(1)), tick_scale);

        // Axis titles sit above the y axis and below the x tick labels.
        let left = y_label_w + tick_len + 2 * gap + axis_px;
        let bottom = tick_text_h + tick_len + title_h + 3 * gap + axis_px;
        let top = title_h + 2 * gap + if title { title_h + gap } else { 0 };
        let right = gap * 2 + tick_scale * 3;

        let plot_w = width.saturating_sub(left + right);
        let plot_h = height.saturating_sub(top + bottom);
        if plot_w < 8 || plot_h < 8 {
            return Err(RenderError::InvalidRange {
                kind: kind.to_string(),
                message: format!("panel {width}x{height} px leaves no room for the plot area"),
            });
        }

        Ok(Self {
            plot: PixelRect::new(left, top, plot_w, plot_h),
            tick_scale,
            title_scale,
            axis_px,
            line_px,
            tick_len,
            gap,
        })
    }

    /// Horizontal scale over the plot area.
    pub(crate) fn x_scale(&self, domain: (f64, f64)) -> Result<LinearScale, RenderError> {
        let p = self.plot;
        LinearScale::new(domain, (f64::from(p.x), f64::from(p.right() - 1))).map_err(RenderError::from)
    }

    /// Vertical scale over the plot area, growing upwards.
    pub(crate) fn y_scale(&self, domain: (f64, f64)) -> Result<LinearScale, RenderError> {
        let p = self.plot;
        LinearScale::new(domain, (f64::from(p.bottom() - 1), f64::from(p.y))).map_err(RenderError::from)
    }

    /// Draw the panel title centered above the plot area.
    pub(crate) fn draw_title(&self, fb: &mut Framebuffer, title: &str, color: Rgba) {
        let w = text_width(title, self.title_scale) as i32;
        let cx = (self.plot.x + self.plot.width / 2) as i32;
        draw_text(fb, cx - w / 2, self.gap as i32, title, self.title_scale, color);
    }

    /// Draw both axes with numeric ticks and axis titles.
    pub(crate) fn draw_axes(
        &self,
        fb: &mut Framebuffer,
        x: &LinearScale,
        y: &LinearScale,
        x_title: &str,
        y_title: &str,
        style: &StyleBundle,
    ) {
        self.draw_y_axis(fb, y, style);
        self.draw_x_axis(fb, Some(x), style);
        self.draw_axis_titles(fb, x_title, y_title, style.foreground);
    }

    /// Bottom axis line, with numeric ticks when `x` is given.
    pub(crate) fn draw_x_axis(&self, fb: &mut Framebuffer, x: Option<&LinearScale>, style: &StyleBundle) {
        let p = self.plot;
        let fg = style.foreground;
        let (x0, x1) = (p.x as i32, (p.right() - 1) as i32);
        let y1 = (p.bottom() - 1) as i32;
        draw_line_thick(fb, x0, y1, x1, y1, self.axis_px, fg);

        let Some(x) = x else { return };
        let (dmin, dmax) = x.domain();
        let ticks = nice_ticks(dmin, dmax, 5);
        let step = tick_step(&ticks);
        for t in &ticks {
            let px = x.scale(*t).round() as i32;
            draw_line_thick(fb, px, y1, px, y1 + self.tick_len as i32, self.axis_px, fg);
            let label = format_tick(*t, step);
            let w = text_width(&label, self.tick_scale) as i32;
            draw_text(fb, px - w / 2, y1 + (self.tick_len + self.gap) as i32, &label, self.tick_scale, fg);
        }
    }

    /// Left axis line with numeric ticks and optional grid lines.
    pub(crate) fn draw_y_axis(&self, fb: &mut Framebuffer, y: &LinearScale, style: &StyleBundle) {
        let p = self.plot;
        let fg = style.foreground;
        let (x0, x1) = (p.x as i32, (p.right() - 1) as i32);
        let (y0, y1) = (p.y as i32, (p.bottom() - 1) as i32);

        let (dmin, dmax) = y.domain();
        let ticks = nice_ticks(dmin, dmax, 5);
        if style.grid_lines {
            let grid = Rgba::rgb(225, 225, 225);
            for t in &ticks {
                let py = y.scale(*t).round() as i32;
                draw_line_thick(fb, x0, py, x1, py, 1, grid);
            }
        }
        draw_line_thick(fb, x0, y0, x0, y1, self.axis_px, fg);

        let th = text_height(self.tick_scale) as i32;
        let step = tick_step(&ticks);
        for t in &ticks {
            let py = y.scale(*t).round() as i32;
            draw_line_thick(fb, x0 - self.tick_len as i32, py, x0, py, self.axis_px, fg);
            let label = format_tick(*t, step);
            let w = text_width(&label, self.tick_scale) as i32;
            draw_text(fb, x0 - (self.tick_len + self.gap) as i32 - w, py - th / 2, &label, self.tick_scale, fg);
        }
    }

    /// Draw axis titles without ticks (used by categorical axes).
    pub(crate) fn draw_axis_titles(&self, fb: &mut Framebuffer, x_title: &str, y_title: &str, color: Rgba) {
        let p = self.plot;
        let th = text_height(self.tick_scale);
        if !x_title.is_empty() {
            let w = text_width(x_title, self.title_scale) as i32;
            let y = p.bottom() + self.tick_len + th + 2 * self.gap;
            draw_text(fb, (p.x + p.width / 2) as i32 - w / 2, y as i32, x_title, self.title_scale, color);
        }
        if !y_title.is_empty() {
            let y = p.y.saturating_sub(text_height(self.title_scale) + self.gap);
            draw_text(fb, self.gap as i32, y as i32, y_title, self.title_scale, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nice_ticks() {
        assert_eq!(nice_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        let t = nice_ticks(-3.2, 4.7, 5);
        assert_eq!(t.first().copied(), Some(-2.0));
        assert_eq!(t.last().copied(), Some(4.0));
        assert!(nice_ticks(1.0, 1.0, 5).is_empty());
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(2.0, 1.0), "2");
        assert_eq!(format_tick(0.25, 0.05), "0.25");
        assert_eq!(format_tick(0.2, 0.2), "0.2");
    }

    #[test]
    fn test_padded_domain() {
        assert_eq!(padded_domain(0.0, 10.0, 0.1), (-1.0, 11.0));
        assert_eq!(padded_domain(3.0, 3.0, 0.1), (2.5, 3.5));
    }

    #[test]
    fn test_tick_label_chars() {
        assert_eq!(tick_label_chars(0.0, 100.0), 3);
        assert_eq!(tick_label_chars(0.0, 1.0), 3);
    }

    #[test]
    fn test_frame_fits_inside_panel() {
        let style = StyleBundle::default_style();
        let frame = Frame::new("t", 600, 400, &style, 300, true, 4).unwrap();
        assert!(frame.plot.right() <= 600);
        assert!(frame.plot.bottom() <= 400);
        assert!(frame.plot.width > 100);
    }

    #[test]
    fn test_frame_too_small() {
        let style = StyleBundle::default_style();
        assert!(Frame::new("t", 30, 30, &style, 600, true, 4).is_err());
    }
}
