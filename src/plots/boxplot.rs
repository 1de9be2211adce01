//! Box plots with optional jittered points (`box`, `box_swarm`).
//!
//! Box plots display the distribution of data through quartiles with
//! 1.5 * IQR whiskers.

use super::axes::{padded_domain, tick_label_chars, Frame};
use super::{numeric_column, panel_framebuffer, role_column, InputKind, PanelInput, PanelParams, PlotRenderer, RenderResult};
use crate::color::Rgba;
use crate::data::Table;
use crate::error::RenderError;
use crate::framebuffer::Framebuffer;
use crate::layout::LayoutGeometry;
use crate::render::{draw_circle, draw_line_thick, draw_rect, draw_rect_outline, draw_text, text_width};
use crate::scale::{LinearScale, Scale};
use crate::style::StyleBundle;

const KIND: &str = "box";
const PARAMS: &[&str] = &["points", "outliers", "box_width"];

/// Statistics computed for a box plot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    /// Lowest value inside the lower fence.
    pub min: f64,
    /// First quartile (25th percentile).
    pub q1: f64,
    /// Median (50th percentile).
    pub median: f64,
    /// Third quartile (75th percentile).
    pub q3: f64,
    /// Highest value inside the upper fence.
    pub max: f64,
    /// Interquartile range (Q3 - Q1).
    pub iqr: f64,
    /// Values outside the fences.
    pub outliers: Vec<f64>,
    /// Number of finite values.
    pub n: usize,
}

impl BoxStats {
    /// Compute box plot statistics from data.
    ///
    /// Uses the 1.5 * IQR rule for outlier detection; non-finite values are
    /// ignored. Returns `None` when nothing finite remains.
    #[must_use]
    pub fn from_data(data: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let q1 = percentile(&sorted, 25.0);
        let median = percentile(&sorted, 50.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;

        let lower_fence = q1 - 1.5 * iqr;
        let upper_fence = q3 + 1.5 * iqr;

        let min = sorted.iter().copied().find(|&x| x >= lower_fence).unwrap_or(sorted[0]);
        let max = sorted
            .iter()
            .rev()
            .copied()
            .find(|&x| x <= upper_fence)
            .unwrap_or(sorted[n - 1]);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|&x| x < lower_fence || x > upper_fence)
            .collect();

        Some(Self {
            min,
            q1,
            median,
            q3,
            max,
            iqr,
            outliers,
            n,
        })
    }

    /// Lowest and highest drawn value, outliers included.
    #[must_use]
    pub fn extent(&self) -> (f64, f64) {
        self.outliers
            .iter()
            .fold((self.min, self.max), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// Calculate percentile using linear interpolation.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let k = (p / 100.0) * (sorted.len() - 1) as f64;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;
    if f == c || c >= sorted.len() {
        sorted[f.min(sorted.len() - 1)]
    } else {
        let d = k - f as f64;
        sorted[f] * (1.0 - d) + sorted[c] * d
    }
}

/// Split `values` into groups by the `group` column, keeping first-seen order.
fn group_values(table: &Table, values: &[f64], group: Option<&str>) -> Result<Vec<(String, Vec<f64>)>, RenderError> {
    let Some(name) = group else {
        return Ok(vec![(String::new(), values.to_vec())]);
    };
    let column = table.column(name).ok_or_else(|| RenderError::MissingColumn {
        kind: KIND.to_string(),
        role: "x".to_string(),
        column: name.to_string(),
    })?;
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for (row, &v) in values.iter().enumerate() {
        let key = column.key(row);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, g)) => g.push(v),
            None => groups.push((key, vec![v])),
        }
    }
    Ok(groups)
}

/// Deterministic jitter in `[-0.5, 0.5)` for point `i`.
fn jitter(i: usize) -> f64 {
    let h = (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 40;
    (h % 1000) as f64 / 1000.0 - 0.5
}

/// `box` renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxPlotRenderer;

impl BoxPlotRenderer {
    #[allow(clippy::too_many_arguments)]
    fn draw_box(
        fb: &mut Framebuffer,
        stats: &BoxStats,
        center: i32,
        half: i32,
        y: &LinearScale,
        fill: Rgba,
        style: &StyleBundle,
        frame: &Frame,
        show_outliers: bool,
    ) {
        let fg = style.foreground;
        let lw = frame.line_px;
        let py = |v: f64| y.scale(v).round() as i32;

        // Whiskers and caps
        let cap = (half / 2).max(1);
        draw_line_thick(fb, center, py(stats.min), center, py(stats.q1), lw, fg);
        draw_line_thick(fb, center, py(stats.q3), center, py(stats.max), lw, fg);
        draw_line_thick(fb, center - cap, py(stats.min), center + cap, py(stats.min), lw, fg);
        draw_line_thick(fb, center - cap, py(stats.max), center + cap, py(stats.max), lw, fg);

        // Box from Q1 to Q3
        let top = py(stats.q3).min(py(stats.q1));
        let height = (py(stats.q1) - py(stats.q3)).unsigned_abs().max(1);
        let width = (2 * half) as u32;
        draw_rect(fb, center - half, top, width, height, fill.with_alpha(200));
        draw_rect_outline(fb, center - half, top, width, height, fg, lw);

        // Median
        let m = py(stats.median);
        draw_line_thick(fb, center - half, m, center + half, m, lw + 1, fg);

        if show_outliers {
            let r = (lw as i32 + 1).max(2);
            for &v in &stats.outliers {
                draw_circle(fb, center, py(v), r, fg);
            }
        }
    }
}

impl PlotRenderer for BoxPlotRenderer {
    fn kind(&self) -> &str {
        KIND
    }

    fn input(&self) -> InputKind {
        InputKind::Table
    }

    fn describe(&self) -> &str {
        "Box plot per group with optional jittered points"
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
        let table = input.table(KIND)?;
        let y_col = role_column(params, KIND, "y", None)?;
        let values = numeric_column(table, KIND, "y", y_col)?;
        let groups = group_values(table, values, params.role("x"))?;

        let stats: Vec<(String, BoxStats, Vec<f64>)> = groups
            .into_iter()
            .filter_map(|(k, g)| BoxStats::from_data(&g).map(|s| (k, s, g)))
            .collect();
        if stats.is_empty() {
            return Err(RenderError::EmptyData { kind: KIND.to_string() });
        }

        let swarm = params.panel.plot == "box_swarm";
        let show_points = params.bool(KIND, "points")?.unwrap_or(swarm);
        let show_outliers = params.bool(KIND, "outliers")?.unwrap_or(!show_points);
        let box_width = params.f64(KIND, "box_width")?.unwrap_or(0.6);
        if !(0.05..=1.0).contains(&box_width) {
            return Err(RenderError::InvalidParameter {
                kind: KIND.to_string(),
                param: "box_width".to_string(),
                message: "must be in [0.05, 1]".to_string(),
            });
        }

        let (lo, hi) = stats
            .iter()
            .map(|(_, s, _)| s.extent())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), (c, d)| (a.min(c), b.max(d)));
        let (lo, hi) = padded_domain(lo, hi, 0.08);

        let mut fb = panel_framebuffer(geometry)?;
        let label_chars = tick_label_chars(lo, hi);
        let frame = Frame::new(KIND, fb.width(), fb.height(), style, params.dpi, params.title().is_some(), label_chars)?;
        let y = frame.y_scale((lo, hi))?;
        frame.draw_y_axis(&mut fb, &y, style);
        frame.draw_x_axis(&mut fb, None, style);
        let p = frame.plot;

        let slot = f64::from(p.width) / stats.len() as f64;
        let half = ((slot * box_width) / 2.0).max(1.0) as i32;
        let marker = style.px(style.marker_size_pt, params.dpi) as i32 / 2;
        for (i, (key, s, raw)) in stats.iter().enumerate() {
            let center = (f64::from(p.x) + slot * (i as f64 + 0.5)).round() as i32;
            let fill = style.color(i);
            Self::draw_box(&mut fb, s, center, half, &y, fill, style, &frame, show_outliers);

            if show_points {
                let color = fill.with_alpha(170);
                for (j, &v) in raw.iter().enumerate().filter(|(_, v)| v.is_finite()) {
                    let px = center + (jitter(j) * f64::from(half)).round() as i32;
                    draw_circle(&mut fb, px, y.scale(v).round() as i32, marker.max(1), color);
                }
            }

            let w = text_width(key, frame.tick_scale) as i32;
            if (w as f64) < slot {
                draw_text(&mut fb, center - w / 2, (p.bottom() + frame.tick_len + frame.gap) as i32, key, frame.tick_scale, style.foreground);
            }
        }
        frame.draw_axis_titles(&mut fb, params.role("x").unwrap_or_default(), y_col, style.foreground);
        if let Some(title) = params.title() {
            frame.draw_title(&mut fb, title, style.foreground);
        }

        let n: usize = stats.iter().map(|(_, s, _)| s.n).sum();
        Ok(RenderResult::new(geometry, fb).with_note(format!("{} groups, {n} values", stats.len())))
    }
}
