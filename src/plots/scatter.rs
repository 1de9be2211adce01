//! Scatter plot (`scatter`).
//!
//! `x` and `y` are numeric columns. An optional `color` column groups points
//! onto the style palette and an optional numeric `size` column scales the
//! marker radius between half and twice the style marker size.

use super::axes::{padded_domain, tick_label_chars, Frame};
use super::{numeric_column, panel_framebuffer, role_column, InputKind, PanelInput, PanelParams, PlotRenderer, RenderResult};
use crate::color::Rgba;
use crate::data::Table;
use crate::error::RenderError;
use crate::framebuffer::Framebuffer;
use crate::layout::LayoutGeometry;
use crate::render::{draw_circle, draw_text, text_height, text_width};
use crate::scale::{finite_extent, Scale};
use crate::style::StyleBundle;

const KIND: &str = "scatter";
const PARAMS: &[&str] = &["alpha", "legend"];

/// Group index per row plus the group names in first-seen order.
fn color_groups(table: &Table, column: &str) -> Result<(Vec<usize>, Vec<String>), RenderError> {
    let col = table.column(column).ok_or_else(|| RenderError::MissingColumn {
        kind: KIND.to_string(),
        role: "color".to_string(),
        column: column.to_string(),
    })?;
    let mut names: Vec<String> = Vec::new();
    let index = (0..table.n_rows())
        .map(|row| {
            let key = col.key(row);
            names.iter().position(|k| *k == key).unwrap_or_else(|| {
                names.push(key);
                names.len() - 1
            })
        })
        .collect();
    Ok((index, names))
}

/// Marker radius per row, scaled linearly from the `size` column.
fn radii(values: &[f64], base: f64) -> Vec<i32> {
    let (lo, hi) = finite_extent(values).unwrap_or((0.0, 0.0));
    values
        .iter()
        .map(|v| {
            let t = if hi > lo && v.is_finite() { (v - lo) / (hi - lo) } else { 0.5 };
            (base * (0.5 + 1.5 * t)).round().max(1.0) as i32
        })
        .collect()
}

/// `scatter` renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScatterRenderer;

impl ScatterRenderer {
    fn draw_legend(fb: &mut Framebuffer, frame: &Frame, names: &[String], style: &StyleBundle, radius: i32) {
        let th = text_height(frame.tick_scale) as i32;
        let p = frame.plot;
        let widest = names.iter().map(|n| text_width(n, frame.tick_scale)).max().unwrap_or(0) as i32;
        let x = p.right() as i32 - widest - 3 * radius - frame.gap as i32 * 2;
        let mut y = p.y as i32 + frame.gap as i32;
        for (i, name) in names.iter().enumerate() {
            draw_circle(fb, x + radius, y + th / 2, radius, style.color(i));
            draw_text(fb, x + 2 * radius + frame.gap as i32, y, name, frame.tick_scale, style.foreground);
            y += th + frame.gap as i32;
        }
    }
}

impl PlotRenderer for ScatterRenderer {
    fn kind(&self) -> &str {
        KIND
    }

    fn input(&self) -> InputKind {
        InputKind::Table
    }

    fn describe(&self) -> &str {
        "Scatter plot with optional color groups and size mapping"
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
        let x_col = role_column(params, KIND, "x", None)?;
        let y_col = role_column(params, KIND, "y", None)?;
        let xs = numeric_column(table, KIND, "x", x_col)?;
        let ys = numeric_column(table, KIND, "y", y_col)?;

        let alpha = params.f64(KIND, "alpha")?.unwrap_or(0.85);
        if !(0.0..=1.0).contains(&alpha) {
            return Err(RenderError::InvalidParameter {
                kind: KIND.to_string(),
                param: "alpha".to_string(),
                message: "must be in [0, 1]".to_string(),
            });
        }

        let rows: Vec<usize> = (0..table.n_rows()).filter(|&i| xs[i].is_finite() && ys[i].is_finite()).collect();
        if rows.is_empty() {
            return Err(RenderError::EmptyData { kind: KIND.to_string() });
        }

        let (groups, names) = match params.role("color") {
            Some(column) => color_groups(table, column)?,
            None => (vec![0; table.n_rows()], Vec::new()),
        };
        let base = f64::from(style.px(style.marker_size_pt, params.dpi)) / 2.0;
        let sizes = match params.role("size") {
            Some(column) => radii(numeric_column(table, KIND, "size", column)?, base),
            None => vec![base.round().max(1.0) as i32; table.n_rows()],
        };

        let x_ext = finite_extent(xs).unwrap_or((0.0, 1.0));
        let y_ext = finite_extent(ys).unwrap_or((0.0, 1.0));
        let (x_lo, x_hi) = padded_domain(x_ext.0, x_ext.1, 0.05);
        let (y_lo, y_hi) = padded_domain(y_ext.0, y_ext.1, 0.05);

        let mut fb = panel_framebuffer(geometry)?;
        let frame = Frame::new(
            KIND,
            fb.width(),
            fb.height(),
            style,
            params.dpi,
            params.title().is_some(),
            tick_label_chars(y_lo, y_hi),
        )?;
        let x = frame.x_scale((x_lo, x_hi))?;
        let y = frame.y_scale((y_lo, y_hi))?;
        frame.draw_axes(&mut fb, &x, &y, x_col, y_col, style);

        let a = (alpha * 255.0).round() as u8;
        for &i in &rows {
            let color: Rgba = style.color(groups[i]).with_alpha(a);
            draw_circle(&mut fb, x.scale(xs[i]).round() as i32, y.scale(ys[i]).round() as i32, sizes[i], color);
        }

        if names.len() > 1 && params.bool(KIND, "legend")?.unwrap_or(true) {
            Self::draw_legend(&mut fb, &frame, &names, style, base.round().max(1.0) as i32);
        }
        if let Some(title) = params.title() {
            frame.draw_title(&mut fb, title, style.foreground);
        }

        let mut result = RenderResult::new(geometry, fb).with_note(format!("{} points", rows.len()));
        if !names.is_empty() {
            result = result.with_note(format!("{} color groups", names.len()));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use crate::geometry::PixelRect;
    use crate::layout::GridCell;
    use crate::recipe::Panel;

    fn geometry() -> LayoutGeometry {
        LayoutGeometry {
            panel_index: 0,
            rect: PixelRect::new(0, 0, 400, 300),
            cell: GridCell { row: 0, col: 0, row_span: 1, col_span: 1 },
            label: Some("A".into()),
        }
    }

    fn table() -> Table {
        Table::from_columns(vec![
            ("a".into(), Column::Numeric(vec![1.0, 2.0, 3.0, f64::NAN])),
            ("b".into(), Column::Numeric(vec![4.0, 5.0, 6.0, 7.0])),
            ("g".into(), Column::Text(vec![Some("x".into()), Some("y".into()), Some("x".into()), None])),
        ])
        .unwrap()
    }

    fn panel() -> Panel {
        let mut panel = Panel::new("scatter");
        panel.x = Some("a".into());
        panel.y = Some("b".into());
        panel
    }

    #[test]
    fn test_render_skips_non_finite_rows() {
        let t = table();
        let mut panel = panel();
        panel.color = Some("g".into());
        let result = ScatterRenderer
            .render(PanelInput::Table(&t), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 150))
            .unwrap();
        assert_eq!(result.notes[0], "3 points");
        assert_eq!(result.notes[1], "3 color groups");
        assert_eq!(result.raster.width(), 400);
    }

    #[test]
    fn test_color_groups_first_seen() {
        let (index, names) = color_groups(&table(), "g").unwrap();
        assert_eq!(index, vec![0, 1, 0, 2]);
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_radii_scale_with_value() {
        let r = radii(&[0.0, 10.0, f64::NAN], 4.0);
        assert_eq!(r, vec![2, 8, 5]);
    }

    #[test]
    fn test_missing_column() {
        let t = table();
        let mut panel = panel();
        panel.y = Some("nope".into());
        let err = ScatterRenderer
            .render(PanelInput::Table(&t), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 150))
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingColumn { ref role, .. } if role == "y"));
    }

    #[test]
    fn test_image_input_rejected() {
        let panel = panel();
        let err = ScatterRenderer
            .render(
                PanelInput::Image(std::path::Path::new("a.png")),
                &geometry(),
                &StyleBundle::default(),
                &PanelParams::new(&panel, 150),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingInput { .. }));
    }

    #[test]
    fn test_alpha_out_of_range() {
        let t = table();
        let mut panel = panel();
        panel.params = serde_yaml_ng::from_str("alpha: 2").unwrap();
        assert!(ScatterRenderer
            .render(PanelInput::Table(&t), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 150))
            .is_err());
    }
}
