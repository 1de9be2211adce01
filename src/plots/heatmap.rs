//! Heatmap for 2D data matrices.
//!
//! Accepts wide tables (one numeric column per heatmap column, optional row
//! label column) or long tables (`x`, `y`, `color` triples pivoted into a
//! matrix, duplicate cells averaged).
//!
//! # References
//!
//! - Wilkinson, L. (2005). *The Grammar of Graphics*. Springer.
//! - Borland, D., & Taylor, R. M. (2007). "Rainbow Color Map (Still) Considered Harmful."
//!   IEEE Computer Graphics and Applications.

use super::axes::Frame;
use super::{numeric_column, panel_framebuffer, InputKind, PanelInput, PanelParams, PlotRenderer, RenderResult};
use crate::color::Rgba;
use crate::data::{Column, Table};
use crate::error::RenderError;
use crate::framebuffer::Framebuffer;
use crate::geometry::PixelRect;
use crate::layout::LayoutGeometry;
use crate::render::{draw_text, text_height, text_width};
use crate::scale::{finite_extent, ColorScale, Scale};
use crate::style::StyleBundle;

const KIND: &str = "heatmap";
const PARAMS: &[&str] = &["columns", "palette", "vmin", "vmax", "borders", "colorbar"];

/// Row-major value matrix with row and column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapMatrix {
    /// Values, `rows * cols`, `NaN` for empty cells.
    pub values: Vec<f64>,
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub cols: usize,
    /// Row labels.
    pub row_labels: Vec<String>,
    /// Column labels.
    pub col_labels: Vec<String>,
}

impl HeatmapMatrix {
    /// Wide form: each named numeric column becomes a heatmap column.
    ///
    /// `row_label` names a column whose cells label the rows.
    pub fn wide(table: &Table, columns: &[String], row_label: Option<&str>) -> Result<Self, RenderError> {
        let rows = table.n_rows();
        let mut values = vec![f64::NAN; rows * columns.len()];
        for (c, name) in columns.iter().enumerate() {
            let data = numeric_column(table, KIND, "columns", name)?;
            for (r, v) in data.iter().enumerate() {
                values[r * columns.len() + c] = *v;
            }
        }
        let row_labels = match row_label {
            Some(name) => {
                let column = table.column(name).ok_or_else(|| RenderError::MissingColumn {
                    kind: KIND.to_string(),
                    role: "y".to_string(),
                    column: name.to_string(),
                })?;
                (0..rows).map(|r| column.key(r)).collect()
            }
            None => (1..=rows).map(|r| r.to_string()).collect(),
        };
        Ok(Self {
            values,
            rows,
            cols: columns.len(),
            row_labels,
            col_labels: columns.to_vec(),
        })
    }

    /// Long form: pivot `(x, y, value)` triples; duplicates are averaged.
    pub fn long(table: &Table, x: &str, y: &str, value: &str) -> Result<Self, RenderError> {
        let missing = |role: &str, column: &str| RenderError::MissingColumn {
            kind: KIND.to_string(),
            role: role.to_string(),
            column: column.to_string(),
        };
        let xs = table.column(x).ok_or_else(|| missing("x", x))?;
        let ys = table.column(y).ok_or_else(|| missing("y", y))?;
        let vs = numeric_column(table, KIND, "color", value)?;

        let mut col_labels: Vec<String> = Vec::new();
        let mut row_labels: Vec<String> = Vec::new();
        let index_of = |labels: &mut Vec<String>, key: String| {
            labels.iter().position(|l| *l == key).unwrap_or_else(|| {
                labels.push(key);
                labels.len() - 1
            })
        };
        let mut triples = Vec::with_capacity(table.n_rows());
        for r in 0..table.n_rows() {
            let c = index_of(&mut col_labels, xs.key(r));
            let row = index_of(&mut row_labels, ys.key(r));
            triples.push((row, c, vs[r]));
        }

        let (rows, cols) = (row_labels.len(), col_labels.len());
        let mut sums = vec![0.0; rows * cols];
        let mut counts = vec![0usize; rows * cols];
        for (row, c, v) in triples {
            if v.is_finite() {
                sums[row * cols + c] += v;
                counts[row * cols + c] += 1;
            }
        }
        let values = sums
            .iter()
            .zip(&counts)
            .map(|(s, &n)| if n == 0 { f64::NAN } else { s / n as f64 })
            .collect();

        Ok(Self {
            values,
            rows,
            cols,
            row_labels,
            col_labels,
        })
    }

    /// Value at (`row`, `col`).
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }
}

/// `heatmap` renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapRenderer;

impl HeatmapRenderer {
    fn matrix(table: &Table, params: &PanelParams<'_>) -> Result<HeatmapMatrix, RenderError> {
        if let (Some(x), Some(y), Some(value)) = (params.role("x"), params.role("y"), params.role("color")) {
            return HeatmapMatrix::long(table, x, y, value);
        }
        let columns = match params.strings(KIND, "columns")? {
            Some(c) => c,
            None => table
                .column_names()
                .iter()
                .filter(|n| Some(n.as_str()) != params.role("y"))
                .filter(|n| matches!(table.column(n), Some(Column::Numeric(_))))
                .cloned()
                .collect(),
        };
        HeatmapMatrix::wide(table, &columns, params.role("y"))
    }

    fn color_scale(
        matrix: &HeatmapMatrix,
        style: &StyleBundle,
        params: &PanelParams<'_>,
    ) -> Result<ColorScale, RenderError> {
        let (lo, hi) = finite_extent(&matrix.values).ok_or_else(|| RenderError::EmptyData {
            kind: KIND.to_string(),
        })?;
        let vmin = params.f64(KIND, "vmin")?.unwrap_or(lo);
        let vmax = params.f64(KIND, "vmax")?.unwrap_or(hi);
        if vmin > vmax {
            return Err(RenderError::InvalidRange {
                kind: KIND.to_string(),
                message: format!("vmin {vmin} exceeds vmax {vmax}"),
            });
        }
        // Handle case where all values are the same
        let (vmin, vmax) = if (vmax - vmin).abs() < f64::EPSILON {
            (vmin - 0.5, vmax + 0.5)
        } else {
            (vmin, vmax)
        };

        let name = params.str(KIND, "palette")?.unwrap_or(&style.colormap);
        ColorScale::named(name, (vmin, vmax)).ok_or_else(|| RenderError::InvalidParameter {
            kind: KIND.to_string(),
            param: "palette".to_string(),
            message: format!("unknown colormap '{name}'"),
        })
    }

    fn draw_colorbar(fb: &mut Framebuffer, bar: PixelRect, scale: &ColorScale, style: &StyleBundle, text: u32) {
        let PixelRect { x, y, width: w, height: h } = bar;
        let (lo, hi) = scale.domain();
        for dy in 0..h {
            let t = 1.0 - f64::from(dy) / f64::from(h.max(2) - 1);
            fb.fill_rect(x, y + dy, w, 1, scale.scale(lo + t * (hi - lo)));
        }
        let fmt = |v: f64| format!("{v:.2}");
        draw_text(fb, (x + w + 2) as i32, y as i32, &fmt(hi), text, style.foreground);
        let th = text_height(text);
        draw_text(fb, (x + w + 2) as i32, (y + h).saturating_sub(th) as i32, &fmt(lo), text, style.foreground);
    }
}

impl PlotRenderer for HeatmapRenderer {
    fn kind(&self) -> &str {
        KIND
    }

    fn input(&self) -> InputKind {
        InputKind::Table
    }

    fn describe(&self) -> &str {
        "Color-coded matrix from a wide or long table"
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
        let matrix = Self::matrix(table, params)?;
        if matrix.rows == 0 || matrix.cols == 0 {
            return Err(RenderError::EmptyData {
                kind: KIND.to_string(),
            });
        }
        let scale = Self::color_scale(&matrix, style, params)?;

        let mut fb = panel_framebuffer(geometry)?;
        let label_chars = matrix.row_labels.iter().map(|l| l.chars().count()).max().unwrap_or(1).min(12);
        let frame = Frame::new(KIND, fb.width(), fb.height(), style, params.dpi, params.title().is_some(), label_chars)?;

        let show_bar = params.bool(KIND, "colorbar")?.unwrap_or(true);
        let tick = frame.tick_scale;
        let bar_w = if show_bar { (frame.plot.width / 20).max(4) } else { 0 };
        let bar_room = if show_bar { bar_w + frame.gap * 2 + text_width("0.00", tick) + frame.gap } else { 0 };
        let area_w = frame.plot.width.saturating_sub(bar_room);

        let cell_w = area_w / matrix.cols as u32;
        let cell_h = frame.plot.height / matrix.rows as u32;
        if cell_w == 0 || cell_h == 0 {
            return Err(RenderError::InvalidRange {
                kind: KIND.to_string(),
                message: format!("{}x{} cells do not fit the panel", matrix.rows, matrix.cols),
            });
        }

        let borders = params.bool(KIND, "borders")?.unwrap_or(cell_w >= 6 && cell_h >= 6);
        let border = Rgba::rgb(255, 255, 255);
        let (ox, oy) = (frame.plot.x, frame.plot.y);
        for row in 0..matrix.rows {
            for col in 0..matrix.cols {
                let v = matrix.get(row, col);
                let color = if v.is_finite() { scale.scale(v) } else { Rgba::LIGHT_GRAY };
                let x = ox + col as u32 * cell_w;
                let y = oy + row as u32 * cell_h;
                fb.fill_rect(x, y, cell_w, cell_h, color);
                if borders {
                    fb.fill_rect(x + cell_w - 1, y, 1, cell_h, border);
                    fb.fill_rect(x, y + cell_h - 1, cell_w, 1, border);
                }
            }
        }

        // Row labels left of the grid, column labels below it, when they fit.
        let th = text_height(tick);
        if th <= cell_h {
            for (row, label) in matrix.row_labels.iter().enumerate() {
                let label: String = label.chars().take(12).collect();
                let w = text_width(&label, tick);
                let y = oy + row as u32 * cell_h + (cell_h - th) / 2;
                draw_text(&mut fb, ox as i32 - (w + frame.gap) as i32, y as i32, &label, tick, style.foreground);
            }
        }
        for (col, label) in matrix.col_labels.iter().enumerate() {
            let w = text_width(label, tick);
            if w <= cell_w {
                let x = ox + col as u32 * cell_w + (cell_w - w) / 2;
                let y = oy + matrix.rows as u32 * cell_h + frame.gap;
                draw_text(&mut fb, x as i32, y as i32, label, tick, style.foreground);
            }
        }

        if show_bar {
            let bx = ox + area_w + frame.gap * 2;
            let bar = PixelRect::new(bx, oy, bar_w, matrix.rows as u32 * cell_h);
            Self::draw_colorbar(&mut fb, bar, &scale, style, tick);
        }
        if let Some(title) = params.title() {
            frame.draw_title(&mut fb, title, style.foreground);
        }

        Ok(RenderResult::new(geometry, fb).with_note(format!("{}x{} cells", matrix.rows, matrix.cols)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::GridCell;
    use crate::recipe::Panel;

    fn geometry(w: u32, h: u32) -> LayoutGeometry {
        LayoutGeometry {
            panel_index: 0,
            rect: PixelRect::new(0, 0, w, h),
            cell: GridCell { row: 0, col: 0, row_span: 1, col_span: 1 },
            label: None,
        }
    }

    fn wide_table() -> Table {
        Table::from_columns(vec![
            ("gene".into(), Column::Text(vec![Some("g1".into()), Some("g2".into())])),
            ("s1".into(), Column::Numeric(vec![1.0, 2.0])),
            ("s2".into(), Column::Numeric(vec![3.0, f64::NAN])),
        ])
        .unwrap()
    }

    #[test]
    fn test_wide_matrix_uses_numeric_columns() {
        let mut panel = Panel::new(KIND);
        panel.y = Some("gene".into());
        let params = PanelParams::new(&panel, 300);
        let m = HeatmapRenderer::matrix(&wide_table(), &params).unwrap();
        assert_eq!((m.rows, m.cols), (2, 2));
        assert_eq!(m.row_labels, vec!["g1", "g2"]);
        assert_eq!(m.get(0, 1), 3.0);
        assert!(m.get(1, 1).is_nan());
    }

    #[test]
    fn test_long_form_pivot_averages_duplicates() {
        let t = Table::from_columns(vec![
            ("x".into(), Column::Text(vec![Some("a".into()), Some("b".into()), Some("a".into())])),
            ("y".into(), Column::Text(vec![Some("r".into()), Some("r".into()), Some("r".into())])),
            ("v".into(), Column::Numeric(vec![1.0, 5.0, 3.0])),
        ])
        .unwrap();
        let m = HeatmapMatrix::long(&t, "x", "y", "v").unwrap();
        assert_eq!((m.rows, m.cols), (1, 2));
        assert_eq!(m.get(0, 0), 2.0);
        assert_eq!(m.get(0, 1), 5.0);
    }

    #[test]
    fn test_render_fills_cells() {
        let mut panel = Panel::new(KIND);
        panel.y = Some("gene".into());
        panel.title = Some("Expr".into());
        let result = HeatmapRenderer
            .render(PanelInput::Table(&wide_table()), &geometry(600, 400), &StyleBundle::default(), &PanelParams::new(&panel, 300))
            .unwrap();
        assert_eq!((result.raster.width(), result.raster.height()), (600, 400));
        let (_, max_lum, _) = result.raster.luminance_stats();
        assert!(max_lum > 0.0);
    }

    #[test]
    fn test_missing_column_and_bad_range() {
        let mut panel = Panel::new(KIND);
        panel.params = serde_yaml_ng::from_str("columns: [s1, s9]").unwrap();
        let err = HeatmapRenderer
            .render(PanelInput::Table(&wide_table()), &geometry(600, 400), &StyleBundle::default(), &PanelParams::new(&panel, 300))
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingColumn { ref column, .. } if column == "s9"));

        let mut panel = Panel::new(KIND);
        panel.params = serde_yaml_ng::from_str("vmin: 5\nvmax: 1").unwrap();
        let err = HeatmapRenderer
            .render(PanelInput::Table(&wide_table()), &geometry(600, 400), &StyleBundle::default(), &PanelParams::new(&panel, 300))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidRange { .. }));
    }

    #[test]
    fn test_image_input_rejected() {
        let panel = Panel::new(KIND);
        let err = HeatmapRenderer
            .render(
                PanelInput::Image(std::path::Path::new("x.png")),
                &geometry(600, 400),
                &StyleBundle::default(),
                &PanelParams::new(&panel, 300),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingInput { .. }));
    }
}
