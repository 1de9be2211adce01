//! Grid layout.
//!
//! Turns an ordered panel list into non-overlapping pixel rectangles on the
//! canvas. Explicit spans are placed first; remaining panels fill free cells
//! row-major in declaration order. Cell edges are snapped to whole pixels
//! so adjacent panels never share a pixel.

use crate::error::LayoutError;
use crate::geometry::PixelRect;
use crate::recipe::{GridSpec, Panel, Span};
use crate::style::{pt_to_px, StyleBundle};
use serde::Serialize;

/// Centimetres per inch.
pub const CM_PER_INCH: f64 = 2.54;

/// Most rows or columns a fixed grid or explicit span may reach.
pub const MAX_TRACKS: usize = 64;

/// Canvas size in device pixels plus the resolution it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width_px: u32,
    /// Height in pixels.
    pub height_px: u32,
    /// Dots per inch.
    pub dpi: u32,
}

impl CanvasSize {
    /// Pixel canvas for a physical size: `round(cm / 2.54 * dpi)`.
    #[must_use]
    pub fn from_cm(width_cm: f64, height_cm: f64, dpi: u32) -> Self {
        let px = |cm: f64| (cm / CM_PER_INCH * f64::from(dpi)).round().max(1.0) as u32;
        Self {
            width_px: px(width_cm),
            height_px: px(height_cm),
            dpi,
        }
    }

    /// Physical width in inches.
    #[must_use]
    pub fn width_in(&self) -> f64 {
        f64::from(self.width_px) / f64::from(self.dpi)
    }

    /// Physical height in inches.
    #[must_use]
    pub fn height_in(&self) -> f64 {
        f64::from(self.height_px) / f64::from(self.dpi)
    }

    /// Width over height.
    #[must_use]
    pub fn aspect(&self) -> f64 {
        f64::from(self.width_px) / f64::from(self.height_px.max(1))
    }
}

/// What layout needs to know about one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelPlacement {
    /// Explicit grid span.
    pub span: Option<Span>,
    /// Whether the panel consumes a label.
    pub label: bool,
}

impl From<&Panel> for PanelPlacement {
    fn from(panel: &Panel) -> Self {
        Self {
            span: panel.span,
            label: panel.label,
        }
    }
}

/// Grid cell(s) a panel occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridCell {
    /// Top row.
    pub row: usize,
    /// Left column.
    pub col: usize,
    /// Rows covered.
    pub row_span: usize,
    /// Columns covered.
    pub col_span: usize,
}

/// Final placement of one panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutGeometry {
    /// Index into the recipe's panel list.
    pub panel_index: usize,
    /// Pixel rectangle on the canvas.
    pub rect: PixelRect,
    /// Grid position.
    pub cell: GridCell,
    /// Panel label, if labeled.
    pub label: Option<String>,
}

/// Result of [`compute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLayout {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub cols: usize,
    /// Canvas the grid was fitted to.
    pub canvas: CanvasSize,
    /// Geometry per panel, in declaration order.
    pub panels: Vec<LayoutGeometry>,
}

/// Column budget for `n` auto-placed panels on a canvas of `aspect`.
#[must_use]
pub fn auto_columns(n: usize, aspect: f64) -> usize {
    let landscape = aspect >= 1.0;
    match n {
        0 | 1 => 1,
        2 if landscape => 2,
        2 => 1,
        3 | 4 => 2,
        5 | 6 if landscape => 3,
        5 | 6 => 2,
        7..=9 => 3,
        _ => ((n as f64 * aspect).sqrt().ceil() as usize).max(1),
    }
}

struct Occupancy {
    cols: usize,
    cells: Vec<Vec<Option<usize>>>,
}

impl Occupancy {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            cells: vec![vec![None; cols]; rows],
        }
    }

    fn grow_to(&mut self, rows: usize) {
        while self.cells.len() < rows {
            self.cells.push(vec![None; self.cols]);
        }
    }

    fn claim(&mut self, span: &Span, panel: usize) {
        self.grow_to(span.row_end);
        for row in &mut self.cells[span.row_start..span.row_end] {
            for cell in &mut row[span.col_start..span.col_end] {
                *cell = Some(panel);
            }
        }
    }

    /// First free cell, row-major.
    fn first_free(&self) -> Option<(usize, usize)> {
        self.cells.iter().enumerate().find_map(|(r, row)| {
            row.iter().position(Option::is_none).map(|c| (r, c))
        })
    }
}

/// Compute panel rectangles.
pub fn compute(
    panels: &[PanelPlacement],
    canvas: CanvasSize,
    style: &StyleBundle,
    grid: Option<GridSpec>,
) -> Result<GridLayout, LayoutError> {
    if panels.is_empty() {
        return Err(LayoutError::NoPanels);
    }

    let explicit: Vec<(usize, Span)> = panels
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.span.map(|s| (i, s)))
        .collect();

    // Bounds are checked before any occupancy row is allocated.
    if let Some(g) = grid {
        if g.rows > MAX_TRACKS || g.cols > MAX_TRACKS {
            return Err(LayoutError::GridTooLarge { rows: g.rows, cols: g.cols, max: MAX_TRACKS });
        }
    } else if let Some((i, _)) = explicit
        .iter()
        .find(|(_, s)| s.row_end > MAX_TRACKS || s.col_end > MAX_TRACKS)
    {
        return Err(LayoutError::OutOfBounds {
            panel: *i,
            rows: MAX_TRACKS,
            cols: MAX_TRACKS,
        });
    }

    for (k, (i, a)) in explicit.iter().enumerate() {
        if a.is_empty() {
            let (rows, cols) = grid.map_or((a.row_end, a.col_end), |g| (g.rows, g.cols));
            return Err(LayoutError::OutOfBounds { panel: *i, rows, cols });
        }
        if let Some((j, _)) = explicit[k + 1..].iter().find(|(_, b)| a.overlaps(b)) {
            return Err(LayoutError::Overlap { first: *i, second: *j });
        }
    }

    let (mut rows, cols, fixed) = match grid {
        Some(g) => {
            if let Some((i, _)) = explicit
                .iter()
                .find(|(_, s)| s.row_end > g.rows || s.col_end > g.cols)
            {
                return Err(LayoutError::OutOfBounds {
                    panel: *i,
                    rows: g.rows,
                    cols: g.cols,
                });
            }
            (g.rows, g.cols, true)
        }
        None => {
            let budget = auto_columns(panels.len(), canvas.aspect()).min(style.max_columns).max(1);
            let widest = explicit.iter().map(|(_, s)| s.col_end).max().unwrap_or(0);
            (0, budget.max(widest), false)
        }
    };

    let mut occupancy = Occupancy::new(rows, cols);
    let mut cells = vec![None; panels.len()];
    for (i, span) in &explicit {
        occupancy.claim(span, *i);
        cells[*i] = Some(*span);
    }

    for (i, placement) in panels.iter().enumerate() {
        if placement.span.is_some() {
            continue;
        }
        let (row, col) = match occupancy.first_free() {
            Some(rc) => rc,
            None if fixed => return Err(LayoutError::GridFull { panel: i, rows, cols }),
            None => (occupancy.cells.len(), 0),
        };
        let span = Span {
            row_start: row,
            row_end: row + 1,
            col_start: col,
            col_end: col + 1,
        };
        occupancy.claim(&span, i);
        cells[i] = Some(span);
    }
    if !fixed {
        rows = occupancy.cells.len().max(1);
    }

    let margin = pt_to_px(style.margin_pt, canvas.dpi);
    let pad = pt_to_px(style.padding_pt, canvas.dpi);
    let too_small = || LayoutError::CanvasTooSmall {
        width: canvas.width_px,
        height: canvas.height_px,
        rows,
        cols,
    };
    let track = |total: u32, n: usize| -> Option<f64> {
        let avail = f64::from(total) - 2.0 * margin - (n as f64 - 1.0) * pad;
        let size = avail / n as f64;
        (size >= 1.0).then_some(size)
    };
    let cell_w = track(canvas.width_px, cols).ok_or_else(too_small)?;
    let cell_h = track(canvas.height_px, rows).ok_or_else(too_small)?;

    let edge = |start: usize, end: usize, size: f64| -> (u32, u32) {
        let a = (margin + start as f64 * (size + pad)).round() as u32;
        let b = (margin + end as f64 * (size + pad) - pad).round() as u32;
        (a, b.max(a + 1))
    };

    let mut scheme_index = 0;
    let geometry = cells
        .into_iter()
        .enumerate()
        .filter_map(|(i, span)| span.map(|s| (i, s)))
        .map(|(i, s)| {
            let (x0, x1) = edge(s.col_start, s.col_end, cell_w);
            let (y0, y1) = edge(s.row_start, s.row_end, cell_h);
            let label = if panels[i].label {
                let l = style.label_scheme.label(scheme_index);
                scheme_index += 1;
                l
            } else {
                None
            };
            LayoutGeometry {
                panel_index: i,
                rect: PixelRect::new(x0, y0, x1 - x0, y1 - y0),
                cell: GridCell {
                    row: s.row_start,
                    col: s.col_start,
                    row_span: s.rows(),
                    col_span: s.cols(),
                },
                label,
            }
        })
        .collect();

    tracing::debug!(rows, cols, panels = panels.len(), "layout computed");
    Ok(GridLayout {
        rows,
        cols,
        canvas,
        panels: geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::LabelScheme;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn auto(n: usize) -> Vec<PanelPlacement> {
        vec![PanelPlacement { span: None, label: true }; n]
    }

    fn span(r0: usize, r1: usize, c0: usize, c1: usize) -> PanelPlacement {
        PanelPlacement {
            span: Some(Span { row_start: r0, row_end: r1, col_start: c0, col_end: c1 }),
            label: true,
        }
    }

    fn canvas() -> CanvasSize {
        CanvasSize::from_cm(18.0, 12.0, 600)
    }

    #[test]
    fn test_canvas_from_cm() {
        let c = canvas();
        assert_eq!((c.width_px, c.height_px), (4252, 2835));
    }

    #[test]
    fn test_four_panels_two_by_two() {
        let layout = compute(&auto(4), canvas(), &StyleBundle::default_style(), None).unwrap();
        assert_eq!((layout.rows, layout.cols), (2, 2));
        let labels: Vec<_> = layout.panels.iter().map(|g| g.label.clone().unwrap()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D"]);
        assert_eq!(layout.panels[1].cell.col, 1);
        assert_eq!(layout.panels[2].cell.row, 1);
    }

    #[test]
    fn test_two_by_two_fills_canvas() {
        let style = StyleBundle::default_style();
        let canvas = canvas();
        let layout = compute(&auto(4), canvas, &style, None).unwrap();
        let margin = pt_to_px(style.margin_pt, canvas.dpi);
        let pad = pt_to_px(style.padding_pt, canvas.dpi);
        let rect = |row: usize, col: usize| layout.panels[row * 2 + col].rect;

        for row in 0..2 {
            let widths = f64::from(rect(row, 0).width + rect(row, 1).width);
            assert_relative_eq!(widths + pad + 2.0 * margin, f64::from(canvas.width_px), epsilon = 1.0);
            assert_eq!(rect(row, 0).y, rect(row, 1).y);
        }
        for col in 0..2 {
            let heights = f64::from(rect(0, col).height + rect(1, col).height);
            assert_relative_eq!(heights + pad + 2.0 * margin, f64::from(canvas.height_px), epsilon = 1.0);
            assert_eq!(rect(0, col).x, rect(1, col).x);
        }
        assert_eq!(rect(0, 0).x, margin.round() as u32);
        assert_eq!(rect(1, 1).right(), (f64::from(canvas.width_px) - margin).round() as u32);
        assert_eq!(rect(1, 1).bottom(), (f64::from(canvas.height_px) - margin).round() as u32);
    }

    #[test]
    fn test_two_panels_orientation() {
        let style = StyleBundle::default_style();
        let landscape = compute(&auto(2), canvas(), &style, None).unwrap();
        assert_eq!((landscape.rows, landscape.cols), (1, 2));
        let portrait = compute(&auto(2), CanvasSize::from_cm(8.0, 16.0, 300), &style, None).unwrap();
        assert_eq!((portrait.rows, portrait.cols), (2, 1));
    }

    #[test]
    fn test_span_widens_and_auto_fills_around() {
        let panels = vec![span(0, 1, 0, 2), PanelPlacement { span: None, label: true }, PanelPlacement { span: None, label: true }];
        let layout = compute(&panels, canvas(), &StyleBundle::default_style(), None).unwrap();
        assert_eq!(layout.cols, 2);
        assert_eq!(layout.panels[0].cell.col_span, 2);
        assert_eq!((layout.panels[1].cell.row, layout.panels[1].cell.col), (1, 0));
        assert_eq!((layout.panels[2].cell.row, layout.panels[2].cell.col), (1, 1));
        let wide = layout.panels[0].rect.width;
        let narrow = layout.panels[1].rect.width;
        assert!(wide > 2 * narrow);
    }

    #[test]
    fn test_overlap_error() {
        let panels = vec![span(0, 1, 0, 2), span(0, 1, 1, 2)];
        assert_eq!(
            compute(&panels, canvas(), &StyleBundle::default_style(), None),
            Err(LayoutError::Overlap { first: 0, second: 1 })
        );
    }

    #[test]
    fn test_out_of_bounds_and_grid_full() {
        let style = StyleBundle::default_style();
        let grid = Some(GridSpec { rows: 1, cols: 2 });
        assert!(matches!(
            compute(&[span(0, 2, 0, 1)], canvas(), &style, grid),
            Err(LayoutError::OutOfBounds { panel: 0, .. })
        ));
        assert!(matches!(
            compute(&auto(3), canvas(), &style, grid),
            Err(LayoutError::GridFull { panel: 2, .. })
        ));
    }

    #[test]
    fn test_huge_span_rejected_before_allocation() {
        let style = StyleBundle::default_style();
        let far = span(0, 1, 0, 4_000_000_000_000);
        assert_eq!(
            compute(&[far], canvas(), &style, None),
            Err(LayoutError::OutOfBounds { panel: 0, rows: MAX_TRACKS, cols: MAX_TRACKS })
        );
        let deep = vec![PanelPlacement { span: None, label: true }, span(usize::MAX - 1, usize::MAX, 0, 1)];
        assert!(matches!(
            compute(&deep, canvas(), &style, None),
            Err(LayoutError::OutOfBounds { panel: 1, .. })
        ));
    }

    #[test]
    fn test_huge_fixed_grid_rejected() {
        let grid = Some(GridSpec { rows: 2, cols: 1 << 40 });
        assert!(matches!(
            compute(&auto(1), canvas(), &StyleBundle::default_style(), grid),
            Err(LayoutError::GridTooLarge { rows: 2, .. })
        ));
    }

    #[test]
    fn test_no_panels() {
        assert_eq!(
            compute(&[], canvas(), &StyleBundle::default_style(), None),
            Err(LayoutError::NoPanels)
        );
    }

    #[test]
    fn test_canvas_too_small() {
        let tiny = CanvasSize { width_px: 20, height_px: 20, dpi: 300 };
        assert!(matches!(
            compute(&auto(4), tiny, &StyleBundle::default_style(), None),
            Err(LayoutError::CanvasTooSmall { .. })
        ));
    }

    #[test]
    fn test_unlabeled_panel_skips_label() {
        let mut panels = auto(3);
        panels[1].label = false;
        let style = StyleBundle {
            label_scheme: LabelScheme::Lower,
            ..StyleBundle::nature()
        };
        let layout = compute(&panels, canvas(), &style, None).unwrap();
        let labels: Vec<_> = layout.panels.iter().map(|g| g.label.clone()).collect();
        assert_eq!(labels, vec![Some("a".into()), None, Some("b".into())]);
    }

    #[test]
    fn test_none_scheme() {
        let style = StyleBundle {
            label_scheme: LabelScheme::None,
            ..StyleBundle::default_style()
        };
        let layout = compute(&auto(2), canvas(), &style, None).unwrap();
        assert!(layout.panels.iter().all(|g| g.label.is_none()));
    }

    #[test]
    fn test_max_columns_caps_budget() {
        let style = StyleBundle {
            max_columns: 1,
            ..StyleBundle::default_style()
        };
        let layout = compute(&auto(3), canvas(), &style, None).unwrap();
        assert_eq!((layout.rows, layout.cols), (3, 1));
    }

    mod proptests {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_auto_layout_disjoint_and_inside(
                n in 1usize..24,
                w_cm in 5.0f64..30.0,
                h_cm in 5.0f64..30.0,
            ) {
                let canvas = CanvasSize::from_cm(w_cm, h_cm, 300);
                let layout = compute(&auto(n), canvas, &StyleBundle::default_style(), None).unwrap();
                prop_assert_eq!(layout.panels.len(), n);
                let bounds = PixelRect::new(0, 0, canvas.width_px, canvas.height_px);
                for (i, a) in layout.panels.iter().enumerate() {
                    prop_assert!(bounds.contains_rect(&a.rect));
                    prop_assert!(a.rect.width > 0 && a.rect.height > 0);
                    for b in &layout.panels[i + 1..] {
                        prop_assert!(!a.rect.intersects(&b.rect));
                    }
                }
            }
        }
    }
}
