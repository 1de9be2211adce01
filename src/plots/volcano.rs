//! Volcano plot (`volcano`): effect size against significance.
//!
//! Points are classified against a fold-change threshold and a p-value
//! threshold (drawn at `-log10(p)`) and colored up, down or not significant.
//! Thresholds are drawn as dashed guide lines.

use super::axes::{padded_domain, tick_label_chars, Frame};
use super::{numeric_column, panel_framebuffer, role_column, InputKind, PanelInput, PanelParams, PlotRenderer, RenderResult};
use crate::color::Rgba;
use crate::error::RenderError;
use crate::layout::LayoutGeometry;
use crate::render::{draw_circle, draw_dashed_line, draw_text, text_height};
use crate::scale::{finite_extent, Scale};
use crate::style::StyleBundle;

const KIND: &str = "volcano";
const PARAMS: &[&str] = &["fc_threshold", "p_threshold", "label_column", "top_n"];

/// Classification of one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regulation {
    /// Above both thresholds with positive effect.
    Up,
    /// Above both thresholds with negative effect.
    Down,
    /// Below either threshold.
    NotSignificant,
}

impl Regulation {
    /// Classify a point given its effect `fc`, significance `neg_log_p` and
    /// thresholds. Non-finite points are not significant.
    #[must_use]
    pub fn classify(fc: f64, neg_log_p: f64, fc_threshold: f64, sig_threshold: f64) -> Self {
        if !(fc.is_finite() && neg_log_p.is_finite()) || neg_log_p < sig_threshold {
            Self::NotSignificant
        } else if fc >= fc_threshold {
            Self::Up
        } else if fc <= -fc_threshold {
            Self::Down
        } else {
            Self::NotSignificant
        }
    }

    fn color(self, style: &StyleBundle) -> Rgba {
        match self {
            Self::Up => style.color(1),
            Self::Down => style.color(0),
            Self::NotSignificant => Rgba::GRAY.with_alpha(140),
        }
    }
}

/// `volcano` renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolcanoRenderer;

impl PlotRenderer for VolcanoRenderer {
    fn kind(&self) -> &str {
        KIND
    }

    fn input(&self) -> InputKind {
        InputKind::Table
    }

    fn describe(&self) -> &str {
        "Volcano plot of log2 fold change against -log10 p-value"
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
        let x_col = role_column(params, KIND, "x", Some("log2fc"))?;
        let y_col = role_column(params, KIND, "y", Some("neg_log10_p"))?;
        let fc = numeric_column(table, KIND, "x", x_col)?;
        let sig = numeric_column(table, KIND, "y", y_col)?;

        let invalid = |param: &str, message: &str| RenderError::InvalidParameter {
            kind: KIND.to_string(),
            param: param.to_string(),
            message: message.to_string(),
        };
        let fc_threshold = params.f64(KIND, "fc_threshold")?.unwrap_or(1.0);
        if fc_threshold < 0.0 {
            return Err(invalid("fc_threshold", "must be non-negative"));
        }
        let p_threshold = params.f64(KIND, "p_threshold")?.unwrap_or(0.05);
        if !(p_threshold > 0.0 && p_threshold <= 1.0) {
            return Err(invalid("p_threshold", "must be in (0, 1]"));
        }
        let sig_threshold = -p_threshold.log10();

        let rows: Vec<usize> = (0..table.n_rows()).filter(|&i| fc[i].is_finite() && sig[i].is_finite()).collect();
        if rows.is_empty() {
            return Err(RenderError::EmptyData { kind: KIND.to_string() });
        }

        let labels = match params.str(KIND, "label_column")? {
            Some(name) => Some(table.column(name).ok_or_else(|| RenderError::MissingColumn {
                kind: KIND.to_string(),
                role: "label_column".to_string(),
                column: name.to_string(),
            })?),
            None => None,
        };
        let top_n = params.f64(KIND, "top_n")?.unwrap_or(10.0).max(0.0) as usize;

        // Symmetric x domain keeps zero centered and both guides visible.
        let (fc_lo, fc_hi) = finite_extent(fc).unwrap_or((-1.0, 1.0));
        let reach = fc_lo.abs().max(fc_hi.abs()).max(fc_threshold * 1.2).max(0.5);
        let (x_lo, x_hi) = padded_domain(-reach, reach, 0.05);
        let (_, sig_hi) = finite_extent(sig).unwrap_or((0.0, 1.0));
        let (_, y_hi) = padded_domain(0.0, sig_hi.max(sig_threshold * 1.2), 0.05);

        let mut fb = panel_framebuffer(geometry)?;
        let frame = Frame::new(
            KIND,
            fb.width(),
            fb.height(),
            style,
            params.dpi,
            params.title().is_some(),
            tick_label_chars(0.0, y_hi),
        )?;
        let x = frame.x_scale((x_lo, x_hi))?;
        let y = frame.y_scale((0.0, y_hi))?;
        frame.draw_axes(&mut fb, &x, &y, x_col, y_col, style);

        let p = frame.plot;
        let guide = Rgba::GRAY;
        let dash = style.px(2.0, params.dpi);
        let gy = y.scale(sig_threshold).round() as i32;
        draw_dashed_line(&mut fb, p.x as i32, gy, p.right() as i32 - 1, gy, dash, guide);
        if fc_threshold > 0.0 {
            for edge in [-fc_threshold, fc_threshold] {
                let gx = x.scale(edge).round() as i32;
                draw_dashed_line(&mut fb, gx, p.y as i32, gx, p.bottom() as i32 - 1, dash, guide);
            }
        }

        let radius = (style.px(style.marker_size_pt, params.dpi) / 2).max(1) as i32;
        let mut counts = [0usize; 3];
        let mut classes = Vec::with_capacity(rows.len());
        // Non-significant first so hits stay on top.
        for pass in [false, true] {
            for &i in &rows {
                let class = Regulation::classify(fc[i], sig[i], fc_threshold, sig_threshold);
                if (class != Regulation::NotSignificant) != pass {
                    continue;
                }
                counts[class as usize] += 1;
                classes.push((i, class));
                let (px, py) = (x.scale(fc[i]).round() as i32, y.scale(sig[i]).round() as i32);
                draw_circle(&mut fb, px, py, radius, class.color(style));
            }
        }

        if let Some(column) = labels {
            let mut hits: Vec<usize> = classes
                .iter()
                .filter(|(_, c)| *c != Regulation::NotSignificant)
                .map(|(i, _)| *i)
                .collect();
            hits.sort_by(|a, b| sig[*b].total_cmp(&sig[*a]));
            let th = text_height(frame.tick_scale) as i32;
            for &i in hits.iter().take(top_n) {
                let (px, py) = (x.scale(fc[i]).round() as i32, y.scale(sig[i]).round() as i32);
                draw_text(&mut fb, px + radius + 1, py - th, &column.key(i), frame.tick_scale, style.foreground);
            }
        }

        if let Some(title) = params.title() {
            frame.draw_title(&mut fb, title, style.foreground);
        }

        let [up, down, ns] = counts;
        Ok(RenderResult::new(geometry, fb).with_note(format!("{up} up, {down} down, {ns} ns")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Table};
    use crate::geometry::PixelRect;
    use crate::layout::GridCell;
    use crate::recipe::Panel;

    fn geometry() -> LayoutGeometry {
        LayoutGeometry {
            panel_index: 1,
            rect: PixelRect::new(0, 0, 500, 400),
            cell: GridCell { row: 0, col: 1, row_span: 1, col_span: 1 },
            label: Some("B".into()),
        }
    }

    fn table() -> Table {
        Table::from_columns(vec![
            ("gene".into(), Column::Text(vec![Some("a".into()), Some("b".into()), Some("c".into()), Some("d".into())])),
            ("log2fc".into(), Column::Numeric(vec![2.5, -3.0, 0.2, 4.0])),
            ("neg_log10_p".into(), Column::Numeric(vec![5.0, 3.0, 6.0, 0.5])),
        ])
        .unwrap()
    }

    #[test]
    fn test_classify() {
        let t = -(0.05f64).log10();
        assert_eq!(Regulation::classify(2.0, 3.0, 1.0, t), Regulation::Up);
        assert_eq!(Regulation::classify(-2.0, 3.0, 1.0, t), Regulation::Down);
        assert_eq!(Regulation::classify(0.5, 3.0, 1.0, t), Regulation::NotSignificant);
        assert_eq!(Regulation::classify(5.0, 1.0, 1.0, t), Regulation::NotSignificant);
        assert_eq!(Regulation::classify(f64::NAN, 3.0, 1.0, t), Regulation::NotSignificant);
    }

    #[test]
    fn test_render_counts_with_default_columns() {
        let t = table();
        let mut panel = Panel::new("volcano");
        panel.params = serde_yaml_ng::from_str("label_column: gene\ntop_n: 1").unwrap();
        let result = VolcanoRenderer
            .render(PanelInput::Table(&t), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 150))
            .unwrap();
        assert_eq!(result.notes, vec!["1 up, 1 down, 2 ns".to_string()]);
        assert_eq!(result.label.as_deref(), Some("B"));
    }

    #[test]
    fn test_bad_threshold() {
        let t = table();
        let mut panel = Panel::new("volcano");
        panel.params = serde_yaml_ng::from_str("p_threshold: 0").unwrap();
        let err = VolcanoRenderer
            .render(PanelInput::Table(&t), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 150))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidParameter { ref param, .. } if param == "p_threshold"));
    }

    #[test]
    fn test_missing_default_column() {
        let t = Table::from_columns(vec![("fc".into(), Column::Numeric(vec![1.0]))]).unwrap();
        let panel = Panel::new("volcano");
        let err = VolcanoRenderer
            .render(PanelInput::Table(&t), &geometry(), &StyleBundle::default(), &PanelParams::new(&panel, 150))
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingColumn { ref column, .. } if column == "log2fc"));
    }
}
