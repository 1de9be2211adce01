//! Scale functions for data-to-visual mappings.
//!
//! Scales transform data values to visual properties (position, color).
//! Based on the Grammar of Graphics [Wilkinson 2005]. Domains are `f64`
//! because table columns are; ranges are pixels or colors.

use crate::color::Rgba;
use crate::error::{Error, Result};

/// Trait for scale functions that map domain values to range values.
pub trait Scale<D, R> {
    /// Transform a domain value to a range value.
    fn scale(&self, value: D) -> R;

    /// Get the domain extent.
    fn domain(&self) -> (D, D);

    /// Get the range extent.
    fn range(&self) -> (R, R);
}

/// Linear scale for continuous-to-continuous mapping.
#[derive(Debug, Clone, Copy)]
pub struct LinearScale {
    domain_min: f64,
    domain_max: f64,
    range_min: f64,
    range_max: f64,
}

impl LinearScale {
    /// Create a new linear scale.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is degenerate or not finite.
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Result<Self> {
        if !domain.0.is_finite() || !domain.1.is_finite() {
            return Err(Error::ScaleDomain("Domain must be finite".to_string()));
        }
        if (domain.0 - domain.1).abs() < f64::EPSILON {
            return Err(Error::ScaleDomain("Domain min and max cannot be equal".to_string()));
        }

        Ok(Self {
            domain_min: domain.0,
            domain_max: domain.1,
            range_min: range.0,
            range_max: range.1,
        })
    }

    /// Create a scale from the finite extent of `data`, widened by `pad`
    /// (a fraction of the span) on both sides. A constant column gets a
    /// unit-wide domain centered on its value.
    #[must_use]
    pub fn from_data(data: &[f64], range: (f64, f64), pad: f64) -> Option<Self> {
        let (min, max) = finite_extent(data)?;
        let (min, max) = if (max - min).abs() < f64::EPSILON {
            (min - 0.5, max + 0.5)
        } else {
            let margin = (max - min) * pad;
            (min - margin, max + margin)
        };
        Self::new((min, max), range).ok()
    }

    /// Invert the scale (range to domain).
    #[must_use]
    pub fn invert(&self, value: f64) -> f64 {
        let t = (value - self.range_min) / (self.range_max - self.range_min);
        self.domain_min + t * (self.domain_max - self.domain_min)
    }
}

impl Scale<f64, f64> for LinearScale {
    fn scale(&self, value: f64) -> f64 {
        let t = (value - self.domain_min) / (self.domain_max - self.domain_min);
        self.range_min + t * (self.range_max - self.range_min)
    }

    fn domain(&self) -> (f64, f64) {
        (self.domain_min, self.domain_max)
    }

    fn range(&self) -> (f64, f64) {
        (self.range_min, self.range_max)
    }
}

/// Min and max over the finite values of `data`.
#[must_use]
pub fn finite_extent(data: &[f64]) -> Option<(f64, f64)> {
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Color scale for mapping values to colors.
#[derive(Debug, Clone)]
pub struct ColorScale {
    colors: Vec<Rgba>,
    domain_min: f64,
    domain_max: f64,
}

impl ColorScale {
    /// Create a new color scale.
    ///
    /// # Errors
    ///
    /// Returns an error if colors is empty or domain is invalid.
    pub fn new(colors: Vec<Rgba>, domain: (f64, f64)) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::ScaleDomain("Color scale requires at least one color".to_string()));
        }

        if (domain.0 - domain.1).abs() < f64::EPSILON {
            return Err(Error::ScaleDomain("Domain min and max cannot be equal".to_string()));
        }

        Ok(Self {
            colors,
            domain_min: domain.0,
            domain_max: domain.1,
        })
    }

    /// Look up a named continuous palette: `viridis`, `magma`, `blues`,
    /// `red_blue`, `heat` or `greyscale`.
    #[must_use]
    pub fn named(name: &str, domain: (f64, f64)) -> Option<Self> {
        match name {
            "viridis" => Self::viridis(domain),
            "magma" => Self::magma(domain),
            "blues" => Self::blues(domain),
            "red_blue" | "rdbu" => Self::red_blue(domain),
            "heat" => Self::heat(domain),
            "greyscale" | "grayscale" => Self::greyscale(domain),
            _ => None,
        }
    }

    /// Create a sequential blue scale.
    #[must_use]
    pub fn blues(domain: (f64, f64)) -> Option<Self> {
        Self::new(
            vec![
                Rgba::rgb(247, 251, 255),
                Rgba::rgb(198, 219, 239),
                Rgba::rgb(107, 174, 214),
                Rgba::rgb(33, 113, 181),
                Rgba::rgb(8, 48, 107),
            ],
            domain,
        )
        .ok()
    }

    /// Create a diverging red-blue scale.
    #[must_use]
    pub fn red_blue(domain: (f64, f64)) -> Option<Self> {
        Self::new(
            vec![
                Rgba::rgb(33, 102, 172),
                Rgba::rgb(103, 169, 207),
                Rgba::rgb(247, 247, 247),
                Rgba::rgb(239, 138, 98),
                Rgba::rgb(178, 24, 43),
            ],
            domain,
        )
        .ok()
    }

    /// Create a viridis color scale (perceptually uniform).
    #[must_use]
    pub fn viridis(domain: (f64, f64)) -> Option<Self> {
        Self::new(
            vec![
                Rgba::rgb(68, 1, 84),
                Rgba::rgb(59, 82, 139),
                Rgba::rgb(33, 145, 140),
                Rgba::rgb(94, 201, 98),
                Rgba::rgb(253, 231, 37),
            ],
            domain,
        )
        .ok()
    }

    /// Create a magma color scale (sequential, perceptually uniform).
    #[must_use]
    pub fn magma(domain: (f64, f64)) -> Option<Self> {
        Self::new(
            vec![
                Rgba::rgb(0, 0, 4),
                Rgba::rgb(81, 18, 124),
                Rgba::rgb(183, 55, 121),
                Rgba::rgb(252, 137, 97),
                Rgba::rgb(252, 253, 191),
            ],
            domain,
        )
        .ok()
    }

    /// Create a greyscale color scale.
    #[must_use]
    pub fn greyscale(domain: (f64, f64)) -> Option<Self> {
        Self::new(vec![Rgba::BLACK, Rgba::WHITE], domain).ok()
    }

    /// Create a heat color scale (black-red-yellow-white).
    #[must_use]
    pub fn heat(domain: (f64, f64)) -> Option<Self> {
        Self::new(
            vec![
                Rgba::rgb(0, 0, 0),
                Rgba::rgb(128, 0, 0),
                Rgba::rgb(255, 0, 0),
                Rgba::rgb(255, 128, 0),
                Rgba::rgb(255, 255, 0),
                Rgba::rgb(255, 255, 255),
            ],
            domain,
        )
        .ok()
    }
}

impl Scale<f64, Rgba> for ColorScale {
    fn scale(&self, value: f64) -> Rgba {
        let t = ((value - self.domain_min) / (self.domain_max - self.domain_min)).clamp(0.0, 1.0);

        if self.colors.len() == 1 {
            return self.colors[0];
        }

        let segment_count = self.colors.len() - 1;
        let segment = (t * segment_count as f64).floor() as usize;
        let segment = segment.min(segment_count - 1);

        let local_t = t * segment_count as f64 - segment as f64;

        self.colors[segment].lerp(self.colors[segment + 1], local_t as f32)
    }

    fn domain(&self) -> (f64, f64) {
        (self.domain_min, self.domain_max)
    }

    fn range(&self) -> (Rgba, Rgba) {
        (
            *self.colors.first().unwrap_or(&Rgba::BLACK),
            *self.colors.last().unwrap_or(&Rgba::WHITE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_scale() {
        let scale = LinearScale::new((0.0, 100.0), (0.0, 1.0)).expect("operation should succeed");
        assert!((scale.scale(0.0) - 0.0).abs() < 0.001);
        assert!((scale.scale(50.0) - 0.5).abs() < 0.001);
        assert!((scale.scale(100.0) - 1.0).abs() < 0.001);
        assert!((scale.invert(0.5) - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_inverted_pixel_range() {
        // y axes run bottom-up
        let scale = LinearScale::new((0.0, 10.0), (200.0, 0.0)).unwrap();
        assert!((scale.scale(0.0) - 200.0).abs() < 1e-9);
        assert!((scale.scale(10.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_scale_equal_domain_error() {
        assert!(LinearScale::new((5.0, 5.0), (0.0, 1.0)).is_err());
        assert!(LinearScale::new((0.0, f64::NAN), (0.0, 1.0)).is_err());
    }

    #[test]
    fn test_from_data_skips_nan_and_pads() {
        let scale = LinearScale::from_data(&[f64::NAN, 0.0, 10.0], (0.0, 1.0), 0.1).unwrap();
        assert_eq!(scale.domain(), (-1.0, 11.0));
    }

    #[test]
    fn test_from_data_constant_column() {
        let scale = LinearScale::from_data(&[5.0, 5.0], (0.0, 1.0), 0.0).unwrap();
        assert_eq!(scale.domain(), (4.5, 5.5));
        assert!(LinearScale::from_data(&[f64::NAN], (0.0, 1.0), 0.0).is_none());
    }

    #[test]
    fn test_color_scale_clamping() {
        let scale = ColorScale::new(vec![Rgba::BLACK, Rgba::WHITE], (0.0, 1.0))
            .expect("color scale creation should succeed");
        assert_eq!(scale.scale(-1.0), Rgba::BLACK);
        assert_eq!(scale.scale(2.0), Rgba::WHITE);
        let mid = scale.scale(0.5);
        assert!(mid.r > 100 && mid.r < 150);
    }

    #[test]
    fn test_color_scale_single_color() {
        let scale = ColorScale::new(vec![Rgba::BLACK], (0.0, 1.0)).unwrap();
        assert_eq!(scale.scale(0.5), Rgba::BLACK);
    }

    #[test]
    fn test_named_palettes() {
        for name in ["viridis", "magma", "blues", "red_blue", "heat", "greyscale"] {
            assert!(ColorScale::named(name, (0.0, 1.0)).is_some(), "{name}");
        }
        assert!(ColorScale::named("rainbow", (0.0, 1.0)).is_none());
        assert!(ColorScale::viridis((5.0, 5.0)).is_none());
    }

    #[test]
    fn test_color_scale_invalid_empty() {
        assert!(ColorScale::new(vec![], (0.0, 1.0)).is_err());
    }
}
