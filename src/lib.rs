//! # Trueno-Fig
//!
//! Recipe-driven assembly of multi-panel publication figures.
//!
//! A YAML recipe names data sources, transforms, a style preset, a panel grid
//! and export targets. The pipeline loads each source once, renders panels in
//! parallel through a registry of plot renderers, composes them onto a canvas
//! with the physical size and DPI the recipe asks for, and writes every export
//! target atomically.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trueno_fig::prelude::*;
//!
//! let pipeline = Pipeline::new(RendererRegistry::with_builtins(), PipelineConfig::default());
//! let ctx = RenderContext::new("figures/");
//! let report = pipeline.render_document(&std::fs::read_to_string("figures/fig1.yaml")?, &ctx)?;
//! assert!(report.is_success());
//! ```
//!
//! ## Pipeline Stages
//!
//! 1. [`recipe`] parses and validates the document.
//! 2. [`style`] resolves the preset plus overrides into a [`style::StyleBundle`].
//! 3. [`layout`] turns centimetres and DPI into pixel panel rectangles.
//! 4. [`data`] loads and fingerprints tables, memoized per invocation.
//! 5. [`transform`] filters, derives and adjusts columns.
//! 6. [`plots`] renders each panel into its own raster.
//! 7. [`canvas`] composes panels and labels.
//! 8. [`output`] encodes PNG, TIFF, JPEG, PDF and SVG.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only - banned in production code
#![cfg_attr(test, allow(clippy::unwrap_used))]
// Allow common patterns in graphics code
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Core Modules
// ============================================================================

/// Color types and parsing.
pub mod color;

/// Core framebuffer for pixel rendering.
pub mod framebuffer;

/// Geometric primitives (points, rectangles).
pub mod geometry;

/// Scale functions for data-to-pixel mappings.
pub mod scale;

/// Rasterization primitives and the bitmap font.
pub mod render;

// ============================================================================
// Recipe Modules
// ============================================================================

/// Recipe model, validation and serialization.
pub mod recipe;

/// Style presets and override resolution.
pub mod style;

/// Physical canvas size and grid layout.
pub mod layout;

// ============================================================================
// Data Modules
// ============================================================================

/// Table loading, fingerprints and the per-invocation cache.
pub mod data;

/// Filter, derive, sort and p-value adjustment.
pub mod transform;

// ============================================================================
// Rendering Modules
// ============================================================================

/// Plot renderers and their registry.
pub mod plots;

/// Panel composition and labels.
pub mod canvas;

/// Export encoders and atomic writes.
pub mod output;

// ============================================================================
// Orchestration
// ============================================================================

/// Cooperative cancellation.
pub mod cancel;

/// Pipeline configuration (file, environment).
pub mod config;

/// End-to-end render pipeline.
pub mod pipeline;

/// Assembly-project documents and their conversion to recipes.
pub mod project;

// ============================================================================
// Error Types
// ============================================================================

/// Error types for trueno-fig operations.
pub mod error;

pub use error::{
    Cancelled, Error, ExportError, LayoutError, LoadError, RenderError, Result, StyleError, TransformError,
    ValidationError,
};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types for convenient imports.
///
/// ```rust,ignore
/// use trueno_fig::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::color::Rgba;
    pub use crate::config::PipelineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::framebuffer::Framebuffer;
    pub use crate::layout::CanvasSize;
    pub use crate::pipeline::{Pipeline, RenderContext, RenderReport};
    pub use crate::plots::{PlotRenderer, RendererRegistry};
    pub use crate::recipe::{ExportFormat, Recipe};
    pub use crate::style::StyleBundle;
}

// ============================================================================
// Re-exports
// ============================================================================

/// Re-export trueno for direct access to SIMD operations.
pub use trueno;
