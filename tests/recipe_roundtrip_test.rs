//! Property tests for recipe serialization and validation.
//!
//! Run: cargo test --test recipe_roundtrip_test

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use proptest::prelude::*;
use trueno_fig::plots::RendererRegistry;
use trueno_fig::recipe::{
    self, Annotation, DataSource, ExportSpec, FigureSpec, LoadOptions, Panel, Recipe, Severity, Span,
};

const TABLE_KINDS: &[&str] = &["scatter", "volcano", "box", "heatmap"];

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}".prop_map(|s| format!("s_{s}"))
}

prop_compose! {
    fn arb_panel(n_sources: usize)(
        kind in prop::sample::select(TABLE_KINDS),
        source in 0..n_sources,
        title in prop::option::of("[a-z]{1,10}".prop_map(|s| format!("Panel {s}"))),
        label in any::<bool>(),
        optional in any::<bool>(),
        notes in prop::collection::vec((0.0..500.0f64, 0.0..500.0f64), 0..3),
        span in prop::option::of((0usize..3, 1usize..3, 0usize..3, 1usize..3)),
    ) -> (Panel, usize) {
        let mut panel = Panel::new(kind);
        panel.title = title;
        panel.label = label;
        panel.optional = optional;
        panel.x = Some("log2fc".to_string());
        panel.y = Some("pvalue".to_string());
        panel.annotations = notes
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| Annotation { text: format!("n{i}"), x, y, font_size_pt: None })
            .collect();
        panel.span = span.map(|(r, rh, c, cw)| Span {
            row_start: r,
            row_end: r + rh,
            col_start: c,
            col_end: c + cw,
        });
        (panel, source)
    }
}

fn arb_recipe() -> impl Strategy<Value = Recipe> {
    let sources = prop::collection::btree_set(ident(), 1..4);
    sources.prop_flat_map(|names| {
        let names: Vec<String> = names.into_iter().collect();
        let n = names.len();
        (
            Just(names),
            prop::collection::vec(arb_panel(n), 0..5),
            prop::sample::select(vec!["default", "nature", "science", "cell"]),
            2u32..30,
            2u32..30,
            prop::sample::select(vec![72i64, 150, 300, 600]),
            prop::collection::btree_set(prop::sample::select(vec!["png", "tiff", "jpeg", "pdf", "svg"]), 0..4),
        )
            .prop_map(|(names, panels, style, w, h, dpi, formats)| {
                let data = names
                    .iter()
                    .map(|name| DataSource {
                        name: name.clone(),
                        path: PathBuf::from(format!("{name}.csv")),
                        options: LoadOptions::default(),
                    })
                    .collect();
                let panels = panels
                    .into_iter()
                    .map(|(mut panel, source)| {
                        panel.data = Some(names[source].clone());
                        panel
                    })
                    .collect();
                let export: BTreeMap<String, PathBuf> = formats
                    .into_iter()
                    .map(|f| (f.to_string(), PathBuf::from(format!("out/fig.{f}"))))
                    .collect();
                Recipe {
                    version: "1".to_string(),
                    data,
                    figure: FigureSpec {
                        style: style.to_string(),
                        width_cm: f64::from(w) / 2.0,
                        height_cm: f64::from(h) / 2.0,
                        dpi: Some(dpi),
                        panels,
                        ..FigureSpec::default()
                    },
                    export: ExportSpec(export),
                }
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_serialize_then_parse_is_identity(recipe in arb_recipe()) {
        let registry = RendererRegistry::with_builtins();
        let text = recipe::serialize(&recipe).unwrap();
        let parsed = recipe::parse(&text, &registry).unwrap();
        prop_assert_eq!(parsed, recipe);
    }

    #[test]
    fn prop_generated_recipes_have_no_errors(recipe in arb_recipe()) {
        let registry = RendererRegistry::with_builtins();
        let issues = recipe::check(&recipe, &registry);
        prop_assert!(issues.iter().all(|i| i.severity == Severity::Warning), "{:?}", issues);
    }

    #[test]
    fn prop_dangling_reference_is_one_error(recipe in arb_recipe(), victim in any::<prop::sample::Index>()) {
        prop_assume!(!recipe.figure.panels.is_empty());
        let mut recipe = recipe;
        let i = victim.index(recipe.figure.panels.len());
        recipe.figure.panels[i].data = Some("not_declared".to_string());

        let errors: Vec<_> = recipe::check(&recipe, &RendererRegistry::with_builtins())
            .into_iter()
            .filter(|issue| issue.severity == Severity::Error)
            .collect();
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(&errors[0].field_path, &format!("figure.panels[{i}].data"));
    }
}
