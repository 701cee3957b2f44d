//! GLSL preprocessor engine for the shader playground.
//!
//! Implements the C-preprocessor subset GLSL shaders rely on: `#define` /
//! `#undef` (object-like and function-like macros), the conditional family
//! (`#ifdef`, `#ifndef`, `#if`, `#elif`, `#else`, `#endif`), backslash line
//! splicing, and line-number remapping so downstream compiler errors can be
//! reported against the lines the user actually wrote.
//!
//! Full GLSL parsing is out of scope; compilation belongs to the WebGL
//! driver. `#include`, token pasting (`##`), stringizing (`#`), and variadic
//! macros are not supported.

mod directive;
mod expand;
mod expr;
mod splice;
mod types;

pub use types::{Diagnostic, MacroDef, MacroTable};

use std::collections::BTreeMap;

use serde::Serialize;

/// Result of one preprocessing run. A run never fails outright: diagnostics
/// accumulate and `code` is always best-effort compilable text.
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessOutput {
    /// Fully preprocessed GLSL source.
    pub code: String,
    /// Output line -> original input line (both 1-indexed).
    pub line_mapping: BTreeMap<usize, usize>,
    /// Every problem encountered, in order; line 0 means unlocatable.
    pub errors: Vec<Diagnostic>,
}

/// Preprocesses raw GLSL source.
///
/// Three ordered phases run over the text: line splicing, directive
/// processing, and whole-text macro expansion. All state is scoped to this
/// call, so concurrent runs never interfere.
pub fn preprocess(source: &str) -> PreprocessOutput {
    let normalized = normalize_newlines(source);
    let spliced = splice::splice_lines(&normalized);
    let directive::ProcessedSource {
        code,
        line_map,
        macros,
        mut diagnostics,
    } = directive::process_directives(&spliced);

    let code = expand::expand_macros(code, &macros, &line_map, &mut diagnostics);

    PreprocessOutput {
        code,
        line_mapping: line_map,
        errors: diagnostics,
    }
}

/// Collects the distinct macro names defined anywhere in the source, in
/// definition order.
///
/// This is the editor-autocomplete helper: it reads literal `#define` lines
/// only, with no expansion and no conditional tracking, so names inside dead
/// branches are still reported.
pub fn extract_macro_names(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for line in normalize_newlines(source).lines() {
        let Some(rest) = line.trim_start().strip_prefix('#') else {
            continue;
        };
        let Some(rest) = rest.trim_start().strip_prefix("define") else {
            continue;
        };
        // Reject `#defined` and similar run-ons.
        if rest.chars().next().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }

        let rest = rest.trim_start();
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        let starts_validly = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if starts_validly && !names.contains(&name) {
            names.push(name);
        }
    }

    names
}

fn normalize_newlines(source: &str) -> String {
    source.replace("\r\n", "\n").replace('\r', "\n")
}
