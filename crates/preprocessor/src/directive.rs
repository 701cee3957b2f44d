use std::collections::BTreeMap;

use tracing::debug;

use crate::expand::{is_ident_start, is_word_char};
use crate::expr;
use crate::splice::SplicedSource;
use crate::types::{Diagnostic, MacroDef, MacroTable};

/// One open `#if`/`#ifdef`/`#ifndef` ... `#endif` block.
///
/// A line is live only when every frame on the stack is active, which is
/// what makes nested conditionals compose. `has_matched` records whether any
/// branch of the chain has fired so later `#elif`/`#else` short-circuit.
#[derive(Debug, Clone, Copy)]
struct ConditionalFrame {
    is_active: bool,
    has_matched: bool,
    start_line: usize,
}

/// Output of the directive phase: conditionally blanked text with directives
/// stripped, the composed line map, and the final macro table.
#[derive(Debug)]
pub(crate) struct ProcessedSource {
    pub code: String,
    pub line_map: BTreeMap<usize, usize>,
    pub macros: MacroTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run-scoped directive processor. All state is constructed fresh per run;
/// nothing outlives [`process_directives`].
struct DirectiveProcessor {
    macros: MacroTable,
    frames: Vec<ConditionalFrame>,
    diagnostics: Vec<Diagnostic>,
}

/// Scans the spliced source line by line, building the macro table and
/// resolving conditional inclusion.
///
/// Every directive line and every dead line is replaced by a blank line, so
/// the output line count always equals the spliced line count and line
/// numbers never drift.
pub(crate) fn process_directives(spliced: &SplicedSource) -> ProcessedSource {
    let mut processor = DirectiveProcessor {
        macros: MacroTable::new(),
        frames: Vec::new(),
        diagnostics: Vec::new(),
    };

    let mut out_lines: Vec<&str> = Vec::new();
    let mut line_map = BTreeMap::new();

    for (index, line) in spliced.code.split('\n').enumerate() {
        let spliced_line = index + 1;
        let original_line = spliced
            .line_map
            .get(&spliced_line)
            .copied()
            .unwrap_or(spliced_line);
        line_map.insert(spliced_line, original_line);

        out_lines.push(processor.process_line(line, original_line));
    }

    for frame in &processor.frames {
        processor.diagnostics.push(Diagnostic::new(
            frame.start_line,
            "Unclosed conditional directive (missing #endif)",
        ));
    }

    debug!(
        macros = processor.macros.len(),
        diagnostics = processor.diagnostics.len(),
        "directive processing complete"
    );

    ProcessedSource {
        code: out_lines.join("\n"),
        line_map,
        macros: processor.macros,
        diagnostics: processor.diagnostics,
    }
}

impl DirectiveProcessor {
    /// Conjunction of every frame's activity; true for an empty stack.
    fn live(&self) -> bool {
        self.frames.iter().all(|frame| frame.is_active)
    }

    /// Returns the replacement for one spliced line: the line itself, or a
    /// blank when the line is a directive or conditionally excluded.
    fn process_line<'a>(&mut self, line: &'a str, original_line: usize) -> &'a str {
        let trimmed = line.trim();
        let Some(directive) = trimmed.strip_prefix('#') else {
            return if self.live() { line } else { "" };
        };

        let (keyword, rest) = split_keyword(directive);
        match keyword {
            "define" => {
                if self.live() {
                    self.handle_define(rest, original_line);
                }
            }
            "undef" => {
                if self.live() {
                    if let Some((name, _)) = take_identifier(rest.trim_start()) {
                        self.macros.remove(name);
                    }
                }
            }
            "ifdef" => self.handle_ifdef(rest, original_line, false),
            "ifndef" => self.handle_ifdef(rest, original_line, true),
            "if" => {
                // Evaluated even under a dead parent so stack depth stays
                // consistent; the parent still gates activity.
                let live = self.live();
                let condition = self.evaluate_condition(rest, original_line);
                self.frames.push(ConditionalFrame {
                    is_active: live && condition,
                    has_matched: condition,
                    start_line: original_line,
                });
            }
            "elif" => self.handle_elif(rest, original_line),
            "else" => match self.frames.pop() {
                Some(mut frame) => {
                    // With the frame popped, live() is the parent conjunction.
                    frame.is_active = self.live() && !frame.has_matched;
                    frame.has_matched = true;
                    self.frames.push(frame);
                }
                None => {
                    self.diagnostics.push(Diagnostic::new(
                        original_line,
                        "#else without matching #if",
                    ));
                }
            },
            "endif" => {
                if self.frames.pop().is_none() {
                    self.diagnostics.push(Diagnostic::new(
                        original_line,
                        "#endif without matching #if",
                    ));
                }
            }
            // #version, #extension, and anything unrecognized are forwarded
            // untouched to the GLSL compiler when live.
            _ => return if self.live() { line } else { "" },
        }

        ""
    }

    fn handle_define(&mut self, rest: &str, original_line: usize) {
        let rest = rest.trim_start();
        let Some((name, after_name)) = take_identifier(rest) else {
            self.diagnostics.push(Diagnostic::new(
                original_line,
                "Malformed #define directive",
            ));
            return;
        };

        // A parameter list only counts when the paren hugs the name;
        // `#define F (x)` is an object-like macro whose body starts with `(`.
        let (params, body) = if let Some(param_text) = after_name.strip_prefix('(') {
            let Some(close) = param_text.find(')') else {
                self.diagnostics.push(Diagnostic::new(
                    original_line,
                    format!("Malformed #define directive: unterminated parameter list for {name}"),
                ));
                return;
            };
            match parse_params(&param_text[..close]) {
                Some(params) => (Some(params), param_text[close + 1..].trim()),
                None => {
                    self.diagnostics.push(Diagnostic::new(
                        original_line,
                        format!("Malformed #define directive: bad parameter list for {name}"),
                    ));
                    return;
                }
            }
        } else {
            (None, after_name.trim())
        };

        let body = match (params.is_some(), body.is_empty()) {
            // Flag macro: `#define NAME` defaults to "1".
            (false, true) => "1".to_string(),
            _ => body.to_string(),
        };

        // Redefinition silently overwrites; last #define wins.
        self.macros.insert(
            name.to_string(),
            MacroDef {
                params,
                body,
                defined_at: original_line,
            },
        );
    }

    fn handle_ifdef(&mut self, rest: &str, original_line: usize, negate: bool) {
        let live = self.live();
        let defined = take_identifier(rest.trim_start())
            .is_some_and(|(name, _)| self.macros.contains_key(name));
        let condition = defined != negate;
        self.frames.push(ConditionalFrame {
            is_active: live && condition,
            has_matched: condition,
            start_line: original_line,
        });
    }

    fn handle_elif(&mut self, rest: &str, original_line: usize) {
        let Some(mut frame) = self.frames.pop() else {
            self.diagnostics.push(Diagnostic::new(
                original_line,
                "#elif without matching #if",
            ));
            return;
        };
        if frame.has_matched {
            // An earlier branch already fired; do not re-evaluate, so the
            // expression cannot produce diagnostics twice.
            frame.is_active = false;
        } else {
            let condition = self.evaluate_condition(rest, original_line);
            frame.is_active = self.live() && condition;
            frame.has_matched = condition;
        }
        self.frames.push(frame);
    }

    /// Evaluates a `#if`/`#elif` expression; failures become a diagnostic
    /// and a false condition rather than aborting the run.
    fn evaluate_condition(&mut self, expression: &str, original_line: usize) -> bool {
        match expr::evaluate(expression.trim(), &self.macros) {
            Ok(value) => value,
            Err(error) => {
                self.diagnostics.push(Diagnostic::new(
                    original_line,
                    format!("Invalid conditional expression: {error}"),
                ));
                false
            }
        }
    }
}

/// Splits a directive body into its keyword and the remainder.
fn split_keyword(directive: &str) -> (&str, &str) {
    let trimmed = directive.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map(|(offset, _)| offset)
        .unwrap_or(trimmed.len());
    (&trimmed[..end], &trimmed[end..])
}

/// Takes a leading identifier, returning it and the remainder.
fn take_identifier(text: &str) -> Option<(&str, &str)> {
    let first = text.chars().next()?;
    if !is_ident_start(first) {
        return None;
    }
    let end = text
        .char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    Some((&text[..end], &text[end..]))
}

/// Parses a `#define` parameter list; every entry must be an identifier.
/// An empty list is valid (`#define F()`).
fn parse_params(text: &str) -> Option<Vec<String>> {
    if text.trim().is_empty() {
        return Some(Vec::new());
    }
    let mut params = Vec::new();
    for piece in text.split(',') {
        let name = piece.trim();
        let mut chars = name.chars();
        let valid = chars.next().is_some_and(is_ident_start) && chars.all(is_word_char);
        if !valid {
            return None;
        }
        params.push(name.to_string());
    }
    Some(params)
}
