use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::types::{Diagnostic, MacroDef, MacroTable};

/// Upper bound on whole-text substitution passes. Circular definitions such
/// as `#define A B` / `#define B A` hit this cap instead of hanging.
const MAX_EXPANSION_PASSES: usize = 100;

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn has_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !is_word_char(c));
    let after_ok = text[end..].chars().next().is_none_or(|c| !is_word_char(c));
    before_ok && after_ok
}

/// Replaces every whole-word occurrence of `name` in one left-to-right
/// sweep. Returns `None` when nothing matched.
pub(crate) fn replace_whole_word(text: &str, name: &str, replacement: &str) -> Option<String> {
    let mut out = String::new();
    let mut copied_to = 0;
    let mut search_from = 0;
    let mut changed = false;

    while let Some(found) = text[search_from..].find(name) {
        let start = search_from + found;
        let end = start + name.len();
        if has_word_boundary(text, start, end) {
            out.push_str(&text[copied_to..start]);
            out.push_str(replacement);
            copied_to = end;
            search_from = end;
            changed = true;
        } else {
            // Macro names are ASCII identifiers, so +1 stays on a char boundary.
            search_from = start + 1;
        }
    }

    if changed {
        out.push_str(&text[copied_to..]);
        Some(out)
    } else {
        None
    }
}

/// Expands all macros over the whole directive-processed text.
///
/// The text is treated as one buffer rather than line-by-line so that
/// function-like invocations may span newlines. Each pass visits macros
/// longest-name-first, so `FOOBAR` can never be clobbered by a shorter
/// `FOO`. Passes repeat until a fixpoint or [`MAX_EXPANSION_PASSES`].
pub(crate) fn expand_macros(
    code: String,
    macros: &MacroTable,
    line_map: &BTreeMap<usize, usize>,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    if macros.is_empty() {
        return code;
    }

    let mut names: Vec<&str> = macros.keys().map(String::as_str).collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    // Abandoned invocations stay in the text and are re-scanned on every
    // pass; this set keeps each one to a single diagnostic per run.
    let mut reported: HashSet<(usize, String)> = HashSet::new();

    let mut text = code;
    for pass in 0..MAX_EXPANSION_PASSES {
        let mut changed = false;
        for name in &names {
            let def = &macros[*name];
            let did = match &def.params {
                None => match replace_whole_word(&text, name, &def.body) {
                    Some(replaced) => {
                        text = replaced;
                        true
                    }
                    None => false,
                },
                Some(params) => expand_function_like(
                    &mut text,
                    name,
                    params,
                    def,
                    line_map,
                    diagnostics,
                    &mut reported,
                ),
            };
            changed |= did;
        }

        if !changed {
            debug!(passes = pass + 1, "macro expansion reached fixpoint");
            return text;
        }
    }

    warn!("macro expansion did not reach a fixpoint; giving up");
    diagnostics.push(Diagnostic::new(
        0,
        "Macro expansion exceeded maximum recursion depth",
    ));
    text
}

/// Expands every well-formed invocation of one function-like macro in a
/// single sweep. Malformed invocations produce a diagnostic and are left in
/// place; scanning continues behind them.
fn expand_function_like(
    text: &mut String,
    name: &str,
    params: &[String],
    def: &MacroDef,
    line_map: &BTreeMap<usize, usize>,
    diagnostics: &mut Vec<Diagnostic>,
    reported: &mut HashSet<(usize, String)>,
) -> bool {
    let mut changed = false;
    let mut search_from = 0;

    loop {
        let Some(found) = text[search_from..].find(name) else {
            break;
        };
        let start = search_from + found;
        let end = start + name.len();

        if !has_word_boundary(text, start, end) {
            search_from = start + 1;
            continue;
        }

        // A bare name without an argument list is not an invocation.
        if text.as_bytes().get(end) != Some(&b'(') {
            search_from = end;
            continue;
        }

        let Some((args_len, args)) = collect_arguments(&text[end..]) else {
            report_once(
                diagnostics,
                reported,
                line_for_offset(text, start, line_map),
                format!("Unmatched parentheses in macro invocation: {name}"),
            );
            search_from = end;
            continue;
        };
        let invocation_end = end + args_len;

        // `NAME()` parses as one empty argument; a zero-parameter macro
        // accepts it.
        let args = if params.is_empty() && args.len() == 1 && args[0].is_empty() {
            Vec::new()
        } else {
            args
        };

        if args.len() != params.len() {
            report_once(
                diagnostics,
                reported,
                line_for_offset(text, start, line_map),
                format!(
                    "Macro {name} expects {} arguments, got {}",
                    params.len(),
                    args.len()
                ),
            );
            search_from = invocation_end;
            continue;
        }

        let replacement = substitute_params(&def.body, params, &args);
        text.replace_range(start..invocation_end, &replacement);
        changed = true;
        search_from = start + replacement.len();
    }

    changed
}

/// Pushes a diagnostic unless an identical one was already emitted during
/// this expansion run.
fn report_once(
    diagnostics: &mut Vec<Diagnostic>,
    reported: &mut HashSet<(usize, String)>,
    line: usize,
    message: String,
) {
    if reported.insert((line, message.clone())) {
        diagnostics.push(Diagnostic::new(line, message));
    }
}

/// Collects a comma-separated argument list starting at an opening paren.
///
/// Commas only split at depth 1, so nested calls like `MAX(MIN(a,b), c)`
/// stay intact, and the scan runs across newlines. Returns the byte length
/// of the list including the closing paren, or `None` if the parentheses
/// never balance.
fn collect_arguments(text: &str) -> Option<(usize, Vec<String>)> {
    debug_assert!(text.starts_with('('));

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 1;

    for (offset, c) in text.char_indices().skip(1) {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    args.push(current.trim().to_string());
                    return Some((offset + 1, args));
                }
                current.push(c);
            }
            ',' if depth == 1 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    None
}

/// Rewrites a macro body with each parameter (whole-word) replaced by its
/// argument text. All parameters substitute simultaneously, so an argument
/// that happens to contain another parameter's name is left alone.
fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if is_ident_start(c) {
            let mut end = start;
            while let Some(&(offset, word_char)) = chars.peek() {
                if is_word_char(word_char) {
                    end = offset + word_char.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &body[start..end];
            match params.iter().position(|p| p == word) {
                Some(index) => out.push_str(&args[index]),
                None => out.push_str(word),
            }
        } else {
            out.push(c);
            chars.next();
        }
    }

    out
}

/// Maps a byte offset in the working text back to an original source line
/// via the accumulated line map; 0 when the line is no longer traceable.
fn line_for_offset(text: &str, offset: usize, line_map: &BTreeMap<usize, usize>) -> usize {
    let line = text[..offset].matches('\n').count() + 1;
    line_map.get(&line).copied().unwrap_or(0)
}
