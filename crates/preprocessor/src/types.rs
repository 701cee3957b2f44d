use std::collections::HashMap;

use serde::Serialize;

/// A single preprocessor message tied to an original source line.
///
/// `line` is 1-indexed into the source the user typed; `0` means the
/// message could not be located (for example the expansion iteration cap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A `#define` entry as stored in the macro table.
///
/// `params` is `None` for object-like macros; `Some` (possibly empty) for
/// function-like macros. The body is kept unexpanded; expansion happens at
/// substitution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub params: Option<Vec<String>>,
    pub body: String,
    pub defined_at: usize,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }
}

/// Macro name to definition. Redefinition overwrites silently; the last
/// `#define` wins.
pub type MacroTable = HashMap<String, MacroDef>;
