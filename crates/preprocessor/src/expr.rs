use thiserror::Error;

use crate::expand::{is_ident_start, is_word_char, replace_whole_word};
use crate::types::MacroTable;

/// Bound on object-like substitution passes inside a conditional expression;
/// enough for any realistic `#define` chain. A circular chain stops changing
/// the text and, deliberately without a diagnostic, falls through to the
/// tokenizer, where the leftover name evaluates to 0 like any undefined
/// identifier.
const MAX_SUBSTITUTION_PASSES: usize = 16;

/// Failure inside a `#if`/`#elif` expression. Callers turn this into a
/// diagnostic and treat the condition as false; it never propagates further.
#[derive(Debug, Error, PartialEq)]
pub(crate) enum ExprError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unmatched parenthesis")]
    UnmatchedParen,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("invalid numeric literal '{0}'")]
    BadLiteral(String),
    #[error("unrecognized character '{0}'")]
    BadChar(char),
}

/// Evaluates a conditional expression against the current macro table.
///
/// `defined(NAME)` / `defined NAME` are resolved first (shielded from macro
/// substitution), object-like macros are substituted over the rest, and the
/// result is parsed with C-like precedence and truthiness.
pub(crate) fn evaluate(expression: &str, macros: &MacroTable) -> Result<bool, ExprError> {
    let resolved = resolve_defined(expression, macros);
    let tokens = tokenize(&resolved)?;
    if tokens.is_empty() {
        return Err(ExprError::UnexpectedEnd);
    }

    let mut parser = Parser { tokens: &tokens, position: 0 };
    let value = parser.logical_or()?;
    if parser.position != tokens.len() {
        return Err(ExprError::UnexpectedToken(
            parser.tokens[parser.position].describe(),
        ));
    }
    Ok(value != 0.0)
}

/// Placeholder marker for shielded `defined(...)` spans. `\u{1}` cannot
/// appear in an identifier, so macro substitution never touches it.
const SHIELD: char = '\u{1}';

fn resolve_defined(expression: &str, macros: &MacroTable) -> String {
    let (shielded, saved) = shield_defined(expression);
    let substituted = substitute_object_macros(&shielded, macros);
    let restored = restore_defined(&substituted, &saved);
    rewrite_defined(&restored, macros)
}

/// Replaces each `defined(NAME)` / `defined NAME` span with an opaque
/// placeholder, returning the saved spans for later restoration.
fn shield_defined(expression: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(expression.len());
    let mut saved = Vec::new();
    let mut rest = expression;

    while let Some((before, span, after)) = match_defined(rest) {
        out.push_str(before);
        out.push(SHIELD);
        out.push_str(&saved.len().to_string());
        out.push(SHIELD);
        saved.push(span.to_string());
        rest = after;
    }
    out.push_str(rest);

    (out, saved)
}

fn restore_defined(expression: &str, saved: &[String]) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut rest = expression;

    while let Some(start) = rest.find(SHIELD) {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let Some(close) = tail.find(SHIELD) else {
            out.push_str(&rest[start..]);
            return out;
        };
        if let Ok(index) = tail[..close].parse::<usize>() {
            if let Some(span) = saved.get(index) {
                out.push_str(span);
            }
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Rewrites every `defined` span to `1` or `0` by macro-table lookup.
fn rewrite_defined(expression: &str, macros: &MacroTable) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut rest = expression;

    while let Some((before, span, after)) = match_defined(rest) {
        out.push_str(before);
        let name = defined_operand(span);
        out.push(if macros.contains_key(name) { '1' } else { '0' });
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Finds the next `defined(NAME)` or `defined NAME` span, returning the
/// text before it, the span itself, and the remainder.
fn match_defined(text: &str) -> Option<(&str, &str, &str)> {
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find("defined") {
        let start = search_from + found;
        let end = start + "defined".len();

        let boundary_before = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_word_char(c));
        if !boundary_before {
            search_from = start + 1;
            continue;
        }

        if let Some(span_end) = defined_span_end(&text[end..]) {
            let span = &text[start..end + span_end];
            return Some((&text[..start], span, &text[end + span_end..]));
        }
        search_from = end;
    }
    None
}

/// Length of the operand following the `defined` keyword: either
/// `( ws NAME ws )` or ` ws NAME`. `None` if neither form matches.
fn defined_span_end(tail: &str) -> Option<usize> {
    let mut chars = tail.char_indices().peekable();

    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }

    match chars.peek() {
        Some(&(open, '(')) => {
            let close = tail[open..].find(')')?;
            let inner = &tail[open + 1..open + close];
            let name = inner.trim();
            if !name.is_empty() && name.chars().all(is_word_char) {
                Some(open + close + 1)
            } else {
                None
            }
        }
        Some(&(start, c)) if is_ident_start(c) => {
            let mut end = start;
            for (offset, word_char) in tail[start..].char_indices() {
                if is_word_char(word_char) {
                    end = start + offset + word_char.len_utf8();
                } else {
                    break;
                }
            }
            // `defined` with no separating whitespace is just an identifier.
            if start == 0 {
                None
            } else {
                Some(end)
            }
        }
        _ => None,
    }
}

/// Extracts the macro name from a matched `defined` span.
fn defined_operand(span: &str) -> &str {
    let tail = &span["defined".len()..];
    tail.trim_start()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
}

/// Object-like macro substitution, bounded fixpoint. Function-like macros
/// are not supported inside conditional expressions.
fn substitute_object_macros(expression: &str, macros: &MacroTable) -> String {
    let mut names: Vec<&str> = macros
        .iter()
        .filter(|(_, def)| !def.is_function_like())
        .map(|(name, _)| name.as_str())
        .collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut text = expression.to_string();
    for _ in 0..MAX_SUBSTITUTION_PASSES {
        let mut changed = false;
        for name in &names {
            if let Some(replaced) = replace_whole_word(&text, name, &macros[*name].body) {
                text = replaced;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    text
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    LParen,
    RParen,
    Not,
    Minus,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Ident(name) => name.clone(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Not => "!".into(),
            Token::Minus => "-".into(),
            Token::Or => "||".into(),
            Token::And => "&&".into(),
            Token::Eq => "==".into(),
            Token::Ne => "!=".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Le => "<=".into(),
            Token::Ge => ">=".into(),
        }
    }
}

/// Hand-rolled tokenizer; two-character operators match greedily.
fn tokenize(expression: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Eq);
                } else {
                    return Err(ExprError::BadChar('='));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::And);
                } else {
                    return Err(ExprError::BadChar('&'));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::Or);
                } else {
                    return Err(ExprError::BadChar('|'));
                }
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(&digit) = chars.peek() {
                    if digit.is_ascii_digit() || digit == '.' {
                        literal.push(digit);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = literal
                    .parse()
                    .map_err(|_| ExprError::BadLiteral(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            _ if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&word_char) = chars.peek() {
                    if is_word_char(word_char) {
                        name.push(word_char);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => return Err(ExprError::BadChar(other)),
        }
    }

    Ok(tokens)
}

/// Recursive descent, lowest to highest precedence:
/// logical-or, logical-and, equality, relational, unary, primary.
struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn logical_or(&mut self) -> Result<f64, ExprError> {
        let mut left = self.logical_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.logical_and()?;
            left = truth(left != 0.0 || right != 0.0);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<f64, ExprError> {
        let mut left = self.equality()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.equality()?;
            left = truth(left != 0.0 && right != 0.0);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<f64, ExprError> {
        let mut left = self.relational()?;
        loop {
            match self.peek() {
                Some(Token::Eq) => {
                    self.advance();
                    let right = self.relational()?;
                    left = truth(left == right);
                }
                Some(Token::Ne) => {
                    self.advance();
                    let right = self.relational()?;
                    left = truth(left != right);
                }
                _ => return Ok(left),
            }
        }
    }

    fn relational(&mut self) -> Result<f64, ExprError> {
        let mut left = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Lt) => {
                    self.advance();
                    let right = self.unary()?;
                    left = truth(left < right);
                }
                Some(Token::Le) => {
                    self.advance();
                    let right = self.unary()?;
                    left = truth(left <= right);
                }
                Some(Token::Gt) => {
                    self.advance();
                    let right = self.unary()?;
                    left = truth(left > right);
                }
                Some(Token::Ge) => {
                    self.advance();
                    let right = self.unary()?;
                    left = truth(left >= right);
                }
                _ => return Ok(left),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                Ok(truth(self.unary()? == 0.0))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(-self.unary()?)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            Some(Token::Number(value)) => {
                let value = *value;
                self.advance();
                Ok(value)
            }
            // Undefined identifiers evaluate to 0, as in C.
            Some(Token::Ident(_)) => {
                self.advance();
                Ok(0.0)
            }
            Some(Token::LParen) => {
                self.advance();
                let value = self.logical_or()?;
                if self.peek() == Some(&Token::RParen) {
                    self.advance();
                    Ok(value)
                } else {
                    Err(ExprError::UnmatchedParen)
                }
            }
            Some(other) => Err(ExprError::UnexpectedToken(other.describe())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
