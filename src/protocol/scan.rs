//! Balanced-parenthesis scanning for the s-expression wire format
//!
//! Scanning is shallow: only depth-1 groups are located and sliced out,
//! their nested content is left for the caller to decompose.

use crate::core::error::ParseError;

/// Byte range of one parenthesised group, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Running depth must never go negative and must end at zero
pub fn check_balanced(text: &str) -> Result<(), ParseError> {
    let mut depth: usize = 0;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    return Err(ParseError::Unbalanced { position: i });
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ParseError::Unbalanced {
            position: text.len(),
        });
    }
    Ok(())
}

/// Content between the outermost pair of parentheses
///
/// The message must be exactly one balanced list: it starts with `(`
/// and the matching `)` is its last byte.
pub fn outer_body(text: &str) -> Result<&str, ParseError> {
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    check_balanced(text)?;
    if !text.starts_with('(') {
        return Err(ParseError::NotAList);
    }

    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    if i + 1 != text.len() {
                        return Err(ParseError::TrailingContent { position: i + 1 });
                    }
                    return Ok(&text[1..i]);
                }
            }
            _ => {}
        }
    }
    // check_balanced guarantees the loop returns
    Err(ParseError::Unbalanced {
        position: text.len(),
    })
}

/// Locate every depth-1 group in `body`
///
/// A 0→1 transition opens a span and the matching 1→0 closes it. Stray
/// closing parentheses at depth 0 are ignored; an unterminated final
/// group is dropped.
pub fn top_level_spans(body: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, b) in body.bytes().enumerate() {
        match b {
            b'(' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(Span { start, end: i + 1 });
                }
            }
            _ => {}
        }
    }

    spans
}

/// Split off the leading bare atom (anything up to whitespace or a parenthesis)
pub fn take_atom(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    Some((&text[..end], &text[end..]))
}

/// Strip the surrounding parentheses of a group produced by `top_level_spans`
pub fn group_inner(group: &str) -> &str {
    let group = group.trim();
    group
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .unwrap_or(group)
}
