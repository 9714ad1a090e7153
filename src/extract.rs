//! Locating and decoding the archetype array embedded in a JavaScript file.
//!
//! The literal is hand-written JavaScript rather than JSON, so it is
//! normalized in stages before `serde_json` sees it:
//!
//! 1. `"` inside backtick strings is escaped (icons are SVG markup full of
//!    double quotes).
//! 2. Every string delimiter is unified to `"`.
//! 3. Bare keys are quoted; comments and trailing commas are dropped.
//!
//! Alongside the decoded records the extractor reports where each record and
//! each of its top-level properties sit in the original text, which is what
//! in-place patching works from.

use std::ops::Range;

use serde_json::Value;

use crate::scan::{self, Token, TokenKind};
use crate::{ArchetypeRecord, ExtractionError};

/// Position of one top-level property inside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldLayout {
    pub(crate) key: String,
    pub(crate) key_span: Range<usize>,
    pub(crate) value_span: Range<usize>,
    /// End of the comma following the value, if there is one.
    pub(crate) comma_end: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordLayout {
    /// From `{` to `}` inclusive.
    pub(crate) span: Range<usize>,
    pub(crate) fields: Vec<FieldLayout>,
    /// Whether keys are written without quotes.
    pub(crate) bare_keys: bool,
    /// Preferred string delimiter of the record.
    pub(crate) quote: char,
}

impl RecordLayout {
    /// The property `serde_json` keeps for `key`, i.e. the last one written.
    pub(crate) fn field(&self, key: &str) -> Option<&FieldLayout> {
        self.fields.iter().rev().find(|field| field.key == key)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ExtractedCatalog {
    /// From `[` to `]` inclusive.
    pub(crate) span: Range<usize>,
    pub(crate) records: Vec<ArchetypeRecord>,
    /// One per record, in the same order.
    pub(crate) layouts: Vec<RecordLayout>,
}

pub(crate) fn extract(text: &str, binding: &str) -> Result<ExtractedCatalog, ExtractionError> {
    let open = locate_binding(text, binding)?;
    let tokens = scan::bracketed(text, open)?;
    let end = tokens.last().map_or(open + 1, |t| t.span.end);
    let span = open..end;

    let json = normalize_literal(&text[span.clone()])?;
    let records = into_records(serde_json::from_str(&json)?)?;

    let layouts = layout_records(text, &tokens)?;
    if layouts.len() != records.len() {
        return Err(ExtractionError::LayoutMismatch {
            decoded: records.len(),
            located: layouts.len(),
        });
    }

    Ok(ExtractedCatalog {
        span,
        records,
        layouts,
    })
}

/// Byte offset of the `[` opening the array bound to `binding`, found as the
/// token sequence `const|let|var <binding> = [` so that comments and strings
/// never match.
fn locate_binding(text: &str, binding: &str) -> Result<usize, ExtractionError> {
    let mut window: Vec<Token> = Vec::with_capacity(4);
    for token in scan::Scanner::new(text) {
        let token = token?;
        if token.is_comment() {
            continue;
        }
        if window.len() == 4 {
            window.remove(0);
        }
        window.push(token);
        if let [keyword, name, eq, open] = window.as_slice() {
            let declares = keyword.kind == TokenKind::Word
                && matches!(keyword.text(text), "const" | "let" | "var")
                && name.kind == TokenKind::Word
                && name.text(text) == binding;
            if declares && eq.is_punct('=') && open.is_punct('[') {
                return Ok(open.span.start);
            }
        }
    }
    Err(ExtractionError::BindingNotFound {
        binding: binding.to_string(),
    })
}

// ── Normalization ───────────────────────────────────────────────────────

pub(crate) fn normalize_literal(literal: &str) -> Result<String, ExtractionError> {
    let escaped = escape_secondary_quotes(literal)?;
    let unified = unify_delimiters(&escaped)?;
    relax_to_json(&unified)
}

/// Rewrite every string token of the given delimiter through `rewrite`,
/// copying all other text verbatim.
fn rewrite_strings(
    src: &str,
    delims: &[char],
    rewrite: impl Fn(&str, char, &mut String),
) -> Result<String, ExtractionError> {
    let mut out = String::with_capacity(src.len() + src.len() / 8);
    let mut cursor = 0;
    for token in scan::tokenize(src)? {
        let TokenKind::Str(delim) = token.kind else {
            continue;
        };
        if !delims.contains(&delim) {
            continue;
        }
        out.push_str(&src[cursor..token.span.start]);
        rewrite(token.body(src), delim, &mut out);
        cursor = token.span.end;
    }
    out.push_str(&src[cursor..]);
    Ok(out)
}

fn escape_secondary_quotes(src: &str) -> Result<String, ExtractionError> {
    rewrite_strings(src, &['`'], |body, delim, out| {
        out.push(delim);
        let mut escaped = false;
        for ch in body.chars() {
            if escaped {
                escaped = false;
                out.push(ch);
            } else if ch == '\\' {
                escaped = true;
                out.push(ch);
            } else if ch == '"' {
                out.push_str("\\\"");
            } else {
                out.push(ch);
            }
        }
        out.push(delim);
    })
}

fn unify_delimiters(src: &str) -> Result<String, ExtractionError> {
    rewrite_strings(src, &['\'', '`'], |body, _delim, out| {
        out.push('"');
        let mut escaped = false;
        for ch in body.chars() {
            if escaped {
                escaped = false;
                // JSON has no escape for either of these
                if !matches!(ch, '\'' | '`') {
                    out.push('\\');
                }
                out.push(ch);
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                out.push_str("\\\"");
            } else {
                push_json_char(ch, out);
            }
        }
        out.push('"');
    })
}

fn push_json_char(ch: char, out: &mut String) {
    match ch {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}

fn relax_to_json(src: &str) -> Result<String, ExtractionError> {
    let tokens: Vec<Token> = scan::tokenize(src)?
        .into_iter()
        .filter(|t| !t.is_comment())
        .collect();
    let mut out = String::with_capacity(src.len());
    for (idx, token) in tokens.iter().enumerate() {
        let next = tokens.get(idx + 1);
        match token.kind {
            TokenKind::Punct(',') if next.is_some_and(|n| n.is_punct('}') || n.is_punct(']')) => {}
            TokenKind::Word if next.is_some_and(|n| n.is_punct(':')) => {
                out.push('"');
                out.push_str(token.text(src));
                out.push('"');
            }
            TokenKind::Word if token.text(src) == "undefined" => out.push_str("null"),
            _ => out.push_str(token.text(src)),
        }
        // keeps adjacent words apart so malformed input fails to decode
        out.push(' ');
    }
    Ok(out)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn into_records(value: Value) -> Result<Vec<ArchetypeRecord>, ExtractionError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ExtractionError::NotRecordArray {
                index: 0,
                kind: value_kind(&other),
            });
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(ArchetypeRecord::from(map)),
            other => Err(ExtractionError::NotRecordArray {
                index,
                kind: value_kind(&other),
            }),
        })
        .collect()
}

// ── Layout ──────────────────────────────────────────────────────────────

struct LayoutWalker<'a> {
    text: &'a str,
    tokens: Vec<&'a Token>,
}

impl<'a> LayoutWalker<'a> {
    fn token(&self, idx: usize) -> Result<&'a Token, ExtractionError> {
        self.tokens
            .get(idx)
            .copied()
            .ok_or(ExtractionError::Unterminated {
                what: "record",
                offset: self.tokens.last().map_or(0, |t| t.span.end),
            })
    }

    /// Index just past the value starting at `idx`.
    fn skip_value(&self, idx: usize) -> Result<usize, ExtractionError> {
        let first = self.token(idx)?;
        if !(first.is_punct('{') || first.is_punct('[')) {
            return Ok(idx + 1);
        }
        let mut depth = 0usize;
        let mut pos = idx;
        loop {
            let token = self.token(pos)?;
            if token.is_punct('{') || token.is_punct('[') {
                depth += 1;
            } else if token.is_punct('}') || token.is_punct(']') {
                depth -= 1;
                if depth == 0 {
                    return Ok(pos + 1);
                }
            }
            pos += 1;
        }
    }

    fn object(&self, open: usize) -> Result<(RecordLayout, usize), ExtractionError> {
        let start = self.token(open)?.span.start;
        let mut fields = Vec::new();
        let mut bare_keys = None;
        let mut quote = None;
        let mut idx = open + 1;

        loop {
            let key_token = self.token(idx)?;
            if key_token.is_punct('}') {
                let layout = RecordLayout {
                    span: start..key_token.span.end,
                    fields,
                    bare_keys: bare_keys.unwrap_or(true),
                    quote: quote.unwrap_or('\''),
                };
                return Ok((layout, idx + 1));
            }
            let key = match key_token.kind {
                TokenKind::Str(_) => scan::unescape(key_token.body(self.text)),
                _ => key_token.text(self.text).to_string(),
            };
            bare_keys.get_or_insert(key_token.kind == TokenKind::Word);

            let colon = self.token(idx + 1)?;
            if !colon.is_punct(':') {
                let found = colon.text(self.text).chars().next().unwrap_or(' ');
                return Err(ExtractionError::Unbalanced {
                    found,
                    offset: colon.span.start,
                });
            }

            let value_start = idx + 2;
            let value_end = self.skip_value(value_start)?;
            let first = self.token(value_start)?;
            let last = self.token(value_end - 1)?;
            if let TokenKind::Str(delim @ ('\'' | '"')) = first.kind {
                if quote.is_none() || crate::NAME_KEYS.contains(&key.as_str()) {
                    quote = Some(delim);
                }
            }

            let after = self.token(value_end)?;
            let comma_end = after.is_punct(',').then_some(after.span.end);
            fields.push(FieldLayout {
                key,
                key_span: key_token.span.clone(),
                value_span: first.span.start..last.span.end,
                comma_end,
            });
            idx = if comma_end.is_some() { value_end + 1 } else { value_end };
        }
    }
}

fn layout_records(text: &str, tokens: &[Token]) -> Result<Vec<RecordLayout>, ExtractionError> {
    let walker = LayoutWalker {
        text,
        tokens: tokens.iter().filter(|t| !t.is_comment()).collect(),
    };
    let mut layouts = Vec::new();
    // tokens[0] is the opening `[`
    let mut idx = 1;
    loop {
        let token = walker.token(idx)?;
        if token.is_punct(']') {
            return Ok(layouts);
        }
        idx = if token.is_punct('{') {
            let (layout, next) = walker.object(idx)?;
            layouts.push(layout);
            next
        } else {
            walker.skip_value(idx)?
        };
        if walker.token(idx)?.is_punct(',') {
            idx += 1;
        }
    }
}
