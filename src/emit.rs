//! Writing enriched records back into the document.

use std::ops::Range;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::{ArchetypeRecord, ExtractedCatalog, MANAGED_FIELDS, RecordLayout};

const INDENT: &[u8] = b"    ";

/// Canonical text of the record array: pretty JSON, four-space indent.
pub(crate) fn render_literal(records: &[ArchetypeRecord]) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    records.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Replace the whole literal with freshly rendered records. Text outside the
/// literal is copied unchanged.
pub(crate) fn regenerate(
    text: &str,
    catalog: &ExtractedCatalog,
    records: &[ArchetypeRecord],
) -> Result<String, serde_json::Error> {
    let literal = render_literal(records)?;
    let mut out = String::with_capacity(text.len() + literal.len());
    out.push_str(&text[..catalog.span.start]);
    out.push_str(&literal);
    out.push_str(&text[catalog.span.end..]);
    Ok(out)
}

#[derive(Debug)]
struct Edit {
    span: Range<usize>,
    replacement: String,
}

/// Bring the managed fields in the text in line with `records`, touching
/// only values that differ from what was decoded. Absent fields are
/// inserted after the record's last property.
pub(crate) fn patch(text: &str, catalog: &ExtractedCatalog, records: &[ArchetypeRecord]) -> String {
    let mut edits = Vec::new();
    let originals = catalog.layouts.iter().zip(&catalog.records);
    for ((layout, before), after) in originals.zip(records) {
        record_edits(text, layout, before, after, &mut edits);
    }
    apply_edits(text, edits)
}

fn record_edits(
    text: &str,
    layout: &RecordLayout,
    before: &ArchetypeRecord,
    after: &ArchetypeRecord,
    edits: &mut Vec<Edit>,
) {
    let mut missing = Vec::new();
    for key in MANAGED_FIELDS {
        let Some(value) = after.get(key) else {
            continue;
        };
        if before.get(key) == Some(value) {
            continue;
        }
        match layout.field(key) {
            Some(field) => edits.push(Edit {
                span: field.value_span.clone(),
                replacement: render_value(value, layout.quote),
            }),
            None => missing.push((key, value)),
        }
    }
    if !missing.is_empty() {
        edits.push(insertion(text, layout, &missing));
    }
}

fn render_value(value: &Value, quote: char) -> String {
    match value {
        Value::String(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push(quote);
            for ch in s.chars() {
                if ch == quote || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push(quote);
            out
        }
        other => other.to_string(),
    }
}

fn line_indent(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map_or(0, |idx| idx + 1);
    let line = &text[line_start..pos];
    &line[..line.len() - line.trim_start().len()]
}

fn insertion(text: &str, layout: &RecordLayout, missing: &[(&str, &Value)]) -> Edit {
    let property = |key: &str, value: &Value| {
        let rendered = render_value(value, layout.quote);
        if layout.bare_keys {
            format!("{key}: {rendered}")
        } else {
            format!("{q}{key}{q}: {rendered}", q = layout.quote)
        }
    };

    let Some(last) = layout.fields.last() else {
        let open = layout.span.start + 1;
        let body: Vec<String> = missing.iter().map(|&(k, v)| property(k, v)).collect();
        return Edit {
            span: open..open,
            replacement: format!(" {} ", body.join(", ")),
        };
    };

    let indent = line_indent(text, last.key_span.start);
    let mut replacement = String::new();
    match last.comma_end {
        Some(comma_end) => {
            for &(key, value) in missing {
                replacement.push_str(&format!("\n{indent}{},", property(key, value)));
            }
            Edit {
                span: comma_end..comma_end,
                replacement,
            }
        }
        None => {
            for &(key, value) in missing {
                replacement.push_str(&format!(",\n{indent}{}", property(key, value)));
            }
            let end = last.value_span.end;
            Edit {
                span: end..end,
                replacement,
            }
        }
    }
}

fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| (edit.span.start, edit.span.end));
    let mut out = String::with_capacity(text.len() + edits.len() * 16);
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&text[cursor..edit.span.start]);
        out.push_str(&edit.replacement);
        cursor = edit.span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
