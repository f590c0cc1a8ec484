//! Extraction of the embedded product document from a storefront page.
//!
//! Product data is embedded in inline script tags as a JavaScript object
//! assignment rather than served through an API. Extraction scans script
//! text for known assignment markers, slices out the balanced JSON object
//! that follows, and validates that it actually carries product fields.

use scraper::{Html, Selector};
use serde_json::Value;
use talos_core::error::AppError;
use talos_core::work::RawDocument;

/// Assignment markers that precede the product payload.
const DOCUMENT_MARKERS: &[&str] = &["var react_data =", "window.react_data ="];

/// A candidate object must contain at least one of these keys to count as a
/// product payload.
const INDICATOR_KEYS: &[&str] = &["product_id", "sku", "name", "price", "attribute_set_id"];

/// Extract the product document from a product page.
///
/// Returns [`AppError::Malformed`] when the page carries no parsable product
/// payload. That condition is terminal: refetching the same page will not
/// change its scripts.
pub fn product_document(html: &str) -> Result<RawDocument, AppError> {
    let dom = Html::parse_document(html);
    let selector = Selector::parse("script")
        .map_err(|e| AppError::Malformed(format!("script selector: {e}")))?;

    for script in dom.select(&selector) {
        let text: String = script.text().collect();
        for marker in DOCUMENT_MARKERS {
            let Some(position) = text.find(marker) else {
                continue;
            };
            let Some(slice) = json_object_at(&text[position + marker.len()..]) else {
                continue;
            };
            match serde_json::from_str::<Value>(slice) {
                Ok(candidate) if looks_like_product(&candidate) => {
                    tracing::debug!(marker, bytes = slice.len(), "Found product payload");
                    return Ok(candidate);
                }
                Ok(_) => {
                    tracing::debug!(marker, "Object after marker is not a product payload");
                }
                Err(e) => {
                    tracing::debug!(marker, error = %e, "Object after marker is not valid JSON");
                }
            }
        }
    }

    Err(AppError::Malformed(
        "no embedded product payload found in page".into(),
    ))
}

/// Slice the first balanced JSON object out of `input`.
///
/// Walks from the first `{` to its matching `}`, honoring string literals
/// and escape sequences so braces inside values don't end the object early.
fn json_object_at(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let bytes = input.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&input[start..=index]);
                }
            }
            _ => {}
        }
    }
    None
}

fn looks_like_product(value: &Value) -> bool {
    value
        .as_object()
        .map(|object| INDICATOR_KEYS.iter().any(|key| object.contains_key(*key)))
        .unwrap_or(false)
}
