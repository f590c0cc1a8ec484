//! The fixed output schema and the projection from raw documents onto it.
//!
//! Every recognized field lives in one static table together with its
//! declared kind and source-key aliases. Schema changes touch this table and
//! nothing else.

use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::work::RawDocument;

/// Declared value kind of an output field, determining its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Scalar text; defaults to `""`.
    Text,
    /// Scalar number; defaults to `0`.
    Number,
    /// Compound structure (object or array); defaults to `null`.
    Nested,
}

impl FieldKind {
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Text => Value::String(String::new()),
            FieldKind::Number => Value::from(0),
            FieldKind::Nested => Value::Null,
        }
    }
}

/// One recognized output field: canonical name, kind, and the source keys
/// it may appear under in raw documents.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub aliases: &'static [&'static str],
}

/// The product output schema. Projection emits exactly these fields,
/// regardless of what the raw document contained.
pub const PRODUCT_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "product_id", kind: FieldKind::Number, aliases: &["entity_id", "id"] },
    FieldSpec { name: "name", kind: FieldKind::Text, aliases: &["product_name"] },
    FieldSpec { name: "sku", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "attribute_set_id", kind: FieldKind::Number, aliases: &[] },
    FieldSpec { name: "attribute_set", kind: FieldKind::Text, aliases: &["attribute_set_name"] },
    FieldSpec { name: "type_id", kind: FieldKind::Text, aliases: &["type"] },
    FieldSpec { name: "price", kind: FieldKind::Number, aliases: &["final_price"] },
    FieldSpec { name: "min_price", kind: FieldKind::Number, aliases: &[] },
    FieldSpec { name: "max_price", kind: FieldKind::Number, aliases: &[] },
    FieldSpec { name: "min_price_format", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "max_price_format", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "gold_weight", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "none_metal_weight", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "fixed_silver_weight", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "material_design", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "qty", kind: FieldKind::Number, aliases: &["quantity"] },
    FieldSpec { name: "collection", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "collection_id", kind: FieldKind::Number, aliases: &[] },
    FieldSpec { name: "product_type", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "product_type_value", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "category", kind: FieldKind::Nested, aliases: &["categories"] },
    FieldSpec { name: "category_name", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "store_code", kind: FieldKind::Text, aliases: &["store"] },
    FieldSpec { name: "platinum_palladium_info_in_alloy", kind: FieldKind::Nested, aliases: &[] },
    FieldSpec { name: "bracelet_without_chain", kind: FieldKind::Text, aliases: &[] },
    FieldSpec { name: "show_popup_quantity_eternity", kind: FieldKind::Number, aliases: &[] },
    FieldSpec { name: "visible_contents", kind: FieldKind::Nested, aliases: &[] },
    FieldSpec { name: "gender", kind: FieldKind::Text, aliases: &[] },
];

/// A raw document projected onto the fixed schema: always exactly the
/// recognized keys, unrecognized source fields dropped, missing ones
/// defaulted per kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredRecord(serde_json::Map<String, Value>);

impl FilteredRecord {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &serde_json::Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Project a raw document onto [`PRODUCT_FIELDS`].
///
/// Pure. Never fails on missing fields; fails only when the document is not
/// a JSON object at all.
pub fn project(raw: &RawDocument) -> Result<FilteredRecord, AppError> {
    let source = raw.as_object().ok_or_else(|| {
        AppError::ProjectionError(format!("expected a JSON object, got {}", json_kind(raw)))
    })?;

    let mut out = serde_json::Map::with_capacity(PRODUCT_FIELDS.len());
    for field in PRODUCT_FIELDS {
        let value = lookup(source, field)
            .cloned()
            .unwrap_or_else(|| field.kind.default_value());
        out.insert(field.name.to_string(), value);
    }
    Ok(FilteredRecord(out))
}

/// Look a field up by canonical name first, then by alias.
fn lookup<'a>(source: &'a serde_json::Map<String, Value>, field: &FieldSpec) -> Option<&'a Value> {
    if let Some(value) = source.get(field.name) {
        return Some(value);
    }
    field.aliases.iter().find_map(|alias| source.get(*alias))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
