// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Codec for the driver's tagged value grammar.
//!
//! `evaluate` arguments and results travel as type-tagged JSON: `{"n": 4}`,
//! `{"s": "hi"}`, `{"b": true}`, `{"v": "null"}` for the values plain JSON
//! cannot spell (undefined, NaN, infinities), `{"a": [...]}` for arrays and
//! `{"o": [{"k", "v"}]}` for objects. Arrays and objects carry an `id` the
//! driver uses for reference tracking; `serde_json::Value` trees cannot be
//! cyclic, so ids here are only ever defined, never referenced.

use serde_json::{Value, json};

/// Wrap a plain JSON value as an `evaluate` argument:
/// `{"value": <tagged>, "handles": []}`.
pub fn to_argument(value: &Value) -> Value {
    let mut next_id = 0usize;
    json!({
        "value": to_tagged(value, &mut next_id),
        "handles": [],
    })
}

fn to_tagged(value: &Value, next_id: &mut usize) -> Value {
    match value {
        Value::Null => json!({"v": "null"}),
        Value::Bool(b) => json!({"b": b}),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_nan() => json!({"v": "NaN"}),
            Some(f) if f.is_infinite() && f > 0.0 => json!({"v": "Infinity"}),
            Some(f) if f.is_infinite() => json!({"v": "-Infinity"}),
            Some(f) if f == 0.0 && f.is_sign_negative() => json!({"v": "-0"}),
            _ => json!({"n": n}),
        },
        Value::String(s) => json!({"s": s}),
        Value::Array(items) => {
            let id = *next_id;
            *next_id += 1;
            let tagged: Vec<Value> = items.iter().map(|item| to_tagged(item, next_id)).collect();
            json!({"a": tagged, "id": id})
        }
        Value::Object(fields) => {
            let id = *next_id;
            *next_id += 1;
            let tagged: Vec<Value> = fields
                .iter()
                .map(|(key, field)| json!({"k": key, "v": to_tagged(field, next_id)}))
                .collect();
            json!({"o": tagged, "id": id})
        }
    }
}

/// Decode a tagged result back into plain JSON.
///
/// Values JSON cannot represent (undefined, NaN, infinities) come back as
/// `null`; dates, bigints and URLs come back as their string forms.
pub fn from_tagged(value: &Value) -> Value {
    let Some(fields) = value.as_object() else {
        return Value::Null;
    };
    if let Some(tag) = fields.get("v").and_then(Value::as_str) {
        return match tag {
            "-0" => json!(-0.0),
            // undefined, null, NaN, Infinity, -Infinity
            _ => Value::Null,
        };
    }
    if let Some(n) = fields.get("n") {
        return n.clone();
    }
    if let Some(b) = fields.get("b") {
        return b.clone();
    }
    if let Some(s) = fields.get("s") {
        return s.clone();
    }
    // Dates, bigints and URLs have no plain-JSON counterpart; surface the
    // string the driver sent.
    for string_tag in ["d", "bi", "u"] {
        if let Some(s) = fields.get(string_tag) {
            return s.clone();
        }
    }
    if let Some(items) = fields.get("a").and_then(Value::as_array) {
        return Value::Array(items.iter().map(from_tagged).collect());
    }
    if let Some(entries) = fields.get("o").and_then(Value::as_array) {
        let mut object = serde_json::Map::new();
        for entry in entries {
            if let Some(key) = entry.get("k").and_then(Value::as_str) {
                object.insert(key.to_string(), from_tagged(&entry["v"]));
            }
        }
        return Value::Object(object);
    }
    Value::Null
}
