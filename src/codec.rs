//! Human-enterable text encoding of records.
//!
//! A record is typed as a JSON object keyed by field name, e.g.
//! `{"value": 5}` for `Int32Record`. Nested records are nested objects,
//! enums are symbol names (or their integer value), lists and sets are
//! arrays and maps are objects whose keys are parsed per the key type.
//! A `null` field value leaves the field unset.
//!
//! This text never goes over the wire; the live call carries the decoded
//! [`Value`] in the binary encoding of [`crate::rpc`].

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use serde_json::{Map, Number, Value as Json};

use crate::error::{Error, Result};
use crate::schema::{RecordSchema, Registry, TypeRef};
use crate::value::{EnumValue, Record, Value};

/// Decode `text` into a fresh instance of record `schema_id`.
pub fn decode(registry: &Registry, schema_id: &str, text: &str) -> Result<Record> {
    let schema = registry
        .record(schema_id)
        .ok_or_else(|| Error::decode(schema_id, text, "unknown record type"))?;
    let json: Json =
        serde_json::from_str(text).map_err(|e| Error::decode(schema_id, text, e.to_string()))?;
    let Json::Object(obj) = json else {
        return Err(Error::decode(schema_id, text, "expected a JSON object"));
    };
    record_from_json(registry, schema, &obj).map_err(|reason| Error::decode(schema_id, text, reason))
}

/// Encode a record to the text [`decode`] accepts.
pub fn encode(record: &Record) -> String {
    Json::Object(record_to_json(record)).to_string()
}

fn record_from_json(
    registry: &Registry,
    schema: &RecordSchema,
    obj: &Map<String, Json>,
) -> std::result::Result<Record, String> {
    let mut record = Record::new(&schema.name);
    for (key, json) in obj {
        let field = schema
            .field(key)
            .ok_or_else(|| format!("unknown field `{key}` in `{}`", schema.name))?;
        if json.is_null() {
            continue;
        }
        let value = value_from_json(registry, &field.ty, json)
            .map_err(|reason| format!("field `{key}`: {reason}"))?;
        record.set(field.id, &field.name, value);
    }

    if let Some(missing) = schema
        .fields
        .iter()
        .find(|f| f.required && record.get(&f.name).is_none())
    {
        return Err(format!(
            "missing required field `{}` of `{}`",
            missing.name, schema.name
        ));
    }
    Ok(record)
}

fn value_from_json(
    registry: &Registry,
    ty: &TypeRef,
    json: &Json,
) -> std::result::Result<Value, String> {
    let mismatch = || format!("expected {ty}, found {json}");

    match ty {
        TypeRef::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
        TypeRef::Byte => int_from_json(json, ty).map(Value::Byte),
        TypeRef::I16 => int_from_json(json, ty).map(Value::I16),
        TypeRef::I32 => int_from_json(json, ty).map(Value::I32),
        TypeRef::I64 => int_from_json(json, ty).map(Value::I64),
        TypeRef::Double => {
            let d = match json {
                Json::String(s) => non_finite_from_str(s),
                _ => json.as_f64(),
            };
            d.map(|d| Value::Double(OrderedFloat(d))).ok_or_else(mismatch)
        }
        TypeRef::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        TypeRef::Any => Err("cannot decode a value of type `any`".into()),
        TypeRef::Named(name) => {
            if let Some(schema) = registry.record(name) {
                let obj = json.as_object().ok_or_else(mismatch)?;
                record_from_json(registry, schema, obj).map(Value::Record)
            } else if registry.enum_schema(name).is_some() {
                match json {
                    Json::String(symbol) => enum_from_symbol(registry, name, symbol),
                    Json::Number(n) => n
                        .as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(mismatch)
                        .and_then(|v| enum_from_int(registry, name, v)),
                    _ => Err(mismatch()),
                }
            } else {
                Err(format!("unknown type `{name}`"))
            }
        }
        TypeRef::List(elem) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .map(|item| value_from_json(registry, elem, item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::List)
        }
        TypeRef::Set(elem) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .map(|item| value_from_json(registry, elem, item))
                .collect::<std::result::Result<BTreeSet<_>, _>>()
                .map(Value::Set)
        }
        TypeRef::Map(key_ty, value_ty) => {
            let obj = json.as_object().ok_or_else(mismatch)?;
            let mut map = BTreeMap::new();
            for (key, item) in obj {
                let key = key_from_str(registry, key_ty, key)?;
                map.insert(key, value_from_json(registry, value_ty, item)?);
            }
            Ok(Value::Map(map))
        }
    }
}

fn int_from_json<T>(json: &Json, ty: &TypeRef) -> std::result::Result<T, String>
where
    T: TryFrom<i64>,
{
    let n = json
        .as_i64()
        .ok_or_else(|| format!("expected {ty}, found {json}"))?;
    T::try_from(n).map_err(|_| format!("{n} is out of range for {ty}"))
}

// JSON has no literal for these; they travel as strings.
fn non_finite_to_str(d: f64) -> &'static str {
    if d.is_nan() {
        "NaN"
    } else if d > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn non_finite_from_str(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn enum_from_symbol(
    registry: &Registry,
    enum_name: &str,
    symbol: &str,
) -> std::result::Result<Value, String> {
    let schema = registry
        .enum_schema(enum_name)
        .ok_or_else(|| format!("unknown type `{enum_name}`"))?;
    let value = schema
        .value_of(symbol)
        .ok_or_else(|| format!("`{symbol}` is not a symbol of `{enum_name}`"))?;
    Ok(Value::Enum(EnumValue {
        enum_name: enum_name.to_string(),
        symbol: symbol.to_string(),
        value,
    }))
}

fn enum_from_int(
    registry: &Registry,
    enum_name: &str,
    value: i32,
) -> std::result::Result<Value, String> {
    let symbol = registry
        .enum_schema(enum_name)
        .and_then(|schema| schema.symbol_for(value))
        .ok_or_else(|| format!("{value} is not a value of `{enum_name}`"))?;
    Ok(Value::Enum(EnumValue {
        enum_name: enum_name.to_string(),
        symbol: symbol.to_string(),
        value,
    }))
}

fn key_from_str(registry: &Registry, ty: &TypeRef, key: &str) -> std::result::Result<Value, String> {
    let bad_key = || format!("`{key}` is not a valid {ty} map key");
    match ty {
        TypeRef::String => Ok(Value::String(key.to_string())),
        TypeRef::Bool => key.parse().map(Value::Bool).map_err(|_| bad_key()),
        TypeRef::Byte => key.parse().map(Value::Byte).map_err(|_| bad_key()),
        TypeRef::I16 => key.parse().map(Value::I16).map_err(|_| bad_key()),
        TypeRef::I32 => key.parse().map(Value::I32).map_err(|_| bad_key()),
        TypeRef::I64 => key.parse().map(Value::I64).map_err(|_| bad_key()),
        TypeRef::Double => key
            .parse()
            .map(|d| Value::Double(OrderedFloat(d)))
            .map_err(|_| bad_key()),
        TypeRef::Named(name) if registry.enum_schema(name).is_some() => {
            enum_from_symbol(registry, name, key)
        }
        // Record, collection and `any` keys are written as their JSON text.
        _ => {
            let json: Json = serde_json::from_str(key).map_err(|_| bad_key())?;
            value_from_json(registry, ty, &json)
        }
    }
}

fn record_to_json(record: &Record) -> Map<String, Json> {
    record
        .fields
        .iter()
        .map(|f| (f.name.clone(), value_to_json(&f.value)))
        .collect()
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Byte(n) => Json::from(*n),
        Value::I16(n) => Json::from(*n),
        Value::I32(n) => Json::from(*n),
        Value::I64(n) => Json::from(*n),
        Value::Double(d) => Number::from_f64(d.0)
            .map_or_else(|| Json::String(non_finite_to_str(d.0).into()), Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Record(r) => Json::Object(record_to_json(r)),
        Value::Enum(e) => Json::String(e.symbol.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Set(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (key_to_string(k), value_to_json(v)))
                .collect(),
        ),
    }
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Enum(e) => e.symbol.clone(),
        Value::Bool(_)
        | Value::Byte(_)
        | Value::I16(_)
        | Value::I32(_)
        | Value::I64(_)
        | Value::Double(_) => key.to_string(),
        _ => value_to_json(key).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "records": [
            { "name": "Int32Record", "fields": [{ "id": 1, "name": "value", "type": "i32" }] },
            { "name": "Sample", "fields": [{ "id": 1, "name": "d", "type": "double" }] },
            { "name": "Person", "fields": [
                { "id": 1, "name": "name", "type": "string", "required": true },
                { "id": 2, "name": "age", "type": "byte" },
                { "id": 3, "name": "tags", "type": "set<string>" },
                { "id": 4, "name": "scores", "type": "map<Color,double>" },
                { "id": 5, "name": "favorite", "type": "Color" },
                { "id": 6, "name": "friends", "type": "list<Person>" },
                { "id": 7, "name": "counts", "type": "map<i64,Int32Record>" },
                { "id": 8, "name": "active", "type": "bool" }
            ] }
        ],
        "enums": [{ "name": "Color", "symbols": [{ "name": "RED" }, { "name": "GREEN" }] }]
    }"#;

    fn registry() -> Registry {
        Registry::from_json(DOC).unwrap()
    }

    #[test]
    fn decodes_a_flat_record() {
        let record = decode(&registry(), "Int32Record", r#"{"value": 42}"#).unwrap();
        assert_eq!(record, Record::new("Int32Record").with(1, "value", Value::I32(42)));
    }

    #[test]
    fn nested_record_survives_a_text_round_trip() {
        let registry = registry();
        let red = Value::Enum(EnumValue {
            enum_name: "Color".into(),
            symbol: "RED".into(),
            value: 0,
        });
        let friend = Record::new("Person").with(1, "name", Value::String("Bo".into()));
        let person = Record::new("Person")
            .with(1, "name", Value::String("Al \"the\" pal".into()))
            .with(2, "age", Value::Byte(-3))
            .with(
                3,
                "tags",
                Value::Set(["a", "b"].iter().map(|s| Value::String(s.to_string())).collect()),
            )
            .with(
                4,
                "scores",
                Value::Map(BTreeMap::from([(red.clone(), Value::Double(OrderedFloat(1.5)))])),
            )
            .with(5, "favorite", red)
            .with(6, "friends", Value::List(vec![Value::Record(friend)]))
            .with(
                7,
                "counts",
                Value::Map(BTreeMap::from([(
                    Value::I64(-9),
                    Value::Record(Record::new("Int32Record").with(1, "value", Value::I32(3))),
                )])),
            )
            .with(8, "active", Value::Bool(true));

        let text = encode(&person);
        assert_eq!(decode(&registry, "Person", &text).unwrap(), person);
    }

    fn sample(d: f64) -> Record {
        Record::new("Sample").with(1, "d", Value::Double(OrderedFloat(d)))
    }

    fn sample_value(record: &Record) -> f64 {
        match record.get("d") {
            Some(Value::Double(d)) => d.0,
            other => panic!("unexpected d: {other:?}"),
        }
    }

    #[test]
    fn doubles_keep_every_bit_through_text() {
        let registry = registry();
        let mut awkward = vec![
            1.0715660391465826e-75,
            0.1 + 0.2,
            -0.0,
            5e-324,
            f64::MIN_POSITIVE,
            f64::MAX,
            f64::MIN,
            1.0,
        ];
        // xorshift over raw bit patterns
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        while awkward.len() < 5000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let d = f64::from_bits(state);
            if d.is_finite() {
                awkward.push(d);
            }
        }

        for d in awkward {
            let text = encode(&sample(d));
            let back = decode(&registry, "Sample", &text).unwrap();
            assert_eq!(sample_value(&back).to_bits(), d.to_bits(), "{text}");
        }
    }

    #[test]
    fn non_finite_doubles_are_written_as_strings() {
        let registry = registry();
        for (d, text) in [
            (f64::NAN, r#"{"d":"NaN"}"#),
            (f64::INFINITY, r#"{"d":"Infinity"}"#),
            (f64::NEG_INFINITY, r#"{"d":"-Infinity"}"#),
        ] {
            assert_eq!(encode(&sample(d)), text);
            let back = decode(&registry, "Sample", text).unwrap();
            assert_eq!(back, sample(d));
        }
        assert!(decode(&registry, "Sample", r#"{"d":"inf"}"#).is_err());
    }

    #[test]
    fn set_fields_collapse_duplicates() {
        let record = decode(&registry(), "Person", r#"{"name": "x", "tags": ["a", "a", "b"]}"#)
            .unwrap();
        match record.get("tags") {
            Some(Value::Set(tags)) => assert_eq!(tags.len(), 2),
            other => panic!("unexpected tags: {other:?}"),
        }
    }

    #[test]
    fn enums_accept_symbol_or_value() {
        let registry = registry();
        let by_name = decode(&registry, "Person", r#"{"name": "x", "favorite": "GREEN"}"#).unwrap();
        let by_value = decode(&registry, "Person", r#"{"name": "x", "favorite": 1}"#).unwrap();
        assert_eq!(by_name, by_value);
    }

    #[test]
    fn null_leaves_a_field_unset() {
        let record = decode(&registry(), "Person", r#"{"name": "x", "age": null}"#).unwrap();
        assert_eq!(record.get("age"), None);
    }

    #[test]
    fn reports_decode_failures_with_text_and_schema() {
        let registry = registry();
        let cases = [
            ("Int32Record", "{\"value\": "),
            ("Int32Record", "[1, 2]"),
            ("Int32Record", r#"{"valu": 1}"#),
            ("Int32Record", r#"{"value": "one"}"#),
            ("Int32Record", r#"{"value": 3000000000}"#),
            ("Person", r#"{"age": 1}"#),
            ("Person", r#"{"name": "x", "age": 300}"#),
            ("Person", r#"{"name": "x", "favorite": "PURPLE"}"#),
            ("Person", r#"{"name": "x", "counts": {"nine": {"value": 1}}}"#),
            ("Nope", "{}"),
        ];
        for (schema, text) in cases {
            match decode(&registry, schema, text) {
                Err(Error::Decode {
                    schema: s, text: t, ..
                }) => {
                    assert_eq!(s, schema);
                    assert_eq!(t, text);
                }
                other => panic!("{schema} {text}: unexpected {other:?}"),
            }
        }
    }
}
