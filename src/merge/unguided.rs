//! Structural merge used where no schema describes a value.
//!
//! The default document supplies the structure and the current document
//! supplies the data: keys only the current side has are dropped, keys only
//! the default side has are added, and a kind mismatch resolves to the default.

use crate::value::{classify, same_kind, JsonType, Map, Value};

/// Merges `current` into the shape of `default` without a schema.
pub fn merge_values(current: &Value, default: &Value) -> Value {
    if !same_kind(current, default) {
        return default.clone();
    }
    match (current, default) {
        (Value::List(current), Value::List(default)) => merge_lists(current, default),
        (Value::Map(current), Value::Map(default)) => Value::Map(merge_maps(current, default)),
        _ => match classify(default) {
            JsonType::Null | JsonType::Unknown => default.clone(),
            _ => current.clone(),
        },
    }
}

fn merge_lists(current: &[Value], default: &[Value]) -> Value {
    if homogeneous_scalars(current) && homogeneous_scalars(default) {
        let heads_agree = match (current.first(), default.first()) {
            (Some(c), Some(d)) => same_kind(c, d),
            _ => false,
        };
        return if heads_agree || default.is_empty() {
            Value::List(current.to_vec())
        } else {
            Value::List(default.to_vec())
        };
    }

    let mut merged = Vec::with_capacity(default.len());
    for (i, fallback) in default.iter().enumerate() {
        match current.get(i) {
            Some(item) => merged.push(merge_values(item, fallback)),
            // Missing nested structure is filled in; missing scalars are not.
            None if !classify(fallback).is_simple() => merged.push(fallback.clone()),
            None => {}
        }
    }
    Value::List(merged)
}

/// Keeps exactly the default's keys, preferring the current side's values.
pub(crate) fn merge_maps(current: &Map, default: &Map) -> Map {
    default
        .iter()
        .map(|(key, fallback)| {
            let value = match current.get(key) {
                Some(item) => merge_values(item, fallback),
                None => fallback.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Reports whether a list holds only scalars of a single kind.
fn homogeneous_scalars(list: &[Value]) -> bool {
    let Some(first) = list.first() else {
        return true;
    };
    list.iter()
        .all(|item| classify(item).is_simple() && same_kind(item, first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_json;
    use pretty_assertions::assert_eq;

    fn merged(current: &str, default: &str) -> Value {
        merge_values(&from_json(current).unwrap(), &from_json(default).unwrap())
    }

    fn json(s: &str) -> Value {
        from_json(s).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(merged(r#""mine""#, r#""theirs""#), json(r#""mine""#));
        assert_eq!(merged("3", "1.5"), json("3"));
        assert_eq!(merged("true", r#""x""#), json(r#""x""#));
        assert_eq!(merged("null", "null"), json("null"));
        assert_eq!(merged("null", "4"), json("4"));
    }

    #[test]
    fn test_scalar_lists() {
        assert_eq!(merged(r#"["a","b"]"#, r#"["c"]"#), json(r#"["a","b"]"#));
        assert_eq!(merged(r#"["a"]"#, "[]"), json(r#"["a"]"#));
        assert_eq!(merged("[]", r#"["c"]"#), json(r#"["c"]"#));
        assert_eq!(merged("[1, 2]", r#"["c"]"#), json(r#"["c"]"#));
    }

    #[test]
    fn test_complex_lists_follow_default_length() {
        assert_eq!(
            merged(r#"[{"a":1,"x":0},{"a":2}]"#, r#"[{"a":0,"b":0}]"#),
            json(r#"[{"a":1,"b":0}]"#)
        );
        assert_eq!(
            merged(r#"[{"a":1}]"#, r#"[{"a":0},{"a":5}]"#),
            json(r#"[{"a":1},{"a":5}]"#)
        );
        // Mixed lists only gain missing complex elements.
        assert_eq!(merged(r#"[{"a":1}]"#, r#"[{"a":0}, 7]"#), json(r#"[{"a":1}]"#));
    }

    #[test]
    fn test_maps_take_default_keys() {
        assert_eq!(
            merged(
                r#"{"keep":"mine","stale":true,"nested":{"x":1}}"#,
                r#"{"keep":"theirs","new":2,"nested":{"x":0,"y":0}}"#
            ),
            json(r#"{"keep":"mine","new":2,"nested":{"x":1,"y":0}}"#)
        );
    }

    #[test]
    fn test_kind_mismatch_takes_default() {
        assert_eq!(merged(r#"{"a":1}"#, "[1]"), json("[1]"));
        assert_eq!(merged(r#"{"a":{"b":1}}"#, r#"{"a":[1]}"#), json(r#"{"a":[1]}"#));
    }
}
