//! # Response Post-Processing
//!
//! Sorting, row limiting and column projection of list-shaped results (`{"results": [...]}`).
//! Any other value is returned untouched.
//!
//! The steps always run in the same order: sort, then limit, then projection.
use crate::options::FetchOptions;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Applies the presentation directives of `options` to `result`.
pub fn post_process(mut result: Value, options: &FetchOptions) -> Value {
    let Some(items) = results_mut(&mut result) else {
        return result;
    };

    if let Some(field) = options.sort_by.as_deref().filter(|f| !f.is_empty()) {
        sort_by_field(items, field);
    }

    if options.rows > 0 {
        items.truncate(options.rows);
    }

    let columns = options.column_list();
    if !columns.is_empty() {
        project(items, &columns);
    }

    result
}

/// The items of a list-shaped value.
pub fn results(value: &Value) -> Option<&Vec<Value>> {
    value.get("results")?.as_array()
}

fn results_mut(value: &mut Value) -> Option<&mut Vec<Value>> {
    value.get_mut("results")?.as_array_mut()
}

/// Stable sort on `field`. Items lacking the field go last, in their original order.
pub fn sort_by_field(items: &mut [Value], field: &str) {
    items.sort_by(|a, b| match (a.get(field), b.get(field)) {
        (Some(a), Some(b)) => compare_values(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        // `true` first.
        (Value::Bool(a), Value::Bool(b)) => b.cmp(a),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.total_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Keeps only the named fields on every object item. Missing fields are skipped per item.
pub fn project(items: &mut [Value], columns: &[String]) {
    for item in items.iter_mut() {
        let Value::Object(fields) = item else {
            continue;
        };

        let projected: Map<String, Value> = columns
            .iter()
            .filter_map(|column| Some((column.clone(), fields.get(column)?.clone())))
            .collect();

        *fields = projected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> FetchOptions {
        FetchOptions::default()
    }

    fn names(value: &Value) -> Vec<&str> {
        results(value)
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn non_list_values_are_untouched() {
        let value = json!({ "name": "a", "state": "ENABLED" });
        let options = FetchOptions {
            sort_by: Some("name".to_string()),
            rows: 1,
            columns: Some("state".to_string()),
            ..options()
        };

        assert_eq!(post_process(value.clone(), &options), value);
    }

    #[test]
    fn sort_is_stable_and_puts_missing_fields_last() {
        let value = json!({ "results": [
            { "name": "no-state-1" },
            { "name": "b1", "state": "b" },
            { "name": "a1", "state": "a" },
            { "name": "no-state-2" },
            { "name": "b2", "state": "b" },
        ]});
        let options = FetchOptions {
            sort_by: Some("state".to_string()),
            ..options()
        };

        let sorted = post_process(value, &options);

        assert_eq!(
            names(&sorted),
            vec!["a1", "b1", "b2", "no-state-1", "no-state-2"]
        );
    }

    #[test]
    fn sort_is_type_aware() {
        let value = json!({ "results": [
            { "name": "ten", "size": 10 },
            { "name": "nine", "size": 9 },
            { "name": "off", "enabled": false },
            { "name": "on", "enabled": true },
        ]});

        let by_size = post_process(
            value.clone(),
            &FetchOptions {
                sort_by: Some("size".to_string()),
                ..options()
            },
        );
        assert_eq!(names(&by_size)[..2], ["nine", "ten"]);

        let by_flag = post_process(
            value,
            &FetchOptions {
                sort_by: Some("enabled".to_string()),
                ..options()
            },
        );
        assert_eq!(names(&by_flag)[..2], ["on", "off"]);
    }

    #[test]
    fn limit_then_project() {
        let value = json!({ "results": [
            { "name": "c", "user_id": "u-3", "email": "c@example.com" },
            { "name": "a", "user_id": "u-1" },
            { "name": "b", "user_id": "u-2" },
        ]});
        let options = FetchOptions {
            sort_by: Some("name".to_string()),
            rows: 2,
            columns: Some("user_id,email".to_string()),
            ..options()
        };

        let processed = post_process(value, &options);

        assert_eq!(
            processed,
            json!({ "results": [{ "user_id": "u-1" }, { "user_id": "u-2" }] })
        );
    }

    #[test]
    fn zero_rows_keeps_everything() {
        let value = json!({ "results": [{ "name": "a" }, { "name": "b" }] });
        assert_eq!(post_process(value.clone(), &options()), value);
    }
}
