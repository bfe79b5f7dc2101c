use serde_json::Value;

/// Merge an invocation override over a job's default parameter.
///
/// Objects merge shallowly with override keys winning. Any other non-null
/// override replaces the base outright; a null override keeps the base.
pub fn merge_parameters(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (_, Value::Null) => base.clone(),
        (Value::Object(base_map), Value::Object(over_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in over_map {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => over.clone(),
    }
}
