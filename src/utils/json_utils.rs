use serde_json::Value;

pub struct JsonUtils;

impl JsonUtils {
    /// Walks a dot-separated path (`"plugindata.data.id"`) into a JSON value.
    /// Returns `None` as soon as a segment is missing or the value is `null`.
    pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
        let mut current = value;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Shallow-merges `overlay` on top of `base`; keys in `overlay` win.
    /// A non-object overlay leaves `base` untouched.
    pub fn merge(base: Value, overlay: Value) -> Value {
        match (base, overlay) {
            (Value::Object(mut base), Value::Object(overlay)) => {
                for (key, value) in overlay {
                    base.insert(key, value);
                }
                Value::Object(base)
            }
            (base, _) => base,
        }
    }

    /// Interprets `true` and `"true"` as true; Janus reports some flags as strings
    pub fn is_truthy(value: Option<&Value>) -> bool {
        match value {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text == "true",
            _ => false,
        }
    }
}
