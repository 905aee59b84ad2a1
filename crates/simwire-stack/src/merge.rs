//! Raw layer merging.
//!
//! Layers are merged as untyped values before anything is deserialized:
//! objects merge key by key, scalars and arrays are replaced, except for the
//! lists in [`ADDITIVE_PATHS`], which accumulate across layers.

use serde_json::Value;

/// Lists that are concatenated instead of replaced when layers merge.
pub const ADDITIVE_PATHS: &[&str] = &["/engine/ignore", "/engine/plugin_path"];

/// Merge `layer` onto `target`.
pub fn merge_layer(target: &mut Value, layer: Value) {
    merge_at(target, layer, &mut String::new());
}

fn merge_at(target: &mut Value, layer: Value, path: &mut String) {
    match (target, layer) {
        (Value::Object(target), Value::Object(layer)) => {
            for (key, value) in layer {
                let len = path.len();
                path.push('/');
                path.push_str(&escape_token(&key));
                match target.get_mut(&key) {
                    Some(slot) => merge_at(slot, value, path),
                    None => {
                        target.insert(key, value);
                    }
                }
                path.truncate(len);
            }
        }
        (Value::Array(target), Value::Array(layer)) if ADDITIVE_PATHS.contains(&path.as_str()) => {
            target.extend(layer);
        }
        (target, layer) => *target = layer,
    }
}

// ===========================================================================
// JSON pointers
// ===========================================================================

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Remove the value at `pointer` (RFC 6901). Returns whether anything was
/// removed. The empty pointer and missing targets remove nothing.
pub fn remove_pointer(value: &mut Value, pointer: &str) -> bool {
    if !pointer.starts_with('/') {
        return false;
    }
    let Some(split) = pointer.rfind('/') else {
        return false;
    };
    let last = unescape_token(&pointer[split + 1..]);
    let Some(parent) = value.pointer_mut(&pointer[..split]) else {
        return false;
    };

    match parent {
        Value::Object(map) => map.remove(&last).is_some(),
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

// ===========================================================================
// Gated content detection
// ===========================================================================

/// Whether a trigger action is, or contains at any depth, a `command` action.
///
/// Recognized shapes: `{"name": "command", ...}`, the bare string `"command"`,
/// and the `"command=..."` shorthand. Inside an object, plain string fields
/// are data, except an `action` field.
pub fn contains_command_action(action: &Value) -> bool {
    match action {
        Value::String(s) => s == "command" || s.starts_with("command="),
        Value::Object(map) => {
            map.get("name").and_then(Value::as_str) == Some("command")
                || map.iter().any(|(key, value)| match value {
                    Value::String(_) => key == "action" && contains_command_action(value),
                    _ => contains_command_action(value),
                })
        }
        Value::Array(items) => items.iter().any(contains_command_action),
        _ => false,
    }
}

/// Index of the first trigger in a raw `triggers` list whose action is a
/// command action.
pub fn find_command_trigger(triggers: &Value) -> Option<usize> {
    triggers
        .as_array()?
        .iter()
        .position(|t| t.get("action").is_some_and(contains_command_action))
}

/// Whether a raw `engine.hooks` section declares any hook.
pub fn declares_hooks(hooks: &Value) -> bool {
    match hooks {
        Value::Object(map) => map.values().any(|list| match list {
            Value::Array(items) => !items.is_empty(),
            Value::Null => false,
            _ => true,
        }),
        Value::Null => false,
        _ => true,
    }
}
