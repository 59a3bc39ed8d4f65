use std::collections::HashMap;

use crate::tree::{Arena, Document, NodeData, NodeId};
use crate::value::Value;

/// JSON value graph expressed as a tree the engine can merge.
///
/// Shape: objects become `<object>` elements, arrays `<array>` elements,
/// and every member or item is wrapped in a `<key>` element (`name`
/// attribute for object members). Scalars are text runs under their key; a
/// `type` attribute on the key records the scalar's JSON type so
/// [`JsonDocument::to_value`] can reconstruct the original value graph
/// after text runs have been merged.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    arena: Arena,
    root: NodeId,
}

pub const OBJECT_TAG: &str = "object";
pub const ARRAY_TAG: &str = "array";
pub const KEY_TAG: &str = "key";

impl JsonDocument {
    /// Build a document from a value graph.
    pub fn from_value(value: &Value) -> Self {
        let mut arena = Arena::new();
        let root = build(&mut arena, value);
        JsonDocument { arena, root }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        JsonDocument::from_value(&Value::from_json(value))
    }

    /// Reconstruct the value graph from the (possibly merged) tree.
    pub fn to_value(&self) -> Value {
        self.read(self.root)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.to_value().to_json()
    }

    fn read(&self, id: NodeId) -> Value {
        match self.arena.data(id) {
            NodeData::Text(value) => Value::String(value.clone()),
            NodeData::Fragment => {
                // a merged-in fragment reads as its single child, or an
                // array of children
                let kids: Vec<Value> = self
                    .arena
                    .children(id)
                    .iter()
                    .map(|&c| self.read(c))
                    .collect();
                match kids.len() {
                    0 => Value::Null,
                    1 => kids.into_iter().next().unwrap(),
                    _ => Value::Array(kids),
                }
            }
            NodeData::Element { tag, .. } => match tag.as_str() {
                OBJECT_TAG => {
                    let mut map = HashMap::new();
                    for &child in self.arena.children(id) {
                        if self.arena.tag(child) != Some(KEY_TAG) {
                            continue;
                        }
                        if let Some(name) = self.arena.attr(child, "name") {
                            map.insert(name.to_string(), self.read_key(child));
                        }
                    }
                    Value::Object(map)
                }
                ARRAY_TAG => Value::Array(
                    self.arena
                        .children(id)
                        .iter()
                        .filter(|&&c| self.arena.tag(c) == Some(KEY_TAG))
                        .map(|&c| self.read_key(c))
                        .collect(),
                ),
                KEY_TAG => self.read_key(id),
                _ => Value::Null,
            },
        }
    }

    fn read_key(&self, key: NodeId) -> Value {
        // a single structured child wins; otherwise the concatenated text
        // runs are re-typed through the recorded scalar type
        let mut text = String::new();
        for &child in self.arena.children(key) {
            match self.arena.data(child) {
                NodeData::Text(value) => text.push_str(value),
                _ => return self.read(child),
            }
        }
        retype(&text, self.arena.attr(key, "type"))
    }
}

fn build(arena: &mut Arena, value: &Value) -> NodeId {
    match value {
        Value::Object(map) => {
            let el = arena.create_element(OBJECT_TAG);
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for name in keys {
                let key = build_key(arena, Some(name), &map[name]);
                arena.append(el, key);
            }
            el
        }
        Value::Array(items) => {
            let el = arena.create_element(ARRAY_TAG);
            for item in items {
                let key = build_key(arena, None, item);
                arena.append(el, key);
            }
            el
        }
        scalar => {
            // bare scalar document: a lone key wrapper
            build_key(arena, None, scalar)
        }
    }
}

fn build_key(arena: &mut Arena, name: Option<&str>, value: &Value) -> NodeId {
    let key = arena.create_element(KEY_TAG);
    if let Some(name) = name {
        arena.set_attr(key, "name", name);
    }
    match value {
        Value::Object(_) | Value::Array(_) => {
            let child = build(arena, value);
            arena.append(key, child);
        }
        scalar => {
            arena.set_attr(key, "type", scalar_type(scalar));
            let text = match scalar {
                Value::Null => String::new(),
                other => other.as_string(),
            };
            let node = arena.create_text(&text);
            arena.append(key, node);
        }
    }
    key
}

fn scalar_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "int",
        Value::Float(_) => "float",
        _ => "string",
    }
}

/// Re-parse merged text through the key's recorded type, falling back to
/// sniffing when the merge replaced the value with something else.
fn retype(text: &str, ty: Option<&str>) -> Value {
    match ty {
        Some("null") if text.is_empty() => Value::Null,
        Some("boolean") => Value::Boolean(text == "true"),
        Some("int") => text
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        Some("float") => text
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        Some(_) => Value::String(text.to_string()),
        None => sniff(text),
    }
}

fn sniff(text: &str) -> Value {
    match text {
        "" => Value::Null,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => {
            if let Ok(i) = text.parse::<i64>() {
                Value::Integer(i)
            } else if let Ok(f) = text.parse::<f64>() {
                Value::Float(f)
            } else {
                Value::String(text.to_string())
            }
        }
    }
}

impl Document for JsonDocument {
    fn arena(&self) -> &Arena {
        &self.arena
    }

    fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    fn serialize(&self, id: NodeId) -> String {
        self.read(id).to_json().to_string()
    }
}
