//! Session parameter view
//!
//! Detached until the owning session opens, then bound to a namespace inside
//! the runtime payload so every mutation lands in what the runtime persists.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use sessio_runtime::SessionPayload;

#[derive(Debug)]
enum Binding {
    Detached(Map<String, Value>),
    Bound {
        payload: SessionPayload,
        namespace: String,
    },
}

#[derive(Debug)]
pub struct SessionParams {
    binding: Binding,
}

impl SessionParams {
    pub fn new() -> Self {
        Self {
            binding: Binding::Detached(Map::new()),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            binding: Binding::Detached(map),
        }
    }

    /// View `payload[namespace]` from now on, creating it as an empty object
    /// if it is missing or not an object. Detached values are discarded.
    pub fn bind(&mut self, payload: SessionPayload, namespace: &str) {
        namespace_mut(&mut payload.write(), namespace);

        self.binding = Binding::Bound {
            payload,
            namespace: namespace.to_string(),
        };
    }

    /// Stop tracking the payload, keeping a snapshot of the current values.
    pub fn detach(&mut self) {
        let snapshot = self.to_map();
        self.binding = Binding::Detached(snapshot);
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound { .. })
    }

    pub fn has(&self, key: &str) -> bool {
        self.with_map(|map| map.contains_key(key))
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.with_map(|map| map.get(key).cloned())
    }

    /// Typed read. `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.get_value(key).map(serde_json::from_value).transpose()
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.with_map_mut(|map| {
            map.insert(key.into(), value);
        });
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.with_map_mut(|map| map.remove(key))
    }

    pub fn clear(&mut self) {
        match &mut self.binding {
            Binding::Detached(map) => map.clear(),
            Binding::Bound { payload, namespace } => {
                if let Some(Value::Object(map)) = payload.write().get_mut(namespace.as_str()) {
                    map.clear();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.with_map(|map| map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.with_map(|map| map.keys().cloned().collect())
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.with_map(|map| map.clone())
    }

    fn with_map<T>(&self, f: impl FnOnce(&Map<String, Value>) -> T) -> T {
        match &self.binding {
            Binding::Detached(map) => f(map),
            Binding::Bound { payload, namespace } => {
                let data = payload.read();
                match data.get(namespace.as_str()) {
                    Some(Value::Object(map)) => f(map),
                    _ => f(&Map::new()),
                }
            }
        }
    }

    fn with_map_mut<T>(&mut self, f: impl FnOnce(&mut Map<String, Value>) -> T) -> T {
        match &mut self.binding {
            Binding::Detached(map) => f(map),
            Binding::Bound { payload, namespace } => {
                let mut data = payload.write();
                f(namespace_mut(&mut data, namespace))
            }
        }
    }
}

fn namespace_mut<'a>(data: &'a mut Map<String, Value>, namespace: &str) -> &'a mut Map<String, Value> {
    let slot = data
        .entry(namespace.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }

    match slot {
        Value::Object(map) => map,
        _ => unreachable!("namespace slot was just made an object"),
    }
}

impl Default for SessionParams {
    fn default() -> Self {
        Self::new()
    }
}
