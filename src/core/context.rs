//! Run context - the layered environment visible to templates

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Key of the pipeline input
pub const INPUT_KEY: &str = "@input";

/// Key of the mod options
pub const OPTIONS_KEY: &str = "@options";

/// Key of the mod variables
pub const MOD_KEY: &str = "@mod";

/// Prefix a key with `@` unless it already has one
pub fn normalize_key(key: &str) -> String {
    if key.starts_with('@') {
        key.to_string()
    } else {
        format!("@{}", key)
    }
}

#[derive(Debug)]
struct Frame {
    bindings: Map<String, Value>,
    parent: Option<Arc<Frame>>,
}

/// Key/value environment threaded through one pipeline run
///
/// Contexts are immutable: binding a value produces a new context layered on
/// top of the old one, so a nested run can never mutate its parent's data.
/// Values are snapshots; later changes to the page do not affect them.
#[derive(Clone, Default)]
pub struct RunContext {
    frame: Option<Arc<Frame>>,
}

impl RunContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context holding only `@input`
    pub fn with_input(input: Value) -> Self {
        Self::new().bind(INPUT_KEY, input)
    }

    /// Derive a context with one extra binding
    pub fn bind(&self, key: &str, value: Value) -> RunContext {
        let mut bindings = Map::new();
        bindings.insert(normalize_key(key), value);
        self.layer(bindings)
    }

    /// Derive a context with several extra bindings
    pub fn extend<I, K>(&self, bindings: I) -> RunContext
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let bindings: Map<String, Value> = bindings
            .into_iter()
            .map(|(key, value)| (normalize_key(key.as_ref()), value))
            .collect();
        if bindings.is_empty() {
            return self.clone();
        }
        self.layer(bindings)
    }

    fn layer(&self, bindings: Map<String, Value>) -> RunContext {
        RunContext {
            frame: Some(Arc::new(Frame {
                bindings,
                parent: self.frame.clone(),
            })),
        }
    }

    /// Innermost value bound to `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = normalize_key(key);
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            if let Some(value) = current.bindings.get(&key) {
                return Some(value);
            }
            frame = current.parent.as_deref();
        }
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn input(&self) -> Option<&Value> {
        self.get(INPUT_KEY)
    }

    /// Visible keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.snapshot().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Flatten the layers; inner bindings shadow outer ones
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut frames = Vec::new();
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            frames.push(current);
            frame = current.parent.as_deref();
        }

        let mut flattened = Map::new();
        for frame in frames.into_iter().rev() {
            for (key, value) in &frame.bindings {
                flattened.insert(key.clone(), value.clone());
            }
        }
        flattened
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.snapshot())
    }

    /// Number of layers, for diagnostics
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            depth += 1;
            frame = current.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("keys", &self.keys())
            .field("depth", &self.depth())
            .finish()
    }
}
