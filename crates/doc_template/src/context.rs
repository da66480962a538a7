//! Render context
//!
//! A [`Context`] maps names to [`Value`]s. Sequences hold child contexts so a
//! loop body sees each element as its innermost scope. Lookups go through a
//! [`Scope`], the stack of contexts entered so far.

use crate::ast::TagPath;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// Key under which a scalar sequence element is stored; `{.}` reads it
pub const CURRENT_ITEM: &str = ".";

/// Errors converting external data into a context
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context data must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reference to an image, resolved by an image provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A value in the render context
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
    List(Vec<Context>),
    Map(Context),
    Image(ImageRef),
}

impl Value {
    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::List(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Image(_) => "image",
        }
    }

    /// String form of a scalar; `None` for sequences and mappings
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => {
                // Format integers without decimal places
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(format!("{}", n))
                }
            }
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some(String::new()),
            Value::Image(r) => Some(r.0.clone()),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Whether an inverted section over this value renders
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::List(items) => items.is_empty(),
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Context>> for Value {
    fn from(items: Vec<Context>) -> Self {
        Value::List(items)
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        Value::Map(ctx)
    }
}

impl From<ImageRef> for Value {
    fn from(r: ImageRef) -> Self {
        Value::Image(r)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            JsonValue::String(s) => Value::Text(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Context::from_element).collect()),
            JsonValue::Object(map) => Value::Map(Context::from_map(map)),
        }
    }
}

/// Name to value mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder form of [`Context::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve a dotted path within this context only
    pub fn get_path(&self, path: &TagPath) -> Option<&Value> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut current = self.values.get(first.as_str())?;
        for segment in segments {
            match current {
                Value::Map(ctx) => current = ctx.values.get(segment.as_str())?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Build a context from a JSON object
    pub fn from_json(json: JsonValue) -> Result<Self, ContextError> {
        match json {
            JsonValue::Object(map) => Ok(Self::from_map(map)),
            JsonValue::Null => Err(ContextError::NotAnObject("null")),
            JsonValue::Bool(_) => Err(ContextError::NotAnObject("boolean")),
            JsonValue::Number(_) => Err(ContextError::NotAnObject("number")),
            JsonValue::String(_) => Err(ContextError::NotAnObject("string")),
            JsonValue::Array(_) => Err(ContextError::NotAnObject("array")),
        }
    }

    /// Parse JSON text into a context
    pub fn from_json_str(text: &str) -> Result<Self, ContextError> {
        let json: JsonValue = serde_json::from_str(text)?;
        Self::from_json(json)
    }

    fn from_map(map: serde_json::Map<String, JsonValue>) -> Self {
        Self {
            values: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }

    /// Sequence element: objects become contexts, anything else is stored
    /// under [`CURRENT_ITEM`]
    fn from_element(json: JsonValue) -> Self {
        match json {
            JsonValue::Object(map) => Self::from_map(map),
            other => Self::new().with(CURRENT_ITEM, Value::from(other)),
        }
    }
}

/// Stack of contexts entered while rendering
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    frames: Vec<&'a Context>,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Context) -> Self {
        Self { frames: vec![root] }
    }

    pub fn push(&mut self, frame: &'a Context) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Resolve a path. The innermost frame defining the first segment wins;
    /// the rest of the path is not looked up in outer frames.
    pub fn lookup(&self, path: &TagPath) -> Option<&'a Value> {
        let first = path.segments().first()?;
        let frame: &'a Context = self.frames.iter().rev().copied().find(|f| f.contains(first))?;
        frame.get_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> TagPath {
        TagPath::parse(s).unwrap()
    }

    #[test]
    fn test_scalar_strings() {
        assert_eq!(Value::from(2).to_scalar_string().as_deref(), Some("2"));
        assert_eq!(Value::from(2.5).to_scalar_string().as_deref(), Some("2.5"));
        assert_eq!(Value::from(true).to_scalar_string().as_deref(), Some("true"));
        assert_eq!(Value::Null.to_scalar_string().as_deref(), Some(""));
        assert_eq!(Value::List(vec![]).to_scalar_string(), None);
    }

    #[test]
    fn test_from_json() {
        let ctx = Context::from_json(json!({
            "name": "Ali",
            "company": {"name": "Acme"},
            "items": [{"item": "A", "qty": 2}],
            "tags": ["x", "y"]
        }))
        .unwrap();

        assert_eq!(ctx.get("name"), Some(&Value::from("Ali")));
        assert_eq!(ctx.get_path(&path("company.name")), Some(&Value::from("Acme")));
        match ctx.get("items") {
            Some(Value::List(items)) => assert_eq!(items[0].get("qty"), Some(&Value::Number(2.0))),
            other => panic!("unexpected {:?}", other),
        }
        match ctx.get("tags") {
            Some(Value::List(items)) => assert_eq!(items[1].get(CURRENT_ITEM), Some(&Value::from("y"))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(Context::from_json(json!([1, 2])), Err(ContextError::NotAnObject("array"))));
        assert!(matches!(Context::from_json_str("{"), Err(ContextError::Json(_))));
    }

    #[test]
    fn test_scope_shadowing() {
        let root = Context::new().with("name", "outer").with("title", "Report");
        let inner = Context::new().with("name", "inner");

        let mut scope = Scope::new(&root);
        assert_eq!(scope.lookup(&path("name")), Some(&Value::from("outer")));

        scope.push(&inner);
        assert_eq!(scope.lookup(&path("name")), Some(&Value::from("inner")));
        assert_eq!(scope.lookup(&path("title")), Some(&Value::from("Report")));

        scope.pop();
        assert_eq!(scope.lookup(&path("name")), Some(&Value::from("outer")));
    }

    #[test]
    fn test_scope_no_fallthrough_on_partial_path() {
        let root = Context::new().with("company", Context::new().with("name", "Acme"));
        let inner = Context::new().with("company", "Local");

        let mut scope = Scope::new(&root);
        scope.push(&inner);
        assert_eq!(scope.lookup(&path("company.name")), None);
    }

    #[test]
    fn test_falsy() {
        assert!(Value::Null.is_falsy());
        assert!(Value::Bool(false).is_falsy());
        assert!(Value::List(vec![]).is_falsy());
        assert!(!Value::Number(0.0).is_falsy());
        assert!(!Value::List(vec![Context::new()]).is_falsy());
    }
}
