//! Deferred references
//!
//! A reference to a binding whose value may not exist yet. Member and index
//! access on a reference extend its path instead of reading anything. The path
//! is walked only once the owner's value is in the resolution cache; missing
//! keys, nulls and out-of-range indexes all settle to `undefined` (`None`).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagnostics::is_truthy;
use crate::expr::Expr;
use crate::ir::{BindingId, ElementId};
use crate::schema::Props;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// Segment named by a computed index value. Anything that cannot name a
    /// key or position yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(PathSegment::Key(s.clone())),
            Value::Number(n) => n.as_u64().map(|i| PathSegment::Index(i as usize)),
            _ => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Key(k) => write!(f, ".{}", k),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredRef {
    pub owner: BindingId,
    pub path: Vec<PathSegment>,
}

impl DeferredRef {
    pub fn new(owner: BindingId) -> Self {
        Self {
            owner,
            path: Vec::new(),
        }
    }

    pub fn extend(&self, segment: PathSegment) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self {
            owner: self.owner,
            path,
        }
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.extend(PathSegment::Key(key.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.extend(PathSegment::Index(index))
    }
}

/// Walk `path` into `value`. Never fails; a segment that does not apply
/// yields `None`.
pub fn resolve_path<'v>(value: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    let mut current = value;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get(key)?,
            (Value::Object(map), PathSegment::Index(i)) => map.get(&i.to_string())?,
            (Value::Array(items), PathSegment::Index(i)) => items.get(*i)?,
            (Value::Array(items), PathSegment::Key(key)) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLUTION CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolved values for one render call, keyed by element. Written at most once
/// per element; a later write for the same key is ignored.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    values: HashMap<ElementId, Option<Value>>,
    binding_elements: HashMap<BindingId, ElementId>,
}

impl ResolutionCache {
    pub fn new(binding_elements: HashMap<BindingId, ElementId>) -> Self {
        Self {
            values: HashMap::new(),
            binding_elements,
        }
    }

    /// Returns false if the element already had a value.
    pub fn insert(&mut self, element: ElementId, value: Option<Value>) -> bool {
        if self.values.contains_key(&element) {
            return false;
        }
        self.values.insert(element, value);
        true
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.values.contains_key(&element)
    }

    pub fn get(&self, element: ElementId) -> Option<&Value> {
        self.values.get(&element).and_then(Option::as_ref)
    }

    pub fn binding_value(&self, owner: BindingId) -> Option<&Value> {
        let element = self.binding_elements.get(&owner)?;
        self.get(*element)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROP VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// A prop value as produced by an expression, before deferred parts are settled.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Undefined,
    Direct(Value),
    Deferred(DeferredRef),
    Object(Vec<(String, PropValue)>),
    Array(Vec<PropValue>),
    Template(Vec<PropValue>),
    Add(Box<PropValue>, Box<PropValue>),
    Fallback {
        value: Box<PropValue>,
        fallback: Box<PropValue>,
        nullish: bool,
    },
    /// Access whose key is only known after settling.
    Access {
        target: Box<PropValue>,
        segment: Box<PropValue>,
    },
}

/// Names visible to expressions: hoisted bindings first, then caller inputs.
pub struct ExprEnv<'a> {
    pub bindings: &'a HashMap<String, BindingId>,
    pub inputs: &'a Props,
}

impl PropValue {
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(v) => PropValue::Direct(v),
            None => PropValue::Undefined,
        }
    }

    /// Lower an expression. Fails with the first identifier that names neither
    /// a binding nor an input.
    pub fn from_expr(expr: &Expr, env: &ExprEnv<'_>) -> Result<Self, String> {
        Ok(match expr {
            Expr::Literal { value } => PropValue::Direct(value.clone()),
            Expr::Undefined => PropValue::Undefined,
            Expr::Identifier { name } => {
                if let Some(id) = env.bindings.get(name) {
                    PropValue::Deferred(DeferredRef::new(*id))
                } else if let Some(value) = env.inputs.get(name) {
                    PropValue::Direct(value.clone())
                } else {
                    return Err(name.clone());
                }
            }
            Expr::Member { object, property } => {
                let target = PropValue::from_expr(object, env)?;
                target.access(PropValue::Direct(Value::String(property.clone())))
            }
            Expr::Index { object, index } => {
                let target = PropValue::from_expr(object, env)?;
                target.access(PropValue::from_expr(index, env)?)
            }
            Expr::Object { entries } => PropValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), PropValue::from_expr(v, env)?)))
                    .collect::<Result<_, String>>()?,
            ),
            Expr::Array { items } => PropValue::Array(
                items
                    .iter()
                    .map(|v| PropValue::from_expr(v, env))
                    .collect::<Result<_, String>>()?,
            ),
            Expr::Template { parts } => PropValue::Template(
                parts
                    .iter()
                    .map(|v| PropValue::from_expr(v, env))
                    .collect::<Result<_, String>>()?,
            ),
            Expr::Add { left, right } => PropValue::Add(
                Box::new(PropValue::from_expr(left, env)?),
                Box::new(PropValue::from_expr(right, env)?),
            ),
            Expr::Fallback {
                value,
                fallback,
                nullish,
            } => PropValue::Fallback {
                value: Box::new(PropValue::from_expr(value, env)?),
                fallback: Box::new(PropValue::from_expr(fallback, env)?),
                nullish: *nullish,
            },
        })
    }

    /// Member/index access. Deferred targets grow their path; direct targets
    /// are read immediately.
    pub fn access(self, segment: PropValue) -> PropValue {
        match (self, segment) {
            (PropValue::Undefined, _) => PropValue::Undefined,
            (PropValue::Deferred(r), PropValue::Direct(key)) => match PathSegment::from_value(&key) {
                Some(seg) => PropValue::Deferred(r.extend(seg)),
                None => PropValue::Undefined,
            },
            (PropValue::Direct(value), PropValue::Direct(key)) => {
                let found = PathSegment::from_value(&key)
                    .and_then(|seg| resolve_path(&value, std::slice::from_ref(&seg)).cloned());
                PropValue::from_value(found)
            }
            (target, segment) => PropValue::Access {
                target: Box::new(target),
                segment: Box::new(segment),
            },
        }
    }

    /// Bindings whose resolved value this prop reads.
    pub fn dependencies(&self, out: &mut Vec<BindingId>) {
        match self {
            PropValue::Deferred(r) => {
                if !out.contains(&r.owner) {
                    out.push(r.owner);
                }
            }
            PropValue::Object(entries) => entries.iter().for_each(|(_, v)| v.dependencies(out)),
            PropValue::Array(items) | PropValue::Template(items) => {
                items.iter().for_each(|v| v.dependencies(out))
            }
            PropValue::Add(left, right) => {
                left.dependencies(out);
                right.dependencies(out);
            }
            PropValue::Fallback {
                value, fallback, ..
            } => {
                value.dependencies(out);
                fallback.dependencies(out);
            }
            PropValue::Access { target, segment } => {
                target.dependencies(out);
                segment.dependencies(out);
            }
            PropValue::Undefined | PropValue::Direct(_) => {}
        }
    }
}

/// Replace every deferred part with its resolved value.
pub fn settle(value: &PropValue, cache: &ResolutionCache) -> Option<Value> {
    match value {
        PropValue::Undefined => None,
        PropValue::Direct(v) => Some(v.clone()),
        PropValue::Deferred(r) => {
            let owner = cache.binding_value(r.owner)?;
            resolve_path(owner, &r.path).cloned()
        }
        PropValue::Object(entries) => {
            let mut map = Map::new();
            for (key, v) in entries {
                if let Some(v) = settle(v, cache) {
                    map.insert(key.clone(), v);
                }
            }
            Some(Value::Object(map))
        }
        PropValue::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|v| settle(v, cache).unwrap_or(Value::Null))
                .collect(),
        )),
        PropValue::Template(parts) => Some(Value::String(
            parts
                .iter()
                .map(|p| display_value(settle(p, cache).as_ref()))
                .collect(),
        )),
        PropValue::Add(left, right) => {
            let left = settle(left, cache);
            let right = settle(right, cache);
            match (&left, &right) {
                (Some(Value::Number(a)), Some(Value::Number(b))) => {
                    match (a.as_i64(), b.as_i64()) {
                        (Some(a), Some(b)) => Some(Value::from(a.saturating_add(b))),
                        _ => {
                            let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
                            serde_json::Number::from_f64(sum).map(Value::Number)
                        }
                    }
                }
                _ => Some(Value::String(format!(
                    "{}{}",
                    display_value(left.as_ref()),
                    display_value(right.as_ref())
                ))),
            }
        }
        PropValue::Fallback {
            value,
            fallback,
            nullish,
        } => {
            let primary = settle(value, cache);
            let use_fallback = match &primary {
                None | Some(Value::Null) => true,
                Some(v) => !*nullish && !is_truthy(v),
            };
            if use_fallback {
                settle(fallback, cache)
            } else {
                primary
            }
        }
        PropValue::Access { target, segment } => {
            let target = settle(target, cache)?;
            let segment = PathSegment::from_value(&settle(segment, cache)?)?;
            resolve_path(&target, std::slice::from_ref(&segment)).cloned()
        }
    }
}

/// Text form of a value: undefined and null are empty, strings are raw, and
/// everything else is compact JSON.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
