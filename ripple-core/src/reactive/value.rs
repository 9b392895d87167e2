//! Dynamically typed values.
//!
//! Most graphs are statically typed: a `Signal<i32>` only ever holds an
//! `i32`. [`Value`] is for graphs whose shape is only known at runtime, such
//! as configuration loaded from JSON or values handed over from a scripting
//! layer. It can hold functions and references to other reactive values, and
//! a node holding a function can be called to build a new computed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::change::Change;
use super::computed::Computed;
use super::resolve::Resolve;
use super::rx::{Read, Rx};
use super::signal::Signal;
use crate::error::{Error, Result};

/// A callable stored inside a [`Value`].
#[derive(Clone)]
pub struct Func(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl Func {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

/// Functions cannot be compared, so storing one always counts as a change.
impl Change for Func {
    fn differs(&self, _previous: &Self) -> bool {
        true
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Func")
    }
}

/// The runtime type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Func,
    Rx,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Func => "function",
            ValueKind::Rx => "reactive",
        };
        f.write_str(name)
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Func(Func),
    Rx(Rx<Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Func(_) => ValueKind::Func,
            Value::Rx(_) => ValueKind::Rx,
        }
    }

    /// Create a function value.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Value::Func(Func::new(f))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Func(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON, reading through reactive references.
    ///
    /// Functions have no JSON form and become `null`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self.resolve()? {
            Value::Null | Value::Func(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(n) => serde_json::Value::from(n),
            Value::Float(x) => serde_json::Number::from_f64(x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<_>>()?,
            ),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), value.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
            // Resolution never yields a reference.
            Value::Rx(_) => serde_json::Value::Null,
        })
    }
}

impl Change for Value {
    fn differs(&self, previous: &Self) -> bool {
        match (self, previous) {
            (Value::Null, Value::Null) => false,
            (Value::Bool(a), Value::Bool(b)) => a != b,
            (Value::Int(a), Value::Int(b)) => a != b,
            (Value::Float(a), Value::Float(b)) => a.differs(b),
            (Value::Str(a), Value::Str(b)) => a != b,
            (Value::List(a), Value::List(b)) => a.differs(b),
            (Value::Map(a), Value::Map(b)) => a.differs(b),
            (Value::Func(_), Value::Func(_)) => true,
            (Value::Rx(a), Value::Rx(b)) => a.differs(b),
            _ => true,
        }
    }
}

/// Resolves every reference, however deeply nested.
impl Resolve for Value {
    type Output = Value;

    fn resolve(&self) -> Result<Value> {
        match self {
            Value::Rx(rx) => rx.try_get()?.resolve(),
            Value::List(items) => Ok(Value::List(items.resolve()?)),
            Value::Map(entries) => Ok(Value::Map(entries.resolve()?)),
            other => Ok(other.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Func(_) => f.write_str("<function>"),
            Value::Rx(rx) => write!(f, "<{} {}>", rx.node().kind(), rx.id()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.into()),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    &str => Str,
    String => Str,
    Vec<Value> => List,
    BTreeMap<String, Value> => Map,
    Func => Func,
    Rx<Value> => Rx,
    Signal<Value> => Rx,
    Computed<Value> => Rx,
);

fn call_value<R>(callee: &R, args: Vec<Value>) -> Result<Computed<Value>>
where
    R: Read<Value> + Clone,
{
    let label = callee.node().label();
    if !callee.try_get_untracked()?.resolve()?.is_callable() {
        return Err(Error::NotCallable { node: label });
    }

    let callee = callee.clone();
    Ok(Computed::try_new(move || {
        let Value::Func(func) = callee.try_get()?.resolve()? else {
            return Err(Error::NotCallable {
                node: label.clone(),
            });
        };
        let args = args.resolve()?;
        Ok(func.call(&args))
    }))
}

impl Signal<Value> {
    /// Build a computed that calls the function this signal holds.
    ///
    /// The computed re-runs when the function or any reactive argument
    /// changes. Fails with [`Error::NotCallable`] if the signal does not
    /// currently hold a function.
    pub fn call(&self, args: impl IntoIterator<Item = Value>) -> Result<Computed<Value>> {
        call_value(self, args.into_iter().collect())
    }
}

impl Computed<Value> {
    /// Build a computed that calls the function this computed produces.
    pub fn call(&self, args: impl IntoIterator<Item = Value>) -> Result<Computed<Value>> {
        call_value(self, args.into_iter().collect())
    }
}
