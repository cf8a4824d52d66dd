//! # Dynamic Values
//!
//! `Val` is the argument and result type of every remote operation. It is
//! pure data: anything that can be a `Val` can cross the wire.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Val {
    Unit,
    Bool(bool),
    S64(i64),
    F64(f64),
    String(String),
    List(Vec<Val>),
    Map(BTreeMap<String, Val>),
}

impl Val {
    /// False if a NaN or infinite `F64` appears anywhere inside. Those have no
    /// wire encoding.
    pub fn is_finite(&self) -> bool {
        match self {
            Val::F64(f) => f.is_finite(),
            Val::List(items) => items.iter().all(Val::is_finite),
            Val::Map(entries) => entries.values().all(Val::is_finite),
            _ => true,
        }
    }

    /// Short type name, used in diagnostics.
    pub fn desc(&self) -> &'static str {
        match self {
            Val::Unit => "unit",
            Val::Bool(_) => "bool",
            Val::S64(_) => "s64",
            Val::F64(_) => "f64",
            Val::String(_) => "string",
            Val::List(_) => "list",
            Val::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_s64(&self) -> Option<i64> {
        match self {
            Val::S64(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats; nothing else converts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::F64(v) => Some(*v),
            Val::S64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Val]> {
        match self {
            Val::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Val>> {
        match self {
            Val::Map(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<()> for Val {
    fn from(_: ()) -> Self { Val::Unit }
}

impl From<bool> for Val {
    fn from(v: bool) -> Self { Val::Bool(v) }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self { Val::S64(v) }
}

impl From<i32> for Val {
    fn from(v: i32) -> Self { Val::S64(v as i64) }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self { Val::F64(v) }
}

impl From<&str> for Val {
    fn from(v: &str) -> Self { Val::String(v.to_string()) }
}

impl From<String> for Val {
    fn from(v: String) -> Self { Val::String(v) }
}

impl<T: Into<Val>> From<Vec<T>> for Val {
    fn from(items: Vec<T>) -> Self {
        Val::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Val>> for Val {
    fn from(fields: BTreeMap<String, Val>) -> Self { Val::Map(fields) }
}
