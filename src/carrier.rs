//! Argument carriers.
//!
//! A carrier is any flat, named-member object that can supply parameter
//! values. The binder only ever asks a carrier for one member by name.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{RepositoryError, Result};
use crate::value::{JsonValue, Value};

/// Named member lookup over a plain argument object.
pub trait Carrier {
    /// Look up the member called `name`, if the carrier has one.
    fn member(&self, name: &str) -> Option<Value>;
}

/// An ordered, inline list of named argument values.
///
/// Usually built with the [`params!`](crate::params) macro.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    members: SmallVec<[(String, Value); 4]>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member. A later member with the same name shadows an earlier one.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.members.push((name.into(), value.into()));
    }

    /// Builder-style variant of [`Params::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Flatten any serializable struct or map into a carrier.
    pub fn from_serialize<T: Serialize + ?Sized>(source: &T) -> Result<Self> {
        let json = serde_json::to_value(source)
            .map_err(|e| RepositoryError::BindingError(format!("cannot serialize carrier: {}", e)))?;
        match json {
            JsonValue::Object(map) => Ok(Self {
                members: map
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            }),
            other => Err(RepositoryError::BindingError(format!(
                "carrier must serialize to an object, got {}",
                other
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Carrier for Params {
    fn member(&self, name: &str) -> Option<Value> {
        self.members
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

impl<V> Carrier for HashMap<String, V>
where
    V: Clone + Into<Value>,
{
    fn member(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Into::into)
    }
}

impl<V> Carrier for BTreeMap<String, V>
where
    V: Clone + Into<Value>,
{
    fn member(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Into::into)
    }
}

impl Carrier for serde_json::Map<String, JsonValue> {
    fn member(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::from_json)
    }
}

/// Only JSON objects have members.
impl Carrier for JsonValue {
    fn member(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.member(name))
    }
}

/// Build a [`Params`] carrier from `name: value` pairs.
///
/// ```
/// let args = repokit::params! { id: 7, name: "alice" };
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::new()
    };
    ($($name:ident : $value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $( params.push(stringify!($name), $value); )+
        params
    }};
}
