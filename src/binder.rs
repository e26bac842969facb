//! Positional-to-named parameter binding.
//!
//! Placeholders are `@identifier` tokens in statement text. Each distinct
//! placeholder, in first-seen order, is resolved against the carrier list
//! by member name and becomes one [`Binding`].

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

use crate::carrier::Carrier;
use crate::error::{RepositoryError, Result};
use crate::value::Value;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\w+").expect("Failed to compile placeholder pattern"));

/// Inline storage for the common case of a handful of parameters.
pub type Bindings = SmallVec<[Binding; 8]>;

/// A placeholder name (with its `@`) and the value bound to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Value,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How the carrier cursor moves between placeholders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CarrierWalk {
    /// Placeholder `n` is resolved from carrier `n`.
    #[default]
    PerPlaceholder,
    /// Placeholder `n` is resolved from carrier `2n`; the carrier after each
    /// resolved one is skipped. Kept for callers that depend on that layout.
    DoubleAdvance,
}

impl CarrierWalk {
    #[inline]
    fn stride(self) -> usize {
        match self {
            CarrierWalk::PerPlaceholder => 1,
            CarrierWalk::DoubleAdvance => 2,
        }
    }
}

/// Resolves statement placeholders against argument carriers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParameterBinder {
    walk: CarrierWalk,
}

impl ParameterBinder {
    pub fn new(walk: CarrierWalk) -> Self {
        Self { walk }
    }

    pub fn walk(&self) -> CarrierWalk {
        self.walk
    }

    /// Distinct placeholders in first-occurrence order, `@` included.
    pub fn placeholders(sql: &str) -> SmallVec<[&str; 8]> {
        let mut found: SmallVec<[&str; 8]> = SmallVec::new();
        for m in PLACEHOLDER.find_iter(sql) {
            let token = m.as_str();
            if !found.contains(&token) {
                found.push(token);
            }
        }
        found
    }

    /// Bind every placeholder in `sql` to a value taken from `carriers`.
    ///
    /// Statements without placeholders bind nothing and ignore the carriers.
    pub fn bind(&self, sql: &str, carriers: &[&dyn Carrier]) -> Result<Bindings> {
        let placeholders = Self::placeholders(sql);
        let mut bindings = Bindings::new();
        if placeholders.is_empty() {
            return Ok(bindings);
        }

        let stride = self.walk.stride();
        for (i, placeholder) in placeholders.iter().enumerate() {
            let cursor = i * stride;
            let carrier = carriers.get(cursor).ok_or_else(|| {
                RepositoryError::BindingError(format!(
                    "no argument left for {} (needs argument #{}, got {})",
                    placeholder,
                    cursor + 1,
                    carriers.len()
                ))
            })?;

            let member = &placeholder[1..];
            let value = carrier.member(member).ok_or_else(|| {
                RepositoryError::BindingError(format!(
                    "argument #{} has no member named '{}'",
                    cursor + 1,
                    member
                ))
            })?;

            tracing::trace!(parameter = %placeholder, argument = cursor, "bound parameter");
            bindings.push(Binding::new(*placeholder, value));
        }

        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn test_placeholders_dedup_in_order() {
        let found = ParameterBinder::placeholders(
            "select * from t where a = @a or b = @b or a2 = @a and c = @c_1",
        );
        assert_eq!(found.as_slice(), &["@a", "@b", "@c_1"]);
    }

    #[test]
    fn test_no_placeholders_ignores_carriers() {
        let binder = ParameterBinder::default();
        let junk = params! { x: 1 };
        let bindings = binder.bind("select 1", &[&junk, &junk]).unwrap();
        assert!(bindings.is_empty());
        assert!(binder.bind("select 1", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_single_placeholder_single_carrier() {
        let binder = ParameterBinder::default();
        let args = params! { id: 7 };
        let bindings = binder
            .bind("select * from users where id = @id", &[&args])
            .unwrap();
        assert_eq!(bindings.as_slice(), &[Binding::new("@id", 7)]);
    }

    #[test]
    fn test_per_placeholder_walk_uses_one_carrier_each() {
        let binder = ParameterBinder::new(CarrierWalk::PerPlaceholder);
        let x = params! { x: 1 };
        let y = params! { y: 2 };
        let bindings = binder
            .bind("update t set x=@x where y=@y", &[&x, &y])
            .unwrap();
        assert_eq!(
            bindings.as_slice(),
            &[Binding::new("@x", 1), Binding::new("@y", 2)]
        );
    }

    #[test]
    fn test_repeated_placeholder_binds_once() {
        let binder = ParameterBinder::default();
        let args = params! { id: 1 };
        let bindings = binder
            .bind("select * from t where a = @id or b = @id", &[&args])
            .unwrap();
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn test_double_advance_walk_skips_every_other_carrier() {
        let binder = ParameterBinder::new(CarrierWalk::DoubleAdvance);
        let x = params! { x: 1 };
        let skipped = params! { y: 99 };
        let y = params! { y: 2 };
        let bindings = binder
            .bind("update t set x=@x where y=@y", &[&x, &skipped, &y])
            .unwrap();
        assert_eq!(
            bindings.as_slice(),
            &[Binding::new("@x", 1), Binding::new("@y", 2)]
        );
    }

    #[test]
    fn test_double_advance_walk_exhausts_on_two_carriers() {
        let binder = ParameterBinder::new(CarrierWalk::DoubleAdvance);
        let x = params! { x: 1 };
        let y = params! { y: 2 };
        let err = binder
            .bind("update t set x=@x where y=@y", &[&x, &y])
            .unwrap_err();
        assert!(matches!(err, RepositoryError::BindingError(_)));
    }

    #[test]
    fn test_double_advance_walk_single_placeholder() {
        let binder = ParameterBinder::new(CarrierWalk::DoubleAdvance);
        let args = params! { id: 7 };
        let bindings = binder
            .bind("select * from users where id = @id", &[&args])
            .unwrap();
        assert_eq!(bindings.as_slice(), &[Binding::new("@id", 7)]);
    }

    #[test]
    fn test_missing_member_is_binding_error() {
        let binder = ParameterBinder::default();
        let args = params! { name: "x" };
        let err = binder
            .bind("select * from t where id = @id", &[&args])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter binding error: argument #1 has no member named 'id'"
        );
    }

    #[test]
    fn test_exhausted_carriers_is_binding_error() {
        let binder = ParameterBinder::default();
        let x = params! { x: 1 };
        let err = binder
            .bind("update t set x=@x where y=@y", &[&x])
            .unwrap_err();
        assert!(matches!(err, RepositoryError::BindingError(_)));
        assert!(binder.bind("select @a", &[]).is_err());
    }

    #[test]
    fn test_binding_does_not_touch_carriers() {
        let binder = ParameterBinder::default();
        let args = params! { id: 5 };
        let before = args.clone();
        binder.bind("select @id", &[&args]).unwrap();
        assert_eq!(args, before);
    }
}
