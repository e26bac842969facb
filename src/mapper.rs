//! Row-to-struct materialization.
//!
//! Each target shape describes itself once as a table of typed setters
//! ([`FromRow::fields`]). [`RowMapper`] matches that table against the
//! cursor's column names when the result set starts, then applies the
//! resolved setters to every row without further name lookups.

use crate::connection::RowSink;
use crate::error::Result;
use crate::value::Value;

/// Typed setter for one member of `T`.
pub type Setter<T> = fn(&mut T, &Value) -> Result<()>;

/// A settable member of a target shape.
pub struct Field<T> {
    pub name: &'static str,
    pub set: Setter<T>,
}

impl<T> Field<T> {
    pub const fn new(name: &'static str, set: Setter<T>) -> Self {
        Self { name, set }
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

/// A shape that rows can be materialized into.
///
/// Implement with [`from_row!`](crate::from_row) rather than by hand.
pub trait FromRow: Default {
    fn fields() -> Vec<Field<Self>>;
}

/// Drains a cursor into `T` instances, in cursor order.
pub struct RowMapper<T: FromRow> {
    fields: Vec<Field<T>>,
    /// (column index, setter) for every field that has a same-named column
    plan: Vec<(usize, Field<T>)>,
    rows: Vec<T>,
}

impl<T: FromRow> RowMapper<T> {
    pub fn new() -> Self {
        Self {
            fields: T::fields(),
            plan: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Resolve which column feeds which field. Unmatched fields keep their default.
    fn resolve(&mut self, columns: &[String]) {
        self.plan = self
            .fields
            .iter()
            .filter_map(|field| {
                columns
                    .iter()
                    .position(|c| c == field.name)
                    .map(|idx| (idx, *field))
            })
            .collect();
    }

    /// Materialize one row.
    pub fn map_row(&self, values: &[Value]) -> Result<T> {
        let mut item = T::default();
        for (idx, field) in &self.plan {
            match values.get(*idx) {
                Some(value) if !value.is_null() => (field.set)(&mut item, value)?,
                _ => {}
            }
        }
        Ok(item)
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

impl<T: FromRow> Default for RowMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromRow> RowSink for RowMapper<T> {
    fn columns(&mut self, names: &[String]) -> Result<()> {
        self.resolve(names);
        Ok(())
    }

    fn row(&mut self, values: &[Value]) -> Result<()> {
        let item = self.map_row(values)?;
        self.rows.push(item);
        Ok(())
    }
}

/// Implement [`FromRow`] for a struct by listing its settable fields.
///
/// Each listed field is populated from the column with exactly the same
/// name, converted through [`FromValue`](crate::FromValue).
///
/// ```
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
///     age: Option<i32>,
/// }
///
/// repokit::from_row!(User { id, name, age });
/// ```
#[macro_export]
macro_rules! from_row {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::FromRow for $ty {
            fn fields() -> ::std::vec::Vec<$crate::Field<Self>> {
                ::std::vec![
                    $(
                        $crate::Field::new(
                            ::std::stringify!($field),
                            |target: &mut Self, value: &$crate::Value| {
                                target.$field = $crate::FromValue::from_value(value)
                                    .map_err(|e| e.for_column(::std::stringify!($field)))?;
                                ::std::result::Result::Ok(())
                            },
                        )
                    ),*
                ]
            }
        }
    };
}
