use std::fmt;
use std::marker::PhantomData;

use crate::persistent::PersistentMap;
use crate::value::{PlainMap, Value};

use super::schema::Schema;
use super::typed::TypedMap;

/// A typed handle on one field of schema `S` holding values of type `T`.
///
/// Handles are generated by `#[derive(Schema)]` as associated constants
/// named after the field in upper case, so a typed read or write can only
/// name a field the schema declares.
pub struct Field<S, T> {
    name: &'static str,
    _marker: PhantomData<fn() -> (S, T)>,
}

impl<S, T> Field<S, T> {
    /// Creates a handle for the field called `name`.
    ///
    /// Generated code is the intended caller; the name is not checked here.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The field's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<S, T> Clone for Field<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> Copy for Field<S, T> {}

impl<S, T> fmt::Debug for Field<S, T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Field").field(&self.name).finish()
    }
}

/// Conversion between a field's Rust type and the stored [`Value`].
///
/// `from_value` returns `None` when the stored value has another shape.
pub trait FieldValue: Sized {
    /// Reads the typed value out of a stored value.
    fn from_value(value: &Value) -> Option<Self>;

    /// Wraps the typed value for storage.
    fn into_value(self) -> Value;
}

impl FieldValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn into_value(self) -> Value {
        self
    }
}

impl FieldValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FieldValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl FieldValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int().and_then(|int| Self::try_from(int).ok())
    }

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl FieldValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FieldValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(T::into_value).collect())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, T::into_value)
    }
}

impl FieldValue for PersistentMap<String, Value> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Map(map) => Some(map.clone()),
            Value::Plain(plain) => Some(
                plain
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Map(self)
    }
}

impl FieldValue for PlainMap {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Plain(plain) => Some(plain.clone()),
            Value::Map(map) => Some(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Plain(self)
    }
}

impl<S: Schema> FieldValue for TypedMap<S> {
    fn from_value(value: &Value) -> Option<Self> {
        Self::from_map(PersistentMap::from_value(value)?).ok()
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::from(7), Some(7))]
    #[case(Value::from(i64::MAX), None)]
    #[case(Value::from("7"), None)]
    fn test_i32_from_value(#[case] value: Value, #[case] expected: Option<i32>) {
        assert_eq!(i32::from_value(&value), expected);
    }

    #[rstest]
    fn test_option_maps_null_to_none() {
        assert_eq!(Option::<String>::from_value(&Value::Null), Some(None));
        assert_eq!(Option::<String>::from_value(&Value::from(1)), None);
        assert_eq!(Some(3_i64).into_value(), Value::from(3));
    }

    #[rstest]
    fn test_vec_requires_every_element() {
        let mixed = Value::List(vec![Value::from(1), Value::from("two")]);
        let ints = Value::List(vec![Value::from(1), Value::from(2)]);
        assert_eq!(Vec::<i64>::from_value(&mixed), None);
        assert_eq!(Vec::<i64>::from_value(&ints), Some(vec![1, 2]));
    }

    #[rstest]
    fn test_mapping_conversions_cross_representation() {
        let plain = Value::Plain(PlainMap::from([("a".to_string(), Value::from(1))]));
        let map = PersistentMap::<String, Value>::from_value(&plain);
        assert_eq!(map.map(FieldValue::into_value), Some(plain));
    }

    #[rstest]
    fn test_field_is_copy_and_named() {
        const FIELD: Field<(), i64> = Field::new("count");
        let copy = FIELD;
        assert_eq!(FIELD.name(), copy.name());
        assert_eq!(format!("{FIELD:?}"), "Field(\"count\")");
    }
}
