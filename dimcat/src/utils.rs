//! Value equivalence and dictionary compatibility checks.

use crate::{data::Data, ordered::OrderedMap};

/// A single metadata value attached to a variable or dataset.
///
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<AttrValue>),
    Array(Data),
}

/// String keyed metadata, in insertion order.
pub type Attrs = OrderedMap<String, AttrValue>;

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<Data> for AttrValue {
    fn from(value: Data) -> Self {
        AttrValue::Array(value)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(values: Vec<T>) -> Self {
        AttrValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(value) => AttrValue::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => AttrValue::Int(value),
                None => AttrValue::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(value) => AttrValue::Str(value),
            Value::Array(values) => {
                AttrValue::List(values.into_iter().map(AttrValue::from).collect())
            }
            Value::Object(map) => AttrValue::Str(Value::Object(map).to_string()),
        }
    }
}

impl AttrValue {
    fn is_null(&self) -> bool {
        match self {
            AttrValue::Null => true,
            AttrValue::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(value) => Some(*value as f64),
            AttrValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Array form of this value, for comparing against an `Array`.
    fn to_data(&self) -> Option<Data> {
        match self {
            AttrValue::Int(value) => Some(Data::scalar_i64(*value)),
            AttrValue::Float(value) => Some(Data::scalar_f64(*value)),
            AttrValue::Str(value) => Some(Data::scalar_str(value.as_str())),
            AttrValue::Array(data) => Some(data.clone()),
            AttrValue::List(values) => {
                let scalars = values
                    .iter()
                    .map(|value| match value {
                        AttrValue::List(_) | AttrValue::Array(_) => None,
                        value => value.to_data(),
                    })
                    .collect::<Option<Vec<_>>>()?;
                let views = scalars.iter().map(|data| data.insert_axis(0)).collect::<Vec<_>>();
                let views = views.iter().collect::<Vec<_>>();
                if views.is_empty() {
                    return Some(Data::from(Vec::<f64>::new()));
                }

                Data::concatenate(&views, 0).ok()
            }
            AttrValue::Null | AttrValue::Bool(_) => None,
        }
    }
}

/// Compare two values for equivalence.
///
/// Equal values, values that are both missing, and numbers equal across int/float are
/// equivalent. Arrays compare elementwise, and lists compare pairwise (or elementwise against an
/// array).
///
pub fn equivalent(first: &AttrValue, second: &AttrValue) -> bool {
    match (first, second) {
        (AttrValue::Array(_), _) | (_, AttrValue::Array(_)) => {
            match (first.to_data(), second.to_data()) {
                (Some(a), Some(b)) => a.equiv(&b),
                _ => false,
            }
        }
        (AttrValue::List(a), AttrValue::List(b)) => list_equiv(a, b),
        (a, b) if a.is_null() && b.is_null() => true,
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
    }
}

/// Equal length and pairwise `equivalent`.
///
pub fn list_equiv(first: &[AttrValue], second: &[AttrValue]) -> bool {
    first.len() == second.len()
        && first
            .iter()
            .zip(second.iter())
            .all(|(a, b)| equivalent(a, b))
}

/// Same keys and every pair of values passes `compat`.
///
pub fn dict_equiv<F>(first: &Attrs, second: &Attrs, compat: F) -> bool
where
    F: Fn(&AttrValue, &AttrValue) -> bool,
{
    first.len() == second.len()
        && first.iter().all(|(key, value)| match second.get(key) {
            Some(other) => compat(value, other),
            None => false,
        })
}

/// The first key present in both mappings whose values fail `compat`, if any.
///
pub fn update_safety_check<'a, F>(first: &'a Attrs, second: &Attrs, compat: F) -> Option<&'a str>
where
    F: Fn(&AttrValue, &AttrValue) -> bool,
{
    first
        .iter()
        .find(|(key, value)| match second.get(key.as_str()) {
            Some(other) => !compat(*value, other),
            None => false,
        })
        .map(|(key, _)| key.as_str())
}

/// Union of two mappings, failing with the offending key if they disagree on a shared key.
///
pub fn compat_dict_union<F>(
    first: &Attrs,
    second: &Attrs,
    compat: F,
) -> std::result::Result<Attrs, String>
where
    F: Fn(&AttrValue, &AttrValue) -> bool,
{
    if let Some(key) = update_safety_check(first, second, compat) {
        return Err(key.to_string());
    }

    let mut union = first.clone();
    union.extend(second.iter().map(|(k, v)| (k.clone(), v.clone())));

    Ok(union)
}

/// Keys of `first` that are also in `second` with compatible values.
///
pub fn compat_dict_intersection<F>(first: &Attrs, second: &Attrs, compat: F) -> Attrs
where
    F: Fn(&AttrValue, &AttrValue) -> bool,
{
    first
        .iter()
        .filter(|(key, value)| match second.get(key.as_str()) {
            Some(other) => compat(*value, other),
            None => false,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
