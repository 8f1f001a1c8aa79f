use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// The element types a value buffer can hold.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    I32,
    I64,
    F32,
    F64,
    Str,
}

impl DType {
    pub fn is_integer(self) -> bool {
        matches!(self, DType::I32 | DType::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_numeric(self) -> bool {
        self != DType::Str
    }

    /// The smallest dtype both `self` and `other` can be cast to without loss.
    ///
    /// Mixing integers with single precision floats goes to `F64`, the same as numpy does.
    ///
    pub fn common(self, other: DType) -> Result<DType> {
        use DType::*;

        let common = match (self, other) {
            (a, b) if a == b => a,
            (I32, I64) | (I64, I32) => I64,
            (F32, F64) | (F64, F32) => F64,
            (I32 | I64, F32 | F64) | (F32 | F64, I32 | I64) => F64,
            (a, b) => return Err(Error::IncompatibleDtypes(a, b)),
        };

        Ok(common)
    }

    /// Fold `common` over a sequence of dtypes. `None` for an empty sequence.
    ///
    pub fn common_of<I>(dtypes: I) -> Result<Option<DType>>
    where
        I: IntoIterator<Item = DType>,
    {
        let mut common = None;
        for dtype in dtypes {
            common = Some(match common {
                None => dtype,
                Some(current) => DType::common(current, dtype)?,
            });
        }

        Ok(common)
    }

    /// The dtype needed to represent a missing value alongside values of this dtype.
    ///
    /// Integers have no missing value so they become `F64` holding NaN. Floats use NaN and
    /// strings use `None`.
    ///
    pub fn promote_for_missing(self) -> DType {
        match self {
            DType::I32 | DType::I64 => DType::F64,
            dtype => dtype,
        }
    }

    /// The dtype needed to hold values of this dtype alongside `fill`, or `None` to fill with
    /// missing values.
    ///
    pub fn promote_for_fill(self, fill: Option<&Scalar>) -> Result<DType> {
        match (self, fill) {
            (dtype, None) => Ok(dtype.promote_for_missing()),
            (DType::I32, Some(Scalar::Int(value))) => {
                if i32::try_from(*value).is_ok() {
                    Ok(DType::I32)
                } else {
                    Ok(DType::I64)
                }
            }
            (DType::I64, Some(Scalar::Int(_))) => Ok(DType::I64),
            (DType::I32 | DType::I64, Some(Scalar::Float(_))) => Ok(DType::F64),
            (DType::F32 | DType::F64, Some(Scalar::Int(_) | Scalar::Float(_))) => Ok(self),
            (DType::Str, Some(Scalar::Str(_))) => Ok(DType::Str),
            (dtype, Some(scalar)) => Err(Error::IncompatibleDtypes(dtype, scalar.dtype())),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::Str => "str",
        };

        write!(f, "{name}")
    }
}

/// A single value used to fill cells introduced by alignment.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Int(_) => DType::I64,
            Scalar::Float(_) => DType::F64,
            Scalar::Str(_) => DType::Str,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::Str(_) => None,
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

/// A hashable, totally ordered view of one coordinate label.
///
/// Floats compare by value with all NaNs equal to each other, so labels can key hash maps
/// during index lookups and be sorted for outer joins. Ordering puts numbers first, then
/// strings, then nulls.
///
#[derive(Clone, Debug)]
pub enum Label {
    Int(i64),
    Float(f64),
    Str(String),
    Null,
}

impl Label {
    fn rank(&self) -> u8 {
        match self {
            Label::Int(_) | Label::Float(_) => 0,
            Label::Str(_) => 1,
            Label::Null => 2,
        }
    }

    fn canonical(value: f64) -> f64 {
        if value.is_nan() {
            f64::NAN
        } else if value == 0.0 {
            0.0
        } else {
            value
        }
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Label::Int(a), Label::Int(b)) => a.cmp(b),
            (Label::Float(a), Label::Float(b)) => {
                Label::canonical(*a).total_cmp(&Label::canonical(*b))
            }
            // Ints sort before floats of equal value so Eq stays consistent with Ord
            (Label::Int(a), Label::Float(b)) => (*a as f64)
                .total_cmp(&Label::canonical(*b))
                .then(Ordering::Less),
            (Label::Float(a), Label::Int(b)) => Label::canonical(*a)
                .total_cmp(&(*b as f64))
                .then(Ordering::Greater),
            (Label::Str(a), Label::Str(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Label::Int(value) => {
                0u8.hash(state);
                value.hash(state);
            }
            Label::Float(value) => {
                1u8.hash(state);
                Label::canonical(*value).to_bits().hash(state);
            }
            Label::Str(value) => {
                2u8.hash(state);
                value.hash(state);
            }
            Label::Null => 3u8.hash(state),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(value) => write!(f, "{value}"),
            Label::Float(value) => write!(f, "{value}"),
            Label::Str(value) => write!(f, "{value:?}"),
            Label::Null => write!(f, "null"),
        }
    }
}
