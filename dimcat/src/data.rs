use std::fmt::Debug;

use ndarray::{Array, Array1, ArrayD, Axis, Dimension, IxDyn, Zip};
use num_traits::AsPrimitive;
use paste::paste;

use crate::{
    dtype::{DType, Label, Scalar},
    errors::{Error, Result},
};

/// A concrete, in memory, N-dimensional value buffer.
///
/// Strings are stored as `Option<String>` so that missing cells introduced by alignment can be
/// represented. Floats use NaN for missing cells. Integers have no missing value.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Str(ArrayD<Option<String>>),
}

/// Evaluate `$body` with `$array` bound to the inner array, whatever its element type.
macro_rules! each_data {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            Data::I32($array) => $body,
            Data::I64($array) => $body,
            Data::F32($array) => $body,
            Data::F64($array) => $body,
            Data::Str($array) => $body,
        }
    };
}

/// Like `each_data!` but rewraps the resulting array in the same variant.
macro_rules! map_data {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            Data::I32($array) => Data::I32($body),
            Data::I64($array) => Data::I64($body),
            Data::F32($array) => Data::F32($body),
            Data::F64($array) => Data::F64($body),
            Data::Str($array) => Data::Str($body),
        }
    };
}

/// Element level behavior shared by every dtype.
///
pub(crate) trait Element: Clone + PartialEq + Debug {
    fn is_null(&self) -> bool {
        false
    }

    fn to_label(&self) -> Label;

    fn from_label(label: &Label) -> Option<Self>;

    /// Equal, or both missing.
    fn equiv(&self, other: &Self) -> bool {
        self == other || (self.is_null() && other.is_null())
    }
}

impl Element for i32 {
    fn to_label(&self) -> Label {
        Label::Int(*self as i64)
    }

    fn from_label(label: &Label) -> Option<Self> {
        match label {
            Label::Int(value) => i32::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl Element for i64 {
    fn to_label(&self) -> Label {
        Label::Int(*self)
    }

    fn from_label(label: &Label) -> Option<Self> {
        match label {
            Label::Int(value) => Some(*value),
            _ => None,
        }
    }
}

macro_rules! float_element {
    ($type:ty) => {
        impl Element for $type {
            fn is_null(&self) -> bool {
                self.is_nan()
            }

            fn to_label(&self) -> Label {
                Label::Float(*self as f64)
            }

            fn from_label(label: &Label) -> Option<Self> {
                match label {
                    Label::Int(value) => Some(*value as $type),
                    Label::Float(value) => Some(*value as $type),
                    Label::Null => Some(<$type>::NAN),
                    Label::Str(_) => None,
                }
            }
        }
    };
}

float_element!(f32);
float_element!(f64);

impl Element for Option<String> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn to_label(&self) -> Label {
        match self {
            Some(value) => Label::Str(value.clone()),
            None => Label::Null,
        }
    }

    fn from_label(label: &Label) -> Option<Self> {
        match label {
            Label::Str(value) => Some(Some(value.clone())),
            Label::Null => Some(None),
            _ => None,
        }
    }
}

macro_rules! data_from {
    ($variant:ident, $type:ident) => {
        paste! {
            impl<D: Dimension> From<Array<$type, D>> for Data {
                fn from(array: Array<$type, D>) -> Self {
                    Data::$variant(array.into_dyn())
                }
            }

            impl From<Vec<$type>> for Data {
                fn from(values: Vec<$type>) -> Self {
                    Data::$variant(Array1::from_vec(values).into_dyn())
                }
            }

            impl Data {
                /// A 0-dimensional array holding `value`.
                pub fn [<scalar_ $type>](value: $type) -> Self {
                    Data::$variant(ArrayD::from_elem(IxDyn(&[]), value))
                }
            }
        }
    };
}

data_from!(I32, i32);
data_from!(I64, i64);
data_from!(F32, f32);
data_from!(F64, f64);

impl<D: Dimension> From<Array<Option<String>, D>> for Data {
    fn from(array: Array<Option<String>, D>) -> Self {
        Data::Str(array.into_dyn())
    }
}

impl From<Vec<&str>> for Data {
    fn from(values: Vec<&str>) -> Self {
        Data::strings(&values)
    }
}

impl Data {
    /// A 1-D string array.
    ///
    pub fn strings<S: AsRef<str>>(values: &[S]) -> Self {
        let values = values
            .iter()
            .map(|s| Some(s.as_ref().to_string()))
            .collect::<Vec<_>>();

        Data::Str(Array1::from_vec(values).into_dyn())
    }

    /// A 0-dimensional string array.
    ///
    pub fn scalar_str<S: Into<String>>(value: S) -> Self {
        Data::Str(ArrayD::from_elem(IxDyn(&[]), Some(value.into())))
    }

    pub fn dtype(&self) -> DType {
        match self {
            Data::I32(_) => DType::I32,
            Data::I64(_) => DType::I64,
            Data::F32(_) => DType::F32,
            Data::F64(_) => DType::F64,
            Data::Str(_) => DType::Str,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_data!(self, array => array.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }

    /// Cast to another dtype. Numeric casts follow `as` semantics. Strings only cast to
    /// strings.
    ///
    pub fn astype(&self, dtype: DType) -> Result<Data> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }

        let cast = match dtype {
            DType::I32 => Data::I32(self.cast_numeric()?),
            DType::I64 => Data::I64(self.cast_numeric()?),
            DType::F32 => Data::F32(self.cast_numeric()?),
            DType::F64 => Data::F64(self.cast_numeric()?),
            DType::Str => return Err(Error::IncompatibleDtypes(self.dtype(), dtype)),
        };

        Ok(cast)
    }

    fn cast_numeric<U>(&self) -> Result<ArrayD<U>>
    where
        U: Copy + 'static,
        i32: AsPrimitive<U>,
        i64: AsPrimitive<U>,
        f32: AsPrimitive<U>,
        f64: AsPrimitive<U>,
    {
        match self {
            Data::I32(array) => Ok(array.mapv(|v| v.as_())),
            Data::I64(array) => Ok(array.mapv(|v| v.as_())),
            Data::F32(array) => Ok(array.mapv(|v| v.as_())),
            Data::F64(array) => Ok(array.mapv(|v| v.as_())),
            Data::Str(_) => Err(Error::IncompatibleDtypes(DType::Str, DType::F64)),
        }
    }

    /// Concatenate arrays along an existing axis, promoting to a common dtype first.
    ///
    pub fn concatenate(arrays: &[&Data], axis: usize) -> Result<Data> {
        let dtype = DType::common_of(arrays.iter().map(|data| data.dtype()))?
            .ok_or_else(|| Error::ShapeMismatch("nothing to concatenate".into()))?;
        let arrays = arrays
            .iter()
            .map(|data| data.astype(dtype))
            .collect::<Result<Vec<_>>>()?;

        macro_rules! concat_variant {
            ($variant:ident) => {{
                let views = arrays
                    .iter()
                    .filter_map(|data| match data {
                        Data::$variant(array) => Some(array.view()),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                let joined = ndarray::concatenate(Axis(axis), &views)
                    .map_err(|err| Error::ShapeMismatch(err.to_string()))?;

                Data::$variant(joined)
            }};
        }

        let joined = match dtype {
            DType::I32 => concat_variant!(I32),
            DType::I64 => concat_variant!(I64),
            DType::F32 => concat_variant!(F32),
            DType::F64 => concat_variant!(F64),
            DType::Str => concat_variant!(Str),
        };

        Ok(joined)
    }

    /// Select `indices` along `axis`, in the given order.
    ///
    pub fn take(&self, axis: usize, indices: &[usize]) -> Result<Data> {
        let len = self.shape().get(axis).copied().ok_or_else(|| {
            Error::ShapeMismatch(format!("axis {axis} out of bounds for {:?}", self.shape()))
        })?;
        if let Some(bad) = indices.iter().find(|&&i| i >= len) {
            return Err(Error::ShapeMismatch(format!(
                "index {bad} out of bounds for axis {axis} with length {len}"
            )));
        }

        Ok(map_data!(self, array => array.select(Axis(axis), indices)))
    }

    /// Build a new array whose `axis` follows `indexer`: `Some(i)` copies slice `i` of this
    /// array, `None` produces a slice of fill values.
    ///
    /// With no `fill` the missing value for the (possibly promoted) dtype is used.
    ///
    pub fn reindex(
        &self,
        axis: usize,
        indexer: &[Option<usize>],
        fill: Option<&Scalar>,
    ) -> Result<Data> {
        if indexer.iter().all(Option::is_some) {
            let indices = indexer.iter().flatten().copied().collect::<Vec<_>>();
            return self.take(axis, &indices);
        }

        let dtype = self.dtype().promote_for_fill(fill)?;
        let source = self.astype(dtype)?;
        let as_f64 = fill.and_then(Scalar::as_f64);

        let reindexed = match source {
            Data::I32(array) => {
                let fill = match fill {
                    Some(Scalar::Int(value)) => *value as i32,
                    _ => return Err(Error::IncompatibleDtypes(DType::I32, DType::F64)),
                };
                Data::I32(reindex_array(&array, axis, indexer, fill))
            }
            Data::I64(array) => {
                let fill = match fill {
                    Some(Scalar::Int(value)) => *value,
                    _ => return Err(Error::IncompatibleDtypes(DType::I64, DType::F64)),
                };
                Data::I64(reindex_array(&array, axis, indexer, fill))
            }
            Data::F32(array) => {
                let fill = as_f64.map_or(f32::NAN, |v| v as f32);
                Data::F32(reindex_array(&array, axis, indexer, fill))
            }
            Data::F64(array) => {
                let fill = as_f64.unwrap_or(f64::NAN);
                Data::F64(reindex_array(&array, axis, indexer, fill))
            }
            Data::Str(array) => {
                let fill = match fill {
                    Some(Scalar::Str(value)) => Some(value.clone()),
                    _ => None,
                };
                Data::Str(reindex_array(&array, axis, indexer, fill))
            }
        };

        Ok(reindexed)
    }

    /// Broadcast to `shape` following numpy rules (trailing axes aligned, length 1 axes
    /// stretched).
    ///
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Data> {
        let mismatch = || {
            Error::ShapeMismatch(format!(
                "cannot broadcast array of shape {:?} to {:?}",
                self.shape(),
                shape
            ))
        };

        Ok(map_data!(self, array => array
            .broadcast(IxDyn(shape))
            .ok_or_else(mismatch)?
            .to_owned()))
    }

    /// Insert a new axis of length 1 at `axis`.
    ///
    pub fn insert_axis(&self, axis: usize) -> Data {
        map_data!(self, array => array.clone().insert_axis(Axis(axis)))
    }

    /// Reorder axes. `axes[i]` is the current axis that becomes axis `i`.
    ///
    pub fn permuted_axes(&self, axes: &[usize]) -> Data {
        map_data!(self, array => array
            .clone()
            .permuted_axes(IxDyn(axes))
            .as_standard_layout()
            .into_owned())
    }

    /// Same shape and every element equal or both missing. Arrays of different numeric dtypes
    /// are compared after promotion.
    ///
    pub fn equiv(&self, other: &Data) -> bool {
        self.compare(other, Comparison::Equiv)
    }

    /// Same shape and every element equal wherever both sides are present.
    ///
    pub fn notnull_equiv(&self, other: &Data) -> bool {
        self.compare(other, Comparison::NotNullEquiv)
    }

    fn compare(&self, other: &Data, comparison: Comparison) -> bool {
        if self.shape() != other.shape() {
            return false;
        }

        let dtype = match self.dtype().common(other.dtype()) {
            Ok(dtype) => dtype,
            Err(_) => return false,
        };
        let (left, right) = match (self.astype(dtype), other.astype(dtype)) {
            (Ok(left), Ok(right)) => (left, right),
            _ => return false,
        };

        match (&left, &right) {
            (Data::I32(a), Data::I32(b)) => comparison.all(a, b),
            (Data::I64(a), Data::I64(b)) => comparison.all(a, b),
            (Data::F32(a), Data::F32(b)) => comparison.all(a, b),
            (Data::F64(a), Data::F64(b)) => comparison.all(a, b),
            (Data::Str(a), Data::Str(b)) => comparison.all(a, b),
            _ => false,
        }
    }

    /// Replace missing cells with the corresponding cells of `other`, which must have the
    /// same shape.
    ///
    pub fn fillna(&self, other: &Data) -> Result<Data> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch(format!(
                "cannot fill array of shape {:?} from {:?}",
                self.shape(),
                other.shape()
            )));
        }

        let dtype = self.dtype().common(other.dtype())?;
        let filled = match (self.astype(dtype)?, other.astype(dtype)?) {
            (Data::I32(a), Data::I32(_)) => Data::I32(a),
            (Data::I64(a), Data::I64(_)) => Data::I64(a),
            (Data::F32(a), Data::F32(b)) => Data::F32(fillna_array(a, &b)),
            (Data::F64(a), Data::F64(b)) => Data::F64(fillna_array(a, &b)),
            (Data::Str(a), Data::Str(b)) => Data::Str(fillna_array(a, &b)),
            (a, b) => return Err(Error::IncompatibleDtypes(a.dtype(), b.dtype())),
        };

        Ok(filled)
    }

    /// The labels of a 1-D array (a 0-D array gives a single label).
    ///
    pub fn labels(&self) -> Result<Vec<Label>> {
        if self.ndim() > 1 {
            return Err(Error::ShapeMismatch(format!(
                "labels must be 1-dimensional, got shape {:?}",
                self.shape()
            )));
        }

        Ok(each_data!(self, array => array.iter().map(Element::to_label).collect()))
    }

    /// Build a 1-D array of `dtype` from labels.
    ///
    pub fn from_labels(labels: &[Label], dtype: DType) -> Result<Data> {
        fn collect<T: Element>(labels: &[Label], dtype: DType) -> Result<ArrayD<T>> {
            let values = labels
                .iter()
                .map(|label| {
                    T::from_label(label).ok_or_else(|| {
                        Error::InvalidIndexCombination(format!(
                            "label {label} cannot be represented as {dtype}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            ArrayD::from_shape_vec(IxDyn(&[values.len()]), values)
                .map_err(|err| Error::ShapeMismatch(err.to_string()))
        }

        let data = match dtype {
            DType::I32 => Data::I32(collect(labels, dtype)?),
            DType::I64 => Data::I64(collect(labels, dtype)?),
            DType::F32 => Data::F32(collect(labels, dtype)?),
            DType::F64 => Data::F64(collect(labels, dtype)?),
            DType::Str => Data::Str(collect(labels, dtype)?),
        };

        Ok(data)
    }
}

#[derive(Clone, Copy)]
enum Comparison {
    Equiv,
    NotNullEquiv,
}

impl Comparison {
    fn test<T: Element>(self, a: &T, b: &T) -> bool {
        match self {
            Comparison::Equiv => a.equiv(b),
            Comparison::NotNullEquiv => a.is_null() || b.is_null() || a == b,
        }
    }

    fn all<T: Element>(self, a: &ArrayD<T>, b: &ArrayD<T>) -> bool {
        a.iter().zip(b.iter()).all(|(a, b)| self.test(a, b))
    }
}

fn reindex_array<T: Clone>(
    array: &ArrayD<T>,
    axis: usize,
    indexer: &[Option<usize>],
    fill: T,
) -> ArrayD<T> {
    let mut shape = array.shape().to_vec();
    shape[axis] = indexer.len();

    let mut reindexed = ArrayD::from_elem(IxDyn(&shape), fill);
    for (new, old) in indexer.iter().enumerate() {
        if let Some(old) = old {
            reindexed
                .index_axis_mut(Axis(axis), new)
                .assign(&array.index_axis(Axis(axis), *old));
        }
    }

    reindexed
}

fn fillna_array<T: Element>(mut array: ArrayD<T>, other: &ArrayD<T>) -> ArrayD<T> {
    Zip::from(&mut array).and(other).for_each(|a, b| {
        if a.is_null() {
            *a = b.clone();
        }
    });

    array
}
