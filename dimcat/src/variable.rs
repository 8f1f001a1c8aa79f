use std::{collections::HashSet, sync::Arc};

use crate::{
    data::Data,
    dtype::{DType, Scalar},
    errors::{Error, Result},
    helpers::inverse_permutation,
    lazy::{lazy_array_equiv, Buffer, LazyData},
    merge::{broadcast_dimension_size, merge_attrs},
    options::{CombineAttrs, Compat},
    utils::{dict_equiv, equivalent, Attrs},
};

/// A named-dimension array: an ordered tuple of dimension names over a value buffer, plus
/// metadata.
///
/// The buffer may be deferred. Shape operations on a deferred variable stay deferred; only
/// `compute` and `load` run the computation.
///
#[derive(Clone, Debug)]
pub struct Variable {
    dims: Vec<String>,
    buffer: Buffer,
    pub attrs: Attrs,
    pub encoding: Attrs,
}

pub(crate) fn to_dims<I, S>(dims: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    dims.into_iter().map(Into::into).collect()
}

impl Variable {
    /// A variable over materialized values.
    ///
    pub fn new<I, S, T>(dims: I, data: T) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        T: Into<Data>,
    {
        Self::from_buffer(to_dims(dims), Buffer::from(data.into()))
    }

    /// A variable over deferred values.
    ///
    pub fn lazy<I, S>(dims: I, lazy: LazyData) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_buffer(to_dims(dims), Buffer::from(lazy))
    }

    pub(crate) fn from_buffer(dims: Vec<String>, buffer: Buffer) -> Result<Self> {
        if dims.len() != buffer.shape().len() {
            return Err(Error::DimensionMismatch {
                dims,
                reason: format!(
                    "number of dimensions does not match data with shape {:?}",
                    buffer.shape()
                ),
            });
        }
        let unique = dims.iter().collect::<HashSet<_>>();
        if unique.len() != dims.len() {
            return Err(Error::DimensionMismatch {
                dims,
                reason: "dimension names must be unique".into(),
            });
        }

        Ok(Self {
            dims,
            buffer,
            attrs: Attrs::new(),
            encoding: Attrs::new(),
        })
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;

        self
    }

    pub fn with_encoding(mut self, encoding: Attrs) -> Self {
        self.encoding = encoding;

        self
    }

    fn with_buffer(&self, dims: Vec<String>, buffer: Buffer) -> Self {
        Self {
            dims,
            buffer,
            attrs: self.attrs.clone(),
            encoding: self.encoding.clone(),
        }
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        self.buffer.shape()
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn is_lazy(&self) -> bool {
        self.buffer.is_lazy()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.axis(dim).map(|axis| self.shape()[axis])
    }

    /// (dimension, size) pairs in dimension order.
    ///
    pub fn sizes(&self) -> impl Iterator<Item = (&String, usize)> {
        self.dims.iter().zip(self.shape().iter().copied())
    }

    /// The values, computing them if deferred. Nothing is cached.
    ///
    pub fn compute(&self) -> Result<Arc<Data>> {
        self.buffer.compute()
    }

    /// Compute deferred values and keep them.
    ///
    pub fn load(&mut self) -> Result<()> {
        if self.buffer.is_lazy() {
            tracing::trace!(dims = ?self.dims, "materializing deferred variable");
            self.buffer = self.buffer.materialize()?;
        }

        Ok(())
    }

    /// Reorder dimensions. `dims` must be a permutation of the current dimensions.
    ///
    pub fn transpose(&self, dims: &[String]) -> Result<Variable> {
        if dims == self.dims.as_slice() {
            return Ok(self.clone());
        }

        let axes = dims
            .iter()
            .map(|dim| self.axis(dim))
            .collect::<Option<Vec<_>>>()
            .filter(|axes| {
                axes.len() == self.ndim() && axes.iter().collect::<HashSet<_>>().len() == axes.len()
            })
            .ok_or_else(|| Error::DimensionMismatch {
                dims: dims.to_vec(),
                reason: format!("must be a permutation of {:?}", self.dims),
            })?;

        let shape = axes.iter().map(|&axis| self.shape()[axis]).collect();
        let buffer = self
            .buffer
            .map(shape, self.dtype(), move |data| Ok(data.permuted_axes(&axes)))?;

        Ok(self.with_buffer(dims.to_vec(), buffer))
    }

    /// Broadcast to `dims` with sizes `shape`. New dimensions are added, then everything is
    /// transposed into `dims` order. Current dimensions must all appear in `dims` and keep
    /// their sizes.
    ///
    pub fn set_dims(&self, dims: &[String], shape: &[usize]) -> Result<Variable> {
        if dims.len() != shape.len() {
            return Err(Error::DimensionMismatch {
                dims: dims.to_vec(),
                reason: format!("got {} sizes", shape.len()),
            });
        }
        if let Some(missing) = self.dims.iter().find(|dim| !dims.contains(dim)) {
            return Err(Error::DimensionMismatch {
                dims: dims.to_vec(),
                reason: format!("missing existing dimension {missing:?}"),
            });
        }
        if dims == self.dims.as_slice() {
            return Ok(self.clone());
        }

        let (mut expanded_dims, mut expanded_shape): (Vec<_>, Vec<_>) = dims
            .iter()
            .zip(shape.iter())
            .filter(|(dim, _)| !self.has_dim(dim))
            .map(|(dim, size)| (dim.clone(), *size))
            .unzip();

        let expanded = if expanded_dims.is_empty() {
            self.clone()
        } else {
            expanded_dims.extend(self.dims.iter().cloned());
            expanded_shape.extend(self.shape().iter().copied());

            let target = expanded_shape.clone();
            let buffer = self.buffer.map(expanded_shape, self.dtype(), move |data| {
                data.broadcast_to(&target)
            })?;

            self.with_buffer(expanded_dims, buffer)
        };

        expanded.transpose(dims)
    }

    /// Add a leading dimension of length 1.
    ///
    pub fn expand_dims(&self, dim: &str) -> Result<Variable> {
        let mut dims = vec![dim.to_string()];
        dims.extend(self.dims.iter().cloned());
        let mut shape = vec![1];
        shape.extend(self.shape().iter().copied());

        self.set_dims(&dims, &shape)
    }

    /// Rearrange the values along `dim` to follow `indexer`, filling `None` slots with `fill`
    /// (or the missing value).
    ///
    pub fn reindex(
        &self,
        dim: &str,
        indexer: Vec<Option<usize>>,
        fill: Option<&Scalar>,
    ) -> Result<Variable> {
        let axis = self.axis(dim).ok_or_else(|| Error::DimensionMismatch {
            dims: self.dims.clone(),
            reason: format!("no dimension {dim:?} to reindex"),
        })?;

        let dtype = if indexer.iter().all(Option::is_some) {
            self.dtype()
        } else {
            self.dtype().promote_for_fill(fill)?
        };
        let mut shape = self.shape().to_vec();
        shape[axis] = indexer.len();

        let fill = fill.cloned();
        let buffer = self.buffer.map(shape, dtype, move |data| {
            data.reindex(axis, &indexer, fill.as_ref())
        })?;

        Ok(self.with_buffer(self.dims.clone(), buffer))
    }

    /// Concatenate variables along `dim`.
    ///
    /// If the first variable has `dim` the variables are joined along it, otherwise they are
    /// stacked along a new leading `dim`. All variables must share dimensions. With `positions`
    /// element `i` of variable `j` lands at `positions[j][i]`.
    ///
    pub fn concat(
        variables: &[&Variable],
        dim: &str,
        positions: Option<&[Vec<usize>]>,
        combine_attrs: &CombineAttrs,
    ) -> Result<Variable> {
        let first = variables.first().ok_or(Error::EmptyInput)?;
        if let Some(other) = variables.iter().find(|var| var.dims != first.dims) {
            return Err(Error::DimensionMismatch {
                dims: other.dims.clone(),
                reason: format!(
                    "variable has dimensions {:?} but first variable has dimensions {:?}",
                    other.dims, first.dims
                ),
            });
        }

        let (dims, axis, stack) = match first.axis(dim) {
            Some(axis) => (first.dims.clone(), axis, false),
            None => {
                let mut dims = vec![dim.to_string()];
                dims.extend(first.dims.iter().cloned());
                (dims, 0, true)
            }
        };

        let mut shape = first.shape().to_vec();
        if stack {
            shape.insert(0, 1);
        }
        let mut total = 0;
        for var in variables {
            let mut var_shape = var.shape().to_vec();
            if stack {
                var_shape.insert(0, 1);
            }
            let other_axes_match = var_shape
                .iter()
                .zip(shape.iter())
                .enumerate()
                .all(|(i, (a, b))| i == axis || a == b);
            if !other_axes_match {
                return Err(Error::ShapeMismatch(format!(
                    "cannot concatenate shape {:?} with {:?} along {dim:?}",
                    var.shape(),
                    first.shape()
                )));
            }
            total += var_shape[axis];
        }
        shape[axis] = total;

        let order = match positions {
            Some(positions) => Some(inverse_permutation(positions, shape[axis])?),
            None => None,
        };
        let dtype = DType::common_of(variables.iter().map(|var| var.dtype()))?
            .ok_or(Error::EmptyInput)?;
        let buffers = variables.iter().map(|var| var.buffer.clone()).collect();
        let buffer = Buffer::combine(buffers, shape, dtype, move |arrays| {
            let joined = if stack {
                let expanded = arrays.iter().map(|data| data.insert_axis(0)).collect::<Vec<_>>();
                Data::concatenate(&expanded.iter().collect::<Vec<_>>(), 0)?
            } else {
                Data::concatenate(arrays, axis)?
            };

            match &order {
                Some(order) => joined.take(axis, order),
                None => Ok(joined),
            }
        })?;

        let attrs = merge_attrs(
            &variables.iter().map(|var| &var.attrs).collect::<Vec<_>>(),
            combine_attrs,
        )?;

        Ok(Variable {
            dims,
            buffer,
            attrs,
            encoding: first.encoding.clone(),
        })
    }

    /// Same dimensions and values.
    ///
    pub fn equals(&self, other: &Variable) -> Result<bool> {
        if self.dims != other.dims {
            return Ok(false);
        }
        if self.buffer.same_object(&other.buffer) {
            return Ok(true);
        }

        Ok(self.compute()?.equiv(&*other.compute()?))
    }

    /// Equal after broadcasting against each other.
    ///
    pub fn broadcast_equals(&self, other: &Variable) -> Result<bool> {
        match broadcast_pair(self, other) {
            Some((a, b)) => a.equals(&b),
            None => Ok(false),
        }
    }

    /// Equal, including attributes.
    ///
    pub fn identical(&self, other: &Variable) -> Result<bool> {
        if !dict_equiv(&self.attrs, &other.attrs, equivalent) {
            return Ok(false);
        }

        self.equals(other)
    }

    /// Equal wherever both are present, after broadcasting.
    ///
    pub fn no_conflicts(&self, other: &Variable) -> Result<bool> {
        match broadcast_pair(self, other) {
            Some((a, b)) => Ok(a.compute()?.notnull_equiv(&*b.compute()?)),
            None => Ok(false),
        }
    }

    /// Compare under `compat`, computing values if needed.
    ///
    pub fn compare(&self, other: &Variable, compat: Compat) -> Result<bool> {
        match compat {
            Compat::Equals => self.equals(other),
            Compat::BroadcastEquals => self.broadcast_equals(other),
            Compat::Identical => self.identical(other),
            Compat::NoConflicts => self.no_conflicts(other),
            Compat::Override => Ok(true),
        }
    }

    /// Compare under `compat` without computing anything. `None` if that is not enough to
    /// decide.
    ///
    pub fn lazy_compare(&self, other: &Variable, compat: Compat) -> Option<bool> {
        match compat {
            Compat::Override => Some(true),
            Compat::Identical if !dict_equiv(&self.attrs, &other.attrs, equivalent) => {
                Some(false)
            }
            Compat::Equals | Compat::Identical => {
                if self.dims != other.dims {
                    Some(false)
                } else {
                    lazy_array_equiv(&self.buffer, &other.buffer)
                }
            }
            Compat::BroadcastEquals | Compat::NoConflicts => {
                if self.dims == other.dims {
                    lazy_array_equiv(&self.buffer, &other.buffer)
                } else if broadcast_dimension_size(&[self, other]).is_err() {
                    Some(false)
                } else {
                    None
                }
            }
        }
    }

    /// Fill missing values from `other`, which must have the same dimensions and shape.
    ///
    pub fn fillna(&self, other: &Variable) -> Result<Variable> {
        if self.dims != other.dims || self.shape() != other.shape() {
            return Err(Error::DimensionMismatch {
                dims: other.dims.clone(),
                reason: format!("cannot fill variable with dimensions {:?}", self.dims),
            });
        }

        let dtype = self.dtype().common(other.dtype())?;
        let buffer = Buffer::combine(
            vec![self.buffer.clone(), other.buffer.clone()],
            self.shape().to_vec(),
            dtype,
            |arrays| arrays[0].fillna(arrays[1]),
        )?;

        Ok(self.with_buffer(self.dims.clone(), buffer))
    }
}

/// Broadcast variables against each other so they all share dimensions, in first-seen order.
///
pub fn broadcast_variables(variables: &[&Variable]) -> Result<Vec<Variable>> {
    let sizes = broadcast_dimension_size(variables)?;
    let dims = sizes.keys().cloned().collect::<Vec<_>>();
    let shape = sizes.values().copied().collect::<Vec<_>>();

    variables
        .iter()
        .map(|var| var.set_dims(&dims, &shape))
        .collect()
}

fn broadcast_pair(a: &Variable, b: &Variable) -> Option<(Variable, Variable)> {
    let mut broadcast = broadcast_variables(&[a, b]).ok()?.into_iter();

    Some((broadcast.next()?, broadcast.next()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use ndarray::array;

    use crate::utils::AttrValue;

    fn dims(names: &[&str]) -> Vec<String> {
        to_dims(names.iter().copied())
    }

    fn counting(shape: Vec<usize>, data: Data, counter: &Arc<AtomicUsize>) -> LazyData {
        let counter = Arc::clone(counter);
        let dtype = data.dtype();

        LazyData::new(shape, dtype, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(data.clone())
        })
    }

    #[test]
    fn test_new_validates() {
        assert!(matches!(
            Variable::new(["x"], array![[1i64, 2]]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            Variable::new(["x", "x"], array![[1i64, 2]]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(Variable::new(["x", "y"], array![[1i64, 2]]).is_ok());
    }

    #[test]
    fn test_set_dims() -> Result<()> {
        let var = Variable::new(["x"], array![1i64, 2, 3])?;
        let expanded = var.set_dims(&dims(&["x", "t"]), &[3, 2])?;
        assert_eq!(expanded.dims(), &["x", "t"]);
        assert_eq!(*expanded.compute()?, Data::from(array![[1i64, 1], [2, 2], [3, 3]]));

        let same = var.set_dims(&dims(&["x"]), &[3])?;
        assert!(same.buffer().same_object(var.buffer()));

        assert!(var.set_dims(&dims(&["t"]), &[2]).is_err());

        Ok(())
    }

    #[test]
    fn test_transpose_and_expand() -> Result<()> {
        let var = Variable::new(["x", "y"], array![[1i64, 2, 3], [4, 5, 6]])?;
        let transposed = var.transpose(&dims(&["y", "x"]))?;
        assert_eq!(transposed.shape(), &[3, 2]);
        assert_eq!(*transposed.compute()?, Data::from(array![[1i64, 4], [2, 5], [3, 6]]));
        assert!(var.transpose(&dims(&["y"])).is_err());
        assert!(var.transpose(&dims(&["y", "z"])).is_err());

        let expanded = var.expand_dims("t")?;
        assert_eq!(expanded.dims(), &["t", "x", "y"]);
        assert_eq!(expanded.shape(), &[1, 2, 3]);

        Ok(())
    }

    #[test]
    fn test_concat_existing_dim() -> Result<()> {
        let a = Variable::new(["x", "y"], array![[1i64, 2]])?;
        let b = Variable::new(["x", "y"], array![[3i64, 4], [5, 6]])?;
        let joined = Variable::concat(&[&a, &b], "x", None, &CombineAttrs::Override)?;
        assert_eq!(joined.dims(), &["x", "y"]);
        assert_eq!(joined.shape(), &[3, 2]);
        assert_eq!(*joined.compute()?, Data::from(array![[1i64, 2], [3, 4], [5, 6]]));

        let joined = Variable::concat(&[&a, &b], "y", None, &CombineAttrs::Override);
        assert!(matches!(joined, Err(Error::ShapeMismatch(_))));

        Ok(())
    }

    #[test]
    fn test_concat_new_dim() -> Result<()> {
        let a = Variable::new(["x"], array![1i32, 2])?;
        let b = Variable::new(["x"], array![0.5f64, 1.5])?;
        let joined = Variable::concat(&[&a, &b], "t", None, &CombineAttrs::Override)?;
        assert_eq!(joined.dims(), &["t", "x"]);
        assert_eq!(joined.dtype(), DType::F64);
        assert_eq!(*joined.compute()?, Data::from(array![[1.0, 2.0], [0.5, 1.5]]));

        let c = Variable::new(["y"], array![1i32, 2])?;
        assert!(matches!(
            Variable::concat(&[&a, &c], "t", None, &CombineAttrs::Override),
            Err(Error::DimensionMismatch { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_concat_positions() -> Result<()> {
        let a = Variable::new(["x"], array![0i64, 1])?;
        let b = Variable::new(["x"], array![2i64, 3])?;
        let positions = vec![vec![0, 2], vec![1, 3]];
        let joined = Variable::concat(
            &[&a, &b],
            "x",
            Some(positions.as_slice()),
            &CombineAttrs::Override,
        )?;
        assert_eq!(*joined.compute()?, Data::from(vec![0i64, 2, 1, 3]));

        let bad = vec![vec![0, 1], vec![1, 3]];
        assert!(matches!(
            Variable::concat(&[&a, &b], "x", Some(bad.as_slice()), &CombineAttrs::Override),
            Err(Error::InvalidPositions(_))
        ));

        Ok(())
    }

    #[test]
    fn test_concat_attrs() -> Result<()> {
        let mut attrs = Attrs::new();
        attrs.insert("units".into(), "m".into());
        let a = Variable::new(["x"], array![0i64])?.with_attrs(attrs.clone());

        attrs.insert("units".into(), "km".into());
        let b = Variable::new(["x"], array![1i64])?.with_attrs(attrs);

        let joined = Variable::concat(&[&a, &b], "x", None, &CombineAttrs::Override)?;
        assert_eq!(joined.attrs.get("units"), Some(&AttrValue::from("m")));

        let joined = Variable::concat(&[&a, &b], "x", None, &CombineAttrs::DropConflicts)?;
        assert!(joined.attrs.is_empty());

        assert!(matches!(
            Variable::concat(&[&a, &b], "x", None, &CombineAttrs::NoConflicts),
            Err(Error::AttributeConflict { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_concat_stays_lazy() -> Result<()> {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = Variable::lazy(["x"], counting(vec![2], Data::from(vec![1.0, 2.0]), &counter))?;
        let b = Variable::new(["x"], array![3.0])?;

        let joined = Variable::concat(&[&a, &b], "x", None, &CombineAttrs::Override)?;
        assert!(joined.is_lazy());
        assert_eq!(joined.shape(), &[3]);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(*joined.compute()?, Data::from(vec![1.0, 2.0, 3.0]));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[test]
    fn test_comparisons() -> Result<()> {
        let a = Variable::new(["x"], array![1.0, f64::NAN])?;
        let b = Variable::new(["x"], array![1.0, f64::NAN])?;
        let c = Variable::new(["x"], array![1.0, 2.0])?;
        let d = Variable::new(["x", "y"], array![[1.0, 1.0], [f64::NAN, f64::NAN]])?;
        let e = Variable::new(["y"], array![1.0, f64::NAN])?;

        assert!(a.equals(&b)?);
        assert!(!a.equals(&c)?);
        assert!(!a.equals(&d)?);
        assert!(a.broadcast_equals(&d)?);
        assert!(!a.equals(&e)?);
        assert!(a.no_conflicts(&c)?);
        assert!(!a.no_conflicts(&Variable::new(["x"], array![2.0, 2.0])?)?);

        let mut attrs = Attrs::new();
        attrs.insert("units".into(), "m".into());
        let f = b.clone().with_attrs(attrs);
        assert!(a.equals(&f)?);
        assert!(!a.identical(&f)?);
        assert!(a.compare(&f, Compat::Override)?);

        Ok(())
    }

    #[test]
    fn test_lazy_compare_does_not_compute() -> Result<()> {
        let counter = Arc::new(AtomicUsize::new(0));
        let lazy = counting(vec![2], Data::from(vec![1.0, 2.0]), &counter).with_token("a");
        let a = Variable::lazy(["x"], lazy.clone())?;
        let b = Variable::lazy(["x"], lazy.clone())?;
        let c = Variable::lazy(["x"], counting(vec![2], Data::from(vec![1.0, 2.0]), &counter))?;
        let d = Variable::lazy(["y"], lazy)?;

        assert_eq!(a.lazy_compare(&b, Compat::Equals), Some(true));
        assert_eq!(a.lazy_compare(&c, Compat::Equals), None);
        assert_eq!(a.lazy_compare(&d, Compat::Equals), Some(false));
        assert_eq!(a.lazy_compare(&d, Compat::BroadcastEquals), None);
        assert_eq!(a.lazy_compare(&c, Compat::Override), Some(true));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert!(a.compare(&c, Compat::Equals)?);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        Ok(())
    }

    #[test]
    fn test_load_caches() -> Result<()> {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut var = Variable::lazy(["x"], counting(vec![1], Data::from(vec![1i64]), &counter))?;
        var.load()?;
        var.load()?;
        var.compute()?;
        assert!(!var.is_lazy());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[test]
    fn test_reindex_and_fillna() -> Result<()> {
        let var = Variable::new(["x"], array![1i64, 2])?;
        let reindexed = var.reindex("x", vec![Some(1), None, Some(0)], None)?;
        assert_eq!(reindexed.dtype(), DType::F64);

        let other = Variable::new(["x"], array![0.0, 7.0, 0.0])?;
        let filled = reindexed.fillna(&other)?;
        assert_eq!(*filled.compute()?, Data::from(vec![2.0, 7.0, 1.0]));

        let reindexed = var.reindex("x", vec![None, Some(0)], Some(&Scalar::Int(-1)))?;
        assert_eq!(*reindexed.compute()?, Data::from(vec![-1i64, 1]));

        Ok(())
    }
}
