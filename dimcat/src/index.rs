use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    data::Data,
    dtype::{DType, Label},
    errors::{Error, Result},
    helpers::inverse_permutation,
    ordered::OrderedMap,
    range::IntRange,
    variable::Variable,
};

/// The lookup structure behind a dimension coordinate.
///
/// An index belongs to exactly one dimension and produces the coordinate variable named after
/// that dimension.
///
#[derive(Clone, Debug)]
pub enum Index {
    /// Explicit labels, in order.
    Labels(LabelIndex),

    /// An integer progression, generated on demand.
    Range(RangeIndex),
}

#[derive(Clone, Debug)]
pub struct LabelIndex {
    dim: String,
    labels: Vec<Label>,
    coord_dtype: DType,
}

#[derive(Clone, Debug)]
pub struct RangeIndex {
    dim: String,
    range: IntRange<i64>,
}

/// Integer labels read as floats once the coordinate dtype is floating point, so lookups
/// match across indexes of different numeric dtypes.
fn normalize(label: Label, dtype: DType) -> Label {
    match label {
        Label::Int(value) if dtype.is_float() => Label::Float(value as f64),
        label => label,
    }
}

fn common_dtype(indexes: &[&Index]) -> Result<DType> {
    DType::common_of(indexes.iter().map(|index| index.coord_dtype()))
        .map_err(|err| Error::InvalidIndexCombination(err.to_string()))?
        .ok_or_else(|| Error::InvalidIndexCombination("no indexes given".into()))
}

impl Index {
    /// Build an index over 1-D label data (a 0-D array is a single label).
    ///
    /// `dtype_hint` overrides the dtype of the coordinate variables the index creates.
    ///
    pub fn from_labels(data: &Data, dim: &str, dtype_hint: Option<DType>) -> Result<Index> {
        if data.ndim() > 1 {
            return Err(Error::InvalidIndexCombination(format!(
                "index data for {dim:?} must be 1-dimensional, got shape {:?}",
                data.shape()
            )));
        }

        let coord_dtype = dtype_hint.unwrap_or_else(|| data.dtype());
        let labels = data
            .labels()?
            .into_iter()
            .map(|label| normalize(label, coord_dtype))
            .collect::<Vec<_>>();

        // Fail now rather than when variables are created
        Data::from_labels(&labels, coord_dtype)?;

        Ok(Index::Labels(LabelIndex {
            dim: dim.to_string(),
            labels,
            coord_dtype,
        }))
    }

    pub fn range(dim: &str, range: IntRange<i64>) -> Index {
        Index::Range(RangeIndex {
            dim: dim.to_string(),
            range,
        })
    }

    pub fn dim(&self) -> &str {
        match self {
            Index::Labels(index) => &index.dim,
            Index::Range(index) => &index.dim,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Index::Labels(index) => index.labels.len(),
            Index::Range(index) => index.range.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coord_dtype(&self) -> DType {
        match self {
            Index::Labels(index) => index.coord_dtype,
            Index::Range(_) => DType::I64,
        }
    }

    pub fn labels(&self) -> Vec<Label> {
        match self {
            Index::Labels(index) => index.labels.clone(),
            Index::Range(index) => index.range.clone().map(Label::Int).collect(),
        }
    }

    fn labels_as(&self, dtype: DType) -> Vec<Label> {
        self.labels()
            .into_iter()
            .map(|label| normalize(label, dtype))
            .collect()
    }

    pub fn is_unique(&self) -> bool {
        match self {
            Index::Labels(index) => {
                index.labels.iter().collect::<HashSet<_>>().len() == index.labels.len()
            }
            Index::Range(index) => index.range.step != 0 || index.range.len() <= 1,
        }
    }

    /// Same dimension and same labels in the same order.
    ///
    pub fn equals(&self, other: &Index) -> bool {
        if self.dim() != other.dim() || self.len() != other.len() {
            return false;
        }
        if let (Index::Range(a), Index::Range(b)) = (self, other) {
            return a.range == b.range;
        }

        match DType::common(self.coord_dtype(), other.coord_dtype()) {
            Ok(dtype) => self.labels_as(dtype) == other.labels_as(dtype),
            Err(_) => false,
        }
    }

    /// Concatenate indexes over the same dimension, in order.
    ///
    /// With `positions`, element `i` of index `j` lands at `positions[j][i]`. Contiguous ranges
    /// without positions stay a range.
    ///
    pub fn concat(
        indexes: &[&Index],
        dim: &str,
        positions: Option<&[Vec<usize>]>,
    ) -> Result<Index> {
        if let Some(other) = indexes.iter().find(|index| index.dim() != dim) {
            return Err(Error::InvalidIndexCombination(format!(
                "cannot concatenate an index over {:?} along {dim:?}",
                other.dim()
            )));
        }
        let coord_dtype = common_dtype(indexes)?;

        if positions.is_none() {
            let ranges = indexes
                .iter()
                .map(|index| match index {
                    Index::Range(index) => Some(&index.range),
                    Index::Labels(_) => None,
                })
                .collect::<Option<Vec<_>>>();

            if let Some((first, rest)) = ranges.as_ref().and_then(|ranges| ranges.split_first()) {
                let joined = rest
                    .iter()
                    .try_fold((*first).clone(), |joined, range| joined.concat(range));
                if let Some(range) = joined {
                    return Ok(Index::range(dim, range));
                }
            }
        }

        let mut labels = indexes
            .iter()
            .flat_map(|index| index.labels_as(coord_dtype))
            .collect::<Vec<_>>();

        if let Some(positions) = positions {
            let order = inverse_permutation(positions, labels.len())?;
            labels = order.into_iter().map(|i| labels[i].clone()).collect();
        }

        Ok(Index::Labels(LabelIndex {
            dim: dim.to_string(),
            labels,
            coord_dtype,
        }))
    }

    /// The coordinate variable for this index, named after its dimension.
    ///
    /// If `variables` holds a variable of that name, its attributes and encoding are kept.
    ///
    pub fn create_variables(
        &self,
        variables: Option<&OrderedMap<String, Variable>>,
    ) -> Result<OrderedMap<String, Variable>> {
        let data = match self {
            Index::Labels(index) => Data::from_labels(&index.labels, index.coord_dtype)?,
            Index::Range(index) => Data::from(index.range.to_array()),
        };

        let mut variable = Variable::new([self.dim()], data)?;
        if let Some(existing) = variables.and_then(|variables| variables.get(self.dim())) {
            variable.attrs = existing.attrs.clone();
            variable.encoding = existing.encoding.clone();
        }

        let mut created = OrderedMap::new();
        created.insert(self.dim().to_string(), variable);

        Ok(created)
    }

    /// For each label of `target`, its position in this index, or `None` if absent.
    ///
    pub fn get_indexer(&self, target: &Index) -> Result<Vec<Option<usize>>> {
        if !self.is_unique() {
            return Err(Error::AlignmentMismatch {
                dim: self.dim().to_string(),
                reason: "cannot reindex or align along dimension with duplicate labels".into(),
            });
        }

        let dtype = DType::common(self.coord_dtype(), target.coord_dtype())
            .map_err(|err| Error::InvalidIndexCombination(err.to_string()))?;
        let lookup = self
            .labels_as(dtype)
            .into_iter()
            .enumerate()
            .map(|(position, label)| (label, position))
            .collect::<HashMap<_, _>>();

        Ok(target
            .labels_as(dtype)
            .iter()
            .map(|label| lookup.get(label).copied())
            .collect())
    }

    /// Sorted, de-duplicated union of both indexes' labels.
    ///
    pub fn union(&self, other: &Index) -> Result<Index> {
        let coord_dtype = common_dtype(&[self, other])?;
        let labels = self
            .labels_as(coord_dtype)
            .into_iter()
            .chain(other.labels_as(coord_dtype))
            .collect::<BTreeSet<_>>();

        Ok(Index::Labels(LabelIndex {
            dim: self.dim().to_string(),
            labels: labels.into_iter().collect(),
            coord_dtype,
        }))
    }

    /// Labels of this index also found in `other`, in this index's order.
    ///
    pub fn intersection(&self, other: &Index) -> Result<Index> {
        let coord_dtype = common_dtype(&[self, other])?;
        let keep = other.labels_as(coord_dtype).into_iter().collect::<HashSet<_>>();
        let mut seen = HashSet::new();
        let labels = self
            .labels_as(coord_dtype)
            .into_iter()
            .filter(|label| keep.contains(label) && seen.insert(label.clone()))
            .collect();

        Ok(Index::Labels(LabelIndex {
            dim: self.dim().to_string(),
            labels,
            coord_dtype,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    fn labels_index(dim: &str, data: Data) -> Index {
        Index::from_labels(&data, dim, None).unwrap()
    }

    #[test]
    fn test_from_labels() -> Result<()> {
        let index = Index::from_labels(&Data::from(array![3i64, 1, 2]), "x", None)?;
        assert_eq!(index.dim(), "x");
        assert_eq!(index.len(), 3);
        assert_eq!(index.coord_dtype(), DType::I64);
        assert_eq!(index.labels(), vec![Label::Int(3), Label::Int(1), Label::Int(2)]);

        let index = Index::from_labels(&Data::scalar_str("a"), "t", None)?;
        assert_eq!(index.labels(), vec![Label::Str("a".into())]);

        let index = Index::from_labels(&Data::from(array![1i64, 2]), "x", Some(DType::F64))?;
        assert_eq!(index.labels(), vec![Label::Float(1.0), Label::Float(2.0)]);

        assert!(Index::from_labels(&Data::from(array![[1i64]]), "x", None).is_err());
        assert!(Index::from_labels(&Data::strings(&["a"]), "x", Some(DType::I64)).is_err());

        Ok(())
    }

    #[test]
    fn test_concat_labels() -> Result<()> {
        let a = labels_index("x", Data::from(array![0i64, 1]));
        let b = labels_index("x", Data::from(array![2.5f64, 3.0]));

        let joined = Index::concat(&[&a, &b], "x", None)?;
        assert_eq!(joined.coord_dtype(), DType::F64);
        assert_eq!(
            joined.labels(),
            vec![Label::Float(0.0), Label::Float(1.0), Label::Float(2.5), Label::Float(3.0)]
        );

        Ok(())
    }

    #[test]
    fn test_concat_positions() -> Result<()> {
        let a = labels_index("x", Data::from(array![0i64, 1]));
        let b = labels_index("x", Data::from(array![2i64, 3]));
        let positions = vec![vec![0, 2], vec![1, 3]];

        let joined = Index::concat(&[&a, &b], "x", Some(positions.as_slice()))?;
        let variables = joined.create_variables(None)?;
        let variable = variables.get("x").unwrap();
        assert_eq!(*variable.compute()?, Data::from(vec![0i64, 2, 1, 3]));

        Ok(())
    }

    #[test]
    fn test_concat_ranges() -> Result<()> {
        let a = Index::range("x", IntRange::new(0, 1, 3));
        let b = Index::range("x", IntRange::new(3, 1, 2));
        let c = Index::range("x", IntRange::new(10, 1, 2));

        assert!(matches!(Index::concat(&[&a, &b], "x", None)?, Index::Range(_)));

        let joined = Index::concat(&[&a, &c], "x", None)?;
        assert!(matches!(joined, Index::Labels(_)));
        assert_eq!(
            joined.labels(),
            [0, 1, 2, 10, 11].into_iter().map(Label::Int).collect::<Vec<_>>()
        );

        Ok(())
    }

    #[test]
    fn test_ranges_ending_at_integer_limit() -> Result<()> {
        let last = Index::range("x", IntRange::new(i64::MAX, 1, 1));
        let variables = last.create_variables(None)?;
        assert_eq!(*variables.get("x").unwrap().compute()?, Data::from(vec![i64::MAX]));

        let before = Index::range("x", IntRange::new(i64::MAX - 1, 1, 1));
        let joined = Index::concat(&[&before, &last], "x", None)?;
        assert!(matches!(joined, Index::Range(_)));
        assert_eq!(joined.labels(), vec![Label::Int(i64::MAX - 1), Label::Int(i64::MAX)]);

        let joined = Index::concat(&[&last, &before], "x", None)?;
        assert!(matches!(joined, Index::Labels(_)));
        assert_eq!(joined.len(), 2);

        Ok(())
    }

    #[test]
    fn test_concat_invalid() {
        let a = labels_index("x", Data::from(array![0i64, 1]));
        let b = labels_index("x", Data::strings(&["a"]));
        let c = labels_index("y", Data::from(array![0i64]));

        assert!(matches!(
            Index::concat(&[&a, &b], "x", None),
            Err(Error::InvalidIndexCombination(_))
        ));
        assert!(matches!(
            Index::concat(&[&a, &c], "x", None),
            Err(Error::InvalidIndexCombination(_))
        ));
    }

    #[test]
    fn test_create_variables_keeps_attrs() -> Result<()> {
        let index = Index::range("x", IntRange::new(0, 2, 3));
        let mut existing = Variable::new(["x"], array![9i64, 9, 9])?;
        existing.attrs.insert("units".into(), "m".into());
        let mut variables = OrderedMap::new();
        variables.insert("x".to_string(), existing);

        let created = index.create_variables(Some(&variables))?;
        let x = created.get("x").unwrap();
        assert_eq!(x.dims(), &["x"]);
        assert_eq!(*x.compute()?, Data::from(vec![0i64, 2, 4]));
        assert!(x.attrs.contains_key("units"));

        Ok(())
    }

    #[test]
    fn test_equals() {
        let a = labels_index("x", Data::from(array![0i64, 1]));
        let b = labels_index("x", Data::from(array![0.0f64, 1.0]));
        let c = labels_index("y", Data::from(array![0i64, 1]));
        let d = Index::range("x", IntRange::new(0, 1, 2));

        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert!(a.equals(&d));
        assert!(d.equals(&a));
    }

    #[test]
    fn test_alignment_helpers() -> Result<()> {
        let a = labels_index("x", Data::from(array![3i64, 1, 2]));
        let b = labels_index("x", Data::from(array![4i64, 2, 3]));

        assert_eq!(
            a.union(&b)?.labels(),
            [1, 2, 3, 4].into_iter().map(Label::Int).collect::<Vec<_>>()
        );
        assert_eq!(
            a.intersection(&b)?.labels(),
            [3, 2].into_iter().map(Label::Int).collect::<Vec<_>>()
        );
        assert_eq!(a.get_indexer(&b)?, vec![None, Some(2), Some(0)]);

        let duplicated = labels_index("x", Data::from(array![1i64, 1]));
        assert!(matches!(
            duplicated.get_indexer(&a),
            Err(Error::AlignmentMismatch { .. })
        ));

        Ok(())
    }
}
