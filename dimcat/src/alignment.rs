//! Reconcile the labels of shared dimensions across datasets before they are combined.

use crate::{
    dataset::Dataset,
    errors::{Error, Result},
    index::Index,
    options::{FillValue, Join},
    ordered::{OrderedMap, OrderedSet},
    variable::Variable,
};

/// Align `datasets` along every dimension not in `exclude`.
///
/// For each dimension indexed in at least one dataset the indexes are joined under `join` and
/// every dataset is reindexed onto the joined labels. Cells that did not exist before take the
/// fill value for their variable. Datasets that carry the dimension without an index must
/// already have the joined size.
///
pub fn align(
    datasets: Vec<Dataset>,
    join: Join,
    fill_value: &FillValue,
    exclude: &[&str],
) -> Result<Vec<Dataset>> {
    let mut datasets = datasets;
    let dims = datasets
        .iter()
        .flat_map(|dataset| dataset.dims().keys().cloned())
        .filter(|dim| !exclude.contains(&dim.as_str()))
        .collect::<OrderedSet<_>>();

    for dim in dims.iter() {
        let indexes = datasets
            .iter()
            .map(|dataset| dataset.index(dim))
            .collect::<Vec<_>>();

        let joined = match join_indexes(dim, &indexes, join)? {
            Some(joined) => joined,
            None => {
                check_unindexed_sizes(dim, &datasets)?;
                continue;
            }
        };

        for dataset in datasets.iter().filter(|dataset| dataset.index(dim).is_none()) {
            match dataset.dim_size(dim) {
                Some(size) if size != joined.len() => {
                    return Err(Error::AlignmentMismatch {
                        dim: dim.clone(),
                        reason: format!(
                            "unindexed dimension has length {size}, but the aligned index has \
                             length {}",
                            joined.len()
                        ),
                    })
                }
                _ => {}
            }
        }

        for dataset in datasets.iter_mut() {
            let reindexed = match dataset.index(dim) {
                Some(index) if !index.equals(&joined) => {
                    if join == Join::Override {
                        relabel(dataset, &joined)?
                    } else {
                        let indexer = index.get_indexer(&joined)?;
                        tracing::debug!(
                            dim = dim.as_str(),
                            from = index.len(),
                            to = joined.len(),
                            "reindexing dataset for alignment"
                        );
                        reindex(dataset, &joined, indexer, fill_value)?
                    }
                }
                _ => continue,
            };
            *dataset = reindexed;
        }
    }

    Ok(datasets)
}

/// The index every dataset should be aligned to, or `None` if `dim` has no index anywhere.
///
fn join_indexes(dim: &str, indexes: &[Option<&Index>], join: Join) -> Result<Option<Index>> {
    let present = indexes.iter().flatten().copied().collect::<Vec<_>>();
    let (first, rest) = match present.split_first() {
        Some(split) => split,
        None => return Ok(None),
    };

    if rest.iter().all(|index| index.equals(first)) {
        return Ok(Some((*first).clone()));
    }

    let joined = match join {
        Join::Outer => rest
            .iter()
            .try_fold((*first).clone(), |joined, index| joined.union(index))?,
        Join::Inner => rest
            .iter()
            .try_fold((*first).clone(), |joined, index| joined.intersection(index))?,
        Join::Left => (*first).clone(),
        Join::Right => (*rest.last().unwrap_or(first)).clone(),
        Join::Exact => {
            return Err(Error::AlignmentMismatch {
                dim: dim.to_string(),
                reason: "indexes are not equal and join='exact'".into(),
            })
        }
        Join::Override => {
            if let Some(other) = rest.iter().find(|index| index.len() != first.len()) {
                return Err(Error::AlignmentMismatch {
                    dim: dim.to_string(),
                    reason: format!(
                        "join='override' needs indexes of equal length, got {} and {}",
                        first.len(),
                        other.len()
                    ),
                });
            }

            (*first).clone()
        }
    };

    Ok(Some(joined))
}

fn check_unindexed_sizes(dim: &str, datasets: &[Dataset]) -> Result<()> {
    let sizes = datasets
        .iter()
        .filter_map(|dataset| dataset.dim_size(dim))
        .collect::<OrderedSet<_>>();
    if sizes.len() > 1 {
        return Err(Error::AlignmentMismatch {
            dim: dim.to_string(),
            reason: format!(
                "conflicting dimension sizes {:?} without an index",
                sizes.iter().collect::<Vec<_>>()
            ),
        });
    }

    Ok(())
}

/// Rearrange every variable along the joined index's dimension and swap in its coordinate.
///
fn reindex(
    dataset: &Dataset,
    joined: &Index,
    indexer: Vec<Option<usize>>,
    fill_value: &FillValue,
) -> Result<Dataset> {
    let dim = joined.dim();
    let mut coords = joined.create_variables(Some(dataset.variables()))?;

    let mut variables = OrderedMap::new();
    for (name, variable) in dataset.variables().iter() {
        let variable = match coords.remove(name.as_str()) {
            Some(coord) => coord,
            None if variable.has_dim(dim) => {
                variable.reindex(dim, indexer.clone(), fill_value.for_variable(name))?
            }
            None => variable.clone(),
        };
        variables.insert(name.clone(), variable);
    }

    rebuild(dataset, variables, joined)
}

/// Swap in the joined index's coordinate without touching any other variable.
///
fn relabel(dataset: &Dataset, joined: &Index) -> Result<Dataset> {
    let mut coords = joined.create_variables(Some(dataset.variables()))?;

    let variables = dataset
        .variables()
        .iter()
        .map(|(name, variable)| {
            let variable = coords.remove(name.as_str()).unwrap_or_else(|| variable.clone());
            (name.clone(), variable)
        })
        .collect();

    rebuild(dataset, variables, joined)
}

fn rebuild(
    dataset: &Dataset,
    variables: OrderedMap<String, Variable>,
    joined: &Index,
) -> Result<Dataset> {
    let mut indexes = dataset.indexes().clone();
    indexes.insert(joined.dim().to_string(), joined.clone());

    let mut rebuilt = Dataset::from_parts(variables, dataset.coord_names().clone(), indexes)?;
    rebuilt.attrs = dataset.attrs.clone();
    rebuilt.encoding = dataset.encoding.clone();

    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::{
        data::Data,
        dtype::{DType, Label, Scalar},
    };

    fn dataset(x: Vec<i64>, values: Vec<f64>) -> Result<Dataset> {
        Dataset::new()
            .with_coord("x", Variable::new(["x"], x)?)?
            .with_data_var("v", Variable::new(["x"], values)?)
    }

    fn x_labels(dataset: &Dataset) -> Vec<Label> {
        dataset.index("x").map(Index::labels).unwrap_or_default()
    }

    #[test]
    fn test_outer_join() -> Result<()> {
        let a = dataset(vec![0, 1], vec![1.0, 2.0])?;
        let b = dataset(vec![1, 2], vec![3.0, 4.0])?;

        let aligned = align(vec![a, b], Join::Outer, &FillValue::Missing, &[])?;
        for dataset in &aligned {
            assert_eq!(
                x_labels(dataset),
                [0, 1, 2].into_iter().map(Label::Int).collect::<Vec<_>>()
            );
            assert_eq!(dataset.variables().keys().collect::<Vec<_>>(), vec!["x", "v"]);
        }

        let v = aligned[0].get("v").unwrap().compute()?;
        assert!(v.equiv(&Data::from(vec![1.0, 2.0, f64::NAN])));
        let v = aligned[1].get("v").unwrap().compute()?;
        assert!(v.equiv(&Data::from(vec![f64::NAN, 3.0, 4.0])));

        let x = aligned[1].get("x").unwrap().compute()?;
        assert_eq!(*x, Data::from(vec![0i64, 1, 2]));

        Ok(())
    }

    #[test]
    fn test_inner_left_right() -> Result<()> {
        let a = dataset(vec![0, 1, 2], vec![1.0, 2.0, 3.0])?;
        let b = dataset(vec![2, 1], vec![4.0, 5.0])?;

        let inner = align(vec![a.clone(), b.clone()], Join::Inner, &FillValue::Missing, &[])?;
        assert_eq!(x_labels(&inner[1]), vec![Label::Int(1), Label::Int(2)]);
        assert_eq!(*inner[1].get("v").unwrap().compute()?, Data::from(vec![5.0, 4.0]));

        let left = align(vec![a.clone(), b.clone()], Join::Left, &FillValue::Missing, &[])?;
        assert_eq!(left[1].dim_size("x"), Some(3));

        let right = align(vec![a, b], Join::Right, &FillValue::Missing, &[])?;
        assert_eq!(x_labels(&right[0]), vec![Label::Int(2), Label::Int(1)]);
        assert_eq!(*right[0].get("v").unwrap().compute()?, Data::from(vec![3.0, 2.0]));

        Ok(())
    }

    #[test]
    fn test_exact_and_override() -> Result<()> {
        let a = dataset(vec![0, 1], vec![1.0, 2.0])?;
        let b = dataset(vec![5, 6], vec![3.0, 4.0])?;

        assert!(matches!(
            align(vec![a.clone(), b.clone()], Join::Exact, &FillValue::Missing, &[]),
            Err(Error::AlignmentMismatch { .. })
        ));

        let aligned = align(vec![a.clone(), b.clone()], Join::Override, &FillValue::Missing, &[])?;
        assert_eq!(x_labels(&aligned[1]), vec![Label::Int(0), Label::Int(1)]);
        assert!(aligned[1].get("v").unwrap().buffer().same_object(b.get("v").unwrap().buffer()));

        // Excluded dimensions are left alone
        let aligned = align(vec![a, b], Join::Exact, &FillValue::Missing, &["x"])?;
        assert_eq!(x_labels(&aligned[1]), vec![Label::Int(5), Label::Int(6)]);

        Ok(())
    }

    #[test]
    fn test_fill_values() -> Result<()> {
        let a = Dataset::new()
            .with_coord("x", Variable::new(["x"], vec![0i64, 1])?)?
            .with_data_var("n", Variable::new(["x"], vec![1i64, 2])?)?
            .with_data_var("m", Variable::new(["x"], vec![1i64, 2])?)?;
        let b = Dataset::new().with_coord("x", Variable::new(["x"], vec![1i64, 2])?)?;

        let fill = FillValue::ByName([("n".to_string(), Scalar::Int(-1))].into_iter().collect());
        let aligned = align(vec![a, b], Join::Outer, &fill, &[])?;

        let n = aligned[0].get("n").unwrap();
        assert_eq!(n.dtype(), DType::I64);
        assert_eq!(*n.compute()?, Data::from(vec![1i64, 2, -1]));

        let m = aligned[0].get("m").unwrap();
        assert_eq!(m.dtype(), DType::F64);

        Ok(())
    }

    #[test]
    fn test_unindexed_sizes() -> Result<()> {
        let a = Dataset::new().with_data_var("v", Variable::new(["y"], array![1i64, 2])?)?;
        let b = Dataset::new().with_data_var("v", Variable::new(["y"], array![1i64, 2, 3])?)?;

        assert!(matches!(
            align(vec![a.clone(), b.clone()], Join::Outer, &FillValue::Missing, &[]),
            Err(Error::AlignmentMismatch { .. })
        ));
        assert_eq!(align(vec![a, b], Join::Outer, &FillValue::Missing, &["y"])?.len(), 2);

        let c = dataset(vec![0, 1, 2], vec![1.0, 2.0, 3.0])?;
        let d = Dataset::new().with_data_var("w", Variable::new(["x"], array![1i64, 2])?)?;
        assert!(matches!(
            align(vec![c, d], Join::Outer, &FillValue::Missing, &[]),
            Err(Error::AlignmentMismatch { .. })
        ));

        Ok(())
    }
}
