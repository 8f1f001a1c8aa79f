//! Decide which variables are concatenated and which are merged.

use std::collections::HashMap;

use crate::{
    dataset::Dataset,
    errors::{Error, Result},
    options::{Compat, Policy, Selection},
    ordered::OrderedSet,
};

/// Outcome of concat set resolution.
///
#[derive(Clone, Debug, Default)]
pub struct ConcatOver {
    /// Variables to concatenate.
    pub names: OrderedSet<String>,

    /// Known equality of same-named variables across inputs, `None` if it was never decided.
    pub equals: HashMap<String, Option<bool>>,

    /// Length of each input along the concat dimension, 1 where it is absent.
    pub dim_lengths: Vec<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Subset {
    DataVars,
    Coords,
}

impl Subset {
    fn as_str(self) -> &'static str {
        match self {
            Subset::DataVars => "data_vars",
            Subset::Coords => "coords",
        }
    }

    fn names(self, dataset: &Dataset) -> Vec<String> {
        match self {
            Subset::DataVars => dataset.data_vars().map(|(name, _)| name.clone()).collect(),
            Subset::Coords => dataset.coords().map(|(name, _)| name.clone()).collect(),
        }
    }
}

/// Work out which variables of `datasets` need to be concatenated along `dim`.
///
/// Every variable that already has `dim` is concatenated, then `data_vars` and `coords` add
/// more. Under `different` a variable is compared across inputs: first without computing
/// anything, then, if that cannot decide, by loading every copy in place so nothing computed
/// here is computed again later.
///
pub fn calc_concat_over(
    datasets: &mut [Dataset],
    dim: &str,
    dim_names: &OrderedSet<String>,
    data_vars: &Selection,
    coords: &Selection,
    compat: Compat,
) -> Result<ConcatOver> {
    for (selection, subset) in [(data_vars, Subset::DataVars), (coords, Subset::Coords)] {
        if *selection == Selection::Policy(Policy::Different) && compat == Compat::Override {
            return Err(Error::ConflictingOptions {
                subset: subset.as_str(),
            });
        }
    }

    let mut concat_over = ConcatOver::default();
    if dim_names.contains(dim) {
        concat_over.names.insert(dim.to_string());
    }
    for dataset in datasets.iter() {
        concat_over.names.extend(
            dataset
                .variables()
                .iter()
                .filter(|(_, variable)| variable.has_dim(dim))
                .map(|(name, _)| name.clone()),
        );
        concat_over.dim_lengths.push(dataset.dim_size(dim).unwrap_or(1));
    }

    process_subset(datasets, data_vars, Subset::DataVars, compat, &mut concat_over)?;
    process_subset(datasets, coords, Subset::Coords, compat, &mut concat_over)?;

    tracing::debug!(
        dim,
        names = ?concat_over.names.iter().collect::<Vec<_>>(),
        "resolved variables to concatenate"
    );

    Ok(concat_over)
}

fn process_subset(
    datasets: &mut [Dataset],
    selection: &Selection,
    subset: Subset,
    compat: Compat,
    concat_over: &mut ConcatOver,
) -> Result<()> {
    let first = match datasets.first() {
        Some(first) => first,
        None => return Ok(()),
    };
    let candidates = subset.names(first);

    match selection {
        Selection::Policy(Policy::All) => {
            concat_over.names.extend(
                candidates
                    .into_iter()
                    .filter(|name| !first.dims().contains_key(name.as_str())),
            );
        }
        Selection::Policy(Policy::Minimal) => {}
        Selection::Policy(Policy::Different) => {
            for name in candidates {
                if concat_over.names.contains(&name) {
                    continue;
                }
                let equals = compare_across(datasets, &name, subset, compat)?;
                if equals == Some(false) {
                    concat_over.names.insert(name.clone());
                }
                concat_over.equals.insert(name, equals);
            }
        }
        Selection::Names(names) => {
            let invalid = names
                .iter()
                .filter(|name| !candidates.contains(name))
                .cloned()
                .collect::<Vec<_>>();
            if !invalid.is_empty() {
                return Err(Error::InvalidVariableSelection {
                    subset: subset.as_str(),
                    names: invalid,
                });
            }

            concat_over.names.extend(names.iter().cloned());
        }
    }

    Ok(())
}

/// Whether `name` is the same in every input under `compat`.
///
/// `None` for a variable held by a single input, there is nothing to compare. A variable
/// missing from only some inputs is an error.
///
fn compare_across(
    datasets: &mut [Dataset],
    name: &str,
    subset: Subset,
    compat: Compat,
) -> Result<Option<bool>> {
    let holders = datasets
        .iter()
        .enumerate()
        .filter(|(_, dataset)| dataset.contains(name))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    if holders.len() == 1 {
        return Ok(None);
    }
    if holders.len() != datasets.len() {
        return Err(Error::MissingVariable {
            name: name.to_string(),
            subset: subset.as_str(),
        });
    }

    let (first, rest) = match datasets.split_first_mut() {
        Some(split) => split,
        None => return Ok(None),
    };
    let lhs = first.get(name).ok_or_else(|| Error::UnknownVariable(name.to_string()))?;

    let mut decided = Some(true);
    for dataset in rest.iter() {
        let rhs = dataset.get(name).ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
        decided = lhs.lazy_compare(rhs, compat);
        if decided != Some(true) {
            break;
        }
    }
    tracing::trace!(name, ?decided, "lazy comparison across inputs");

    if decided.is_some() {
        return Ok(decided);
    }

    tracing::debug!(name, "lazy comparison inconclusive, loading every copy");
    let lhs = first
        .variable_mut(name)
        .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
    lhs.load()?;
    for dataset in rest.iter_mut() {
        let rhs = dataset
            .variable_mut(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
        rhs.load()?;
        if !lhs.compare(rhs, compat)? {
            return Ok(Some(false));
        }
    }

    Ok(Some(true))
}
