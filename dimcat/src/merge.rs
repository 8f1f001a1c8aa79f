//! The part of merging that concatenation relies on: combining same-named variables that are
//! not concatenated, and reconciling attributes.

use std::collections::{HashMap, HashSet};

use crate::{
    dataset::Dataset,
    errors::{Error, Result},
    index::Index,
    options::{CombineAttrs, Compat},
    ordered::OrderedMap,
    utils::{compat_dict_intersection, compat_dict_union, dict_equiv, equivalent, Attrs},
    variable::{broadcast_variables, Variable},
};

/// Variables grouped by name, each paired with the index its dataset holds for it.
pub type Grouped = OrderedMap<String, Vec<(Variable, Option<Index>)>>;

/// Group every variable of `datasets` by name, in first-seen order.
///
pub fn collect_variables_and_indexes(datasets: &[&Dataset]) -> Grouped {
    let mut grouped = Grouped::new();
    for dataset in datasets {
        for (name, variable) in dataset.variables().iter() {
            let element = (variable.clone(), dataset.index(name).cloned());
            match grouped.get_mut(name) {
                Some(elements) => elements.push(element),
                None => {
                    grouped.insert(name.clone(), vec![element]);
                }
            }
        }
    }

    grouped
}

/// Merge grouped variables into one variable per name.
///
/// Names that carry an index in any dataset take the first indexed variable, and every other
/// index must equal the first. Other names go through `unique_variable`, using `equals` for
/// comparisons that were already decided.
///
pub fn merge_collected(
    grouped: Grouped,
    compat: Compat,
    equals: &HashMap<String, Option<bool>>,
    combine_attrs: &CombineAttrs,
) -> Result<(OrderedMap<String, Variable>, OrderedMap<String, Index>)> {
    let mut merged_vars = OrderedMap::new();
    let mut merged_indexes = OrderedMap::new();

    for (name, elements) in grouped {
        let indexed = elements
            .iter()
            .filter_map(|(variable, index)| index.as_ref().map(|index| (variable, index)))
            .collect::<Vec<_>>();

        let (variable, attrs) = match indexed.split_first() {
            Some(((variable, index), rest)) => {
                for (other_variable, other_index) in rest {
                    if !index.equals(other_index) {
                        return Err(Error::VariableConflict { name });
                    }
                    if compat == Compat::Identical
                        && !dict_equiv(&variable.attrs, &other_variable.attrs, equivalent)
                    {
                        return Err(Error::VariableConflict { name });
                    }
                }
                merged_indexes.insert(name.clone(), (*index).clone());

                let attrs = indexed.iter().map(|(variable, _)| &variable.attrs).collect::<Vec<_>>();
                ((*variable).clone(), merge_attrs(&attrs, combine_attrs)?)
            }
            None => {
                let variables = elements.iter().map(|(variable, _)| variable).collect::<Vec<_>>();
                let variable = unique_variable(
                    &name,
                    &variables,
                    compat,
                    equals.get(&name).copied().flatten(),
                )?;

                let attrs = variables.iter().map(|variable| &variable.attrs).collect::<Vec<_>>();
                (variable, merge_attrs(&attrs, combine_attrs)?)
            }
        };

        merged_vars.insert(name, variable.with_attrs(attrs));
    }

    Ok((merged_vars, merged_indexes))
}

/// Reduce same-named variables to one, checking they agree under `compat`.
///
/// `equals` is the outcome of an earlier comparison of exactly these variables, if any. Values
/// are only computed when neither `equals` nor a lazy comparison decides. Each copy is computed
/// at most once.
///
pub fn unique_variable(
    name: &str,
    variables: &[&Variable],
    compat: Compat,
    equals: Option<bool>,
) -> Result<Variable> {
    let (first, rest) = variables.split_first().ok_or(Error::EmptyInput)?;
    let mut out = (*first).clone();
    if rest.is_empty() || compat == Compat::Override {
        return Ok(out);
    }

    if compat == Compat::BroadcastEquals {
        let sizes = broadcast_dimension_size(variables)?;
        let dims = sizes.keys().cloned().collect::<Vec<_>>();
        let shape = sizes.values().copied().collect::<Vec<_>>();
        out = out.set_dims(&dims, &shape)?;
    }

    let mut others = rest.iter().map(|other| (*other).clone()).collect::<Vec<_>>();
    let equals = match equals {
        Some(equals) => equals,
        None => {
            let mut decided = Some(true);
            for other in &others {
                decided = out.lazy_compare(other, compat);
                if decided != Some(true) {
                    break;
                }
            }
            tracing::trace!(name, ?decided, "lazy comparison of variables to merge");

            match decided {
                Some(equals) => equals,
                None => {
                    tracing::debug!(name, "computing variables to compare for merge");
                    out.load()?;
                    let mut equals = true;
                    for other in others.iter_mut() {
                        other.load()?;
                        if !out.compare(other, compat)? {
                            equals = false;
                            break;
                        }
                    }

                    equals
                }
            }
        }
    };

    if !equals {
        return Err(Error::VariableConflict {
            name: name.to_string(),
        });
    }

    if compat == Compat::NoConflicts {
        out.load()?;
        for other in others.iter_mut() {
            other.load()?;
            let mut broadcast = broadcast_variables(&[&out, &*other])?.into_iter();
            if let (Some(filled), Some(other)) = (broadcast.next(), broadcast.next()) {
                out = filled.fillna(&other)?;
            }
        }
    }

    Ok(out)
}

/// Combine attribute mappings under `combine_attrs`. No mappings gives empty attributes.
///
pub fn merge_attrs(attrs: &[&Attrs], combine_attrs: &CombineAttrs) -> Result<Attrs> {
    let (first, rest) = match attrs.split_first() {
        Some(split) => split,
        None => return Ok(Attrs::new()),
    };

    match combine_attrs {
        CombineAttrs::Custom(combine) => combine(attrs),
        CombineAttrs::Drop => Ok(Attrs::new()),
        CombineAttrs::Override => Ok((*first).clone()),
        CombineAttrs::NoConflicts => {
            let mut result = (*first).clone();
            for other in rest {
                result = compat_dict_union(&result, other, equivalent).map_err(|key| {
                    Error::AttributeConflict {
                        policy: "no_conflicts",
                        reason: format!("some values are not the same, conflicting key {key:?}"),
                    }
                })?;
            }

            Ok(result)
        }
        CombineAttrs::DropConflicts => {
            let mut result = Attrs::new();
            let mut dropped = HashSet::new();
            for other in attrs {
                let agreed = compat_dict_intersection(&result, other, equivalent);
                dropped.extend(
                    result
                        .keys()
                        .filter(|key| other.contains_key(key.as_str()))
                        .filter(|key| !agreed.contains_key(key.as_str()))
                        .cloned(),
                );
                result = result
                    .into_iter()
                    .filter(|(key, _)| !dropped.contains(key))
                    .collect();
                for (key, value) in other.iter() {
                    if !result.contains_key(key.as_str()) && !dropped.contains(key) {
                        result.insert(key.clone(), value.clone());
                    }
                }
            }

            Ok(result)
        }
        CombineAttrs::Identical => {
            for other in rest {
                if !dict_equiv(first, other, equivalent) {
                    return Err(Error::AttributeConflict {
                        policy: "identical",
                        reason: format!(
                            "attrs differ. First is {:?}, other is {:?}",
                            first.keys().collect::<Vec<_>>(),
                            other.keys().collect::<Vec<_>>()
                        ),
                    });
                }
            }

            Ok((*first).clone())
        }
    }
}

/// Size of every dimension across `variables`, in first-seen order.
///
pub fn broadcast_dimension_size(variables: &[&Variable]) -> Result<OrderedMap<String, usize>> {
    let mut sizes = OrderedMap::new();
    for variable in variables {
        for (dim, size) in variable.sizes() {
            match sizes.get(dim) {
                Some(&existing) if existing != size => {
                    return Err(Error::ShapeMismatch(format!(
                        "index {dim:?} has conflicting lengths {existing} and {size}"
                    )))
                }
                Some(_) => {}
                None => {
                    sizes.insert(dim.clone(), size);
                }
            }
        }
    }

    Ok(sizes)
}
