//! Concatenation of labeled containers along a new or existing dimension.

use crate::{
    alignment::align,
    data::Data,
    dataset::Dataset,
    errors::{Error, Result},
    index::Index,
    labeled::{Labeled, LabeledContainer},
    merge::{collect_variables_and_indexes, merge_attrs, merge_collected, Grouped},
    options::{CombineAttrs, Compat, ConcatOptions, FillValue, Policy, Selection},
    ordered::{OrderedMap, OrderedSet},
    record::{Record, THIS_ARRAY},
    selection::calc_concat_over,
    utils::{dict_equiv, equivalent, Attrs},
    variable::Variable,
};

/// Name given to a concat dimension built from bare labels.
pub const DEFAULT_CONCAT_DIM: &str = "concat_dim";

/// The dimension to concatenate along.
///
#[derive(Clone, Debug)]
pub enum ConcatDim {
    /// A dimension name, new or existing.
    Name(String),

    /// 1-D labels for a new dimension, called `name` or `concat_dim`.
    Labels { name: Option<String>, labels: Data },

    /// A 1-D coordinate variable. Its dimension is the concat dimension and its attributes
    /// carry over to the result.
    Variable(Variable),
}

impl From<&str> for ConcatDim {
    fn from(name: &str) -> Self {
        ConcatDim::Name(name.to_string())
    }
}

impl From<String> for ConcatDim {
    fn from(name: String) -> Self {
        ConcatDim::Name(name)
    }
}

impl From<Variable> for ConcatDim {
    fn from(variable: Variable) -> Self {
        ConcatDim::Variable(variable)
    }
}

/// A concat dimension's name, plus its index and coordinate if it came with labels.
///
struct ResolvedDim {
    name: String,
    index: Option<(Index, Option<Variable>)>,
}

fn calc_concat_dim_index(dim: ConcatDim) -> Result<ResolvedDim> {
    match dim {
        ConcatDim::Name(name) => Ok(ResolvedDim { name, index: None }),
        ConcatDim::Labels { name, labels } => {
            let name = name.unwrap_or_else(|| DEFAULT_CONCAT_DIM.to_string());
            if labels.ndim() != 1 {
                return Err(Error::InvalidConcatDim(format!(
                    "labels for {name:?} must be 1-dimensional, got shape {:?}",
                    labels.shape()
                )));
            }
            let index = Index::from_labels(&labels, &name, None)?;

            Ok(ResolvedDim {
                name,
                index: Some((index, None)),
            })
        }
        ConcatDim::Variable(variable) => {
            let name = match variable.dims() {
                [name] => name.clone(),
                dims => {
                    return Err(Error::InvalidConcatDim(format!(
                        "coordinate must be 1-dimensional, got dimensions {dims:?}"
                    )))
                }
            };
            let index = Index::from_labels(&*variable.compute()?, &name, None)?;

            Ok(ResolvedDim {
                name,
                index: Some((index, Some(variable))),
            })
        }
    }
}

/// Concatenate datasets or records along `dim`.
///
/// All objects must be of the same kind, and the result is of that kind.
///
pub fn concat<D>(objects: Vec<Labeled>, dim: D, options: &ConcatOptions) -> Result<Labeled>
where
    D: Into<ConcatDim>,
{
    match objects.first() {
        None => Err(Error::EmptyInput),
        Some(Labeled::Dataset(_)) => Ok(Labeled::Dataset(concat_as(
            objects,
            Labeled::into_dataset,
            dim.into(),
            options,
        )?)),
        Some(Labeled::Record(_)) => Ok(Labeled::Record(concat_as(
            objects,
            Labeled::into_record,
            dim.into(),
            options,
        )?)),
    }
}

fn concat_as<T, F>(
    objects: Vec<Labeled>,
    unwrap: F,
    dim: ConcatDim,
    options: &ConcatOptions,
) -> Result<T>
where
    T: LabeledContainer,
    F: Fn(Labeled) -> Option<T>,
{
    let objects = objects
        .into_iter()
        .map(|object| unwrap(object).ok_or(Error::TypeMismatch))
        .collect::<Result<Vec<_>>>()?;

    T::concat(objects, dim, options)
}

/// The same variable from every object, in order.
///
fn gather<'a, T: LabeledContainer>(objects: &'a [T], name: &str) -> Result<Vec<&'a Variable>> {
    objects
        .iter()
        .map(|object| {
            object
                .get(name)
                .ok_or_else(|| Error::NotPresentInAll(name.to_string()))
        })
        .collect()
}

fn combined_attrs<T: LabeledContainer>(
    objects: &[T],
    combine_attrs: &CombineAttrs,
) -> Result<Attrs> {
    merge_attrs(
        &objects.iter().map(|object| object.attrs()).collect::<Vec<_>>(),
        combine_attrs,
    )
}

/// Shared dimension coordinates and variable roles across a set of datasets.
///
struct Parsed {
    /// One coordinate per dimension, from the first dataset that has one.
    dim_coords: OrderedMap<String, (Variable, Option<Index>)>,
    dims_sizes: OrderedMap<String, usize>,
    dim_names: OrderedSet<String>,
    coord_names: OrderedSet<String>,
    data_names: OrderedSet<String>,
}

fn parse_datasets(datasets: &[Dataset]) -> Parsed {
    let mut parsed = Parsed {
        dim_coords: OrderedMap::new(),
        dims_sizes: OrderedMap::new(),
        dim_names: OrderedSet::new(),
        coord_names: OrderedSet::new(),
        data_names: OrderedSet::new(),
    };

    for dataset in datasets {
        parsed
            .dims_sizes
            .extend(dataset.dims().iter().map(|(dim, size)| (dim.clone(), *size)));
        parsed.coord_names.extend(
            LabeledContainer::coord_names(dataset)
                .into_iter()
                .map(String::from),
        );
        parsed
            .data_names
            .extend(dataset.data_vars().map(|(name, _)| name.clone()));

        for dim in dataset.dims().keys() {
            parsed.dim_names.insert(dim.clone());
            if parsed.dim_coords.contains_key(dim.as_str()) || !dataset.is_coord(dim) {
                continue;
            }
            if let Some(variable) = dataset.get(dim) {
                parsed.dim_coords.insert(
                    dim.clone(),
                    (variable.clone(), dataset.index(dim).cloned()),
                );
            }
        }
    }

    parsed
}

/// Broadcast same-named variables so they share dimensions, with `dim` leading if it is new.
///
/// Missing dimensions take their size from `dims_sizes`, or from the input's length along
/// `dim` for `dim` itself.
///
fn ensure_common_dims(
    variables: &[&Variable],
    dim: &str,
    dims_sizes: &OrderedMap<String, usize>,
    dim_lengths: &[usize],
) -> Result<Vec<Variable>> {
    let seen = variables
        .iter()
        .flat_map(|variable| variable.dims().iter().cloned())
        .collect::<OrderedSet<_>>();
    let mut common_dims = vec![];
    if !seen.contains(dim) {
        common_dims.push(dim.to_string());
    }
    common_dims.extend(seen.iter().cloned());

    variables
        .iter()
        .zip(dim_lengths.iter())
        .map(|(variable, &dim_len)| {
            if variable.dims() == common_dims.as_slice() {
                return Ok((*variable).clone());
            }

            let shape = common_dims
                .iter()
                .map(|d| dims_sizes.get(d.as_str()).copied().unwrap_or(dim_len))
                .collect::<Vec<_>>();
            variable.set_dims(&common_dims, &shape)
        })
        .collect()
}

/// The index `dataset` has for `name`. A scalar coordinate named after the concat dimension
/// gets a one-label index.
///
fn concat_index(dataset: &Dataset, name: &str, dim: &str) -> Result<Option<Index>> {
    if let Some(index) = dataset.index(name) {
        return Ok(Some(index.clone()));
    }

    match dataset.get(name) {
        Some(variable) if name == dim && variable.ndim() == 0 => {
            let index = Index::from_labels(&*variable.compute()?, dim, Some(variable.dtype()))?;

            Ok(Some(index))
        }
        _ => Ok(None),
    }
}

fn warn_unused_options(datasets: &[Dataset], options: &ConcatOptions) {
    if datasets.len() == 1 && options.positions.is_some() {
        tracing::warn!("positions given for a single object, they only reorder its elements");
    }

    for name in options.fill_value.names() {
        if !datasets.iter().any(|dataset| dataset.contains(name)) {
            tracing::warn!(name, "fill_value names a variable that is in none of the objects");
        }
    }
}

/// Concatenate datasets along `dim`.
///
/// Inputs are aligned on every other dimension first. Variables picked by `data_vars` and
/// `coords` (and every variable that already has `dim`) are concatenated, everything else is
/// merged under `compat`. Variables come out in the first dataset's order.
///
pub fn concat_datasets<D>(
    datasets: Vec<Dataset>,
    dim: D,
    options: &ConcatOptions,
) -> Result<Dataset>
where
    D: Into<ConcatDim>,
{
    if datasets.is_empty() {
        return Err(Error::EmptyInput);
    }

    let ResolvedDim {
        name: dim,
        index: dim_index,
    } = calc_concat_dim_index(dim.into())?;
    warn_unused_options(&datasets, options);

    let mut datasets = align(datasets, options.join, &options.fill_value, &[dim.as_str()])?;

    let Parsed {
        mut dim_coords,
        mut dims_sizes,
        dim_names,
        coord_names,
        data_names,
    } = parse_datasets(&datasets);

    let both = coord_names.intersection(&data_names);
    if !both.is_empty() {
        return Err(Error::ConflictingRoles {
            names: both.iter().cloned().collect(),
        });
    }

    dim_coords.remove(dim.as_str());
    dims_sizes.remove(dim.as_str());

    if (coord_names.contains(dim.as_str()) || data_names.contains(dim.as_str()))
        && !dim_names.contains(dim.as_str())
    {
        tracing::debug!(dim = dim.as_str(), "promoting scalar variable to a dimension");
        datasets = datasets
            .iter()
            .map(|dataset| dataset.expand_dims(&dim))
            .collect::<Result<Vec<_>>>()?;
    }

    let concat_over = calc_concat_over(
        &mut datasets,
        &dim,
        &dim_names,
        &options.data_vars,
        &options.coords,
        options.compat,
    )?;

    let variables_to_merge = coord_names
        .union(&data_names)
        .iter()
        .filter(|name| !concat_over.names.contains(*name) && !dim_names.contains(*name))
        .cloned()
        .collect::<OrderedSet<_>>();

    let (mut result_vars, mut result_indexes) = if variables_to_merge.is_empty() {
        (OrderedMap::new(), OrderedMap::new())
    } else {
        let grouped = collect_variables_and_indexes(&datasets.iter().collect::<Vec<_>>())
            .into_iter()
            .filter(|(name, _)| variables_to_merge.contains(name))
            .collect::<Grouped>();

        merge_collected(
            grouped,
            options.compat,
            &concat_over.equals,
            &CombineAttrs::Override,
        )?
    };

    for (name, (variable, index)) in dim_coords {
        if let Some(index) = index {
            result_indexes.insert(name.clone(), index);
        }
        result_vars.insert(name, variable);
    }

    let result_attrs = combined_attrs(&datasets, &options.combine_attrs)?;
    if options.compat == Compat::Identical {
        for dataset in &datasets[1..] {
            if !dict_equiv(&dataset.attrs, &result_attrs, equivalent) {
                return Err(Error::InconsistentGlobalAttrs);
            }
        }
    }
    let result_encoding = datasets[0].encoding.clone();

    let positions = options.positions.as_deref();
    let names = datasets[0].variables().keys().cloned().collect::<Vec<_>>();
    for name in names {
        if concat_over.names.contains(&name) && !result_indexes.contains_key(&name) {
            let variables = gather(&datasets, &name)?;
            let variables =
                ensure_common_dims(&variables, &dim, &dims_sizes, &concat_over.dim_lengths)?;

            let indexes = datasets
                .iter()
                .filter_map(|dataset| concat_index(dataset, &name, &dim).transpose())
                .collect::<Result<Vec<_>>>()?;

            if indexes.is_empty() {
                tracing::trace!(name = name.as_str(), "concatenating variable");
                let combined = Variable::concat(
                    &variables.iter().collect::<Vec<_>>(),
                    &dim,
                    positions,
                    &options.combine_attrs,
                )?;
                result_vars.insert(name, combined);
            } else if indexes.len() < datasets.len() {
                return Err(Error::PartialIndexCoverage {
                    name,
                    found: indexes.len(),
                    total: datasets.len(),
                });
            } else {
                tracing::trace!(name = name.as_str(), "concatenating index");
                let combined = Index::concat(&indexes.iter().collect::<Vec<_>>(), &dim, positions)?;

                let mut index_vars = OrderedMap::new();
                index_vars.insert(name.clone(), variables[0].clone());
                for (key, mut variable) in combined.create_variables(Some(&index_vars))? {
                    variable.attrs = merge_attrs(
                        &datasets
                            .iter()
                            .filter_map(|dataset| dataset.get(&key))
                            .map(|variable| &variable.attrs)
                            .collect::<Vec<_>>(),
                        &options.combine_attrs,
                    )?;
                    result_indexes.insert(key.clone(), combined.clone());
                    result_vars.insert(key, variable);
                }
            }
        } else if result_vars.contains_key(&name) {
            result_vars.move_to_end(&name);
        }
    }

    let mut coord_names = coord_names;
    coord_names.extend(result_indexes.keys().cloned());

    let mut result = Dataset::from_parts(result_vars, coord_names, result_indexes)?;
    result.attrs = result_attrs;
    result.encoding = result_encoding;

    if let Some((index, variable)) = dim_index {
        let existing = variable.map(|variable| {
            let mut existing = OrderedMap::new();
            existing.insert(dim.clone(), variable);
            existing
        });
        let mut created = index.create_variables(existing.as_ref())?;
        if let Some(variable) = created.remove(dim.as_str()) {
            result.insert_indexed_coord(index, variable)?;
        }
    }

    Ok(result)
}

/// Concatenate records along `dim`.
///
/// Records are concatenated as single variable datasets. The result takes the first record's
/// name. Under `identical` all names must match.
///
pub fn concat_records<D>(records: Vec<Record>, dim: D, options: &ConcatOptions) -> Result<Record>
where
    D: Into<ConcatDim>,
{
    let first = records.first().ok_or(Error::EmptyInput)?;
    if options.data_vars != Selection::Policy(Policy::All) {
        return Err(Error::InvalidOption {
            option: "data_vars",
            value: format!("{:?}", options.data_vars),
        });
    }

    let name = first.name().map(String::from);
    let datasets = records
        .iter()
        .map(|record| {
            if record.name() != name.as_deref() && options.compat == Compat::Identical {
                return Err(Error::NameConflict {
                    first: name.clone(),
                    other: record.name().map(String::from),
                });
            }

            record.to_temp_dataset()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut options = options.clone();
    if let (FillValue::ByName(fill), Some(name)) = (&mut options.fill_value, &name) {
        if let Some(value) = fill.remove(name) {
            fill.insert(THIS_ARRAY.to_string(), value);
        }
    }

    let dataset = concat_datasets(datasets, dim, &options)?;
    let attrs = combined_attrs(&records, &options.combine_attrs)?;

    let mut result = Record::from_temp_dataset(dataset, name)?;
    *result.attrs_mut() = attrs;

    Ok(result)
}
