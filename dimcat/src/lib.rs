mod alignment;
mod concat;
mod data;
mod dataset;
mod dtype;
mod errors;
mod helpers;
mod index;
mod labeled;
mod lazy;
mod merge;
mod options;
mod ordered;
mod range;
mod record;
mod selection;
mod utils;
mod variable;

#[cfg(test)]
mod testing;

pub use alignment::align;

pub use concat::concat;
pub use concat::concat_datasets;
pub use concat::concat_records;
pub use concat::ConcatDim;
pub use concat::DEFAULT_CONCAT_DIM;

pub use data::Data;
pub use dataset::Dataset;
pub use dtype::{DType, Label, Scalar};
pub use errors::{Error, Result};
pub use index::Index;
pub use labeled::{Labeled, LabeledContainer};
pub use lazy::{Buffer, LazyData};

pub use merge::merge_attrs;
pub use merge::unique_variable;

pub use options::CombineAttrs;
pub use options::Compat;
pub use options::ConcatOptions;
pub use options::FillValue;
pub use options::Join;
pub use options::Policy;
pub use options::Selection;

pub use ordered::{OrderedMap, OrderedSet};
pub use range::IntRange;
pub use record::{Record, THIS_ARRAY};
pub use selection::{calc_concat_over, ConcatOver};
pub use utils::{AttrValue, Attrs};
pub use variable::Variable;
