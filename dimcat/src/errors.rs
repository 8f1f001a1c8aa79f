use std::result;

use thiserror::Error;

use crate::dtype::DType;

/// Everything that can go wrong while building, aligning, merging or concatenating labeled
/// containers.
///
/// None of these are retried internally. A failed operation leaves no partial result behind.
///
#[derive(Debug, Error)]
pub enum Error {
    #[error("must supply at least one object to concatenate")]
    EmptyInput,

    #[error(
        "compat={0:?} invalid: must be 'broadcast_equals', 'equals', 'identical', \
         'no_conflicts' or 'override'"
    )]
    InvalidCompatOption(String),

    #[error("{value:?} is not a valid value for {option}")]
    InvalidOption { option: &'static str, value: String },

    #[error(
        "the elements in the input list need to be either all datasets or all records"
    )]
    TypeMismatch,

    #[error("cannot specify both {subset}='different' and compat='override'")]
    ConflictingOptions { subset: &'static str },

    #[error(
        "{name:?} not present in all datasets and {subset}='different'. Either add {name:?} \
         to datasets where it is missing or specify {subset}='minimal'"
    )]
    MissingVariable { name: String, subset: &'static str },

    #[error("some variables in {subset} are not {subset} on the first dataset: {names:?}")]
    InvalidVariableSelection {
        subset: &'static str,
        names: Vec<String>,
    },

    #[error("{names:?} is a coordinate in some datasets but a data variable in others")]
    ConflictingRoles { names: Vec<String> },

    #[error(
        "{name:?} must have either an index or no index in all datasets, found {found}/{total} \
         datasets with an index"
    )]
    PartialIndexCoverage {
        name: String,
        found: usize,
        total: usize,
    },

    #[error("cannot combine indexes: {0}")]
    InvalidIndexCombination(String),

    #[error(
        "conflicting values for variable {name:?} on objects to be combined. You can skip this \
         check by specifying compat='override'"
    )]
    VariableConflict { name: String },

    #[error("combine_attrs='{policy}', but {reason}")]
    AttributeConflict { policy: &'static str, reason: String },

    #[error("dataset global attributes not equal")]
    InconsistentGlobalAttrs,

    #[error("variables {names:?} are coordinates in some datasets but not others")]
    MissingCoordinate { names: Vec<String> },

    #[error("array names not identical: {first:?} != {other:?}")]
    NameConflict {
        first: Option<String>,
        other: Option<String>,
    },

    #[error("cannot align objects along dimension {dim:?}: {reason}")]
    AlignmentMismatch { dim: String, reason: String },

    #[error("{0:?} is not present in all datasets")]
    NotPresentInAll(String),

    #[error("dimensions {dims:?}: {reason}")]
    DimensionMismatch { dims: Vec<String>, reason: String },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("no common dtype for {0} and {1}")]
    IncompatibleDtypes(DType, DType),

    #[error("invalid positions: {0}")]
    InvalidPositions(String),

    #[error("invalid concat dimension: {0}")]
    InvalidConcatDim(String),

    #[error("failed to materialize deferred value: {0}")]
    Materialize(String),

    #[error("no variable named {0:?}")]
    UnknownVariable(String),

    #[error(transparent)]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = result::Result<T, Error>;
