use crate::{
    concat::{concat_datasets, concat_records, ConcatDim},
    dataset::Dataset,
    errors::Result,
    options::ConcatOptions,
    record::Record,
    utils::Attrs,
    variable::Variable,
};

/// What concatenation needs from a labeled container.
///
pub trait LabeledContainer: Clone + Sized {
    /// A variable by name, including coordinates.
    fn get(&self, name: &str) -> Option<&Variable>;

    fn coord_names(&self) -> Vec<&str>;

    fn attrs(&self) -> &Attrs;

    /// Concatenate containers of this kind along `dim`.
    fn concat(objects: Vec<Self>, dim: ConcatDim, options: &ConcatOptions) -> Result<Self>;
}

impl LabeledContainer for Dataset {
    fn get(&self, name: &str) -> Option<&Variable> {
        Dataset::get(self, name)
    }

    fn coord_names(&self) -> Vec<&str> {
        Dataset::coord_names(self).iter().map(String::as_str).collect()
    }

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    fn concat(objects: Vec<Self>, dim: ConcatDim, options: &ConcatOptions) -> Result<Self> {
        concat_datasets(objects, dim, options)
    }
}

impl LabeledContainer for Record {
    fn get(&self, name: &str) -> Option<&Variable> {
        self.coords().get(name)
    }

    fn coord_names(&self) -> Vec<&str> {
        self.coords().coord_names().iter().map(String::as_str).collect()
    }

    fn attrs(&self) -> &Attrs {
        Record::attrs(self)
    }

    fn concat(objects: Vec<Self>, dim: ConcatDim, options: &ConcatOptions) -> Result<Self> {
        concat_records(objects, dim, options)
    }
}

/// Either kind of labeled container.
///
#[derive(Clone, Debug)]
pub enum Labeled {
    Dataset(Dataset),
    Record(Record),
}

impl Labeled {
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Labeled::Dataset(dataset) => Some(dataset),
            Labeled::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Labeled::Record(record) => Some(record),
            Labeled::Dataset(_) => None,
        }
    }

    pub fn into_dataset(self) -> Option<Dataset> {
        match self {
            Labeled::Dataset(dataset) => Some(dataset),
            Labeled::Record(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Labeled::Record(record) => Some(record),
            Labeled::Dataset(_) => None,
        }
    }
}

impl From<Dataset> for Labeled {
    fn from(dataset: Dataset) -> Self {
        Labeled::Dataset(dataset)
    }
}

impl From<Record> for Labeled {
    fn from(record: Record) -> Self {
        Labeled::Record(record)
    }
}
