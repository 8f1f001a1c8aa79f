use crate::{
    dataset::Dataset,
    errors::{Error, Result},
    ordered::{OrderedMap, OrderedSet},
    utils::Attrs,
    variable::Variable,
};

/// Key a record's own variable is stored under while it is treated as a dataset.
pub const THIS_ARRAY: &str = "<this-array>";

/// A single named variable with its own coordinates.
///
#[derive(Clone, Debug)]
pub struct Record {
    name: Option<String>,
    variable: Variable,
    coords: Dataset,
}

impl Record {
    pub fn new<S: Into<String>>(name: Option<S>, variable: Variable) -> Self {
        Self {
            name: name.map(Into::into),
            variable,
            coords: Dataset::new(),
        }
    }

    /// Add a coordinate. Its dimensions must be dimensions of the record's variable, with the
    /// same sizes.
    ///
    pub fn with_coord<S: Into<String>>(mut self, name: S, coord: Variable) -> Result<Self> {
        for (dim, size) in coord.sizes() {
            if self.variable.dim_size(dim) != Some(size) {
                return Err(Error::DimensionMismatch {
                    dims: coord.dims().to_vec(),
                    reason: format!(
                        "coordinate does not fit a record with dimensions {:?} and shape {:?}",
                        self.variable.dims(),
                        self.variable.shape()
                    ),
                });
            }
        }
        self.coords.insert_coord(name, coord)?;

        Ok(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rename<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.name = name.map(Into::into);

        self
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn coords(&self) -> &Dataset {
        &self.coords
    }

    pub fn dims(&self) -> &[String] {
        self.variable.dims()
    }

    pub fn shape(&self) -> &[usize] {
        self.variable.shape()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.variable.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.variable.attrs
    }

    /// The record as a dataset: its coordinates plus its variable as the data variable
    /// `THIS_ARRAY`.
    ///
    pub fn to_temp_dataset(&self) -> Result<Dataset> {
        let mut variables = self.coords.variables().clone();
        variables.insert(THIS_ARRAY.to_string(), self.variable.clone());

        Dataset::from_parts(
            variables,
            self.coords.coord_names().clone(),
            self.coords.indexes().clone(),
        )
    }

    /// Turn a dataset made by `to_temp_dataset` back into a record called `name`. Every other
    /// variable becomes a coordinate.
    ///
    pub fn from_temp_dataset(dataset: Dataset, name: Option<String>) -> Result<Record> {
        let variable = dataset
            .get(THIS_ARRAY)
            .cloned()
            .ok_or_else(|| Error::UnknownVariable(THIS_ARRAY.to_string()))?;

        let variables = dataset
            .variables()
            .iter()
            .filter(|(key, _)| key.as_str() != THIS_ARRAY)
            .map(|(key, variable)| (key.clone(), variable.clone()))
            .collect::<OrderedMap<_, _>>();
        let coord_names = variables.keys().cloned().collect::<OrderedSet<_>>();
        let coords = Dataset::from_parts(variables, coord_names, dataset.indexes().clone())?;

        Ok(Record {
            name,
            variable,
            coords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::data::Data;

    fn record() -> Result<Record> {
        Record::new(Some("temp"), Variable::new(["x", "y"], array![[1.0, 2.0], [3.0, 4.0]])?)
            .with_coord("x", Variable::new(["x"], array![10i64, 20])?)?
            .with_coord("lat", Variable::new(["y"], array![0.5, 1.5])?)
    }

    #[test]
    fn test_with_coord_checks_dims() -> Result<()> {
        let record = record()?;
        assert_eq!(record.name(), Some("temp"));
        assert!(record.coords().index("x").is_some());

        let result = record.clone().with_coord("z", Variable::new(["z"], array![1i64])?);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
        let result = record.with_coord("x", Variable::new(["x"], array![1i64, 2, 3])?);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));

        Ok(())
    }

    #[test]
    fn test_temp_dataset_round_trip() -> Result<()> {
        let mut record = record()?;
        record.attrs_mut().insert("units".into(), "K".into());

        let dataset = record.to_temp_dataset()?;
        assert_eq!(
            dataset.variables().keys().collect::<Vec<_>>(),
            vec!["x", "lat", THIS_ARRAY]
        );
        assert_eq!(dataset.data_vars().count(), 1);
        assert!(dataset.index("x").is_some());

        let back = Record::from_temp_dataset(dataset, Some("renamed".into()))?;
        assert_eq!(back.name(), Some("renamed"));
        assert_eq!(back.dims(), &["x", "y"]);
        assert_eq!(back.attrs(), record.attrs());
        assert_eq!(back.coords().coord_names(), record.coords().coord_names());
        assert_eq!(
            *back.coords().get("lat").unwrap().compute()?,
            Data::from(vec![0.5, 1.5])
        );

        assert!(matches!(
            Record::from_temp_dataset(Dataset::new(), None),
            Err(Error::UnknownVariable(_))
        ));

        Ok(())
    }
}
