use crate::{
    errors::{Error, Result},
    index::Index,
    ordered::{OrderedMap, OrderedSet},
    utils::{dict_equiv, equivalent, Attrs},
    variable::Variable,
};

/// An ordered collection of named variables sharing dimensions.
///
/// Some variables are coordinates. A 1-D coordinate named after its own dimension is a
/// dimension coordinate and may carry an `Index`. Every variable's dimensions agree on sizes,
/// which are recorded in `dims` in first-seen order.
///
/// Cloning is shallow: variable buffers are shared, metadata is copied.
///
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    variables: OrderedMap<String, Variable>,
    coord_names: OrderedSet<String>,
    dims: OrderedMap<String, usize>,
    indexes: OrderedMap<String, Index>,
    pub attrs: Attrs,
    pub encoding: Attrs,
}

fn calculate_dims<'a, I>(variables: I) -> Result<OrderedMap<String, usize>>
where
    I: IntoIterator<Item = &'a Variable>,
{
    let mut dims = OrderedMap::new();
    for variable in variables {
        for (dim, size) in variable.sizes() {
            match dims.get(dim) {
                Some(&existing) if existing != size => {
                    return Err(Error::DimensionMismatch {
                        dims: vec![dim.clone()],
                        reason: format!("conflicting sizes {existing} and {size}"),
                    })
                }
                Some(_) => {}
                None => {
                    dims.insert(dim.clone(), size);
                }
            }
        }
    }

    Ok(dims)
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a dataset from parts, checking that dimensions agree, that every coordinate
    /// name is a variable, and that every index matches its coordinate.
    ///
    pub fn from_parts(
        variables: OrderedMap<String, Variable>,
        coord_names: OrderedSet<String>,
        indexes: OrderedMap<String, Index>,
    ) -> Result<Self> {
        let missing = coord_names
            .iter()
            .filter(|name| !variables.contains_key(name.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Error::MissingCoordinate { names: missing });
        }

        let mut dataset = Self {
            dims: calculate_dims(variables.values())?,
            variables,
            coord_names,
            ..Self::default()
        };
        for (_, index) in indexes {
            dataset.check_index(&index)?;
            dataset.indexes.insert(index.dim().to_string(), index);
        }

        Ok(dataset)
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;

        self
    }

    fn check_fits(&self, name: &str, variable: &Variable) -> Result<()> {
        let others = self
            .variables
            .iter()
            .filter(|(other, _)| other.as_str() != name)
            .map(|(_, var)| var);
        calculate_dims(others.chain(std::iter::once(variable)))?;

        Ok(())
    }

    fn check_index(&self, index: &Index) -> Result<()> {
        let variable = self
            .variables
            .get(index.dim())
            .filter(|_| self.coord_names.contains(index.dim()))
            .ok_or_else(|| Error::MissingCoordinate {
                names: vec![index.dim().to_string()],
            })?;

        if variable.dims() != [index.dim()] || variable.shape() != [index.len()] {
            return Err(Error::DimensionMismatch {
                dims: variable.dims().to_vec(),
                reason: format!(
                    "index over {:?} with length {} does not match coordinate of shape {:?}",
                    index.dim(),
                    index.len(),
                    variable.shape()
                ),
            });
        }

        Ok(())
    }

    /// Build the default index for a 1-D coordinate named after its own dimension. This
    /// materializes the coordinate.
    ///
    fn create_default_index(&mut self, name: &str) -> Result<()> {
        let variable = match self.variables.get_mut(name) {
            Some(variable) if variable.dims() == [name] => variable,
            _ => return Ok(()),
        };

        variable.load()?;
        let index = Index::from_labels(&*variable.compute()?, name, None)?;
        self.indexes.insert(name.to_string(), index);

        Ok(())
    }

    fn recalculate_dims(&mut self) -> Result<()> {
        self.dims = calculate_dims(self.variables.values())?;

        Ok(())
    }

    /// Insert or replace a data variable.
    ///
    pub fn insert_data_var<S: Into<String>>(&mut self, name: S, variable: Variable) -> Result<()> {
        let name = name.into();
        self.check_fits(&name, &variable)?;

        self.coord_names.remove(&name);
        self.indexes.remove(&name);
        self.variables.insert(name, variable);

        self.recalculate_dims()
    }

    /// Insert or replace a coordinate. A 1-D coordinate named after its dimension gets a
    /// default index.
    ///
    pub fn insert_coord<S: Into<String>>(&mut self, name: S, variable: Variable) -> Result<()> {
        let name = name.into();
        self.check_fits(&name, &variable)?;

        self.indexes.remove(&name);
        self.coord_names.insert(name.clone());
        self.variables.insert(name.clone(), variable);
        self.recalculate_dims()?;

        self.create_default_index(&name)
    }

    /// Builder form of `insert_data_var`.
    ///
    pub fn with_data_var<S: Into<String>>(mut self, name: S, variable: Variable) -> Result<Self> {
        self.insert_data_var(name, variable)?;

        Ok(self)
    }

    /// Builder form of `insert_coord`.
    ///
    pub fn with_coord<S: Into<String>>(mut self, name: S, variable: Variable) -> Result<Self> {
        self.insert_coord(name, variable)?;

        Ok(self)
    }

    /// Insert a dimension coordinate together with its index, moving it to the end.
    ///
    pub fn insert_indexed_coord(&mut self, index: Index, variable: Variable) -> Result<()> {
        let name = index.dim().to_string();
        self.check_fits(&name, &variable)?;

        self.coord_names.insert(name.clone());
        self.variables.insert(name.clone(), variable);
        self.variables.move_to_end(&name);
        self.recalculate_dims()?;

        self.check_index(&index)?;
        self.indexes.insert(name, index);

        Ok(())
    }

    /// Mark existing variables as coordinates.
    ///
    pub fn set_coords<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if !self.variables.contains_key(name) {
                return Err(Error::UnknownVariable(name.to_string()));
            }
            if self.coord_names.insert(name.to_string()) {
                self.create_default_index(name)?;
            }
        }

        Ok(())
    }

    /// Replace the index of the dimension coordinate `index.dim()`, turning the variable into a
    /// coordinate first if it is a data variable.
    ///
    pub fn set_index(&mut self, index: Index) -> Result<()> {
        let name = index.dim().to_string();
        if !self.variables.contains_key(&name) {
            return Err(Error::UnknownVariable(name));
        }

        let promoted = self.coord_names.insert(name.clone());
        if let Err(err) = self.check_index(&index) {
            if promoted {
                self.coord_names.remove(&name);
            }
            return Err(err);
        }
        self.indexes.insert(name, index);

        Ok(())
    }

    /// Remove variables along with their indexes. Unknown names are an error.
    ///
    pub fn drop_vars<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect::<Vec<_>>();
        let missing = names
            .iter()
            .find(|name| !self.variables.contains_key(name.as_str()));
        if let Some(missing) = missing {
            return Err(Error::UnknownVariable(missing.clone()));
        }

        for name in &names {
            self.variables.remove(name);
            self.coord_names.remove(name);
            self.indexes.remove(name);
        }

        self.recalculate_dims()
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Mutable access to a variable, for in place loading. Dimensions cannot change through
    /// this.
    ///
    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> &OrderedMap<String, Variable> {
        &self.variables
    }

    pub fn coord_names(&self) -> &OrderedSet<String> {
        &self.coord_names
    }

    pub fn is_coord(&self, name: &str) -> bool {
        self.coord_names.contains(name)
    }

    pub fn coords(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables
            .iter()
            .filter(|(name, _)| self.coord_names.contains(name.as_str()))
    }

    pub fn data_vars(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables
            .iter()
            .filter(|(name, _)| !self.coord_names.contains(name.as_str()))
    }

    pub fn dims(&self) -> &OrderedMap<String, usize> {
        &self.dims
    }

    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.dims.get(dim).copied()
    }

    pub fn indexes(&self) -> &OrderedMap<String, Index> {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Add a new leading dimension `dim` of length 1 to every data variable.
    ///
    /// A scalar variable named `dim` becomes the 1-D dimension coordinate, with an index.
    /// Coordinates are left alone.
    ///
    pub fn expand_dims(&self, dim: &str) -> Result<Dataset> {
        if self.dims.contains_key(dim) {
            return Err(Error::DimensionMismatch {
                dims: vec![dim.to_string()],
                reason: "dimension already exists".into(),
            });
        }
        if let Some(variable) = self.variables.get(dim) {
            if variable.ndim() != 0 {
                return Err(Error::DimensionMismatch {
                    dims: variable.dims().to_vec(),
                    reason: format!("{dim:?} already exists as a non-scalar variable"),
                });
            }
        }

        let mut variables = OrderedMap::new();
        let mut coord_names = self.coord_names.clone();
        for (name, variable) in self.variables.iter() {
            let expanded = if name == dim {
                coord_names.insert(name.clone());
                variable.expand_dims(dim)?
            } else if self.coord_names.contains(name.as_str()) {
                variable.clone()
            } else {
                variable.expand_dims(dim)?
            };
            variables.insert(name.clone(), expanded);
        }

        let mut expanded = Dataset::from_parts(variables, coord_names, self.indexes.clone())?;
        expanded.attrs = self.attrs.clone();
        expanded.encoding = self.encoding.clone();
        expanded.create_default_index(dim)?;

        Ok(expanded)
    }

    /// Same variables, coordinates and values.
    ///
    pub fn equals(&self, other: &Dataset) -> Result<bool> {
        self.compare(other, Variable::equals)
    }

    /// Same variables, coordinates, values and attributes.
    ///
    pub fn identical(&self, other: &Dataset) -> Result<bool> {
        if !dict_equiv(&self.attrs, &other.attrs, equivalent) {
            return Ok(false);
        }

        self.compare(other, Variable::identical)
    }

    fn compare<F>(&self, other: &Dataset, compare: F) -> Result<bool>
    where
        F: Fn(&Variable, &Variable) -> Result<bool>,
    {
        if self.coord_names != other.coord_names || self.variables.len() != other.variables.len() {
            return Ok(false);
        }

        for (name, variable) in self.variables.iter() {
            match other.variables.get(name) {
                Some(other) if compare(variable, other)? => {}
                _ => return Ok(false),
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::{data::Data, dtype::Label, range::IntRange};

    fn dataset() -> Result<Dataset> {
        Dataset::new()
            .with_coord("x", Variable::new(["x"], array![10i64, 20, 30])?)?
            .with_coord("lat", Variable::new(["x"], array![1.0, 2.0, 3.0])?)?
            .with_data_var(
                "temp",
                Variable::new(["x", "y"], array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])?,
            )
    }

    #[test]
    fn test_construction() -> Result<()> {
        let ds = dataset()?;
        assert_eq!(ds.dims().keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(ds.dim_size("x"), Some(3));
        assert_eq!(ds.dim_size("y"), Some(2));
        assert_eq!(ds.variables().keys().collect::<Vec<_>>(), vec!["x", "lat", "temp"]);
        assert_eq!(
            ds.coords().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            vec!["x", "lat"]
        );
        assert_eq!(ds.data_vars().map(|(name, _)| name.as_str()).collect::<Vec<_>>(), vec!["temp"]);

        assert!(ds.index("lat").is_none());
        let index = ds.index("x").unwrap();
        assert_eq!(index.labels(), vec![Label::Int(10), Label::Int(20), Label::Int(30)]);

        Ok(())
    }

    #[test]
    fn test_conflicting_sizes() -> Result<()> {
        let mut ds = dataset()?;
        let result = ds.insert_data_var("bad", Variable::new(["x"], array![1i64, 2])?);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
        assert!(!ds.contains("bad"));

        // Replacing a variable may change the size if nothing else uses the dimension
        ds.insert_data_var("temp", Variable::new(["x", "y"], array![[1.0], [2.0], [3.0]])?)?;
        assert_eq!(ds.dim_size("y"), Some(1));

        Ok(())
    }

    #[test]
    fn test_set_coords_and_drop() -> Result<()> {
        let mut ds = dataset()?;
        ds.insert_data_var("y", Variable::new(["y"], Data::strings(&["a", "b"]))?)?;
        assert!(ds.index("y").is_none());

        ds.set_coords(["y"])?;
        assert!(ds.is_coord("y"));
        assert_eq!(ds.index("y").unwrap().len(), 2);
        assert!(matches!(ds.set_coords(["nope"]), Err(Error::UnknownVariable(_))));

        ds.drop_vars(["temp", "y"])?;
        assert_eq!(ds.dims().keys().collect::<Vec<_>>(), vec!["x"]);
        assert!(ds.index("y").is_none());
        assert!(matches!(ds.drop_vars(["temp"]), Err(Error::UnknownVariable(_))));

        Ok(())
    }

    #[test]
    fn test_set_index() -> Result<()> {
        let mut ds = dataset()?;
        ds.insert_data_var("y", Variable::new(["y"], array![0i64, 1])?)?;

        let range = Index::range("y", IntRange::new(0, 1, 2));
        ds.set_index(range.clone())?;
        assert!(ds.is_coord("y"));
        assert!(ds.index("y").unwrap().equals(&range));

        let result = ds.set_index(Index::range("x", IntRange::new(0, 1, 5)));
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
        assert_eq!(ds.index("x").unwrap().len(), 3);

        ds.insert_data_var("z", Variable::new(["y"], array![1.0, 2.0])?)?;
        assert!(ds.set_index(Index::range("z", IntRange::new(0, 1, 2))).is_err());
        assert!(!ds.is_coord("z"));
        assert!(matches!(
            ds.set_index(Index::range("w", IntRange::new(0, 1, 2))),
            Err(Error::UnknownVariable(_))
        ));

        Ok(())
    }

    #[test]
    fn test_expand_dims() -> Result<()> {
        let ds = dataset()?
            .with_coord("t", Variable::new(Vec::<&str>::new(), Data::scalar_i64(5))?)?;
        let expanded = ds.expand_dims("t")?;

        assert_eq!(expanded.dim_size("t"), Some(1));
        assert_eq!(expanded.get("temp").unwrap().dims(), &["t", "x", "y"]);
        assert_eq!(expanded.get("lat").unwrap().dims(), &["x"]);
        assert_eq!(expanded.get("t").unwrap().dims(), &["t"]);
        assert_eq!(expanded.index("t").unwrap().labels(), vec![Label::Int(5)]);
        assert_eq!(
            expanded.variables().keys().collect::<Vec<_>>(),
            vec!["x", "lat", "temp", "t"]
        );

        assert!(expanded.expand_dims("t").is_err());
        assert!(ds.expand_dims("x").is_err());

        Ok(())
    }

    #[test]
    fn test_from_parts_validates() -> Result<()> {
        let ds = dataset()?;
        let mut coord_names = ds.coord_names().clone();
        coord_names.insert("missing".to_string());

        let result = Dataset::from_parts(ds.variables().clone(), coord_names, OrderedMap::new());
        assert!(matches!(result, Err(Error::MissingCoordinate { .. })));

        let mut indexes = OrderedMap::new();
        indexes.insert(
            "x".to_string(),
            Index::from_labels(&Data::from(array![1i64, 2]), "x", None)?,
        );
        let result = Dataset::from_parts(ds.variables().clone(), ds.coord_names().clone(), indexes);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));

        Ok(())
    }

    #[test]
    fn test_equals_and_identical() -> Result<()> {
        let a = dataset()?;
        let mut b = dataset()?;
        assert!(a.equals(&b)?);
        assert!(a.identical(&b)?);

        b.attrs.insert("title".into(), "b".into());
        assert!(a.equals(&b)?);
        assert!(!a.identical(&b)?);

        b.insert_data_var(
            "temp",
            Variable::new(["x", "y"], array![[0.0, 2.0], [3.0, 4.0], [5.0, 6.0]])?,
        )?;
        assert!(!a.equals(&b)?);

        Ok(())
    }
}
