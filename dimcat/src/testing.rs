//! Fixtures shared by the unit tests.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use rand::{seq::SliceRandom, Rng};

use crate::{
    data::Data,
    dataset::Dataset,
    errors::Result,
    lazy::LazyData,
    utils::{AttrValue, Attrs},
    variable::Variable,
};

/// Keeps track of which deferred values have been computed.
///
#[derive(Clone, Default)]
pub(crate) struct MaterializeLog {
    computed: Arc<Mutex<Vec<String>>>,
}

impl MaterializeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A deferred value holding `data` that writes `name` to the log whenever it is computed.
    ///
    pub fn lazy(&self, name: &str, data: Data) -> LazyData {
        let computed = Arc::clone(&self.computed);
        let name = name.to_string();
        let shape = data.shape().to_vec();
        let dtype = data.dtype();

        LazyData::new(shape, dtype, move || {
            computed.lock().push(name.clone());
            Ok(data.clone())
        })
    }

    /// A deferred variable, tagged with `token` so copies of it are known equal.
    ///
    pub fn variable(&self, name: &str, dims: &[&str], data: Data, token: &str) -> Result<Variable> {
        Variable::lazy(dims.iter().copied(), self.lazy(name, data).with_token(token))
    }

    pub fn count(&self) -> usize {
        self.computed.lock().len()
    }

    pub fn computed(&self) -> Vec<String> {
        self.computed.lock().clone()
    }
}

pub(crate) fn attrs(entries: &[(&str, AttrValue)]) -> Attrs {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Readings from three stations at times `t`.
///
/// `t` is the time coordinate, `x` the station coordinate, `lat` a non-dimension coordinate
/// along `x`, `temp` is `(t, x)` and `elevation` is `(x)`.
///
pub(crate) fn weather(t: &[i64]) -> Result<Dataset> {
    let temp = Array2::from_shape_fn((t.len(), 3), |(i, j)| (t[i] * 10) as f64 + j as f64);

    Dataset::new()
        .with_coord("t", Variable::new(["t"], t.to_vec())?)?
        .with_coord("x", Variable::new(["x"], vec![10i64, 20, 30])?)?
        .with_coord("lat", Variable::new(["x"], vec![45.0, 46.5, 48.0])?)?
        .with_data_var(
            "temp",
            Variable::new(["t", "x"], temp)?.with_attrs(attrs(&[("units", "K".into())])),
        )?
        .with_data_var("elevation", Variable::new(["x"], vec![120.0, 340.0, 95.0])?)
}

/// A dataset with `len` random readings along `t`, labelled `0..len`.
///
pub(crate) fn random_weather(len: usize) -> Result<Dataset> {
    let mut rng = rand::thread_rng();
    let t = Array1::from_iter(0..len as i64);
    let temp = Array2::from_shape_fn((len, 3), |_| rng.gen_range(250.0..320.0));

    let mut dataset = Dataset::new()
        .with_coord("t", Variable::new(["t"], t)?)?
        .with_coord("x", Variable::new(["x"], vec![10i64, 20, 30])?)?
        .with_data_var("temp", Variable::new(["t", "x"], temp)?)?;
    dataset.attrs = attrs(&[("title", "random".into())]);

    Ok(dataset)
}

/// Split `0..len` into two non-empty sorted parts at random.
///
pub(crate) fn random_split(len: usize) -> (Vec<usize>, Vec<usize>) {
    let mut rng = rand::thread_rng();
    let mut order = (0..len).collect::<Vec<_>>();
    order.shuffle(&mut rng);

    let at = rng.gen_range(1..len);
    let mut first = order[..at].to_vec();
    let mut second = order[at..].to_vec();
    first.sort_unstable();
    second.sort_unstable();

    (first, second)
}

/// Rows `indices` of every variable along `dim`. Coordinates stay coordinates.
///
pub(crate) fn take(dataset: &Dataset, dim: &str, indices: &[usize]) -> Result<Dataset> {
    let mut taken = Dataset::new();
    for (name, variable) in dataset.variables().iter() {
        let variable = match variable.axis(dim) {
            Some(axis) => {
                let data = variable.compute()?.take(axis, indices)?;
                Variable::new(variable.dims().iter().cloned(), data)?
                    .with_attrs(variable.attrs.clone())
            }
            None => variable.clone(),
        };
        if dataset.is_coord(name) {
            taken.insert_coord(name.clone(), variable)?;
        } else {
            taken.insert_data_var(name.clone(), variable)?;
        }
    }
    taken.attrs = dataset.attrs.clone();

    Ok(taken)
}
