use std::{fmt, sync::Arc};

use crate::{
    data::Data,
    dtype::DType,
    errors::{Error, Result},
};

type Compute = Arc<dyn Fn() -> Result<Data> + Send + Sync>;

/// A value whose contents have not been computed yet.
///
/// Shape and dtype are known up front so structural decisions can be made without computing
/// anything. Two deferred values carrying the same `token` are known to hold equal contents.
///
#[derive(Clone)]
pub struct LazyData {
    shape: Vec<usize>,
    dtype: DType,
    token: Option<String>,
    compute: Compute,
}

impl LazyData {
    pub fn new<F>(shape: Vec<usize>, dtype: DType, compute: F) -> Self
    where
        F: Fn() -> Result<Data> + Send + Sync + 'static,
    {
        Self {
            shape,
            dtype,
            token: None,
            compute: Arc::new(compute),
        }
    }

    /// Attach an identity token.
    ///
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());

        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Run the deferred computation and check it produced what was promised.
    ///
    pub fn compute(&self) -> Result<Data> {
        let data = (self.compute)()?;
        if data.shape() != self.shape.as_slice() {
            return Err(Error::Materialize(format!(
                "expected shape {:?}, computed {:?}",
                self.shape,
                data.shape()
            )));
        }
        if data.dtype() != self.dtype {
            return Err(Error::Materialize(format!(
                "expected dtype {}, computed {}",
                self.dtype,
                data.dtype()
            )));
        }

        Ok(data)
    }
}

impl fmt::Debug for LazyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyData")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// The values held by a variable, either computed or deferred.
///
/// Cloning shares the underlying allocation, so two clones are the "same object" as far as
/// equality short cuts are concerned.
///
#[derive(Clone, Debug)]
pub enum Buffer {
    Materialized(Arc<Data>),
    Unmaterialized(Arc<LazyData>),
}

impl Buffer {
    pub fn shape(&self) -> &[usize] {
        match self {
            Buffer::Materialized(data) => data.shape(),
            Buffer::Unmaterialized(lazy) => lazy.shape(),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::Materialized(data) => data.dtype(),
            Buffer::Unmaterialized(lazy) => lazy.dtype(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Buffer::Unmaterialized(_))
    }

    /// The concrete values. Deferred values are computed every time this is called; use
    /// `materialize` to keep the result.
    ///
    pub fn compute(&self) -> Result<Arc<Data>> {
        match self {
            Buffer::Materialized(data) => Ok(Arc::clone(data)),
            Buffer::Unmaterialized(lazy) => Ok(Arc::new(lazy.compute()?)),
        }
    }

    /// A materialized buffer holding the same values.
    ///
    pub fn materialize(&self) -> Result<Buffer> {
        Ok(Buffer::Materialized(self.compute()?))
    }

    /// Apply `f` to the values. Deferred buffers stay deferred, `shape` and `dtype` describe
    /// the result of `f`.
    ///
    pub fn map<F>(&self, shape: Vec<usize>, dtype: DType, f: F) -> Result<Buffer>
    where
        F: Fn(&Data) -> Result<Data> + Send + Sync + 'static,
    {
        match self {
            Buffer::Materialized(data) => Ok(Buffer::Materialized(Arc::new(f(data)?))),
            Buffer::Unmaterialized(lazy) => {
                let source = Arc::clone(lazy);
                let lazy = LazyData::new(shape, dtype, move || f(&source.compute()?));

                Ok(Buffer::Unmaterialized(Arc::new(lazy)))
            }
        }
    }

    /// Combine several buffers with `f`. The result is deferred if any input is.
    ///
    pub fn combine<F>(buffers: Vec<Buffer>, shape: Vec<usize>, dtype: DType, f: F) -> Result<Buffer>
    where
        F: Fn(&[&Data]) -> Result<Data> + Send + Sync + 'static,
    {
        fn apply<F>(buffers: &[Buffer], f: &F) -> Result<Data>
        where
            F: Fn(&[&Data]) -> Result<Data>,
        {
            let computed = buffers
                .iter()
                .map(Buffer::compute)
                .collect::<Result<Vec<_>>>()?;
            let views = computed.iter().map(|data| data.as_ref()).collect::<Vec<_>>();

            f(&views)
        }

        if buffers.iter().any(Buffer::is_lazy) {
            let lazy = LazyData::new(shape, dtype, move || apply(&buffers, &f));

            Ok(Buffer::Unmaterialized(Arc::new(lazy)))
        } else {
            Ok(Buffer::Materialized(Arc::new(apply(&buffers, &f)?)))
        }
    }

    pub fn same_object(&self, other: &Buffer) -> bool {
        match (self, other) {
            (Buffer::Materialized(a), Buffer::Materialized(b)) => Arc::ptr_eq(a, b),
            (Buffer::Unmaterialized(a), Buffer::Unmaterialized(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn token(&self) -> Option<&str> {
        match self {
            Buffer::Materialized(_) => None,
            Buffer::Unmaterialized(lazy) => lazy.token(),
        }
    }
}

impl From<Data> for Buffer {
    fn from(data: Data) -> Self {
        Buffer::Materialized(Arc::new(data))
    }
}

impl From<LazyData> for Buffer {
    fn from(lazy: LazyData) -> Self {
        Buffer::Unmaterialized(Arc::new(lazy))
    }
}

/// Decide equality without computing anything, if possible.
///
/// `Some(true)` for the same object or matching identity tokens, `Some(false)` when shapes
/// differ, `None` when only computing the values can tell.
///
pub fn lazy_array_equiv(a: &Buffer, b: &Buffer) -> Option<bool> {
    if a.same_object(b) {
        return Some(true);
    }
    if a.shape() != b.shape() {
        return Some(false);
    }

    match (a.token(), b.token()) {
        (Some(a), Some(b)) if a == b => Some(true),
        _ => None,
    }
}
