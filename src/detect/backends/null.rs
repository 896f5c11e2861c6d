use std::marker::PhantomData;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::frame::{Frame, ResultSet};

/// Backend that never finds anything. Every frame yields an empty result set.
pub struct NullBackend<T> {
    _entity: PhantomData<fn() -> T>,
}

impl<T> NullBackend<T> {
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<T> Default for NullBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DetectorBackend<T> for NullBackend<T> {
    fn name(&self) -> &'static str {
        "null"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<ResultSet<T>> {
        Ok(ResultSet::new())
    }
}
