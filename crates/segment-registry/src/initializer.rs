//! Initial-value abstraction for segment buffers
//!
//! `register` and `resize` accept one of three initial-value forms: a
//! constant, an element-wise value list, or a per-index generator. All
//! three go through a single [`Initializer`] so the registry has one
//! fill path instead of three special cases.

use std::fmt;

use runtime_core::{Error, Result};

use crate::element::Element;

/// How to fill a freshly allocated segment buffer
pub enum Initializer<T> {
    /// Every element gets the same value
    Constant(T),

    /// Element-wise values; length must equal the segment's element count
    Values(Vec<T>),

    /// Per-element generator, called with the flat element index
    Generate(Box<dyn Fn(usize) -> T + Send + Sync>),
}

impl<T: Element> Initializer<T> {
    /// Constant zero fill
    pub fn zero() -> Self {
        Initializer::Constant(T::default())
    }

    /// Wrap a per-index generator function
    pub fn generate<F>(f: F) -> Self
    where
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        Initializer::Generate(Box::new(f))
    }

    /// Fill `dst`; `segment` names the target for error context
    pub(crate) fn fill(&self, segment: &str, dst: &mut [T]) -> Result<()> {
        match self {
            Initializer::Constant(c) => dst.fill(*c),
            Initializer::Values(values) => {
                if values.len() != dst.len() {
                    return Err(Error::InvalidShape {
                        segment: segment.to_string(),
                        message: format!(
                            "initializer supplies {} values for {} elements",
                            values.len(),
                            dst.len()
                        ),
                    });
                }
                dst.copy_from_slice(values);
            }
            Initializer::Generate(f) => {
                for (i, slot) in dst.iter_mut().enumerate() {
                    *slot = f(i);
                }
            }
        }
        Ok(())
    }
}

impl<T> From<T> for Initializer<T> {
    fn from(v: T) -> Self {
        Initializer::Constant(v)
    }
}

impl<T> From<Vec<T>> for Initializer<T> {
    fn from(v: Vec<T>) -> Self {
        Initializer::Values(v)
    }
}

impl<T: fmt::Debug> fmt::Debug for Initializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::Constant(c) => f.debug_tuple("Constant").field(c).finish(),
            Initializer::Values(v) => f.debug_tuple("Values").field(&v.len()).finish(),
            Initializer::Generate(_) => f.write_str("Generate(..)"),
        }
    }
}
