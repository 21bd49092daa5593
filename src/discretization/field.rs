use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};

use crate::Error;

/// A vector valued nodal field with one row per degree of freedom and one
/// column per component, e.g. `(v, s_1, .., s_k)` or `(v, u)`.
#[derive(Clone, Debug, PartialEq)]
pub struct MixedField {
    values: Array2<f64>,
}

impl MixedField {
    pub fn zeros(ndofs: usize, num_components: usize) -> Self {
        Self {
            values: Array2::zeros((ndofs, num_components)),
        }
    }

    /// Builds a field with the same tuple at every degree of freedom.
    pub fn constant(ndofs: usize, tuple: &[f64]) -> Self {
        let mut values = Array2::zeros((ndofs, tuple.len()));
        for mut row in values.axis_iter_mut(Axis(0)) {
            row.assign(&ArrayView1::from(tuple));
        }
        Self { values }
    }

    pub fn from_components(components: &[Array1<f64>]) -> Result<Self, Error> {
        let ndofs = components.first().map_or(0, |c| c.len());
        let mut field = Self::zeros(ndofs, components.len());
        for (i, component) in components.iter().enumerate() {
            if component.len() != ndofs {
                return Err(Error::StateShape {
                    expected: ndofs,
                    found: component.len(),
                });
            }
            field.component_mut(i).assign(component);
        }
        Ok(field)
    }

    pub fn ndofs(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_components(&self) -> usize {
        self.values.ncols()
    }

    pub fn component(&self, i: usize) -> ArrayView1<f64> {
        self.values.column(i)
    }

    pub fn component_mut(&mut self, i: usize) -> ArrayViewMut1<f64> {
        self.values.column_mut(i)
    }

    pub fn split(&self) -> Vec<Array1<f64>> {
        self.values.columns().into_iter().map(|c| c.to_owned()).collect()
    }

    pub fn values(&self) -> ArrayView2<f64> {
        self.values.view()
    }

    pub fn values_mut(&mut self) -> ArrayViewMut2<f64> {
        self.values.view_mut()
    }

    /// Copies `other` into `self`; both must have the same shape.
    pub fn assign(&mut self, other: &MixedField) -> Result<(), Error> {
        if self.values.dim() != other.values.dim() {
            return Err(Error::StateShape {
                expected: self.values.len(),
                found: other.values.len(),
            });
        }
        self.values.assign(&other.values);
        Ok(())
    }

    /// Euclidean norm of the coefficient vector over all components.
    pub fn norm_l2(&self) -> f64 {
        self.values.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// The first degree of freedom holding a NaN or infinite entry.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.values
            .axis_iter(Axis(0))
            .position(|row| row.iter().any(|x| !x.is_finite()))
    }
}
