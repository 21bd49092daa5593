//! Space and time dependent source terms.

use std::sync::Arc;

use ndarray::Array1;

use crate::discretization::BoxMesh;

/// A scalar expression `f(t, x)` sampled at mesh vertices.
///
/// Any `Fn(f64, [f64; 3]) -> f64` closure is a forcing. Coordinates beyond the
/// dimension of the domain are zero.
pub trait Forcing: Send + Sync {
    fn eval(&self, t: f64, x: [f64; 3]) -> f64;
}

impl<F> Forcing for F
where
    F: Fn(f64, [f64; 3]) -> f64 + Send + Sync,
{
    fn eval(&self, t: f64, x: [f64; 3]) -> f64 {
        self(t, x)
    }
}

/// A forcing that takes the same value everywhere and at all times.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constant(pub f64);

impl Forcing for Constant {
    fn eval(&self, _t: f64, _x: [f64; 3]) -> f64 {
        self.0
    }
}

/// Shorthand for a shared [`Constant`] forcing.
pub fn constant(value: f64) -> Arc<dyn Forcing> {
    Arc::new(Constant(value))
}

/// Shares a closure as a forcing.
pub fn from_fn<F>(f: F) -> Arc<dyn Forcing>
where
    F: Fn(f64, [f64; 3]) -> f64 + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Evaluates a forcing at every vertex of the mesh at time `t`.
///
/// An absent forcing samples to zero.
pub fn sample(forcing: Option<&dyn Forcing>, mesh: &BoxMesh, t: f64) -> Array1<f64> {
    match forcing {
        None => Array1::zeros(mesh.num_vertices()),
        Some(forcing) => (0..mesh.num_vertices())
            .map(|idx| forcing.eval(t, mesh.coordinates(idx)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_closure_at_vertices() {
        let mesh = BoxMesh::unit_interval(4).unwrap();
        let f = from_fn(|t, x| t + x[0]);
        let values = sample(Some(f.as_ref()), &mesh, 1.0);
        assert_eq!(values.len(), 5);
        assert!((values[0] - 1.0).abs() < 1e-15);
        assert!((values[4] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn absent_forcing_is_zero() {
        let mesh = BoxMesh::unit_square(2, 2).unwrap();
        let values = sample(None, &mesh, 3.0);
        assert_eq!(values.len(), 9);
        assert!(values.iter().all(|&x| x == 0.0));
    }
}
