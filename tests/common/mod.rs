//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use beatsplit::cellmodels::{CellModel, CellParameters, FitzHughNagumo};
use beatsplit::forcing::{self, Forcing};
use beatsplit::prelude::*;

/// Unit cube with `M_i = 1`, `M_e = 2` and a FitzHugh-Nagumo cell model.
pub fn cube_model(
    n: usize,
    stimulus: Option<Arc<dyn Forcing>>,
    applied_current: Option<Arc<dyn Forcing>>,
) -> CardiacModel {
    let mut desc = CardiacModelDescriptor::new(
        BoxMesh::unit_cube(n, n, n).unwrap(),
        Conductivity::Isotropic(1.0),
        Conductivity::Isotropic(2.0),
        Arc::new(FitzHughNagumo::new()),
    );
    desc.stimulus = stimulus;
    desc.applied_current = applied_current;
    CardiacModel::new(desc).unwrap()
}

/// Constant stimulus of 2 and applied current `i_a = t`.
pub fn driven_cube(n: usize) -> CardiacModel {
    cube_model(
        n,
        Some(forcing::constant(2.0)),
        Some(forcing::from_fn(|t, _x| t)),
    )
}

/// Stimulus confined to the corner `x, y, z < 0.3`.
pub fn corner_stimulus() -> Arc<dyn Forcing> {
    forcing::from_fn(|t, x| {
        if t < 0.3 && x.iter().all(|&xi| xi < 0.3) {
            50.0
        } else {
            0.0
        }
    })
}

/// Runs every step and returns the final interval.
pub fn run(solver: &mut SplittingSolver, interval: Interval, dt: f64) -> Interval {
    solver
        .solve(interval, dt)
        .unwrap()
        .run()
        .unwrap()
        .expect("at least one step")
}

/// Largest entry-wise difference of two fields.
pub fn max_difference(a: &MixedField, b: &MixedField) -> f64 {
    assert_eq!(a.values().dim(), b.values().dim(), "Dimension mismatch");
    (&a.values() - &b.values())
        .iter()
        .fold(0.0, |m, d| m.max(d.abs()))
}

/// A cell model whose current turns NaN above a threshold potential.
pub struct Unstable {
    pub threshold: f64,
    parameters: CellParameters,
}

impl Unstable {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            parameters: CellParameters::default(),
        }
    }
}

impl CellModel for Unstable {
    fn name(&self) -> &str {
        "Unstable"
    }

    fn default_parameters(&self) -> CellParameters {
        CellParameters::default()
    }

    fn parameters(&self) -> &CellParameters {
        &self.parameters
    }

    fn num_states(&self) -> usize {
        1
    }

    fn current(&self, v: f64, _s: &[f64]) -> Result<f64, Error> {
        Ok(if v > self.threshold { f64::NAN } else { 0.0 })
    }

    fn rhs(&self, _v: f64, _s: &[f64], ds: &mut [f64]) -> Result<(), Error> {
        ds[0] = 0.0;
        Ok(())
    }

    fn initial_conditions(&self) -> (f64, Vec<f64>) {
        (0.0, vec![0.0])
    }
}
