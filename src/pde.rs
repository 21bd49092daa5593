//! Diffusion sub-step: the tissue equations advanced with a theta scheme.
//!
//! The bidomain unknowns are the new transmembrane potential `v` and the
//! extracellular potential `u`. With lumped mass `M` and stiffness matrices
//! `K_i`, `K_ie = K_i + K_e` the discrete system reads
//!
//! ```text
//! (M/dt + theta K_i) v + K_i u           = M v0 / dt - (1 - theta) K_i v0
//!  K_i v             + (K_ie / theta) u  = (M i_a - (1 - theta) K_i v0) / theta
//! ```
//!
//! where the second row is the elliptic equation scaled by `1/theta` so the
//! block matrix is symmetric. It is positive semi-definite with the constant
//! `u` as null space; every strategy returns the solution whose `u` has zero
//! mass-weighted average, after removing the mean of the applied current.

mod basic_bidomain_solver;
mod bidomain_solver;
mod monodomain_solver;

pub use basic_bidomain_solver::BasicBidomainSolver;
pub use bidomain_solver::BidomainSolver;
pub use monodomain_solver::MonodomainSolver;

use ndarray::{s, Array1, ArrayView1, ArrayViewMut1};
use sprs::{CsMat, TriMat};

use crate::discretization::MixedField;
use crate::linalg::{add_block, add_diagonal, spmv};
use crate::{CardiacModel, Error, Interval};

/// Advances the tissue equations over one interval.
pub trait PdeSolver: Send {
    fn name(&self) -> &'static str;

    /// Solves for `(v, u)` at `interval.1` given the transmembrane potential
    /// `v` at `interval.0`. On entry `vu` holds the previous solution.
    fn step(
        &mut self,
        v: ArrayView1<f64>,
        vu: &mut MixedField,
        interval: Interval,
    ) -> Result<(), Error>;

    /// Lagrange multiplier of the average extracellular potential constraint
    /// from the last step, when one was used.
    fn multiplier(&self) -> Option<f64> {
        None
    }
}

/// Shifts `u` so its mass-weighted average vanishes.
pub(crate) fn remove_mean(mut u: ArrayViewMut1<f64>, mass: &Array1<f64>) {
    let mean = u.dot(mass) / mass.sum();
    u -= mean;
}

/// Removes the component of `r` along the lumped mass vector, making the
/// elliptic right hand side compatible with no-flux boundaries.
pub(crate) fn project_rhs(mut r: ArrayViewMut1<f64>, mass: &Array1<f64>) {
    let scale = r.sum() / mass.sum();
    r.scaled_add(-scale, mass);
}

/// Discrete operators of the bidomain equations on a fixed mesh.
pub(crate) struct BidomainSystem {
    mass: Array1<f64>,
    k_i: CsMat<f64>,
    k_ie: CsMat<f64>,
}

impl BidomainSystem {
    pub fn new(model: &CardiacModel) -> Self {
        Self {
            mass: model.mass(),
            k_i: model.intracellular_stiffness(),
            k_ie: model.bulk_stiffness(),
        }
    }

    pub fn ndofs(&self) -> usize {
        self.mass.len()
    }

    pub fn mass(&self) -> &Array1<f64> {
        &self.mass
    }

    /// Symmetric block operator, with `extra` trailing rows and columns left
    /// for the caller to fill.
    pub fn operator(&self, dt: f64, theta: f64, extra: usize) -> TriMat<f64> {
        let n = self.ndofs();
        let mut tri = TriMat::with_capacity(
            (2 * n + extra, 2 * n + extra),
            n + 3 * self.k_i.nnz() + self.k_ie.nnz() + 2 * extra * n,
        );
        add_diagonal(&mut tri, &self.mass, 1.0 / dt, 0);
        add_block(&mut tri, &self.k_i, theta, 0, 0);
        add_block(&mut tri, &self.k_i, 1.0, 0, n);
        add_block(&mut tri, &self.k_i, 1.0, n, 0);
        add_block(&mut tri, &self.k_ie, 1.0 / theta, n, n);
        tri
    }

    /// Right hand side for the previous potential `v0` and applied current `i_a`.
    pub fn rhs(&self, v0: ArrayView1<f64>, i_a: &Array1<f64>, dt: f64, theta: f64) -> Array1<f64> {
        let n = self.ndofs();
        let kv = spmv(&self.k_i, v0);
        let mut b = Array1::zeros(2 * n);
        for j in 0..n {
            b[j] = self.mass[j] * v0[j] / dt - (1.0 - theta) * kv[j];
            b[n + j] = (self.mass[j] * i_a[j] - (1.0 - theta) * kv[j]) / theta;
        }
        b
    }

    /// Copies a stacked `(v, u)` vector into `vu` and normalizes `u`.
    pub fn unpack(&self, x: ArrayView1<f64>, vu: &mut MixedField) {
        let n = self.ndofs();
        vu.component_mut(0).assign(&x.slice(s![..n]));
        vu.component_mut(1).assign(&x.slice(s![n..2 * n]));
        remove_mean(vu.component_mut(1), &self.mass);
    }

    /// Stacks the previous `(v, u)` as an initial guess.
    pub fn pack(&self, vu: &MixedField) -> Array1<f64> {
        let n = self.ndofs();
        let mut x = Array1::zeros(2 * n);
        x.slice_mut(s![..n]).assign(&vu.component(0));
        x.slice_mut(s![n..]).assign(&vu.component(1));
        x
    }
}

pub(crate) fn check_vu(v: ArrayView1<f64>, vu: &MixedField, n: usize) -> Result<(), Error> {
    if v.len() != n {
        return Err(Error::StateShape {
            expected: n,
            found: v.len(),
        });
    }
    if vu.ndofs() != n || vu.num_components() != 2 {
        return Err(Error::StateShape {
            expected: 2 * n,
            found: vu.ndofs() * vu.num_components(),
        });
    }
    Ok(())
}

pub(crate) fn check_finite(vu: &MixedField) -> Result<(), Error> {
    match vu.first_non_finite() {
        Some(dof) => Err(Error::NonFinite { field: "vu", dof }),
        None => Ok(()),
    }
}
