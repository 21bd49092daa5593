//! Sparse and dense linear algebra used by the diffusion solvers.

use std::fmt;

use nalgebra::{DMatrix, DVector, Dyn};
use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

use crate::Error;

/// Strategy used for the linear systems of the diffusion sub-step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearSolverType {
    /// Conjugate gradients on the (projected) symmetric system.
    Iterative,
    /// Dense LU factorization.
    Direct,
}

impl fmt::Display for LinearSolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::Iterative => write!(f, "Iterative"),
            LinearSolverType::Direct => write!(f, "Direct"),
        }
    }
}

/// Controls for the conjugate gradient iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct KrylovParameters {
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    pub maximum_iterations: usize,
    /// Start from the current contents of the solution vector instead of zero.
    pub nonzero_initial_guess: bool,
}

impl Default for KrylovParameters {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-10,
            absolute_tolerance: 1e-14,
            maximum_iterations: 5000,
            nonzero_initial_guess: false,
        }
    }
}

impl KrylovParameters {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("expected a positive tolerance, got {value}"),
                })
            }
        };
        positive("relative_tolerance", self.relative_tolerance)?;
        positive("absolute_tolerance", self.absolute_tolerance)?;
        if self.maximum_iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "maximum_iterations".to_string(),
                reason: "at least one iteration is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of a converged Krylov solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KrylovReport {
    pub iterations: usize,
    pub residual: f64,
}

/// Sparse matrix-vector product `A x`.
pub fn spmv(a: &CsMat<f64>, x: ArrayView1<f64>) -> Array1<f64> {
    let mut y = Array1::zeros(a.rows());
    spmv_into(a, x, &mut y);
    y
}

pub fn spmv_into(a: &CsMat<f64>, x: ArrayView1<f64>, y: &mut Array1<f64>) {
    for (row, vec) in a.outer_iterator().enumerate() {
        y[row] = vec.iter().map(|(col, &val)| val * x[col]).sum();
    }
}

pub fn diagonal(a: &CsMat<f64>) -> Array1<f64> {
    let mut d = Array1::zeros(a.rows());
    for (row, vec) in a.outer_iterator().enumerate() {
        d[row] = vec
            .iter()
            .filter(|&(col, _)| col == row)
            .map(|(_, &val)| val)
            .sum();
    }
    d
}

/// Adds `scale * a` into `tri` with its top left corner at `(row0, col0)`.
pub fn add_block(tri: &mut TriMat<f64>, a: &CsMat<f64>, scale: f64, row0: usize, col0: usize) {
    for (row, vec) in a.outer_iterator().enumerate() {
        for (col, &val) in vec.iter() {
            tri.add_triplet(row0 + row, col0 + col, scale * val);
        }
    }
}

/// Adds `scale * diag(d)` into `tri` starting at `(offset, offset)`.
pub fn add_diagonal(tri: &mut TriMat<f64>, d: &Array1<f64>, scale: f64, offset: usize) {
    for (i, &val) in d.iter().enumerate() {
        tri.add_triplet(offset + i, offset + i, scale * val);
    }
}

/// Preconditioned conjugate gradients for symmetric positive (semi-)definite systems.
///
/// `x` holds the initial guess when `nonzero_initial_guess` is set and the
/// solution on return. A semi-definite `A` is fine as long as `b` lies in its
/// range. `inverse_diagonal` enables Jacobi preconditioning.
pub fn conjugate_gradient(
    a: &CsMat<f64>,
    b: ArrayView1<f64>,
    x: &mut Array1<f64>,
    inverse_diagonal: Option<&Array1<f64>>,
    params: &KrylovParameters,
) -> Result<KrylovReport, Error> {
    if !params.nonzero_initial_guess {
        x.fill(0.0);
    }
    let precondition = |r: &Array1<f64>| match inverse_diagonal {
        Some(d) => r * d,
        None => r.clone(),
    };

    let mut r = &b - &spmv(a, x.view());
    let target = (params.relative_tolerance * norm(b)).max(params.absolute_tolerance);
    let mut residual = norm(r.view());
    if residual <= target {
        return Ok(KrylovReport {
            iterations: 0,
            residual,
        });
    }

    let mut z = precondition(&r);
    let mut p = z.clone();
    let mut rz = r.dot(&z);
    let mut ap = Array1::zeros(x.len());
    for iteration in 1..=params.maximum_iterations {
        spmv_into(a, p.view(), &mut ap);
        let pap = p.dot(&ap);
        if !(pap > 0.0) {
            return Err(Error::LinearSolve {
                strategy: LinearSolverType::Iterative,
                reason: format!("breakdown at iteration {iteration} ( p'Ap = {pap:e} )"),
            });
        }
        let alpha = rz / pap;
        x.scaled_add(alpha, &p);
        r.scaled_add(-alpha, &ap);

        residual = norm(r.view());
        if residual <= target {
            return Ok(KrylovReport {
                iterations: iteration,
                residual,
            });
        }

        z = precondition(&r);
        let rz_new = r.dot(&z);
        let beta = rz_new / rz;
        Zip::from(&mut p).and(&z).for_each(|p, &z| *p = z + beta * *p);
        rz = rz_new;
    }
    Err(Error::LinearSolve {
        strategy: LinearSolverType::Iterative,
        reason: format!(
            "no convergence after {} iterations ( residual: {residual:e}, target: {target:e} )",
            params.maximum_iterations
        ),
    })
}

fn norm(x: ArrayView1<f64>) -> f64 {
    x.dot(&x).sqrt()
}

/// LU factorization of a sparse operator, densified.
///
/// Intended for the moderate system sizes of reference runs, where the
/// factorization is reused across steps with a fixed time step.
pub struct DenseLu {
    lu: nalgebra::linalg::LU<f64, Dyn, Dyn>,
}

impl DenseLu {
    pub fn factor(a: &CsMat<f64>) -> Result<Self, Error> {
        let n = a.rows();
        let mut dense = DMatrix::<f64>::zeros(n, a.cols());
        for (row, vec) in a.outer_iterator().enumerate() {
            for (col, &val) in vec.iter() {
                dense[(row, col)] += val;
            }
        }
        let lu = dense.lu();
        if !lu.is_invertible() {
            return Err(Error::LinearSolve {
                strategy: LinearSolverType::Direct,
                reason: format!("{n}x{n} operator is singular"),
            });
        }
        Ok(Self { lu })
    }

    pub fn solve(&self, b: ArrayView1<f64>) -> Result<Array1<f64>, Error> {
        let rhs = DVector::from_iterator(b.len(), b.iter().copied());
        let x = self.lu.solve(&rhs).ok_or_else(|| Error::LinearSolve {
            strategy: LinearSolverType::Direct,
            reason: "back substitution failed".to_string(),
        })?;
        if let Some(i) = x.iter().position(|v| !v.is_finite()) {
            return Err(Error::LinearSolve {
                strategy: LinearSolverType::Direct,
                reason: format!("non-finite solution entry {i}"),
            });
        }
        Ok(x.iter().copied().collect())
    }
}
