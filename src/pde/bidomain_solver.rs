use log::{debug, trace, warn};
use ndarray::{s, Array1, ArrayView1};
use sprs::CsMat;

use super::{check_finite, check_vu, project_rhs, BidomainSystem, PdeSolver};
use crate::discretization::MixedField;
use crate::linalg::{conjugate_gradient, diagonal, DenseLu, LinearSolverType};
use crate::parameters::{check_theta, BidomainSolverParameters, Parameters};
use crate::{CardiacModel, Error, Interval};

/// Bidomain solver that assembles the stiffness matrices once and reuses the
/// block operator, its factorization or its preconditioner while the time
/// step does not change.
///
/// * Iterative: Jacobi preconditioned conjugate gradients, warm started from
///   the previous solution.
/// * Direct with `use_avg_u_constraint`: LU of the system augmented with a
///   Lagrange multiplier for the average of `u`.
/// * Direct otherwise: LU of the system with `u` pinned at vertex 0, followed
///   by a shift to zero average.
pub struct BidomainSolver {
    system: BidomainSystem,
    model: CardiacModel,
    theta: f64,
    params: BidomainSolverParameters,
    cache: Option<Cached>,
    multiplier: Option<f64>,
}

struct Cached {
    dt: f64,
    operator: Operator,
}

enum Operator {
    Krylov {
        matrix: CsMat<f64>,
        inverse_diagonal: Option<Array1<f64>>,
    },
    Factored(DenseLu),
}

impl BidomainSolver {
    #[inline]
    pub fn new(
        model: &CardiacModel,
        theta: f64,
        params: BidomainSolverParameters,
    ) -> Result<Self, Error> {
        check_theta(theta)?;
        params.validate()?;
        if params.use_avg_u_constraint && params.linear_solver_type == LinearSolverType::Iterative {
            warn!("BidomainSolver: use_avg_u_constraint has no effect with the iterative strategy");
        }
        Ok(Self {
            system: BidomainSystem::new(model),
            model: model.clone(),
            theta,
            params,
            cache: None,
            multiplier: None,
        })
    }

    fn uses_multiplier(&self) -> bool {
        self.params.linear_solver_type == LinearSolverType::Direct
            && self.params.use_avg_u_constraint
    }

    fn build(&self, dt: f64) -> Result<Operator, Error> {
        let n = self.system.ndofs();
        match self.params.linear_solver_type {
            LinearSolverType::Iterative => {
                let matrix: CsMat<f64> = self.system.operator(dt, self.theta, 0).to_csr();
                let inverse_diagonal = self.params.use_preconditioner.then(|| {
                    diagonal(&matrix).mapv(|d| if d > 0.0 { 1.0 / d } else { 1.0 })
                });
                Ok(Operator::Krylov {
                    matrix,
                    inverse_diagonal,
                })
            }
            LinearSolverType::Direct if self.uses_multiplier() => {
                let mut tri = self.system.operator(dt, self.theta, 1);
                for (j, &m) in self.system.mass().iter().enumerate() {
                    tri.add_triplet(n + j, 2 * n, m);
                    tri.add_triplet(2 * n, n + j, m);
                }
                Ok(Operator::Factored(DenseLu::factor(&tri.to_csr())?))
            }
            LinearSolverType::Direct => {
                let full: CsMat<f64> = self.system.operator(dt, self.theta, 0).to_csr();
                let mut tri = sprs::TriMat::with_capacity((2 * n, 2 * n), full.nnz());
                for (row, vec) in full.outer_iterator().enumerate() {
                    if row == n {
                        continue;
                    }
                    for (col, &val) in vec.iter() {
                        tri.add_triplet(row, col, val);
                    }
                }
                tri.add_triplet(n, n, 1.0);
                Ok(Operator::Factored(DenseLu::factor(&tri.to_csr())?))
            }
        }
    }

    fn operator(&mut self, dt: f64) -> Result<&Operator, Error> {
        let cached = match self.cache.take() {
            Some(cached) if (cached.dt - dt).abs() <= 1e-12 * dt.abs().max(1.0) => cached,
            _ => {
                debug!(
                    "BidomainSolver: assembling {} operator for dt = {dt}",
                    self.params.linear_solver_type
                );
                Cached {
                    dt,
                    operator: self.build(dt)?,
                }
            }
        };
        Ok(&self.cache.insert(cached).operator)
    }
}

impl PdeSolver for BidomainSolver {
    fn name(&self) -> &'static str {
        "BidomainSolver"
    }

    fn step(
        &mut self,
        v: ArrayView1<f64>,
        vu: &mut MixedField,
        interval: Interval,
    ) -> Result<(), Error> {
        let (t0, t1) = interval;
        let dt = t1 - t0;
        let theta = self.theta;
        let n = self.system.ndofs();
        check_vu(v, vu, n)?;

        let i_a = self.model.applied_current_at(t0);
        let mut b = self.system.rhs(v, &i_a, dt, theta);
        let with_multiplier = self.uses_multiplier();
        if !with_multiplier {
            project_rhs(b.slice_mut(s![n..]), self.system.mass());
        }
        let krylov = self.params.krylov_solver.clone();
        let mut x = self.system.pack(vu);
        x.slice_mut(s![..n]).assign(&v);

        let multiplier = match self.operator(dt)? {
            Operator::Krylov {
                matrix,
                inverse_diagonal,
            } => {
                let preconditioner = inverse_diagonal.as_ref();
                let report = conjugate_gradient(matrix, b.view(), &mut x, preconditioner, &krylov)?;
                trace!(
                    "BidomainSolver: CG converged in {} iterations ( residual: {:e} )",
                    report.iterations,
                    report.residual
                );
                None
            }
            Operator::Factored(lu) if with_multiplier => {
                let mut augmented = Array1::zeros(2 * n + 1);
                augmented.slice_mut(s![..2 * n]).assign(&b);
                let solution = lu.solve(augmented.view())?;
                x.assign(&solution.slice(s![..2 * n]));
                Some(theta * solution[2 * n])
            }
            Operator::Factored(lu) => {
                b[n] = 0.0;
                x = lu.solve(b.view())?;
                None
            }
        };
        self.multiplier = multiplier;
        self.system.unpack(x.view(), vu);
        check_finite(vu)
    }

    fn multiplier(&self) -> Option<f64> {
        self.multiplier
    }
}
