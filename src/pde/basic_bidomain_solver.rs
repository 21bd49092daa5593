use log::trace;
use ndarray::{s, Array1, ArrayView1};

use super::{check_finite, check_vu, project_rhs, BidomainSystem, PdeSolver};
use crate::discretization::MixedField;
use crate::linalg::{conjugate_gradient, DenseLu, KrylovParameters, LinearSolverType};
use crate::parameters::{check_theta, BasicBidomainSolverParameters, Parameters};
use crate::{CardiacModel, Error, Interval};

/// Reference bidomain solver.
///
/// The block system is assembled from scratch every step. The direct strategy
/// factors the system augmented with a Lagrange multiplier for the average of
/// `u`; the iterative strategy runs unpreconditioned conjugate gradients from
/// a zero initial guess.
pub struct BasicBidomainSolver {
    model: CardiacModel,
    theta: f64,
    params: BasicBidomainSolverParameters,
    multiplier: Option<f64>,
}

impl BasicBidomainSolver {
    #[inline]
    pub fn new(
        model: &CardiacModel,
        theta: f64,
        params: BasicBidomainSolverParameters,
    ) -> Result<Self, Error> {
        check_theta(theta)?;
        params.validate()?;
        Ok(Self {
            model: model.clone(),
            theta,
            params,
            multiplier: None,
        })
    }
}

impl PdeSolver for BasicBidomainSolver {
    fn name(&self) -> &'static str {
        "BasicBidomainSolver"
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
        let system = BidomainSystem::new(&self.model);
        let n = system.ndofs();
        check_vu(v, vu, n)?;

        let i_a = self.model.applied_current_at(t0);
        let mut b = system.rhs(v, &i_a, dt, theta);
        match self.params.linear_solver_type {
            LinearSolverType::Direct => {
                let mut tri = system.operator(dt, theta, 1);
                for (j, &m) in system.mass().iter().enumerate() {
                    tri.add_triplet(n + j, 2 * n, m);
                    tri.add_triplet(2 * n, n + j, m);
                }
                let mut augmented = Array1::zeros(2 * n + 1);
                augmented.slice_mut(s![..2 * n]).assign(&b);
                let x = DenseLu::factor(&tri.to_csr())?.solve(augmented.view())?;
                system.unpack(x.view(), vu);
                self.multiplier = Some(theta * x[2 * n]);
                trace!("{}: direct solve, multiplier {:e}", self.name(), theta * x[2 * n]);
            }
            LinearSolverType::Iterative => {
                project_rhs(b.slice_mut(s![n..]), system.mass());
                let krylov = KrylovParameters {
                    nonzero_initial_guess: false,
                    ..self.params.krylov_solver.clone()
                };
                let a = system.operator(dt, theta, 0).to_csr();
                let mut x = Array1::zeros(2 * n);
                let report = conjugate_gradient(&a, b.view(), &mut x, None, &krylov)?;
                system.unpack(x.view(), vu);
                self.multiplier = None;
                trace!(
                    "{}: CG converged in {} iterations ( residual: {:e} )",
                    self.name(),
                    report.iterations,
                    report.residual
                );
            }
        }
        check_finite(vu)
    }

    fn multiplier(&self) -> Option<f64> {
        self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cellmodels::NoCellModel;
    use crate::discretization::BoxMesh;
    use crate::{CardiacModelDescriptor, Conductivity};
    use std::sync::Arc;

    fn model() -> CardiacModel {
        CardiacModel::new(CardiacModelDescriptor::new(
            BoxMesh::unit_square(3, 3).unwrap(),
            Conductivity::Isotropic(1.0),
            Conductivity::Isotropic(1.0),
            Arc::new(NoCellModel::new()),
        ))
        .unwrap()
    }

    #[test]
    fn theta_outside_unit_interval_is_rejected() {
        let model = model();
        for theta in [0.0, -1.0, 1.5, f64::NAN] {
            let err = BasicBidomainSolver::new(&model, theta, Default::default())
                .err()
                .unwrap();
            assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "theta"));
        }
        assert!(BasicBidomainSolver::new(&model, 1.0, Default::default()).is_ok());
    }

    #[test]
    fn multiplier_is_reported_by_direct_strategy_only() {
        let model = model();
        let n = model.domain().num_vertices();
        let v0 = Array1::from_iter((0..n).map(|i| i as f64));

        let mut direct = BasicBidomainSolver::new(&model, 0.5, Default::default()).unwrap();
        let mut vu = MixedField::zeros(n, 2);
        direct.step(v0.view(), &mut vu, (0.0, 0.1)).unwrap();
        assert!(direct.multiplier().is_some());

        let params = BasicBidomainSolverParameters {
            linear_solver_type: LinearSolverType::Iterative,
            ..Default::default()
        };
        let mut iterative = BasicBidomainSolver::new(&model, 0.5, params).unwrap();
        let mut other = MixedField::zeros(n, 2);
        iterative.step(v0.view(), &mut other, (0.0, 0.1)).unwrap();
        assert!(iterative.multiplier().is_none());
        let diff = &vu.values() - &other.values();
        assert!(diff.iter().all(|d| d.abs() < 1e-6));
    }
}
