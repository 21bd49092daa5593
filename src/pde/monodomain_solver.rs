use log::{debug, trace};
use ndarray::{Array1, ArrayView1};
use sprs::CsMat;

use super::{check_finite, PdeSolver};
use crate::discretization::MixedField;
use crate::linalg::{
    add_block, add_diagonal, conjugate_gradient, diagonal, spmv, DenseLu, KrylovParameters,
    LinearSolverType,
};
use crate::parameters::check_theta;
use crate::{CardiacModel, Error, Interval};

/// Monodomain reduction of the bidomain equations,
///
/// ```text
/// (M/dt + theta K_m) v = M v0 / dt - (1 - theta) K_m v0
/// ```
///
/// with `K_m` built from the harmonic mean of the intra- and extracellular
/// conductivities. The extracellular potential is identically zero and the
/// applied current has no effect.
pub struct MonodomainSolver {
    mass: Array1<f64>,
    k_m: CsMat<f64>,
    theta: f64,
    linear_solver_type: LinearSolverType,
    krylov: KrylovParameters,
    cache: Option<(f64, Operator)>,
}

enum Operator {
    Krylov {
        matrix: CsMat<f64>,
        inverse_diagonal: Array1<f64>,
    },
    Factored(DenseLu),
}

impl MonodomainSolver {
    #[inline]
    pub fn new(
        model: &CardiacModel,
        theta: f64,
        linear_solver_type: LinearSolverType,
        krylov: KrylovParameters,
    ) -> Result<Self, Error> {
        check_theta(theta)?;
        krylov.validate()?;
        if model.has_applied_current() {
            debug!("MonodomainSolver: the applied current is ignored by the monodomain reduction");
        }
        Ok(Self {
            mass: model.mass(),
            k_m: model.monodomain_stiffness(),
            theta,
            linear_solver_type,
            krylov,
            cache: None,
        })
    }

    fn build(&self, dt: f64) -> Result<Operator, Error> {
        let n = self.mass.len();
        let mut tri = sprs::TriMat::with_capacity((n, n), n + self.k_m.nnz());
        add_diagonal(&mut tri, &self.mass, 1.0 / dt, 0);
        add_block(&mut tri, &self.k_m, self.theta, 0, 0);
        let matrix: CsMat<f64> = tri.to_csr();
        match self.linear_solver_type {
            LinearSolverType::Direct => Ok(Operator::Factored(DenseLu::factor(&matrix)?)),
            LinearSolverType::Iterative => Ok(Operator::Krylov {
                inverse_diagonal: diagonal(&matrix).mapv(|d| 1.0 / d),
                matrix,
            }),
        }
    }
}

impl PdeSolver for MonodomainSolver {
    fn name(&self) -> &'static str {
        "MonodomainSolver"
    }

    fn step(
        &mut self,
        v: ArrayView1<f64>,
        vu: &mut MixedField,
        interval: Interval,
    ) -> Result<(), Error> {
        let (t0, t1) = interval;
        let dt = t1 - t0;
        let n = self.mass.len();
        super::check_vu(v, vu, n)?;

        let kv = spmv(&self.k_m, v);
        let b: Array1<f64> = (0..n)
            .map(|j| self.mass[j] * v[j] / dt - (1.0 - self.theta) * kv[j])
            .collect();

        let tolerance = 1e-12 * dt.abs().max(1.0);
        let (cached_dt, operator) = match self.cache.take() {
            Some((cached_dt, operator)) if (cached_dt - dt).abs() <= tolerance => (cached_dt, operator),
            _ => (dt, self.build(dt)?),
        };
        let x = match &operator {
            Operator::Factored(lu) => lu.solve(b.view())?,
            Operator::Krylov {
                matrix,
                inverse_diagonal,
            } => {
                let mut x = v.to_owned();
                let preconditioner = Some(inverse_diagonal);
                let report =
                    conjugate_gradient(matrix, b.view(), &mut x, preconditioner, &self.krylov)?;
                trace!(
                    "MonodomainSolver: CG converged in {} iterations ( residual: {:e} )",
                    report.iterations,
                    report.residual
                );
                x
            }
        };
        self.cache = Some((cached_dt, operator));

        vu.component_mut(0).assign(&x);
        vu.component_mut(1).fill(0.0);
        check_finite(vu)
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
            BoxMesh::unit_interval(10).unwrap(),
            Conductivity::Isotropic(1.0),
            Conductivity::Isotropic(1.0),
            Arc::new(NoCellModel::new()),
        ))
        .unwrap()
    }

    fn initial(n: usize) -> Array1<f64> {
        (0..n).map(|i| if i < n / 2 { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn conserves_charge() {
        let model = model();
        let mass = model.mass();
        let v0 = initial(11);
        let mut solver = MonodomainSolver::new(
            &model,
            0.5,
            LinearSolverType::Direct,
            KrylovParameters::default(),
        )
        .unwrap();
        let mut vu = MixedField::zeros(11, 2);
        solver.step(v0.view(), &mut vu, (0.0, 0.01)).unwrap();
        assert!((vu.component(0).dot(&mass) - v0.dot(&mass)).abs() < 1e-12);
        assert!(vu.component(1).iter().all(|&u| u == 0.0));
    }

    #[test]
    fn direct_and_iterative_agree() {
        let model = model();
        let v0 = initial(11);
        let mut results = Vec::new();
        for strategy in [LinearSolverType::Direct, LinearSolverType::Iterative] {
            let mut solver =
                MonodomainSolver::new(&model, 1.0, strategy, KrylovParameters::default()).unwrap();
            let mut vu = MixedField::zeros(11, 2);
            solver.step(v0.view(), &mut vu, (0.0, 0.01)).unwrap();
            results.push(vu);
        }
        let diff = &results[0].values() - &results[1].values();
        assert!(diff.iter().all(|d| d.abs() < 1e-8));
    }

    #[test]
    fn theta_outside_unit_interval_is_rejected() {
        let model = model();
        for theta in [0.0, -1.0, 1.5, f64::NAN] {
            let err = MonodomainSolver::new(
                &model,
                theta,
                LinearSolverType::Direct,
                KrylovParameters::default(),
            )
            .err()
            .unwrap();
            assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "theta"));
        }
    }
}
