use log::trace;
use nalgebra::{DMatrix, DVector};

use super::{check_finite, pointwise_rhs, OdeSolver};
use crate::discretization::MixedField;
use crate::parameters::{BasicCardiacOdeSolverParameters, Parameters};
use crate::{CardiacModel, Error, Interval};

/// Reference reaction solver: the pointwise theta rule
///
/// ```text
/// y1 - y0 = dt * (theta * f(y1) + (1 - theta) * f(y0))
/// ```
///
/// solved at one degree of freedom at a time with Newton's method and a
/// finite difference Jacobian. Each reaction sub-step is split into
/// `num_substeps` theta steps, one when unset.
pub struct BasicCardiacOdeSolver {
    model: CardiacModel,
    params: BasicCardiacOdeSolverParameters,
}

impl BasicCardiacOdeSolver {
    #[inline]
    pub fn new(model: &CardiacModel, params: BasicCardiacOdeSolverParameters) -> Result<Self, Error> {
        params.validate()?;
        Ok(Self {
            model: model.clone(),
            params,
        })
    }

    fn solve_point(
        &self,
        dof: usize,
        y: &mut [f64],
        stimulus: f64,
        dt: f64,
    ) -> Result<(), Error> {
        let n = y.len();
        let theta = self.params.theta;
        let cell = self.model.cell_model();
        let cm = self.model.membrane_capacitance();
        let f = |y: &[f64], dy: &mut [f64]| pointwise_rhs(cell, cm, stimulus, y, dy);

        let y0 = y.to_vec();
        let mut f0 = vec![0.0; n];
        f(y0.as_slice(), f0.as_mut_slice())?;

        let mut f1 = vec![0.0; n];
        let mut shifted = vec![0.0; n];
        let mut f_shifted = vec![0.0; n];
        let newton = &self.params.newton_solver;
        let mut update = f64::INFINITY;
        for _ in 0..newton.maximum_iterations {
            f(&*y, f1.as_mut_slice())?;
            let residual = DVector::from_fn(n, |i, _| {
                y[i] - y0[i] - dt * (theta * f1[i] + (1.0 - theta) * f0[i])
            });

            let mut jacobian = DMatrix::<f64>::identity(n, n);
            if theta > 0.0 {
                for j in 0..n {
                    let eps = 1e-7 * y[j].abs().max(1.0);
                    shifted.copy_from_slice(y);
                    shifted[j] += eps;
                    f(shifted.as_slice(), f_shifted.as_mut_slice())?;
                    for i in 0..n {
                        jacobian[(i, j)] -= dt * theta * (f_shifted[i] - f1[i]) / eps;
                    }
                }
            }

            let delta = jacobian
                .lu()
                .solve(&residual)
                .ok_or(Error::NewtonDivergence { dof, update })?;
            for (yi, di) in y.iter_mut().zip(delta.iter()) {
                *yi -= di;
            }
            update = delta.amax();
            let scale = y.iter().fold(1.0_f64, |m, yi| m.max(yi.abs()));
            if !update.is_finite() {
                break;
            }
            if update <= newton.relative_tolerance * scale {
                return Ok(());
            }
        }
        Err(Error::NewtonDivergence { dof, update })
    }
}

impl OdeSolver for BasicCardiacOdeSolver {
    fn name(&self) -> &'static str {
        "BasicCardiacODESolver"
    }

    fn step(&mut self, vs: &mut MixedField, interval: Interval) -> Result<(), Error> {
        let (t0, t1) = interval;
        let substeps = self.params.num_substeps.unwrap_or(1);
        let h = (t1 - t0) / substeps as f64;
        let stimulus = self.model.stimulus_at(t0);
        trace!("{}: theta rule x {substeps} on [{t0}, {t1}]", self.name());

        let mut y = vec![0.0; vs.num_components()];
        let mut values = vs.values_mut();
        for (dof, mut row) in values.rows_mut().into_iter().enumerate() {
            for (yi, &ri) in y.iter_mut().zip(row.iter()) {
                *yi = ri;
            }
            for _ in 0..substeps {
                self.solve_point(dof, &mut y, stimulus[dof], h)?;
            }
            for (ri, &yi) in row.iter_mut().zip(&y) {
                *ri = yi;
            }
        }
        check_finite(vs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cellmodels::{CellModel, FitzHughNagumo, NoCellModel};
    use crate::discretization::BoxMesh;
    use crate::ode::CardiacOdeSolver;
    use crate::parameters::CardiacOdeSolverParameters;
    use crate::{forcing, CardiacModelDescriptor, Conductivity};
    use std::sync::Arc;

    fn model_with(cell_model: Arc<dyn CellModel>, stimulus: f64) -> CardiacModel {
        let mut desc = CardiacModelDescriptor::new(
            BoxMesh::unit_interval(3).unwrap(),
            Conductivity::Isotropic(1.0),
            Conductivity::Isotropic(1.0),
            cell_model,
        );
        desc.stimulus = Some(forcing::constant(stimulus));
        CardiacModel::new(desc).unwrap()
    }

    fn model(stimulus: f64) -> CardiacModel {
        model_with(Arc::new(FitzHughNagumo::new()), stimulus)
    }

    #[test]
    fn pure_stimulus_is_integrated_exactly() {
        let passive = model_with(Arc::new(NoCellModel::new()), 2.0);
        let mut solver =
            BasicCardiacOdeSolver::new(&passive, BasicCardiacOdeSolverParameters::default())
                .unwrap();
        let mut vs = MixedField::constant(4, &[0.0, 0.0]);
        solver.step(&mut vs, (0.0, 0.1)).unwrap();
        for v in vs.component(0).iter() {
            assert!((v - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn explicit_and_implicit_rules_agree_for_small_steps() {
        let stimulated = model(2.0);
        let mut vs_explicit = MixedField::constant(4, &[-60.0, 0.5]);
        let mut vs_implicit = vs_explicit.clone();
        let explicit = BasicCardiacOdeSolverParameters {
            theta: 0.0,
            ..Default::default()
        };
        BasicCardiacOdeSolver::new(&stimulated, explicit)
            .unwrap()
            .step(&mut vs_explicit, (0.0, 1e-4))
            .unwrap();
        BasicCardiacOdeSolver::new(&stimulated, BasicCardiacOdeSolverParameters::default())
            .unwrap()
            .step(&mut vs_implicit, (0.0, 1e-4))
            .unwrap();
        let diff = &vs_explicit.values() - &vs_implicit.values();
        assert!(diff.iter().all(|d| d.abs() < 1e-8));
    }

    #[test]
    fn sub_steps_approach_the_exact_solution() {
        let stimulated = model(50.0);
        let interval = (0.0, 0.1);
        let mut reference = MixedField::constant(4, &[-70.0, 0.0]);
        let fine = CardiacOdeSolverParameters {
            num_substeps: 100,
            ..Default::default()
        };
        CardiacOdeSolver::new(&stimulated, fine)
            .unwrap()
            .step(&mut reference, interval)
            .unwrap();

        let error = |num_substeps| {
            let params = BasicCardiacOdeSolverParameters {
                num_substeps,
                ..Default::default()
            };
            let mut vs = MixedField::constant(4, &[-70.0, 0.0]);
            BasicCardiacOdeSolver::new(&stimulated, params)
                .unwrap()
                .step(&mut vs, interval)
                .unwrap();
            (&vs.values() - &reference.values())
                .iter()
                .fold(0.0_f64, |m, d| m.max(d.abs()))
        };
        let single = error(None);
        assert_eq!(single, error(Some(1)));
        let quarter = error(Some(4));
        assert!(single > 0.0);
        // second order: four sub-steps cut the error by about sixteen
        assert!(quarter < single / 8.0, "{quarter:e} vs {single:e}");
    }

    #[test]
    fn zero_sub_steps_are_rejected() {
        let params = BasicCardiacOdeSolverParameters {
            num_substeps: Some(0),
            ..Default::default()
        };
        let err = BasicCardiacOdeSolver::new(&model(0.0), params).err().unwrap();
        assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "num_substeps"));
    }

    #[test]
    fn wrong_state_width_is_rejected() {
        let mut solver =
            BasicCardiacOdeSolver::new(&model(0.0), BasicCardiacOdeSolverParameters::default())
                .unwrap();
        let mut vs = MixedField::constant(4, &[-85.0, 0.0, 0.0]);
        let err = solver.step(&mut vs, (0.0, 0.1)).unwrap_err();
        assert!(matches!(err, Error::StateShape { .. }));
    }
}
