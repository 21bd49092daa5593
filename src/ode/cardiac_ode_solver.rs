use log::trace;

use super::{check_finite, for_each_dof, pointwise_rhs, OdeSolver};
use crate::cellmodels::CellModel;
use crate::discretization::MixedField;
use crate::parameters::{CardiacOdeSolverParameters, OdeScheme, Parameters};
use crate::{CardiacModel, Error, Interval};

/// Reaction solver with explicit Runge-Kutta schemes, parallel over degrees
/// of freedom.
pub struct CardiacOdeSolver {
    model: CardiacModel,
    params: CardiacOdeSolverParameters,
}

/// Per-thread stage buffers.
struct Stages {
    y: Vec<f64>,
    tmp: Vec<f64>,
    k: [Vec<f64>; 4],
}

impl Stages {
    fn new(n: usize) -> Self {
        Self {
            y: vec![0.0; n],
            tmp: vec![0.0; n],
            k: [vec![0.0; n], vec![0.0; n], vec![0.0; n], vec![0.0; n]],
        }
    }
}

/// One explicit step of `scheme` for `y' = f(y)` with `f` frozen in time.
fn advance<F>(scheme: OdeScheme, f: &F, h: f64, st: &mut Stages) -> Result<(), Error>
where
    F: Fn(&[f64], &mut [f64]) -> Result<(), Error>,
{
    let Stages { y, tmp, k } = st;
    let [k1, k2, k3, k4] = k;
    match scheme {
        OdeScheme::ForwardEuler => {
            f(y.as_slice(), k1.as_mut_slice())?;
            axpy(y, h, k1);
        }
        OdeScheme::ExplicitMidpoint => {
            f(y.as_slice(), k1.as_mut_slice())?;
            offset(tmp, y, 0.5 * h, k1);
            f(tmp.as_slice(), k2.as_mut_slice())?;
            axpy(y, h, k2);
        }
        OdeScheme::Rk4 => {
            f(y.as_slice(), k1.as_mut_slice())?;
            offset(tmp, y, 0.5 * h, k1);
            f(tmp.as_slice(), k2.as_mut_slice())?;
            offset(tmp, y, 0.5 * h, k2);
            f(tmp.as_slice(), k3.as_mut_slice())?;
            offset(tmp, y, h, k3);
            f(tmp.as_slice(), k4.as_mut_slice())?;
            for i in 0..y.len() {
                y[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
            }
        }
    }
    Ok(())
}

fn axpy(y: &mut [f64], h: f64, k: &[f64]) {
    y.iter_mut().zip(k).for_each(|(y, k)| *y += h * k);
}

fn offset(out: &mut [f64], y: &[f64], h: f64, k: &[f64]) {
    for i in 0..out.len() {
        out[i] = y[i] + h * k[i];
    }
}

impl CardiacOdeSolver {
    #[inline]
    pub fn new(model: &CardiacModel, params: CardiacOdeSolverParameters) -> Result<Self, Error> {
        params.validate()?;
        Ok(Self {
            model: model.clone(),
            params,
        })
    }
}

impl OdeSolver for CardiacOdeSolver {
    fn name(&self) -> &'static str {
        "CardiacODESolver"
    }

    fn step(&mut self, vs: &mut MixedField, interval: Interval) -> Result<(), Error> {
        let (t0, t1) = interval;
        let substeps = self.params.num_substeps;
        let h = (t1 - t0) / substeps as f64;
        let scheme = self.params.scheme;
        let stimulus = self.model.stimulus_at(t0);
        let cell: &dyn CellModel = self.model.cell_model();
        let cm = self.model.membrane_capacitance();
        let n = vs.num_components();
        trace!("{}: {scheme:?} x {substeps} on [{t0}, {t1}]", self.name());

        for_each_dof(
            vs,
            &stimulus,
            || Stages::new(n),
            |st, _dof, mut row, stim| {
                if row.len() != st.y.len() {
                    return Err(Error::StateShape {
                        expected: st.y.len(),
                        found: row.len(),
                    });
                }
                for (yi, &ri) in st.y.iter_mut().zip(row.iter()) {
                    *yi = ri;
                }
                let f = |y: &[f64], dy: &mut [f64]| pointwise_rhs(cell, cm, stim, y, dy);
                for _ in 0..substeps {
                    advance(scheme, &f, h, st)?;
                }
                for (ri, &yi) in row.iter_mut().zip(st.y.iter()) {
                    *ri = yi;
                }
                Ok(())
            },
        )?;
        check_finite(vs)
    }
}
