//! Reaction sub-step: the cell model integrated independently at every
//! degree of freedom.

mod basic_ode_solver;
mod cardiac_ode_solver;

pub use basic_ode_solver::BasicCardiacOdeSolver;
pub use cardiac_ode_solver::CardiacOdeSolver;

use ndarray::{Array1, ArrayViewMut1, Axis};

use crate::cellmodels::CellModel;
use crate::discretization::MixedField;
use crate::{Error, Interval};

/// Advances the `(v, s)` field over one interval.
pub trait OdeSolver: Send {
    fn name(&self) -> &'static str;

    /// Integrates `vs` in place from `interval.0` to `interval.1`.
    fn step(&mut self, vs: &mut MixedField, interval: Interval) -> Result<(), Error>;
}

/// Right hand side of the pointwise system for `y = (v, s)`.
pub(crate) fn pointwise_rhs(
    cell: &dyn CellModel,
    capacitance: f64,
    stimulus: f64,
    y: &[f64],
    dy: &mut [f64],
) -> Result<(), Error> {
    let (v, s) = (y[0], &y[1..]);
    dy[0] = -cell.current(v, s)? / capacitance + stimulus;
    cell.rhs(v, s, &mut dy[1..])
}

/// Runs `f(scratch, dof, row, stimulus[dof])` over every row of `vs`, in
/// parallel when the `parallel` feature is enabled.
pub(crate) fn for_each_dof<S, I, F>(
    vs: &mut MixedField,
    stimulus: &Array1<f64>,
    init: I,
    f: F,
) -> Result<(), Error>
where
    S: Send,
    I: Fn() -> S + Send + Sync,
    F: Fn(&mut S, usize, ArrayViewMut1<f64>, f64) -> Result<(), Error> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use ndarray::parallel::prelude::*;

        vs.values_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .try_for_each_init(init, |scratch, (dof, row)| {
                f(scratch, dof, row, stimulus[dof])
            })
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut scratch = init();
        vs.values_mut()
            .axis_iter_mut(Axis(0))
            .enumerate()
            .try_for_each(|(dof, row)| f(&mut scratch, dof, row, stimulus[dof]))
    }
}

pub(crate) fn check_finite(vs: &MixedField) -> Result<(), Error> {
    match vs.first_non_finite() {
        Some(dof) => Err(Error::NonFinite { field: "vs", dof }),
        None => Ok(()),
    }
}
