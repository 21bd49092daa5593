//! A framework for integrating the bidomain and monodomain equations of cardiac
//! electrophysiology with operator splitting.
//!
//! Each time step is decomposed into a pointwise reaction sub-step, driven by a
//! [`cellmodels::CellModel`], and a diffusion sub-step solving the discretized
//! tissue equations. The [`SplittingSolver`] composes the two with either
//! Godunov (first order) or Strang (second order) splitting and exposes the run
//! as a lazily evaluated sequence of steps.
//!
//! To get started, refer to the `demos` directory in the main repository.

mod cardiac_model;
mod splitting;

pub mod cellmodels;
pub mod discretization;
pub mod forcing;
pub mod linalg;
pub mod ode;
#[cfg(feature = "hdf5")]
pub mod output;
pub mod parameters;
pub mod pde;
pub mod prelude;

pub use cardiac_model::{CardiacModel, CardiacModelDescriptor, Conductivity};
pub use splitting::{
    Interval, Recorder, SolutionFields, SolverState, SolverVariant, SplittingSolver, Stage, Steps,
};

use linalg::LinearSolverType;

/// Represents an error in the simulation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unknown parameter `{name}` for {owner}")]
    UnknownParameter { owner: String, name: String },
    #[error("Invalid value for parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("State tuple does not have expected length \
        ( state length: {found}, expected length: {expected} )")]
    StateShape { expected: usize, found: usize },
    #[error("{which} conductivity is incompatible with a {dim}-dimensional domain: {reason}")]
    IncompatibleConductivity {
        which: &'static str,
        dim: usize,
        reason: String,
    },
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    #[error("Invalid time interval ( t0: {t0}, T: {t1}, dt: {dt} )")]
    InvalidInterval { t0: f64, t1: f64, dt: f64 },
    #[error("Unsupported function space `{family}` of degree {degree} for the cell state")]
    UnsupportedFunctionSpace { family: String, degree: u32 },
    #[error("{field} contains a non-finite value at degree of freedom {dof}")]
    NonFinite { field: &'static str, dof: usize },
    #[error("Pointwise Newton iteration did not converge at degree of freedom {dof} \
        ( last update: {update:e} )")]
    NewtonDivergence { dof: usize, update: f64 },
    #[error("{strategy} linear solve failed: {reason}")]
    LinearSolve {
        strategy: LinearSolverType,
        reason: String,
    },
    #[error("{stage} sub-step failed at t = {time}: {source}")]
    Step {
        time: f64,
        stage: Stage,
        source: Box<Error>,
    },
    #[error("Solver failed during an earlier step and must be discarded")]
    Failed,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    H5Error(#[from] hdf5::Error),
}

impl Error {
    /// Whether the error was raised while validating inputs, before any time stepping.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownParameter { .. }
                | Error::InvalidParameter { .. }
                | Error::StateShape { .. }
                | Error::IncompatibleConductivity { .. }
                | Error::InvalidDomain(_)
                | Error::InvalidInterval { .. }
                | Error::UnsupportedFunctionSpace { .. }
                | Error::Json(_)
        )
    }

    /// Whether the error is a numerical failure of a sub-step.
    pub fn is_numerical(&self) -> bool {
        match self {
            Error::NonFinite { .. } | Error::NewtonDivergence { .. } | Error::LinearSolve { .. } => {
                true
            }
            Error::Step { source, .. } => source.is_numerical(),
            _ => false,
        }
    }

    /// Attaches the simulation time and sub-step to a numerical failure.
    pub(crate) fn during(self, stage: Stage, time: f64) -> Self {
        Error::Step {
            time,
            stage,
            source: Box::new(self),
        }
    }
}
