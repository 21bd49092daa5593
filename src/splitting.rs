use std::fmt;

use indicatif::ProgressBar;
use log::{debug, info, trace};

use crate::discretization::MixedField;
use crate::linalg::KrylovParameters;
use crate::ode::{BasicCardiacOdeSolver, CardiacOdeSolver, OdeSolver};
use crate::parameters::{
    BasicSplittingParameters, Parameters, PdeModel, SplittingParameters, SplittingScheme,
};
use crate::pde::{BasicBidomainSolver, BidomainSolver, MonodomainSolver, PdeSolver};
use crate::{CardiacModel, Error};

/// A time interval `(t0, t1)`.
pub type Interval = (f64, f64);

/// Sub-steps of one splitting step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// First (or only) reaction sub-step.
    Reacting,
    Diffusing,
    /// Second reaction half step of Strang splitting.
    Reacting2,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Reacting => write!(f, "Reaction"),
            Stage::Diffusing => write!(f, "Diffusion"),
            Stage::Reacting2 => write!(f, "Second reaction"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    Idle,
    Reacting,
    Diffusing,
    Reacting2,
    /// The last requested run reached its end time.
    Done,
    /// A step failed; the solver refuses further work.
    Failed,
}

impl From<Stage> for SolverState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Reacting => SolverState::Reacting,
            Stage::Diffusing => SolverState::Diffusing,
            Stage::Reacting2 => SolverState::Reacting2,
        }
    }
}

/// Which sub-solvers a [`SplittingSolver`] was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverVariant {
    Basic,
    Optimised,
    Custom,
}

/// Observer of sub-step boundaries, e.g. for annotating an adjoint tape.
pub trait Recorder: Send {
    fn begin(&mut self, stage: Stage, interval: Interval);
    fn end(&mut self, stage: Stage, interval: Interval);
}

/// Borrowed view of the solver state.
#[derive(Clone, Copy, Debug)]
pub struct SolutionFields<'a> {
    /// `(v, s)` at the start of the last completed step.
    pub vs_prev: &'a MixedField,
    /// `(v, s)` at the end of the last completed step.
    pub vs: &'a MixedField,
    /// `(v, u)` from the last diffusion sub-step.
    pub vu: &'a MixedField,
    /// Lagrange multiplier of the average `u` constraint, when one is used.
    pub multiplier: Option<f64>,
}

/// Number of steps of size at most `dt` covering `[t0, t1]`.
///
/// Intervals that are an integer multiple of `dt` up to rounding are not
/// padded with a sliver step.
pub(crate) fn num_steps(t0: f64, t1: f64, dt: f64) -> Result<usize, Error> {
    let valid = t0.is_finite() && t1.is_finite() && dt.is_finite() && dt > 0.0 && t1 > t0;
    if !valid {
        return Err(Error::InvalidInterval { t0, t1, dt });
    }
    let ratio = (t1 - t0) / dt;
    let nearest = ratio.round();
    let n = if (ratio - nearest).abs() <= 1e-10 * nearest.max(1.0) {
        nearest
    } else {
        ratio.ceil()
    };
    Ok((n as usize).max(1))
}

/// Operator splitting solver for the bidomain and monodomain equations.
///
/// Owns the state `(v, s)` of the cell model at every vertex together with
/// the potentials `(v, u)` of the last diffusion sub-step.
pub struct SplittingSolver {
    model: CardiacModel,
    variant: SolverVariant,
    scheme: SplittingScheme,
    verbose: bool,
    ode: Box<dyn OdeSolver>,
    pde: Box<dyn PdeSolver>,
    vs_prev: MixedField,
    vs: MixedField,
    vu: MixedField,
    state: SolverState,
    recorder: Option<Box<dyn Recorder>>,
}

impl SplittingSolver {
    /// Reference solver built from the straightforward sub-solvers.
    ///
    /// With default parameters its end state matches [`SplittingSolver::optimised`]
    /// to about `1e-3` in norm. The theta rule is only second order, so under
    /// Godunov splitting each reaction sub-step is split in two unless
    /// `BasicCardiacODESolver.num_substeps` says otherwise.
    #[inline]
    pub fn basic(model: &CardiacModel, params: BasicSplittingParameters) -> Result<Self, Error> {
        params.validate()?;
        let mut ode_params = params.ode_solver;
        if ode_params.num_substeps.is_none() && params.scheme == SplittingScheme::Godunov {
            ode_params.num_substeps = Some(2);
        }
        let ode = Box::new(BasicCardiacOdeSolver::new(model, ode_params)?);
        let pde: Box<dyn PdeSolver> = match params.model {
            PdeModel::Bidomain => Box::new(BasicBidomainSolver::new(
                model,
                params.theta,
                params.pde_solver,
            )?),
            PdeModel::Monodomain => Box::new(MonodomainSolver::new(
                model,
                params.theta,
                params.pde_solver.linear_solver_type,
                KrylovParameters {
                    nonzero_initial_guess: false,
                    ..params.pde_solver.krylov_solver
                },
            )?),
        };
        let mut solver = Self::from_parts(model, params.scheme, ode, pde);
        solver.variant = SolverVariant::Basic;
        solver.verbose = params.verbose;
        Ok(solver)
    }

    /// Solver with parallel reaction steps and cached diffusion operators.
    #[inline]
    pub fn optimised(model: &CardiacModel, params: SplittingParameters) -> Result<Self, Error> {
        params.validate()?;
        let ode = Box::new(CardiacOdeSolver::new(model, params.ode_solver)?);
        let pde: Box<dyn PdeSolver> = match params.model {
            PdeModel::Bidomain => {
                Box::new(BidomainSolver::new(model, params.theta, params.pde_solver)?)
            }
            PdeModel::Monodomain => Box::new(MonodomainSolver::new(
                model,
                params.theta,
                params.pde_solver.linear_solver_type,
                params.pde_solver.krylov_solver,
            )?),
        };
        let mut solver = Self::from_parts(model, params.scheme, ode, pde);
        solver.variant = SolverVariant::Optimised;
        solver.verbose = params.verbose;
        Ok(solver)
    }

    /// Composes arbitrary sub-solvers. The state starts at the cell model's
    /// initial conditions.
    #[inline]
    pub fn from_parts(
        model: &CardiacModel,
        scheme: SplittingScheme,
        ode: Box<dyn OdeSolver>,
        pde: Box<dyn PdeSolver>,
    ) -> Self {
        let ndofs = model.domain().num_vertices();
        let (v0, s0) = model.cell_model().initial_conditions();
        let mut tuple = vec![v0];
        tuple.extend_from_slice(&s0);
        let vs = MixedField::constant(ndofs, &tuple);
        Self {
            model: model.clone(),
            variant: SolverVariant::Custom,
            scheme,
            verbose: false,
            ode,
            pde,
            vs_prev: vs.clone(),
            vs,
            vu: MixedField::constant(ndofs, &[v0, 0.0]),
            state: SolverState::Idle,
            recorder: None,
        }
    }

    /// Reports the start and end of every sub-step to `recorder`.
    pub fn with_recorder(mut self, recorder: Box<dyn Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// The cardiac model being solved.
    pub fn model(&self) -> &CardiacModel {
        &self.model
    }

    /// Which constructor built this solver.
    pub fn variant(&self) -> SolverVariant {
        self.variant
    }

    /// Splitting scheme used for every step.
    pub fn scheme(&self) -> SplittingScheme {
        self.scheme
    }

    /// Sub-step in progress, or how the last run ended.
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Sets the same `(v, s)` tuple at every vertex.
    pub fn set_initial_condition(&mut self, v0: f64, s0: &[f64]) -> Result<(), Error> {
        self.model.cell_model().check_state(s0)?;
        let mut tuple = vec![v0];
        tuple.extend_from_slice(s0);
        self.set_initial_field(&MixedField::constant(self.vs.ndofs(), &tuple))
    }

    /// Sets a spatially varying initial `(v, s)` field.
    pub fn set_initial_field(&mut self, vs: &MixedField) -> Result<(), Error> {
        self.vs.assign(vs)?;
        self.vs_prev.assign(vs)?;
        self.vu.component_mut(0).assign(&vs.component(0));
        self.vu.component_mut(1).fill(0.0);
        Ok(())
    }

    /// Borrows the current solution.
    pub fn solution_fields(&self) -> SolutionFields<'_> {
        SolutionFields {
            vs_prev: &self.vs_prev,
            vs: &self.vs,
            vu: &self.vu,
            multiplier: self.pde.multiplier(),
        }
    }

    /// Prepares a run over `interval` with time step `dt`.
    ///
    /// Nothing is computed until the returned [`Steps`] is advanced. The last
    /// step is shortened so the run ends exactly at `interval.1`.
    #[inline]
    pub fn solve(&mut self, interval: Interval, dt: f64) -> Result<Steps<'_>, Error> {
        if self.state == SolverState::Failed {
            return Err(Error::Failed);
        }
        let (t0, t1) = interval;
        let num_steps = num_steps(t0, t1, dt)?;
        info!(
            "{:?} splitting solver ({:?}, {} / {}): {num_steps} steps on [{t0}, {t1}] with dt = {dt}",
            self.variant,
            self.scheme,
            self.ode.name(),
            self.pde.name()
        );
        let bar = self.verbose.then(|| ProgressBar::new(num_steps as u64));
        self.state = SolverState::Idle;
        Ok(Steps {
            solver: self,
            t0,
            t1,
            dt,
            num_steps,
            next: 0,
            bar,
        })
    }

    fn step(&mut self, interval: Interval) -> Result<(), Error> {
        let (t0, t1) = interval;
        self.vs_prev.assign(&self.vs)?;
        match self.scheme {
            SplittingScheme::Strang => {
                let t_half = t0 + 0.5 * (t1 - t0);
                self.react(Stage::Reacting, (t0, t_half))?;
                self.diffuse(interval)?;
                self.react(Stage::Reacting2, (t_half, t1))?;
            }
            SplittingScheme::Godunov => {
                self.react(Stage::Reacting, interval)?;
                self.diffuse(interval)?;
            }
        }
        self.state = SolverState::Idle;
        Ok(())
    }

    fn react(&mut self, stage: Stage, interval: Interval) -> Result<(), Error> {
        self.begin(stage, interval);
        self.ode
            .step(&mut self.vs, interval)
            .map_err(|e| e.during(stage, interval.0))?;
        self.end(stage, interval);
        Ok(())
    }

    fn diffuse(&mut self, interval: Interval) -> Result<(), Error> {
        let stage = Stage::Diffusing;
        self.begin(stage, interval);
        self.pde
            .step(self.vs.component(0), &mut self.vu, interval)
            .map_err(|e| e.during(stage, interval.0))?;
        self.vs.component_mut(0).assign(&self.vu.component(0));
        self.end(stage, interval);
        Ok(())
    }

    fn begin(&mut self, stage: Stage, interval: Interval) {
        trace!("{stage} on [{}, {}]", interval.0, interval.1);
        self.state = stage.into();
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.begin(stage, interval);
        }
    }

    fn end(&mut self, stage: Stage, interval: Interval) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.end(stage, interval);
        }
    }
}

/// Lazily evaluated sequence of time steps.
///
/// Each call to [`Iterator::next`] performs one splitting step and yields its
/// interval. The solution after the step is available from
/// [`Steps::fields`] until the next call. Dropping the sequence early leaves
/// the solver at the last completed step.
pub struct Steps<'a> {
    solver: &'a mut SplittingSolver,
    t0: f64,
    t1: f64,
    dt: f64,
    num_steps: usize,
    next: usize,
    bar: Option<ProgressBar>,
}

impl<'a> Steps<'a> {
    /// Total number of steps in the run, including completed ones.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Interval of the `k`-th step; the last one ends exactly at `t1`.
    pub fn interval(&self, k: usize) -> Interval {
        let start = self.t0 + k as f64 * self.dt;
        let end = if k + 1 >= self.num_steps {
            self.t1
        } else {
            self.t0 + (k + 1) as f64 * self.dt
        };
        (start, end)
    }

    /// The solution after the last completed step.
    pub fn fields(&self) -> SolutionFields<'_> {
        self.solver.solution_fields()
    }

    /// Performs one step and lends out its interval together with the
    /// solution after it.
    ///
    /// ```no_run
    /// # use beatsplit::prelude::*;
    /// # fn demo(solver: &mut SplittingSolver) -> Result<(), Error> {
    /// let mut steps = solver.solve((0.0, 1.0), 0.1)?;
    /// while let Some(step) = steps.next_step() {
    ///     let ((_, t), fields) = step?;
    ///     println!("t = {t}: v[0] = {}", fields.vs.component(0)[0]);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    pub fn next_step(&mut self) -> Option<Result<(Interval, SolutionFields<'_>), Error>> {
        match self.next()? {
            Ok(interval) => Some(Ok((interval, self.fields()))),
            Err(e) => Some(Err(e)),
        }
    }

    /// Runs the remaining steps, returning the last interval.
    #[inline]
    pub fn run(mut self) -> Result<Option<Interval>, Error> {
        let mut last = None;
        for step in &mut self {
            last = Some(step?);
        }
        Ok(last)
    }
}

impl<'a> Iterator for Steps<'a> {
    type Item = Result<Interval, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.num_steps || self.solver.state == SolverState::Failed {
            return None;
        }
        let interval = self.interval(self.next);
        match self.solver.step(interval) {
            Ok(()) => {
                self.next += 1;
                debug!("Completed step {} of {}: t = {}", self.next, self.num_steps, interval.1);
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                if self.next == self.num_steps {
                    self.solver.state = SolverState::Done;
                    if let Some(bar) = self.bar.take() {
                        bar.finish();
                    }
                    info!("Reached t = {}", self.t1);
                }
                Some(Ok(interval))
            }
            Err(e) => {
                self.solver.state = SolverState::Failed;
                if let Some(bar) = self.bar.take() {
                    bar.abandon();
                }
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_steps.saturating_sub(self.next);
        (0, Some(remaining))
    }
}

impl<'a> Drop for Steps<'a> {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}
