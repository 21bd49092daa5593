//! Hierarchical solver parameters.
//!
//! Every parameter set serializes to a JSON object whose keys are the
//! parameter names, nested parameter sets appearing as sub-objects. Sets can be
//! loaded with [`Parameters::from_value`] or edited one entry at a time with
//! dotted keys, e.g. `"BidomainSolver.linear_solver_type"`. Unknown keys are
//! rejected in both cases.

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::linalg::{KrylovParameters, LinearSolverType};
use crate::Error;

/// Operations shared by all parameter sets.
pub trait Parameters: Serialize + DeserializeOwned + Default {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Checks value ranges; called after every update.
    fn validate(&self) -> Result<(), Error>;

    fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        let params: Self = serde_json::from_value(value)?;
        params.validate()?;
        Ok(params)
    }

    /// Looks up a (possibly dotted) key.
    fn get(&self, key: &str) -> Result<serde_json::Value, Error> {
        let tree = serde_json::to_value(self)?;
        key.split('.')
            .try_fold(&tree, |node, part| node.get(part))
            .cloned()
            .ok_or_else(|| Error::UnknownParameter {
                owner: Self::NAME.to_string(),
                name: key.to_string(),
            })
    }

    /// Replaces the value under a (possibly dotted) key.
    ///
    /// On error `self` is left unchanged.
    fn set<V: Serialize>(&mut self, key: &str, value: V) -> Result<(), Error> {
        let mut tree = serde_json::to_value(&*self)?;
        let mut node = &mut tree;
        for part in key.split('.') {
            node = node.get_mut(part).ok_or_else(|| Error::UnknownParameter {
                owner: Self::NAME.to_string(),
                name: key.to_string(),
            })?;
        }
        *node = serde_json::to_value(value)?;
        let updated: Self =
            serde_json::from_value(tree).map_err(|e| Error::InvalidParameter {
                name: key.to_string(),
                reason: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// Order in which reaction and diffusion sub-steps are composed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplittingScheme {
    /// Reaction over the full step, then diffusion. First order.
    Godunov,
    /// Half reaction, full diffusion, half reaction. Second order.
    #[default]
    Strang,
}

/// Tissue equations solved in the diffusion sub-step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdeModel {
    #[default]
    Bidomain,
    Monodomain,
}

/// Explicit schemes of the optimised reaction solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OdeScheme {
    ForwardEuler,
    ExplicitMidpoint,
    #[default]
    Rk4,
}

pub(crate) fn check_theta(theta: f64) -> Result<(), Error> {
    if !(theta > 0.0 && theta <= 1.0) {
        return Err(Error::InvalidParameter {
            name: "theta".to_string(),
            reason: format!("expected a value in (0, 1], got {theta}"),
        });
    }
    if theta < 0.5 {
        warn!("theta = {theta} < 0.5: the time discretization is not unconditionally stable");
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NewtonParameters {
    pub relative_tolerance: f64,
    pub maximum_iterations: usize,
}

impl Default for NewtonParameters {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-12,
            maximum_iterations: 25,
        }
    }
}

/// Parameters of the reference reaction solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BasicCardiacOdeSolverParameters {
    /// Implicitness of the pointwise theta rule.
    pub theta: f64,
    /// Theta rule steps per reaction sub-step. Unset, the splitting solver
    /// takes one under Strang splitting and two under Godunov splitting, so
    /// that each theta step spans half a time step with either scheme.
    pub num_substeps: Option<usize>,
    #[serde(rename = "S_polynomial_family")]
    pub s_polynomial_family: String,
    #[serde(rename = "S_polynomial_degree")]
    pub s_polynomial_degree: u32,
    pub newton_solver: NewtonParameters,
}

impl Default for BasicCardiacOdeSolverParameters {
    fn default() -> Self {
        Self {
            theta: 0.5,
            num_substeps: None,
            s_polynomial_family: "CG".to_string(),
            s_polynomial_degree: 1,
            newton_solver: NewtonParameters::default(),
        }
    }
}

impl Parameters for BasicCardiacOdeSolverParameters {
    const NAME: &'static str = "BasicCardiacODESolver";

    fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.theta) {
            return Err(Error::InvalidParameter {
                name: "theta".to_string(),
                reason: format!("expected a value in [0, 1], got {}", self.theta),
            });
        }
        if self.num_substeps == Some(0) {
            return Err(Error::InvalidParameter {
                name: "num_substeps".to_string(),
                reason: "at least one sub-step is required".to_string(),
            });
        }
        let lagrange = matches!(self.s_polynomial_family.as_str(), "CG" | "Lagrange");
        if !lagrange || self.s_polynomial_degree != 1 {
            return Err(Error::UnsupportedFunctionSpace {
                family: self.s_polynomial_family.clone(),
                degree: self.s_polynomial_degree,
            });
        }
        if self.newton_solver.maximum_iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "newton_solver.maximum_iterations".to_string(),
                reason: "at least one iteration is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameters of the optimised reaction solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CardiacOdeSolverParameters {
    pub scheme: OdeScheme,
    /// Explicit sub-steps per reaction sub-step.
    pub num_substeps: usize,
}

impl Default for CardiacOdeSolverParameters {
    fn default() -> Self {
        Self {
            scheme: OdeScheme::default(),
            num_substeps: 1,
        }
    }
}

impl Parameters for CardiacOdeSolverParameters {
    const NAME: &'static str = "CardiacODESolver";

    fn validate(&self) -> Result<(), Error> {
        if self.num_substeps == 0 {
            return Err(Error::InvalidParameter {
                name: "num_substeps".to_string(),
                reason: "at least one sub-step is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameters of the reference diffusion solver, also used for the
/// monodomain reduction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BasicBidomainSolverParameters {
    pub linear_solver_type: LinearSolverType,
    pub krylov_solver: KrylovParameters,
}

impl Default for BasicBidomainSolverParameters {
    fn default() -> Self {
        Self {
            linear_solver_type: LinearSolverType::Direct,
            krylov_solver: KrylovParameters::default(),
        }
    }
}

impl Parameters for BasicBidomainSolverParameters {
    const NAME: &'static str = "BasicBidomainSolver";

    fn validate(&self) -> Result<(), Error> {
        self.krylov_solver.validate()
    }
}

/// Parameters of the optimised diffusion solver, also used for the
/// monodomain reduction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BidomainSolverParameters {
    pub linear_solver_type: LinearSolverType,
    /// With the direct strategy, fix the null space of the extracellular
    /// potential with a Lagrange multiplier enforcing a zero average instead
    /// of pinning one vertex. Has no effect with the iterative strategy,
    /// which always projects `u` onto zero average.
    pub use_avg_u_constraint: bool,
    /// Jacobi preconditioning for the iterative strategy.
    pub use_preconditioner: bool,
    pub krylov_solver: KrylovParameters,
}

impl Default for BidomainSolverParameters {
    fn default() -> Self {
        Self {
            linear_solver_type: LinearSolverType::Iterative,
            use_avg_u_constraint: false,
            use_preconditioner: true,
            krylov_solver: KrylovParameters {
                nonzero_initial_guess: true,
                ..KrylovParameters::default()
            },
        }
    }
}

impl Parameters for BidomainSolverParameters {
    const NAME: &'static str = "BidomainSolver";

    fn validate(&self) -> Result<(), Error> {
        self.krylov_solver.validate()
    }
}

/// Parameters of the reference splitting solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BasicSplittingParameters {
    /// Implicitness of the diffusion sub-step, in `(0, 1]`.
    pub theta: f64,
    pub scheme: SplittingScheme,
    pub model: PdeModel,
    /// Display a progress bar while stepping.
    pub verbose: bool,
    #[serde(rename = "BasicCardiacODESolver")]
    pub ode_solver: BasicCardiacOdeSolverParameters,
    #[serde(rename = "BasicBidomainSolver")]
    pub pde_solver: BasicBidomainSolverParameters,
}

impl Default for BasicSplittingParameters {
    fn default() -> Self {
        Self {
            theta: 0.5,
            scheme: SplittingScheme::default(),
            model: PdeModel::default(),
            verbose: false,
            ode_solver: BasicCardiacOdeSolverParameters::default(),
            pde_solver: BasicBidomainSolverParameters::default(),
        }
    }
}

impl Parameters for BasicSplittingParameters {
    const NAME: &'static str = "BasicSplittingSolver";

    fn validate(&self) -> Result<(), Error> {
        check_theta(self.theta)?;
        self.ode_solver.validate()?;
        self.pde_solver.validate()
    }
}

/// Parameters of the optimised splitting solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SplittingParameters {
    /// Implicitness of the diffusion sub-step, in `(0, 1]`.
    pub theta: f64,
    pub scheme: SplittingScheme,
    pub model: PdeModel,
    /// Display a progress bar while stepping.
    pub verbose: bool,
    #[serde(rename = "CardiacODESolver")]
    pub ode_solver: CardiacOdeSolverParameters,
    #[serde(rename = "BidomainSolver")]
    pub pde_solver: BidomainSolverParameters,
}

impl Default for SplittingParameters {
    fn default() -> Self {
        Self {
            theta: 0.5,
            scheme: SplittingScheme::default(),
            model: PdeModel::default(),
            verbose: false,
            ode_solver: CardiacOdeSolverParameters::default(),
            pde_solver: BidomainSolverParameters::default(),
        }
    }
}

impl Parameters for SplittingParameters {
    const NAME: &'static str = "SplittingSolver";

    fn validate(&self) -> Result<(), Error> {
        check_theta(self.theta)?;
        self.ode_solver.validate()?;
        self.pde_solver.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_nested_key() {
        let mut params = SplittingParameters::default();
        params
            .set("BidomainSolver.linear_solver_type", "direct")
            .unwrap();
        params.set("BidomainSolver.use_avg_u_constraint", true).unwrap();
        assert_eq!(params.pde_solver.linear_solver_type, LinearSolverType::Direct);
        assert!(params.pde_solver.use_avg_u_constraint);
        assert_eq!(params.get("BidomainSolver.use_avg_u_constraint").unwrap(), json!(true));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut params = BasicSplittingParameters::default();
        let err = params.set("BasicBidomainSolver.preconditioner", "ilu").unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { .. }));
        assert!(err.is_configuration());
        assert!(params.get("nonexistent").is_err());
    }

    #[test]
    fn ill_typed_value_leaves_parameters_unchanged() {
        let mut params = SplittingParameters::default();
        assert!(params.set("theta", "half").is_err());
        assert!(params.set("theta", 0.0).is_err());
        assert_eq!(params, SplittingParameters::default());
    }

    #[test]
    fn from_value_with_defaults() {
        let params = BasicSplittingParameters::from_value(json!({
            "theta": 1.0,
            "scheme": "godunov",
            "BasicCardiacODESolver": { "S_polynomial_degree": 1 },
        }))
        .unwrap();
        assert_eq!(params.scheme, SplittingScheme::Godunov);
        assert_eq!(params.theta, 1.0);
        assert_eq!(params.ode_solver.s_polynomial_family, "CG");

        assert!(BasicSplittingParameters::from_value(json!({ "thetta": 1.0 })).is_err());
    }

    #[test]
    fn unsupported_state_space() {
        let mut params = BasicCardiacOdeSolverParameters::default();
        let err = params.set("S_polynomial_family", "DG").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFunctionSpace { .. }));
        let err = params.set("S_polynomial_degree", 2).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFunctionSpace { degree: 2, .. }));
    }

    #[test]
    fn optional_sub_steps() {
        let mut params = BasicSplittingParameters::default();
        assert_eq!(params.get("BasicCardiacODESolver.num_substeps").unwrap(), json!(null));
        params.set("BasicCardiacODESolver.num_substeps", 4).unwrap();
        assert_eq!(params.ode_solver.num_substeps, Some(4));
        let err = params.set("BasicCardiacODESolver.num_substeps", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert_eq!(params.ode_solver.num_substeps, Some(4));
    }

    #[test]
    fn defaults() {
        let basic = BasicSplittingParameters::default();
        assert_eq!(basic.pde_solver.linear_solver_type, LinearSolverType::Direct);
        let optimised = SplittingParameters::default();
        assert_eq!(optimised.pde_solver.linear_solver_type, LinearSolverType::Iterative);
        assert!(!optimised.pde_solver.use_avg_u_constraint);
        assert_eq!(optimised.scheme, SplittingScheme::Strang);
    }
}
