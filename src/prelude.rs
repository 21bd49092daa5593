//! Includes commonly used library components.

pub use crate::{
    CardiacModel,
    CardiacModelDescriptor,
    Conductivity,
    Error,
    Interval,
    Recorder,
    SolutionFields,
    SolverState,
    SolverVariant,
    SplittingSolver,
    Stage,
    Steps,
};
pub use crate::cellmodels::{CellModel, CellParameters, FitzHughNagumo, NoCellModel};
pub use crate::discretization::{BoxMesh, MixedField};
pub use crate::linalg::LinearSolverType;
pub use crate::parameters::{
    BasicSplittingParameters,
    Parameters,
    PdeModel,
    SplittingParameters,
    SplittingScheme,
};
