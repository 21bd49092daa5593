use super::{check_len, CellModel, CellParameters};
use crate::Error;

/// Passive tissue: no ionic current and a single inert state variable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoCellModel {
    parameters: CellParameters,
}

impl NoCellModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CellModel for NoCellModel {
    fn name(&self) -> &str {
        "NoCellModel"
    }

    fn default_parameters(&self) -> CellParameters {
        CellParameters::default()
    }

    fn parameters(&self) -> &CellParameters {
        &self.parameters
    }

    fn num_states(&self) -> usize {
        1
    }

    fn current(&self, _v: f64, s: &[f64]) -> Result<f64, Error> {
        check_len(1, s.len())?;
        Ok(0.0)
    }

    fn rhs(&self, _v: f64, s: &[f64], ds: &mut [f64]) -> Result<(), Error> {
        check_len(1, s.len())?;
        check_len(1, ds.len())?;
        ds[0] = 0.0;
        Ok(())
    }

    fn initial_conditions(&self) -> (f64, Vec<f64>) {
        (0.0, vec![0.0])
    }
}
