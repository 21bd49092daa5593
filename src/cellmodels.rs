//! Cell models describing the ionic current and the evolution of the cell
//! state variables at a single point of tissue.

mod fitzhugh_nagumo;
mod no_cell_model;

pub use fitzhugh_nagumo::FitzHughNagumo;
pub use no_cell_model::NoCellModel;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::Error;

/// A pointwise model `dv/dt = -I(v, s) / C_m + stimulus`, `ds/dt = F(v, s)`.
///
/// Implementations are evaluated concurrently from several threads.
pub trait CellModel: Send + Sync {
    fn name(&self) -> &str;

    fn default_parameters(&self) -> CellParameters;

    /// Parameters in effect for this instance.
    fn parameters(&self) -> &CellParameters;

    /// Number of state variables `s`, excluding the membrane potential.
    fn num_states(&self) -> usize;

    /// Ionic current `I(v, s)`.
    fn current(&self, v: f64, s: &[f64]) -> Result<f64, Error>;

    /// Writes `F(v, s)` into `ds`.
    fn rhs(&self, v: f64, s: &[f64], ds: &mut [f64]) -> Result<(), Error>;

    /// Resting `(v, s)` tuple.
    fn initial_conditions(&self) -> (f64, Vec<f64>);

    fn check_state(&self, s: &[f64]) -> Result<(), Error> {
        check_len(self.num_states(), s.len())
    }
}

pub(crate) fn check_len(expected: usize, found: usize) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::StateShape { expected, found })
    }
}

/// Named scalar parameters of a cell model.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CellParameters {
    values: BTreeMap<String, f64>,
}

impl CellParameters {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            values: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Applies overrides, rejecting names that are not already present.
    pub fn with_overrides(&self, owner: &str, overrides: &[(&str, f64)]) -> Result<Self, Error> {
        let mut updated = self.clone();
        for &(name, value) in overrides {
            match updated.values.get_mut(name) {
                None => {
                    return Err(Error::UnknownParameter {
                        owner: owner.to_string(),
                        name: name.to_string(),
                    })
                }
                Some(_) if !value.is_finite() => {
                    return Err(Error::InvalidParameter {
                        name: name.to_string(),
                        reason: format!("expected a finite value, got {value}"),
                    })
                }
                Some(slot) => *slot = value,
            }
        }
        Ok(updated)
    }
}
