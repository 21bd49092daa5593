use super::{check_len, CellModel, CellParameters};
use crate::Error;

/// Two-variable FitzHugh-Nagumo excitable cell, rescaled to physiological
/// potentials between `v_rest` and `v_peak`.
///
/// With `v_amp = v_peak - v_rest` and `v_th = v_rest + a * v_amp`:
///
/// ```text
/// I(v, s) = -c_1 (v - v_rest)(v - v_th)(v_peak - v) / v_amp^2 + c_2 s (v - v_rest) / v_amp
/// F(v, s) = b (v - v_rest - c_3 s)
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FitzHughNagumo {
    parameters: CellParameters,
    a: f64,
    b: f64,
    c_1: f64,
    c_2: f64,
    c_3: f64,
    v_peak: f64,
    v_rest: f64,
}

impl FitzHughNagumo {
    pub fn new() -> Self {
        Self::from_parameters(Self::defaults())
    }

    /// Builds a model with some of the default parameters replaced.
    pub fn with_parameters(overrides: &[(&str, f64)]) -> Result<Self, Error> {
        let parameters = Self::defaults().with_overrides("FitzHughNagumo", overrides)?;
        let model = Self::from_parameters(parameters);
        if model.v_peak <= model.v_rest {
            return Err(Error::InvalidParameter {
                name: "v_peak".to_string(),
                reason: format!(
                    "peak potential {} must exceed resting potential {}",
                    model.v_peak, model.v_rest
                ),
            });
        }
        Ok(model)
    }

    fn defaults() -> CellParameters {
        CellParameters::new([
            ("a", 0.13),
            ("b", 0.013),
            ("c_1", 0.26),
            ("c_2", 0.1),
            ("c_3", 1.0),
            ("v_peak", 40.0),
            ("v_rest", -85.0),
        ])
    }

    fn from_parameters(parameters: CellParameters) -> Self {
        let value = |name: &str| parameters.get(name).unwrap_or(f64::NAN);
        Self {
            a: value("a"),
            b: value("b"),
            c_1: value("c_1"),
            c_2: value("c_2"),
            c_3: value("c_3"),
            v_peak: value("v_peak"),
            v_rest: value("v_rest"),
            parameters,
        }
    }
}

impl Default for FitzHughNagumo {
    fn default() -> Self {
        Self::new()
    }
}

impl CellModel for FitzHughNagumo {
    fn name(&self) -> &str {
        "FitzHughNagumo"
    }

    fn default_parameters(&self) -> CellParameters {
        Self::defaults()
    }

    fn parameters(&self) -> &CellParameters {
        &self.parameters
    }

    fn num_states(&self) -> usize {
        1
    }

    fn current(&self, v: f64, s: &[f64]) -> Result<f64, Error> {
        check_len(1, s.len())?;
        let v_amp = self.v_peak - self.v_rest;
        let v_th = self.v_rest + self.a * v_amp;
        let v_rel = v - self.v_rest;
        Ok(-self.c_1 * v_rel * (v - v_th) * (self.v_peak - v) / (v_amp * v_amp)
            + self.c_2 * s[0] * v_rel / v_amp)
    }

    fn rhs(&self, v: f64, s: &[f64], ds: &mut [f64]) -> Result<(), Error> {
        check_len(1, s.len())?;
        check_len(1, ds.len())?;
        ds[0] = self.b * (v - self.v_rest - self.c_3 * s[0]);
        Ok(())
    }

    fn initial_conditions(&self) -> (f64, Vec<f64>) {
        (self.v_rest, vec![0.0])
    }
}
