use std::fmt;
use std::sync::Arc;

use ndarray::Array1;
use sprs::CsMat;

use crate::cellmodels::CellModel;
use crate::discretization::{self, BoxMesh};
use crate::forcing::{self, Forcing};
use crate::Error;

/// Conductivity tensor of one tissue domain.
///
/// Tensors are diagonal in the coordinate axes, which is what the two-point
/// flux discretization on an axis-aligned box can represent.
#[derive(Clone)]
pub enum Conductivity {
    /// The same scalar along every axis.
    Isotropic(f64),
    /// One value per axis; the length must match the domain dimension.
    Diagonal(Vec<f64>),
    /// `sigma(axis, x)`, evaluated at edge midpoints.
    Heterogeneous(Arc<dyn Fn(usize, [f64; 3]) -> f64 + Send + Sync>),
}

impl Conductivity {
    pub fn heterogeneous<F>(sigma: F) -> Self
    where
        F: Fn(usize, [f64; 3]) -> f64 + Send + Sync + 'static,
    {
        Conductivity::Heterogeneous(Arc::new(sigma))
    }

    pub fn eval(&self, axis: usize, x: [f64; 3]) -> f64 {
        match self {
            Conductivity::Isotropic(sigma) => *sigma,
            Conductivity::Diagonal(sigma) => sigma[axis],
            Conductivity::Heterogeneous(sigma) => sigma(axis, x),
        }
    }

    fn validate(&self, which: &'static str, mesh: &BoxMesh) -> Result<(), Error> {
        let incompatible = |reason: String| Error::IncompatibleConductivity {
            which,
            dim: mesh.dim(),
            reason,
        };
        match self {
            Conductivity::Isotropic(sigma) => check_value(*sigma).map_err(incompatible),
            Conductivity::Diagonal(sigma) => {
                if sigma.len() != mesh.dim() {
                    return Err(incompatible(format!(
                        "{} diagonal entries given",
                        sigma.len()
                    )));
                }
                sigma
                    .iter()
                    .try_for_each(|&s| check_value(s))
                    .map_err(incompatible)
            }
            Conductivity::Heterogeneous(sigma) => mesh
                .edges()
                .iter()
                .try_for_each(|edge| check_value(sigma(edge.axis, edge.midpoint)))
                .map_err(incompatible),
        }
    }
}

fn check_value(sigma: f64) -> Result<(), String> {
    if sigma.is_finite() && sigma >= 0.0 {
        Ok(())
    } else {
        Err(format!("conductivity {sigma} is not a non-negative number"))
    }
}

impl fmt::Debug for Conductivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conductivity::Isotropic(sigma) => f.debug_tuple("Isotropic").field(sigma).finish(),
            Conductivity::Diagonal(sigma) => f.debug_tuple("Diagonal").field(sigma).finish(),
            Conductivity::Heterogeneous(_) => f.write_str("Heterogeneous(..)"),
        }
    }
}

/// Describes the cardiac tissue problem.
pub struct CardiacModelDescriptor {
    pub domain: BoxMesh,
    /// Intracellular conductivity `M_i`.
    pub intracellular: Conductivity,
    /// Extracellular conductivity `M_e`.
    pub extracellular: Conductivity,
    pub cell_model: Arc<dyn CellModel>,
    /// Added to `dv/dt` in the reaction sub-step.
    pub stimulus: Option<Arc<dyn Forcing>>,
    /// Source term of the extracellular potential equation.
    pub applied_current: Option<Arc<dyn Forcing>>,
    pub membrane_capacitance: f64,
}

impl CardiacModelDescriptor {
    /// Descriptor with no forcing and unit membrane capacitance.
    pub fn new(
        domain: BoxMesh,
        intracellular: Conductivity,
        extracellular: Conductivity,
        cell_model: Arc<dyn CellModel>,
    ) -> Self {
        Self {
            domain,
            intracellular,
            extracellular,
            cell_model,
            stimulus: None,
            applied_current: None,
            membrane_capacitance: 1.0,
        }
    }
}

/// A validated cardiac problem. Cloning is cheap and shares the cell model and
/// forcing terms.
#[derive(Clone)]
pub struct CardiacModel {
    domain: BoxMesh,
    intracellular: Conductivity,
    extracellular: Conductivity,
    cell_model: Arc<dyn CellModel>,
    stimulus: Option<Arc<dyn Forcing>>,
    applied_current: Option<Arc<dyn Forcing>>,
    membrane_capacitance: f64,
}

impl CardiacModel {
    /// Checks the conductivities and the membrane capacitance against the domain.
    #[inline]
    pub fn new(desc: CardiacModelDescriptor) -> Result<Self, Error> {
        desc.intracellular.validate("intracellular", &desc.domain)?;
        desc.extracellular.validate("extracellular", &desc.domain)?;
        let cm = desc.membrane_capacitance;
        if !(cm.is_finite() && cm > 0.0) {
            return Err(Error::InvalidParameter {
                name: "membrane_capacitance".to_string(),
                reason: format!("expected a positive value, got {cm}"),
            });
        }
        let (_, s0) = desc.cell_model.initial_conditions();
        desc.cell_model.check_state(&s0)?;

        Ok(Self {
            domain: desc.domain,
            intracellular: desc.intracellular,
            extracellular: desc.extracellular,
            cell_model: desc.cell_model,
            stimulus: desc.stimulus,
            applied_current: desc.applied_current,
            membrane_capacitance: cm,
        })
    }

    pub fn domain(&self) -> &BoxMesh {
        &self.domain
    }

    pub fn intracellular(&self) -> &Conductivity {
        &self.intracellular
    }

    pub fn extracellular(&self) -> &Conductivity {
        &self.extracellular
    }

    pub fn cell_model(&self) -> &dyn CellModel {
        self.cell_model.as_ref()
    }

    pub fn membrane_capacitance(&self) -> f64 {
        self.membrane_capacitance
    }

    pub fn stimulus_at(&self, t: f64) -> Array1<f64> {
        forcing::sample(self.stimulus.as_deref(), &self.domain, t)
    }

    pub fn applied_current_at(&self, t: f64) -> Array1<f64> {
        forcing::sample(self.applied_current.as_deref(), &self.domain, t)
    }

    pub fn has_applied_current(&self) -> bool {
        self.applied_current.is_some()
    }

    pub(crate) fn mass(&self) -> Array1<f64> {
        discretization::lumped_mass(&self.domain)
    }

    pub(crate) fn intracellular_stiffness(&self) -> CsMat<f64> {
        discretization::assemble_stiffness(&self.domain, |axis, x| {
            self.intracellular.eval(axis, x)
        })
    }

    /// Stiffness of `-div((M_i + M_e) grad u)`.
    pub(crate) fn bulk_stiffness(&self) -> CsMat<f64> {
        discretization::assemble_stiffness(&self.domain, |axis, x| {
            self.intracellular.eval(axis, x) + self.extracellular.eval(axis, x)
        })
    }

    /// Stiffness of the monodomain reduction, with the harmonic mean
    /// `M_i M_e / (M_i + M_e)` along each axis.
    pub(crate) fn monodomain_stiffness(&self) -> CsMat<f64> {
        discretization::assemble_stiffness(&self.domain, |axis, x| {
            let (si, se) = (self.intracellular.eval(axis, x), self.extracellular.eval(axis, x));
            if si + se > 0.0 {
                si * se / (si + se)
            } else {
                0.0
            }
        })
    }
}

impl fmt::Debug for CardiacModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardiacModel")
            .field("domain", &self.domain)
            .field("intracellular", &self.intracellular)
            .field("extracellular", &self.extracellular)
            .field("cell_model", &self.cell_model.name())
            .field("stimulus", &self.stimulus.is_some())
            .field("applied_current", &self.applied_current.is_some())
            .field("membrane_capacitance", &self.membrane_capacitance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cellmodels::FitzHughNagumo;

    fn descriptor(intracellular: Conductivity) -> CardiacModelDescriptor {
        CardiacModelDescriptor::new(
            BoxMesh::unit_square(2, 2).unwrap(),
            intracellular,
            Conductivity::Isotropic(1.0),
            Arc::new(FitzHughNagumo::new()),
        )
    }

    #[test]
    fn diagonal_conductivity_must_match_dimension() {
        let err = CardiacModel::new(descriptor(Conductivity::Diagonal(vec![1.0, 1.0, 1.0])))
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleConductivity { dim: 2, .. }));
        assert!(CardiacModel::new(descriptor(Conductivity::Diagonal(vec![1.0, 2.0]))).is_ok());
    }

    #[test]
    fn negative_conductivity_is_rejected() {
        assert!(CardiacModel::new(descriptor(Conductivity::Isotropic(-1.0))).is_err());
        let sigma = Conductivity::heterogeneous(|_, x| if x[0] > 0.5 { -1.0 } else { 1.0 });
        assert!(CardiacModel::new(descriptor(sigma)).is_err());
    }

    #[test]
    fn harmonic_mean_for_monodomain() {
        let mut desc = descriptor(Conductivity::Isotropic(1.0));
        desc.extracellular = Conductivity::Isotropic(3.0);
        let model = CardiacModel::new(desc).unwrap();
        let km = model.monodomain_stiffness();
        let ki = model.intracellular_stiffness();
        for (row, vec) in km.outer_iterator().enumerate() {
            for (col, &val) in vec.iter() {
                let expected = 0.75 * ki.get(row, col).copied().unwrap_or(0.0);
                assert!((val - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn rejects_non_positive_capacitance() {
        let mut desc = descriptor(Conductivity::Isotropic(1.0));
        desc.membrane_capacitance = 0.0;
        assert!(CardiacModel::new(desc).unwrap_err().is_configuration());
    }
}
