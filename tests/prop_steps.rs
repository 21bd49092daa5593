//! Property-based tests of the time stepping using proptest.

use std::sync::Arc;

use beatsplit::forcing;
use beatsplit::prelude::*;
use proptest::prelude::*;

/// Three vertices of passive tissue under a uniform unit stimulus.
fn passive_interval() -> CardiacModel {
    let mut desc = CardiacModelDescriptor::new(
        BoxMesh::unit_interval(2).unwrap(),
        Conductivity::Isotropic(1.0),
        Conductivity::Isotropic(1.0),
        Arc::new(NoCellModel::new()),
    );
    desc.stimulus = Some(forcing::constant(1.0));
    CardiacModel::new(desc).unwrap()
}

fn solver(scheme: SplittingScheme) -> SplittingSolver {
    let mut params = SplittingParameters::default();
    params.model = PdeModel::Monodomain;
    params.scheme = scheme;
    SplittingSolver::optimised(&passive_interval(), params).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Steps are contiguous, no longer than `dt`, and the last one ends
    /// exactly at the requested end time.
    #[test]
    fn steps_cover_the_interval(t0 in -1.0f64..1.0, span in 0.01f64..2.0, dt in 0.01f64..0.5) {
        let t1 = t0 + span;
        let mut solver = solver(SplittingScheme::Strang);
        let steps = solver.solve((t0, t1), dt).unwrap();
        let expected = steps.num_steps();
        let intervals: Vec<Interval> = steps.map(|step| step.unwrap()).collect();

        prop_assert_eq!(intervals.len(), expected);
        prop_assert_eq!(intervals[0].0, t0);
        prop_assert_eq!(intervals[expected - 1].1, t1);
        for (a, b) in intervals.iter().zip(intervals.iter().skip(1)) {
            prop_assert_eq!(a.1, b.0);
        }
        for &(a, b) in &intervals {
            prop_assert!(b > a);
            prop_assert!(b - a <= dt * (1.0 + 1e-9), "step [{}, {}] longer than {}", a, b, dt);
        }
        prop_assert_eq!(solver.state(), SolverState::Done);
    }

    /// A uniform stimulus charges the tissue by exactly the elapsed time,
    /// whatever the splitting and step size.
    #[test]
    fn uniform_stimulus_integrates_exactly(span in 0.05f64..1.0, dt in 0.01f64..0.3, strang in any::<bool>()) {
        let scheme = if strang { SplittingScheme::Strang } else { SplittingScheme::Godunov };
        let mut solver = solver(scheme);
        solver.solve((0.0, span), dt).unwrap().run().unwrap();
        for &v in solver.solution_fields().vs.component(0).iter() {
            prop_assert!((v - span).abs() < 1e-8 * span.max(1.0), "v = {}, expected {}", v, span);
        }
    }
}
