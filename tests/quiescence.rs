//! A tissue at rest without any forcing stays at rest.

mod common;

use std::sync::Arc;

use beatsplit::prelude::*;
use common::*;

fn assert_at_rest(solver: &SplittingSolver, v_rest: f64) {
    let fields = solver.solution_fields();
    for &v in fields.vs.component(0).iter() {
        assert!((v - v_rest).abs() < 1e-9, "v = {v}");
    }
    for &s in fields.vs.component(1).iter() {
        assert!(s.abs() < 1e-12, "s = {s}");
    }
    for &u in fields.vu.component(1).iter() {
        assert!(u.abs() < 1e-9, "u = {u}");
    }
}

#[test]
fn bidomain_rest_state() {
    let model = cube_model(3, None, None);
    let mut reference =
        SplittingSolver::basic(&model, BasicSplittingParameters::default()).unwrap();
    let mut fast = SplittingSolver::optimised(&model, SplittingParameters::default()).unwrap();
    run(&mut reference, (0.0, 1.0), 0.25);
    run(&mut fast, (0.0, 1.0), 0.25);
    assert_at_rest(&reference, -85.0);
    assert_at_rest(&fast, -85.0);
}

#[test]
fn monodomain_rest_state() {
    let model = cube_model(3, None, None);
    let mut params = SplittingParameters::default();
    params.model = PdeModel::Monodomain;
    params.set("scheme", "godunov").unwrap();
    let mut solver = SplittingSolver::optimised(&model, params).unwrap();
    run(&mut solver, (0.0, 1.0), 0.25);
    assert_at_rest(&solver, -85.0);
}

#[test]
fn every_linear_strategy_keeps_rest() {
    let model = cube_model(2, None, None);
    for (strategy, constraint) in [
        ("iterative", false),
        ("direct", false),
        ("direct", true),
    ] {
        let mut params = SplittingParameters::default();
        params.set("BidomainSolver.linear_solver_type", strategy).unwrap();
        params.set("BidomainSolver.use_avg_u_constraint", constraint).unwrap();
        let mut solver = SplittingSolver::optimised(&model, params).unwrap();
        run(&mut solver, (0.0, 0.5), 0.1);
        assert_at_rest(&solver, -85.0);
    }
}

#[test]
fn passive_tissue_with_shifted_rest() {
    let mut desc = CardiacModelDescriptor::new(
        BoxMesh::unit_square(4, 4).unwrap(),
        Conductivity::Diagonal(vec![1.0, 0.5]),
        Conductivity::Isotropic(1.0),
        Arc::new(NoCellModel::new()),
    );
    desc.membrane_capacitance = 2.0;
    let model = CardiacModel::new(desc).unwrap();
    let mut solver =
        SplittingSolver::basic(&model, BasicSplittingParameters::default()).unwrap();
    solver.set_initial_condition(-60.0, &[0.0]).unwrap();
    run(&mut solver, (0.0, 0.3), 0.1);
    assert_at_rest(&solver, -60.0);
}
