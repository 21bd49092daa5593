//! The linear strategies of the diffusion sub-step produce the same solution.

mod common;

use beatsplit::forcing;
use beatsplit::prelude::*;
use common::*;

fn optimised_with(model: &CardiacModel, strategy: &str, constraint: bool) -> SplittingSolver {
    let mut params = SplittingParameters::default();
    params.set("BidomainSolver.linear_solver_type", strategy).unwrap();
    params.set("BidomainSolver.use_avg_u_constraint", constraint).unwrap();
    SplittingSolver::optimised(model, params).unwrap()
}

#[test]
fn bidomain_strategies_agree() {
    let model = cube_model(3, Some(corner_stimulus()), Some(forcing::constant(1.0)));
    let mut iterative = optimised_with(&model, "iterative", false);
    let mut pinned = optimised_with(&model, "direct", false);
    let mut constrained = optimised_with(&model, "direct", true);
    for solver in [&mut iterative, &mut pinned, &mut constrained] {
        run(solver, (0.0, 0.3), 0.1);
    }

    assert!(iterative.solution_fields().multiplier.is_none());
    assert!(pinned.solution_fields().multiplier.is_none());
    assert!(constrained.solution_fields().multiplier.is_some());

    let reference = constrained.solution_fields().vu;
    assert!(max_difference(pinned.solution_fields().vu, reference) < 1e-8);
    assert!(max_difference(iterative.solution_fields().vu, reference) < 1e-5);
}

#[test]
fn unpreconditioned_cold_start_agrees() {
    let model = cube_model(3, Some(corner_stimulus()), None);
    let mut params = SplittingParameters::default();
    params.set("BidomainSolver.use_preconditioner", false).unwrap();
    params
        .set("BidomainSolver.krylov_solver.nonzero_initial_guess", false)
        .unwrap();
    let mut plain = SplittingSolver::optimised(&model, params).unwrap();
    let mut preconditioned =
        SplittingSolver::optimised(&model, SplittingParameters::default()).unwrap();
    run(&mut plain, (0.0, 0.3), 0.1);
    run(&mut preconditioned, (0.0, 0.3), 0.1);
    assert!(
        max_difference(plain.solution_fields().vu, preconditioned.solution_fields().vu) < 1e-5
    );
}

#[test]
fn basic_iterative_matches_direct() {
    let model = cube_model(3, Some(corner_stimulus()), None);
    let mut iterative_params = BasicSplittingParameters::default();
    iterative_params
        .set("BasicBidomainSolver.linear_solver_type", "iterative")
        .unwrap();
    let mut iterative = SplittingSolver::basic(&model, iterative_params).unwrap();
    let mut direct =
        SplittingSolver::basic(&model, BasicSplittingParameters::default()).unwrap();
    run(&mut iterative, (0.0, 0.3), 0.1);
    run(&mut direct, (0.0, 0.3), 0.1);

    assert!(direct.solution_fields().multiplier.is_some());
    assert!(
        max_difference(iterative.solution_fields().vu, direct.solution_fields().vu) < 1e-5
    );
}

#[test]
fn extracellular_average_vanishes() {
    let model = cube_model(3, Some(corner_stimulus()), Some(forcing::constant(3.0)));
    let mass_weights = model.domain().vertex_volumes();
    for (strategy, constraint) in [
        ("iterative", false),
        ("direct", false),
        ("direct", true),
    ] {
        let mut solver = optimised_with(&model, strategy, constraint);
        run(&mut solver, (0.0, 0.2), 0.1);
        let u = solver.solution_fields().vu.component(1);
        assert!(u.dot(&mass_weights).abs() < 1e-10, "{strategy} {constraint}");
    }
}

#[test]
fn monodomain_strategies_agree() {
    let model = cube_model(3, Some(corner_stimulus()), None);
    let mut solutions = Vec::new();
    for strategy in [LinearSolverType::Iterative, LinearSolverType::Direct] {
        let mut params = SplittingParameters::default();
        params.model = PdeModel::Monodomain;
        params.pde_solver.linear_solver_type = strategy;
        let mut solver = SplittingSolver::optimised(&model, params).unwrap();
        run(&mut solver, (0.0, 0.3), 0.1);
        solutions.push(solver.solution_fields().vs.clone());
    }
    assert!(max_difference(&solutions[0], &solutions[1]) < 1e-6);
}
