use std::sync::Arc;

use beatsplit::prelude::*;

fn main() {
    let n = 32;
    let mesh = BoxMesh::unit_square(n, n).unwrap();

    // reduced intracellular conduction inside an ischemic disc
    let ischemic = |x: [f64; 3]| (x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2) < 0.04;
    let heart = CardiacModel::new(CardiacModelDescriptor::new(
        mesh.clone(),
        Conductivity::heterogeneous(move |_axis, x| if ischemic(x) { 0.25 } else { 1.0 }),
        Conductivity::Isotropic(1.0),
        Arc::new(FitzHughNagumo::new()),
    ))
    .unwrap();

    let mut params = SplittingParameters::default();
    params.set("theta", 0.5).unwrap();
    params.verbose = true;
    let mut solver = SplittingSolver::optimised(&heart, params).unwrap();

    // excited strip along the left edge, resting tissue elsewhere
    let mut vs0 = MixedField::zeros(mesh.num_vertices(), 2);
    for idx in 0..mesh.num_vertices() {
        let x = mesh.coordinates(idx);
        vs0.component_mut(0)[idx] = if x[0] < 0.1 { 0.0 } else { -85.0 };
    }
    solver.set_initial_field(&vs0).unwrap();

    let interval = (0.0, 0.1);
    let dt = 0.01;
    let mut steps = solver.solve(interval, dt).unwrap();
    while let Some(step) = steps.next_step() {
        let ((_, t), fields) = step.unwrap();
        let v = fields.vs.component(0);
        println!(
            "t = {t:.3} ms: v in [{:.3}, {:.3}] mV",
            v.fold(f64::INFINITY, |m, &x| m.min(x)),
            v.fold(f64::NEG_INFINITY, |m, &x| m.max(x)),
        );
    }
    drop(steps);

    // squared norm of the final state weighted by vertex volume
    let fields = solver.solution_fields();
    let weights = mesh.vertex_volumes();
    let j: f64 = (0..fields.vs.num_components())
        .map(|c| {
            let component = fields.vs.component(c);
            (&component * &component).dot(&weights)
        })
        .sum();
    println!("\nJ = {j:.6e}");
}
